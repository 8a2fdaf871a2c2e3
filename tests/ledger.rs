//! Ledger math integration tests: weighted-average cost basis.

use paper_exchange::ledger::positions::weighted_average;
use rust_decimal_macros::dec;

#[test]
fn weighted_average_two_buys() {
    // 10 @ 50 then 5 @ 80 -> (500 + 400) / 15 = 60
    assert_eq!(weighted_average(dec!(10), dec!(50), dec!(5), dec!(80)), dec!(60));
}

#[test]
fn weighted_average_matches_closed_form() {
    let (q1, p1, q2, p2) = (dec!(3.5), dec!(120.25), dec!(1.5), dec!(98));
    let avg = weighted_average(q1, p1, q2, p2);
    assert_eq!(avg, (q1 * p1 + q2 * p2) / (q1 + q2));
}

#[test]
fn weighted_average_same_price_is_stable() {
    let avg = weighted_average(dec!(7), dec!(42), dec!(13), dec!(42));
    assert_eq!(avg, dec!(42));
}

#[test]
fn weighted_average_split_across_ticks_equals_single_batch() {
    // Buying q2 then q3 on top of q1 gives the same basis as one combined buy,
    // so it cannot matter whether the fills land in the same settlement tick.
    let (q1, p1) = (dec!(10), dec!(50));
    let (q2, p2) = (dec!(6), dec!(58));
    let (q3, p3) = (dec!(4), dec!(33));

    let step1 = weighted_average(q1, p1, q2, p2);
    assert_eq!(step1, dec!(53));

    let stepwise = weighted_average(q1 + q2, step1, q3, p3);
    let direct = (q1 * p1 + q2 * p2 + q3 * p3) / (q1 + q2 + q3);
    assert_eq!(stepwise, direct);
    assert_eq!(stepwise, dec!(49));
}

#[test]
fn fractional_quantities_average_exactly() {
    // 0.5 @ 40000 then 0.5 @ 50000 -> 45000
    let avg = weighted_average(dec!(0.5), dec!(40000), dec!(0.5), dec!(50000));
    assert_eq!(avg, dec!(45000));
}

#[test]
fn buy_cost_arithmetic() {
    // 10 units @ $50 out of $100,000 leaves $99,500.
    let balance = dec!(100000);
    let total = dec!(10) * dec!(50);
    assert_eq!(balance - total, dec!(99500));
}
