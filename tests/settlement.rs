//! Settlement worker integration tests: eligibility and price resolution.

use std::time::Duration;

use chrono::Utc;
use paper_exchange::settlement::{is_eligible, target_price};
use rust_decimal_macros::dec;

#[test]
fn target_price_uses_positive_stored_price() {
    assert_eq!(target_price(Some(dec!(101.5))), Some(dec!(101.5)));
}

#[test]
fn target_price_ignores_missing_or_non_positive() {
    // Market orders carry no price; a zero or negative one settles live.
    assert_eq!(target_price(None), None);
    assert_eq!(target_price(Some(dec!(0))), None);
    assert_eq!(target_price(Some(dec!(-5))), None);
}

#[test]
fn fresh_orders_are_not_eligible() {
    let now = Utc::now();
    let created = now - chrono::Duration::seconds(2);
    assert!(!is_eligible(created, now, Duration::from_secs(5)));
}

#[test]
fn dwelled_orders_are_eligible() {
    let now = Utc::now();
    let created = now - chrono::Duration::seconds(6);
    assert!(is_eligible(created, now, Duration::from_secs(5)));
}

#[test]
fn eligibility_boundary_is_inclusive() {
    let now = Utc::now();
    let created = now - chrono::Duration::seconds(5);
    assert!(is_eligible(created, now, Duration::from_secs(5)));
}

#[test]
fn zero_dwell_settles_immediately() {
    let now = Utc::now();
    assert!(is_eligible(now, now, Duration::ZERO));
}
