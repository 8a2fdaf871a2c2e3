//! Price feed integration tests: normalization, table lookups, fallback
//! failure, and snapshot broadcasting.

use std::sync::Arc;

use chrono::Utc;
use paper_exchange::feed::{normalize_symbol, FeedConfig, PriceFeed};
use paper_exchange::types::ticker::Ticker;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::broadcast::error::TryRecvError;

/// Feed whose upstream base URLs point at a closed port, so every fallback
/// request fails fast.
fn offline_feed() -> Arc<PriceFeed> {
    Arc::new(PriceFeed::new(FeedConfig {
        crypto_ids: vec![("bitcoin".to_string(), "BTC".to_string())],
        stock_symbols: vec!["AAPL".to_string()],
        finnhub_api_key: "test-key".to_string(),
        crypto_base_url: "http://127.0.0.1:1".to_string(),
        equity_base_url: "http://127.0.0.1:1".to_string(),
        ..FeedConfig::default()
    }))
}

fn ticker(symbol: &str, price: Decimal) -> Ticker {
    Ticker {
        symbol: symbol.to_string(),
        price,
        change_24h: 0.0,
        updated_at: Utc::now(),
    }
}

#[test]
fn normalize_strips_exchange_prefix_and_quote_suffix() {
    assert_eq!(normalize_symbol("BINANCE:MKRUSDT"), "MKR");
    assert_eq!(normalize_symbol("btcusd"), "BTC");
    assert_eq!(normalize_symbol(" eth "), "ETH");
    assert_eq!(normalize_symbol("AAPL"), "AAPL");
}

#[test]
fn normalize_keeps_bare_quote_currencies() {
    assert_eq!(normalize_symbol("USDT"), "USDT");
    assert_eq!(normalize_symbol("USD"), "USD");
}

#[tokio::test]
async fn get_price_reads_table() {
    let feed = offline_feed();
    feed.apply_batch(vec![ticker("BTC", dec!(50000))]).await;

    assert_eq!(feed.get_price("BTC").await.unwrap(), dec!(50000));
    // Lowercase and decorated symbols resolve to the same entry.
    assert_eq!(feed.get_price("btc").await.unwrap(), dec!(50000));
    assert_eq!(feed.get_price("BINANCE:BTCUSDT").await.unwrap(), dec!(50000));
}

#[tokio::test]
async fn get_price_unknown_symbol_with_dead_upstreams_errors() {
    let feed = offline_feed();
    let err = feed.get_price("ZZZ").await.unwrap_err();
    assert!(err.to_string().contains("price unavailable"));
}

#[tokio::test]
async fn get_price_known_crypto_with_dead_upstreams_errors() {
    // BTC maps to a crypto id, but the table is empty and the fallback
    // endpoint is unreachable.
    let feed = offline_feed();
    assert!(feed.get_price("BTC").await.is_err());
}

#[tokio::test]
async fn is_supported_is_permissive() {
    let feed = offline_feed();
    assert!(feed.is_supported("BTC"));
    assert!(feed.is_supported("AAPL"));
    assert!(feed.is_supported("ANYTHING"));
}

#[tokio::test]
async fn empty_table_has_no_snapshot() {
    let feed = offline_feed();
    assert!(feed.snapshot().await.is_none());
}

#[tokio::test]
async fn subscriber_sees_one_snapshot_per_refresh() {
    let feed = offline_feed();
    let mut rx = feed.subscribe();

    // Empty batches publish nothing.
    feed.apply_batch(Vec::new()).await;
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

    feed.apply_batch(vec![ticker("BTC", dec!(50000)), ticker("ETH", dec!(3000))])
        .await;

    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.get("BTC").unwrap().price, dec!(50000));
    assert_eq!(snapshot.get("ETH").unwrap().price, dec!(3000));

    // Exactly one snapshot per refresh, nothing queued behind it.
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn refresh_merges_into_existing_table() {
    let feed = offline_feed();
    feed.apply_batch(vec![ticker("BTC", dec!(50000))]).await;
    feed.apply_batch(vec![ticker("ETH", dec!(3000))]).await;

    let snapshot = feed.snapshot().await.unwrap();
    assert_eq!(snapshot.len(), 2);

    // A later batch overwrites the earlier entry for the same symbol.
    feed.apply_batch(vec![ticker("BTC", dec!(51000))]).await;
    assert_eq!(feed.get_price("BTC").await.unwrap(), dec!(51000));
}
