//! Settlement worker: scans pending orders on a fixed tick, resolves an
//! execution price, and converts each order into a fill or a terminal
//! rejection inside one row-locked transaction.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::Error;
use crate::feed::PriceFeed;
use crate::ledger::orders::OrderRow;
use crate::ledger::transactions::EntryKind;
use crate::ledger::{accounts, orders, positions, transactions};
use crate::types::order::OrderSide;

#[derive(Debug, Clone)]
pub struct SettlementConfig {
    pub tick: Duration,
    /// Minimum age before a pending order becomes eligible; emulates fill
    /// latency and rate-limits rescans of fresh orders.
    pub dwell: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(5),
            dwell: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Filled,
    Rejected,
    /// The row was no longer pending by the time the lock was taken.
    Skipped,
}

/// A stored target price counts only when positive; otherwise the order
/// settles at the live price.
pub fn target_price(stored: Option<Decimal>) -> Option<Decimal> {
    stored.filter(|p| *p > Decimal::ZERO)
}

/// Orders settle only after dwelling for a minimum time since creation.
pub fn is_eligible(created_at: DateTime<Utc>, now: DateTime<Utc>, dwell: Duration) -> bool {
    now.signed_duration_since(created_at).num_milliseconds() >= dwell.as_millis() as i64
}

pub fn spawn(
    pool: PgPool,
    feed: Arc<PriceFeed>,
    cfg: SettlementConfig,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(tick = ?cfg.tick, dwell = ?cfg.dwell, "settlement worker started");
        loop {
            if let Err(err) = run_tick(&pool, &feed, cfg.dwell).await {
                tracing::warn!(%err, "settlement tick failed");
            }
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("settlement worker stopped");
                    return;
                }
                _ = tokio::time::sleep(cfg.tick) => {}
            }
        }
    })
}

/// One scan over all pending orders. A failure on a single order is logged and
/// retried next tick; business-rule rejections are terminal.
pub async fn run_tick(pool: &PgPool, feed: &PriceFeed, dwell: Duration) -> Result<(), Error> {
    let pending = orders::list_pending(pool).await?;
    let now = Utc::now();
    for row in pending {
        if !is_eligible(row.created_at, now, dwell) {
            continue;
        }
        let price = match target_price(row.price) {
            Some(p) => p,
            None => match feed.get_price(&row.symbol).await {
                Ok(p) => p,
                Err(err) => {
                    tracing::debug!(order = %row.id, symbol = %row.symbol, %err,
                        "skipping order: price unavailable");
                    continue;
                }
            },
        };
        match settle_order(pool, &row, price).await {
            Ok(Outcome::Filled) => {
                tracing::info!(order = %row.id, symbol = %row.symbol, %price, "order filled");
            }
            Ok(Outcome::Rejected) => {
                tracing::info!(order = %row.id, symbol = %row.symbol, "order rejected");
            }
            Ok(Outcome::Skipped) => {}
            Err(err) => {
                tracing::warn!(order = %row.id, %err, "settlement failed, will retry");
            }
        }
    }
    Ok(())
}

/// Apply one order atomically at `price`. The order row is re-read under a
/// lock so the pending -> terminal transition happens at most once; every
/// early-return path leaves the transaction rolled back.
pub async fn settle_order(pool: &PgPool, row: &OrderRow, price: Decimal) -> Result<Outcome, Error> {
    let side = orders::str_to_side(&row.side)
        .ok_or_else(|| Error::Internal(format!("order {} has unknown side {}", row.id, row.side)))?;
    let total = row.quantity * price;

    let mut tx = pool.begin().await?;
    match orders::status_for_update(&mut tx, row.id).await?.as_deref() {
        Some("pending") => {}
        _ => return Ok(Outcome::Skipped),
    }

    let applied = match side {
        OrderSide::Buy => apply_buy(&mut tx, row, price, total).await,
        OrderSide::Sell => apply_sell(&mut tx, row, price, total).await,
    };

    match applied {
        Ok(()) => {
            orders::mark_filled(&mut tx, row.id, Utc::now()).await?;
            tx.commit().await?;
            Ok(Outcome::Filled)
        }
        Err(err) if err.is_business_rejection() => {
            tracing::info!(order = %row.id, %err, "rejecting order");
            orders::mark_rejected(&mut tx, row.id).await?;
            tx.commit().await?;
            Ok(Outcome::Rejected)
        }
        Err(err) => Err(err),
    }
}

/// Authoritative funds check and ledger mutation for a buy. All checks run
/// before any row is mutated, so a business rejection commits no side effects.
async fn apply_buy(
    conn: &mut PgConnection,
    row: &OrderRow,
    price: Decimal,
    total: Decimal,
) -> Result<(), Error> {
    accounts::reserve_and_charge(&mut *conn, row.user_id, total).await?;
    positions::open_or_increase(&mut *conn, row.user_id, &row.symbol, row.quantity, price).await?;
    transactions::append(
        &mut *conn,
        row.user_id,
        EntryKind::Buy,
        Some(&row.symbol),
        Some(row.quantity),
        Some(price),
        total,
    )
    .await?;
    Ok(())
}

/// Authoritative holdings check and ledger mutation for a sell. Lock order is
/// wallet then holding, same as the buy path.
async fn apply_sell(
    conn: &mut PgConnection,
    row: &OrderRow,
    price: Decimal,
    total: Decimal,
) -> Result<(), Error> {
    accounts::balance_for_update(&mut *conn, row.user_id)
        .await?
        .ok_or(Error::WalletNotFound)?;
    positions::decrease_or_close(&mut *conn, row.user_id, &row.symbol, row.quantity).await?;
    accounts::credit(&mut *conn, row.user_id, total).await?;
    transactions::append(
        &mut *conn,
        row.user_id,
        EntryKind::Sell,
        Some(&row.symbol),
        Some(row.quantity),
        Some(price),
        total,
    )
    .await?;
    Ok(())
}
