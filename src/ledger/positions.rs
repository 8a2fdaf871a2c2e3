//! Holdings persistence: row-locked weighted-average buys and decrease-or-close
//! sells. A holding row with quantity <= 0 never exists; closing a position
//! deletes the row.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HoldingRow {
    pub symbol: String,
    pub quantity: Decimal,
    pub average_buy_price: Decimal,
}

/// Volume-weighted average entry price after buying `qty` at `price` on top of
/// an existing `(old_qty, old_avg)` position.
pub fn weighted_average(
    old_qty: Decimal,
    old_avg: Decimal,
    qty: Decimal,
    price: Decimal,
) -> Decimal {
    (old_qty * old_avg + qty * price) / (old_qty + qty)
}

/// Lock the holding row, returning `(quantity, average_buy_price)` if present.
pub async fn holding_for_update(
    conn: &mut PgConnection,
    user_id: Uuid,
    symbol: &str,
) -> Result<Option<(Decimal, Decimal)>, sqlx::Error> {
    sqlx::query_as(
        "SELECT quantity, average_buy_price FROM holdings \
         WHERE user_id = $1 AND symbol = $2 FOR UPDATE",
    )
    .bind(user_id)
    .bind(symbol)
    .fetch_optional(&mut *conn)
    .await
}

/// Insert a new holding or fold the buy into the existing row by weighted
/// averaging. Locks the row when present.
pub async fn open_or_increase(
    conn: &mut PgConnection,
    user_id: Uuid,
    symbol: &str,
    qty: Decimal,
    price: Decimal,
) -> Result<(), Error> {
    match holding_for_update(&mut *conn, user_id, symbol).await? {
        None => {
            sqlx::query(
                "INSERT INTO holdings (user_id, symbol, quantity, average_buy_price) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(user_id)
            .bind(symbol)
            .bind(qty)
            .bind(price)
            .execute(&mut *conn)
            .await?;
        }
        Some((old_qty, old_avg)) => {
            let new_qty = old_qty + qty;
            let new_avg = weighted_average(old_qty, old_avg, qty, price);
            sqlx::query(
                "UPDATE holdings SET quantity = $1, average_buy_price = $2, updated_at = $3 \
                 WHERE user_id = $4 AND symbol = $5",
            )
            .bind(new_qty)
            .bind(new_avg)
            .bind(Utc::now())
            .bind(user_id)
            .bind(symbol)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

/// Lock the holding row and reduce it by `qty`; the row is deleted when the
/// remainder reaches exactly zero. Average cost is unchanged on a sell.
pub async fn decrease_or_close(
    conn: &mut PgConnection,
    user_id: Uuid,
    symbol: &str,
    qty: Decimal,
) -> Result<(), Error> {
    let (held, _avg) = holding_for_update(&mut *conn, user_id, symbol)
        .await?
        .ok_or(Error::NoHoldings)?;
    if qty > held {
        return Err(Error::InsufficientHoldings {
            have: held,
            want: qty,
        });
    }
    let remaining = held - qty;
    if remaining.is_zero() {
        sqlx::query("DELETE FROM holdings WHERE user_id = $1 AND symbol = $2")
            .bind(user_id)
            .bind(symbol)
            .execute(&mut *conn)
            .await?;
    } else {
        sqlx::query(
            "UPDATE holdings SET quantity = $1, updated_at = $2 \
             WHERE user_id = $3 AND symbol = $4",
        )
        .bind(remaining)
        .bind(Utc::now())
        .bind(user_id)
        .bind(symbol)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Lock-free holdings list for display paths.
pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<HoldingRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT symbol, quantity, average_buy_price FROM holdings \
         WHERE user_id = $1 ORDER BY symbol",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}
