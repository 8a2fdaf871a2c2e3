//! Append-only transaction log: every balance-affecting event gets one entry.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    Deposit,
    Buy,
    Sell,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Deposit => "DEPOSIT",
            EntryKind::Buy => "BUY",
            EntryKind::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EntryRow {
    pub id: i64,
    pub kind: String,
    pub symbol: Option<String>,
    pub quantity: Option<Decimal>,
    pub price_per_unit: Option<Decimal>,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Append one audit entry inside the caller's transaction. Entries are never
/// updated or deleted.
pub async fn append(
    conn: &mut PgConnection,
    user_id: Uuid,
    kind: EntryKind,
    symbol: Option<&str>,
    quantity: Option<Decimal>,
    price_per_unit: Option<Decimal>,
    total_amount: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO transactions (user_id, kind, symbol, quantity, price_per_unit, total_amount) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(symbol)
    .bind(quantity)
    .bind(price_per_unit)
    .bind(total_amount)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Recent entries for a user, newest first.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<EntryRow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, kind, symbol, quantity, price_per_unit, total_amount, created_at \
         FROM transactions WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
