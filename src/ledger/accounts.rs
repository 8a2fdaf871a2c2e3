//! Wallet persistence: balance reads, row-locked charges and credits.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::Error;

/// Insert a wallet seeded with the opening balance (registration only).
pub async fn create_wallet(
    conn: &mut PgConnection,
    user_id: Uuid,
    opening_balance: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO wallets (id, user_id, balance, currency) VALUES ($1, $2, $3, 'USD')")
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(opening_balance)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Lock-free balance read for display paths; accepts staleness.
pub async fn balance(pool: &PgPool, user_id: Uuid) -> Result<Option<Decimal>, sqlx::Error> {
    sqlx::query_scalar("SELECT balance FROM wallets WHERE user_id = $1 AND currency = 'USD'")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Lock the wallet row for the remainder of the surrounding transaction.
pub async fn balance_for_update(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<Option<Decimal>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT balance FROM wallets WHERE user_id = $1 AND currency = 'USD' FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Lock the wallet row and debit `amount`, failing without side effects when
/// the balance is short. Returns the new balance.
pub async fn reserve_and_charge(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: Decimal,
) -> Result<Decimal, Error> {
    let balance = balance_for_update(&mut *conn, user_id)
        .await?
        .ok_or(Error::WalletNotFound)?;
    if balance < amount {
        return Err(Error::InsufficientFunds {
            need: amount,
            have: balance,
        });
    }
    let new_balance = sqlx::query_scalar(
        "UPDATE wallets SET balance = balance - $1, updated_at = $2 \
         WHERE user_id = $3 AND currency = 'USD' RETURNING balance",
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(new_balance)
}

/// Credit `amount` to the wallet. Credits only increase the balance, so there
/// is no lower-bound check; the row update still serializes concurrent writers.
pub async fn credit(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: Decimal,
) -> Result<Decimal, Error> {
    sqlx::query_scalar(
        "UPDATE wallets SET balance = balance + $1, updated_at = $2 \
         WHERE user_id = $3 AND currency = 'USD' RETURNING balance",
    )
    .bind(amount)
    .bind(Utc::now())
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(Error::WalletNotFound)
}
