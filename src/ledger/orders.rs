//! Order persistence: insert at intake, status transitions at settlement,
//! pending scans, and per-user listings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::types::order::{Order, OrderSide, OrderStatus, OrderType};

pub fn side_to_str(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    }
}

pub fn order_type_to_str(ot: OrderType) -> &'static str {
    match ot {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
        OrderType::Stop => "stop",
    }
}

pub fn status_to_str(s: OrderStatus) -> &'static str {
    match s {
        OrderStatus::Pending => "pending",
        OrderStatus::Filled => "filled",
        OrderStatus::Rejected => "rejected",
    }
}

pub fn str_to_side(s: &str) -> Option<OrderSide> {
    match s {
        "buy" => Some(OrderSide::Buy),
        "sell" => Some(OrderSide::Sell),
        _ => None,
    }
}

pub fn str_to_order_type(s: &str) -> Option<OrderType> {
    match s {
        "market" => Some(OrderType::Market),
        "limit" => Some(OrderType::Limit),
        "stop" => Some(OrderType::Stop),
        _ => None,
    }
}

pub fn str_to_status(s: &str) -> Option<OrderStatus> {
    match s {
        "pending" => Some(OrderStatus::Pending),
        "filled" => Some(OrderStatus::Filled),
        "rejected" => Some(OrderStatus::Rejected),
        _ => None,
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

const ORDER_COLUMNS: &str =
    "id, user_id, symbol, side, order_type, quantity, price, status, created_at, executed_at";

/// Insert a pending order at intake.
#[allow(clippy::too_many_arguments)]
pub async fn insert_order(
    conn: &mut PgConnection,
    id: Uuid,
    user_id: Uuid,
    symbol: &str,
    side: OrderSide,
    order_type: OrderType,
    quantity: Decimal,
    price: Option<Decimal>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, user_id, symbol, side, order_type, quantity, price, status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending')",
    )
    .bind(id)
    .bind(user_id)
    .bind(symbol)
    .bind(side_to_str(side))
    .bind(order_type_to_str(order_type))
    .bind(quantity)
    .bind(price)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// All pending orders, oldest first (settlement order across rows is
/// first-seen-in-scan, nothing stronger).
pub async fn list_pending(pool: &PgPool) -> Result<Vec<OrderRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE status = 'pending' ORDER BY created_at",
    ))
    .fetch_all(pool)
    .await
}

/// Re-read the order's status under a row lock. The settlement transaction uses
/// this to guarantee the pending -> terminal transition happens at most once.
pub async fn status_for_update(
    conn: &mut PgConnection,
    id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Terminal transition to `filled`, stamping the execution time.
pub async fn mark_filled(
    conn: &mut PgConnection,
    id: Uuid,
    executed_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET status = 'filled', executed_at = $1 WHERE id = $2")
        .bind(executed_at)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Terminal transition to `rejected`.
pub async fn mark_rejected(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET status = 'rejected' WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Single order scoped to its owner (for GET /orders/{id}).
pub async fn get_for_user(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<OrderRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2",
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Recent orders for a user, newest first.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<OrderRow>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
         ORDER BY created_at DESC LIMIT $2",
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Convert a row into the wire-facing order. Skips rows with unknown enum text.
pub fn order_row_to_order(row: &OrderRow) -> Option<Order> {
    Some(Order {
        id: row.id,
        user_id: row.user_id,
        symbol: row.symbol.clone(),
        side: str_to_side(&row.side)?,
        order_type: str_to_order_type(&row.order_type)?,
        quantity: row.quantity,
        price: row.price,
        status: str_to_status(&row.status)?,
        created_at: row.created_at,
        executed_at: row.executed_at,
    })
}
