//! HTTP surface: router, application state, and request handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::api::auth::{self, AuthUser};
use crate::api::ws;
use crate::error::Error;
use crate::feed::PriceFeed;
use crate::intake::{self, PlaceOrderRequest, PlacedOrder};
use crate::ledger::positions::HoldingRow;
use crate::ledger::transactions::{EntryKind, EntryRow};
use crate::ledger::{accounts, orders, positions, transactions, users};
use crate::types::order::Order;

/// Paper money granted to every new account.
const STARTING_BALANCE: Decimal = dec!(100_000);

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub feed: Arc<PriceFeed>,
    pub jwt_secret: Vec<u8>,
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/ws/prices", get(ws::ws_handler))
        .route("/orders", post(place_order).get(list_orders))
        .route("/orders/{id}", get(get_order))
        .route("/trade/buy", post(trade_buy))
        .route("/trade/sell", post(trade_sell))
        .route("/wallet/topup", post(top_up))
        .route("/portfolio", get(portfolio))
        .route("/transactions", get(list_transactions))
        .with_state(state)
}

async fn health() -> &'static str {
    "healthy"
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

/// Create user + wallet atomically; the wallet starts with paper money.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(Error::Validation(
            "email and password are required".to_string(),
        ));
    }
    let password_hash = auth::hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    let mut tx = state.pool.begin().await?;
    users::insert_user(&mut tx, user_id, &email, &password_hash)
        .await
        .map_err(|err| {
            if let sqlx::Error::Database(db) = &err {
                if db.is_unique_violation() {
                    return Error::EmailTaken;
                }
            }
            Error::Database(err)
        })?;
    accounts::create_wallet(&mut tx, user_id, STARTING_BALANCE).await?;
    tx.commit().await?;

    let token = auth::create_token(&state.jwt_secret, user_id)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user_id": user_id,
            "balance": STARTING_BALANCE,
            "token": token,
        })),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<Value>, Error> {
    let email = req.email.trim().to_lowercase();
    let user = users::get_user_by_email(&state.pool, &email)
        .await?
        .ok_or(Error::InvalidCredentials)?;
    if !auth::verify_password(&user.password_hash, &req.password) {
        return Err(Error::InvalidCredentials);
    }
    let token = auth::create_token(&state.jwt_secret, user.id)?;
    Ok(Json(json!({ "user_id": user.id, "token": token })))
}

async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlacedOrder>), Error> {
    let placed = intake::place_order(&state.pool, &state.feed, user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}

async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Order>>, Error> {
    let rows = orders::list_for_user(&state.pool, user.user_id, 100).await?;
    Ok(Json(rows.iter().filter_map(orders::order_row_to_order).collect()))
}

async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, Error> {
    let row = orders::get_for_user(&state.pool, id, user.user_id)
        .await?
        .ok_or(Error::OrderNotFound)?;
    let order = orders::order_row_to_order(&row)
        .ok_or_else(|| Error::Internal(format!("order {} has malformed fields", row.id)))?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub quantity: Decimal,
    pub price: Decimal,
}

fn validate_trade(req: &TradeRequest) -> Result<String, Error> {
    let symbol = req.symbol.trim().to_uppercase();
    if symbol.is_empty() || req.quantity <= Decimal::ZERO || req.price <= Decimal::ZERO {
        return Err(Error::Validation(
            "symbol, quantity, and price must be positive".to_string(),
        ));
    }
    Ok(symbol)
}

/// Immediate buy at the client-supplied price, settled in one transaction.
async fn trade_buy(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<TradeRequest>,
) -> Result<Json<Value>, Error> {
    let symbol = validate_trade(&req)?;
    let total = req.quantity * req.price;

    let mut tx = state.pool.begin().await?;
    accounts::reserve_and_charge(&mut tx, user.user_id, total).await?;
    positions::open_or_increase(&mut tx, user.user_id, &symbol, req.quantity, req.price).await?;
    transactions::append(
        &mut tx,
        user.user_id,
        EntryKind::Buy,
        Some(&symbol),
        Some(req.quantity),
        Some(req.price),
        total,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(json!({ "message": "buy executed", "spent": total })))
}

/// Immediate sell at the client-supplied price, settled in one transaction.
async fn trade_sell(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<TradeRequest>,
) -> Result<Json<Value>, Error> {
    let symbol = validate_trade(&req)?;
    let total = req.quantity * req.price;

    let mut tx = state.pool.begin().await?;
    positions::decrease_or_close(&mut tx, user.user_id, &symbol, req.quantity).await?;
    accounts::credit(&mut tx, user.user_id, total).await?;
    transactions::append(
        &mut tx,
        user.user_id,
        EntryKind::Sell,
        Some(&symbol),
        Some(req.quantity),
        Some(req.price),
        total,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(json!({ "message": "sell executed", "received": total })))
}

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub amount: Decimal,
}

/// Add fake USD and log a DEPOSIT entry. Returns the new balance.
async fn top_up(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<TopUpRequest>,
) -> Result<Json<Value>, Error> {
    if req.amount <= Decimal::ZERO {
        return Err(Error::Validation("amount must be positive".to_string()));
    }
    let mut tx = state.pool.begin().await?;
    let new_balance = accounts::credit(&mut tx, user.user_id, req.amount).await?;
    transactions::append(
        &mut tx,
        user.user_id,
        EntryKind::Deposit,
        None,
        None,
        None,
        req.amount,
    )
    .await?;
    tx.commit().await?;

    Ok(Json(json!({ "message": "top-up successful", "balance": new_balance })))
}

#[derive(Debug, Serialize)]
pub struct PortfolioResponse {
    pub balance: Decimal,
    pub currency: &'static str,
    pub holdings: Vec<HoldingRow>,
}

/// Balance + holdings. Display path: reads without locks, accepts staleness.
async fn portfolio(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<PortfolioResponse>, Error> {
    let balance = accounts::balance(&state.pool, user.user_id)
        .await?
        .ok_or(Error::WalletNotFound)?;
    let holdings = positions::list_for_user(&state.pool, user.user_id).await?;
    Ok(Json(PortfolioResponse {
        balance,
        currency: "USD",
        holdings,
    }))
}

async fn list_transactions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<EntryRow>>, Error> {
    Ok(Json(
        transactions::list_for_user(&state.pool, user.user_id, 100).await?,
    ))
}
