//! Order intake: synchronous validation against the price feed and the ledger,
//! then persistence of the order as pending. Funds and holdings checks here are
//! advisory only - nothing is reserved, and settlement re-checks
//! authoritatively at execution time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Error;
use crate::feed::PriceFeed;
use crate::ledger::{accounts, orders, positions};
use crate::types::order::{OrderSide, OrderStatus, OrderType};

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type", default)]
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Target price, required for limit/stop orders.
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

/// Shape checks that need no I/O: positive quantity, and a positive target
/// price whenever the order type requires one.
pub fn validate(req: &PlaceOrderRequest) -> Result<(), Error> {
    if req.quantity <= Decimal::ZERO {
        return Err(Error::Validation("quantity must be positive".to_string()));
    }
    if matches!(req.order_type, OrderType::Limit | OrderType::Stop)
        && !req.price.is_some_and(|p| p > Decimal::ZERO)
    {
        return Err(Error::Validation(
            "price required for limit/stop orders".to_string(),
        ));
    }
    Ok(())
}

/// Validate and persist an order as pending. The live price lookup doubles as
/// the symbol existence check for every order type, limit and stop included.
pub async fn place_order(
    pool: &PgPool,
    feed: &PriceFeed,
    user_id: Uuid,
    req: PlaceOrderRequest,
) -> Result<PlacedOrder, Error> {
    validate(&req)?;
    let symbol = req.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(Error::Validation("symbol required".to_string()));
    }

    let live_price = feed
        .get_price(&symbol)
        .await
        .map_err(|_| Error::SymbolNotFound(symbol.clone()))?;

    // Estimated cost uses the target price when set; the live price otherwise.
    let estimated_price = req.price.filter(|p| *p > Decimal::ZERO).unwrap_or(live_price);
    let estimated_cost = req.quantity * estimated_price;

    let mut tx = pool.begin().await?;
    match req.side {
        OrderSide::Buy => {
            let balance = accounts::balance_for_update(&mut tx, user_id)
                .await?
                .ok_or(Error::WalletNotFound)?;
            if balance < estimated_cost {
                return Err(Error::InsufficientFunds {
                    need: estimated_cost,
                    have: balance,
                });
            }
        }
        OrderSide::Sell => {
            let (held, _avg) = positions::holding_for_update(&mut tx, user_id, &symbol)
                .await?
                .ok_or(Error::NoHoldings)?;
            if req.quantity > held {
                return Err(Error::InsufficientHoldings {
                    have: held,
                    want: req.quantity,
                });
            }
        }
    }

    let order_id = Uuid::new_v4();
    orders::insert_order(
        &mut tx,
        order_id,
        user_id,
        &symbol,
        req.side,
        req.order_type,
        req.quantity,
        req.price,
    )
    .await?;
    tx.commit().await?;

    Ok(PlacedOrder {
        order_id,
        status: OrderStatus::Pending,
    })
}
