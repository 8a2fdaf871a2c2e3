use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest known price snapshot for one symbol. In-memory only; rebuilt from
/// upstream sources on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub price: Decimal,
    pub change_24h: f64,
    pub updated_at: DateTime<Utc>,
}
