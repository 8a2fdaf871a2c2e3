//! Error taxonomy shared by intake, settlement, ledger, and the API layer.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),
    #[error("symbol not found or price unavailable: {0}")]
    SymbolNotFound(String),
    #[error("price unavailable for {0}")]
    PriceUnavailable(String),
    #[error("insufficient funds (need ${need}, have ${have})")]
    InsufficientFunds { need: Decimal, have: Decimal },
    #[error("insufficient holdings (have {have}, selling {want})")]
    InsufficientHoldings { have: Decimal, want: Decimal },
    #[error("no holdings for this asset")]
    NoHoldings,
    #[error("wallet not found")]
    WalletNotFound,
    #[error("order not found")]
    OrderNotFound,
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Business-rule failures that settle an order as `rejected` instead of
    /// being retried on the next tick.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            Error::InsufficientFunds { .. }
                | Error::InsufficientHoldings { .. }
                | Error::NoHoldings
                | Error::WalletNotFound
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_)
            | Error::SymbolNotFound(_)
            | Error::InsufficientFunds { .. }
            | Error::InsufficientHoldings { .. }
            | Error::NoHoldings
            | Error::WalletNotFound => StatusCode::BAD_REQUEST,
            Error::OrderNotFound => StatusCode::NOT_FOUND,
            Error::EmailTaken => StatusCode::CONFLICT,
            Error::InvalidCredentials | Error::Unauthorized | Error::Token(_) => {
                StatusCode::UNAUTHORIZED
            }
            Error::PriceUnavailable(_) | Error::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Database(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the client. Infrastructure details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            Error::Upstream(_) | Error::PriceUnavailable(_) => {
                "price source unavailable, try again".to_string()
            }
            Error::Database(_) | Error::Internal(_) => "internal error, try again".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(serde_json::json!({ "error": self.public_message() }));
        (status, body).into_response()
    }
}
