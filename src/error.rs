use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trading engine errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TradingError {
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Insufficient funds. Required: ${needed}, Available: ${available}")]
    InsufficientFunds { needed: Decimal, available: Decimal },

    #[error("Insufficient shares of {symbol}. Requested: {requested}, Available: {available}")]
    InsufficientShares {
        symbol: String,
        requested: i64,
        available: i64,
    },

    #[error("No price available for {0}")]
    PriceUnavailable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Order {id} cannot be cancelled: status is {status}")]
    NotCancellable { id: String, status: String },

    #[error("Cash account not found: {0}")]
    AccountNotFound(String),
}

impl From<rusqlite::Error> for TradingError {
    fn from(e: rusqlite::Error) -> Self {
        TradingError::StoreUnavailable(e.to_string())
    }
}

/// Stable error code for the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidOrder,
    InsufficientFunds,
    InsufficientShares,
    PriceUnavailable,
    StoreUnavailable,
    OrderNotFound,
    NotCancellable,
    AccountNotFound,
}

/// Serialized error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl TradingError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TradingError::InvalidOrder(_) => ErrorCode::InvalidOrder,
            TradingError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            TradingError::InsufficientShares { .. } => ErrorCode::InsufficientShares,
            TradingError::PriceUnavailable(_) => ErrorCode::PriceUnavailable,
            TradingError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            TradingError::OrderNotFound(_) => ErrorCode::OrderNotFound,
            TradingError::NotCancellable { .. } => ErrorCode::NotCancellable,
            TradingError::AccountNotFound(_) => ErrorCode::AccountNotFound,
        }
    }

    /// Rejection for an amount that does not fit in a `Decimal`.
    pub fn too_large(what: &str) -> Self {
        TradingError::InvalidOrder(format!("{} is too large", what))
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TradingError>;
