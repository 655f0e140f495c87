//! Paper Ledger - paper-trading engine for equities with FIFO lot accounting

pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

// Re-export commonly used types
pub use error::{ErrorBody, ErrorCode, TradingError};
pub use services::{PendingOrderMonitor, PriceProvider, PriceRefresher, SqliteStore, TradingService};
pub use types::*;
