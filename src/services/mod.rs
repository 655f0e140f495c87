pub mod credentials;
pub mod executor;
pub mod fifo;
pub mod order_monitor;
pub mod periodic;
pub mod pnl;
pub mod price_provider;
pub mod price_refresher;
pub mod sqlite_store;
pub mod trading;
pub mod validator;

pub use credentials::RotatingCredentialPool;
pub use executor::OrderExecutor;
pub use order_monitor::{CycleReport, MonitorConfig, PendingOrderMonitor};
pub use periodic::PeriodicTask;
pub use pnl::PnlEngine;
pub use price_provider::{PriceProvider, ProviderConfig};
pub use price_refresher::PriceRefresher;
pub use sqlite_store::{Ledger, SqliteStore};
pub use trading::TradingService;
pub use validator::validate_order;
