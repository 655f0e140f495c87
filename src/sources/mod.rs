//! Market-quote feed adapters.

pub mod alphavantage;

pub use alphavantage::AlphaVantageFeed;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::MarketQuote;

/// Quote feed errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Rate limit reached: {0}")]
    RateLimited(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Symbol not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No credentials configured")]
    NoCredentials,
}

impl FeedError {
    /// Whether retrying with another credential may help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::RateLimited(_) | FeedError::Transport(_))
    }
}

/// A live market-quote source. The credential is chosen by the caller.
#[async_trait]
pub trait QuoteFeed: Send + Sync {
    /// Feed name for logging.
    fn name(&self) -> &'static str;

    /// Fetch the current quote for `symbol` using `credential`.
    async fn get_quote(&self, symbol: &str, credential: &str) -> Result<MarketQuote, FeedError>;
}
