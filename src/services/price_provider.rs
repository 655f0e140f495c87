//! Price Provider
//!
//! Live-first price lookup. The live feed is tried once per credential in
//! the pool, rotating on rate limits and transport errors. Successful
//! quotes are written through to an in-memory map and the SQLite quote
//! table; when every live attempt fails the most recent cached quote is
//! served instead.

use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::credentials::RotatingCredentialPool;
use super::sqlite_store::SqliteStore;
use crate::error::TradingError;
use crate::sources::{FeedError, QuoteFeed};
use crate::types::{MarketQuote, PriceQuote, PriceSource};

/// Price provider configuration.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// Feed API keys, tried round-robin
    pub credentials: Vec<String>,
}

impl ProviderConfig {
    pub fn with_credentials<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            credentials: keys.into_iter().map(Into::into).collect(),
        }
    }
}

/// Live-first price source with write-through caching.
pub struct PriceProvider {
    feed: Arc<dyn QuoteFeed>,
    credentials: RotatingCredentialPool,
    store: Arc<SqliteStore>,
    /// Latest quote per symbol
    quotes: DashMap<String, MarketQuote>,
}

impl PriceProvider {
    pub fn new(feed: Arc<dyn QuoteFeed>, store: Arc<SqliteStore>, config: ProviderConfig) -> Self {
        if config.credentials.is_empty() {
            warn!("No {} credentials configured, serving cached prices only", feed.name());
        }
        Self {
            feed,
            credentials: RotatingCredentialPool::new(config.credentials),
            store,
            quotes: DashMap::new(),
        }
    }

    /// Current price for `symbol`, live if possible, cached otherwise.
    pub async fn get_price(&self, symbol: &str) -> Result<PriceQuote, TradingError> {
        let symbol = symbol.trim().to_uppercase();

        match self.fetch_live(&symbol).await {
            Ok(mut quote) => {
                // Cache under the requested symbol, whatever spelling the feed echoed
                quote.symbol = symbol.clone();
                self.remember(&quote);
                Ok(PriceQuote::from_market(&quote, PriceSource::Live))
            }
            Err(e) => {
                debug!("Live quote for {} failed: {}", symbol, e);
                match self.cached_quote(&symbol) {
                    Some(quote) => {
                        info!(
                            "Using cached price for {}: {} (fetched at {})",
                            symbol, quote.price, quote.timestamp
                        );
                        Ok(PriceQuote::from_market(&quote, PriceSource::Cached))
                    }
                    None => {
                        warn!("No live or cached price for {}", symbol);
                        Err(TradingError::PriceUnavailable(symbol))
                    }
                }
            }
        }
    }

    /// Most recent stored quote for `symbol`, without touching the feed.
    /// Rows with a non-positive price count as missing.
    pub fn cached_quote(&self, symbol: &str) -> Option<MarketQuote> {
        let symbol = symbol.trim().to_uppercase();
        if let Some(quote) = self.quotes.get(&symbol) {
            if quote.price > Decimal::ZERO {
                return Some(quote.clone());
            }
        }

        match self.store.cached_quote(&symbol) {
            Ok(Some(quote)) if quote.price <= Decimal::ZERO => {
                warn!("Ignoring cached quote for {} with price {}", symbol, quote.price);
                None
            }
            Ok(Some(quote)) => {
                self.quotes.insert(symbol, quote.clone());
                Some(quote)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read cached quote for {}: {}", symbol, e);
                None
            }
        }
    }

    /// Fetch every symbol and return how many were refreshed from the feed.
    pub async fn refresh_symbols(&self, symbols: &[String]) -> usize {
        let mut refreshed = 0;
        for symbol in symbols {
            match self.get_price(symbol).await {
                Ok(quote) if quote.source == PriceSource::Live => refreshed += 1,
                Ok(_) => debug!("Refresh of {} fell back to cache", symbol),
                Err(e) => warn!("Failed to refresh {}: {}", symbol, e),
            }
        }
        refreshed
    }

    async fn fetch_live(&self, symbol: &str) -> Result<MarketQuote, FeedError> {
        let mut last_error = FeedError::NoCredentials;

        for attempt in 1..=self.credentials.len() {
            let Some(key) = self.credentials.next() else {
                break;
            };
            match self.feed.get_quote(symbol, key).await {
                Ok(quote) if quote.price <= Decimal::ZERO => {
                    return Err(FeedError::Parse(format!(
                        "non-positive price {} for {}",
                        quote.price, symbol
                    )));
                }
                Ok(quote) => return Ok(quote),
                Err(e) if e.is_retryable() => {
                    warn!(
                        "{} attempt {}/{} for {} failed: {}, rotating credential",
                        self.feed.name(),
                        attempt,
                        self.credentials.len(),
                        symbol,
                        e
                    );
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    fn remember(&self, quote: &MarketQuote) {
        self.quotes.insert(quote.symbol.clone(), quote.clone());
        if let Err(e) = self.store.save_quote(quote) {
            warn!("Failed to cache quote for {}: {}", quote.symbol, e);
        }
    }
}
