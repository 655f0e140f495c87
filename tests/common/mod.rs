//! Shared fixtures: an in-memory ledger wired to a hand-driven quote feed.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use paper_ledger::services::{PriceProvider, ProviderConfig, SqliteStore, TradingService};
use paper_ledger::sources::{FeedError, QuoteFeed};
use paper_ledger::types::MarketQuote;
use rust_decimal::Decimal;

pub const USER: &str = "default_user";

/// Quote feed whose prices are set by the test.
#[derive(Default)]
pub struct ManualFeed {
    prices: DashMap<String, Decimal>,
    failure: Mutex<Option<FeedError>>,
    calls: AtomicUsize,
}

impl ManualFeed {
    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.insert(symbol.to_string(), price);
    }

    pub fn clear_price(&self, symbol: &str) {
        self.prices.remove(symbol);
    }

    /// Make every call fail with `error` until reset with `None`.
    pub fn fail_with(&self, error: Option<FeedError>) {
        *self.failure.lock().unwrap() = error;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteFeed for ManualFeed {
    fn name(&self) -> &'static str {
        "manual"
    }

    async fn get_quote(&self, symbol: &str, _credential: &str) -> Result<MarketQuote, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.prices
            .get(symbol)
            .map(|p| MarketQuote::from_price(symbol, *p))
            .ok_or_else(|| FeedError::NotFound(symbol.to_string()))
    }
}

pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub feed: Arc<ManualFeed>,
    pub prices: Arc<PriceProvider>,
    pub trading: TradingService,
}

/// Fresh ledger with the default user funded with `cash`.
pub fn harness(cash: Decimal) -> Harness {
    let store = Arc::new(SqliteStore::new_in_memory().unwrap());
    let feed = Arc::new(ManualFeed::default());
    let prices = Arc::new(PriceProvider::new(
        feed.clone(),
        store.clone(),
        ProviderConfig::with_credentials(["test-key"]),
    ));
    let trading = TradingService::new(store.clone(), prices.clone());
    trading.open_account(USER, cash).unwrap();

    Harness {
        store,
        feed,
        prices,
        trading,
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
