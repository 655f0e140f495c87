//! Keeps the quote cache warm for every held symbol so fallback prices
//! stay recent.

use std::sync::Arc;

use tokio::time::Duration;
use tracing::{debug, warn};

use super::periodic::PeriodicTask;
use super::price_provider::PriceProvider;
use super::sqlite_store::SqliteStore;

pub struct PriceRefresher {
    store: Arc<SqliteStore>,
    prices: Arc<PriceProvider>,
    interval: Duration,
    task: PeriodicTask,
}

impl PriceRefresher {
    pub fn new(store: Arc<SqliteStore>, prices: Arc<PriceProvider>, interval: Duration) -> Self {
        Self {
            store,
            prices,
            interval,
            task: PeriodicTask::new("Price refresher"),
        }
    }

    pub fn start(self: &Arc<Self>) {
        let refresher = Arc::clone(self);
        self.task.start(self.interval, move || {
            let refresher = Arc::clone(&refresher);
            async move {
                refresher.refresh_once().await;
            }
        });
    }

    pub async fn stop(&self) {
        self.task.stop().await;
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Refresh every held symbol. Returns how many got a live quote.
    pub async fn refresh_once(&self) -> usize {
        let symbols = match self.store.read(|ledger| Ok(ledger.held_symbols()?)) {
            Ok(symbols) => symbols,
            Err(e) => {
                warn!("Price refresher could not load holdings: {}", e);
                return 0;
            }
        };

        let refreshed = self.prices.refresh_symbols(&symbols).await;
        debug!("Refreshed {}/{} held symbols", refreshed, symbols.len());
        refreshed
    }
}
