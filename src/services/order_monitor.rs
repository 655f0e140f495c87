//! Pending Order Monitor
//!
//! Periodically sweeps PENDING orders: expires the ones past their
//! deadline, then checks each remaining order's trigger against the
//! current price and fills it at that observed price. One order failing
//! never stops the rest of the cycle.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::Duration;
use tracing::{debug, info, warn};

use super::executor::OrderExecutor;
use super::periodic::PeriodicTask;
use super::price_provider::PriceProvider;
use super::sqlite_store::SqliteStore;
use crate::types::Order;

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between sweeps
    pub interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// What one sweep did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub expired: usize,
    pub evaluated: usize,
    /// Orders skipped because no price could be found
    pub unpriced: usize,
    pub triggered: usize,
    pub filled: usize,
    /// Triggered orders whose settlement failed (left PENDING)
    pub failed: usize,
}

pub struct PendingOrderMonitor {
    store: Arc<SqliteStore>,
    prices: Arc<PriceProvider>,
    executor: Arc<OrderExecutor>,
    config: MonitorConfig,
    task: PeriodicTask,
}

impl PendingOrderMonitor {
    pub fn new(
        store: Arc<SqliteStore>,
        prices: Arc<PriceProvider>,
        executor: Arc<OrderExecutor>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            prices,
            executor,
            config,
            task: PeriodicTask::new("Pending order monitor"),
        }
    }

    /// Start sweeping on the configured interval.
    pub fn start(self: &Arc<Self>) {
        let monitor = Arc::clone(self);
        self.task.start(self.config.interval, move || {
            let monitor = Arc::clone(&monitor);
            async move {
                monitor.run_cycle().await;
            }
        });
    }

    /// Stop sweeping; waits for an in-flight cycle to finish.
    pub async fn stop(&self) {
        self.task.stop().await;
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Run one sweep over all PENDING orders, oldest first.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let pending = match self.store.read(|ledger| Ok(ledger.pending_orders(None, None)?)) {
            Ok(orders) => orders,
            Err(e) => {
                warn!("Pending order monitor could not load orders: {}", e);
                return report;
            }
        };
        if pending.is_empty() {
            return report;
        }

        let now = chrono::Utc::now().timestamp_millis();
        let (expired, live): (Vec<Order>, Vec<Order>) =
            pending.into_iter().partition(|o| o.is_expired_at(now));

        for order in &expired {
            match self.executor.expire(&order.id) {
                Ok(true) => report.expired += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to expire order {}: {}", order.id, e),
            }
        }

        // One price lookup per symbol per cycle
        let mut observed: HashMap<String, Option<Decimal>> = HashMap::new();

        for order in &live {
            report.evaluated += 1;

            let price = match observed.get(&order.symbol) {
                Some(price) => *price,
                None => {
                    let price = match self.prices.get_price(&order.symbol).await {
                        Ok(quote) => Some(quote.price),
                        Err(e) => {
                            warn!("Skipping {} orders this cycle: {}", order.symbol, e);
                            None
                        }
                    };
                    observed.insert(order.symbol.clone(), price);
                    price
                }
            };
            let Some(price) = price else {
                report.unpriced += 1;
                continue;
            };

            if !order.kind.is_triggered(order.side, price) {
                debug!(
                    "Order {} not triggered: {} {} @ {}",
                    order.id,
                    order.order_type(),
                    order.symbol,
                    price
                );
                continue;
            }

            report.triggered += 1;
            match self.executor.fill_pending(order, price) {
                Ok(_) => report.filled += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("Triggered order {} left PENDING: {}", order.id, e);
                }
            }
        }

        if report.expired > 0 || report.triggered > 0 {
            info!(
                "Monitor cycle: {} evaluated, {} triggered, {} filled, {} failed, {} expired",
                report.evaluated, report.triggered, report.filled, report.failed, report.expired
            );
        } else {
            debug!("Monitor cycle: {} evaluated, nothing triggered", report.evaluated);
        }
        report
    }
}
