//! Trading Service
//!
//! Entry point for the request layer:
//! - Order placement and cancellation
//! - Pending order queries
//! - Cash account management
//! - Portfolio, P&L and trade history reports
//!
//! Order operations return structured results instead of errors so the
//! caller can map them onto its own transport.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::executor::OrderExecutor;
use super::order_monitor::{MonitorConfig, PendingOrderMonitor};
use super::pnl::PnlEngine;
use super::price_provider::PriceProvider;
use super::sqlite_store::SqliteStore;
use super::validator::validate_order;
use crate::error::TradingError;
use crate::types::{
    round_money, CancelResult, CashAccount, Order, OrderKind, OrderResult, OrderSpec,
    PerformanceSummary, PnlReport, PortfolioSummary, Trade,
};

/// Paper trading service.
pub struct TradingService {
    store: Arc<SqliteStore>,
    prices: Arc<PriceProvider>,
    executor: Arc<OrderExecutor>,
    pnl: PnlEngine,
}

impl TradingService {
    pub fn new(store: Arc<SqliteStore>, prices: Arc<PriceProvider>) -> Self {
        Self {
            executor: Arc::new(OrderExecutor::new(store.clone(), prices.clone())),
            pnl: PnlEngine::new(store.clone(), prices.clone()),
            store,
            prices,
        }
    }

    pub fn prices(&self) -> Arc<PriceProvider> {
        self.prices.clone()
    }

    /// Build a monitor that fills this service's pending orders.
    pub fn order_monitor(&self, config: MonitorConfig) -> Arc<PendingOrderMonitor> {
        Arc::new(PendingOrderMonitor::new(
            self.store.clone(),
            self.prices.clone(),
            self.executor.clone(),
            config,
        ))
    }

    // ========== Orders ==========

    /// Validate and place an order. MARKET orders settle immediately;
    /// everything else is stored as PENDING for the monitor.
    pub async fn place_order(&self, spec: OrderSpec) -> OrderResult {
        let now = chrono::Utc::now().timestamp_millis();
        let order = match validate_order(&spec, now) {
            Ok(order) => order,
            Err(e) => {
                debug!("Rejected order for {}: {}", spec.symbol, e);
                return OrderResult::rejected(&e);
            }
        };

        if order.kind == OrderKind::Market {
            match self.executor.execute_market(order).await {
                Ok(fill) => OrderResult::filled(&fill),
                Err(e) => {
                    warn!("Market {} {} failed: {}", spec.side, spec.symbol, e);
                    OrderResult::rejected(&e)
                }
            }
        } else {
            match self.executor.submit(order) {
                Ok(pending) => OrderResult::accepted(&pending),
                Err(e) => {
                    warn!("Could not store {} order: {}", spec.order_type, e);
                    OrderResult::rejected(&e)
                }
            }
        }
    }

    /// Cancel a PENDING order.
    pub fn cancel_order(&self, order_id: &str) -> CancelResult {
        match self.executor.cancel(order_id) {
            Ok(()) => CancelResult::cancelled(order_id),
            Err(e) => {
                debug!("Cancel of {} rejected: {}", order_id, e);
                CancelResult::rejected(&e)
            }
        }
    }

    /// PENDING orders for a user, oldest first.
    pub fn list_pending_orders(&self, user_id: &str, symbol: Option<&str>) -> Result<Vec<Order>, TradingError> {
        let symbol = symbol.map(|s| s.trim().to_uppercase());
        self.store
            .read(|ledger| Ok(ledger.pending_orders(Some(user_id), symbol.as_deref())?))
    }

    pub fn get_order(&self, order_id: &str) -> Result<Order, TradingError> {
        self.store
            .get_order(order_id)?
            .ok_or_else(|| TradingError::OrderNotFound(order_id.to_string()))
    }

    // ========== Cash ==========

    /// Create the user's cash account if it does not exist yet. An existing
    /// balance is left as is.
    pub fn open_account(&self, user_id: &str, initial_balance: Decimal) -> Result<CashAccount, TradingError> {
        if initial_balance < Decimal::ZERO {
            return Err(TradingError::InvalidOrder(
                "initial balance cannot be negative".to_string(),
            ));
        }
        let initial_balance = round_money(initial_balance);

        let account = self.store.transaction(|ledger| {
            if ledger.create_cash_account(user_id, initial_balance)? {
                info!("Opened cash account for {} with ${}", user_id, initial_balance);
            }
            ledger
                .cash_account(user_id)?
                .ok_or_else(|| TradingError::AccountNotFound(user_id.to_string()))
        })?;
        Ok(account)
    }

    pub fn cash_balance(&self, user_id: &str) -> Result<CashAccount, TradingError> {
        self.store
            .cash_account(user_id)?
            .ok_or_else(|| TradingError::AccountNotFound(user_id.to_string()))
    }

    pub fn deposit_cash(&self, user_id: &str, amount: Decimal) -> Result<CashAccount, TradingError> {
        let amount = positive_amount(amount)?;
        let account = self.adjust_cash(user_id, |balance| {
            balance
                .checked_add(amount)
                .ok_or_else(|| TradingError::too_large("cash balance"))
        })?;
        info!("Deposited ${} for {}, balance ${}", amount, user_id, account.balance);
        Ok(account)
    }

    pub fn withdraw_cash(&self, user_id: &str, amount: Decimal) -> Result<CashAccount, TradingError> {
        let amount = positive_amount(amount)?;
        let account = self.adjust_cash(user_id, |balance| {
            if amount > balance {
                Err(TradingError::InsufficientFunds {
                    needed: amount,
                    available: balance,
                })
            } else {
                Ok(balance - amount)
            }
        })?;
        info!("Withdrew ${} for {}, balance ${}", amount, user_id, account.balance);
        Ok(account)
    }

    fn adjust_cash<F>(&self, user_id: &str, apply: F) -> Result<CashAccount, TradingError>
    where
        F: FnOnce(Decimal) -> Result<Decimal, TradingError>,
    {
        self.store.transaction(|ledger| {
            let account = ledger
                .cash_account(user_id)?
                .ok_or_else(|| TradingError::AccountNotFound(user_id.to_string()))?;
            let balance = apply(account.balance)?;
            ledger.set_cash_balance(user_id, balance)?;
            ledger
                .cash_account(user_id)?
                .ok_or_else(|| TradingError::AccountNotFound(user_id.to_string()))
        })
    }

    // ========== Reports ==========

    pub async fn portfolio_summary(&self, user_id: &str, symbol: Option<&str>) -> Result<PortfolioSummary, TradingError> {
        self.pnl.portfolio_summary(user_id, symbol).await
    }

    pub async fn pnl_report(&self, user_id: &str, symbol: Option<&str>, days: u32) -> Result<PnlReport, TradingError> {
        self.pnl.report(user_id, symbol, days).await
    }

    /// Most recent trades first.
    pub fn trade_history(&self, user_id: &str, symbol: Option<&str>, limit: usize) -> Result<Vec<Trade>, TradingError> {
        let symbol = symbol.map(|s| s.trim().to_uppercase());
        self.store.trades(user_id, symbol.as_deref(), limit)
    }

    pub fn portfolio_performance(&self, user_id: &str, days: u32) -> Result<PerformanceSummary, TradingError> {
        self.pnl.performance(user_id, days)
    }
}

fn positive_amount(amount: Decimal) -> Result<Decimal, TradingError> {
    let amount = round_money(amount);
    if amount <= Decimal::ZERO {
        return Err(TradingError::InvalidOrder(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(amount)
}
