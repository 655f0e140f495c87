//! P&L Engine
//!
//! Realized P&L comes from SELL trades in the ledger; unrealized P&L from
//! current holdings marked at the provider's price. A holding with no
//! price at all is marked at its own average cost.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use super::price_provider::PriceProvider;
use super::sqlite_store::SqliteStore;
use crate::error::TradingError;
use crate::types::{
    percent_of, round_money, Holding, HoldingPnl, OrderSide, PerformanceSummary, PnlReport,
    PnlTotals, PortfolioSummary, PortfolioTotals, PriceSource, RealizedPnl, RealizedTrade, Trade,
    UnrealizedPnl,
};

const DAY_MS: i64 = 86_400_000;

pub struct PnlEngine {
    store: Arc<SqliteStore>,
    prices: Arc<PriceProvider>,
}

impl PnlEngine {
    pub fn new(store: Arc<SqliteStore>, prices: Arc<PriceProvider>) -> Self {
        Self { store, prices }
    }

    /// Unrealized P&L over current holdings (optionally one symbol).
    pub async fn unrealized(&self, user_id: &str, symbol: Option<&str>) -> Result<UnrealizedPnl, TradingError> {
        let symbol = symbol.map(|s| s.trim().to_uppercase());
        let holdings = self.store.holdings(user_id, symbol.as_deref())?;

        let mut marked = Vec::with_capacity(holdings.len());
        for holding in &holdings {
            let price = match self.prices.get_price(&holding.symbol).await {
                Ok(quote) => Some((quote.price, quote.source)),
                Err(e) => {
                    warn!("Marking {} at average cost: {}", holding.symbol, e);
                    None
                }
            };
            marked.push(holding_pnl(holding, price));
        }

        Ok(aggregate_unrealized(marked))
    }

    /// Realized P&L from sells in the last `days` days.
    pub fn realized(&self, user_id: &str, symbol: Option<&str>, days: u32) -> Result<RealizedPnl, TradingError> {
        let symbol = symbol.map(|s| s.trim().to_uppercase());
        let since = window_start(days);
        let sells = self.store.read(|ledger| {
            Ok(ledger.trades_since(user_id, symbol.as_deref(), Some(OrderSide::Sell), since)?)
        })?;
        Ok(summarize_realized(&sells, days))
    }

    /// Realized plus unrealized.
    pub async fn report(&self, user_id: &str, symbol: Option<&str>, days: u32) -> Result<PnlReport, TradingError> {
        let realized = self.realized(user_id, symbol, days)?;
        let unrealized = self.unrealized(user_id, symbol).await?;

        Ok(PnlReport {
            summary: PnlTotals {
                total_pnl: realized.total_realized_pnl + unrealized.unrealized_pnl,
                realized_pnl: realized.total_realized_pnl,
                unrealized_pnl: unrealized.unrealized_pnl,
                total_market_value: unrealized.total_market_value,
                total_cost_basis: unrealized.total_cost_basis,
            },
            realized,
            unrealized,
            period_days: days,
            generated_at: chrono::Utc::now().timestamp_millis(),
        })
    }

    /// Holdings marked to market with cash and all-time realized P&L.
    pub async fn portfolio_summary(
        &self,
        user_id: &str,
        symbol: Option<&str>,
    ) -> Result<PortfolioSummary, TradingError> {
        let unrealized = self.unrealized(user_id, symbol).await?;

        let symbol = symbol.map(|s| s.trim().to_uppercase());
        let (cash_balance, sells) = self.store.read(|ledger| {
            let cash = ledger
                .cash_account(user_id)?
                .map(|a| a.balance)
                .unwrap_or(Decimal::ZERO);
            let sells = ledger.trades_since(user_id, symbol.as_deref(), Some(OrderSide::Sell), 0)?;
            Ok((cash, sells))
        })?;
        let total_realized_pnl: Decimal = sells.iter().filter_map(|t| t.realized_pnl).sum();

        Ok(PortfolioSummary {
            totals: PortfolioTotals {
                cash_balance,
                total_market_value: unrealized.total_market_value,
                total_cost_basis: unrealized.total_cost_basis,
                total_unrealized_pnl: unrealized.unrealized_pnl,
                total_realized_pnl,
                total_pnl: unrealized.unrealized_pnl + total_realized_pnl,
                unrealized_pnl_percent: unrealized.unrealized_pnl_percent,
                total_equity: cash_balance + unrealized.total_market_value,
                holdings_count: unrealized.holdings.len(),
            },
            holdings: unrealized.holdings,
        })
    }

    /// Buy/sell volume and realized P&L over the last `days` days.
    pub fn performance(&self, user_id: &str, days: u32) -> Result<PerformanceSummary, TradingError> {
        let since = window_start(days);
        let trades = self
            .store
            .read(|ledger| Ok(ledger.trades_since(user_id, None, None, since)?))?;

        let mut summary = PerformanceSummary {
            period_days: days,
            ..Default::default()
        };
        for trade in &trades {
            match trade.side {
                OrderSide::Buy => {
                    summary.buy_volume += trade.notional();
                    summary.buy_trades += 1;
                }
                OrderSide::Sell => {
                    summary.sell_volume += trade.notional();
                    summary.sell_trades += 1;
                    summary.realized_pnl += trade.realized_pnl.unwrap_or(Decimal::ZERO);
                }
            }
        }
        Ok(summary)
    }
}

fn window_start(days: u32) -> i64 {
    chrono::Utc::now().timestamp_millis() - i64::from(days) * DAY_MS
}

/// Mark one holding. `None` price means average cost stands in.
pub fn holding_pnl(holding: &Holding, price: Option<(Decimal, PriceSource)>) -> HoldingPnl {
    let (current_price, price_source) = match price {
        Some((p, source)) => (p, Some(source)),
        None => (holding.average_cost, None),
    };
    let quantity = Decimal::from(holding.quantity);
    let cost_basis = round_money(holding.average_cost * quantity);
    let unrealized_pnl = round_money((current_price - holding.average_cost) * quantity);

    HoldingPnl {
        symbol: holding.symbol.clone(),
        quantity: holding.quantity,
        average_cost: holding.average_cost,
        current_price,
        price_source,
        cost_basis,
        market_value: round_money(current_price * quantity),
        unrealized_pnl,
        unrealized_pnl_percent: percent_of(unrealized_pnl, cost_basis),
    }
}

fn aggregate_unrealized(holdings: Vec<HoldingPnl>) -> UnrealizedPnl {
    let unrealized_pnl: Decimal = holdings.iter().map(|h| h.unrealized_pnl).sum();
    let total_market_value: Decimal = holdings.iter().map(|h| h.market_value).sum();
    let total_cost_basis: Decimal = holdings.iter().map(|h| h.cost_basis).sum();

    UnrealizedPnl {
        unrealized_pnl,
        total_market_value,
        total_cost_basis,
        unrealized_pnl_percent: percent_of(unrealized_pnl, total_cost_basis),
        holdings,
    }
}

/// Win/loss statistics over a set of SELL trades.
pub fn summarize_realized(sells: &[Trade], days: u32) -> RealizedPnl {
    let mut summary = RealizedPnl {
        period_days: days,
        ..Default::default()
    };
    let mut total_wins = Decimal::ZERO;
    let mut total_losses = Decimal::ZERO;

    for trade in sells {
        let Some(pnl) = trade.realized_pnl else {
            continue;
        };
        summary.total_realized_pnl += pnl;
        summary.trades_count += 1;
        if pnl > Decimal::ZERO {
            summary.winning_trades += 1;
            total_wins += pnl;
        } else if pnl < Decimal::ZERO {
            summary.losing_trades += 1;
            total_losses += pnl;
        }
        summary.trades.push(RealizedTrade {
            trade_id: trade.id,
            symbol: trade.symbol.clone(),
            quantity: trade.quantity,
            price: trade.price,
            realized_pnl: pnl,
            executed_at: trade.executed_at,
        });
    }

    let count = Decimal::from(summary.trades_count as u64);
    summary.win_rate = percent_of(Decimal::from(summary.winning_trades as u64), count);
    summary.loss_rate = percent_of(Decimal::from(summary.losing_trades as u64), count);
    if summary.winning_trades > 0 {
        summary.average_win = round_money(total_wins / Decimal::from(summary.winning_trades as u64));
    }
    if summary.losing_trades > 0 {
        summary.average_loss = round_money(total_losses / Decimal::from(summary.losing_trades as u64));
    }
    summary
}
