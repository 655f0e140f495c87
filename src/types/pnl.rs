//! P&L report types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PriceSource;

/// Unrealized P&L for one holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingPnl {
    pub symbol: String,
    pub quantity: i64,
    pub average_cost: Decimal,
    pub current_price: Decimal,
    /// None when no price was available and average cost stood in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_source: Option<PriceSource>,
    pub cost_basis: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnrealizedPnl {
    pub unrealized_pnl: Decimal,
    pub total_market_value: Decimal,
    pub total_cost_basis: Decimal,
    pub unrealized_pnl_percent: Decimal,
    pub holdings: Vec<HoldingPnl>,
}

/// One closed sell inside the report window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedTrade {
    pub trade_id: i64,
    pub symbol: String,
    pub quantity: i64,
    pub price: Decimal,
    pub realized_pnl: Decimal,
    pub executed_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizedPnl {
    pub total_realized_pnl: Decimal,
    pub trades_count: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: Decimal,
    pub loss_rate: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub period_days: u32,
    pub trades: Vec<RealizedTrade>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlTotals {
    pub total_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_market_value: Decimal,
    pub total_cost_basis: Decimal,
}

/// Realized + unrealized report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlReport {
    pub summary: PnlTotals,
    pub realized: RealizedPnl,
    pub unrealized: UnrealizedPnl,
    pub period_days: u32,
    pub generated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioTotals {
    pub cash_balance: Decimal,
    pub total_market_value: Decimal,
    pub total_cost_basis: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub total_realized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub unrealized_pnl_percent: Decimal,
    /// Cash plus market value
    pub total_equity: Decimal,
    pub holdings_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub holdings: Vec<HoldingPnl>,
    pub totals: PortfolioTotals,
}

/// Trading activity over a period.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub period_days: u32,
    pub buy_volume: Decimal,
    pub sell_volume: Decimal,
    pub buy_trades: usize,
    pub sell_trades: usize,
    pub realized_pnl: Decimal,
}
