//! Trading Types
//!
//! Types for the paper ledger: orders, trades (buy-lots), holdings, cash
//! accounts and the structured results handed back to the request layer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorBody, TradingError};

// =============================================================================
// Enums
// =============================================================================

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BUY" => Some(OrderSide::Buy),
            "SELL" => Some(OrderSide::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type as requested at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Execute immediately at the current price
    Market,
    /// Execute at the limit price or better
    Limit,
    /// Execute once price crosses the stop price
    Stop,
    /// Stop trigger combined with a limit check
    StopLimit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::Stop => "STOP",
            OrderType::StopLimit => "STOP_LIMIT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MARKET" => Some(OrderType::Market),
            "LIMIT" => Some(OrderType::Limit),
            "STOP" => Some(OrderType::Stop),
            "STOP_LIMIT" => Some(OrderType::StopLimit),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Waiting for its trigger condition
    Pending,
    /// Completely filled
    Filled,
    /// Cancelled by the owner
    Cancelled,
    /// Passed its expiry before triggering
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "FILLED" => Some(OrderStatus::Filled),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "EXPIRED" => Some(OrderStatus::Expired),
            _ => None,
        }
    }

    /// Check if the status is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order Types
// =============================================================================

/// Type-specific order parameters. Each variant carries only the prices it
/// needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Market,
    Limit { limit_price: Decimal },
    Stop { stop_price: Decimal },
    StopLimit { stop_price: Decimal, limit_price: Decimal },
}

impl OrderKind {
    pub fn order_type(&self) -> OrderType {
        match self {
            OrderKind::Market => OrderType::Market,
            OrderKind::Limit { .. } => OrderType::Limit,
            OrderKind::Stop { .. } => OrderType::Stop,
            OrderKind::StopLimit { .. } => OrderType::StopLimit,
        }
    }

    pub fn limit_price(&self) -> Option<Decimal> {
        match self {
            OrderKind::Limit { limit_price } | OrderKind::StopLimit { limit_price, .. } => {
                Some(*limit_price)
            }
            _ => None,
        }
    }

    pub fn stop_price(&self) -> Option<Decimal> {
        match self {
            OrderKind::Stop { stop_price } | OrderKind::StopLimit { stop_price, .. } => {
                Some(*stop_price)
            }
            _ => None,
        }
    }

    /// Rebuild the variant from its stored columns.
    pub fn from_parts(
        order_type: OrderType,
        limit_price: Option<Decimal>,
        stop_price: Option<Decimal>,
    ) -> Option<Self> {
        match (order_type, limit_price, stop_price) {
            (OrderType::Market, _, _) => Some(OrderKind::Market),
            (OrderType::Limit, Some(limit_price), _) => Some(OrderKind::Limit { limit_price }),
            (OrderType::Stop, _, Some(stop_price)) => Some(OrderKind::Stop { stop_price }),
            (OrderType::StopLimit, Some(limit_price), Some(stop_price)) => {
                Some(OrderKind::StopLimit { stop_price, limit_price })
            }
            _ => None,
        }
    }

    /// Whether the order triggers at the observed price.
    ///
    /// STOP_LIMIT checks its stop and limit conditions against the same
    /// observation; no intermediate "stop triggered" state is kept.
    pub fn is_triggered(&self, side: OrderSide, current_price: Decimal) -> bool {
        match (self, side) {
            (OrderKind::Market, _) => true,
            (OrderKind::Limit { limit_price }, OrderSide::Buy) => current_price <= *limit_price,
            (OrderKind::Limit { limit_price }, OrderSide::Sell) => current_price >= *limit_price,
            (OrderKind::Stop { stop_price }, OrderSide::Buy) => current_price >= *stop_price,
            (OrderKind::Stop { stop_price }, OrderSide::Sell) => current_price <= *stop_price,
            (OrderKind::StopLimit { stop_price, limit_price }, OrderSide::Buy) => {
                current_price >= *stop_price && current_price <= *limit_price
            }
            (OrderKind::StopLimit { stop_price, limit_price }, OrderSide::Sell) => {
                current_price <= *stop_price && current_price >= *limit_price
            }
        }
    }
}

/// Raw order request as received from the request layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSpec {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    pub symbol: String,
    pub side: OrderSide,
    #[serde(default = "default_order_type")]
    pub order_type: OrderType,
    pub quantity: i64,
    /// Limit price for LIMIT orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<Decimal>,
    /// Limit price for STOP_LIMIT orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<Decimal>,
    /// Expiry for conditional orders (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

pub const DEFAULT_USER_ID: &str = "default_user";

fn default_user_id() -> String {
    DEFAULT_USER_ID.to_string()
}

fn default_order_type() -> OrderType {
    OrderType::Market
}

impl OrderSpec {
    /// Create a market order request.
    pub fn market(user_id: &str, symbol: &str, side: OrderSide, quantity: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            stop_price: None,
            limit_price: None,
            expires_at: None,
        }
    }

    /// Create a limit order request.
    pub fn limit(user_id: &str, symbol: &str, side: OrderSide, quantity: i64, price: Decimal) -> Self {
        let mut spec = Self::market(user_id, symbol, side, quantity);
        spec.order_type = OrderType::Limit;
        spec.price = Some(price);
        spec
    }

    /// Create a stop order request.
    pub fn stop(user_id: &str, symbol: &str, side: OrderSide, quantity: i64, stop_price: Decimal) -> Self {
        let mut spec = Self::market(user_id, symbol, side, quantity);
        spec.order_type = OrderType::Stop;
        spec.stop_price = Some(stop_price);
        spec
    }

    /// Create a stop-limit order request.
    pub fn stop_limit(
        user_id: &str,
        symbol: &str,
        side: OrderSide,
        quantity: i64,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Self {
        let mut spec = Self::market(user_id, symbol, side, quantity);
        spec.order_type = OrderType::StopLimit;
        spec.stop_price = Some(stop_price);
        spec.limit_price = Some(limit_price);
        spec
    }

    pub fn with_expiry(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// An order that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOrder {
    pub user_id: String,
    /// Canonical uppercase symbol
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: i64,
    pub kind: OrderKind,
    pub expires_at: Option<i64>,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub quantity: i64,
    pub status: OrderStatus,
    /// When order was created (ms)
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Order {
    /// Create a new pending order from a validated request.
    pub fn pending(validated: ValidatedOrder) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: validated.user_id,
            symbol: validated.symbol,
            side: validated.side,
            kind: validated.kind,
            quantity: validated.quantity,
            status: OrderStatus::Pending,
            created_at: chrono::Utc::now().timestamp_millis(),
            filled_at: None,
            filled_price: None,
            expires_at: validated.expires_at,
        }
    }

    pub fn order_type(&self) -> OrderType {
        self.kind.order_type()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn can_cancel(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Whether the order's expiry has passed at `now` (ms).
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

// =============================================================================
// Ledger Types
// =============================================================================

/// An immutable trade record. A BUY trade is also a lot whose
/// `remaining_quantity` shrinks as later sells consume it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub user_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: i64,
    /// Unconsumed shares (BUY only; always 0 for SELL)
    pub remaining_quantity: i64,
    /// Realized P&L (SELL only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<Decimal>,
    /// When trade was executed (ms)
    pub executed_at: i64,
}

impl Trade {
    /// Total value of the trade (price * quantity).
    pub fn notional(&self) -> Decimal {
        super::round_money(self.price * Decimal::from(self.quantity))
    }
}

/// A buy-lot as seen by the FIFO accountant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lot {
    pub trade_id: i64,
    pub price: Decimal,
    pub quantity: i64,
    pub remaining_quantity: i64,
    pub executed_at: i64,
}

/// Shares taken from one lot by a sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumedLot {
    pub trade_id: i64,
    pub quantity: i64,
    pub price: Decimal,
}

/// Result of consuming lots for a sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consumption {
    pub realized_pnl: Decimal,
    pub cost_basis: Decimal,
    pub consumed_lots: Vec<ConsumedLot>,
    /// Quantity still held after the sell
    pub remaining_quantity: i64,
    /// Weighted average over the remaining lots (0 when none remain)
    pub new_average_cost: Decimal,
}

/// Aggregate position in one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub user_id: String,
    pub symbol: String,
    pub quantity: i64,
    pub average_cost: Decimal,
    pub updated_at: i64,
}

impl Holding {
    pub fn cost_basis(&self) -> Decimal {
        super::round_money(self.average_cost * Decimal::from(self.quantity))
    }
}

/// Cash account for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashAccount {
    pub user_id: String,
    pub balance: Decimal,
    pub updated_at: i64,
}

// =============================================================================
// Results
// =============================================================================

/// Outcome of a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    pub order_id: String,
    pub trade_id: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: i64,
    pub price: Decimal,
    /// Cash debited (BUY) or credited (SELL)
    pub cash_delta: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<Decimal>,
    pub cash_balance: Decimal,
    pub filled_at: i64,
}

/// Result of placing an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filled_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl OrderResult {
    pub fn filled(fill: &Fill) -> Self {
        Self {
            success: true,
            order_id: Some(fill.order_id.clone()),
            status: Some(OrderStatus::Filled),
            message: format!(
                "Market {} order filled: {} shares of {} at ${}",
                fill.side.as_str().to_lowercase(),
                fill.quantity,
                fill.symbol,
                fill.price
            ),
            filled_price: Some(fill.price),
            realized_pnl: fill.realized_pnl,
            error: None,
        }
    }

    pub fn accepted(order: &Order) -> Self {
        Self {
            success: true,
            order_id: Some(order.id.clone()),
            status: Some(order.status),
            message: format!(
                "{} {} order for {} shares of {} accepted",
                order.order_type(),
                order.side,
                order.quantity,
                order.symbol
            ),
            filled_price: None,
            realized_pnl: None,
            error: None,
        }
    }

    pub fn rejected(error: &TradingError) -> Self {
        Self {
            success: false,
            order_id: None,
            status: None,
            message: error.to_string(),
            filled_price: None,
            realized_pnl: None,
            error: Some(error.to_body()),
        }
    }
}

/// Result of cancelling an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl CancelResult {
    pub fn cancelled(order_id: &str) -> Self {
        Self {
            success: true,
            message: format!("Order {} cancelled", order_id),
            error: None,
        }
    }

    pub fn rejected(error: &TradingError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            error: Some(error.to_body()),
        }
    }
}
