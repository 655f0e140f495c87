use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    /// Fresh quote from the market feed
    Live,
    /// Most recent cached quote, used when the feed failed
    Cached,
}

impl fmt::Display for PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceSource::Live => write!(f, "live"),
            PriceSource::Cached => write!(f, "cached"),
        }
    }
}

/// Full market quote as delivered by a feed adapter and stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketQuote {
    pub symbol: String,
    pub price: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: i64,
    pub previous_close: Decimal,
    pub change_amount: Decimal,
    /// Percent change, without the trailing `%`
    pub change_percent: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_trading_day: Option<String>,
    /// When the quote was fetched (ms)
    pub timestamp: i64,
}

impl MarketQuote {
    /// Quote carrying only a price; the other fields mirror it.
    pub fn from_price(symbol: &str, price: Decimal) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            price,
            open: price,
            high: price,
            low: price,
            volume: 0,
            previous_close: price,
            change_amount: Decimal::ZERO,
            change_percent: Decimal::ZERO,
            latest_trading_day: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Canonical price used by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub symbol: String,
    pub price: Decimal,
    /// Quote time (ms)
    pub timestamp: i64,
    pub source: PriceSource,
}

impl PriceQuote {
    pub fn from_market(quote: &MarketQuote, source: PriceSource) -> Self {
        Self {
            symbol: quote.symbol.clone(),
            price: quote.price,
            timestamp: quote.timestamp,
            source,
        }
    }
}
