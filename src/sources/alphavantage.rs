//! Alpha Vantage API client for stock quotes.
//!
//! Uses the `GLOBAL_QUOTE` function. The free tier is tightly rate limited
//! (25 requests/day, 5/minute); throttled responses come back as HTTP 200
//! with a `Note` or `Information` message instead of a quote.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use super::{FeedError, QuoteFeed};
use crate::types::MarketQuote;

pub const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";

/// Alpha Vantage global quote response.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    pub global_quote: Option<GlobalQuote>,
    /// Throttle message
    #[serde(rename = "Note")]
    pub note: Option<String>,
    /// Throttle or key message
    #[serde(rename = "Information")]
    pub information: Option<String>,
    #[serde(rename = "Error Message")]
    pub error_message: Option<String>,
}

/// Global quote data. Every field is optional because an unknown symbol
/// yields an empty object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    pub symbol: Option<String>,
    #[serde(rename = "02. open")]
    pub open: Option<String>,
    #[serde(rename = "03. high")]
    pub high: Option<String>,
    #[serde(rename = "04. low")]
    pub low: Option<String>,
    #[serde(rename = "05. price")]
    pub price: Option<String>,
    #[serde(rename = "06. volume")]
    pub volume: Option<String>,
    #[serde(rename = "07. latest trading day")]
    pub latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close")]
    pub previous_close: Option<String>,
    #[serde(rename = "09. change")]
    pub change: Option<String>,
    #[serde(rename = "10. change percent")]
    pub change_percent: Option<String>,
}

impl GlobalQuoteResponse {
    /// Convert the vendor payload into a `MarketQuote`.
    pub fn into_market_quote(self, symbol: &str) -> Result<MarketQuote, FeedError> {
        if let Some(note) = self.note.or(self.information) {
            return Err(FeedError::RateLimited(note));
        }
        if let Some(message) = self.error_message {
            return Err(FeedError::NotFound(format!("{}: {}", symbol, message)));
        }

        let quote = self.global_quote.unwrap_or_default();
        let price = match quote.price.as_deref() {
            Some(p) => parse_decimal("price", p)?,
            None => return Err(FeedError::NotFound(symbol.to_string())),
        };
        if price <= Decimal::ZERO {
            return Err(FeedError::Parse(format!("price: {}", price)));
        }

        // Missing auxiliary fields fall back to the price
        let or_price = |name: &str, value: Option<&str>| -> Result<Decimal, FeedError> {
            value.map_or(Ok(price), |v| parse_decimal(name, v))
        };

        Ok(MarketQuote {
            symbol: quote.symbol.unwrap_or_else(|| symbol.to_string()).to_uppercase(),
            price,
            open: or_price("open", quote.open.as_deref())?,
            high: or_price("high", quote.high.as_deref())?,
            low: or_price("low", quote.low.as_deref())?,
            volume: match quote.volume.as_deref() {
                Some(v) => v
                    .trim()
                    .parse()
                    .map_err(|_| FeedError::Parse(format!("volume: {}", v)))?,
                None => 0,
            },
            previous_close: or_price("previous close", quote.previous_close.as_deref())?,
            change_amount: match quote.change.as_deref() {
                Some(c) => parse_decimal("change", c)?,
                None => Decimal::ZERO,
            },
            change_percent: match quote.change_percent.as_deref() {
                Some(c) => parse_change_percent(c)?,
                None => Decimal::ZERO,
            },
            latest_trading_day: quote.latest_trading_day,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }
}

fn parse_decimal(field: &str, value: &str) -> Result<Decimal, FeedError> {
    Decimal::from_str(value.trim()).map_err(|_| FeedError::Parse(format!("{}: {}", field, value)))
}

/// Parse change percent string (e.g., "1.23%" -> 1.23).
pub fn parse_change_percent(s: &str) -> Result<Decimal, FeedError> {
    parse_decimal("change percent", s.trim().trim_end_matches('%'))
}

/// Alpha Vantage quote feed.
pub struct AlphaVantageFeed {
    client: Client,
    base_url: String,
}

impl AlphaVantageFeed {
    /// Create a new Alpha Vantage feed.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl QuoteFeed for AlphaVantageFeed {
    fn name(&self) -> &'static str {
        "alphavantage"
    }

    async fn get_quote(&self, symbol: &str, credential: &str) -> Result<MarketQuote, FeedError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", symbol),
                ("apikey", credential),
            ])
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::RateLimited(status.to_string()));
        }
        if !status.is_success() {
            return Err(FeedError::Transport(format!("API error: {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        let data: GlobalQuoteResponse = serde_json::from_str(&body).map_err(|e| {
            FeedError::Parse(format!("{} in body: {}", e, body.chars().take(120).collect::<String>()))
        })?;

        let quote = data.into_market_quote(symbol)?;
        debug!("Alpha Vantage quote for {}: {}", symbol, quote.price);
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parse(body: &str) -> Result<MarketQuote, FeedError> {
        let response: GlobalQuoteResponse = serde_json::from_str(body).unwrap();
        response.into_market_quote("aapl")
    }

    #[test]
    fn test_parses_global_quote() {
        let quote = parse(
            r#"{"Global Quote": {
                "01. symbol": "AAPL", "02. open": "189.1000", "03. high": "191.0500",
                "04. low": "188.2000", "05. price": "190.6400", "06. volume": "51234567",
                "07. latest trading day": "2024-05-10", "08. previous close": "189.8700",
                "09. change": "0.7700", "10. change percent": "0.4055%"
            }}"#,
        )
        .unwrap();

        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.price, dec!(190.64));
        assert_eq!(quote.volume, 51_234_567);
        assert_eq!(quote.change_percent, dec!(0.4055));
        assert_eq!(quote.latest_trading_day.as_deref(), Some("2024-05-10"));
    }

    #[test]
    fn test_throttle_note_is_rate_limit() {
        let err = parse(r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute"}"#)
            .unwrap_err();
        assert!(matches!(err, FeedError::RateLimited(_)));
        assert!(err.is_retryable());

        let err = parse(r#"{"Information": "We have detected your API key as daily rate limit"}"#).unwrap_err();
        assert!(matches!(err, FeedError::RateLimited(_)));
    }

    #[test]
    fn test_empty_quote_is_not_found() {
        let err = parse(r#"{"Global Quote": {}}"#).unwrap_err();
        assert_eq!(err, FeedError::NotFound("aapl".to_string()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_zero_price_is_rejected() {
        let err = parse(r#"{"Global Quote": {"01. symbol": "AAPL", "05. price": "0.0000"}}"#).unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_bad_price_is_parse_error() {
        let err = parse(r#"{"Global Quote": {"05. price": "n/a"}}"#).unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
    }
}
