//! Order validation.
//!
//! Turns a loosely-typed `OrderSpec` into a `ValidatedOrder` whose `kind`
//! carries exactly the prices its type needs. Nothing here touches the
//! store.

use rust_decimal::Decimal;

use crate::error::TradingError;
use crate::types::{OrderKind, OrderSpec, OrderType, ValidatedOrder};

const MAX_SYMBOL_LEN: usize = 12;

/// Validate an order request against the clock `now` (ms).
pub fn validate_order(spec: &OrderSpec, now: i64) -> Result<ValidatedOrder, TradingError> {
    let user_id = spec.user_id.trim();
    if user_id.is_empty() {
        return Err(invalid("user id is required"));
    }

    let symbol = canonical_symbol(&spec.symbol)?;

    if spec.quantity <= 0 {
        return Err(invalid("quantity must be a positive integer"));
    }

    let kind = match spec.order_type {
        OrderType::Market => OrderKind::Market,
        OrderType::Limit => OrderKind::Limit {
            limit_price: positive(spec.price, "LIMIT orders require price > 0")?,
        },
        OrderType::Stop => OrderKind::Stop {
            stop_price: positive(spec.stop_price, "STOP orders require stop_price > 0")?,
        },
        OrderType::StopLimit => OrderKind::StopLimit {
            stop_price: positive(spec.stop_price, "STOP_LIMIT orders require stop_price > 0")?,
            limit_price: positive(spec.limit_price, "STOP_LIMIT orders require limit_price > 0")?,
        },
    };

    let expires_at = match spec.expires_at {
        Some(_) if kind == OrderKind::Market => {
            return Err(invalid("expires_at only applies to conditional orders"))
        }
        Some(at) if at <= now => return Err(invalid("expires_at must be in the future")),
        other => other,
    };

    Ok(ValidatedOrder {
        user_id: user_id.to_string(),
        symbol,
        side: spec.side,
        quantity: spec.quantity,
        kind,
        expires_at,
    })
}

/// Uppercase, trimmed ticker. Letters, digits, `.` and `-` only.
pub fn canonical_symbol(raw: &str) -> Result<String, TradingError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(invalid("symbol is required"));
    }
    if symbol.len() > MAX_SYMBOL_LEN
        || !symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(invalid(&format!("invalid symbol: {}", raw.trim())));
    }
    Ok(symbol)
}

fn positive(value: Option<Decimal>, message: &str) -> Result<Decimal, TradingError> {
    match value {
        Some(v) if v > Decimal::ZERO => Ok(v),
        _ => Err(invalid(message)),
    }
}

fn invalid(message: &str) -> TradingError {
    TradingError::InvalidOrder(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderSide;
    use rust_decimal_macros::dec;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_market_order_canonicalizes_symbol() {
        let spec = OrderSpec::market("user123", "  aapl ", OrderSide::Buy, 10);
        let order = validate_order(&spec, NOW).unwrap();
        assert_eq!(order.symbol, "AAPL");
        assert_eq!(order.kind, OrderKind::Market);
    }

    #[test]
    fn test_market_ignores_stray_prices() {
        let mut spec = OrderSpec::market("user123", "AAPL", OrderSide::Buy, 1);
        spec.price = Some(dec!(5));
        assert_eq!(validate_order(&spec, NOW).unwrap().kind, OrderKind::Market);
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        for quantity in [0, -5] {
            let spec = OrderSpec::market("user123", "AAPL", OrderSide::Sell, quantity);
            assert!(matches!(validate_order(&spec, NOW), Err(TradingError::InvalidOrder(_))));
        }
    }

    #[test]
    fn test_rejects_bad_symbols() {
        for symbol in ["", "   ", "AA PL", "WAYTOOLONGSYMBOL", "$AAPL"] {
            let spec = OrderSpec::market("user123", symbol, OrderSide::Buy, 1);
            assert!(validate_order(&spec, NOW).is_err(), "{:?} should fail", symbol);
        }
        let spec = OrderSpec::market("user123", "brk.b", OrderSide::Buy, 1);
        assert_eq!(validate_order(&spec, NOW).unwrap().symbol, "BRK.B");
    }

    #[test]
    fn test_limit_requires_positive_price() {
        let mut spec = OrderSpec::limit("user123", "AAPL", OrderSide::Buy, 10, dec!(90));
        assert_eq!(
            validate_order(&spec, NOW).unwrap().kind,
            OrderKind::Limit { limit_price: dec!(90) }
        );

        spec.price = Some(Decimal::ZERO);
        assert!(validate_order(&spec, NOW).is_err());
        spec.price = None;
        assert!(validate_order(&spec, NOW).is_err());
    }

    #[test]
    fn test_limit_does_not_borrow_limit_price_field() {
        let mut spec = OrderSpec::limit("user123", "AAPL", OrderSide::Buy, 10, dec!(90));
        spec.price = None;
        spec.limit_price = Some(dec!(90));
        assert!(validate_order(&spec, NOW).is_err());
    }

    #[test]
    fn test_stop_requires_stop_price() {
        let mut spec = OrderSpec::stop("user123", "AAPL", OrderSide::Sell, 10, dec!(80));
        assert!(validate_order(&spec, NOW).is_ok());
        spec.stop_price = Some(dec!(-1));
        assert!(validate_order(&spec, NOW).is_err());
    }

    #[test]
    fn test_stop_limit_requires_both_prices() {
        let spec = OrderSpec::stop_limit("user123", "AAPL", OrderSide::Buy, 10, dec!(100), dec!(105));
        assert_eq!(
            validate_order(&spec, NOW).unwrap().kind,
            OrderKind::StopLimit { stop_price: dec!(100), limit_price: dec!(105) }
        );

        let mut missing_limit = spec.clone();
        missing_limit.limit_price = None;
        assert!(validate_order(&missing_limit, NOW).is_err());

        let mut missing_stop = spec;
        missing_stop.stop_price = None;
        assert!(validate_order(&missing_stop, NOW).is_err());
    }

    #[test]
    fn test_expiry_must_be_future() {
        let spec = OrderSpec::limit("user123", "AAPL", OrderSide::Buy, 10, dec!(90));
        assert!(validate_order(&spec.clone().with_expiry(NOW + 1), NOW).is_ok());
        assert!(validate_order(&spec.with_expiry(NOW), NOW).is_err());

        let market = OrderSpec::market("user123", "AAPL", OrderSide::Buy, 1).with_expiry(NOW + 1);
        assert!(validate_order(&market, NOW).is_err());
    }
}
