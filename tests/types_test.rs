//! Unit tests for types module

use paper_ledger::error::{ErrorCode, TradingError};
use paper_ledger::types::*;
use rust_decimal_macros::dec;

#[test]
fn test_price_source_display() {
    assert_eq!(format!("{}", PriceSource::Live), "live");
    assert_eq!(format!("{}", PriceSource::Cached), "cached");
}

#[test]
fn test_price_source_serialization() {
    let json = serde_json::to_string(&PriceSource::Cached).unwrap();
    assert_eq!(json, "\"cached\"");

    let parsed: PriceSource = serde_json::from_str("\"live\"").unwrap();
    assert_eq!(parsed, PriceSource::Live);
}

#[test]
fn test_order_enums_round_trip_through_strings() {
    for order_type in [OrderType::Market, OrderType::Limit, OrderType::Stop, OrderType::StopLimit] {
        assert_eq!(OrderType::parse(order_type.as_str()), Some(order_type));
    }
    for status in [
        OrderStatus::Pending,
        OrderStatus::Filled,
        OrderStatus::Cancelled,
        OrderStatus::Expired,
    ] {
        assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(OrderSide::parse("buy"), None);
    assert!(!OrderStatus::Pending.is_terminal());
    assert!(OrderStatus::Expired.is_terminal());
}

#[test]
fn test_order_spec_defaults_from_json() {
    let spec: OrderSpec = serde_json::from_str(r#"{"symbol": "aapl", "side": "BUY", "quantity": 3}"#).unwrap();

    assert_eq!(spec.user_id, DEFAULT_USER_ID);
    assert_eq!(spec.order_type, OrderType::Market);
    assert_eq!(spec.price, None);

    let spec: OrderSpec = serde_json::from_str(
        r#"{"symbol": "AAPL", "side": "SELL", "orderType": "STOP_LIMIT", "quantity": 1,
            "stopPrice": "95.5", "limitPrice": "94"}"#,
    )
    .unwrap();
    assert_eq!(spec.order_type, OrderType::StopLimit);
    assert_eq!(spec.stop_price, Some(dec!(95.5)));
    assert_eq!(spec.limit_price, Some(dec!(94)));
}

#[test]
fn test_order_kind_from_parts() {
    assert_eq!(
        OrderKind::from_parts(OrderType::Limit, Some(dec!(10)), None),
        Some(OrderKind::Limit { limit_price: dec!(10) })
    );
    assert_eq!(OrderKind::from_parts(OrderType::Stop, Some(dec!(10)), None), None);
    assert_eq!(OrderKind::from_parts(OrderType::StopLimit, None, Some(dec!(10))), None);
}

mod trigger_tests {
    use super::*;

    #[test]
    fn test_limit_triggers() {
        let limit = OrderKind::Limit { limit_price: dec!(90) };
        assert!(limit.is_triggered(OrderSide::Buy, dec!(90)));
        assert!(limit.is_triggered(OrderSide::Buy, dec!(88)));
        assert!(!limit.is_triggered(OrderSide::Buy, dec!(95)));
        assert!(limit.is_triggered(OrderSide::Sell, dec!(95)));
        assert!(!limit.is_triggered(OrderSide::Sell, dec!(89.99)));
    }

    #[test]
    fn test_stop_triggers() {
        let stop = OrderKind::Stop { stop_price: dec!(100) };
        assert!(stop.is_triggered(OrderSide::Buy, dec!(100)));
        assert!(!stop.is_triggered(OrderSide::Buy, dec!(99)));
        assert!(stop.is_triggered(OrderSide::Sell, dec!(99)));
        assert!(!stop.is_triggered(OrderSide::Sell, dec!(101)));
    }

    #[test]
    fn test_stop_limit_checks_both_in_one_pass() {
        let buy = OrderKind::StopLimit { stop_price: dec!(100), limit_price: dec!(105) };
        assert!(!buy.is_triggered(OrderSide::Buy, dec!(99)));
        assert!(buy.is_triggered(OrderSide::Buy, dec!(103)));
        assert!(!buy.is_triggered(OrderSide::Buy, dec!(106)));

        let sell = OrderKind::StopLimit { stop_price: dec!(95), limit_price: dec!(90) };
        assert!(!sell.is_triggered(OrderSide::Sell, dec!(96)));
        assert!(sell.is_triggered(OrderSide::Sell, dec!(92)));
        assert!(!sell.is_triggered(OrderSide::Sell, dec!(89)));
    }

    #[test]
    fn test_market_always_triggers() {
        assert!(OrderKind::Market.is_triggered(OrderSide::Buy, dec!(1)));
        assert!(OrderKind::Market.is_triggered(OrderSide::Sell, dec!(1)));
    }
}

mod result_tests {
    use super::*;

    #[test]
    fn test_rejected_result_carries_error_code() {
        let error = TradingError::InsufficientShares {
            symbol: "AAPL".to_string(),
            requested: 5,
            available: 2,
        };
        let result = OrderResult::rejected(&error);

        assert!(!result.success);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["error"]["code"], "INSUFFICIENT_SHARES");
        assert!(json.get("orderId").is_none());
        assert_eq!(result.error.unwrap().code, ErrorCode::InsufficientShares);
    }

    #[test]
    fn test_cancel_result_serialization() {
        let json = serde_json::to_value(CancelResult::cancelled("abc")).unwrap();
        assert_eq!(json["success"], true);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_order_expiry_check() {
        let mut order = Order::pending(ValidatedOrder {
            user_id: DEFAULT_USER_ID.to_string(),
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            quantity: 1,
            kind: OrderKind::Limit { limit_price: dec!(1) },
            expires_at: None,
        });
        assert!(!order.is_expired_at(i64::MAX));

        order.expires_at = Some(1_000);
        assert!(order.is_expired_at(1_000));
        assert!(!order.is_expired_at(999));
        assert!(order.can_cancel());
    }
}
