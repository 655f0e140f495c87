//! FIFO lot accounting.
//!
//! Every BUY trade is a lot. Sells consume the oldest lots first
//! (by execution time, then trade id) and the holding's average cost is
//! always the weighted average of what remains.

use rust_decimal::Decimal;
use tracing::debug;

use super::sqlite_store::Ledger;
use crate::error::TradingError;
use crate::types::{checked_notional, round_cost, round_money, ConsumedLot, Consumption, Lot};

/// Consume `quantity` shares from `lots` (already in FIFO order) at
/// `sell_price`. On error the lots are left untouched.
pub fn consume_lots(
    symbol: &str,
    lots: &mut [Lot],
    quantity: i64,
    sell_price: Decimal,
) -> Result<Consumption, TradingError> {
    if quantity <= 0 {
        return Err(TradingError::InvalidOrder(
            "sell quantity must be positive".to_string(),
        ));
    }

    let available = lots
        .iter()
        .try_fold(0i64, |acc, l| acc.checked_add(l.remaining_quantity))
        .ok_or_else(|| TradingError::too_large("position size"))?;
    if quantity > available {
        return Err(TradingError::InsufficientShares {
            symbol: symbol.to_string(),
            requested: quantity,
            available,
        });
    }

    // Plan first, then apply, so a failed sell never touches the lots
    let mut still_needed = quantity;
    let mut cost_basis = Decimal::ZERO;
    let mut consumed_lots = Vec::new();

    for lot in lots.iter().filter(|l| l.remaining_quantity > 0) {
        if still_needed == 0 {
            break;
        }
        let take = lot.remaining_quantity.min(still_needed);
        cost_basis = Decimal::from(take)
            .checked_mul(lot.price)
            .and_then(|cost| cost_basis.checked_add(cost))
            .ok_or_else(|| TradingError::too_large("cost basis"))?;
        still_needed -= take;
        consumed_lots.push(ConsumedLot {
            trade_id: lot.trade_id,
            quantity: take,
            price: lot.price,
        });
    }

    let cost_basis = round_money(cost_basis);
    let proceeds =
        checked_notional(sell_price, quantity).ok_or_else(|| TradingError::too_large("sale value"))?;

    for consumed in &consumed_lots {
        if let Some(lot) = lots.iter_mut().find(|l| l.trade_id == consumed.trade_id) {
            lot.remaining_quantity -= consumed.quantity;
        }
    }
    let (remaining_quantity, new_average_cost) = weighted_average(lots)?;

    Ok(Consumption {
        realized_pnl: proceeds - cost_basis,
        cost_basis,
        consumed_lots,
        remaining_quantity,
        new_average_cost,
    })
}

/// Remaining quantity and its weighted average price (0 when empty).
pub fn weighted_average(lots: &[Lot]) -> Result<(i64, Decimal), TradingError> {
    let mut quantity = 0i64;
    let mut value = Decimal::ZERO;
    for lot in lots.iter().filter(|l| l.remaining_quantity > 0) {
        quantity = quantity
            .checked_add(lot.remaining_quantity)
            .ok_or_else(|| TradingError::too_large("position size"))?;
        value = Decimal::from(lot.remaining_quantity)
            .checked_mul(lot.price)
            .and_then(|v| value.checked_add(v))
            .ok_or_else(|| TradingError::too_large("position value"))?;
    }

    if quantity == 0 {
        Ok((0, Decimal::ZERO))
    } else {
        Ok((quantity, round_cost(value / Decimal::from(quantity))))
    }
}

/// Consume lots for a sell inside an open transaction and persist the new
/// remaining quantities.
pub fn consume(
    ledger: &Ledger<'_>,
    user_id: &str,
    symbol: &str,
    quantity: i64,
    sell_price: Decimal,
) -> Result<Consumption, TradingError> {
    let mut lots = ledger.open_lots(user_id, symbol)?;
    let consumption = consume_lots(symbol, &mut lots, quantity, sell_price)?;

    for lot in &lots {
        if consumption.consumed_lots.iter().any(|c| c.trade_id == lot.trade_id) {
            ledger.set_lot_remaining(lot.trade_id, lot.remaining_quantity)?;
        }
    }

    debug!(
        "FIFO consumed {} {} across {} lot(s), cost basis {}",
        quantity,
        symbol,
        consumption.consumed_lots.len(),
        consumption.cost_basis
    );
    Ok(consumption)
}

/// Current position from the open lots: (quantity, average cost).
pub fn position(ledger: &Ledger<'_>, user_id: &str, symbol: &str) -> Result<(i64, Decimal), TradingError> {
    let lots = ledger.open_lots(user_id, symbol)?;
    weighted_average(&lots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn lot(trade_id: i64, price: Decimal, quantity: i64) -> Lot {
        Lot {
            trade_id,
            price,
            quantity,
            remaining_quantity: quantity,
            executed_at: trade_id * 1_000,
        }
    }

    #[test]
    fn test_consumes_oldest_lots_first() {
        let mut lots = vec![lot(1, dec!(50), 5), lot(2, dec!(70), 5)];

        let result = consume_lots("AAPL", &mut lots, 7, dec!(80)).unwrap();

        assert_eq!(result.cost_basis, dec!(390.00));
        assert_eq!(result.realized_pnl, dec!(170.00));
        assert_eq!(
            result.consumed_lots,
            vec![
                ConsumedLot { trade_id: 1, quantity: 5, price: dec!(50) },
                ConsumedLot { trade_id: 2, quantity: 2, price: dec!(70) },
            ]
        );
        assert_eq!(result.remaining_quantity, 3);
        assert_eq!(result.new_average_cost, dec!(70));
        assert_eq!(lots[0].remaining_quantity, 0);
        assert_eq!(lots[1].remaining_quantity, 3);
    }

    #[test]
    fn test_skips_exhausted_lots() {
        let mut lots = vec![lot(1, dec!(10), 5), lot(2, dec!(20), 5)];
        lots[0].remaining_quantity = 0;

        let result = consume_lots("AAPL", &mut lots, 2, dec!(20)).unwrap();
        assert_eq!(result.consumed_lots.len(), 1);
        assert_eq!(result.consumed_lots[0].trade_id, 2);
        assert_eq!(result.realized_pnl, dec!(0.00));
    }

    #[test]
    fn test_insufficient_shares_leaves_lots_alone() {
        let mut lots = vec![lot(1, dec!(50), 5), lot(2, dec!(70), 5)];

        let err = consume_lots("AAPL", &mut lots, 11, dec!(80)).unwrap_err();

        assert_eq!(
            err,
            TradingError::InsufficientShares {
                symbol: "AAPL".to_string(),
                requested: 11,
                available: 10,
            }
        );
        assert!(lots.iter().all(|l| l.remaining_quantity == l.quantity));
    }

    #[test]
    fn test_selling_everything_resets_average() {
        let mut lots = vec![lot(1, dec!(100), 10)];
        let result = consume_lots("AAPL", &mut lots, 10, dec!(100)).unwrap();
        assert_eq!(result.realized_pnl, Decimal::ZERO);
        assert_eq!(result.remaining_quantity, 0);
        assert_eq!(result.new_average_cost, Decimal::ZERO);
    }

    #[test]
    fn test_average_rounds_to_four_places() {
        let lots = vec![lot(1, dec!(10), 1), lot(2, dec!(10), 1), lot(3, dec!(11), 1)];
        assert_eq!(weighted_average(&lots).unwrap(), (3, dec!(10.3333)));
    }

    #[test]
    fn test_overflowing_sale_leaves_lots_alone() {
        let mut lots = vec![lot(1, dec!(1), 5)];

        let err = consume_lots("AAPL", &mut lots, 5, Decimal::MAX).unwrap_err();

        assert!(matches!(err, TradingError::InvalidOrder(_)));
        assert_eq!(lots[0].remaining_quantity, 5);
    }

    #[test]
    fn test_realized_loss_is_negative() {
        let mut lots = vec![lot(1, dec!(100.125), 3)];
        let result = consume_lots("AAPL", &mut lots, 3, dec!(90)).unwrap();
        // cost basis 300.375 rounds to 300.38
        assert_eq!(result.cost_basis, dec!(300.38));
        assert_eq!(result.realized_pnl, dec!(-30.38));
    }
}
