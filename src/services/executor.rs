//! Order Executor
//!
//! Settles orders against the ledger. Each settlement is one SQLite
//! transaction covering the trade record, lot consumption, the holding and
//! the cash account. Prices are fetched before the transaction opens.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};

use super::fifo;
use super::price_provider::PriceProvider;
use super::sqlite_store::{Ledger, SqliteStore};
use crate::error::TradingError;
use crate::types::{
    checked_notional, Fill, Holding, Order, OrderSide, OrderStatus, Trade, ValidatedOrder,
};

pub struct OrderExecutor {
    store: Arc<SqliteStore>,
    prices: Arc<PriceProvider>,
}

impl OrderExecutor {
    pub fn new(store: Arc<SqliteStore>, prices: Arc<PriceProvider>) -> Self {
        Self { store, prices }
    }

    /// Fill a market order at the current price. The order is recorded as
    /// FILLED together with its settlement; nothing is written on failure.
    pub async fn execute_market(&self, order: ValidatedOrder) -> Result<Fill, TradingError> {
        let quote = self.prices.get_price(&order.symbol).await?;
        let now = chrono::Utc::now().timestamp_millis();

        let mut record = Order::pending(order);
        record.status = OrderStatus::Filled;
        record.filled_at = Some(now);
        record.filled_price = Some(quote.price);

        let fill = self.store.transaction(|ledger| {
            ledger.insert_order(&record)?;
            settle(ledger, &record, quote.price, now)
        })?;

        info!(
            "Market {} filled: {} {} @ {} ({} price)",
            record.side, record.quantity, record.symbol, quote.price, quote.source
        );
        Ok(fill)
    }

    /// Persist a conditional order as PENDING.
    pub fn submit(&self, order: ValidatedOrder) -> Result<Order, TradingError> {
        let record = Order::pending(order);
        self.store.transaction(|ledger| Ok(ledger.insert_order(&record)?))?;

        info!(
            "{} {} order {} accepted: {} {}",
            record.order_type(),
            record.side,
            record.id,
            record.quantity,
            record.symbol
        );
        Ok(record)
    }

    /// Fill a triggered PENDING order at the observed `price`. The status
    /// claim and the settlement commit together, so on any failure the order
    /// is still PENDING.
    pub fn fill_pending(&self, order: &Order, price: Decimal) -> Result<Fill, TradingError> {
        let now = chrono::Utc::now().timestamp_millis();

        let fill = self.store.transaction(|ledger| {
            if !ledger.fill_pending_order(&order.id, price, now)? {
                return Err(not_pending(ledger, &order.id)?);
            }
            settle(ledger, order, price, now)
        })?;

        info!(
            "{} {} order {} filled: {} {} @ {}",
            order.order_type(),
            order.side,
            order.id,
            order.quantity,
            order.symbol,
            price
        );
        Ok(fill)
    }

    /// PENDING -> CANCELLED.
    pub fn cancel(&self, order_id: &str) -> Result<(), TradingError> {
        self.store.transaction(|ledger| {
            if ledger.close_pending_order(order_id, OrderStatus::Cancelled)? {
                Ok(())
            } else {
                Err(not_pending(ledger, order_id)?)
            }
        })?;

        info!("Order {} cancelled", order_id);
        Ok(())
    }

    /// PENDING -> EXPIRED. Returns false if the order already left PENDING.
    pub fn expire(&self, order_id: &str) -> Result<bool, TradingError> {
        let expired = self
            .store
            .transaction(|ledger| Ok(ledger.close_pending_order(order_id, OrderStatus::Expired)?))?;
        if expired {
            info!("Order {} expired", order_id);
        } else {
            debug!("Order {} left PENDING before it could expire", order_id);
        }
        Ok(expired)
    }
}

/// Error for an order that is missing or no longer PENDING.
fn not_pending(ledger: &Ledger<'_>, order_id: &str) -> Result<TradingError, TradingError> {
    Ok(match ledger.get_order(order_id)? {
        None => TradingError::OrderNotFound(order_id.to_string()),
        Some(current) => TradingError::NotCancellable {
            id: order_id.to_string(),
            status: current.status.to_string(),
        },
    })
}

/// Apply one fill to the ledger. Must run inside a transaction.
fn settle(ledger: &Ledger<'_>, order: &Order, price: Decimal, now: i64) -> Result<Fill, TradingError> {
    let account = ledger
        .cash_account(&order.user_id)?
        .ok_or_else(|| TradingError::AccountNotFound(order.user_id.clone()))?;
    let notional = checked_notional(price, order.quantity)
        .ok_or_else(|| TradingError::too_large("order value"))?;

    let mut trade = Trade {
        id: 0,
        order_id: Some(order.id.clone()),
        user_id: order.user_id.clone(),
        symbol: order.symbol.clone(),
        side: order.side,
        price,
        quantity: order.quantity,
        remaining_quantity: 0,
        realized_pnl: None,
        executed_at: now,
    };

    let cash_balance = match order.side {
        OrderSide::Buy => {
            if notional > account.balance {
                return Err(TradingError::InsufficientFunds {
                    needed: notional,
                    available: account.balance,
                });
            }

            trade.remaining_quantity = order.quantity;
            trade.id = ledger.insert_trade(&trade)?;

            let (quantity, average_cost) = fifo::position(ledger, &order.user_id, &order.symbol)?;
            ledger.upsert_holding(&Holding {
                user_id: order.user_id.clone(),
                symbol: order.symbol.clone(),
                quantity,
                average_cost,
                updated_at: now,
            })?;

            account.balance - notional
        }
        OrderSide::Sell => {
            let consumption =
                fifo::consume(ledger, &order.user_id, &order.symbol, order.quantity, price)?;

            trade.realized_pnl = Some(consumption.realized_pnl);
            trade.id = ledger.insert_trade(&trade)?;

            if consumption.remaining_quantity == 0 {
                ledger.delete_holding(&order.user_id, &order.symbol)?;
            } else {
                ledger.upsert_holding(&Holding {
                    user_id: order.user_id.clone(),
                    symbol: order.symbol.clone(),
                    quantity: consumption.remaining_quantity,
                    average_cost: consumption.new_average_cost,
                    updated_at: now,
                })?;
            }

            account
                .balance
                .checked_add(notional)
                .ok_or_else(|| TradingError::too_large("cash balance"))?
        }
    };

    ledger.set_cash_balance(&order.user_id, cash_balance)?;

    Ok(Fill {
        order_id: order.id.clone(),
        trade_id: trade.id,
        symbol: order.symbol.clone(),
        side: order.side,
        quantity: order.quantity,
        price,
        cash_delta: notional,
        realized_pnl: trade.realized_pnl,
        cash_balance,
        filled_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OrderKind;
    use rust_decimal_macros::dec;

    const USER: &str = "user123";

    fn funded_store(cash: Decimal) -> SqliteStore {
        let store = SqliteStore::new_in_memory().unwrap();
        store
            .transaction(|ledger| Ok(ledger.create_cash_account(USER, cash)?))
            .unwrap();
        store
    }

    fn market(side: OrderSide, quantity: i64) -> Order {
        let mut order = Order::pending(ValidatedOrder {
            user_id: USER.to_string(),
            symbol: "AAPL".to_string(),
            side,
            quantity,
            kind: OrderKind::Market,
            expires_at: None,
        });
        order.status = OrderStatus::Filled;
        order
    }

    fn run(store: &SqliteStore, side: OrderSide, quantity: i64, price: Decimal, at: i64) -> Result<Fill, TradingError> {
        let order = market(side, quantity);
        store.transaction(|ledger| {
            ledger.insert_order(&order)?;
            settle(ledger, &order, price, at)
        })
    }

    fn cash(store: &SqliteStore) -> Decimal {
        store.cash_account(USER).unwrap().unwrap().balance
    }

    #[test]
    fn test_buy_then_partial_sell() {
        let store = funded_store(dec!(10000.00));

        run(&store, OrderSide::Buy, 10, dec!(100), 1).unwrap();
        assert_eq!(cash(&store), dec!(9000.00));
        let holding = store.holding(USER, "AAPL").unwrap().unwrap();
        assert_eq!((holding.quantity, holding.average_cost), (10, dec!(100)));

        let fill = run(&store, OrderSide::Sell, 4, dec!(150), 2).unwrap();
        assert_eq!(fill.realized_pnl, Some(dec!(200.00)));
        assert_eq!(fill.cash_balance, dec!(9600.00));
        assert_eq!(cash(&store), dec!(9600.00));
        let holding = store.holding(USER, "AAPL").unwrap().unwrap();
        assert_eq!((holding.quantity, holding.average_cost), (6, dec!(100)));
    }

    #[test]
    fn test_buy_averages_cost() {
        let store = funded_store(dec!(10000.00));
        run(&store, OrderSide::Buy, 5, dec!(50), 1).unwrap();
        run(&store, OrderSide::Buy, 5, dec!(70), 2).unwrap();

        let holding = store.holding(USER, "AAPL").unwrap().unwrap();
        assert_eq!((holding.quantity, holding.average_cost), (10, dec!(60)));
    }

    #[test]
    fn test_insufficient_funds_writes_nothing() {
        let store = funded_store(dec!(500.00));

        let err = run(&store, OrderSide::Buy, 10, dec!(100), 1).unwrap_err();

        assert_eq!(
            err,
            TradingError::InsufficientFunds { needed: dec!(1000.00), available: dec!(500.00) }
        );
        assert_eq!(cash(&store), dec!(500.00));
        assert!(store.holding(USER, "AAPL").unwrap().is_none());
        assert!(store.trades(USER, None, 10).unwrap().is_empty());
    }

    #[test]
    fn test_exact_cash_is_enough() {
        let store = funded_store(dec!(1000.00));
        run(&store, OrderSide::Buy, 10, dec!(100), 1).unwrap();
        assert_eq!(cash(&store), Decimal::ZERO);
    }

    #[test]
    fn test_selling_all_deletes_holding() {
        let store = funded_store(dec!(10000.00));
        run(&store, OrderSide::Buy, 10, dec!(100), 1).unwrap();
        let fill = run(&store, OrderSide::Sell, 10, dec!(100), 2).unwrap();

        assert_eq!(fill.realized_pnl, Some(dec!(0.00)));
        assert!(store.holding(USER, "AAPL").unwrap().is_none());
        assert_eq!(cash(&store), dec!(10000.00));
    }

    #[test]
    fn test_missing_account_is_reported() {
        let store = SqliteStore::new_in_memory().unwrap();
        let err = run(&store, OrderSide::Buy, 1, dec!(10), 1).unwrap_err();
        assert_eq!(err, TradingError::AccountNotFound(USER.to_string()));
    }

    #[test]
    fn test_oversell_rolls_back() {
        let store = funded_store(dec!(10000.00));
        run(&store, OrderSide::Buy, 3, dec!(100), 1).unwrap();

        let err = run(&store, OrderSide::Sell, 4, dec!(100), 2).unwrap_err();

        assert!(matches!(err, TradingError::InsufficientShares { requested: 4, available: 3, .. }));
        assert_eq!(store.holding(USER, "AAPL").unwrap().unwrap().quantity, 3);
        assert_eq!(store.trades(USER, None, 10).unwrap().len(), 1);
        assert_eq!(cash(&store), dec!(9700.00));
    }

    #[test]
    fn test_overflowing_order_value_is_rejected() {
        let store = funded_store(dec!(10000.00));

        let err = run(&store, OrderSide::Buy, i64::MAX, dec!(100000000000), 1).unwrap_err();

        assert!(matches!(err, TradingError::InvalidOrder(_)));
        run(&store, OrderSide::Buy, 1, dec!(100), 2).unwrap();
        assert_eq!(cash(&store), dec!(9900.00));
    }

    #[test]
    fn test_overflowing_cash_credit_rolls_back() {
        let store = funded_store(Decimal::MAX - dec!(1));
        run(&store, OrderSide::Buy, 1, dec!(10), 1).unwrap();

        let err = run(&store, OrderSide::Sell, 1, dec!(100000000000000000000), 2).unwrap_err();

        assert!(matches!(err, TradingError::InvalidOrder(_)));
        assert_eq!(store.holding(USER, "AAPL").unwrap().unwrap().quantity, 1);
        assert_eq!(cash(&store), Decimal::MAX - dec!(11));
    }
}
