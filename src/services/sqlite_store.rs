//! SQLite persistence layer for the trading ledger.
//!
//! Everything that must survive a restart lives here:
//! - Orders (pending and terminal)
//! - Trades (BUY trades double as FIFO lots)
//! - Holdings and cash accounts
//! - Last known market quote per symbol (price fallback cache)
//!
//! Money is stored as decimal TEXT so amounts round-trip exactly.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::error::TradingError;
use crate::types::{
    CashAccount, Holding, Lot, MarketQuote, Order, OrderKind, OrderSide, OrderStatus, OrderType,
    Trade,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS orders (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        symbol TEXT NOT NULL,
        side TEXT NOT NULL,
        order_type TEXT NOT NULL,
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        limit_price TEXT,
        stop_price TEXT,
        status TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        filled_at INTEGER,
        filled_price TEXT,
        expires_at INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_orders_status_created ON orders(status, created_at);

    CREATE TABLE IF NOT EXISTS trades (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        order_id TEXT,
        user_id TEXT NOT NULL,
        symbol TEXT NOT NULL,
        side TEXT NOT NULL,
        price TEXT NOT NULL,
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        remaining_quantity INTEGER NOT NULL
            CHECK (remaining_quantity >= 0 AND remaining_quantity <= quantity),
        realized_pnl TEXT,
        executed_at INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_trades_lots ON trades(user_id, symbol, side, executed_at);
    CREATE INDEX IF NOT EXISTS idx_trades_executed ON trades(executed_at DESC);

    CREATE TABLE IF NOT EXISTS holdings (
        user_id TEXT NOT NULL,
        symbol TEXT NOT NULL,
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        average_cost TEXT NOT NULL,
        updated_at INTEGER NOT NULL,
        PRIMARY KEY (user_id, symbol)
    );

    CREATE TABLE IF NOT EXISTS cash_accounts (
        user_id TEXT PRIMARY KEY,
        balance TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS price_quotes (
        symbol TEXT PRIMARY KEY,
        price TEXT NOT NULL,
        open_price TEXT NOT NULL,
        high_price TEXT NOT NULL,
        low_price TEXT NOT NULL,
        volume INTEGER NOT NULL,
        previous_close TEXT NOT NULL,
        change_amount TEXT NOT NULL,
        change_percent TEXT NOT NULL,
        latest_trading_day TEXT,
        fetched_at INTEGER NOT NULL
    );
";

/// SQLite store for the trading ledger.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), rusqlite::Error> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| rusqlite::Error::InvalidQuery)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, TradingError> {
        self.conn
            .lock()
            .map_err(|_| TradingError::StoreUnavailable("connection lock poisoned".to_string()))
    }

    /// Run `f` inside one IMMEDIATE transaction. Commits on `Ok`, rolls back
    /// on `Err` so no partial mutation survives.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, TradingError>
    where
        F: FnOnce(&Ledger<'_>) -> Result<T, TradingError>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let result = f(&Ledger::new(&tx));
        match result {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Run read-only queries against the connection.
    pub fn read<T, F>(&self, f: F) -> Result<T, TradingError>
    where
        F: FnOnce(&Ledger<'_>) -> Result<T, TradingError>,
    {
        let conn = self.lock()?;
        f(&Ledger::new(&conn))
    }

    // ========== Convenience Reads ==========

    pub fn get_order(&self, order_id: &str) -> Result<Option<Order>, TradingError> {
        self.read(|ledger| Ok(ledger.get_order(order_id)?))
    }

    pub fn cash_account(&self, user_id: &str) -> Result<Option<CashAccount>, TradingError> {
        self.read(|ledger| Ok(ledger.cash_account(user_id)?))
    }

    pub fn holding(&self, user_id: &str, symbol: &str) -> Result<Option<Holding>, TradingError> {
        self.read(|ledger| Ok(ledger.holding(user_id, symbol)?))
    }

    pub fn holdings(&self, user_id: &str, symbol: Option<&str>) -> Result<Vec<Holding>, TradingError> {
        self.read(|ledger| Ok(ledger.holdings(user_id, symbol)?))
    }

    pub fn trades(
        &self,
        user_id: &str,
        symbol: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Trade>, TradingError> {
        self.read(|ledger| Ok(ledger.trades(user_id, symbol, limit)?))
    }

    pub fn save_quote(&self, quote: &MarketQuote) -> Result<(), TradingError> {
        self.read(|ledger| Ok(ledger.save_quote(quote)?))
    }

    pub fn cached_quote(&self, symbol: &str) -> Result<Option<MarketQuote>, TradingError> {
        self.read(|ledger| Ok(ledger.cached_quote(symbol)?))
    }
}

/// Row-level ledger operations over a connection or an open transaction.
pub struct Ledger<'c> {
    conn: &'c Connection,
}

const ORDER_COLUMNS: &str = "id, user_id, symbol, side, order_type, quantity, limit_price, \
     stop_price, status, created_at, filled_at, filled_price, expires_at";

const TRADE_COLUMNS: &str =
    "id, order_id, user_id, symbol, side, price, quantity, remaining_quantity, realized_pnl, executed_at";

impl<'c> Ledger<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    // ========== Orders ==========

    pub fn insert_order(&self, order: &Order) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO orders (id, user_id, symbol, side, order_type, quantity, limit_price,
                stop_price, status, created_at, filled_at, filled_price, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                order.id,
                order.user_id,
                order.symbol,
                order.side.as_str(),
                order.order_type().as_str(),
                order.quantity,
                order.kind.limit_price().map(|p| p.to_string()),
                order.kind.stop_price().map(|p| p.to_string()),
                order.status.as_str(),
                order.created_at,
                order.filled_at,
                order.filled_price.map(|p| p.to_string()),
                order.expires_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_order(&self, order_id: &str) -> rusqlite::Result<Option<Order>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS),
                params![order_id],
                order_from_row,
            )
            .optional()
    }

    /// Pending orders, oldest first.
    pub fn pending_orders(
        &self,
        user_id: Option<&str>,
        symbol: Option<&str>,
    ) -> rusqlite::Result<Vec<Order>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM orders
             WHERE status = 'PENDING'
               AND (?1 IS NULL OR user_id = ?1)
               AND (?2 IS NULL OR symbol = ?2)
             ORDER BY created_at ASC, rowid ASC",
            ORDER_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id, symbol], order_from_row)?;
        rows.collect()
    }

    /// Move a PENDING order to a terminal status. Returns false when the
    /// order was no longer pending.
    pub fn close_pending_order(&self, order_id: &str, status: OrderStatus) -> rusqlite::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE orders SET status = ?2 WHERE id = ?1 AND status = 'PENDING'",
            params![order_id, status.as_str()],
        )?;
        Ok(changed == 1)
    }

    /// Mark a PENDING order filled. Returns false when the order was no
    /// longer pending.
    pub fn fill_pending_order(
        &self,
        order_id: &str,
        price: Decimal,
        filled_at: i64,
    ) -> rusqlite::Result<bool> {
        let changed = self.conn.execute(
            "UPDATE orders SET status = 'FILLED', filled_price = ?2, filled_at = ?3
             WHERE id = ?1 AND status = 'PENDING'",
            params![order_id, price.to_string(), filled_at],
        )?;
        Ok(changed == 1)
    }

    // ========== Trades & Lots ==========

    /// Insert a trade and return its id.
    pub fn insert_trade(&self, trade: &Trade) -> rusqlite::Result<i64> {
        self.conn.execute(
            "INSERT INTO trades (order_id, user_id, symbol, side, price, quantity,
                remaining_quantity, realized_pnl, executed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                trade.order_id,
                trade.user_id,
                trade.symbol,
                trade.side.as_str(),
                trade.price.to_string(),
                trade.quantity,
                trade.remaining_quantity,
                trade.realized_pnl.map(|p| p.to_string()),
                trade.executed_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Buy-lots with shares left, oldest first (ties broken by trade id).
    pub fn open_lots(&self, user_id: &str, symbol: &str) -> rusqlite::Result<Vec<Lot>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, price, quantity, remaining_quantity, executed_at FROM trades
             WHERE user_id = ?1 AND symbol = ?2 AND side = 'BUY' AND remaining_quantity > 0
             ORDER BY executed_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![user_id, symbol], |row| {
            Ok(Lot {
                trade_id: row.get(0)?,
                price: decimal_at(row, 1)?,
                quantity: row.get(2)?,
                remaining_quantity: row.get(3)?,
                executed_at: row.get(4)?,
            })
        })?;
        rows.collect()
    }

    pub fn set_lot_remaining(&self, trade_id: i64, remaining: i64) -> rusqlite::Result<()> {
        self.conn.execute(
            "UPDATE trades SET remaining_quantity = ?2 WHERE id = ?1 AND side = 'BUY'",
            params![trade_id, remaining],
        )?;
        Ok(())
    }

    /// Most recent trades first.
    pub fn trades(&self, user_id: &str, symbol: Option<&str>, limit: usize) -> rusqlite::Result<Vec<Trade>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM trades
             WHERE user_id = ?1 AND (?2 IS NULL OR symbol = ?2)
             ORDER BY executed_at DESC, id DESC
             LIMIT ?3",
            TRADE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id, symbol, limit as i64], trade_from_row)?;
        rows.collect()
    }

    /// Trades executed at or after `since` (ms), most recent first.
    pub fn trades_since(
        &self,
        user_id: &str,
        symbol: Option<&str>,
        side: Option<OrderSide>,
        since: i64,
    ) -> rusqlite::Result<Vec<Trade>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM trades
             WHERE user_id = ?1
               AND (?2 IS NULL OR symbol = ?2)
               AND (?3 IS NULL OR side = ?3)
               AND executed_at >= ?4
             ORDER BY executed_at DESC, id DESC",
            TRADE_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![user_id, symbol, side.map(|s| s.as_str()), since],
            trade_from_row,
        )?;
        rows.collect()
    }

    // ========== Holdings ==========

    pub fn holding(&self, user_id: &str, symbol: &str) -> rusqlite::Result<Option<Holding>> {
        self.conn
            .query_row(
                "SELECT user_id, symbol, quantity, average_cost, updated_at FROM holdings
                 WHERE user_id = ?1 AND symbol = ?2",
                params![user_id, symbol],
                holding_from_row,
            )
            .optional()
    }

    pub fn holdings(&self, user_id: &str, symbol: Option<&str>) -> rusqlite::Result<Vec<Holding>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, symbol, quantity, average_cost, updated_at FROM holdings
             WHERE user_id = ?1 AND (?2 IS NULL OR symbol = ?2)
             ORDER BY symbol",
        )?;
        let rows = stmt.query_map(params![user_id, symbol], holding_from_row)?;
        rows.collect()
    }

    pub fn upsert_holding(&self, holding: &Holding) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO holdings (user_id, symbol, quantity, average_cost, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, symbol) DO UPDATE SET
                quantity = excluded.quantity,
                average_cost = excluded.average_cost,
                updated_at = excluded.updated_at",
            params![
                holding.user_id,
                holding.symbol,
                holding.quantity,
                holding.average_cost.to_string(),
                holding.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn delete_holding(&self, user_id: &str, symbol: &str) -> rusqlite::Result<()> {
        self.conn.execute(
            "DELETE FROM holdings WHERE user_id = ?1 AND symbol = ?2",
            params![user_id, symbol],
        )?;
        Ok(())
    }

    /// Symbols held by any user.
    pub fn held_symbols(&self) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT symbol FROM holdings ORDER BY symbol")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect()
    }

    // ========== Cash ==========

    pub fn cash_account(&self, user_id: &str) -> rusqlite::Result<Option<CashAccount>> {
        self.conn
            .query_row(
                "SELECT user_id, balance, updated_at FROM cash_accounts WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(CashAccount {
                        user_id: row.get(0)?,
                        balance: decimal_at(row, 1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()
    }

    /// Create the account unless it exists. Returns true when created.
    pub fn create_cash_account(&self, user_id: &str, balance: Decimal) -> rusqlite::Result<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO cash_accounts (user_id, balance, updated_at) VALUES (?1, ?2, ?3)",
            params![user_id, balance.to_string(), chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(changed == 1)
    }

    pub fn set_cash_balance(&self, user_id: &str, balance: Decimal) -> rusqlite::Result<()> {
        self.conn.execute(
            "UPDATE cash_accounts SET balance = ?2, updated_at = ?3 WHERE user_id = ?1",
            params![user_id, balance.to_string(), chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    // ========== Quote Cache ==========

    pub fn save_quote(&self, quote: &MarketQuote) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO price_quotes (symbol, price, open_price, high_price, low_price, volume,
                previous_close, change_amount, change_percent, latest_trading_day, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(symbol) DO UPDATE SET
                price = excluded.price,
                open_price = excluded.open_price,
                high_price = excluded.high_price,
                low_price = excluded.low_price,
                volume = excluded.volume,
                previous_close = excluded.previous_close,
                change_amount = excluded.change_amount,
                change_percent = excluded.change_percent,
                latest_trading_day = excluded.latest_trading_day,
                fetched_at = excluded.fetched_at",
            params![
                quote.symbol,
                quote.price.to_string(),
                quote.open.to_string(),
                quote.high.to_string(),
                quote.low.to_string(),
                quote.volume,
                quote.previous_close.to_string(),
                quote.change_amount.to_string(),
                quote.change_percent.to_string(),
                quote.latest_trading_day,
                quote.timestamp,
            ],
        )?;
        Ok(())
    }

    pub fn cached_quote(&self, symbol: &str) -> rusqlite::Result<Option<MarketQuote>> {
        self.conn
            .query_row(
                "SELECT symbol, price, open_price, high_price, low_price, volume, previous_close,
                    change_amount, change_percent, latest_trading_day, fetched_at
                 FROM price_quotes WHERE symbol = ?1",
                params![symbol],
                |row| {
                    Ok(MarketQuote {
                        symbol: row.get(0)?,
                        price: decimal_at(row, 1)?,
                        open: decimal_at(row, 2)?,
                        high: decimal_at(row, 3)?,
                        low: decimal_at(row, 4)?,
                        volume: row.get(5)?,
                        previous_close: decimal_at(row, 6)?,
                        change_amount: decimal_at(row, 7)?,
                        change_percent: decimal_at(row, 8)?,
                        latest_trading_day: row.get(9)?,
                        timestamp: row.get(10)?,
                    })
                },
            )
            .optional()
    }
}

// ========== Row Mapping ==========

#[derive(Debug, thiserror::Error)]
#[error("unexpected column value: {0}")]
struct BadColumn(String);

fn bad_column(idx: usize, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(BadColumn(value)))
}

fn decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let text: String = row.get(idx)?;
    Decimal::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

fn opt_decimal_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        Decimal::from_str(&t)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn enum_at<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text).ok_or_else(|| bad_column(idx, text))
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    let order_type = enum_at(row, 4, OrderType::parse)?;
    let limit_price = opt_decimal_at(row, 6)?;
    let stop_price = opt_decimal_at(row, 7)?;
    let kind = OrderKind::from_parts(order_type, limit_price, stop_price)
        .ok_or_else(|| bad_column(4, format!("{} without its prices", order_type)))?;

    Ok(Order {
        id: row.get(0)?,
        user_id: row.get(1)?,
        symbol: row.get(2)?,
        side: enum_at(row, 3, OrderSide::parse)?,
        kind,
        quantity: row.get(5)?,
        status: enum_at(row, 8, OrderStatus::parse)?,
        created_at: row.get(9)?,
        filled_at: row.get(10)?,
        filled_price: opt_decimal_at(row, 11)?,
        expires_at: row.get(12)?,
    })
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    Ok(Trade {
        id: row.get(0)?,
        order_id: row.get(1)?,
        user_id: row.get(2)?,
        symbol: row.get(3)?,
        side: enum_at(row, 4, OrderSide::parse)?,
        price: decimal_at(row, 5)?,
        quantity: row.get(6)?,
        remaining_quantity: row.get(7)?,
        realized_pnl: opt_decimal_at(row, 8)?,
        executed_at: row.get(9)?,
    })
}

fn holding_from_row(row: &Row<'_>) -> rusqlite::Result<Holding> {
    Ok(Holding {
        user_id: row.get(0)?,
        symbol: row.get(1)?,
        quantity: row.get(2)?,
        average_cost: decimal_at(row, 3)?,
        updated_at: row.get(4)?,
    })
}
