//! SQLite ledger adapter.
//!
//! Two tables mirror the ledger collections: `transactions` and
//! `portfolio_history`. Timestamps are stored as fixed-width RFC 3339 UTC
//! strings so that text ordering equals chronological ordering.

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Row, params};
use std::path::Path;
use std::time::Duration;

use crate::domain::error::PaperledgerError;
use crate::domain::transaction::{
    Category, GENESIS_DEPOSIT, NewTransaction, Transaction, ValuationPoint,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::{LedgerPort, Order};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_TRANSACTIONS: &str =
    "SELECT id, timestamp, category, amount, asset, detail, price, gain FROM transactions";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> PaperledgerError {
    PaperledgerError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> PaperledgerError {
    PaperledgerError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let category_str: String = row.get(2)?;
    let category = category_str.parse::<Category>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })?;
    Ok(Transaction {
        id: row.get(0)?,
        timestamp: parse_ts(row, 1)?,
        category,
        amount: row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
        asset: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        detail: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        price: row.get(6)?,
        gain: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PaperledgerError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| PaperledgerError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;
        Self::open(&db_path, pool_size)
    }

    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, PaperledgerError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(CONNECT_TIMEOUT)
            .build(manager)
            .map_err(pool_err)?;
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, PaperledgerError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PaperledgerError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), PaperledgerError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                asset TEXT NOT NULL,
                detail TEXT NOT NULL,
                price REAL,
                gain REAL NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_transactions_replay ON transactions(timestamp, id);
            CREATE TABLE IF NOT EXISTS portfolio_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                total_value REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_timestamp ON portfolio_history(timestamp);",
        )
        .map_err(query_err)?;
        Ok(())
    }
}

impl LedgerPort for SqliteAdapter {
    fn append(&self, tx: NewTransaction) -> Result<Transaction, PaperledgerError> {
        let conn = self.conn()?;
        let timestamp = tx.timestamp.unwrap_or_else(Utc::now);
        conn.execute(
            "INSERT INTO transactions (timestamp, category, amount, asset, detail, price, gain)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                format_ts(timestamp),
                tx.category.as_str(),
                tx.amount,
                tx.asset,
                tx.detail,
                tx.price,
                tx.gain
            ],
        )
        .map_err(query_err)?;
        let id = conn.last_insert_rowid();
        Ok(tx.into_transaction(id, timestamp))
    }

    fn list(&self, order: Order, limit: Option<usize>) -> Result<Vec<Transaction>, PaperledgerError> {
        let conn = self.conn()?;
        let direction = match order {
            Order::Ascending => "ASC",
            Order::Descending => "DESC",
        };
        let query = format!(
            "{SELECT_TRANSACTIONS} ORDER BY timestamp {direction}, id {direction} LIMIT ?1"
        );
        let limit = limit.map_or(-1, |l| l as i64);

        let mut stmt = conn.prepare(&query).map_err(query_err)?;
        let rows = stmt
            .query_map(params![limit], transaction_from_row)
            .map_err(query_err)?;

        let mut transactions = Vec::new();
        for row in rows {
            transactions.push(row.map_err(query_err)?);
        }
        Ok(transactions)
    }

    fn append_value(&self, point: ValuationPoint) -> Result<(), PaperledgerError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO portfolio_history (timestamp, total_value) VALUES (?1, ?2)",
            params![format_ts(point.timestamp), point.total_value],
        )
        .map_err(query_err)?;
        Ok(())
    }

    fn list_values(&self) -> Result<Vec<ValuationPoint>, PaperledgerError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT timestamp, total_value FROM portfolio_history ORDER BY timestamp ASC, id ASC")
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ValuationPoint {
                    timestamp: parse_ts(row, 0)?,
                    total_value: row.get(1)?,
                })
            })
            .map_err(query_err)?;

        let mut values = Vec::new();
        for row in rows {
            values.push(row.map_err(query_err)?);
        }
        Ok(values)
    }

    /// Wipe and reseed inside one SQLite transaction, so a failed reset
    /// leaves the previous ledger intact.
    fn reset(&self) -> Result<(), PaperledgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        tx.execute("DELETE FROM transactions", []).map_err(query_err)?;
        tx.execute("DELETE FROM portfolio_history", [])
            .map_err(query_err)?;
        insert_genesis(&tx)?;

        tx.commit().map_err(query_err)?;
        Ok(())
    }

    /// Both genesis rows commit together or not at all.
    fn seed_genesis(&self) -> Result<(), PaperledgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        insert_genesis(&tx)?;
        tx.commit().map_err(query_err)?;
        Ok(())
    }
}

fn insert_genesis(tx: &rusqlite::Transaction<'_>) -> Result<(), PaperledgerError> {
    let now = format_ts(Utc::now());
    let genesis = NewTransaction::genesis();
    tx.execute(
        "INSERT INTO transactions (timestamp, category, amount, asset, detail, price, gain)
         VALUES (?1, ?2, ?3, ?4, ?5, NULL, 0)",
        params![
            now,
            genesis.category.as_str(),
            genesis.amount,
            genesis.asset,
            genesis.detail
        ],
    )
    .map_err(query_err)?;
    tx.execute(
        "INSERT INTO portfolio_history (timestamp, total_value) VALUES (?1, ?2)",
        params![now, GENESIS_DEPOSIT],
    )
    .map_err(query_err)?;
    Ok(())
}
