//! SQLite archive of raw price and volume history.

use crate::error::{Result, StoreError};
use crate::services::history::RecordSource;
use crate::types::{RawRecord, Stream, Tick, TimeWindow};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Bulk historical reader backed by a `price_history` table.
pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    /// Open (or create) the archive at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open(path)?),
        };
        store.init_schema()?;
        info!("SQLite history initialized");
        Ok(store)
    }

    /// Create an in-memory archive (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        debug!("In-memory SQLite history initialized");
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Consistency("sqlite connection lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS price_history (
                ticker TEXT NOT NULL,
                exchange TEXT NOT NULL,
                stream TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                value REAL NOT NULL,
                PRIMARY KEY (ticker, exchange, stream, timestamp)
            )",
            [],
        )?;
        Ok(())
    }

    /// Archive a tick. Returns false if that second was already archived.
    pub fn insert(&self, tick: &Tick) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT OR IGNORE INTO price_history (ticker, exchange, stream, timestamp, value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                tick.ticker,
                tick.exchange,
                tick.stream.as_str(),
                tick.timestamp,
                tick.value
            ],
        )?;
        Ok(changed > 0)
    }
}

impl RecordSource for SqliteHistory {
    fn name(&self) -> &str {
        "sqlite_history"
    }

    fn fetch_raw_records(
        &self,
        ticker: &str,
        exchange: &str,
        stream: Stream,
        window: TimeWindow,
    ) -> Result<Vec<RawRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, value FROM price_history
             WHERE ticker = ?1 AND exchange = ?2 AND stream = ?3
               AND timestamp >= ?4 AND timestamp <= ?5
             ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(
            params![ticker, exchange, stream.as_str(), window.start, window.end],
            |row| {
                Ok(RawRecord {
                    timestamp: row.get(0)?,
                    value: row.get(1)?,
                })
            },
        )?;
        let records = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(
            "Fetched {} {} records for {}@{} from SQLite",
            records.len(),
            stream,
            ticker,
            exchange
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(stream: Stream, timestamp: i64, value: f64) -> Tick {
        Tick {
            ticker: "ETH_BTC".to_string(),
            exchange: "binance".to_string(),
            stream,
            value,
            timestamp,
        }
    }

    #[test]
    fn test_insert_is_write_once() {
        let history = SqliteHistory::new_in_memory().unwrap();
        assert!(history.insert(&tick(Stream::Price, 100, 1.0)).unwrap());
        assert!(!history.insert(&tick(Stream::Price, 100, 2.0)).unwrap());
    }

    #[test]
    fn test_fetch_filters_stream_and_window() {
        let history = SqliteHistory::new_in_memory().unwrap();
        for ts in [90, 100, 150, 200, 201] {
            history.insert(&tick(Stream::Price, ts, ts as f64)).unwrap();
        }
        history.insert(&tick(Stream::Volume, 120, 5.0)).unwrap();

        let records = history
            .fetch_raw_records("ETH_BTC", "binance", Stream::Price, TimeWindow { start: 100, end: 200 })
            .unwrap();
        let timestamps: Vec<i64> = records.iter().map(|r| r.timestamp).collect();
        assert_eq!(timestamps, vec![100, 150, 200]);

        let other = history
            .fetch_raw_records("XRP_BTC", "binance", Stream::Price, TimeWindow { start: 0, end: 300 })
            .unwrap();
        assert!(other.is_empty());
    }
}
