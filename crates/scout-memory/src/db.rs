//! Shared SQLite handle and column helpers.
//!
//! The knowledge graph, the learning engine and the memory system all live in
//! one database file. [`Database`] is a cheaply clonable handle to a single
//! connection so every component sees the same tables, including when the
//! database is in memory.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can arise from memory operations.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database lock poisoned")]
    LockPoisoned,
}

/// Clonable handle to one SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a persistent SQLite database at `path`.
    pub fn open(path: &Path) -> Result<Self, MemoryError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` with exclusive access to the connection.
    pub(crate) fn with<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, MemoryError>,
    ) -> Result<T, MemoryError> {
        let mut conn = self.conn.lock().map_err(|_| MemoryError::LockPoisoned)?;
        f(&mut conn)
    }
}

/// Canonical text form of a timestamp column (RFC 3339, millisecond
/// precision, `Z` suffix). Sorts lexicographically in time order.
pub(crate) fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Convert a count column to `u64`; SQLite integers are signed.
pub(crate) fn count(n: i64) -> u64 {
    n.max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_sort_lexicographically() {
        let early = ts(DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z").unwrap().into());
        let late = ts(DateTime::parse_from_rfc3339("2026-01-10T00:00:00Z").unwrap().into());
        assert_eq!(early, "2026-01-02T03:04:05.000Z");
        assert!(early < late);
    }

    #[test]
    fn handles_share_one_connection() {
        let db = Database::open_in_memory().unwrap();
        let other = db.clone();
        db.with(|c| Ok(c.execute_batch("CREATE TABLE t (x INTEGER);")?))
            .unwrap();
        let n: i64 = other
            .with(|c| Ok(c.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn bad_json_column_is_conversion_error() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .with(|c| {
                Ok(c.query_row("SELECT 'not json'", [], |r| json_col::<Vec<String>>(r, 0))?)
            })
            .unwrap_err();
        assert!(matches!(
            err,
            MemoryError::Sqlite(rusqlite::Error::FromSqlConversionFailure(0, _, _))
        ));
    }
}
