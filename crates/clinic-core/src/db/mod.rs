//! Database layer for clinic records.

mod appointments;
mod examinations;
mod patients;
mod schema;

#[allow(unused_imports)]
pub use appointments::*;
#[allow(unused_imports)]
pub use examinations::*;
#[allow(unused_imports)]
pub use patients::*;
pub use schema::*;

use rusqlite::{Connection, ToSql};
use std::path::Path;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a single transaction.
    ///
    /// Commits when `f` returns `Ok`; rolls back on `Err`. Must not be nested.
    pub fn in_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| E::from(DbError::from(e)))?;
        let value = f(self)?;
        tx.commit().map_err(|e| E::from(DbError::from(e)))?;
        Ok(value)
    }
}

/// Accumulates `AND`-joined conditions with positional parameters.
#[derive(Default)]
pub(crate) struct WhereClause {
    conditions: Vec<String>,
    values: Vec<Box<dyn ToSql>>,
}

impl WhereClause {
    /// Add a condition containing one `?` bound to `value`.
    pub fn push<V: ToSql + 'static>(&mut self, condition: &str, value: V) {
        self.conditions.push(condition.to_string());
        self.values.push(Box::new(value));
    }

    /// Add a condition with no parameters.
    pub fn push_raw(&mut self, condition: &str) {
        self.conditions.push(condition.to_string());
    }

    /// Append a trailing parameter (e.g. LIMIT/OFFSET) after the conditions.
    pub fn bind<V: ToSql + 'static>(&mut self, value: V) {
        self.values.push(Box::new(value));
    }

    /// The ` WHERE ...` fragment, or an empty string.
    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn params(&self) -> impl Iterator<Item = &dyn ToSql> {
        self.values.iter().map(|v| v.as_ref())
    }
}

/// `?, ?, ?` for an `IN (...)` list of `n` items.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
