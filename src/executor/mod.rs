//! Executor Module
//!
//! The seam between the datastore and a SQL engine.
//!
//! ## Responsibilities
//! - Run parameterized point statements (scalar result or affected-row count)
//! - Open forward-only cursors for bulk selects
//! - Open transactions with execute/commit/rollback
//!
//! The datastore never sees engine types: rows come back as [`SqlValue`]s
//! and failures as [`DatastoreError`](crate::DatastoreError). A "no row"
//! outcome is `Ok(None)`, never an error, so the store decides what it means.

mod sqlite;
#[cfg(feature = "postgres")]
mod pg;

pub use self::sqlite::{SqliteCursor, SqliteExecutor, SqliteTransaction, PAGE_SIZE};
#[cfg(feature = "postgres")]
pub use self::pg::{PostgresCursor, PostgresExecutor, PostgresTransaction, FETCH_SIZE};

use crate::error::Result;

/// A bound statement parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param<'a> {
    Text(&'a str),
    Blob(&'a [u8]),
}

/// A single column value as returned by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Column type name, used in scan errors
    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "boolean",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Blob(_) => "blob",
        }
    }
}

/// A synchronous SQL executor owning one connection (or pool)
pub trait Executor {
    type Tx<'a>: Transaction + 'a
    where
        Self: 'a;

    type Rows<'a>: Cursor + 'a
    where
        Self: 'a;

    /// Connectivity probe
    fn ping(&self) -> Result<()>;

    /// Run a statement, returning the number of affected rows
    fn execute(&self, sql: &str, params: &[Param<'_>]) -> Result<u64>;

    /// First column of the first row, or `None` when no row matched
    fn query_row(&self, sql: &str, params: &[Param<'_>]) -> Result<Option<SqlValue>>;

    /// Open a lazy cursor over a two-column (key, data) select
    fn query(&self, sql: &str) -> Result<Self::Rows<'_>>;

    /// Start a transaction owned by the caller
    ///
    /// Statements issued through the executor itself while the transaction
    /// is open must not run inside it.
    fn begin(&self) -> Result<Self::Tx<'_>>;

    /// Release the underlying connection
    fn close(self) -> Result<()>;
}

/// An open transaction
///
/// Implementations roll back on drop if neither `commit` nor `rollback`
/// completed, so a connection is never left inside a transaction.
pub trait Transaction {
    fn execute(&mut self, sql: &str, params: &[Param<'_>]) -> Result<u64>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}

/// Forward-only cursor over (key, data) rows
pub trait Cursor {
    /// Next row, or `None` once exhausted
    fn next_row(&mut self) -> Result<Option<(SqlValue, SqlValue)>>;

    /// Release the cursor; calling it again is a no-op
    fn close(&mut self) -> Result<()>;
}
