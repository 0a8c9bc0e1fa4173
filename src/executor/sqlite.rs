//! SQLite executor
//!
//! rusqlite-backed [`Executor`] for the embedded engine.
//!
//! ## Connections
//! - Point statements and cursors share one connection behind a `Mutex`,
//!   held only for the duration of a single statement or page fetch
//! - Every transaction opens its own connection, so writes made outside a
//!   batch never join the batch's transaction
//! - `:memory:` is mapped to a named `memdb` database private to this
//!   executor, so every connection sees the same data
//!
//! ## Locking
//! SQLite allows one writer at a time. While a batch holds the write lock,
//! other writers wait up to the busy timeout and then fail with an
//! execution error; they are never silently folded into the batch. On an
//! in-memory database readers wait as well.
//!
//! ## Cursors
//! Cursors walk the result in key order, one page at a time. Each page is a
//! fresh statement over the shared connection (`key > last` keyset paging),
//! so no lock or read transaction is held between pages and at most one
//! page is resident. Rows written between pages may or may not be seen.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, ToSql};

use super::{Cursor, Executor, Param, SqlValue, Transaction};
use crate::error::{DatastoreError, Result};

/// Rows fetched per cursor page
pub const PAGE_SIZE: usize = 256;

/// rusqlite's own default
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

static MEMORY_DATABASES: AtomicU64 = AtomicU64::new(0);

/// Executor over a SQLite database
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
    path: String,
    pragmas: String,
    busy_timeout: Duration,
}

impl SqliteExecutor {
    /// Open a database; `:memory:`, paths and `file:` URIs are accepted
    pub fn open(dsn: &str) -> Result<Self> {
        Self::open_with(dsn, String::new(), DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a database, running `pragmas` and setting `busy_timeout` on
    /// every connection it opens
    pub fn open_with(
        dsn: &str,
        pragmas: impl Into<String>,
        busy_timeout: Duration,
    ) -> Result<Self> {
        let path = if dsn == ":memory:" {
            let id = MEMORY_DATABASES.fetch_add(1, Ordering::Relaxed);
            format!("file:/sqlstore-{}-{}?vfs=memdb", std::process::id(), id)
        } else {
            dsn.to_string()
        };
        let pragmas = pragmas.into();
        let conn = connect(&path, &pragmas, busy_timeout)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
            pragmas,
            busy_timeout,
        })
    }

    /// Run one or more statements without parameters (DDL, pragmas)
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(sql)?;
        Ok(())
    }
}

fn connect(path: &str, pragmas: &str, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| DatastoreError::Connection(format!("failed to open database: {}", e)))?;
    conn.busy_timeout(busy_timeout)
        .map_err(|e| DatastoreError::Connection(format!("failed to set busy timeout: {}", e)))?;
    if !pragmas.is_empty() {
        conn.execute_batch(pragmas).map_err(|e| {
            DatastoreError::Connection(format!("failed to configure connection: {}", e))
        })?;
    }
    Ok(conn)
}

impl Executor for SqliteExecutor {
    type Tx<'a> = SqliteTransaction;
    type Rows<'a> = SqliteCursor<'a>;

    fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| DatastoreError::Connection(format!("failed to ping database: {}", e)))?;
        Ok(())
    }

    fn execute(&self, sql: &str, params: &[Param<'_>]) -> Result<u64> {
        let conn = self.conn.lock();
        let affected = conn.execute(sql, params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn query_row(&self, sql: &str, params: &[Param<'_>]) -> Result<Option<SqlValue>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(sql, params_from_iter(params.iter()), |row| {
                row.get::<_, Value>(0)
            })
            .optional()?;
        Ok(value.map(SqlValue::from))
    }

    fn query(&self, sql: &str) -> Result<SqliteCursor<'_>> {
        let mut cursor = SqliteCursor {
            executor: self,
            first_page: format!(
                "SELECT key, data FROM ({}) ORDER BY key LIMIT {}",
                sql, PAGE_SIZE
            ),
            next_page: format!(
                "SELECT key, data FROM ({}) WHERE key > ?1 ORDER BY key LIMIT {}",
                sql, PAGE_SIZE
            ),
            buffered: VecDeque::with_capacity(PAGE_SIZE),
            last_key: None,
            exhausted: false,
        };

        // Fetch the first page now so a bad statement fails here
        cursor.fill()?;
        tracing::trace!(rows = cursor.buffered.len(), "sqlite cursor opened");
        Ok(cursor)
    }

    fn begin(&self) -> Result<SqliteTransaction> {
        let conn = connect(&self.path, &self.pragmas, self.busy_timeout)?;
        conn.execute_batch("BEGIN")?;
        Ok(SqliteTransaction {
            conn,
            finished: false,
        })
    }

    fn close(self) -> Result<()> {
        self.conn
            .into_inner()
            .close()
            .map_err(|(_, e)| DatastoreError::from(e))
    }
}

/// Transaction on a connection of its own
pub struct SqliteTransaction {
    conn: Connection,
    finished: bool,
}

impl Transaction for SqliteTransaction {
    fn execute(&mut self, sql: &str, params: &[Param<'_>]) -> Result<u64> {
        if self.finished {
            return Err(DatastoreError::TransactionState(
                "transaction already finished".to_string(),
            ));
        }
        let affected = self.conn.execute(sql, params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn commit(&mut self) -> Result<()> {
        if self.finished {
            return Err(DatastoreError::TransactionState(
                "transaction already finished".to_string(),
            ));
        }
        // A failed COMMIT leaves the transaction open for the caller's rollback
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("Rollback of abandoned transaction failed: {}", e);
            }
        }
    }
}

/// Paging cursor produced by [`SqliteExecutor::query`]
///
/// Rows come back in ascending key order whatever the wrapped select's
/// own order was.
pub struct SqliteCursor<'a> {
    executor: &'a SqliteExecutor,
    first_page: String,
    next_page: String,
    buffered: VecDeque<(SqlValue, SqlValue)>,
    last_key: Option<SqlValue>,
    exhausted: bool,
}

impl SqliteCursor<'_> {
    /// Fetch the page after `last_key`
    fn fill(&mut self) -> Result<()> {
        let executor = self.executor;
        let conn = executor.conn.lock();

        let sql = match self.last_key {
            None => &self.first_page,
            Some(_) => &self.next_page,
        };
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(self.last_key.iter()))?;

        let mut fetched = 0;
        while let Some(row) = rows.next()? {
            let key = SqlValue::from(row.get::<_, Value>(0)?);
            let data = SqlValue::from(row.get::<_, Value>(1)?);
            self.buffered.push_back((key, data));
            fetched += 1;
        }

        if fetched < PAGE_SIZE {
            self.exhausted = true;
        }
        if let Some((key, _)) = self.buffered.back() {
            self.last_key = Some(key.clone());
        }
        Ok(())
    }
}

impl Cursor for SqliteCursor<'_> {
    fn next_row(&mut self) -> Result<Option<(SqlValue, SqlValue)>> {
        if self.buffered.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.exhausted = true;
                self.buffered.clear();
                return Err(e);
            }
        }
        Ok(self.buffered.pop_front())
    }

    fn close(&mut self) -> Result<()> {
        self.exhausted = true;
        self.buffered.clear();
        Ok(())
    }
}

impl ToSql for Param<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Param::Text(text) => ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes())),
            Param::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
        })
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(match self {
            SqlValue::Null => ValueRef::Null,
            SqlValue::Bool(flag) => ValueRef::Integer(i64::from(*flag)),
            SqlValue::Integer(i) => ValueRef::Integer(*i),
            SqlValue::Real(f) => ValueRef::Real(*f),
            SqlValue::Text(text) => ValueRef::Text(text.as_bytes()),
            SqlValue::Blob(bytes) => ValueRef::Blob(bytes),
        }))
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Integer(i) => SqlValue::Integer(i),
            Value::Real(f) => SqlValue::Real(f),
            Value::Text(s) => SqlValue::Text(s),
            Value::Blob(b) => SqlValue::Blob(b),
        }
    }
}
