//! Record Store
//!
//! The datastore: point operations, queries and batches over one table.
//!
//! ## Responsibilities
//! - Map each point operation onto one dialect statement and one executor
//!   round-trip
//! - Translate "no matching row" into [`DatastoreError::NotFound`] (or
//!   `false` for `has`); pass every other executor error through unchanged
//! - Compose bulk selects and attach in-memory post-processing to queries
//! - Hand out [`Batch`]es bound to this datastore's executor

use crate::batch::Batch;
use crate::composer::compose;
use crate::dialect::{Statement, StatementSet};
use crate::error::{DatastoreError, Result};
use crate::executor::{Executor, Param, SqlValue};
use crate::key::Key;
use crate::query::{naive, Query, QueryResults};
use crate::stream::ResultStream;

/// Key-value datastore over a single SQL table
///
/// Owns one executor and one statement set for its whole lifetime; both are
/// released by [`Datastore::close`]. Not internally synchronized: any
/// concurrency safety comes from the executor.
pub struct Datastore<E: Executor> {
    executor: E,
    statements: StatementSet,
}

impl<E: Executor> Datastore<E> {
    /// Wrap an executor and a statement set
    ///
    /// No connectivity check happens here; the option types' `create`
    /// methods ping before constructing.
    pub fn new(executor: E, statements: StatementSet) -> Self {
        tracing::debug!(
            "Datastore ready (dialect={}, table={})",
            statements.dialect(),
            statements.table()
        );
        Self {
            executor,
            statements,
        }
    }

    /// Get the value stored under `key`
    pub fn get(&self, key: &Key) -> Result<Vec<u8>> {
        let sql = self.statements.sql(Statement::Get);
        tracing::trace!(key = %key, "get");

        match self.executor.query_row(sql, &[Param::Text(key.as_str())])? {
            None => Err(DatastoreError::NotFound),
            Some(SqlValue::Blob(bytes)) => Ok(bytes),
            Some(SqlValue::Text(text)) => Ok(text.into_bytes()),
            Some(SqlValue::Null) => Ok(Vec::new()),
            Some(other) => Err(DatastoreError::Scan(format!(
                "expected blob value for key {}, found {}",
                key,
                other.type_name()
            ))),
        }
    }

    /// Check whether `key` exists
    pub fn has(&self, key: &Key) -> Result<bool> {
        let sql = self.statements.sql(Statement::Exists);
        tracing::trace!(key = %key, "has");

        // The exists statement always yields one row; no row reads as false
        match self.executor.query_row(sql, &[Param::Text(key.as_str())])? {
            None | Some(SqlValue::Null) => Ok(false),
            Some(SqlValue::Bool(flag)) => Ok(flag),
            Some(SqlValue::Integer(flag)) => Ok(flag != 0),
            Some(other) => Err(DatastoreError::Scan(format!(
                "expected boolean from exists, found {}",
                other.type_name()
            ))),
        }
    }

    /// Insert or overwrite the value under `key`
    pub fn put(&self, key: &Key, value: &[u8]) -> Result<()> {
        let sql = self.statements.sql(Statement::Put);
        tracing::trace!(key = %key, len = value.len(), "put");

        self.executor
            .execute(sql, &[Param::Text(key.as_str()), Param::Blob(value)])?;
        Ok(())
    }

    /// Remove `key`; absent keys yield [`DatastoreError::NotFound`]
    pub fn delete(&self, key: &Key) -> Result<()> {
        let sql = self.statements.sql(Statement::Delete);
        tracing::trace!(key = %key, "delete");

        let affected = self.executor.execute(sql, &[Param::Text(key.as_str())])?;
        if affected == 0 {
            return Err(DatastoreError::NotFound);
        }
        Ok(())
    }

    /// Byte length of the value under `key`, without fetching it
    pub fn get_size(&self, key: &Key) -> Result<usize> {
        let sql = self.statements.sql(Statement::GetSize);
        tracing::trace!(key = %key, "get_size");

        match self.executor.query_row(sql, &[Param::Text(key.as_str())])? {
            None => Err(DatastoreError::NotFound),
            Some(SqlValue::Null) => Ok(0),
            Some(SqlValue::Integer(size)) => usize::try_from(size)
                .map_err(|_| DatastoreError::Scan(format!("invalid value size {}", size))),
            Some(other) => Err(DatastoreError::Scan(format!(
                "expected integer size, found {}",
                other.type_name()
            ))),
        }
    }

    /// Writes are durable once the statement returns; nothing to flush
    pub fn sync(&self, _prefix: &Key) -> Result<()> {
        Ok(())
    }

    /// Run a logical query
    ///
    /// Filters, orders, and (when either is present) offset and limit are
    /// applied in memory on top of the SQL result.
    pub fn query(&self, query: Query) -> Result<QueryResults<'_>> {
        let stream = self.raw_query(&query)?;
        let processed = naive::apply(stream, &query);
        Ok(QueryResults::new(query, processed))
    }

    /// Run only the SQL part of a query, without in-memory post-processing
    pub fn raw_query(&self, query: &Query) -> Result<ResultStream<E::Rows<'_>>> {
        let sql = compose(&self.statements, query);
        tracing::debug!("Query: {}", sql);

        let cursor = self.executor.query(&sql)?;
        Ok(ResultStream::new(
            cursor,
            query.keys_only,
            query.returns_sizes,
        ))
    }

    /// Start a new batch; its transaction opens on the first write
    pub fn batch(&self) -> Batch<'_, E> {
        Batch::new(&self.executor, &self.statements)
    }

    /// Release the executor
    pub fn close(self) -> Result<()> {
        tracing::debug!("Closing datastore (table={})", self.statements.table());
        self.executor.close()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn statements(&self) -> &StatementSet {
        &self.statements
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }
}
