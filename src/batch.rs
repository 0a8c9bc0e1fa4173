//! Batch / Transaction Manager
//!
//! Groups writes into one transaction.
//!
//! ## State Machine
//! ```text
//!   Unopened ──put/delete──▶ Open ──commit──▶ Committed
//!      │                      │
//!      │                      └──any failure / rollback──▶ RolledBack
//!      └──commit──▶ error (nothing to commit)
//! ```
//!
//! - The transaction opens lazily on the first write
//! - Each write executes immediately inside the transaction
//! - A failed write rolls back everything and leaves the batch `RolledBack`
//! - Terminal batches reject every operation

use crate::dialect::{Statement, StatementSet};
use crate::error::{DatastoreError, Result};
use crate::executor::{Executor, Param, Transaction};
use crate::key::Key;

/// Observable batch state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Unopened,
    Open,
    Committed,
    RolledBack,
}

enum BatchState<T> {
    Unopened,
    Open(T),
    Committed,
    RolledBack,
}

/// A write group backed by a lazily opened transaction
pub struct Batch<'a, E: Executor + 'a> {
    executor: &'a E,
    statements: &'a StatementSet,
    state: BatchState<E::Tx<'a>>,
}

impl<'a, E: Executor + 'a> Batch<'a, E> {
    pub(crate) fn new(executor: &'a E, statements: &'a StatementSet) -> Self {
        Self {
            executor,
            statements,
            state: BatchState::Unopened,
        }
    }

    /// Stage an upsert of `key`
    pub fn put(&mut self, key: &Key, value: &[u8]) -> Result<()> {
        let sql = self.statements.sql(Statement::Put);
        self.execute(sql, &[Param::Text(key.as_str()), Param::Blob(value)])?;
        Ok(())
    }

    /// Stage a delete of `key`; absent keys are not an error inside a batch
    pub fn delete(&mut self, key: &Key) -> Result<()> {
        let sql = self.statements.sql(Statement::Delete);
        self.execute(sql, &[Param::Text(key.as_str())])?;
        Ok(())
    }

    /// Commit every staged write
    ///
    /// Committing a batch that never wrote anything is an error, so callers
    /// can tell an empty batch apart from a successful one.
    pub fn commit(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, BatchState::RolledBack) {
            BatchState::Unopened => {
                self.state = BatchState::Unopened;
                Err(DatastoreError::TransactionState(
                    "no transaction started, cannot commit".to_string(),
                ))
            }
            BatchState::Open(mut txn) => match txn.commit() {
                Ok(()) => {
                    self.state = BatchState::Committed;
                    tracing::debug!("Batch committed");
                    Ok(())
                }
                Err(e) => {
                    if let Err(rollback_err) = txn.rollback() {
                        tracing::warn!("Rollback after failed commit failed: {}", rollback_err);
                    }
                    Err(e)
                }
            },
            BatchState::Committed => {
                self.state = BatchState::Committed;
                Err(DatastoreError::TransactionState(
                    "batch already committed".to_string(),
                ))
            }
            BatchState::RolledBack => Err(DatastoreError::TransactionState(
                "batch was rolled back".to_string(),
            )),
        }
    }

    /// Discard every staged write
    ///
    /// An unopened batch simply becomes `RolledBack`.
    pub fn rollback(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, BatchState::RolledBack) {
            BatchState::Unopened => Ok(()),
            BatchState::Open(mut txn) => txn.rollback(),
            BatchState::Committed => {
                self.state = BatchState::Committed;
                Err(DatastoreError::TransactionState(
                    "batch already committed".to_string(),
                ))
            }
            BatchState::RolledBack => Err(DatastoreError::TransactionState(
                "batch was rolled back".to_string(),
            )),
        }
    }

    pub fn status(&self) -> BatchStatus {
        match self.state {
            BatchState::Unopened => BatchStatus::Unopened,
            BatchState::Open(_) => BatchStatus::Open,
            BatchState::Committed => BatchStatus::Committed,
            BatchState::RolledBack => BatchStatus::RolledBack,
        }
    }

    /// Run one statement in the transaction, opening it if needed
    fn execute(&mut self, sql: &str, params: &[Param<'_>]) -> Result<u64> {
        let txn = self.transaction()?;

        match txn.execute(sql, params) {
            Ok(affected) => Ok(affected),
            Err(e) => {
                tracing::debug!("Batch statement failed, rolling back: {}", e);
                self.abort();
                Err(e)
            }
        }
    }

    fn transaction(&mut self) -> Result<&mut E::Tx<'a>> {
        match self.state {
            BatchState::Unopened => {
                let txn = self.executor.begin()?;
                tracing::trace!("Batch transaction opened");
                self.state = BatchState::Open(txn);
            }
            BatchState::Open(_) => {}
            BatchState::Committed => {
                return Err(DatastoreError::TransactionState(
                    "batch already committed".to_string(),
                ))
            }
            BatchState::RolledBack => {
                return Err(DatastoreError::TransactionState(
                    "batch was rolled back".to_string(),
                ))
            }
        }

        match &mut self.state {
            BatchState::Open(txn) => Ok(txn),
            _ => Err(DatastoreError::TransactionState(
                "transaction not open".to_string(),
            )),
        }
    }

    /// Roll back after a failure; the rollback's own error is only logged
    fn abort(&mut self) {
        if let BatchState::Open(mut txn) = std::mem::replace(&mut self.state, BatchState::RolledBack)
        {
            if let Err(e) = txn.rollback() {
                tracing::warn!("Batch rollback failed: {}", e);
            }
        }
    }
}

impl<'a, E: Executor + 'a> Drop for Batch<'a, E> {
    fn drop(&mut self) {
        if let BatchState::Open(txn) = &mut self.state {
            tracing::debug!("Dropping open batch, rolling back");
            if let Err(e) = txn.rollback() {
                tracing::warn!("Batch rollback on drop failed: {}", e);
            }
        }
    }
}
