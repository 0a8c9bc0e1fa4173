//! Error types for sqlstore
//!
//! Provides a unified error type for all datastore operations.

use thiserror::Error;

/// Boxed source error carried by executor failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using DatastoreError
pub type Result<T> = std::result::Result<T, DatastoreError>;

/// Unified error type for sqlstore operations
#[derive(Debug, Error)]
pub enum DatastoreError {
    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("datastore: key not found")]
    NotFound,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // -------------------------------------------------------------------------
    // Executor Errors
    // -------------------------------------------------------------------------
    /// Open or ping failed while constructing a datastore
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement was rejected by the SQL engine
    #[error("Execution error: {0}")]
    Execution(#[source] BoxError),

    /// A row could not be decoded into a key/value pair
    #[error("Scan error: {0}")]
    Scan(String),

    // -------------------------------------------------------------------------
    // Batch Errors
    // -------------------------------------------------------------------------
    #[error("Transaction state error: {0}")]
    TransactionState(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DatastoreError {
    /// Wrap any engine error as an execution failure, keeping it as the source
    pub fn execution<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DatastoreError::Execution(Box::new(err))
    }

    /// True for the not-found outcome of get/delete/get_size
    pub fn is_not_found(&self) -> bool {
        matches!(self, DatastoreError::NotFound)
    }
}

impl From<rusqlite::Error> for DatastoreError {
    fn from(err: rusqlite::Error) -> Self {
        DatastoreError::execution(err)
    }
}

#[cfg(feature = "postgres")]
impl From<postgres::Error> for DatastoreError {
    fn from(err: postgres::Error) -> Self {
        DatastoreError::execution(err)
    }
}
