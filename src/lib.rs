//! # sqlstore
//!
//! A key-value datastore over a single SQL table of (key, bytes) rows:
//! - Pluggable SQL dialects (SQLite `GLOB`, PostgreSQL `LIKE`/upsert)
//! - Queries with prefix, filters, orders, limit and offset
//! - Transactional batches with rollback on partial failure
//! - Lazy, closeable result streams
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Datastore                             │
//! │      get / put / delete / has / get_size / query / batch     │
//! └──────┬───────────────────┬──────────────────────┬───────────┘
//!        │                   │                      │
//!        ▼                   ▼                      ▼
//! ┌─────────────┐    ┌──────────────┐      ┌───────────────┐
//! │  Statement  │◀───│   Composer   │      │     Batch     │
//! │  Set        │    │ (bulk select)│      │ (state machine│
//! │ (Dialect)   │    └──────┬───────┘      │  + transaction)│
//! └─────────────┘           │              └───────┬───────┘
//!                           ▼                      │
//!                   ┌──────────────┐               │
//!                   │   Executor   │◀──────────────┘
//!                   │ (rusqlite /  │
//!                   │  postgres)   │
//!                   └──────┬───────┘
//!                          ▼
//!                   ┌──────────────┐     ┌──────────────────┐
//!                   │ ResultStream │────▶│ naive filter /   │
//!                   │  (cursor)    │     │ order / offset / │
//!                   └──────────────┘     │ limit            │
//!                                        └──────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod key;
pub mod dialect;
pub mod executor;
pub mod query;
pub mod composer;
pub mod stream;
pub mod batch;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DatastoreError, Result};
pub use config::{PostgresOptions, SqliteOptions};
pub use key::Key;
pub use dialect::{Dialect, PostgresDialect, SqliteDialect, StatementSet};
pub use executor::{Executor, SqliteExecutor};
#[cfg(feature = "postgres")]
pub use executor::PostgresExecutor;
pub use query::{Entry, Filter, Op, Order, Query, QueryResults};
pub use batch::{Batch, BatchStatus};
pub use store::Datastore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of sqlstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
