//! Configuration for sqlstore
//!
//! Per-backend options. Missing values are filled by `with_defaults`, a
//! pure function from a partial configuration to a complete one.

use std::time::Duration;

use crate::dialect::{Dialect, PostgresDialect, SqliteDialect};
use crate::error::{DatastoreError, Result};
use crate::executor::{Executor, SqliteExecutor};
#[cfg(feature = "postgres")]
use crate::executor::PostgresExecutor;
use crate::store::Datastore;

/// Default table name for every backend
pub const DEFAULT_TABLE: &str = "blocks";

// =============================================================================
// Embedded (SQLite) Options
// =============================================================================

/// Options for an embedded SQLite datastore
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqliteOptions {
    /// Driver name; only `sqlite3` is supported
    pub driver: String,

    /// Database path, `:memory:`, or `file:` URI
    pub dsn: String,

    pub table: String,

    /// Don't try to create the table
    pub no_create: bool,

    /// How long a connection waits on another writer before failing
    pub busy_timeout: Option<Duration>,

    // -------------------------------------------------------------------------
    // sqlcipher
    // -------------------------------------------------------------------------
    /// Encryption key, must be 32 bytes when set
    pub key: Vec<u8>,

    /// Cipher page size; defaults to 4096 when a key is set
    pub cipher_page_size: u32,
}

impl SqliteOptions {
    pub const DEFAULT_DRIVER: &'static str = "sqlite3";
    pub const DEFAULT_DSN: &'static str = ":memory:";
    pub const DEFAULT_CIPHER_PAGE_SIZE: u32 = 4096;
    pub const KEY_LEN: usize = 32;
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    /// Create a new options builder
    pub fn builder() -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::default()
    }

    /// Fill every unset field with its default
    pub fn with_defaults(mut self) -> Self {
        if self.driver.is_empty() {
            self.driver = Self::DEFAULT_DRIVER.to_string();
        }
        if self.dsn.is_empty() {
            self.dsn = Self::DEFAULT_DSN.to_string();
        }
        if !self.key.is_empty() && self.cipher_page_size == 0 {
            self.cipher_page_size = Self::DEFAULT_CIPHER_PAGE_SIZE;
        }
        if self.table.is_empty() {
            self.table = DEFAULT_TABLE.to_string();
        }
        if self.busy_timeout.is_none() {
            self.busy_timeout = Some(Self::DEFAULT_BUSY_TIMEOUT);
        }
        self
    }

    /// Cipher pragmas run on every connection the executor opens
    fn cipher_pragmas(&self) -> String {
        if self.key.is_empty() {
            return String::new();
        }
        // Builds without sqlcipher ignore unknown pragmas
        format!(
            "PRAGMA key = \"x'{}'\"; PRAGMA cipher_page_size = {};",
            hex::encode(&self.key),
            self.cipher_page_size
        )
    }

    /// Open the database and build a datastore over it
    ///
    /// Steps:
    /// 1. Fill defaults and validate driver and key
    /// 2. Open the connection and apply cipher and busy-timeout pragmas
    /// 3. Ping (fail fast)
    /// 4. Create the table unless `no_create` is set
    pub fn create(self) -> Result<Datastore<SqliteExecutor>> {
        let opts = self.with_defaults();

        if opts.driver != Self::DEFAULT_DRIVER {
            return Err(DatastoreError::Config(format!(
                "unsupported driver '{}', expected '{}'",
                opts.driver,
                Self::DEFAULT_DRIVER
            )));
        }
        if !opts.key.is_empty() && opts.key.len() != Self::KEY_LEN {
            return Err(DatastoreError::Config(format!(
                "bad key length, expected {} bytes, got {}",
                Self::KEY_LEN,
                opts.key.len()
            )));
        }

        let statements = SqliteDialect.statements(&opts.table)?;
        let executor = SqliteExecutor::open_with(
            &opts.dsn,
            opts.cipher_pragmas(),
            opts.busy_timeout.unwrap_or(Self::DEFAULT_BUSY_TIMEOUT),
        )?;

        executor.ping()?;

        if !opts.no_create {
            executor
                .execute_batch(&format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        key TEXT PRIMARY KEY,
                        data BLOB
                    ) WITHOUT ROWID;",
                    opts.table
                ))
                .map_err(|e| {
                    DatastoreError::Connection(format!("failed to ensure table exists: {}", e))
                })?;
        }

        tracing::info!("Opened sqlite datastore (dsn={}, table={})", opts.dsn, opts.table);
        Ok(Datastore::new(executor, statements))
    }
}

/// Builder for SqliteOptions
#[derive(Default)]
pub struct SqliteOptionsBuilder {
    options: SqliteOptions,
}

impl SqliteOptionsBuilder {
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.options.driver = driver.into();
        self
    }

    pub fn dsn(mut self, dsn: impl Into<String>) -> Self {
        self.options.dsn = dsn.into();
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.options.table = table.into();
        self
    }

    pub fn no_create(mut self, no_create: bool) -> Self {
        self.options.no_create = no_create;
        self
    }

    pub fn key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.options.key = key.into();
        self
    }

    pub fn cipher_page_size(mut self, size: u32) -> Self {
        self.options.cipher_page_size = size;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.options.busy_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> SqliteOptions {
        self.options
    }
}

// =============================================================================
// Networked (PostgreSQL) Options
// =============================================================================

/// Options for a PostgreSQL datastore
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostgresOptions {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub table: String,
}

impl PostgresOptions {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT: &'static str = "5432";
    pub const DEFAULT_USER: &'static str = "postgres";
    pub const DEFAULT_DATABASE: &'static str = "datastore";

    /// Create a new options builder
    pub fn builder() -> PostgresOptionsBuilder {
        PostgresOptionsBuilder::default()
    }

    /// Fill every unset field with its default (the password stays empty)
    pub fn with_defaults(mut self) -> Self {
        if self.host.is_empty() {
            self.host = Self::DEFAULT_HOST.to_string();
        }
        if self.port.is_empty() {
            self.port = Self::DEFAULT_PORT.to_string();
        }
        if self.user.is_empty() {
            self.user = Self::DEFAULT_USER.to_string();
        }
        if self.database.is_empty() {
            self.database = Self::DEFAULT_DATABASE.to_string();
        }
        if self.table.is_empty() {
            self.table = DEFAULT_TABLE.to_string();
        }
        self
    }

    /// Connection URL for a PostgreSQL driver
    pub fn connection_string(&self) -> String {
        let opts = self.clone().with_defaults();
        format!(
            "postgresql:///{}?host={}&port={}&user={}&password={}&sslmode=disable",
            opts.database, opts.host, opts.port, opts.user, opts.password
        )
    }

    /// Build a datastore over a caller-supplied executor connected to
    /// [`connection_string`](Self::connection_string)
    ///
    /// The executor is pinged first; an unreachable server fails here.
    pub fn create<E: Executor>(self, executor: E) -> Result<Datastore<E>> {
        let opts = self.with_defaults();
        let statements = PostgresDialect.statements(&opts.table)?;

        executor.ping()?;

        tracing::info!(
            "Opened postgres datastore (host={}:{}, database={}, table={})",
            opts.host,
            opts.port,
            opts.database,
            opts.table
        );
        Ok(Datastore::new(executor, statements))
    }

    /// Connect to the server at [`connection_string`](Self::connection_string)
    /// and build a datastore over it
    ///
    /// The table must already exist.
    #[cfg(feature = "postgres")]
    pub fn connect(self) -> Result<Datastore<PostgresExecutor>> {
        let opts = self.with_defaults();
        // Reject a bad table name before dialing
        PostgresDialect.statements(&opts.table)?;

        let executor = PostgresExecutor::connect(&opts.connection_string())?;
        opts.create(executor)
    }
}

/// Builder for PostgresOptions
#[derive(Default)]
pub struct PostgresOptionsBuilder {
    options: PostgresOptions,
}

impl PostgresOptionsBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options.host = host.into();
        self
    }

    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.options.port = port.into();
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.options.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.options.password = password.into();
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.options.database = database.into();
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.options.table = table.into();
        self
    }

    pub fn build(self) -> PostgresOptions {
        self.options
    }
}
