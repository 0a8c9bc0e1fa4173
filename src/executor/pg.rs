//! PostgreSQL executor
//!
//! `postgres`-crate [`Executor`] for a networked server.
//!
//! ## Connections
//! - Point statements share one `Client` behind a `Mutex`
//! - Each transaction opens a connection of its own, so point statements
//!   never run inside a batch
//! - Each cursor opens a connection of its own and reads through a
//!   server-side cursor (`DECLARE ... NO SCROLL CURSOR`) inside a read-only
//!   transaction, one `FETCH` page at a time

use std::collections::VecDeque;

use parking_lot::Mutex;
use postgres::types::{ToSql, Type};
use postgres::{Client, NoTls, Row};

use super::{Cursor, Executor, Param, SqlValue, Transaction};
use crate::error::{DatastoreError, Result};

/// Rows fetched per server round-trip
pub const FETCH_SIZE: usize = 256;

const CURSOR_NAME: &str = "sqlstore_cursor";

/// Executor over a PostgreSQL server
pub struct PostgresExecutor {
    client: Mutex<Client>,
    params: String,
}

impl PostgresExecutor {
    /// Connect with a libpq-style URL or key/value string
    pub fn connect(params: &str) -> Result<Self> {
        let client = open(params)?;
        Ok(Self {
            client: Mutex::new(client),
            params: params.to_string(),
        })
    }
}

fn open(params: &str) -> Result<Client> {
    Client::connect(params, NoTls)
        .map_err(|e| DatastoreError::Connection(format!("failed to connect to postgres: {}", e)))
}

fn bind<'p>(params: &'p [Param<'_>]) -> Vec<&'p (dyn ToSql + Sync)> {
    params
        .iter()
        .map(|param| match param {
            Param::Text(text) => text as &(dyn ToSql + Sync),
            Param::Blob(bytes) => bytes as &(dyn ToSql + Sync),
        })
        .collect()
}

/// Convert one column by its declared type
fn column(row: &Row, idx: usize) -> Result<SqlValue> {
    let ty = row
        .columns()
        .get(idx)
        .map(|c| c.type_().clone())
        .ok_or_else(|| DatastoreError::Scan(format!("row has no column {}", idx)))?;

    let value = if ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool)
    } else if ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?
            .map(|v| SqlValue::Integer(i64::from(v)))
    } else if ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?
            .map(|v| SqlValue::Integer(i64::from(v)))
    } else if ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Integer)
    } else if ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?
            .map(|v| SqlValue::Real(f64::from(v)))
    } else if ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Real)
    } else if ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Blob)
    } else if [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME].contains(&ty) {
        row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
    } else {
        return Err(DatastoreError::Scan(format!(
            "unsupported column type {}",
            ty
        )));
    };

    Ok(value.unwrap_or(SqlValue::Null))
}

impl Executor for PostgresExecutor {
    type Tx<'a> = PostgresTransaction;
    type Rows<'a> = PostgresCursor;

    fn ping(&self) -> Result<()> {
        self.client
            .lock()
            .simple_query("SELECT 1")
            .map_err(|e| DatastoreError::Connection(format!("failed to ping database: {}", e)))?;
        Ok(())
    }

    fn execute(&self, sql: &str, params: &[Param<'_>]) -> Result<u64> {
        let affected = self.client.lock().execute(sql, &bind(params))?;
        Ok(affected)
    }

    fn query_row(&self, sql: &str, params: &[Param<'_>]) -> Result<Option<SqlValue>> {
        let row = self.client.lock().query_opt(sql, &bind(params))?;
        row.map(|row| column(&row, 0)).transpose()
    }

    fn query(&self, sql: &str) -> Result<PostgresCursor> {
        let mut client = open(&self.params)?;
        client.batch_execute(&format!(
            "BEGIN READ ONLY; DECLARE {} NO SCROLL CURSOR FOR {}",
            CURSOR_NAME, sql
        ))?;

        let mut cursor = PostgresCursor {
            client: Some(client),
            buffered: VecDeque::with_capacity(FETCH_SIZE),
            exhausted: false,
        };
        cursor.fill()?;
        tracing::trace!(rows = cursor.buffered.len(), "postgres cursor opened");
        Ok(cursor)
    }

    fn begin(&self) -> Result<PostgresTransaction> {
        let mut client = open(&self.params)?;
        client.batch_execute("BEGIN")?;
        Ok(PostgresTransaction {
            client,
            finished: false,
        })
    }

    fn close(self) -> Result<()> {
        self.client.into_inner().close()?;
        Ok(())
    }
}

/// Transaction on a connection of its own
pub struct PostgresTransaction {
    client: Client,
    finished: bool,
}

impl Transaction for PostgresTransaction {
    fn execute(&mut self, sql: &str, params: &[Param<'_>]) -> Result<u64> {
        if self.finished {
            return Err(DatastoreError::TransactionState(
                "transaction already finished".to_string(),
            ));
        }
        let affected = self.client.execute(sql, &bind(params))?;
        Ok(affected)
    }

    fn commit(&mut self) -> Result<()> {
        if self.finished {
            return Err(DatastoreError::TransactionState(
                "transaction already finished".to_string(),
            ));
        }
        self.client.batch_execute("COMMIT")?;
        self.finished = true;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.client.batch_execute("ROLLBACK")?;
        Ok(())
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.client.batch_execute("ROLLBACK") {
                tracing::warn!("Rollback of abandoned transaction failed: {}", e);
            }
        }
    }
}

/// Server-side cursor produced by [`PostgresExecutor::query`]
pub struct PostgresCursor {
    client: Option<Client>,
    buffered: VecDeque<(SqlValue, SqlValue)>,
    exhausted: bool,
}

impl PostgresCursor {
    fn fill(&mut self) -> Result<()> {
        let Some(client) = self.client.as_mut() else {
            self.exhausted = true;
            return Ok(());
        };

        let fetch = format!("FETCH {} FROM {}", FETCH_SIZE, CURSOR_NAME);
        let rows = client.query(fetch.as_str(), &[])?;
        if rows.len() < FETCH_SIZE {
            self.exhausted = true;
        }
        for row in &rows {
            self.buffered.push_back((column(row, 0)?, column(row, 1)?));
        }
        Ok(())
    }
}

impl Cursor for PostgresCursor {
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
        match self.client.take() {
            Some(mut client) => {
                client.batch_execute(&format!("CLOSE {}; COMMIT", CURSOR_NAME))?;
                client.close()?;
                Ok(())
            }
            None => Ok(()),
        }
    }
}
