//! Dialect Module
//!
//! Statement templates for each supported SQL dialect.
//!
//! ## Responsibilities
//! - Build the fixed set of nine statements for one table
//! - Bake the table name in at construction (never a runtime parameter)
//! - Expose the spliced fragments (prefix, limit, offset) as typed values,
//!   so only a canonical key or an integer can ever reach the SQL text
//!
//! ## Statement Set
//! ```text
//! ┌──────────────┬───────────────────────────────┬──────────────┐
//! │ Statement    │ Shape                         │ Parameters   │
//! ├──────────────┼───────────────────────────────┼──────────────┤
//! │ Delete       │ DELETE ... WHERE key = $1     │ key          │
//! │ Exists       │ SELECT exists(...)            │ key          │
//! │ Get          │ SELECT data ... WHERE key=$1  │ key          │
//! │ Put          │ dialect upsert                │ key, data    │
//! │ Query        │ SELECT key, data FROM ...     │ none         │
//! │ GetSize      │ SELECT <len>(data) ...        │ key          │
//! ├──────────────┼───────────────────────────────┼──────────────┤
//! │ prefix       │ WHERE key <match> ORDER BY key│ spliced Key  │
//! │ limit        │ LIMIT n                       │ spliced u64  │
//! │ offset       │ OFFSET n                      │ spliced u64  │
//! └──────────────┴───────────────────────────────┴──────────────┘
//! ```

mod postgres;
mod sqlite;

pub use self::postgres::PostgresDialect;
pub use self::sqlite::SqliteDialect;

use crate::error::{DatastoreError, Result};
use crate::key::{Key, SEPARATOR};

/// A SQL dialect able to produce a [`StatementSet`] for a table
///
/// Implementors only describe what differs between engines; the shared
/// statements are assembled by [`Dialect::statements`].
pub trait Dialect {
    /// Short dialect name, used in logs
    fn name(&self) -> &'static str;

    /// Upsert statement with `$1` = key and `$2` = data
    fn upsert(&self, table: &str) -> String;

    /// SQL function returning the byte length of the `data` column
    fn length_function(&self) -> &'static str;

    /// Pattern syntax used by the prefix fragment
    fn pattern_syntax(&self) -> PatternSyntax;

    /// Fragment emitted before an OFFSET that has no LIMIT, if the engine
    /// rejects a bare OFFSET
    fn unbounded_limit(&self) -> Option<&'static str> {
        None
    }

    /// Build the full statement set for `table`
    fn statements(&self, table: &str) -> Result<StatementSet> {
        validate_table_name(table)?;

        Ok(StatementSet {
            dialect: self.name(),
            table: table.to_string(),
            delete: format!("DELETE FROM {} WHERE key = $1", table),
            exists: format!("SELECT exists(SELECT 1 FROM {} WHERE key = $1)", table),
            get: format!("SELECT data FROM {} WHERE key = $1", table),
            put: self.upsert(table),
            query: format!("SELECT key, data FROM {}", table),
            get_size: format!(
                "SELECT {}(data) FROM {} WHERE key = $1",
                self.length_function(),
                table
            ),
            prefix: PrefixFragment {
                syntax: self.pattern_syntax(),
            },
            limit: IntFragment { keyword: "LIMIT" },
            offset: IntFragment { keyword: "OFFSET" },
            unbounded_limit: self.unbounded_limit(),
        })
    }
}

/// Parameterized statements, addressed by operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
    Delete,
    Exists,
    Get,
    Put,
    Query,
    GetSize,
}

/// The immutable statement bundle for one table
#[derive(Debug, Clone)]
pub struct StatementSet {
    dialect: &'static str,
    table: String,
    delete: String,
    exists: String,
    get: String,
    put: String,
    query: String,
    get_size: String,
    prefix: PrefixFragment,
    limit: IntFragment,
    offset: IntFragment,
    unbounded_limit: Option<&'static str>,
}

impl StatementSet {
    /// SQL text of a parameterized statement
    pub fn sql(&self, statement: Statement) -> &str {
        match statement {
            Statement::Delete => &self.delete,
            Statement::Exists => &self.exists,
            Statement::Get => &self.get,
            Statement::Put => &self.put,
            Statement::Query => &self.query,
            Statement::GetSize => &self.get_size,
        }
    }

    pub fn prefix(&self) -> &PrefixFragment {
        &self.prefix
    }

    pub fn limit(&self) -> &IntFragment {
        &self.limit
    }

    pub fn offset(&self) -> &IntFragment {
        &self.offset
    }

    pub fn unbounded_limit(&self) -> Option<&'static str> {
        self.unbounded_limit
    }

    pub fn dialect(&self) -> &'static str {
        self.dialect
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

/// How the prefix fragment matches keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternSyntax {
    /// `LIKE 'prefix%' ESCAPE '\'`, backslash escapes `%`, `_` and `\`
    Like,
    /// `GLOB 'prefix*'`, metacharacters wrapped in brackets
    Glob,
}

/// Prefix filter fragment; includes the `ORDER BY key` clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixFragment {
    syntax: PatternSyntax,
}

impl PrefixFragment {
    /// Render the fragment for all keys strictly below `prefix`
    ///
    /// The separator is appended here, so `/a` matches `/a/1` but never `/ab`.
    pub fn render(&self, prefix: &Key) -> String {
        let mut literal = prefix.as_str().to_string();
        literal.push(SEPARATOR);

        match self.syntax {
            PatternSyntax::Like => {
                format!(
                    " WHERE key LIKE '{}%' ESCAPE '\\' ORDER BY key",
                    escape_like(&literal)
                )
            }
            PatternSyntax::Glob => {
                format!(" WHERE key GLOB '{}*' ORDER BY key", escape_glob(&literal))
            }
        }
    }

    pub fn syntax(&self) -> PatternSyntax {
        self.syntax
    }
}

/// Integer clause fragment (`LIMIT n`, `OFFSET n`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntFragment {
    keyword: &'static str,
}

impl IntFragment {
    /// Largest value both engines accept as a LIMIT/OFFSET literal
    pub const MAX: u64 = i64::MAX as u64;

    /// Render the clause; values past [`IntFragment::MAX`] are clamped to it
    pub fn render(&self, value: u64) -> String {
        format!(" {} {}", self.keyword, value.min(Self::MAX))
    }
}

fn escape_like(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        match c {
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\'' => out.push_str("''"),
            c => out.push(c),
        }
    }
    out
}

fn escape_glob(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        match c {
            '*' | '?' | '[' => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            '\'' => out.push_str("''"),
            c => out.push(c),
        }
    }
    out
}

/// Table names are spliced into every statement, so only plain
/// (optionally schema-qualified) identifiers are accepted
fn validate_table_name(table: &str) -> Result<()> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    };

    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|p| valid_part(p)) {
        return Err(DatastoreError::Config(format!(
            "invalid table name '{}'",
            table
        )));
    }
    Ok(())
}
