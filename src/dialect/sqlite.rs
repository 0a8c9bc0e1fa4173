//! SQLite dialect
//!
//! `INSERT OR REPLACE` for upserts and `GLOB` for prefix matching.

use super::{Dialect, PatternSyntax};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn upsert(&self, table: &str) -> String {
        format!("INSERT OR REPLACE INTO {}(key, data) VALUES($1, $2)", table)
    }

    fn length_function(&self) -> &'static str {
        "length"
    }

    fn pattern_syntax(&self) -> PatternSyntax {
        PatternSyntax::Glob
    }

    // SQLite only accepts OFFSET after a LIMIT; -1 means no limit
    fn unbounded_limit(&self) -> Option<&'static str> {
        Some(" LIMIT -1")
    }
}
