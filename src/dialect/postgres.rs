//! PostgreSQL dialect
//!
//! `ON CONFLICT ... DO UPDATE` for upserts and `LIKE` for prefix matching.

use super::{Dialect, PatternSyntax};

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn upsert(&self, table: &str) -> String {
        format!(
            "INSERT INTO {} (key, data) VALUES ($1, $2) ON CONFLICT (key) DO UPDATE SET data = $2",
            table
        )
    }

    fn length_function(&self) -> &'static str {
        "octet_length"
    }

    fn pattern_syntax(&self) -> PatternSyntax {
        PatternSyntax::Like
    }
}
