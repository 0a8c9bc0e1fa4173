//! Query Composer
//!
//! Builds the bulk select for a logical [`Query`] by appending dialect
//! fragments to the base statement.
//!
//! ## Steps
//! 1. Start from the dialect's bulk select
//! 2. Append the prefix fragment unless the prefix is empty or the root
//! 3. Append LIMIT / OFFSET, but only when nothing will be filtered or
//!    reordered in memory afterwards; otherwise the window would be cut
//!    before the rows that belong in it are known

use crate::dialect::{Statement, StatementSet};
use crate::key::Key;
use crate::query::Query;

/// Compose the SQL text for `query`
///
/// The result takes no bound parameters: the prefix is spliced as a
/// canonical key and limit/offset as integers.
pub fn compose(statements: &StatementSet, query: &Query) -> String {
    let mut sql = statements.sql(Statement::Query).to_string();

    if !query.prefix.is_empty() {
        let prefix = Key::new(&query.prefix);
        if !prefix.is_root() {
            sql.push_str(&statements.prefix().render(&prefix));
        }
    }

    if !query.needs_post_processing() {
        match (query.limit, query.offset) {
            (Some(limit), offset) => {
                sql.push_str(&statements.limit().render(limit));
                if let Some(offset) = offset {
                    sql.push_str(&statements.offset().render(offset));
                }
            }
            (None, Some(offset)) => {
                if let Some(unbounded) = statements.unbounded_limit() {
                    sql.push_str(unbounded);
                }
                sql.push_str(&statements.offset().render(offset));
            }
            (None, None) => {}
        }
    }

    sql
}
