//! Tests for dialect statement sets and the query composer
//!
//! These tests verify:
//! - The statements each dialect generates for a table
//! - Prefix / limit / offset fragment composition
//! - Escaping of pattern metacharacters in spliced prefixes
//! - Table name validation

use sqlstore::composer::compose;
use sqlstore::dialect::{PatternSyntax, Statement};
use sqlstore::{DatastoreError, Dialect, Filter, Key, Op, Order, PostgresDialect, Query, SqliteDialect};

// =============================================================================
// Statement Sets
// =============================================================================

#[test]
fn test_sqlite_statements() {
    let s = SqliteDialect.statements("blocks").unwrap();

    assert_eq!(s.dialect(), "sqlite");
    assert_eq!(s.sql(Statement::Delete), "DELETE FROM blocks WHERE key = $1");
    assert_eq!(
        s.sql(Statement::Exists),
        "SELECT exists(SELECT 1 FROM blocks WHERE key = $1)"
    );
    assert_eq!(s.sql(Statement::Get), "SELECT data FROM blocks WHERE key = $1");
    assert_eq!(
        s.sql(Statement::Put),
        "INSERT OR REPLACE INTO blocks(key, data) VALUES($1, $2)"
    );
    assert_eq!(s.sql(Statement::Query), "SELECT key, data FROM blocks");
    assert_eq!(
        s.sql(Statement::GetSize),
        "SELECT length(data) FROM blocks WHERE key = $1"
    );
    assert_eq!(s.prefix().syntax(), PatternSyntax::Glob);
    assert_eq!(s.unbounded_limit(), Some(" LIMIT -1"));
}

#[test]
fn test_postgres_statements() {
    let s = PostgresDialect.statements("blocks").unwrap();

    assert_eq!(s.dialect(), "postgres");
    assert_eq!(
        s.sql(Statement::Put),
        "INSERT INTO blocks (key, data) VALUES ($1, $2) ON CONFLICT (key) DO UPDATE SET data = $2"
    );
    assert_eq!(
        s.sql(Statement::GetSize),
        "SELECT octet_length(data) FROM blocks WHERE key = $1"
    );
    assert_eq!(s.prefix().syntax(), PatternSyntax::Like);
    assert_eq!(s.unbounded_limit(), None);
}

#[test]
fn test_table_name_is_baked_in() {
    let s = SqliteDialect.statements("public_blocks").unwrap();

    assert_eq!(s.table(), "public_blocks");
    assert_eq!(s.sql(Statement::Query), "SELECT key, data FROM public_blocks");
}

#[test]
fn test_schema_qualified_table_accepted() {
    assert!(PostgresDialect.statements("store.blocks").is_ok());
}

#[test]
fn test_invalid_table_names_rejected() {
    for table in ["", "1blocks", "blocks x", "a.b.c", "blocks;--", "b'x"] {
        let err = SqliteDialect.statements(table).unwrap_err();
        assert!(matches!(err, DatastoreError::Config(_)), "table {:?}", table);
    }
}

// =============================================================================
// Fragments
// =============================================================================

#[test]
fn test_prefix_fragment_appends_separator() {
    let sqlite = SqliteDialect.statements("blocks").unwrap();
    let postgres = PostgresDialect.statements("blocks").unwrap();

    assert_eq!(
        sqlite.prefix().render(&Key::new("/a")),
        " WHERE key GLOB '/a/*' ORDER BY key"
    );
    assert_eq!(
        postgres.prefix().render(&Key::new("/a")),
        " WHERE key LIKE '/a/%' ESCAPE '\\' ORDER BY key"
    );
}

#[test]
fn test_prefix_fragment_escapes_metacharacters() {
    let sqlite = SqliteDialect.statements("blocks").unwrap();
    let postgres = PostgresDialect.statements("blocks").unwrap();

    assert_eq!(
        sqlite.prefix().render(&Key::new("/a*b?[c]'d")),
        " WHERE key GLOB '/a[*]b[?][[]c]''d/*' ORDER BY key"
    );
    assert_eq!(
        postgres.prefix().render(&Key::new("/a%b_c\\d'e")),
        " WHERE key LIKE '/a\\%b\\_c\\\\d''e/%' ESCAPE '\\' ORDER BY key"
    );
}

#[test]
fn test_int_fragments() {
    let s = SqliteDialect.statements("blocks").unwrap();

    assert_eq!(s.limit().render(10), " LIMIT 10");
    assert_eq!(s.offset().render(0), " OFFSET 0");
}

#[test]
fn test_int_fragments_clamp_to_signed_range() {
    let s = PostgresDialect.statements("blocks").unwrap();

    assert_eq!(s.limit().render(u64::MAX), " LIMIT 9223372036854775807");
    assert_eq!(
        s.offset().render(i64::MAX as u64 + 1),
        " OFFSET 9223372036854775807"
    );
    assert_eq!(
        s.limit().render(i64::MAX as u64),
        " LIMIT 9223372036854775807"
    );
}

// =============================================================================
// Composer
// =============================================================================

#[test]
fn test_compose_plain() {
    let s = SqliteDialect.statements("blocks").unwrap();

    assert_eq!(compose(&s, &Query::new()), "SELECT key, data FROM blocks");
}

#[test]
fn test_compose_root_prefix_adds_nothing() {
    let s = SqliteDialect.statements("blocks").unwrap();

    assert_eq!(
        compose(&s, &Query::new().prefix("/")),
        "SELECT key, data FROM blocks"
    );
    assert_eq!(
        compose(&s, &Query::new().prefix("//")),
        "SELECT key, data FROM blocks"
    );
}

#[test]
fn test_compose_prefix_limit_offset() {
    let s = SqliteDialect.statements("blocks").unwrap();

    assert_eq!(
        compose(&s, &Query::new().prefix("a/b/").limit(10).offset(20)),
        "SELECT key, data FROM blocks WHERE key GLOB '/a/b/*' ORDER BY key LIMIT 10 OFFSET 20"
    );
}

#[test]
fn test_compose_offset_only() {
    let sqlite = SqliteDialect.statements("blocks").unwrap();
    let postgres = PostgresDialect.statements("blocks").unwrap();
    let query = Query::new().offset(3);

    assert_eq!(
        compose(&sqlite, &query),
        "SELECT key, data FROM blocks LIMIT -1 OFFSET 3"
    );
    assert_eq!(compose(&postgres, &query), "SELECT key, data FROM blocks OFFSET 3");
}

#[test]
fn test_compose_defers_limit_with_filters_or_orders() {
    let s = PostgresDialect.statements("blocks").unwrap();

    let filtered = Query::new()
        .prefix("/a")
        .filter(Filter::KeyPrefix("/a/1".to_string()))
        .limit(1)
        .offset(1);
    let ordered = Query::new().order(Order::ByValue).limit(5);
    let compared = Query::new()
        .filter(Filter::ValueCompare {
            op: Op::NotEqual,
            value: Vec::new(),
        })
        .offset(2);

    assert_eq!(
        compose(&s, &filtered),
        "SELECT key, data FROM blocks WHERE key LIKE '/a/%' ESCAPE '\\' ORDER BY key"
    );
    assert_eq!(compose(&s, &ordered), "SELECT key, data FROM blocks");
    assert_eq!(compose(&s, &compared), "SELECT key, data FROM blocks");
}
