//! Tests for Datastore queries
//!
//! These tests verify:
//! - Prefix matching respects key path boundaries
//! - Limit/offset pushed into SQL when nothing is post-processed
//! - Limit/offset deferred until after in-memory filters and orders
//! - keys_only / returns_sizes projection
//! - Scan failures terminating the stream
//! - Naive adapters on in-memory streams

use sqlstore::executor::{SqliteExecutor, PAGE_SIZE};
use sqlstore::query::naive::{self, NaiveOrder};
use sqlstore::query::{EntryStream, VecStream};
use sqlstore::{Datastore, DatastoreError, Entry, Filter, Key, Op, Order, Query, SqliteOptions};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_store(keys: &[(&str, &str)]) -> Datastore<SqliteExecutor> {
    let store = SqliteOptions::default().create().unwrap();
    for (key, value) in keys {
        store.put(&Key::new(key), value.as_bytes()).unwrap();
    }
    store
}

fn numbered_store() -> Datastore<SqliteExecutor> {
    setup_store(&[
        ("/a/3", "odd"),
        ("/a/1", "odd"),
        ("/a/5", "odd"),
        ("/a/2", "even"),
        ("/a/4", "even"),
        ("/b/1", "other"),
    ])
}

fn keys(store: &Datastore<SqliteExecutor>, query: Query) -> Vec<String> {
    store
        .query(query)
        .unwrap()
        .rest()
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect()
}

/// Store with `count` keys `/p/0000`, `/p/0001`, ...
fn paged_store(count: usize) -> Datastore<SqliteExecutor> {
    let store = SqliteOptions::default().create().unwrap();
    let mut batch = store.batch();
    for i in 0..count {
        batch
            .put(&Key::new(format!("/p/{:04}", i)), format!("v{}", i).as_bytes())
            .unwrap();
    }
    batch.commit().unwrap();
    drop(batch);
    store
}

fn entry(key: &str, value: &str) -> Entry {
    Entry {
        key: key.to_string(),
        value: Some(value.as_bytes().to_vec()),
        size: None,
    }
}

// =============================================================================
// Prefix
// =============================================================================

#[test]
fn test_prefix_respects_path_boundary() {
    let store = setup_store(&[
        ("/b/1", "v3"),
        ("/a/2", "v2"),
        ("/ab", "x"),
        ("/ab/1", "y"),
        ("/a/1", "v1"),
    ]);

    assert_eq!(keys(&store, Query::new().prefix("/a")), vec!["/a/1", "/a/2"]);
}

#[test]
fn test_prefix_is_normalized() {
    let store = setup_store(&[("/a/b/1", "v"), ("/a/c/1", "v")]);

    assert_eq!(keys(&store, Query::new().prefix("a//b/")), vec!["/a/b/1"]);
}

#[test]
fn test_root_and_empty_prefix_match_everything() {
    let store = setup_store(&[("/a/1", "v"), ("/b", "v")]);

    let mut root = keys(&store, Query::new().prefix("/"));
    let mut empty = keys(&store, Query::new());
    root.sort();
    empty.sort();

    assert_eq!(root, vec!["/a/1", "/b"]);
    assert_eq!(empty, root);
}

#[test]
fn test_prefix_with_glob_metacharacters_matches_literally() {
    let store = setup_store(&[("/a*/1", "v"), ("/ab/1", "v"), ("/a?/1", "v")]);

    assert_eq!(keys(&store, Query::new().prefix("/a*")), vec!["/a*/1"]);
    assert_eq!(keys(&store, Query::new().prefix("/a?")), vec!["/a?/1"]);
}

#[test]
fn test_prefix_with_quote() {
    let store = setup_store(&[("/it's/1", "v"), ("/its/1", "v")]);

    assert_eq!(keys(&store, Query::new().prefix("/it's")), vec!["/it's/1"]);
}

// =============================================================================
// Limit & Offset
// =============================================================================

#[test]
fn test_limit_and_offset_in_sql() {
    let store = numbered_store();

    assert_eq!(
        keys(&store, Query::new().prefix("/a").limit(2).offset(1)),
        vec!["/a/2", "/a/3"]
    );
}

#[test]
fn test_offset_without_limit() {
    let store = numbered_store();

    assert_eq!(
        keys(&store, Query::new().prefix("/a").offset(3)),
        vec!["/a/4", "/a/5"]
    );
}

#[test]
fn test_limit_zero_returns_nothing() {
    let store = numbered_store();

    assert!(keys(&store, Query::new().prefix("/a").limit(0)).is_empty());
}

#[test]
fn test_max_limit_means_no_limit() {
    let store = numbered_store();

    assert_eq!(keys(&store, Query::new().prefix("/a").limit(u64::MAX)).len(), 5);
    assert_eq!(
        keys(&store, Query::new().prefix("/a").limit(u64::MAX).offset(4)),
        vec!["/a/5"]
    );
}

#[test]
fn test_max_offset_returns_nothing() {
    let store = numbered_store();

    assert!(keys(&store, Query::new().offset(u64::MAX)).is_empty());
}

#[test]
fn test_order_defers_limit_and_offset() {
    let store = numbered_store();

    let query = Query::new()
        .prefix("/a")
        .order(Order::ByKeyDescending)
        .limit(1)
        .offset(1);

    assert_eq!(keys(&store, query), vec!["/a/4"]);
}

#[test]
fn test_filter_defers_limit_and_offset() {
    let store = numbered_store();

    let query = Query::new()
        .prefix("/a")
        .filter(Filter::ValueCompare {
            op: Op::Equal,
            value: b"odd".to_vec(),
        })
        .limit(1)
        .offset(1);

    assert_eq!(keys(&store, query), vec!["/a/3"]);
}

#[test]
fn test_order_by_value_then_key() {
    let store = numbered_store();

    let query = Query::new().prefix("/a").order(Order::ByValue);

    assert_eq!(
        keys(&store, query),
        vec!["/a/2", "/a/4", "/a/1", "/a/3", "/a/5"]
    );
}

#[test]
fn test_key_filters_combine() {
    let store = numbered_store();

    let query = Query::new()
        .filter(Filter::KeyPrefix("/a/".to_string()))
        .filter(Filter::KeyCompare {
            op: Op::GreaterThanOrEqual,
            key: "/a/4".to_string(),
        })
        .order(Order::ByKey);

    assert_eq!(keys(&store, query), vec!["/a/4", "/a/5"]);
}

// =============================================================================
// Projection
// =============================================================================

#[test]
fn test_default_results_carry_values() {
    let store = setup_store(&[("/x", "hello")]);

    let entries = store.query(Query::new()).unwrap().rest().unwrap();

    assert_eq!(entries, vec![entry("/x", "hello")]);
}

#[test]
fn test_keys_only_with_sizes() {
    let store = setup_store(&[("/x", "hello")]);

    let entries = store
        .query(Query::new().keys_only().returns_sizes())
        .unwrap()
        .rest()
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, "/x");
    assert_eq!(entries[0].value, None);
    assert_eq!(entries[0].size, Some(5));
}

// =============================================================================
// Streams
// =============================================================================

#[test]
fn test_results_keep_query_and_close_twice() {
    let store = numbered_store();
    let query = Query::new().prefix("/a").limit(2);

    let mut results = store.query(query.clone()).unwrap();
    assert_eq!(results.query(), &query);

    let first = results.next().unwrap().unwrap();
    assert_eq!(first.key, "/a/1");

    results.close().unwrap();
    results.close().unwrap();
    assert!(results.next().is_none());
}

#[test]
fn test_raw_query_skips_post_processing() {
    let store = numbered_store();

    let query = Query::new()
        .prefix("/a")
        .order(Order::ByKeyDescending)
        .limit(1);

    let raw: Vec<String> = store
        .raw_query(&query)
        .unwrap()
        .map(|e| e.unwrap().key)
        .collect();

    assert_eq!(raw, vec!["/a/1", "/a/2", "/a/3", "/a/4", "/a/5"]);
}

#[test]
fn test_scan_error_terminates_stream() {
    let store = setup_store(&[("/a", "ok"), ("/c", "ok")]);
    store
        .executor()
        .execute_batch("INSERT INTO blocks(key, data) VALUES ('/b', 1.5)")
        .unwrap();

    let mut stream = store.raw_query(&Query::new()).unwrap();

    assert_eq!(stream.next().unwrap().unwrap().key, "/a");
    assert!(matches!(
        stream.next().unwrap().unwrap_err(),
        DatastoreError::Scan(_)
    ));
    assert!(stream.next().is_none());
    assert!(stream.is_done());
}

#[test]
fn test_rest_returns_first_error() {
    let store = setup_store(&[("/a", "ok")]);
    store
        .executor()
        .execute_batch("INSERT INTO blocks(key, data) VALUES ('/b', 1.5)")
        .unwrap();

    let err = store.query(Query::new()).unwrap().rest().unwrap_err();
    assert!(matches!(err, DatastoreError::Scan(_)));
}

#[test]
fn test_results_span_several_pages() {
    let count = PAGE_SIZE * 2 + 17;
    let store = paged_store(count);

    let all = keys(&store, Query::new().prefix("/p"));
    assert_eq!(all.len(), count);
    assert_eq!(all[0], "/p/0000");
    assert_eq!(all[count - 1], format!("/p/{:04}", count - 1));
    assert!(all.windows(2).all(|pair| pair[0] < pair[1]));

    let window = keys(&store, Query::new().prefix("/p").offset(10).limit(PAGE_SIZE as u64 + 5));
    assert_eq!(window.len(), PAGE_SIZE + 5);
    assert_eq!(window[0], "/p/0010");
    assert_eq!(window[PAGE_SIZE + 4], format!("/p/{:04}", PAGE_SIZE + 14));
}

#[test]
fn test_rows_are_fetched_on_demand() {
    let store = paged_store(PAGE_SIZE + 10);

    let mut results = store.query(Query::new().prefix("/p")).unwrap();
    let first = results.next().unwrap().unwrap();
    assert_eq!(first.key, "/p/0000");

    // Written after the first page was read, picked up by a later one
    store.put(&Key::new("/p/9999"), b"late").unwrap();

    let rest: Vec<String> = results.map(|e| e.unwrap().key).collect();
    assert_eq!(rest.len(), PAGE_SIZE + 10);
    assert_eq!(rest.last().map(String::as_str), Some("/p/9999"));
}

#[test]
fn test_delete_while_iterating() {
    let count = PAGE_SIZE + 3;
    let store = paged_store(count);

    let mut deleted = 0;
    for entry in store.query(Query::new().prefix("/p").keys_only()).unwrap() {
        store.delete(&Key::new(entry.unwrap().key)).unwrap();
        deleted += 1;
    }

    assert_eq!(deleted, count);
    assert!(keys(&store, Query::new().prefix("/p")).is_empty());
}

// =============================================================================
// Naive Adapters
// =============================================================================

#[test]
fn test_naive_apply_order_of_stages() {
    let source = VecStream::new(vec![
        Ok(entry("/c", "1")),
        Ok(entry("/a", "1")),
        Ok(entry("/d", "2")),
        Ok(entry("/b", "1")),
    ]);
    let query = Query::new()
        .filter(Filter::ValueCompare {
            op: Op::Equal,
            value: b"1".to_vec(),
        })
        .order(Order::ByKey)
        .offset(1)
        .limit(1);

    let out: Vec<String> = naive::apply(source, &query)
        .map(|e| e.unwrap().key)
        .collect();

    assert_eq!(out, vec!["/b"]);
}

#[test]
fn test_naive_order_reports_upstream_error_only() {
    let source = VecStream::new(vec![
        Ok(entry("/b", "v")),
        Err(DatastoreError::Scan("bad row".to_string())),
        Ok(entry("/a", "v")),
    ]);

    let mut ordered = NaiveOrder::new(source, vec![Order::ByKey]);

    assert!(matches!(
        ordered.next().unwrap().unwrap_err(),
        DatastoreError::Scan(_)
    ));
    assert!(ordered.next().is_none());
    ordered.close().unwrap();
}

#[test]
fn test_naive_apply_without_post_processing_passes_through() {
    let source = VecStream::new(vec![Ok(entry("/b", "v")), Ok(entry("/a", "v"))]);
    let query = Query::new().limit(1);

    let out: Vec<String> = naive::apply(source, &query)
        .map(|e| e.unwrap().key)
        .collect();

    // SQL already applied the limit
    assert_eq!(out, vec!["/b", "/a"]);
}
