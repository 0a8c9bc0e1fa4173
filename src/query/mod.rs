//! Query Module
//!
//! Logical queries over the datastore and the results they produce.
//!
//! ## Responsibilities
//! - Describe a query: prefix, filters, orders, limit, offset, projection
//! - Post-process result streams in memory when SQL cannot do it
//! - Hand callers a closeable, single-pass sequence of entries
//!
//! ## Evaluation Order
//! ```text
//!   SQL: prefix (+ limit/offset when no filters and no orders)
//!     │
//!     ▼
//!   naive filter → naive order → naive offset → naive limit
//! ```

pub mod naive;

use std::cmp::Ordering;
use std::fmt;

use crate::error::Result;

/// A result entry (key, value size, optional value)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entry {
    pub key: String,
    /// Value bytes; `None` for keys-only queries
    pub value: Option<Vec<u8>>,
    /// Value length; set only when the query asks for sizes
    pub size: Option<usize>,
}

/// Comparison operator used by filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Op {
    /// Does `ordering` (of entry field vs. reference) satisfy the operator
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            Op::Equal => ordering == Ordering::Equal,
            Op::NotEqual => ordering != Ordering::Equal,
            Op::GreaterThan => ordering == Ordering::Greater,
            Op::GreaterThanOrEqual => ordering != Ordering::Less,
            Op::LessThan => ordering == Ordering::Less,
            Op::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Op::Equal => "==",
            Op::NotEqual => "!=",
            Op::GreaterThan => ">",
            Op::GreaterThanOrEqual => ">=",
            Op::LessThan => "<",
            Op::LessThanOrEqual => "<=",
        };
        f.write_str(symbol)
    }
}

/// Predicate applied to entries in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Compare value bytes (an absent value compares as empty)
    ValueCompare { op: Op, value: Vec<u8> },
    /// Compare the key string
    KeyCompare { op: Op, key: String },
    /// Plain string prefix on the key
    KeyPrefix(String),
}

impl Filter {
    pub fn matches(&self, entry: &Entry) -> bool {
        match self {
            Filter::ValueCompare { op, value } => {
                op.matches(value_bytes(entry).cmp(value.as_slice()))
            }
            Filter::KeyCompare { op, key } => op.matches(entry.key.as_str().cmp(key.as_str())),
            Filter::KeyPrefix(prefix) => entry.key.starts_with(prefix.as_str()),
        }
    }
}

/// Sort key applied to entries in memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    ByKey,
    ByKeyDescending,
    ByValue,
    ByValueDescending,
}

impl Order {
    pub fn compare(self, a: &Entry, b: &Entry) -> Ordering {
        match self {
            Order::ByKey => a.key.cmp(&b.key),
            Order::ByKeyDescending => b.key.cmp(&a.key),
            Order::ByValue => value_bytes(a).cmp(value_bytes(b)),
            Order::ByValueDescending => value_bytes(b).cmp(value_bytes(a)),
        }
    }
}

fn value_bytes(entry: &Entry) -> &[u8] {
    entry.value.as_deref().unwrap_or(&[])
}

/// Compare two entries by a list of orders, falling back to ascending key
pub fn compare_entries(orders: &[Order], a: &Entry, b: &Entry) -> Ordering {
    orders
        .iter()
        .map(|order| order.compare(a, b))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or_else(|| a.key.cmp(&b.key))
}

/// A logical query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Key path whose descendants are returned; empty or `/` means all keys
    pub prefix: String,
    pub filters: Vec<Filter>,
    pub orders: Vec<Order>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Omit value bytes from results
    pub keys_only: bool,
    /// Report value sizes in results
    pub returns_sizes: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    pub fn returns_sizes(mut self) -> Self {
        self.returns_sizes = true;
        self
    }

    /// True when filtering or ordering must happen in memory, which also
    /// forces limit and offset out of the SQL
    pub fn needs_post_processing(&self) -> bool {
        !self.filters.is_empty() || !self.orders.is_empty()
    }
}

/// A single-pass sequence of entries that owns a closeable resource
pub trait EntryStream: Iterator<Item = Result<Entry>> {
    /// Release the underlying cursor; idempotent
    fn close(&mut self) -> Result<()>;
}

impl<S: EntryStream + ?Sized> EntryStream for Box<S> {
    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// In-memory stream over already materialized entries
pub struct VecStream {
    entries: std::vec::IntoIter<Result<Entry>>,
}

impl VecStream {
    pub fn new(entries: Vec<Result<Entry>>) -> Self {
        Self {
            entries: entries.into_iter(),
        }
    }
}

impl Iterator for VecStream {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }
}

impl EntryStream for VecStream {
    fn close(&mut self) -> Result<()> {
        self.entries = Vec::new().into_iter();
        Ok(())
    }
}

/// Results of [`Datastore::query`](crate::Datastore::query)
pub struct QueryResults<'a> {
    query: Query,
    inner: Box<dyn EntryStream + 'a>,
}

impl<'a> QueryResults<'a> {
    pub fn new(query: Query, inner: Box<dyn EntryStream + 'a>) -> Self {
        Self { query, inner }
    }

    /// The query that produced these results
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Drain every remaining entry, stopping at the first error
    pub fn rest(mut self) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for item in self.inner.by_ref() {
            entries.push(item?);
        }
        self.inner.close()?;
        Ok(entries)
    }

    pub fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

impl Iterator for QueryResults<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

impl fmt::Debug for QueryResults<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResults")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}
