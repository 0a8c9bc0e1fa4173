//! Naive in-memory post-processing
//!
//! Adapters applied to an [`EntryStream`] when the query carries filters or
//! custom orders. Each adapter forwards `close()` to its source.

use crate::error::Result;

use super::{compare_entries, Entry, EntryStream, Filter, Order, Query};

/// Wrap `stream` with the post-processing `query` requires
///
/// Order is fixed: filters, then orders, then offset, then limit. Offset and
/// limit are only applied here when SQL could not apply them.
pub fn apply<'a, S>(stream: S, query: &Query) -> Box<dyn EntryStream + 'a>
where
    S: EntryStream + 'a,
{
    let mut out: Box<dyn EntryStream + 'a> = Box::new(stream);

    for filter in &query.filters {
        out = Box::new(NaiveFilter::new(out, filter.clone()));
    }

    if !query.orders.is_empty() {
        out = Box::new(NaiveOrder::new(out, query.orders.clone()));
    }

    if query.needs_post_processing() {
        if let Some(offset) = query.offset {
            out = Box::new(NaiveOffset::new(out, offset));
        }
        if let Some(limit) = query.limit {
            out = Box::new(NaiveLimit::new(out, limit));
        }
    }

    out
}

/// Drops entries that do not match a filter; errors pass through
pub struct NaiveFilter<S> {
    source: S,
    filter: Filter,
}

impl<S: EntryStream> NaiveFilter<S> {
    pub fn new(source: S, filter: Filter) -> Self {
        Self { source, filter }
    }
}

impl<S: EntryStream> Iterator for NaiveFilter<S> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.source.next()? {
                Ok(entry) if self.filter.matches(&entry) => return Some(Ok(entry)),
                Ok(_) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<S: EntryStream> EntryStream for NaiveFilter<S> {
    fn close(&mut self) -> Result<()> {
        self.source.close()
    }
}

/// Sorts the whole source in memory
///
/// The source is drained and closed on the first call to `next`. If the
/// source fails, the error is the only element produced.
pub struct NaiveOrder<S> {
    source: S,
    orders: Vec<Order>,
    sorted: Option<std::vec::IntoIter<Result<Entry>>>,
}

impl<S: EntryStream> NaiveOrder<S> {
    pub fn new(source: S, orders: Vec<Order>) -> Self {
        Self {
            source,
            orders,
            sorted: None,
        }
    }

    fn drain(&mut self) -> Vec<Result<Entry>> {
        let mut entries = Vec::new();
        let mut failure = None;

        for item in self.source.by_ref() {
            match item {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Err(e) = self.source.close() {
            failure.get_or_insert(e);
        }

        if let Some(e) = failure {
            return vec![Err(e)];
        }

        let orders = &self.orders;
        entries.sort_by(|a, b| compare_entries(orders, a, b));
        entries.into_iter().map(Ok).collect()
    }
}

impl<S: EntryStream> Iterator for NaiveOrder<S> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.sorted.is_none() {
            let buffered = self.drain();
            self.sorted = Some(buffered.into_iter());
        }
        self.sorted.as_mut()?.next()
    }
}

impl<S: EntryStream> EntryStream for NaiveOrder<S> {
    fn close(&mut self) -> Result<()> {
        self.sorted = Some(Vec::new().into_iter());
        self.source.close()
    }
}

/// Skips the first `offset` entries
pub struct NaiveOffset<S> {
    source: S,
    remaining: u64,
}

impl<S: EntryStream> NaiveOffset<S> {
    pub fn new(source: S, offset: u64) -> Self {
        Self {
            source,
            remaining: offset,
        }
    }
}

impl<S: EntryStream> Iterator for NaiveOffset<S> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let item = self.source.next()?;
            if self.remaining > 0 && item.is_ok() {
                self.remaining -= 1;
                continue;
            }
            return Some(item);
        }
    }
}

impl<S: EntryStream> EntryStream for NaiveOffset<S> {
    fn close(&mut self) -> Result<()> {
        self.source.close()
    }
}

/// Stops after `limit` entries
pub struct NaiveLimit<S> {
    source: S,
    remaining: u64,
}

impl<S: EntryStream> NaiveLimit<S> {
    pub fn new(source: S, limit: u64) -> Self {
        Self {
            source,
            remaining: limit,
        }
    }
}

impl<S: EntryStream> Iterator for NaiveLimit<S> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.source.next()?;
        if item.is_ok() {
            self.remaining -= 1;
        }
        Some(item)
    }
}

impl<S: EntryStream> EntryStream for NaiveLimit<S> {
    fn close(&mut self) -> Result<()> {
        self.source.close()
    }
}
