//! Result Stream
//!
//! Lazy, single-pass iteration over a live cursor.
//!
//! ## Contract
//! - Each step scans one (key, data) row into an [`Entry`]
//! - A scan or cursor failure is yielded once as the final element
//! - `keys_only` drops value bytes; `returns_sizes` records the length
//!   measured before the value is dropped
//! - `close()` releases the cursor exactly once; dropping the stream closes it

use crate::error::{DatastoreError, Result};
use crate::executor::{Cursor, SqlValue};
use crate::query::{Entry, EntryStream};

/// Iterator of entries backed by an executor cursor
pub struct ResultStream<C: Cursor> {
    cursor: Option<C>,
    keys_only: bool,
    returns_sizes: bool,
    done: bool,
}

impl<C: Cursor> ResultStream<C> {
    pub fn new(cursor: C, keys_only: bool, returns_sizes: bool) -> Self {
        Self {
            cursor: Some(cursor),
            keys_only,
            returns_sizes,
            done: false,
        }
    }

    /// True once the stream has produced its last element
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn finish(&mut self) {
        self.done = true;
        if let Err(e) = EntryStream::close(self) {
            tracing::warn!("Failed to close result cursor: {}", e);
        }
    }

    fn scan_row(&self, key: SqlValue, data: SqlValue) -> Result<Entry> {
        let key = match key {
            SqlValue::Text(key) => key,
            SqlValue::Blob(bytes) => String::from_utf8(bytes)
                .map_err(|e| DatastoreError::Scan(format!("key is not valid UTF-8: {}", e)))?,
            other => {
                return Err(DatastoreError::Scan(format!(
                    "expected text key, found {}",
                    other.type_name()
                )))
            }
        };

        let value = match data {
            SqlValue::Blob(bytes) => bytes,
            SqlValue::Text(text) => text.into_bytes(),
            SqlValue::Null => Vec::new(),
            other => {
                return Err(DatastoreError::Scan(format!(
                    "expected blob value for key {}, found {}",
                    key,
                    other.type_name()
                )))
            }
        };

        let size = self.returns_sizes.then_some(value.len());
        let value = (!self.keys_only).then_some(value);

        Ok(Entry { key, value, size })
    }
}

impl<C: Cursor> Iterator for ResultStream<C> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let cursor = self.cursor.as_mut()?;

        match cursor.next_row() {
            Ok(Some((key, data))) => {
                let scanned = self.scan_row(key, data);
                if scanned.is_err() {
                    self.finish();
                }
                Some(scanned)
            }
            Ok(None) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl<C: Cursor> EntryStream for ResultStream<C> {
    fn close(&mut self) -> Result<()> {
        self.done = true;
        match self.cursor.take() {
            Some(mut cursor) => cursor.close(),
            None => Ok(()),
        }
    }
}

impl<C: Cursor> Drop for ResultStream<C> {
    fn drop(&mut self) {
        if let Err(e) = EntryStream::close(self) {
            tracing::warn!("Failed to close result cursor: {}", e);
        }
    }
}
