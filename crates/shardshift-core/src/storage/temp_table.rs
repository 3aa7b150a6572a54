//! In-memory staging tables.
//!
//! A [`TempTable`] is a throwaway full-row copy of some rows of a persistent
//! table. It is not registered in the catalog and its schema is a clone of
//! the source's.

use super::{PersistentTable, Row, Schema};
use crate::error::Error;

/// Most rows a staging table reserves room for up front.
const MAX_PRESIZED_ROWS: usize = 4096;

/// In-memory table holding staged copies of rows.
#[derive(Debug, Clone)]
pub struct TempTable {
    name: String,
    schema: Schema,
    rows: Vec<Row>,
    used_bytes: usize,
    limit_bytes: Option<usize>,
}

impl TempTable {
    /// Create an empty staging table.
    ///
    /// `initial_bytes` is only a sizing estimate: the up-front reservation
    /// is capped and storage grows on demand.
    /// `limit_bytes`, if set, is a hard cap after which inserts fail.
    pub fn new(
        name: impl Into<String>,
        schema: Schema,
        initial_bytes: usize,
        limit_bytes: Option<usize>,
    ) -> Self {
        let row_estimate = schema.max_row_size().max(1);
        Self {
            name: name.into(),
            rows: Vec::with_capacity((initial_bytes / row_estimate).min(MAX_PRESIZED_ROWS)),
            schema,
            used_bytes: 0,
            limit_bytes,
        }
    }

    /// Create an empty staging table shaped like `source`.
    pub fn copy_of(
        source: &PersistentTable,
        initial_bytes: usize,
        limit_bytes: Option<usize>,
    ) -> Self {
        Self::new(
            source.name(),
            source.schema().clone(),
            initial_bytes,
            limit_bytes,
        )
    }

    /// Name, copied from the source table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Row layout.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Staged rows in insertion order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Iterate over staged rows.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Number of staged rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows are staged.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bytes accounted to staged rows.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Hard byte limit, if any.
    pub fn limit_bytes(&self) -> Option<usize> {
        self.limit_bytes
    }

    /// Append a row.
    ///
    /// Fails on schema mismatch or when the byte limit would be exceeded; the
    /// table is unchanged on failure.
    pub fn insert(&mut self, row: Row) -> Result<(), Error> {
        self.schema.validate(&row)?;

        let requested = self.used_bytes + row.encoded_size();
        if let Some(limit) = self.limit_bytes {
            if requested > limit {
                return Err(Error::CapacityExceeded { limit, requested });
            }
        }

        self.used_bytes = requested;
        self.rows.push(row);
        Ok(())
    }

    /// Hand rows to `sink` in order, removing each one it accepts.
    ///
    /// Stops at the first row `sink` rejects; that row and every row after it
    /// stay staged. Returns the number of rows removed.
    pub fn drain_into<F>(&mut self, mut sink: F) -> Result<usize, Error>
    where
        F: FnMut(&Row) -> Result<(), Error>,
    {
        let mut done = 0;
        let result = self.rows.iter().try_for_each(|row| {
            sink(row)?;
            done += 1;
            Ok(())
        });

        let released: usize = self.rows.drain(..done).map(|r| r.encoded_size()).sum();
        self.used_bytes -= released;
        result.map(|()| done)
    }

    /// Discard every staged row and release its memory.
    pub fn clear(&mut self) {
        self.rows = Vec::new();
        self.used_bytes = 0;
    }
}

impl<'a> IntoIterator for &'a TempTable {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
