//! Range extraction over a partitioned table.
//!
//! Rows whose partition value lies in `[min, max)` are copied into a staging
//! table and deleted from the source, one at a time in traversal order. The
//! traversal depends on the partition index:
//!
//! | index | `min < max` | `min == max` |
//! |-------|-------------|--------------|
//! | ordered | seek to `min`, walk until a value `>= max` | exact lookup |
//! | exact-match | full scan, filter on the interval | exact lookup |
//! | none | full scan, filter on the interval | rejected |
//!
//! Extraction is not atomic. If staging a row fails, the rows already deleted
//! from the source are not restored.

use std::cmp::Ordering;

use shardshift_proto::Value;
use tracing::{debug, error};

use super::error::ExtractError;
use super::manager::MigrationConfig;
use crate::error::Error;
use crate::storage::{IndexKind, PersistentTable, Row, RowId, TableIndex, TempTable};

/// Rows taken out of a source table, not yet registered under a token.
#[derive(Debug)]
pub struct Extraction {
    /// Staged copies of the removed rows, in traversal order.
    pub staged: TempTable,
    /// Whether the extract byte limit stopped the walk before the end of
    /// the interval.
    pub more_remaining: bool,
}

/// Drives one extraction according to a [`MigrationConfig`].
pub struct RangeExtractor<'a> {
    config: &'a MigrationConfig,
}

impl<'a> RangeExtractor<'a> {
    /// Create an extractor using `config` for staging limits.
    pub fn new(config: &'a MigrationConfig) -> Self {
        Self { config }
    }

    /// Extract the rows of `table` with partition value in `[min, max)`, or
    /// the single row with partition value `min` when `min == max`.
    ///
    /// `index` is the partition index chosen by
    /// [`select_partition_index`](super::select_partition_index).
    pub fn extract(
        &self,
        table: &PersistentTable,
        index: Option<&TableIndex>,
        min: &Value,
        max: &Value,
    ) -> Result<Extraction, ExtractError> {
        check_key_types(table, min, max)?;
        let ordering = min
            .compare(max)
            .ok_or_else(|| ExtractError::KeyTypeMismatch {
                table: table.name().to_string(),
                reason: format!("cannot compare {} with {}", min.type_name(), max.type_name()),
            })?;

        let mut run = Run::new(table, self.config);
        match ordering {
            Ordering::Greater => {
                return Err(ExtractError::InvalidRange {
                    min: min.clone(),
                    max: max.clone(),
                });
            }
            Ordering::Equal => {
                let index = index.ok_or_else(|| ExtractError::PointLookupRequiresIndex {
                    table: table.name().to_string(),
                })?;
                run.point(index, min)?;
            }
            Ordering::Less => match index {
                Some(index) => match index.kind() {
                    IndexKind::Ordered => run.ordered(index, min, max)?,
                    IndexKind::ExactMatch => run.full_scan(min, max)?,
                },
                None => run.full_scan(min, max)?,
            },
        }

        let extraction = run.finish();
        debug!(
            table = table.name(),
            rows = extraction.staged.len(),
            bytes = extraction.staged.used_bytes(),
            more_remaining = extraction.more_remaining,
            "Extracted range"
        );
        Ok(extraction)
    }
}

/// Both bounds must be acceptable values for the partition column.
fn check_key_types(table: &PersistentTable, min: &Value, max: &Value) -> Result<(), ExtractError> {
    let column = table.schema().partition_column_def().ok_or_else(|| {
        ExtractError::Storage(Error::InvalidData(format!(
            "table {} has no partition column",
            table.name()
        )))
    })?;

    for key in [min, max] {
        column
            .scalar_type
            .check(key)
            .map_err(|e| ExtractError::KeyTypeMismatch {
                table: table.name().to_string(),
                reason: format!("partition column {}: {}", column.name, e),
            })?;
    }
    Ok(())
}

/// A refused seek means the index lacks the ordered capability.
fn seek_error(index: &TableIndex, err: Error) -> ExtractError {
    match err {
        Error::UnsupportedScan { .. } => ExtractError::UnsupportedIndexKind {
            index: index.name().to_string(),
            kind: index.kind(),
        },
        other => ExtractError::Storage(other),
    }
}

fn below(value: &Value, max: &Value) -> bool {
    matches!(value.compare(max), Some(Ordering::Less))
}

fn in_range(value: &Value, min: &Value, max: &Value) -> bool {
    matches!(
        value.compare(min),
        Some(Ordering::Greater | Ordering::Equal)
    ) && below(value, max)
}

/// State of one extraction in progress.
struct Run<'t> {
    table: &'t PersistentTable,
    staged: TempTable,
    extract_limit: Option<usize>,
    deleted: usize,
    more_remaining: bool,
}

impl<'t> Run<'t> {
    fn new(table: &'t PersistentTable, config: &MigrationConfig) -> Self {
        Self {
            table,
            staged: TempTable::copy_of(
                table,
                config.initial_staging_bytes,
                config.staging_limit_bytes,
            ),
            extract_limit: config.extract_limit_bytes,
            deleted: 0,
            more_remaining: false,
        }
    }

    fn partition_value<'r>(&self, row: &'r Row) -> Result<&'r Value, ExtractError> {
        let column = self.table.partition_column();
        row.get(column).ok_or_else(|| {
            ExtractError::Storage(Error::SchemaMismatch(format!(
                "row in {} has no partition column {}",
                self.table.name(),
                column
            )))
        })
    }

    fn missing_row(&self, index: &TableIndex, row_id: RowId) -> ExtractError {
        error!(
            table = self.table.name(),
            index = index.name(),
            %row_id,
            "Index entry points at a missing row"
        );
        ExtractError::InternalConsistency {
            table: self.table.name().to_string(),
            index: index.name().to_string(),
            row_id,
        }
    }

    /// Whether staging `row` would cross the extract byte limit.
    ///
    /// The first row is always taken so every chunk makes progress.
    fn chunk_full(&mut self, row: &Row) -> bool {
        let Some(limit) = self.extract_limit else {
            return false;
        };
        if !self.staged.is_empty() && self.staged.used_bytes() + row.encoded_size() > limit {
            self.more_remaining = true;
            return true;
        }
        false
    }

    /// Stage a copy of the row, then delete it from the source.
    fn take(&mut self, id: RowId, row: Row) -> Result<(), ExtractError> {
        if let Err(source) = self.staged.insert(row) {
            error!(
                table = self.table.name(),
                rows_deleted = self.deleted,
                error = %source,
                "Failed to stage row; deleted rows are not restored"
            );
            return Err(ExtractError::StagingInsertFailure {
                table: self.table.name().to_string(),
                rows_deleted: self.deleted,
                source,
            });
        }
        self.table.delete(id)?;
        self.deleted += 1;
        Ok(())
    }

    fn point(&mut self, index: &TableIndex, key: &Value) -> Result<(), ExtractError> {
        debug!(table = self.table.name(), index = index.name(), %key, "Point extraction");
        let id = index
            .lookup(key)?
            .ok_or_else(|| ExtractError::KeyNotFound {
                table: self.table.name().to_string(),
                key: key.clone(),
            })?;
        let row = self
            .table
            .get(id)?
            .ok_or_else(|| self.missing_row(index, id))?;
        self.take(id, row)
    }

    fn ordered(&mut self, index: &TableIndex, min: &Value, max: &Value) -> Result<(), ExtractError> {
        debug!(table = self.table.name(), index = index.name(), "Ordered index walk");
        let cursor = index.seek(min).map_err(|e| seek_error(index, e))?;
        for entry in cursor {
            let id = entry?;
            let row = self
                .table
                .get(id)?
                .ok_or_else(|| self.missing_row(index, id))?;
            if !below(self.partition_value(&row)?, max) {
                break;
            }
            if self.chunk_full(&row) {
                break;
            }
            self.take(id, row)?;
        }
        Ok(())
    }

    fn full_scan(&mut self, min: &Value, max: &Value) -> Result<(), ExtractError> {
        debug!(table = self.table.name(), "Full table scan");
        for entry in self.table.scan() {
            let (id, row) = entry?;
            if !in_range(self.partition_value(&row)?, min, max) {
                continue;
            }
            if self.chunk_full(&row) {
                break;
            }
            self.take(id, row)?;
        }
        Ok(())
    }

    fn finish(self) -> Extraction {
        Extraction {
            staged: self.staged,
            more_remaining: self.more_remaining,
        }
    }
}
