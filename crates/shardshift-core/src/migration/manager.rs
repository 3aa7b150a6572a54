//! Migration manager: the extract, confirm and undo entry points.

use std::sync::Arc;

use shardshift_proto::Value;
use tracing::{debug, field, instrument, warn, Span};

use super::error::ExtractError;
use super::extractor::RangeExtractor;
use super::registry::{ExtractionRegistry, PendingExtraction};
use super::selector::select_partition_index;
use crate::storage::{PersistentTable, StorageEngine};

/// Default initial capacity of a staging table, in bytes.
pub const DEFAULT_INITIAL_STAGING_BYTES: usize = 1024;

/// Migration manager configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Capacity reserved up front for each staging table.
    pub initial_staging_bytes: usize,
    /// Hard cap on the bytes one staging table may hold. Crossing it fails
    /// the extraction midway.
    pub staging_limit_bytes: Option<usize>,
    /// Soft cap on the bytes one range extraction takes. Reaching it stops
    /// the walk cleanly and flags the result as having more remaining.
    pub extract_limit_bytes: Option<usize>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            initial_staging_bytes: DEFAULT_INITIAL_STAGING_BYTES,
            staging_limit_bytes: None,
            extract_limit_bytes: None,
        }
    }
}

impl MigrationConfig {
    /// Set the initial staging capacity.
    pub fn with_initial_staging_bytes(mut self, bytes: usize) -> Self {
        self.initial_staging_bytes = bytes;
        self
    }

    /// Set the staging table byte limit.
    pub fn with_staging_limit_bytes(mut self, bytes: usize) -> Self {
        self.staging_limit_bytes = Some(bytes);
        self
    }

    /// Set the per-extraction byte limit.
    pub fn with_extract_limit_bytes(mut self, bytes: usize) -> Self {
        self.extract_limit_bytes = Some(bytes);
        self
    }
}

/// Moves partition key ranges out of persistent tables.
///
/// One manager serves one execution context. Every successful
/// [`extract_range`](Self::extract_range) leaves a pending entry that the
/// caller must finalize with [`confirm_extract_delete`](Self::confirm_extract_delete)
/// or [`undo_extract_delete`](Self::undo_extract_delete).
pub struct MigrationManager {
    engine: Arc<StorageEngine>,
    registry: ExtractionRegistry,
    config: MigrationConfig,
}

impl MigrationManager {
    /// Create a manager over `engine`.
    pub fn new(engine: Arc<StorageEngine>, config: MigrationConfig) -> Self {
        Self {
            engine,
            registry: ExtractionRegistry::new(),
            config,
        }
    }

    /// Move the rows of `table` whose partition value lies in `[min, max)`
    /// into a staging table registered under `token`. When `min == max` the
    /// single row with that partition value is moved instead.
    ///
    /// Rows are deleted from `table` as they are staged. On
    /// [`ExtractError::StagingInsertFailure`] the rows removed before the
    /// failure are not restored and nothing is registered.
    ///
    /// `table` must have been opened through this manager's engine, since
    /// undo reopens the source by name there. Other handles are rejected
    /// with [`ExtractError::ForeignTable`] before any row is touched.
    #[instrument(
        skip_all,
        fields(table = %table.name(), min = %min, max = %max, token, rows = field::Empty)
    )]
    pub fn extract_range(
        &mut self,
        table: &PersistentTable,
        min: &Value,
        max: &Value,
        token: i32,
    ) -> Result<&PendingExtraction, ExtractError> {
        if self.registry.contains(token) {
            return Err(ExtractError::TokenInUse(token));
        }
        if table.engine_id() != self.engine.id() {
            return Err(ExtractError::ForeignTable {
                table: table.name().to_string(),
            });
        }

        let index = select_partition_index(table);
        let extraction = RangeExtractor::new(&self.config).extract(table, index, min, max)?;

        Span::current().record("rows", extraction.staged.len());
        let pending = PendingExtraction::new(token, table.name(), extraction);
        self.registry.register(pending)
    }

    /// Discard the staged rows of `token`. Returns `false` if `token` is not
    /// pending. The source table is not touched.
    pub fn confirm_extract_delete(&mut self, token: i32) -> bool {
        match self.registry.confirm(token) {
            Some(discarded) => {
                debug!(token, discarded, "Confirmed extraction");
                true
            }
            None => {
                debug!(token, "Confirm for unknown extraction token");
                false
            }
        }
    }

    /// Put the staged rows of `token` back into their source table. Returns
    /// `false` if `token` is not pending.
    ///
    /// Restoration brings back row content, not row identity or position.
    /// If a reinsert fails, the rows not yet restored stay pending under
    /// `token` and the call can be retried.
    pub fn undo_extract_delete(&mut self, token: i32) -> Result<bool, ExtractError> {
        let Some(pending) = self.registry.get(token) else {
            warn!(token, "Undo for unknown extraction token");
            return Ok(false);
        };

        let table = self.engine.open_table(pending.source_table())?;
        match self.registry.undo(token, &table)? {
            Some(restored) => {
                debug!(token, table = table.name(), restored, "Undid extraction");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The pending entry for `token`.
    pub fn pending(&self, token: i32) -> Option<&PendingExtraction> {
        self.registry.get(token)
    }

    /// Pending tokens, sorted.
    pub fn pending_tokens(&self) -> Vec<i32> {
        self.registry.tokens()
    }

    /// Number of pending extractions.
    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    /// The storage engine this manager restores into.
    pub fn engine(&self) -> &Arc<StorageEngine> {
        &self.engine
    }

    /// The manager configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }
}

impl Drop for MigrationManager {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            warn!(
                tokens = ?self.registry.tokens(),
                "Migration manager dropped with pending extractions"
            );
        }
    }
}
