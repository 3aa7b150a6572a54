//! Pending extractions and the confirm/undo protocol.
//!
//! Each successful extraction is parked under its caller-chosen token until
//! the caller either confirms it (the staged copies are discarded) or undoes
//! it (the staged rows are put back into the source table).
//!
//! ```text
//! Unregistered --extract_range--> Pending --confirm--> Confirmed
//!                                     \-----undo-----> Undone
//! ```
//!
//! Entries are only ever removed by confirm or undo. A caller that never
//! finalizes a token keeps its staged rows in memory for the lifetime of
//! the registry.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::error::ExtractError;
use super::extractor::Extraction;
use crate::error::Error;
use crate::storage::key::current_timestamp;
use crate::storage::{PersistentTable, TempTable};

/// One extraction awaiting confirm or undo.
///
/// Owns its staged rows exclusively. It cannot be cloned, and confirming
/// consumes it.
#[derive(Debug)]
pub struct PendingExtraction {
    token: i32,
    source_table: String,
    staged: TempTable,
    more_remaining: bool,
    created_at: u64,
}

impl PendingExtraction {
    /// Wrap an extraction taken from `source_table`.
    pub fn new(token: i32, source_table: impl Into<String>, extraction: Extraction) -> Self {
        Self {
            token,
            source_table: source_table.into(),
            staged: extraction.staged,
            more_remaining: extraction.more_remaining,
            created_at: current_timestamp(),
        }
    }

    /// Caller-chosen token.
    pub fn token(&self) -> i32 {
        self.token
    }

    /// Name of the table the rows were taken from.
    pub fn source_table(&self) -> &str {
        &self.source_table
    }

    /// Staged copies of the extracted rows.
    pub fn staged(&self) -> &TempTable {
        &self.staged
    }

    /// Whether rows in the requested interval were left behind because of
    /// the extract byte limit.
    pub fn more_remaining(&self) -> bool {
        self.more_remaining
    }

    /// Registration time in microseconds since Unix epoch.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Finalize: discard the staged rows. Returns how many were discarded.
    pub fn confirm(mut self) -> usize {
        let discarded = self.staged.len();
        self.staged.clear();
        discarded
    }

    /// Put staged rows back into `table`, removing each one as it lands.
    ///
    /// On failure the rows not yet restored remain staged, so the call can
    /// be repeated.
    pub fn restore_into(&mut self, table: &PersistentTable) -> Result<usize, Error> {
        self.staged.drain_into(|row| table.insert(row).map(|_| ()))
    }
}

/// Token-keyed registry of pending extractions.
#[derive(Debug, Default)]
pub struct ExtractionRegistry {
    entries: HashMap<i32, PendingExtraction>,
}

impl ExtractionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending extraction under its token.
    ///
    /// A token that is already pending is rejected and the new entry is
    /// dropped.
    pub fn register(
        &mut self,
        pending: PendingExtraction,
    ) -> Result<&PendingExtraction, ExtractError> {
        match self.entries.entry(pending.token) {
            Entry::Occupied(_) => Err(ExtractError::TokenInUse(pending.token)),
            Entry::Vacant(slot) => Ok(slot.insert(pending)),
        }
    }

    /// Whether `token` is pending.
    pub fn contains(&self, token: i32) -> bool {
        self.entries.contains_key(&token)
    }

    /// The pending entry for `token`.
    pub fn get(&self, token: i32) -> Option<&PendingExtraction> {
        self.entries.get(&token)
    }

    /// Pending tokens, sorted.
    pub fn tokens(&self) -> Vec<i32> {
        let mut tokens: Vec<i32> = self.entries.keys().copied().collect();
        tokens.sort_unstable();
        tokens
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Confirm `token`. Returns the number of staged rows discarded, or
    /// `None` if the token is not pending.
    pub fn confirm(&mut self, token: i32) -> Option<usize> {
        self.entries.remove(&token).map(PendingExtraction::confirm)
    }

    /// Undo `token` by restoring its rows into `table`. Returns the number of
    /// rows restored, or `None` if the token is not pending.
    ///
    /// The entry is removed only once every row is restored.
    pub fn undo(&mut self, token: i32, table: &PersistentTable) -> Result<Option<usize>, Error> {
        let Some(pending) = self.entries.get_mut(&token) else {
            return Ok(None);
        };
        let restored = pending.restore_into(table)?;
        self.entries.remove(&token);
        Ok(Some(restored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ColumnDef, IndexDef, Row, Schema, StorageConfig, StorageEngine};
    use shardshift_proto::{ScalarType, Value};

    fn schema() -> Schema {
        Schema::new(vec![ColumnDef::new("k", ScalarType::Int32)], 0)
    }

    fn extraction(keys: &[i32]) -> Extraction {
        let mut staged = TempTable::new("t", schema(), 64, None);
        for &k in keys {
            staged.insert(Row::new(vec![Value::Int32(k)])).unwrap();
        }
        Extraction {
            staged,
            more_remaining: false,
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ExtractionRegistry::new();
        let pending = registry
            .register(PendingExtraction::new(1, "t", extraction(&[1, 2])))
            .unwrap();
        assert_eq!(pending.token(), 1);
        assert_eq!(pending.source_table(), "t");
        assert_eq!(pending.staged().len(), 2);

        assert!(registry.contains(1));
        assert_eq!(registry.tokens(), vec![1]);
    }

    #[test]
    fn test_register_rejects_pending_token() {
        let mut registry = ExtractionRegistry::new();
        registry
            .register(PendingExtraction::new(4, "t", extraction(&[1])))
            .unwrap();

        let err = registry
            .register(PendingExtraction::new(4, "t", extraction(&[2, 3])))
            .unwrap_err();
        assert!(matches!(err, ExtractError::TokenInUse(4)));
        // The first entry survives.
        assert_eq!(registry.get(4).unwrap().staged().len(), 1);
    }

    #[test]
    fn test_confirm_once() {
        let mut registry = ExtractionRegistry::new();
        registry
            .register(PendingExtraction::new(1, "t", extraction(&[1, 2, 3])))
            .unwrap();

        assert_eq!(registry.confirm(1), Some(3));
        assert_eq!(registry.confirm(1), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_confirm_unknown() {
        let mut registry = ExtractionRegistry::new();
        assert_eq!(registry.confirm(999), None);
    }

    #[test]
    fn test_undo_restores_rows() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let table = engine.create_table("t", schema(), vec![]).unwrap();

        let mut registry = ExtractionRegistry::new();
        registry
            .register(PendingExtraction::new(2, "t", extraction(&[5, 6])))
            .unwrap();

        assert_eq!(registry.undo(2, &table).unwrap(), Some(2));
        assert_eq!(table.row_count(), 2);
        assert!(!registry.contains(2));
        assert_eq!(registry.undo(2, &table).unwrap(), None);
    }

    #[test]
    fn test_undo_partial_failure_keeps_remainder() {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let table = engine
            .create_table("t", schema(), vec![IndexDef::ordered("pk", 0).unique()])
            .unwrap();
        // Occupy key 7 so restoring it collides.
        table.insert(&Row::new(vec![Value::Int32(7)])).unwrap();

        let mut registry = ExtractionRegistry::new();
        registry
            .register(PendingExtraction::new(3, "t", extraction(&[6, 7, 8])))
            .unwrap();

        let err = registry.undo(3, &table).unwrap_err();
        assert!(matches!(err, Error::UniqueViolation { .. }));

        let remaining = registry.get(3).unwrap().staged();
        assert_eq!(remaining.len(), 2);
        assert_eq!(table.row_count(), 2);
    }
}
