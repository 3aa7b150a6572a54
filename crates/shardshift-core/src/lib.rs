//! Shardshift Core - Storage collaborators and partition range migration.
//!
//! This crate provides the persistent and staging tables, the partition
//! indexes, and the extract/confirm/undo protocol used to move key ranges
//! between partitions.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod error;
pub mod migration;
pub mod storage;

pub use error::Error;
pub use migration::{
    select_partition_index, ExtractError, Extraction, ExtractionRegistry, FailureClass,
    MigrationConfig, MigrationManager, PendingExtraction, RangeExtractor,
};
pub use storage::{
    ColumnDef, IndexDef, IndexKind, PersistentTable, Row, RowId, Schema, StorageConfig,
    StorageEngine, TableIndex, TempTable,
};

/// Re-export protocol types.
pub use shardshift_proto as proto;
