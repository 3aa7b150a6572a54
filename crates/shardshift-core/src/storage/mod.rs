//! Storage layer for shardshift.
//!
//! This module provides sled-backed persistent tables with ordered and
//! exact-match secondary indexes, plus in-memory staging tables. It exposes
//! exactly what the range extractor needs: insert, delete by identity,
//! delete-safe forward iteration, schema access and index lookup.

mod config;
mod engine;
mod exact_index;
mod index;
mod ordered_index;
mod row;
mod schema;
mod table;
mod temp_table;

pub mod key;

pub use config::StorageConfig;
pub use engine::StorageEngine;
pub use index::{IndexCursor, IndexDef, IndexKind, TableIndex};
pub use key::RowId;
pub use row::Row;
pub use schema::{ColumnDef, Schema, DEFAULT_VARIABLE_SIZE};
pub use table::{PersistentTable, TableCursor, TableDef};
pub use temp_table::TempTable;
