//! Partition range migration.
//!
//! Moves the rows of a table whose partition column value falls in a key
//! range out of the table and into a staging table, parked under a caller
//! chosen token. The caller later either confirms the move, discarding the
//! staged copies, or undoes it, putting the rows back.
//!
//! # Example
//!
//! ```ignore
//! use shardshift_core::migration::{MigrationConfig, MigrationManager};
//!
//! let mut manager = MigrationManager::new(engine, MigrationConfig::default());
//!
//! // Take warehouses 2 and 3 out of the stock table.
//! let pending = manager.extract_range(&stock, &Value::Int32(2), &Value::Int32(4), 1)?;
//! ship(pending.staged())?;
//!
//! // The receiving side acknowledged; drop the staged copies.
//! manager.confirm_extract_delete(1);
//! ```

pub mod error;
pub mod extractor;
pub mod manager;
pub mod registry;
pub mod selector;

pub use error::{ExtractError, FailureClass};
pub use extractor::{Extraction, RangeExtractor};
pub use manager::{MigrationConfig, MigrationManager, DEFAULT_INITIAL_STAGING_BYTES};
pub use registry::{ExtractionRegistry, PendingExtraction};
pub use selector::select_partition_index;
