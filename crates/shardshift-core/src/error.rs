//! Core error types.

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying sled error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Key decoding error.
    #[error("invalid key format")]
    InvalidKey,

    /// Row not found.
    #[error("row not found")]
    NotFound,

    /// A table with this name is already registered.
    #[error("table already exists: {0}")]
    TableExists(String),

    /// No table with this name is registered.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// A row does not conform to the table schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A unique index already holds the key.
    #[error("unique index {index} already contains key {key}")]
    UniqueViolation {
        /// Index name.
        index: String,
        /// Display form of the duplicate key.
        key: String,
    },

    /// A staging table reached its byte limit.
    #[error("capacity exceeded: limit {limit} bytes, requested {requested} bytes")]
    CapacityExceeded {
        /// Configured limit.
        limit: usize,
        /// Bytes that would have been in use after the insert.
        requested: usize,
    },

    /// The index cannot be positioned for a range scan.
    #[error("index {index} ({kind}) does not support ordered scans")]
    UnsupportedScan {
        /// Index name.
        index: String,
        /// Index kind.
        kind: String,
    },

    /// Invalid definition or data format.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
