//! Extraction error types.

use shardshift_proto::Value;
use thiserror::Error;

use crate::storage::{IndexKind, RowId};

/// How a failed extraction should be treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The request itself is wrong. Nothing was mutated; retrying the same
    /// call fails the same way.
    Configuration,
    /// The storage layer is missing a capability or is inconsistent.
    Fatal,
    /// The extraction aborted midway. Rows deleted before the failure stay
    /// deleted and no pending entry was created.
    Aborted,
    /// An expected outcome, such as a point key that is not present. Nothing
    /// was mutated.
    Declared,
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::Configuration => write!(f, "configuration"),
            FailureClass::Fatal => write!(f, "fatal"),
            FailureClass::Aborted => write!(f, "aborted"),
            FailureClass::Declared => write!(f, "declared"),
        }
    }
}

/// Errors returned by range extraction and undo.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The interval is inverted.
    #[error("max key {max} is smaller than min key {min}")]
    InvalidRange {
        /// Lower bound supplied.
        min: Value,
        /// Upper bound supplied.
        max: Value,
    },

    /// The bounds cannot be compared with each other or with the partition column.
    #[error("key type mismatch on {table}: {reason}")]
    KeyTypeMismatch {
        /// Source table.
        table: String,
        /// What did not match.
        reason: String,
    },

    /// A point extraction was requested on a table without a partition index.
    #[error("point lookup on {table} requires a unique partition column index")]
    PointLookupRequiresIndex {
        /// Source table.
        table: String,
    },

    /// The partition index has a kind the range walk cannot drive.
    #[error("unsupported index kind {kind} for index {index}")]
    UnsupportedIndexKind {
        /// Index name.
        index: String,
        /// Index kind.
        kind: IndexKind,
    },

    /// The index and the row storage disagree.
    #[error("index {index} on {table} points at row {row_id} but storage holds no row")]
    InternalConsistency {
        /// Source table.
        table: String,
        /// Index name.
        index: String,
        /// Row the index entry points at.
        row_id: RowId,
    },

    /// A point key is not present.
    #[error("key {key} not found in {table}")]
    KeyNotFound {
        /// Source table.
        table: String,
        /// Key requested.
        key: Value,
    },

    /// Copying a row into the staging table failed midway through the scan.
    #[error("failed to stage row from {table} after deleting {rows_deleted} rows: {source}")]
    StagingInsertFailure {
        /// Source table.
        table: String,
        /// Rows already removed from the source and not restored.
        rows_deleted: usize,
        /// Staging error.
        #[source]
        source: crate::error::Error,
    },

    /// The table handle belongs to a different storage engine than the
    /// manager, so undo could not find it again.
    #[error("table {table} was not opened through this manager's storage engine")]
    ForeignTable {
        /// Source table.
        table: String,
    },

    /// The token already names a pending extraction.
    #[error("extraction token {0} is already pending")]
    TokenInUse(i32),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] crate::error::Error),
}

impl ExtractError {
    /// Classify the failure.
    pub fn class(&self) -> FailureClass {
        match self {
            ExtractError::InvalidRange { .. }
            | ExtractError::KeyTypeMismatch { .. }
            | ExtractError::PointLookupRequiresIndex { .. }
            | ExtractError::ForeignTable { .. }
            | ExtractError::TokenInUse(_) => FailureClass::Configuration,
            ExtractError::UnsupportedIndexKind { .. }
            | ExtractError::InternalConsistency { .. }
            | ExtractError::Storage(_) => FailureClass::Fatal,
            ExtractError::StagingInsertFailure { .. } => FailureClass::Aborted,
            ExtractError::KeyNotFound { .. } => FailureClass::Declared,
        }
    }

    /// Whether the failure indicates a caller bug or a broken storage layer.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.class(),
            FailureClass::Configuration | FailureClass::Fatal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        let err = ExtractError::InvalidRange {
            min: Value::Int32(5),
            max: Value::Int32(1),
        };
        assert_eq!(err.class(), FailureClass::Configuration);
        assert!(err.is_fatal());

        let err = ExtractError::KeyNotFound {
            table: "t".into(),
            key: Value::Int32(1),
        };
        assert_eq!(err.class(), FailureClass::Declared);
        assert!(!err.is_fatal());

        let err = ExtractError::StagingInsertFailure {
            table: "t".into(),
            rows_deleted: 2,
            source: crate::error::Error::NotFound,
        };
        assert_eq!(err.class(), FailureClass::Aborted);
        assert!(!err.is_fatal());

        assert!(ExtractError::TokenInUse(1).is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = ExtractError::InvalidRange {
            min: Value::Int32(5),
            max: Value::Int32(1),
        };
        assert_eq!(err.to_string(), "max key 1 is smaller than min key 5");

        let err = ExtractError::PointLookupRequiresIndex {
            table: "orders".into(),
        };
        assert!(err.to_string().contains("requires a unique partition column index"));

        let err = ExtractError::UnsupportedIndexKind {
            index: "pk".into(),
            kind: IndexKind::ExactMatch,
        };
        assert_eq!(
            err.to_string(),
            "unsupported index kind exact-match for index pk"
        );
    }
}
