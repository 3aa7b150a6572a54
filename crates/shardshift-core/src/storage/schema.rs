//! Table schema: ordered column definitions and the partition column.

use rkyv::{Archive, Deserialize, Serialize};
use shardshift_proto::{ScalarType, Value};

use super::Row;
use crate::error::Error;

/// Storage size assumed for variable-width columns without an explicit limit.
pub const DEFAULT_VARIABLE_SIZE: usize = 256;

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Value type.
    pub scalar_type: ScalarType,
    /// Storage size in bytes. For strings and bytes this is the maximum length.
    pub storage_size: usize,
    /// Whether the column accepts nulls.
    pub nullable: bool,
}

impl ColumnDef {
    /// Create a non-nullable column with the type's default storage size.
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            storage_size: scalar_type.fixed_size().unwrap_or(DEFAULT_VARIABLE_SIZE),
            nullable: false,
        }
    }

    /// Allow nulls in this column.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set the maximum length of a variable-width column.
    pub fn with_max_length(mut self, len: usize) -> Self {
        if self.scalar_type.fixed_size().is_none() {
            self.storage_size = len;
        }
        self
    }

    fn validate(&self, value: &Value) -> Result<(), Error> {
        if value.is_null() {
            if self.nullable {
                return Ok(());
            }
            return Err(Error::SchemaMismatch(format!(
                "column {} is not nullable",
                self.name
            )));
        }

        self.scalar_type
            .check(value)
            .map_err(|e| Error::SchemaMismatch(format!("column {}: {}", self.name, e)))?;

        let len = match value {
            Value::String(s) => s.len(),
            Value::Bytes(b) => b.len(),
            _ => return Ok(()),
        };
        if len > self.storage_size {
            return Err(Error::SchemaMismatch(format!(
                "column {}: length {} exceeds {}",
                self.name, len, self.storage_size
            )));
        }
        Ok(())
    }
}

/// Row layout of a table.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct Schema {
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Ordinal of the column that decides partition placement.
    pub partition_column: usize,
}

impl Schema {
    /// Create a schema partitioned on the column at `partition_column`.
    pub fn new(columns: Vec<ColumnDef>, partition_column: usize) -> Self {
        Self {
            columns,
            partition_column,
        }
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Definition of the partition column, if the ordinal is in range.
    pub fn partition_column_def(&self) -> Option<&ColumnDef> {
        self.columns.get(self.partition_column)
    }

    /// Find a column ordinal by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Sum of declared column storage sizes.
    pub fn max_row_size(&self) -> usize {
        self.columns.iter().map(|c| c.storage_size).sum()
    }

    /// Check that the schema itself is well formed.
    pub fn check(&self) -> Result<(), Error> {
        if self.columns.is_empty() {
            return Err(Error::InvalidData("schema has no columns".to_string()));
        }
        if self.partition_column >= self.columns.len() {
            return Err(Error::InvalidData(format!(
                "partition column {} out of range for {} columns",
                self.partition_column,
                self.columns.len()
            )));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(Error::InvalidData(format!(
                    "duplicate column name {}",
                    column.name
                )));
            }
        }
        Ok(())
    }

    /// Validate a row against this schema.
    pub fn validate(&self, row: &Row) -> Result<(), Error> {
        if row.len() != self.columns.len() {
            return Err(Error::SchemaMismatch(format!(
                "expected {} columns, got {}",
                self.columns.len(),
                row.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(row.values()) {
            column.validate(value)?;
        }
        Ok(())
    }
}
