//! Row type for stored and staged values.

use rkyv::{Archive, Deserialize, Serialize};
use shardshift_proto::Value;

use crate::error::Error;

/// A fixed-schema record: one value per column, in schema order.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Create a row from column values.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Column values in schema order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of the column at `column`.
    pub fn get(&self, column: usize) -> Option<&Value> {
        self.values.get(column)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consume the row, returning its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Approximate in-memory footprint used for staging accounting.
    pub fn encoded_size(&self) -> usize {
        self.values.iter().map(Value::encoded_size).sum()
    }

    /// Serialize the row to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a row from bytes using rkyv.
    ///
    /// sled hands out buffers without alignment guarantees, so the bytes are
    /// copied into an aligned buffer before validation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(bytes.len());
        aligned.extend_from_slice(bytes);
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}
