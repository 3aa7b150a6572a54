//! Runtime value types for rows and partition keys.

use std::cmp::Ordering;
use std::fmt;

use rkyv::{Archive, Deserialize, Serialize};

use crate::error::Error;

/// Scalar type of a column.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum ScalarType {
    Bool,
    Int32,
    Int64,
    Float64,
    String,
    Bytes,
    Timestamp,
    Uuid,
}

impl ScalarType {
    /// Storage size in bytes for fixed-width types, `None` for variable-width ones.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            ScalarType::Bool => Some(1),
            ScalarType::Int32 => Some(4),
            ScalarType::Int64 | ScalarType::Float64 | ScalarType::Timestamp => Some(8),
            ScalarType::Uuid => Some(16),
            ScalarType::String | ScalarType::Bytes => None,
        }
    }

    /// Check that a value is acceptable for a column of this type.
    ///
    /// `Int32` values are accepted by `Int64` columns. Null handling is left to
    /// the caller, which knows the column's nullability.
    pub fn check(&self, value: &Value) -> Result<(), Error> {
        let ok = match (self, value) {
            (_, Value::Null) => true,
            (ScalarType::Bool, Value::Bool(_)) => true,
            (ScalarType::Int32, Value::Int32(_)) => true,
            (ScalarType::Int64, Value::Int32(_) | Value::Int64(_)) => true,
            (ScalarType::Float64, Value::Float64(_)) => true,
            (ScalarType::String, Value::String(_)) => true,
            (ScalarType::Bytes, Value::Bytes(_)) => true,
            (ScalarType::Timestamp, Value::Timestamp(_)) => true,
            (ScalarType::Uuid, Value::Uuid(_)) => true,
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected: self.to_string(),
                actual: value.type_name().to_string(),
            })
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Bool => "bool",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Float64 => "float64",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
            ScalarType::Timestamp => "timestamp",
            ScalarType::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

/// A runtime value stored in a row column or used as a partition key.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// UTF-8 string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Timestamp as microseconds since Unix epoch.
    Timestamp(i64),
    /// UUID as 16 bytes.
    Uuid([u8; 16]),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The scalar type of this value, `None` for null.
    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(ScalarType::Bool),
            Value::Int32(_) => Some(ScalarType::Int32),
            Value::Int64(_) => Some(ScalarType::Int64),
            Value::Float64(_) => Some(ScalarType::Float64),
            Value::String(_) => Some(ScalarType::String),
            Value::Bytes(_) => Some(ScalarType::Bytes),
            Value::Timestamp(_) => Some(ScalarType::Timestamp),
            Value::Uuid(_) => Some(ScalarType::Uuid),
        }
    }

    /// Human-readable type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Float64(_) => "float64",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
        }
    }

    /// Approximate number of bytes this value occupies in a staged row.
    pub fn encoded_size(&self) -> usize {
        match self {
            Value::Null => 1,
            Value::String(s) => 4 + s.len(),
            Value::Bytes(b) => 4 + b.len(),
            other => other
                .scalar_type()
                .and_then(|t| t.fixed_size())
                .unwrap_or(0),
        }
    }

    /// Compare two values as partition keys.
    ///
    /// Null sorts before every non-null value. Integers compare numerically
    /// across widths and floats use IEEE total ordering. Values of unrelated
    /// types are not comparable and yield `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
            (Value::Int32(a), Value::Int64(b)) => Some(i64::from(*a).cmp(b)),
            (Value::Int64(a), Value::Int32(b)) => Some(a.cmp(&i64::from(*b))),
            (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
            (Value::Float64(a), Value::Float64(b)) => Some(a.total_cmp(b)),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(i) => Some(*i),
            Value::Int32(i) => Some(i64::from(*i)),
            _ => None,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Timestamp(ts) => write!(f, "ts:{}", ts),
            Value::Uuid(id) => {
                for byte in id {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<[u8; 16]> for Value {
    fn from(v: [u8; 16]) -> Self {
        Value::Uuid(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}
