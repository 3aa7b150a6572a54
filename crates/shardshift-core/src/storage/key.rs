//! Row identity encoding.

use std::fmt;

/// Size of an encoded row id in bytes.
pub const ROW_ID_SIZE: usize = 8;

/// Identity of a row inside one persistent table.
///
/// Ids are allocated from a monotonically increasing counter, and the
/// big-endian encoding makes sled's key order match insertion order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(pub u64);

impl RowId {
    /// Encode the id to bytes.
    pub fn encode(&self) -> [u8; ROW_ID_SIZE] {
        self.0.to_be_bytes()
    }

    /// Decode an id from exactly [`ROW_ID_SIZE`] bytes.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let buf: [u8; ROW_ID_SIZE] = bytes.try_into().ok()?;
        Some(Self(u64::from_be_bytes(buf)))
    }

    /// Decode the id stored as the suffix of an index entry key.
    pub fn from_suffix(bytes: &[u8]) -> Option<Self> {
        let start = bytes.len().checked_sub(ROW_ID_SIZE)?;
        Self::decode(&bytes[start..])
    }
}

impl fmt::Debug for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RowId({})", self.0)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Get current timestamp in microseconds since Unix epoch.
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicographic_ordering() {
        let a = RowId(100).encode();
        let b = RowId(200).encode();
        let c = RowId(70_000).encode();

        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_decode_invalid_length() {
        assert!(RowId::decode(&[0u8; 4]).is_none());
        assert!(RowId::decode(&[0u8; 9]).is_none());
        assert_eq!(RowId::decode(&RowId(42).encode()), Some(RowId(42)));
    }

    #[test]
    fn test_from_suffix() {
        let mut key = vec![0x02, 0xAA, 0xBB];
        key.extend_from_slice(&RowId(9).encode());
        assert_eq!(RowId::from_suffix(&key), Some(RowId(9)));
        assert_eq!(RowId::from_suffix(&[1, 2]), None);
    }
}
