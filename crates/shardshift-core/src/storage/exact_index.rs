//! Type-tagged key encoding for exact-match indexes.
//!
//! Entry key format: `[tag:1][payload][row_id:8]`. Fixed-width payloads are
//! little-endian and variable-width payloads carry a `u32` length prefix, so
//! the encoding is prefix-free but says nothing about value order. An
//! exact-match index can only answer "which rows have exactly this key".

use shardshift_proto::Value;

/// Encode a value for equality lookups, appending to `buf`.
pub(crate) fn encode_tagged_into(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.push(0x00),
        Value::Bool(b) => {
            buf.push(0x01);
            buf.push(u8::from(*b));
        }
        // Both widths share a tag so an Int32 key finds an Int64 column value.
        Value::Int32(n) => {
            buf.push(0x02);
            buf.extend_from_slice(&i64::from(*n).to_le_bytes());
        }
        Value::Int64(n) => {
            buf.push(0x02);
            buf.extend_from_slice(&n.to_le_bytes());
        }
        Value::Float64(n) => {
            buf.push(0x03);
            buf.extend_from_slice(&n.to_bits().to_le_bytes());
        }
        Value::String(s) => {
            buf.push(0x04);
            encode_len_prefixed(s.as_bytes(), buf);
        }
        Value::Bytes(b) => {
            buf.push(0x05);
            encode_len_prefixed(b, buf);
        }
        Value::Timestamp(ts) => {
            buf.push(0x06);
            buf.extend_from_slice(&ts.to_le_bytes());
        }
        Value::Uuid(id) => {
            buf.push(0x07);
            buf.extend_from_slice(id);
        }
    }
}

fn encode_len_prefixed(bytes: &[u8], buf: &mut Vec<u8>) {
    buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(bytes);
}
