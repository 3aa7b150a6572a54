//! Order-preserving key encoding for ordered indexes.
//!
//! Entry key format: `[encoded_value][row_id:8]`, where the value encoding is
//! prefix-free and compares bytewise in the same order as [`Value::compare`].
//! Seeking to the encoding of a value therefore positions at the first entry
//! whose value is greater than or equal to it.

use shardshift_proto::Value;

/// Encode a value in a sortable format, appending to `buf`.
///
/// - Null sorts first
/// - Integers of both widths share one tag: big-endian i64 with the sign bit flipped
/// - Floats: IEEE 754 bits with sign handling
/// - Strings and bytes: 0x00 escaped as `0x00 0xFF`, terminated by `0x00 0x00`
pub(crate) fn encode_sortable_into(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.push(0x00),
        Value::Bool(b) => {
            buf.push(0x01);
            buf.push(u8::from(*b));
        }
        Value::Int32(n) => encode_int(i64::from(*n), buf),
        Value::Int64(n) => encode_int(*n, buf),
        Value::Float64(n) => {
            buf.push(0x03);
            let bits = n.to_bits();
            let sortable = if (bits & 0x8000_0000_0000_0000) != 0 {
                !bits
            } else {
                bits ^ 0x8000_0000_0000_0000
            };
            buf.extend_from_slice(&sortable.to_be_bytes());
        }
        Value::String(s) => {
            buf.push(0x04);
            encode_escaped(s.as_bytes(), buf);
        }
        Value::Bytes(b) => {
            buf.push(0x05);
            encode_escaped(b, buf);
        }
        Value::Timestamp(ts) => {
            buf.push(0x06);
            let sortable = (*ts as u64) ^ 0x8000_0000_0000_0000;
            buf.extend_from_slice(&sortable.to_be_bytes());
        }
        Value::Uuid(id) => {
            buf.push(0x07);
            buf.extend_from_slice(id);
        }
    }
}

fn encode_int(n: i64, buf: &mut Vec<u8>) {
    buf.push(0x02);
    let sortable = (n as u64) ^ 0x8000_0000_0000_0000;
    buf.extend_from_slice(&sortable.to_be_bytes());
}

fn encode_escaped(bytes: &[u8], buf: &mut Vec<u8>) {
    for &b in bytes {
        if b == 0x00 {
            buf.extend_from_slice(&[0x00, 0xFF]);
        } else {
            buf.push(b);
        }
    }
    buf.extend_from_slice(&[0x00, 0x00]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    fn encode(value: &Value) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_sortable_into(value, &mut buf);
        buf
    }

    fn assert_order_matches(values: &[Value]) {
        for a in values {
            for b in values {
                let expected = a.compare(b).unwrap();
                assert_eq!(encode(a).cmp(&encode(b)), expected, "{:?} vs {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_integer_ordering() {
        assert_order_matches(&[
            Value::Int64(i64::MIN),
            Value::Int32(-100),
            Value::Int32(-1),
            Value::Int64(0),
            Value::Int32(1),
            Value::Int64(1 << 40),
            Value::Int64(i64::MAX),
        ]);
    }

    #[test]
    fn test_widths_encode_identically() {
        assert_eq!(encode(&Value::Int32(12)), encode(&Value::Int64(12)));
    }

    #[test]
    fn test_float_ordering() {
        assert_order_matches(&[
            Value::Float64(f64::NEG_INFINITY),
            Value::Float64(-2.5),
            Value::Float64(-0.0),
            Value::Float64(0.0),
            Value::Float64(1e-9),
            Value::Float64(3.0),
        ]);
    }

    #[test]
    fn test_string_ordering_and_prefix_freedom() {
        assert_order_matches(&[
            Value::String("".into()),
            Value::String("a".into()),
            Value::String("a\0".into()),
            Value::String("a\0b".into()),
            Value::String("ab".into()),
            Value::String("b".into()),
        ]);

        let short = encode(&Value::String("a".into()));
        let long = encode(&Value::String("ab".into()));
        assert!(!long.starts_with(&short));
    }

    #[test]
    fn test_null_sorts_first() {
        let null = encode(&Value::Null);
        for v in [Value::Int32(i32::MIN), Value::String("".into()), Value::Bool(false)] {
            assert_eq!(null.cmp(&encode(&v)), Ordering::Less);
        }
    }

    #[test]
    fn test_timestamp_ordering() {
        assert_order_matches(&[
            Value::Timestamp(-5),
            Value::Timestamp(0),
            Value::Timestamp(1_704_067_200_000_000),
        ]);
    }
}
