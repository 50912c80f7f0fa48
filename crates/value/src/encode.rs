//! Canonical byte encoding.
//!
//! Encodes a value into bytes such that two values produce the same bytes
//! exactly when `collate` considers them equal. Group keys and DISTINCT use
//! the encoding to hash values without requiring `Eq`/`Hash` on `Value`
//! (floats). The format is tag-prefixed and order-preserving for the common
//! kinds: the float sign-flip trick keeps numeric byte order aligned with
//! numeric order.

use crate::types::Value;

const TAG_MISSING: u8 = 0x00;
const TAG_NULL: u8 = 0x01;
const TAG_BOOL: u8 = 0x02;
const TAG_NUMBER: u8 = 0x03;
const TAG_STRING: u8 = 0x04;
const TAG_ARRAY: u8 = 0x05;
const TAG_OBJECT: u8 = 0x06;

/// Encode one value, appending to `out`.
pub fn encode_key(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Missing => out.push(TAG_MISSING),
        Value::Null => out.push(TAG_NULL),
        Value::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(*b as u8);
        }
        Value::Number(n) => {
            out.push(TAG_NUMBER);
            // Canonicalize NaN and negative zero so that collation-equal
            // numbers encode equal.
            let n = if n.is_nan() {
                f64::NAN
            } else if *n == 0.0 {
                0.0
            } else {
                *n
            };
            let bits = n.to_bits();
            let sortable = if n.is_sign_negative() {
                !bits
            } else {
                bits ^ (1u64 << 63)
            };
            out.extend_from_slice(&sortable.to_be_bytes());
        }
        Value::Str(s) => {
            out.push(TAG_STRING);
            out.extend_from_slice(&(s.len() as u32).to_be_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Value::Array(elements) => {
            out.push(TAG_ARRAY);
            out.extend_from_slice(&(elements.len() as u32).to_be_bytes());
            for element in elements {
                encode_key(element, out);
            }
        }
        Value::Object(fields) => {
            out.push(TAG_OBJECT);
            out.extend_from_slice(&(fields.len() as u32).to_be_bytes());
            for (key, field) in fields {
                out.extend_from_slice(&(key.len() as u32).to_be_bytes());
                out.extend_from_slice(key.as_bytes());
                encode_key(field, out);
            }
        }
    }
}

/// Encode one value into a fresh buffer.
pub fn encoded(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    encode_key(value, &mut out);
    out
}

/// Encode a tuple of values (a group key) into one buffer.
pub fn encode_tuple(values: &[Value]) -> Vec<u8> {
    let mut out = Vec::new();
    for value in values {
        encode_key(value, &mut out);
    }
    out
}
