//! Cross-kind collation.
//!
//! Values collate first by kind class (MISSING < NULL < BOOLEAN < NUMBER <
//! STRING < ARRAY < OBJECT) and then within the class. The resulting order is
//! total, which is what ORDER BY, MIN/MAX, and the canonical encoding rely
//! on. Comparison *operators* are stricter: they only accept operands of the
//! same class and treat a class mismatch as a type-mismatch signal, which the
//! expression layer maps to `false`.

use crate::types::Value;
use std::cmp::Ordering;

/// The collation class rank of a value.
pub fn rank(value: &Value) -> u8 {
    match value {
        Value::Missing => 0,
        Value::Null => 1,
        Value::Bool(_) => 2,
        Value::Number(_) => 3,
        Value::Str(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Whether two values belong to the same collation class.
pub fn same_class(a: &Value, b: &Value) -> bool {
    rank(a) == rank(b)
}

/// Total order over all values. NaN collates before every other number so
/// that the order stays total; IEEE comparison semantics for NaN live in the
/// comparison operators, not here.
pub fn collate(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => collate_numbers(*x, *y),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xe, ye) in x.iter().zip(y.iter()) {
                match collate(xe, ye) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            // BTreeMap iterates in key order, so this walks the sorted key
            // sequence, comparing keys before values.
            for ((xk, xv), (yk, yv)) in x.iter().zip(y.iter()) {
                match xk.as_str().cmp(yk.as_str()) {
                    Ordering::Equal => {}
                    other => return other,
                }
                match collate(xv, yv) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

fn collate_numbers(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}
