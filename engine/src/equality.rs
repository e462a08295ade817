//! Structural equality over JSON values.
//!
//! Index descriptors are opaque to the reconciler: it never looks inside them,
//! it only asks whether the local and remote descriptors describe the same
//! thing. Field specs are typed and use their derived `PartialEq` instead.

use serde_json::{Number, Value};

/// Deep value equality.
///
/// - identical references are equal
/// - primitives compare by value; numbers compare numerically, so `1` and
///   `1.0` are equal while `1` and `"1"` are not
/// - a container never equals a primitive, and an array never equals an object
/// - objects must have the same key count and every key of `a` must map to an
///   equal value in `b`; with unique keys this makes the check symmetric
/// - arrays compare element-wise in order
pub fn structural_eq(a: &Value, b: &Value) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }

    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a
                    .iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| structural_eq(value, other)))
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| structural_eq(x, y))
        }
        (Value::Number(x), Value::Number(y)) => numbers_eq(x, y),
        (Value::Object(_) | Value::Array(_), _) | (_, Value::Object(_) | Value::Array(_)) => false,
        _ => a == b,
    }
}

fn numbers_eq(x: &Number, y: &Number) -> bool {
    if x == y {
        return true;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}
