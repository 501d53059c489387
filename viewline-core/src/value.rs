//! Document value helpers.
//!
//! Documents are plain [`serde_json::Value`] trees: null, booleans,
//! numbers (i64 when integral, f64 otherwise), strings, sequences and
//! string-keyed mappings. This module adds the conversions and
//! structural operations the evaluator and the engine need on top.

use serde_json::Value;

use crate::error::{Error, Result};

/// A string-keyed document mapping.
pub type Map = serde_json::Map<String, Value>;

/// Converts a document to a boolean, failing on anything else.
pub fn as_bool(v: &Value) -> Result<bool> {
    v.as_bool()
        .ok_or_else(|| Error::InvalidArguments(format!("expected boolean, got {v}")))
}

/// Converts a document to an i64.
///
/// Floats are accepted when they are exactly integral.
pub fn as_int(v: &Value) -> Result<i64> {
    if let Some(i) = v.as_i64() {
        return Ok(i);
    }
    if let Some(f) = v.as_f64() {
        if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
            return Ok(f as i64);
        }
    }
    Err(Error::InvalidArguments(format!("expected integer, got {v}")))
}

/// Converts a document to an f64.
pub fn as_float(v: &Value) -> Result<f64> {
    v.as_f64()
        .ok_or_else(|| Error::InvalidArguments(format!("expected number, got {v}")))
}

/// Converts a scalar document to its canonical string form.
///
/// Strings pass through unquoted; numbers and booleans render the way
/// they serialize. Sequences and mappings are rejected.
pub fn as_string(v: &Value) -> Result<String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::InvalidArguments(format!("expected scalar, got {v}"))),
    }
}

/// Converts a document to a sequence.
pub fn as_list(v: &Value) -> Result<&Vec<Value>> {
    v.as_array()
        .ok_or_else(|| Error::InvalidArguments(format!("expected list, got {v}")))
}

/// Converts a document to a mapping.
pub fn as_object(v: &Value) -> Result<&Map> {
    v.as_object()
        .ok_or_else(|| Error::InvalidArguments(format!("expected object, got {v}")))
}

/// Deep-merges `b` into `a` and returns the result.
///
/// Mappings merge key-wise, sequences concatenate, scalars on the right
/// replace whatever is on the left.
pub fn deep_merge(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Object(ma), Value::Object(mb)) => {
            let mut out = ma.clone();
            for (k, vb) in mb {
                let merged = match out.get(k) {
                    Some(va) => deep_merge(va, vb),
                    None => vb.clone(),
                };
                out.insert(k.clone(), merged);
            }
            Value::Object(out)
        }
        (Value::Array(la), Value::Array(lb)) => {
            let mut out = la.clone();
            out.extend(lb.iter().cloned());
            Value::Array(out)
        }
        (_, b) => b.clone(),
    }
}

/// Serializes a document with recursively sorted mapping keys.
///
/// Used where a document itself becomes an identity (gather group
/// names): the rendering must not depend on insertion order.
pub fn canonical_string(v: &Value) -> String {
    fn canonicalize(v: &Value) -> Value {
        match v {
            Value::Object(m) => {
                let mut keys: Vec<&String> = m.keys().collect();
                keys.sort();
                let mut out = Map::new();
                for k in keys {
                    out.insert(k.clone(), canonicalize(&m[k]));
                }
                Value::Object(out)
            }
            Value::Array(l) => Value::Array(l.iter().map(canonicalize).collect()),
            other => other.clone(),
        }
    }
    canonicalize(v).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_conversion_preserves_i64() {
        assert_eq!(as_int(&json!(10)).unwrap(), 10);
        assert_eq!(as_int(&json!(2.0)).unwrap(), 2);
        assert!(as_int(&json!(2.7)).is_err());
        assert!(as_int(&json!("10")).is_err());
    }

    #[test]
    fn scalar_string_form() {
        assert_eq!(as_string(&json!("ab")).unwrap(), "ab");
        assert_eq!(as_string(&json!(12)).unwrap(), "12");
        assert_eq!(as_string(&json!(true)).unwrap(), "true");
        assert!(as_string(&json!([1])).is_err());
    }

    #[test]
    fn merge_is_recursive() {
        let a = json!({"spec": {"a": 1, "b": {"c": 2}}, "l": [1]});
        let b = json!({"spec": {"b": {"d": 3}}, "l": [2], "x": true});
        let merged = deep_merge(&a, &b);
        assert_eq!(
            merged,
            json!({"spec": {"a": 1, "b": {"c": 2, "d": 3}}, "l": [1, 2], "x": true})
        );
    }

    #[test]
    fn merge_scalar_replaces() {
        assert_eq!(deep_merge(&json!({"a": 1}), &json!("x")), json!("x"));
    }

    #[test]
    fn canonical_string_sorts_keys() {
        let a = json!({"b": 1, "a": {"d": 2, "c": 3}});
        assert_eq!(canonical_string(&a), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }
}
