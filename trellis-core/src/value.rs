//! Dotted-path navigation over dynamic JSON values.
//!
//! Step outputs and user inputs are arbitrarily shaped, so the engine models
//! them as `serde_json::Value` and navigates them with dotted paths:
//! `a.b.0.c` looks up key `a`, key `b`, index `0`, key `c`. Numeric segments
//! (decimal digits only) index arrays; every other segment is a map key.

use serde_json::Value;
use std::fmt;

/// A dotted-path traversal failure.
///
/// Carries the full path and the segment at which navigation stopped, so
/// callers can surface a precise diagnostic without re-walking the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    /// The full dotted path being traversed.
    pub path: String,
    /// The segment that could not be applied.
    pub segment: String,
    /// Why the segment could not be applied.
    pub reason: String,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "path '{}' failed at segment '{}': {}",
            self.path, self.segment, self.reason
        )
    }
}

impl std::error::Error for PathError {}

impl PathError {
    fn new(path: &str, segment: &str, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            segment: segment.to_string(),
            reason: reason.into(),
        }
    }
}

/// Traverse `root` along the dotted `path`, returning the value it names.
///
/// An empty path returns `root` itself.
pub fn traverse<'a>(root: &'a Value, path: &str) -> Result<&'a Value, PathError> {
    if path.is_empty() {
        return Ok(root);
    }
    let mut current = root;
    for segment in path.split('.') {
        current = step(current, segment, path)?;
    }
    Ok(current)
}

fn step<'a>(current: &'a Value, segment: &str, path: &str) -> Result<&'a Value, PathError> {
    match current {
        Value::Object(map) => map
            .get(segment)
            .ok_or_else(|| PathError::new(path, segment, "key not found")),
        Value::Array(items) => {
            let index = parse_index(segment)
                .ok_or_else(|| PathError::new(path, segment, "array index must be a non-negative integer"))?;
            items.get(index).ok_or_else(|| {
                PathError::new(
                    path,
                    segment,
                    format!("index out of range (length {})", items.len()),
                )
            })
        }
        other => Err(PathError::new(
            path,
            segment,
            format!("cannot traverse into {}", type_name(other)),
        )),
    }
}

/// Parse an array index: decimal digits only, no sign, no whitespace.
fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

/// Human-readable name of a JSON value's shape, for diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn traverses_nested_objects() {
        let value = json!({"data": {"order": {"id": 42}}});
        assert_eq!(traverse(&value, "data.order.id").unwrap(), &json!(42));
    }

    #[test]
    fn numeric_segment_indexes_arrays() {
        let value = json!({"items": [{"sku": "a"}, {"sku": "b"}]});
        assert_eq!(traverse(&value, "items.1.sku").unwrap(), &json!("b"));
    }

    #[test]
    fn empty_path_returns_root() {
        let value = json!({"a": 1});
        assert_eq!(traverse(&value, "").unwrap(), &value);
    }

    #[test]
    fn missing_key_reports_segment() {
        let value = json!({"a": {"b": 1}});
        let err = traverse(&value, "a.missing").unwrap_err();
        assert_eq!(err.segment, "missing");
        assert_eq!(err.path, "a.missing");
        assert!(err.to_string().contains("key not found"));
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let value = json!([1, 2, 3]);
        let err = traverse(&value, "7").unwrap_err();
        assert!(err.reason.contains("out of range"));
    }

    #[test]
    fn non_numeric_segment_on_array_is_an_error() {
        let value = json!([1, 2, 3]);
        let err = traverse(&value, "first").unwrap_err();
        assert!(err.reason.contains("non-negative integer"));
    }

    #[test]
    fn signed_and_padded_indices_are_rejected() {
        let value = json!([1, 2, 3]);
        assert!(traverse(&value, "-1").is_err());
        assert!(traverse(&value, "+1").is_err());
        assert!(traverse(&value, " 1").is_err());
        // Leading zeros are still plain digits.
        assert_eq!(traverse(&value, "01").unwrap(), &json!(2));
    }

    #[test]
    fn scalar_traversal_is_an_error() {
        let value = json!({"count": 3});
        let err = traverse(&value, "count.more").unwrap_err();
        assert!(err.reason.contains("number"));
    }

}
