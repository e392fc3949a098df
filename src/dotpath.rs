use serde_json::{Map, Value};

/// Dot-path traversal and assignment over `serde_json::Value` trees.
/// Shared by normalization, condition evaluation, transformer writes and the
/// ignore-path-aware comparator. Paths are plain key chains
/// (`mutationVariables.data.effectiveDate`); a missing segment resolves to
/// "no value", never an error.

/// Resolve `path` against `root`. Returns `None` when any segment is absent
/// or an intermediate value is not an object.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            Value::Array(arr) => {
                let idx: usize = segment.parse().ok()?;
                current = arr.get(idx)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Whether `path` holds a usable value. `Null` counts as undefined, matching
/// how projection writes unmapped fields.
pub fn is_defined(root: &Value, path: &str) -> bool {
    get(root, path).is_some_and(|v| !v.is_null())
}

/// Assign `value` at `path`, creating intermediate objects as needed.
/// A non-object intermediate (including `Null`) is replaced by an object so
/// the write always lands.
pub fn set(root: &mut Value, path: &str, value: Value) {
    let mut current = root;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if i == segments.len() - 1 {
            map.insert((*segment).to_string(), value);
            return;
        }
        current = map
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn get_nested() {
        let v = json!({"a": {"b": {"c": 1}}});
        assert_eq!(get(&v, "a.b.c"), Some(&json!(1)));
        assert_eq!(get(&v, "a.b.missing"), None);
        assert_eq!(get(&v, "a.b.c.d"), None);
    }

    #[test]
    fn get_through_array_index() {
        let v = json!({"items": [{"name": "x"}]});
        assert_eq!(get(&v, "items.0.name"), Some(&json!("x")));
        assert_eq!(get(&v, "items.1.name"), None);
    }

    #[test]
    fn null_is_undefined() {
        let v = json!({"a": null});
        assert!(!is_defined(&v, "a"));
        assert!(is_defined(&json!({"a": 0}), "a"));
    }

    #[test]
    fn set_creates_intermediates() {
        let mut v = json!({});
        set(&mut v, "a.b.c", json!(5));
        assert_eq!(v, json!({"a": {"b": {"c": 5}}}));
    }

    #[test]
    fn set_replaces_null_segment() {
        let mut v = json!({"a": null});
        set(&mut v, "a.b", json!("x"));
        assert_eq!(v, json!({"a": {"b": "x"}}));
    }
}
