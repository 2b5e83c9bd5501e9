//! Volatile field stripping.

use serde_json::Value;
use tracing::debug;

/// Remove every volatile field from a top-level JSON object.
///
/// Non-object payloads carry no transport metadata and are left unchanged.
/// Returns the number of fields removed.
pub fn strip_volatile_fields(value: &mut Value, fields: &[String]) -> usize {
    let Value::Object(map) = value else {
        return 0;
    };

    let removed = fields
        .iter()
        .filter(|field| map.remove(field.as_str()).is_some())
        .count();

    if removed > 0 {
        debug!("Stripped {} volatile field(s) from payload", removed);
    }

    removed
}

/// Whether any volatile field is present.
pub fn has_volatile_fields(value: &Value, fields: &[String]) -> bool {
    match value {
        Value::Object(map) => fields.iter().any(|f| map.contains_key(f.as_str())),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers() -> Vec<String> {
        vec!["_headers".to_string()]
    }

    #[test]
    fn test_strips_headers() {
        let mut value = json!({"id": 7, "_headers": {"Date": "today"}});
        assert_eq!(strip_volatile_fields(&mut value, &headers()), 1);
        assert_eq!(value, json!({"id": 7}));
    }

    #[test]
    fn test_strip_is_idempotent() {
        let mut value = json!({"id": 7, "_headers": {}});
        strip_volatile_fields(&mut value, &headers());
        assert_eq!(strip_volatile_fields(&mut value, &headers()), 0);
        assert!(!has_volatile_fields(&value, &headers()));
    }

    #[test]
    fn test_nested_fields_are_payload() {
        let mut value = json!({"theme": {"_headers": "kept"}});
        assert_eq!(strip_volatile_fields(&mut value, &headers()), 0);
        assert_eq!(value["theme"]["_headers"], "kept");
    }

    #[test]
    fn test_non_object_untouched() {
        let mut value = json!([1, 2, 3]);
        assert_eq!(strip_volatile_fields(&mut value, &headers()), 0);
        assert_eq!(value, json!([1, 2, 3]));
    }
}
