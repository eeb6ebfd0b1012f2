//! Outbound HTTP: request materialization, retries, pagination

mod caller;

pub use caller::{CallOutcome, HttpCaller};

use serde_json::Value;

/// Select a subtree by dot-separated path.
///
/// Segments index objects by key; a numeric segment indexes arrays. An
/// empty path returns the value itself.
pub(crate) fn select_path(value: &Value, path: &str) -> Option<Value> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Some(value.clone());
    }

    let mut current = value;
    for segment in trimmed.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_path_object_and_array() {
        let value = json!({"data": {"items": [{"id": 1}, {"id": 2}]}});
        assert_eq!(
            select_path(&value, "data.items"),
            Some(json!([{"id": 1}, {"id": 2}]))
        );
        assert_eq!(select_path(&value, "data.items.1.id"), Some(json!(2)));
        assert_eq!(select_path(&value, "data.missing"), None);
        assert_eq!(select_path(&value, ""), Some(value));
    }
}
