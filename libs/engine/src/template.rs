//! `{name}` placeholder substitution
//!
//! URL hosts and paths, header and query values, and request bodies are
//! string templates. A placeholder is a brace pair wrapping a bare name
//! (letters, digits, `_`, `.`); anything else — JSON braces included — is
//! left verbatim, so a body like `{"q":"{term}"}` only substitutes `term`.

use serde_json::Value;

use crate::error::EngineError;

/// Variables available to a template: the per-call input first, then
/// credentials (credentials win on collision).
pub struct TemplateVars<'a> {
    input: Option<&'a Value>,
    credentials: Option<&'a Value>,
}

impl<'a> TemplateVars<'a> {
    pub fn new(input: &'a Value, credentials: &'a Value) -> Self {
        Self {
            input: Some(input),
            credentials: Some(credentials),
        }
    }

    /// Look up a (possibly dotted) placeholder name
    fn lookup(&self, name: &str) -> Option<&'a Value> {
        for source in [self.credentials, self.input].into_iter().flatten() {
            if let Some(value) = lookup_path(source, name) {
                return Some(value);
            }
        }
        // Inside LOOP iterations the current item is also reachable under
        // the shorter alias `value`.
        if name == "value" {
            return self
                .input
                .and_then(|input| lookup_path(input, "loopValue"));
        }
        None
    }
}

/// Substitute every `{name}` placeholder in `template`.
///
/// String values are inserted raw; other values are inserted as compact
/// JSON. A placeholder with no binding fails with a binding error naming it.
pub fn render(template: &str, vars: &TemplateVars<'_>) -> Result<String, EngineError> {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some((name, end)) = placeholder_at(template, i) {
                let value = vars.lookup(name).ok_or_else(|| {
                    EngineError::Binding(format!("no value bound for placeholder {{{name}}}"))
                })?;
                match value {
                    Value::String(s) => out.push_str(s),
                    other => out.push_str(&other.to_string()),
                }
                i = end;
                continue;
            }
        }
        let c = template[i..].chars().next().expect("in-bounds index");
        out.push(c);
        i += c.len_utf8();
    }

    Ok(out)
}

/// Names referenced by a template, for diagnostics
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some((name, end)) = placeholder_at(template, i) {
                if !names.contains(&name) {
                    names.push(name);
                }
                i = end;
                continue;
            }
        }
        i += 1;
    }
    names
}

/// If a well-formed placeholder starts at `start`, return its name and the
/// offset just past the closing brace.
fn placeholder_at(template: &str, start: usize) -> Option<(&str, usize)> {
    let rest = &template[start + 1..];
    let close = rest.find('}')?;
    let name = &rest[..close];
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return None;
    }
    Some((name, start + 1 + close + 1))
}

fn lookup_path<'a>(source: &'a Value, name: &str) -> Option<&'a Value> {
    let mut current = source;
    for segment in name.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitutes_from_input() {
        let input = json!({"term": "abc"});
        let credentials = json!({});
        let vars = TemplateVars::new(&input, &credentials);
        let body = render("{\"q\":\"{term}\"}", &vars).unwrap();
        assert_eq!(body, "{\"q\":\"abc\"}");
    }

    #[test]
    fn test_json_braces_left_verbatim() {
        let input = json!({"term": "abc"});
        let credentials = json!({});
        let vars = TemplateVars::new(&input, &credentials);
        let body = render("{\"nested\": {\"q\": \"{term}\"}}", &vars).unwrap();
        assert_eq!(body, "{\"nested\": {\"q\": \"abc\"}}");
    }

    #[test]
    fn test_credentials_override_input() {
        let input = json!({"api_key": "from-input"});
        let credentials = json!({"api_key": "from-creds"});
        let vars = TemplateVars::new(&input, &credentials);
        assert_eq!(render("{api_key}", &vars).unwrap(), "from-creds");
    }

    #[test]
    fn test_non_string_values_serialize() {
        let input = json!({"limit": 25, "flags": [1, 2]});
        let credentials = json!({});
        let vars = TemplateVars::new(&input, &credentials);
        assert_eq!(render("limit={limit}", &vars).unwrap(), "limit=25");
        assert_eq!(render("{flags}", &vars).unwrap(), "[1,2]");
    }

    #[test]
    fn test_dotted_lookup() {
        let input = json!({"user": {"id": "u-1"}});
        let credentials = json!({});
        let vars = TemplateVars::new(&input, &credentials);
        assert_eq!(render("/users/{user.id}", &vars).unwrap(), "/users/u-1");
    }

    #[test]
    fn test_value_aliases_loop_value() {
        let input = json!({"loopValue": "akita", "loopIndex": 0});
        let credentials = json!({});
        let vars = TemplateVars::new(&input, &credentials);
        assert_eq!(
            render("/breed/{value}/images", &vars).unwrap(),
            "/breed/akita/images"
        );
    }

    #[test]
    fn test_missing_placeholder_is_binding_error() {
        let input = json!({});
        let credentials = json!({});
        let vars = TemplateVars::new(&input, &credentials);
        let err = render("/items/{missing}", &vars).unwrap_err();
        assert!(matches!(err, EngineError::Binding(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_placeholders_listing() {
        assert_eq!(
            placeholders("{a} and {b.c} and {a}"),
            vec!["a", "b.c"]
        );
        assert!(placeholders("{\"json\": true}").is_empty());
    }
}
