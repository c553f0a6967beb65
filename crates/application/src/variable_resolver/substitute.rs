//! Placeholder substitution into a manifest copy

use std::collections::{HashMap, HashSet};

use manifold_domain::placeholder::{full_placeholder, scan_placeholders};
use manifold_domain::{Occurrence, TreePath};
use serde_json::Value;

/// Returns a copy of `tree` with resolved placeholders substituted at every
/// occurrence. `values` is keyed by token body.
pub(crate) fn substitute(
    tree: &Value,
    occurrences: &[Occurrence],
    values: &HashMap<String, Value>,
) -> Value {
    let mut result = tree.clone();
    let mut visited: HashSet<&TreePath> = HashSet::new();

    for occurrence in occurrences {
        if !visited.insert(&occurrence.path) {
            continue;
        }
        let Some(slot) = occurrence.path.get_mut(&mut result) else {
            continue;
        };
        let Value::String(text) = &*slot else {
            continue;
        };
        let rendered = render(text, values);
        *slot = rendered;
    }

    result
}

/// Renders one string scalar.
///
/// A string that is exactly one placeholder takes the value's native type;
/// otherwise each token is replaced by the value's text, left to right.
fn render(text: &str, values: &HashMap<String, Value>) -> Value {
    if let Some(body) = full_placeholder(text)
        && let Some(value) = values.get(body)
    {
        return value.clone();
    }

    let mut rendered = String::with_capacity(text.len());
    let mut last_end = 0;

    for token in scan_placeholders(text) {
        rendered.push_str(&text[last_end..token.span.start]);
        match values.get(&token.body) {
            Some(value) => rendered.push_str(&textual(value)),
            None => rendered.push_str(&text[token.span.clone()]),
        }
        last_end = token.span.end;
    }

    rendered.push_str(&text[last_end..]);
    Value::String(rendered)
}

/// Textual form of a value embedded in a larger string.
fn textual(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifold_domain::discover;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn values(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_whole_placeholder_keeps_native_type() {
        let tree = json!({"port": "((port))", "tls": "((tls))", "cert": "((cert))"});
        let resolved = values(&[
            ("port", json!(8443)),
            ("tls", json!(true)),
            ("cert", json!({"ca": "ca_value"})),
        ]);

        let result = substitute(&tree, &discover(&tree, &[]), &resolved);

        assert_eq!(
            result,
            json!({"port": 8443, "tls": true, "cert": {"ca": "ca_value"}})
        );
    }

    #[test]
    fn test_embedded_placeholders_are_stringified() {
        let tree = json!({"url": "https://((host)):((port))/((path))", "n": "none: ((nothing))"});
        let resolved = values(&[
            ("host", json!("db.internal")),
            ("port", json!(5432)),
            ("path", json!("pg")),
            ("nothing", Value::Null),
        ]);

        let result = substitute(&tree, &discover(&tree, &[]), &resolved);

        assert_eq!(
            result,
            json!({"url": "https://db.internal:5432/pg", "n": "none: "})
        );
    }

    #[test]
    fn test_embedded_structured_value_is_json() {
        let tree = json!(["cfg=((cfg))"]);
        let resolved = values(&[("cfg", json!({"a": 1}))]);

        let result = substitute(&tree, &discover(&tree, &[]), &resolved);

        assert_eq!(result, json!([r#"cfg={"a":1}"#]));
    }

    #[test]
    fn test_input_untouched() {
        let tree = json!({"a": "((a))"});
        let resolved = values(&[("a", json!(1))]);

        let result = substitute(&tree, &discover(&tree, &[]), &resolved);

        assert_eq!(tree, json!({"a": "((a))"}));
        assert_eq!(result, json!({"a": 1}));
    }
}
