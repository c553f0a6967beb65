//! Placeholder discovery over a manifest tree

use serde_json::Value;

use crate::placeholder::scan_placeholders;

use super::ignore::IgnorePattern;
use super::path::TreePath;

/// One placeholder token found in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    /// The token body as written between the markers, e.g. `!name.key`.
    pub body: String,

    /// Path of the string scalar containing the token.
    pub path: TreePath,
}

/// Walks `tree` depth-first and records every placeholder token it finds.
///
/// Map entries are visited in key order and sequence elements in index order.
/// A string holding several tokens yields one occurrence per token, and a name
/// used at several paths is recorded at each of them. Any subtree whose path
/// has a prefix matched by one of `ignore` is skipped entirely.
///
/// ```
/// use manifold_domain::tree::{IgnorePattern, discover};
/// use serde_json::json;
///
/// let manifest = json!({
///     "name": "((deployment_name))",
///     "properties": {"password": "((db_password))"}
/// });
/// let ignore = [IgnorePattern::new().key("properties")];
///
/// let found = discover(&manifest, &ignore);
/// assert_eq!(found.len(), 1);
/// assert_eq!(found[0].body, "deployment_name");
/// ```
#[must_use]
pub fn discover(tree: &Value, ignore: &[IgnorePattern]) -> Vec<Occurrence> {
    let mut occurrences = Vec::new();
    visit(tree, &TreePath::root(), ignore, &mut occurrences);
    occurrences
}

fn visit(node: &Value, path: &TreePath, ignore: &[IgnorePattern], out: &mut Vec<Occurrence>) {
    if ignore.iter().any(|pattern| pattern.matches_prefix_of(path)) {
        return;
    }

    match node {
        Value::Object(map) => {
            for (key, child) in map {
                visit(child, &path.child(key.as_str()), ignore, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                visit(child, &path.child(index), ignore, out);
            }
        }
        Value::String(text) => {
            out.extend(scan_placeholders(text).into_iter().map(|token| Occurrence {
                body: token.body,
                path: path.clone(),
            }));
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::PathSegment;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn manifest() -> Value {
        json!({
            "name": "test_manifest",
            "resource_pools": [
                {
                    "name": "rp",
                    "env": {
                        "a": "public",
                        "b": [{"f": "((my_db_passwd))"}, ["public", "((secret2))"]]
                    }
                }
            ],
            "instance_groups": [
                {
                    "name": "db",
                    "jobs": [
                        {
                            "name": "mysql",
                            "properties": {"a": {"b": {"c": "((nuclear_launch_code))"}}}
                        },
                        {"name": "((job_name))"}
                    ],
                    "properties": {"a": ["123", 45, "((secret_key))"]}
                }
            ],
            "properties": {"a": "test", "b": "((bla))"}
        })
    }

    fn path(segments: &[PathSegment]) -> TreePath {
        segments.iter().cloned().collect()
    }

    fn paths_for<'a>(found: &'a [Occurrence], body: &str) -> Vec<&'a TreePath> {
        found
            .iter()
            .filter(|o| o.body == body)
            .map(|o| &o.path)
            .collect()
    }

    #[test]
    fn test_global_properties() {
        let found = discover(&manifest(), &[]);
        assert_eq!(
            paths_for(&found, "bla"),
            vec![&path(&["properties".into(), "b".into()])]
        );
    }

    #[test]
    fn test_nested_sequences() {
        let found = discover(&manifest(), &[]);
        assert_eq!(
            paths_for(&found, "secret2"),
            vec![&path(&[
                "resource_pools".into(),
                PathSegment::Index(0),
                "env".into(),
                "b".into(),
                PathSegment::Index(1),
                PathSegment::Index(1),
            ])]
        );
    }

    #[test]
    fn test_deep_job_properties() {
        let found = discover(&manifest(), &[]);
        assert_eq!(
            paths_for(&found, "nuclear_launch_code"),
            vec![&path(&[
                "instance_groups".into(),
                PathSegment::Index(0),
                "jobs".into(),
                PathSegment::Index(0),
                "properties".into(),
                "a".into(),
                "b".into(),
                "c".into(),
            ])]
        );
    }

    #[test]
    fn test_ignored_subtrees_are_pruned() {
        let ignore = [
            IgnorePattern::new()
                .key("instance_groups")
                .any_index()
                .key("jobs")
                .any_index()
                .key("properties"),
            IgnorePattern::new()
                .key("instance_groups")
                .any_index()
                .key("properties"),
            IgnorePattern::new().key("properties"),
        ];

        let found = discover(&manifest(), &ignore);
        let bodies: Vec<_> = found.iter().map(|o| o.body.as_str()).collect();

        assert_eq!(bodies, vec!["job_name", "my_db_passwd", "secret2"]);
    }

    #[test]
    fn test_deterministic_key_then_index_order() {
        let found = discover(&manifest(), &[]);
        let bodies: Vec<_> = found.iter().map(|o| o.body.as_str()).collect();

        assert_eq!(
            bodies,
            vec![
                "nuclear_launch_code",
                "job_name",
                "secret_key",
                "bla",
                "my_db_passwd",
                "secret2",
            ]
        );
    }

    #[test]
    fn test_repeated_names_recorded_per_path() {
        let tree = json!({"a": "((x))", "b": ["((x))", "((x)) and ((x))"]});
        let found = discover(&tree, &[]);

        assert_eq!(found.len(), 4);
        assert!(found.iter().all(|o| o.body == "x"));
        assert_eq!(found[2].path, found[3].path);
    }

    #[test]
    fn test_scalars_without_tokens() {
        let tree = json!({"a": 1, "b": true, "c": null, "d": "plain", "e": []});
        assert!(discover(&tree, &[]).is_empty());
    }

    #[test]
    fn test_every_path_resolves() {
        let tree = manifest();
        for occurrence in discover(&tree, &[]) {
            let value = occurrence.path.get(&tree).and_then(Value::as_str);
            assert!(value.is_some_and(|s| s.contains(&occurrence.body)));
        }
    }
}
