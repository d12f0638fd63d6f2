//! Mapping introspection
//!
//! A mapping tree wraps the children of every object field in a
//! `properties` level:
//!
//! ```text
//! comments
//! └── properties        <- structural marker, not a field
//!     └── author
//!         └── type: text
//! ```
//!
//! Flattening records every leaf under its dotted path
//! (`comments.properties.author.type`), and sanitizing reduces each path to
//! the logical field name the engine accepts in queries (`comments.author`).

use serde_json::Value;

use crate::error::{Result, SchemaError};

/// Key the engine uses to introduce child field definitions
pub const STRUCTURAL_MARKER: &str = "properties";

/// Flatten a mapping tree into `(dotted path, leaf value)` pairs
///
/// Objects and arrays are walked recursively; array positions become path
/// segments. Empty containers contribute nothing.
pub fn flatten_fields(tree: &Value) -> Vec<(String, Value)> {
    let mut flat = Vec::new();
    flatten_into(tree, "", &mut flat);
    flat
}

fn flatten_into(node: &Value, prefix: &str, out: &mut Vec<(String, Value)>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                descend(value, prefix, key, out);
            }
        }
        Value::Array(items) => {
            for (pos, value) in items.iter().enumerate() {
                descend(value, prefix, &pos.to_string(), out);
            }
        }
        _ => {}
    }
}

fn descend(value: &Value, prefix: &str, key: &str, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(_) | Value::Array(_) => {
            flatten_into(value, &format!("{prefix}{key}."), out);
        }
        leaf => out.push((format!("{prefix}{key}"), leaf.clone())),
    }
}

/// Reduce one flattened path to its logical field name
///
/// The first segment is always a field name. Each marker segment after it is
/// dropped and the segment that follows is appended as the next component.
/// A segment consumed as a field name is never re-read as a marker, so a
/// field literally called `properties` stays addressable.
pub fn logical_field_name(path: &str) -> String {
    let parts: Vec<&str> = path.split('.').collect();
    let mut field = parts[0].to_string();

    let mut pos = 1;
    while pos < parts.len() {
        if parts[pos] == STRUCTURAL_MARKER {
            if let Some(next) = parts.get(pos + 1) {
                field.push('.');
                field.push_str(next);
            }
            pos += 2;
        } else {
            pos += 1;
        }
    }

    field
}

/// Reduce flattened paths to logical field names, one per path
///
/// Several leaves under one field give several identical names; membership
/// checks do not care.
pub fn sanitize_flat_fields(flat: &[(String, Value)]) -> Vec<String> {
    flat.iter().map(|(path, _)| logical_field_name(path)).collect()
}

/// Locate the `properties` tree of `index` inside a get-mapping response
///
/// When the engine answered for a different concrete name (alias
/// resolution) and there is exactly one entry, that entry is used. A
/// `mappings` object without `properties` is malformed.
pub fn properties_of<'a>(response: &'a Value, index: &str) -> Result<&'a Value> {
    let entries = response
        .as_object()
        .ok_or_else(|| SchemaError::MalformedMapping("response is not an object".to_string()))?;

    let entry = match entries.get(index) {
        Some(entry) => Some(entry),
        None if entries.len() == 1 => entries.values().next(),
        None => None,
    }
    .ok_or_else(|| SchemaError::MalformedMapping(format!("no mapping entry for index '{index}'")))?;

    let mappings = entry
        .get("mappings")
        .filter(|m| m.is_object())
        .ok_or_else(|| SchemaError::MalformedMapping(format!("index '{index}' has no mappings object")))?;

    mappings
        .get(STRUCTURAL_MARKER)
        .ok_or_else(|| SchemaError::MalformedMapping(format!("mappings of '{index}' have no properties")))
}

/// Logical field names of `index` in a get-mapping response
pub fn field_names(response: &Value, index: &str) -> Result<Vec<String>> {
    let properties = properties_of(response, index)?;
    match properties {
        Value::Object(_) => Ok(sanitize_flat_fields(&flatten_fields(properties))),
        other => Err(SchemaError::MalformedMapping(format!(
            "properties of '{index}' is {other}, expected an object"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_paths() {
        let tree = json!({
            "title": {"type": "text", "fields": {"keyword": {"type": "keyword", "ignore_above": 256}}},
            "status": {"type": "integer"}
        });
        let flat = flatten_fields(&tree);
        let paths: Vec<_> = flat.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "title.type",
                "title.fields.keyword.type",
                "title.fields.keyword.ignore_above",
                "status.type",
            ]
        );
        assert_eq!(flat[2].1, json!(256));
    }

    #[test]
    fn test_flatten_arrays_and_empty_containers() {
        let tree = json!({
            "body": {"type": "text", "copy_to": ["all", "search"]},
            "meta": {"type": "object", "properties": {}}
        });
        let paths: Vec<_> = flatten_fields(&tree).into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["body.type", "body.copy_to.0", "body.copy_to.1", "meta.type"]);
    }

    #[test]
    fn test_marker_elided() {
        assert_eq!(logical_field_name("comments.properties.author.type"), "comments.author");
        assert_eq!(logical_field_name("title.fields.keyword.type"), "title");
        assert_eq!(logical_field_name("status.type"), "status");
    }

    #[test]
    fn test_deep_nesting() {
        assert_eq!(
            logical_field_name("a.properties.b.properties.c.properties.d.type"),
            "a.b.c.d"
        );
        assert_eq!(
            logical_field_name("a.properties.b.fields.raw.type"),
            "a.b"
        );
    }

    #[test]
    fn test_field_named_like_marker() {
        assert_eq!(logical_field_name("properties.type"), "properties");
        assert_eq!(logical_field_name("a.properties.properties.type"), "a.properties");
        assert_eq!(
            logical_field_name("a.properties.properties.properties.x.type"),
            "a.properties.x"
        );
    }

    #[test]
    fn test_trailing_marker_ignored() {
        assert_eq!(logical_field_name("a.properties"), "a");
    }

    #[test]
    fn test_field_names_from_response() {
        let response = json!({
            "blog_posts": {
                "mappings": {
                    "properties": {
                        "title": {"type": "text"},
                        "comments": {"type": "nested", "properties": {"author": {"type": "text"}}}
                    }
                }
            }
        });
        let names = field_names(&response, "blog_posts").unwrap();
        assert_eq!(names, vec!["title", "comments", "comments.author"]);
    }

    #[test]
    fn test_alias_entry_fallback() {
        let response = json!({"posts_v2": {"mappings": {"properties": {"a": {"type": "text"}}}}});
        assert_eq!(field_names(&response, "posts").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_mappings_without_properties_is_malformed() {
        let response = json!({"posts": {"mappings": {}}});
        assert!(field_names(&response, "posts").unwrap_err().is_malformed());

        let response = json!({"posts": {"mappings": {"properties": {}}}});
        assert!(field_names(&response, "posts").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_responses() {
        assert!(field_names(&json!([]), "posts").unwrap_err().is_malformed());
        assert!(field_names(&json!({"posts": {}}), "posts").unwrap_err().is_malformed());
        assert!(field_names(&json!({"a": {}, "b": {}}), "posts").unwrap_err().is_malformed());
        assert!(field_names(&json!({"posts": {"mappings": {"properties": 3}}}), "posts")
            .unwrap_err()
            .is_malformed());
    }
}
