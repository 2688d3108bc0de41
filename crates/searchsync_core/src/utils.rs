//! Pure helpers available to projections and transforms.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Separator used when joining nested keys.
pub const KEY_GLUE: &str = ".";

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->|</?[A-Za-z!?][^>]*>").expect("valid tag pattern"));

/// Removes markup tags and comments from a string, keeping the text.
///
/// ```
/// use searchsync_core::utils::strip_tags;
///
/// assert_eq!(strip_tags("<p>Hello <b>world</b></p>"), "Hello world");
/// ```
pub fn strip_tags(input: &str) -> String {
    TAG_PATTERN.replace_all(input, "").into_owned()
}

/// Flattens nested objects and arrays into dot-joined keys.
///
/// The walk is depth-first. Only non-null objects and arrays are descended
/// into; array elements use their position as the key segment. Scalars and
/// nulls are copied under the accumulated key. Empty structures produce no
/// keys.
pub fn flatten(object: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in object {
        flatten_into(key, value, &mut out);
    }
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut Map<String, Value>) {
    match value {
        Value::Object(children) => {
            for (key, child) in children {
                flatten_into(&join(prefix, key), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(&join(prefix, &index.to_string()), child, out);
            }
        }
        scalar => {
            out.insert(prefix.to_string(), scalar.clone());
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    format!("{prefix}{KEY_GLUE}{key}")
}

/// Maps every top-level scalar (or null) value through `map_fn`.
///
/// Objects and arrays are copied unchanged.
pub fn object_map<F>(object: &Map<String, Value>, map_fn: F) -> Map<String, Value>
where
    F: Fn(&Value, &str) -> Value,
{
    object
        .iter()
        .map(|(key, value)| {
            let mapped = if value.is_object() || value.is_array() {
                value.clone()
            } else {
                map_fn(value, key)
            };
            (key.clone(), mapped)
        })
        .collect()
}

/// Keeps only the entries whose key is listed in `keys`.
///
/// The result follows the key order of `object`, not of `keys`.
pub fn filtered<S: AsRef<str>>(object: &Map<String, Value>, keys: &[S]) -> Map<String, Value> {
    object
        .iter()
        .filter(|(key, _)| keys.iter().any(|k| k.as_ref() == key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn strip_tags_removes_markup() {
        assert_eq!(strip_tags("<p>a <i>b</i></p>"), "a b");
        assert_eq!(strip_tags("x <!-- hidden\n note --> y"), "x  y");
        assert_eq!(strip_tags("1 < 2 and 3 > 2"), "1 < 2 and 3 > 2");
        assert_eq!(strip_tags("<br/>line<br />"), "line");
    }

    #[test]
    fn flatten_nested_objects() {
        let input = obj(json!({
            "id": 1,
            "author": {"name": "Ada", "address": {"city": "London"}},
            "draft": null,
        }));
        let flat = flatten(&input);
        assert_eq!(
            Value::Object(flat),
            json!({
                "id": 1,
                "author.name": "Ada",
                "author.address.city": "London",
                "draft": null,
            })
        );
    }

    #[test]
    fn flatten_arrays_by_position() {
        let input = obj(json!({"tags": ["a", "b"], "links": [{"url": "u"}], "empty": {}}));
        let flat = flatten(&input);
        assert_eq!(flat.get("tags.0"), Some(&json!("a")));
        assert_eq!(flat.get("tags.1"), Some(&json!("b")));
        assert_eq!(flat.get("links.0.url"), Some(&json!("u")));
        assert!(!flat.contains_key("empty"));
        assert_eq!(flat.len(), 3);
    }

    #[test]
    fn flatten_preserves_key_order() {
        let input = obj(json!({"z": 1, "a": {"y": 2, "b": 3}}));
        let keys: Vec<_> = flatten(&input).keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a.y", "a.b"]);
    }

    #[test]
    fn object_map_skips_structures() {
        let input = obj(json!({"title": "<b>T</b>", "meta": {"x": "<i>y</i>"}, "n": 3}));
        let mapped = object_map(&input, |value, _key| match value {
            Value::String(s) => Value::String(strip_tags(s)),
            other => other.clone(),
        });
        assert_eq!(
            Value::Object(mapped),
            json!({"title": "T", "meta": {"x": "<i>y</i>"}, "n": 3})
        );
    }

    #[test]
    fn object_map_receives_keys() {
        let input = obj(json!({"a": 1, "b": null}));
        let mapped = object_map(&input, |_value, key| Value::String(key.to_uppercase()));
        assert_eq!(Value::Object(mapped), json!({"a": "A", "b": "B"}));
    }

    #[test]
    fn filtered_keeps_listed_keys() {
        let input = obj(json!({"a": 1, "b": 2, "c": 3}));
        let out = filtered(&input, &["c", "a", "missing"]);
        let keys: Vec<_> = out.keys().cloned().collect();
        assert_eq!(keys, vec!["a", "c"]);
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z ]{0,8}".prop_map(Value::from),
        ]
    }

    fn json_tree() -> impl Strategy<Value = Value> {
        json_leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn flatten_then_filter_reproduces_leaves(
            entries in prop::collection::btree_map("[a-z]{1,4}", json_tree(), 0..5)
        ) {
            let object: Map<String, Value> = entries.into_iter().collect();
            let flat = flatten(&object);
            let keys: Vec<String> = flat.keys().cloned().collect();
            let kept = filtered(&flat, &keys);
            prop_assert_eq!(&kept, &flat);
            for value in kept.values() {
                prop_assert!(!value.is_object() && !value.is_array());
            }
        }
    }
}
