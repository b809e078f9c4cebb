//! Dotted-path flatten/nest transformer and the property-shape validator.
//!
//! No teacher module needs this — `CodeNode::properties` round-trips through
//! `serde_json` directly — but the persistence adapter requires a single
//! source of truth for `"a.b.c" <-> {a:{b:{c}}}` (spec.md §4.3) so that
//! merge-patch semantics are well defined. Written in the small-helper-plus-
//! unit-test idiom of `detectors::base::{compile_glob_patterns,
//! should_exclude_path}`.

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PropertyError {
    #[error("property value at key '{0}' is not representable (cycles or non-JSON value)")]
    Unrepresentable(String),

    #[error("property nesting at key '{0}' exceeds the one-level-of-object limit")]
    TooDeep(String),
}

/// Flatten a nested property map into dotted-path keys.
///
/// `{a: {b: {c: 1}}}` -> `{"a.b.c": 1}`. Arrays and scalars at any depth are
/// left as leaves (not recursed into further once a non-object is reached).
pub fn flatten(nested: &HashMap<String, Value>) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    for (key, value) in nested {
        flatten_into(key, value, &mut out);
    }
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut HashMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                let path = format!("{prefix}.{k}");
                flatten_into(&path, v, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

/// Nest a dotted-path property map back into nested objects.
///
/// Inverse of [`flatten`]. Conflicting paths (a leaf where a parent object is
/// also required) overwrite earlier leaves deterministically by insertion
/// order, matching `serde_json::Map`'s own insertion-order semantics.
pub fn nest(flat: &HashMap<String, Value>) -> HashMap<String, Value> {
    let mut root = Map::new();
    for (key, value) in flat {
        let parts: Vec<&str> = key.split('.').collect();
        insert_path(&mut root, &parts, value.clone());
    }
    root.into_iter().collect()
}

fn insert_path(map: &mut Map<String, Value>, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}

/// Validate a (nested) property map: scalars, homogeneous arrays, and at
/// most one level of nested object are allowed (spec.md §4.3).
pub fn validate(properties: &HashMap<String, Value>) -> Result<(), PropertyError> {
    for (key, value) in properties {
        validate_value(key, value, 0)?;
    }
    Ok(())
}

fn validate_value(key: &str, value: &Value, depth: usize) -> Result<(), PropertyError> {
    match value {
        Value::Object(map) => {
            if depth >= 1 {
                return Err(PropertyError::TooDeep(key.to_string()));
            }
            for (k, v) in map {
                validate_value(&format!("{key}.{k}"), v, depth + 1)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            let mut kind: Option<std::mem::Discriminant<Value>> = None;
            for item in items {
                if matches!(item, Value::Object(_) | Value::Array(_)) {
                    return Err(PropertyError::Unrepresentable(key.to_string()));
                }
                let this_kind = std::mem::discriminant(item);
                match kind {
                    None => kind = Some(this_kind),
                    Some(k) if k == this_kind => {}
                    Some(_) => return Err(PropertyError::Unrepresentable(key.to_string())),
                }
            }
            Ok(())
        }
        Value::Null => Err(PropertyError::Unrepresentable(key.to_string())),
        _ => Ok(()),
    }
}

/// JSON-merge-patch (RFC 7396-style): keys in `patch` override; a `null`
/// leaf deletes the key; absent keys are preserved. Operates on the nested
/// form and is used by the persistence adapter's `mergeProperties`.
pub fn merge_patch(base: &mut HashMap<String, Value>, patch: &HashMap<String, Value>) {
    for (key, patch_value) in patch {
        match patch_value {
            Value::Null => {
                base.remove(key);
            }
            Value::Object(patch_map) if !patch_map.is_empty() => {
                let existing = base
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !existing.is_object() {
                    *existing = Value::Object(Map::new());
                }
                if let Value::Object(existing_map) = existing {
                    let mut existing_as_map: HashMap<String, Value> =
                        existing_map.clone().into_iter().collect();
                    let patch_as_map: HashMap<String, Value> =
                        patch_map.clone().into_iter().collect();
                    merge_patch(&mut existing_as_map, &patch_as_map);
                    *existing_map = existing_as_map.into_iter().collect();
                }
            }
            other => {
                base.insert(key.clone(), other.clone());
            }
        }
    }
}
