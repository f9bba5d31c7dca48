//! Canonical YAML output for resolved documents.
//!
//! Rendering is left to `serde_yaml`: a `serde_json::Value` has no shared
//! nodes, so repeated content is always written out in full (no anchors or
//! aliases), and strings with line breaks get literal block style wherever
//! YAML can represent them that way.

use serde_json::{Map, Value};

use crate::error::ResolveError;
use crate::registry::ComponentRegistry;
use crate::types::{DumpOptions, COMPONENTS_KEY, PREFERRED_ORDER};

/// Build the output tree for a resolved document.
///
/// Mapping roots lose the `remove_tags` keys, get the registry merged into
/// `components` (created if absent) and have their top-level keys ordered:
/// [`PREFERRED_ORDER`] first, the rest sorted. Other roots are returned as
/// they are.
pub fn bundle_document(
    document: &Value,
    registry: &ComponentRegistry,
    options: &DumpOptions,
) -> Value {
    let Value::Object(root) = document else {
        return document.clone();
    };

    let mut root = root.clone();
    for tag in &options.remove_tags {
        root.remove(tag);
    }

    let components = root
        .entry(COMPONENTS_KEY)
        .or_insert_with(|| Value::Object(Map::new()));
    if !components.is_object() {
        tracing::warn!("replacing non-mapping components section");
        *components = Value::Object(Map::new());
    }
    if let Value::Object(components) = components {
        registry.merge_into(components);
    }

    let mut ordered = Map::with_capacity(root.len());
    for key in PREFERRED_ORDER {
        if let Some(value) = root.remove(*key) {
            ordered.insert(key.to_string(), value);
        }
    }
    let mut remaining: Vec<(String, Value)> = root.into_iter().collect();
    remaining.sort_by(|a, b| a.0.cmp(&b.0));
    ordered.extend(remaining);

    Value::Object(ordered)
}

/// Render a tree as block-style YAML.
///
/// Each top-level entry of a mapping root is rendered as its own
/// self-contained block; the blocks are concatenated in order.
///
/// # Errors
///
/// Returns `ResolveError::Serialize` if `serde_yaml` rejects the tree.
pub fn to_yaml(value: &Value) -> Result<String, ResolveError> {
    match value {
        Value::Object(map) if !map.is_empty() => {
            let mut out = String::new();
            for (key, child) in map {
                out.push_str(&render_entry(key, child)?);
            }
            Ok(out)
        }
        other => Ok(serde_yaml::to_string(other)?),
    }
}

/// Render a single `key: value` document.
pub fn render_entry(key: &str, value: &Value) -> Result<String, ResolveError> {
    let mut entry = Map::with_capacity(1);
    entry.insert(key.to_string(), value.clone());
    Ok(serde_yaml::to_string(&Value::Object(entry))?)
}
