//! Deduplicated store of resolved external fragments.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{ComponentCategory, REF_KEY};

/// Components filed during one resolution run, by category then name.
///
/// Entries are independent copies of the resolved content. Names keep
/// their filing order within a category.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComponentRegistry {
    #[serde(flatten)]
    categories: BTreeMap<ComponentCategory, Map<String, Value>>,
    #[serde(skip)]
    sources: BTreeMap<(ComponentCategory, String), String>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `content` under `category`/`name`. Last write wins.
    ///
    /// `source` is the `location#fragment` the content was resolved from;
    /// overwriting a slot filed from another source is logged.
    pub fn insert(&mut self, category: ComponentCategory, name: &str, content: Value, source: &str) {
        let previous = self
            .sources
            .insert((category, name.to_string()), source.to_string());
        if let Some(previous) = previous.filter(|p| p != source) {
            tracing::warn!(
                %category,
                name,
                previous = %previous,
                source,
                "component filed twice from different sources; keeping the latest"
            );
        }
        tracing::info!(%category, name, source, "filed component");
        self.categories
            .entry(category)
            .or_default()
            .insert(name.to_string(), content);
    }

    pub fn get(&self, category: ComponentCategory, name: &str) -> Option<&Value> {
        self.categories.get(&category)?.get(name)
    }

    pub fn contains(&self, category: ComponentCategory, name: &str) -> bool {
        self.get(category, name).is_some()
    }

    /// Source the entry at `category`/`name` was filed from.
    pub fn source_of(&self, category: ComponentCategory, name: &str) -> Option<&str> {
        self.sources
            .get(&(category, name.to_string()))
            .map(String::as_str)
    }

    /// Whether `pointer` is a canonical `#/components/<category>/<name>`
    /// pointer to a filed entry.
    pub fn contains_pointer(&self, pointer: &str) -> bool {
        let Some(rest) = pointer.strip_prefix("#/components/") else {
            return false;
        };
        let Some((category, name)) = rest.split_once('/') else {
            return false;
        };
        let name = name.replace("~1", "/").replace("~0", "~");
        self.categories
            .iter()
            .any(|(c, entries)| c.as_str() == category && entries.contains_key(&name))
    }

    /// Number of filed entries across all categories.
    pub fn len(&self) -> usize {
        self.categories.values().map(Map::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over `(category, name, content)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (ComponentCategory, &str, &Value)> {
        self.categories.iter().flat_map(|(category, entries)| {
            entries
                .iter()
                .map(move |(name, content)| (*category, name.as_str(), content))
        })
    }

    /// The registry as a `components`-shaped tree.
    pub fn to_value(&self) -> Value {
        let sections = self
            .categories
            .iter()
            .map(|(category, entries)| (category.as_str().to_string(), Value::Object(entries.clone())))
            .collect();
        Value::Object(sections)
    }

    /// Merge all entries into a document's `components` mapping.
    ///
    /// Existing entries are kept unless the registry holds the same name,
    /// in which case the registry entry wins.
    pub fn merge_into(&self, components: &mut Map<String, Value>) {
        for (category, entries) in &self.categories {
            let section = components
                .entry(category.as_str())
                .or_insert_with(|| Value::Object(Map::new()));
            if !section.is_object() {
                tracing::warn!(%category, "replacing non-mapping components section");
                *section = Value::Object(Map::new());
            }
            let Value::Object(section) = section else {
                continue;
            };
            for (name, content) in entries {
                if let Some(existing) = section.get(name) {
                    if existing != content && !is_pointer_to(existing, *category, name) {
                        tracing::warn!(
                            %category,
                            name = name.as_str(),
                            "resolved component overrides the document's own definition"
                        );
                    }
                }
                section.insert(name.clone(), content.clone());
            }
        }
    }
}

/// Canonical local pointer for a filed component.
pub fn component_pointer(category: ComponentCategory, name: &str) -> String {
    format!(
        "#/components/{}/{}",
        category.as_str(),
        name.replace('~', "~0").replace('/', "~1")
    )
}

/// A `{"$ref": "#/components/<category>/<name>"}` node.
pub fn component_ref(category: ComponentCategory, name: &str) -> Value {
    let mut map = Map::new();
    map.insert(REF_KEY.to_string(), Value::String(component_pointer(category, name)));
    Value::Object(map)
}

fn is_pointer_to(value: &Value, category: ComponentCategory, name: &str) -> bool {
    value.get(REF_KEY).and_then(Value::as_str) == Some(component_pointer(category, name).as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn insert_is_last_write_wins() {
        let mut registry = ComponentRegistry::new();
        registry.insert(ComponentCategory::Schemas, "Problem", json!({"v": 1}), "a.yaml#/Problem");
        registry.insert(ComponentCategory::Schemas, "Problem", json!({"v": 2}), "b.yaml#/Problem");

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(ComponentCategory::Schemas, "Problem"), Some(&json!({"v": 2})));
        assert_eq!(
            registry.source_of(ComponentCategory::Schemas, "Problem"),
            Some("b.yaml#/Problem")
        );
    }

    #[test]
    fn categories_are_independent() {
        let mut registry = ComponentRegistry::new();
        registry.insert(ComponentCategory::Schemas, "Foo", json!(1), "x#/Foo");
        registry.insert(ComponentCategory::Headers, "Foo", json!(2), "y#/Foo");

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(ComponentCategory::Headers, "Foo"));
        assert!(!registry.contains(ComponentCategory::Parameters, "Foo"));
    }

    #[test]
    fn contains_pointer_matches_filed_entries() {
        let mut registry = ComponentRegistry::new();
        registry.insert(ComponentCategory::Responses, "400BadRequest", json!({}), "r#/400BadRequest");

        assert!(registry.contains_pointer("#/components/responses/400BadRequest"));
        assert!(!registry.contains_pointer("#/components/schemas/400BadRequest"));
        assert!(!registry.contains_pointer("#/responses/400BadRequest"));
    }

    #[test]
    fn to_value_is_components_shaped() {
        let mut registry = ComponentRegistry::new();
        registry.insert(ComponentCategory::Headers, "Retry-After", json!({"schema": {"type": "integer"}}), "h#/Retry-After");
        assert_eq!(
            registry.to_value(),
            json!({"headers": {"Retry-After": {"schema": {"type": "integer"}}}})
        );
    }

    #[test]
    fn serializes_without_sources() {
        let mut registry = ComponentRegistry::new();
        registry.insert(ComponentCategory::Parameters, "limit", json!({"in": "query"}), "p#/limit");
        assert_eq!(
            serde_json::to_string(&registry).unwrap(),
            r#"{"parameters":{"limit":{"in":"query"}}}"#
        );
    }

    #[test]
    fn merge_adds_and_overrides() {
        let mut registry = ComponentRegistry::new();
        registry.insert(ComponentCategory::Schemas, "Problem", json!({"type": "object"}), "p#/Problem");
        registry.insert(ComponentCategory::Responses, "400BadRequest", json!({"description": "Bad"}), "r#/400BadRequest");

        let mut components = json!({
            "schemas": {"Pet": {"type": "object"}, "Problem": {"type": "string"}},
            "responses": {"400BadRequest": {"$ref": "#/components/responses/400BadRequest"}}
        });
        registry.merge_into(components.as_object_mut().unwrap());

        assert_eq!(components["schemas"]["Pet"], json!({"type": "object"}));
        assert_eq!(components["schemas"]["Problem"], json!({"type": "object"}));
        assert_eq!(components["responses"]["400BadRequest"], json!({"description": "Bad"}));
    }

    #[test]
    fn merge_creates_missing_categories() {
        let mut registry = ComponentRegistry::new();
        registry.insert(ComponentCategory::Parameters, "limit", json!({"in": "query"}), "p#/limit");

        let mut components = Map::new();
        registry.merge_into(&mut components);
        assert_eq!(Value::Object(components), json!({"parameters": {"limit": {"in": "query"}}}));
    }

    #[test]
    fn pointer_escapes_name() {
        assert_eq!(
            component_pointer(ComponentCategory::Schemas, "a/b~c"),
            "#/components/schemas/a~1b~0c"
        );
        assert_eq!(
            component_ref(ComponentCategory::Headers, "X-Rate"),
            json!({"$ref": "#/components/headers/X-Rate"})
        );
    }
}
