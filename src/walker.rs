//! Depth-first traversal of a document tree.
//!
//! The walker knows nothing about resolution: it finds mappings carrying a
//! string `$ref` and hands them to a [`Visitor`], which decides what to do
//! and may recurse back into [`traverse`] with a new scope.

use std::fmt;

use serde_json::Value;

use crate::types::REF_KEY;

/// Key of a child inside its container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKey {
    Key(String),
    Index(usize),
}

impl PathKey {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            PathKey::Key(k) => Some(k),
            PathKey::Index(_) => None,
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Key(k) => f.write_str(&k.replace('~', "~0").replace('/', "~1")),
            PathKey::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Keys leading from the root to the node being visited.
///
/// The root has no key, so an empty chain means "at the root".
#[derive(Debug, Clone, Default)]
pub struct Ancestors {
    keys: Vec<PathKey>,
}

impl Ancestors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key of the current node inside its container.
    pub fn needle(&self) -> Option<&PathKey> {
        self.keys.last()
    }

    /// Key of the container holding the current node.
    pub fn granny(&self) -> Option<&PathKey> {
        self.keys.len().checked_sub(2).map(|i| &self.keys[i])
    }

    pub fn depth(&self) -> usize {
        self.keys.len()
    }

    fn push(&mut self, key: PathKey) {
        self.keys.push(key);
    }

    fn pop(&mut self) {
        self.keys.pop();
    }
}

/// Renders as a JSON Pointer, `/` for the root.
impl fmt::Display for Ancestors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.keys.is_empty() {
            return f.write_str("/");
        }
        for key in &self.keys {
            write!(f, "/{}", key)?;
        }
        Ok(())
    }
}

/// What the walker does after a reference was visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Walk the mapping's children as for any other node.
    Descend,
    /// The visitor took care of the node and its subtree.
    Handled,
}

/// Hooks called by [`traverse`].
pub trait Visitor {
    /// State inherited by descendants, never by siblings.
    type Scope;
    type Error;

    /// Called for each mapping holding a string `$ref`, before its children.
    ///
    /// `node` is the mapping itself and may be replaced in place.
    fn visit_reference(
        &mut self,
        node: &mut Value,
        reference: &str,
        ancestors: &mut Ancestors,
        scope: &Self::Scope,
    ) -> Result<Flow, Self::Error>;

    /// Scope for the children of a container reached through `key`.
    fn descend(&self, scope: &Self::Scope, key: &PathKey) -> Self::Scope;
}

/// Visit `node` and its descendants depth-first, in document order.
///
/// `ancestors` holds the keys leading to `node` and is restored before
/// returning.
pub fn traverse<V: Visitor>(
    node: &mut Value,
    ancestors: &mut Ancestors,
    scope: &V::Scope,
    visitor: &mut V,
) -> Result<(), V::Error> {
    if let Some(reference) = node.get(REF_KEY).and_then(Value::as_str) {
        let reference = reference.to_string();
        if visitor.visit_reference(node, &reference, ancestors, scope)? == Flow::Handled {
            return Ok(());
        }
    }

    match node {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if child.is_object() || child.is_array() {
                    let key = PathKey::Key(key.clone());
                    let child_scope = visitor.descend(scope, &key);
                    ancestors.push(key);
                    let result = traverse(child, ancestors, &child_scope, visitor);
                    ancestors.pop();
                    result?;
                }
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter_mut().enumerate() {
                if child.is_object() || child.is_array() {
                    let key = PathKey::Index(index);
                    let child_scope = visitor.descend(scope, &key);
                    ancestors.push(key);
                    let result = traverse(child, ancestors, &child_scope, visitor);
                    ancestors.pop();
                    result?;
                }
            }
        }
        // Scalars carry nothing to resolve
        _ => {}
    }
    Ok(())
}
