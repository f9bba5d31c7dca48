//! Reference resolution - inlines external `$ref` targets and files them as
//! components.
//!
//! Each `$ref` goes through the same steps: classify the value, decide
//! against the current context whether it can and should be resolved,
//! fetch the target, splice it over the referencing node, resolve the
//! spliced content under the target's own location, and finally file it
//! in the [`ComponentRegistry`] when its position names a category.

use std::collections::HashSet;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::ResolveError;
use crate::loader::{fragment_keys, navigate_fragment, parse_document, DefaultLoader, FetchCache, Loader};
use crate::registry::{component_ref, ComponentRegistry};
use crate::serializer::{bundle_document, to_yaml};
use crate::types::{ComponentCategory, DumpOptions, Location, ResolveOptions};
use crate::walker::{traverse, Ancestors, Flow, PathKey, Visitor};

/// How a `$ref` value is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind<'a> {
    /// `#/pointer` into the current document.
    Local(&'a str),
    /// `http(s)://host/path#/pointer`.
    Url { location: &'a str, fragment: &'a str },
    /// `file://...`, or any other scheme.
    Unsupported,
    /// `path#/pointer`, relative to the current context.
    Relative { location: &'a str, fragment: &'a str },
}

/// Classify a `$ref` value by its syntax alone.
pub fn classify(reference: &str) -> RefKind<'_> {
    if reference == "#" || reference.starts_with("#/") {
        return RefKind::Local(reference);
    }

    let (location, fragment) = split_fragment(reference);
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return RefKind::Url { location, fragment };
    }
    if has_scheme(location) {
        return RefKind::Unsupported;
    }
    RefKind::Relative { location, fragment }
}

fn split_fragment(reference: &str) -> (&str, &str) {
    match reference.find('#') {
        Some(idx) => (&reference[..idx], &reference[idx..]),
        None => (reference, ""),
    }
}

fn has_scheme(location: &str) -> bool {
    match location.split_once("://") {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Pick the component category for a `$ref` node.
///
/// The key of the node itself is checked first, then the key of its
/// container. Inside a schema every otherwise uncategorized reference is
/// a schema.
pub fn categorize(ancestors: &Ancestors, in_schema: bool) -> Option<ComponentCategory> {
    let by_key = |key: Option<&PathKey>| {
        key.and_then(PathKey::as_key)
            .and_then(ComponentCategory::from_container)
    };
    by_key(ancestors.needle())
        .or_else(|| by_key(ancestors.granny()))
        .or(if in_schema {
            Some(ComponentCategory::Schemas)
        } else {
            None
        })
}

/// A relative reference whose target could not be located.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unresolved {
    /// The `$ref` value, left as is in the output.
    pub reference: String,
    /// Path of the `$ref` node in the document.
    pub path: String,
    /// Context the reference was resolved against, if any.
    pub context: Option<String>,
}

/// Resolves an OpenAPI document, replacing external references with local
/// components.
///
/// One resolver is one run: the fetch cache, the component registry and
/// the unresolved list all belong to it.
///
/// # Example
///
/// ```
/// use openapi_resolver::{OpenapiResolver, ResolveOptions};
/// use serde_json::json;
///
/// let doc = json!({
///     "openapi": "3.0.1",
///     "components": {"schemas": {"Pet": {"type": "object"}}},
///     "paths": {"/pets": {"get": {"responses": {"200": {
///         "description": "OK",
///         "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}
///     }}}}}
/// });
///
/// let mut resolver = OpenapiResolver::new(doc.clone(), ResolveOptions::new());
/// let resolved = resolver.resolve().unwrap();
///
/// // Local references are left untouched
/// assert_eq!(resolved, &doc);
/// assert!(resolver.registry().is_empty());
/// ```
#[derive(Debug)]
pub struct OpenapiResolver<L: Loader = DefaultLoader> {
    document: Value,
    options: ResolveOptions,
    loader: L,
    cache: FetchCache,
    registry: ComponentRegistry,
    unresolved: Vec<Unresolved>,
}

impl OpenapiResolver<DefaultLoader> {
    /// Create a resolver fetching from the filesystem and http(s).
    pub fn new(document: Value, options: ResolveOptions) -> Self {
        let loader = DefaultLoader::new(options.http_timeout);
        Self::with_loader(document, options, loader)
    }

    /// Load the document at `source` (path or URL) and use `source` as
    /// the initial context unless `options` already sets one.
    pub fn from_source(source: &str, options: ResolveOptions) -> Result<Self, ResolveError> {
        let loader = DefaultLoader::new(options.http_timeout);
        let content = loader.load(&Location::parse(source))?;
        let document = parse_document(&content, source)?;
        let options = match options.context {
            Some(_) => options,
            None => options.context(source),
        };
        Ok(Self::with_loader(document, options, loader))
    }
}

impl<L: Loader> OpenapiResolver<L> {
    /// Create a resolver fetching through `loader`.
    pub fn with_loader(document: Value, options: ResolveOptions, loader: L) -> Self {
        Self {
            document,
            options,
            loader,
            cache: FetchCache::new(),
            registry: ComponentRegistry::new(),
            unresolved: Vec::new(),
        }
    }

    /// Resolve all references in one depth-first pass.
    ///
    /// Local pointers are checked against the document as it was before
    /// the pass. On error the document, the registry and the unresolved
    /// list are left as they were; documents fetched so far stay cached.
    ///
    /// # Errors
    ///
    /// Unsupported schemes, missing fragments, fetch failures, cycles and
    /// exceeding `max_depth` abort the run. Relative references that
    /// cannot be located are recorded in [`unresolved`](Self::unresolved)
    /// instead.
    pub fn resolve(&mut self) -> Result<&Value, ResolveError> {
        let mut working = self.document.clone();
        let mut registry = self.registry.clone();
        let mut unresolved = Vec::new();
        let scope = Scope {
            context: self
                .options
                .context
                .as_deref()
                .map(|c| Rc::new(Location::parse(c))),
            in_schema: false,
            depth: 0,
        };

        let mut pass = Pass {
            origin: &self.document,
            loader: &self.loader,
            cache: &mut self.cache,
            registry: &mut registry,
            unresolved: &mut unresolved,
            in_flight: HashSet::new(),
            max_depth: self.options.max_depth,
        };
        traverse(&mut working, &mut Ancestors::new(), &scope, &mut pass)?;

        self.document = working;
        self.registry = registry;
        self.unresolved = unresolved;
        Ok(&self.document)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_document(self) -> Value {
        self.document
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Relative references left unresolved by the last successful run.
    pub fn unresolved(&self) -> &[Unresolved] {
        &self.unresolved
    }

    /// Number of documents fetched so far.
    pub fn fetch_count(&self) -> usize {
        self.cache.fetches()
    }

    /// The output tree: tags removed, components merged, keys ordered.
    pub fn bundle(&self, options: &DumpOptions) -> Value {
        bundle_document(&self.document, &self.registry, options)
    }

    /// Render the output tree as YAML.
    pub fn dump(&self, options: &DumpOptions) -> Result<String, ResolveError> {
        to_yaml(&self.bundle(options))
    }
}

/// State inherited by the descendants of a node.
#[derive(Debug, Clone)]
struct Scope {
    /// Location of the document the current subtree was fetched from.
    context: Option<Rc<Location>>,
    /// Set below `schema` containers and schema components.
    in_schema: bool,
    /// Number of references resolved on the way down.
    depth: usize,
}

struct Target {
    location: Location,
    fragment: String,
}

impl Target {
    fn source(&self) -> String {
        format!("{}{}", self.location, self.fragment)
    }

    /// Last pointer segment, or the file stem for whole-document targets.
    fn component_name(&self) -> Option<String> {
        fragment_keys(&self.fragment)
            .pop()
            .or_else(|| self.location.file_stem())
    }
}

enum Plan {
    Skip,
    Resolve(Target),
}

/// One traversal over a working copy of the document.
struct Pass<'r, L: Loader> {
    origin: &'r Value,
    loader: &'r L,
    cache: &'r mut FetchCache,
    registry: &'r mut ComponentRegistry,
    unresolved: &'r mut Vec<Unresolved>,
    in_flight: HashSet<String>,
    max_depth: usize,
}

impl<L: Loader> Pass<'_, L> {
    fn plan(
        &mut self,
        reference: &str,
        ancestors: &Ancestors,
        scope: &Scope,
    ) -> Result<Plan, ResolveError> {
        match classify(reference) {
            RefKind::Local(pointer) => {
                if navigate_fragment(self.origin, pointer).is_some()
                    || self.registry.contains_pointer(pointer)
                {
                    tracing::trace!(reference, "local reference left as is");
                    return Ok(Plan::Skip);
                }
                match &scope.context {
                    Some(context) => Ok(Plan::Resolve(Target {
                        location: Location::clone(context),
                        fragment: pointer.to_string(),
                    })),
                    None => {
                        tracing::debug!(reference, path = %ancestors, "dangling local reference");
                        Ok(Plan::Skip)
                    }
                }
            }
            RefKind::Url { location, fragment } => {
                let url = Url::parse(location).map_err(|_| ResolveError::UnsupportedScheme {
                    reference: reference.to_string(),
                    path: ancestors.to_string(),
                })?;
                Ok(Plan::Resolve(Target {
                    location: Location::Url(url),
                    fragment: fragment.to_string(),
                }))
            }
            RefKind::Unsupported => Err(ResolveError::UnsupportedScheme {
                reference: reference.to_string(),
                path: ancestors.to_string(),
            }),
            RefKind::Relative { location, fragment } => {
                let resolved = match &scope.context {
                    Some(context) => context.join(location),
                    None => Location::from_relative(location),
                };
                match resolved {
                    Some(location) => Ok(Plan::Resolve(Target {
                        location,
                        fragment: fragment.to_string(),
                    })),
                    None => {
                        let context = scope.context.as_ref().map(|c| c.to_string());
                        tracing::warn!(
                            reference,
                            path = %ancestors,
                            context = context.as_deref().unwrap_or("<none>"),
                            "cannot locate relative reference; leaving it unresolved"
                        );
                        self.unresolved.push(Unresolved {
                            reference: reference.to_string(),
                            path: ancestors.to_string(),
                            context,
                        });
                        Ok(Plan::Skip)
                    }
                }
            }
        }
    }

    fn resolve_into(
        &mut self,
        node: &mut Value,
        reference: &str,
        target: Target,
        ancestors: &mut Ancestors,
        scope: &Scope,
    ) -> Result<(), ResolveError> {
        if scope.depth >= self.max_depth {
            return Err(ResolveError::DepthExceeded {
                reference: reference.to_string(),
                path: ancestors.to_string(),
                limit: self.max_depth,
            });
        }

        let source = target.source();
        let category = categorize(ancestors, scope.in_schema);
        let filed = category.and_then(|c| target.component_name().map(|name| (c, name)));

        if let Some((category, name)) = &filed {
            if self.registry.source_of(*category, name) == Some(source.as_str()) {
                tracing::debug!(reference, %category, name = name.as_str(), "component already filed");
                *node = component_ref(*category, name);
                return Ok(());
            }
        }

        if !self.in_flight.insert(source.clone()) {
            return Err(ResolveError::CycleDetected {
                reference: reference.to_string(),
                path: ancestors.to_string(),
            });
        }

        tracing::debug!(reference, path = %ancestors, %source, "resolving reference");
        let document = self
            .cache
            .get_or_load(&target.location, self.loader)
            .map_err(|source| ResolveError::FetchFailure {
                reference: reference.to_string(),
                path: ancestors.to_string(),
                source,
            })?;
        *node = navigate_fragment(document, &target.fragment)
            .cloned()
            .ok_or_else(|| ResolveError::LookupFailure {
                reference: reference.to_string(),
                fragment: target.fragment.clone(),
                path: ancestors.to_string(),
            })?;

        if node.is_object() || node.is_array() {
            let nested = Scope {
                context: Some(Rc::new(target.location)),
                in_schema: match category {
                    Some(category) => category == ComponentCategory::Schemas,
                    None => scope.in_schema,
                },
                depth: scope.depth + 1,
            };
            traverse(node, ancestors, &nested, self)?;
        }
        self.in_flight.remove(&source);

        if let Some((category, name)) = filed {
            self.registry.insert(category, &name, node.clone(), &source);
            *node = component_ref(category, &name);
        }
        Ok(())
    }
}

impl<L: Loader> Visitor for Pass<'_, L> {
    type Scope = Scope;
    type Error = ResolveError;

    fn visit_reference(
        &mut self,
        node: &mut Value,
        reference: &str,
        ancestors: &mut Ancestors,
        scope: &Scope,
    ) -> Result<Flow, ResolveError> {
        match self.plan(reference, ancestors, scope)? {
            Plan::Skip => Ok(Flow::Descend),
            Plan::Resolve(target) => {
                self.resolve_into(node, reference, target, ancestors, scope)?;
                Ok(Flow::Handled)
            }
        }
    }

    fn descend(&self, scope: &Scope, key: &PathKey) -> Scope {
        let mut child = scope.clone();
        if key.as_key() == Some("schema") {
            child.in_schema = true;
        }
        child
    }
}
