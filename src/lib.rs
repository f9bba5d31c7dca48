//! OpenAPI Resolver
//!
//! Resolves and bundles OpenAPI v3 documents into a single self-contained
//! file.
//!
//! References (`$ref`) pointing to other files or to URLs are fetched and
//! inlined. Resolved content found in a recognizable position (a `schema`,
//! `headers`, `parameters` or `responses` container) is filed once under
//! `components` and every occurrence is rewritten to a local
//! `#/components/<category>/<name>` pointer.
//!
//! # Example
//!
//! ```no_run
//! use openapi_resolver::{DumpOptions, OpenapiResolver, ResolveOptions};
//!
//! let mut resolver = OpenapiResolver::from_source("openapi.yaml", ResolveOptions::new())?;
//! resolver.resolve()?;
//!
//! for miss in resolver.unresolved() {
//!     eprintln!("unresolved {} at {}", miss.reference, miss.path);
//! }
//! print!("{}", resolver.dump(&DumpOptions::default())?);
//! # Ok::<(), openapi_resolver::ResolveError>(())
//! ```
//!
//! # Reference Forms
//!
//! | `$ref` value | Resolution |
//! |--------------|------------|
//! | `#/a/b` | Left as is if present in the document, otherwise resolved against the current context |
//! | `https://host/file.yaml#/a` | Fetched over HTTP; the URL becomes the context of the fetched content |
//! | `../file.yaml#/a` | Joined to the current context (URL or file) |
//! | `file://...` | Rejected |
//!
//! # Output
//!
//! [`OpenapiResolver::dump`] drops the `x-commons` and `x-shared` sections
//! (by default), merges the filed components, orders top-level keys
//! (`openapi`, `info`, `servers`, `tags`, `paths`, `components`, then the
//! rest sorted) and never emits YAML anchors or aliases.

mod error;
mod loader;
mod registry;
mod resolver;
mod serializer;
mod types;
mod walker;

pub use error::{LoadError, ResolveError};
pub use loader::{
    fragment_keys, load_document, load_document_auto, load_document_str, navigate_fragment,
    parse_document, DefaultLoader, FetchCache, Loader,
};
pub use registry::{component_pointer, component_ref, ComponentRegistry};
pub use resolver::{categorize, classify, OpenapiResolver, RefKind, Unresolved};
pub use serializer::{bundle_document, render_entry, to_yaml};
pub use types::{
    is_url, ComponentCategory, DumpOptions, Location, ResolveOptions, DEFAULT_HTTP_TIMEOUT,
    DEFAULT_MAX_DEPTH, DEFAULT_REMOVE_TAGS, PREFERRED_ORDER, REF_KEY,
};
pub use walker::{traverse, Ancestors, Flow, PathKey, Visitor};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
