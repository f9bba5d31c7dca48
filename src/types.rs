//! Core types for OpenAPI reference resolution.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use url::Url;

/// Key of a JSON Reference.
pub const REF_KEY: &str = "$ref";

/// Top-level section holding the bundled components.
pub const COMPONENTS_KEY: &str = "components";

/// Top-level keys emitted first, in this order, when dumping a document.
pub const PREFERRED_ORDER: &[&str] = &["openapi", "info", "servers", "tags", "paths", "components"];

/// Shared-definition sections removed before dumping unless told otherwise.
pub const DEFAULT_REMOVE_TAGS: &[&str] = &["x-commons", "x-shared"];

/// Default limit on nested reference resolutions.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default timeout for HTTP requests (10 seconds).
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Where a document lives: a URL or an absolute filesystem path.
///
/// This is also the resolution context for relative references found
/// inside that document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Url(Url),
    Path(PathBuf),
}

impl Location {
    /// Interpret a source string as a URL when it has an http(s) scheme,
    /// otherwise as a filesystem path made absolute.
    pub fn parse(source: &str) -> Self {
        if is_url(source) {
            if let Ok(url) = Url::parse(source) {
                return Location::Url(without_fragment(url));
            }
        }
        Location::Path(absolutize(Path::new(source)))
    }

    /// Resolve a relative reference location against this one.
    ///
    /// URLs are joined as relative URLs. Paths are joined to the parent
    /// directory and must point to an existing file; `None` otherwise.
    pub fn join(&self, relative: &str) -> Option<Location> {
        match self {
            Location::Url(base) => base.join(relative).ok().map(without_fragment).map(Location::Url),
            Location::Path(base) => {
                let dir = base.parent().unwrap_or_else(|| Path::new("/"));
                resolve_file(&dir.join(relative))
            }
        }
    }

    /// Resolve a relative reference location against the working directory.
    pub fn from_relative(relative: &str) -> Option<Location> {
        resolve_file(Path::new(relative))
    }

    /// Last path segment without its extension, e.g. `responses` for
    /// `https://example.com/responses.yaml`.
    pub fn file_stem(&self) -> Option<String> {
        match self {
            Location::Url(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(|s| match s.rsplit_once('.') {
                    Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                    _ => s.to_string(),
                }),
            Location::Path(path) => path.file_stem().map(|s| s.to_string_lossy().into_owned()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Url(url) => write!(f, "{}", url),
            Location::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

fn without_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

fn resolve_file(path: &Path) -> Option<Location> {
    if path.is_file() {
        Some(Location::Path(absolutize(path)))
    } else {
        None
    }
}

fn absolutize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

/// Section of `components` a resolved reference is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentCategory {
    Schemas,
    Headers,
    Parameters,
    Responses,
}

impl ComponentCategory {
    /// Map the key of a container holding a `$ref` to its category.
    pub fn from_container(key: &str) -> Option<Self> {
        match key {
            "schema" => Some(ComponentCategory::Schemas),
            "headers" => Some(ComponentCategory::Headers),
            "parameters" => Some(ComponentCategory::Parameters),
            "responses" => Some(ComponentCategory::Responses),
            _ => None,
        }
    }

    /// Returns the key of this category inside `components`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentCategory::Schemas => "schemas",
            ComponentCategory::Headers => "headers",
            ComponentCategory::Parameters => "parameters",
            ComponentCategory::Responses => "responses",
        }
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for one resolution run.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Location of the input document, used as the base for the first
    /// relative reference encountered.
    pub context: Option<String>,
    /// Maximum nesting of reference resolutions before giving up.
    pub max_depth: usize,
    /// Timeout applied to every HTTP fetch by the default loader.
    pub http_timeout: Duration,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            context: None,
            max_depth: DEFAULT_MAX_DEPTH,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl ResolveOptions {
    /// Create options with no initial context and default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial context (source path or URL of the document).
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Set the maximum nesting of reference resolutions.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the HTTP fetch timeout.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }
}

/// Options for rendering a resolved document.
#[derive(Debug, Clone)]
pub struct DumpOptions {
    /// Top-level keys dropped from the output.
    pub remove_tags: Vec<String>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            remove_tags: DEFAULT_REMOVE_TAGS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DumpOptions {
    /// Remove the given top-level keys instead of the default ones.
    pub fn remove_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            remove_tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}
