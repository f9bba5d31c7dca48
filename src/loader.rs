//! Document loading from files, strings, and HTTP URLs.
//!
//! Documents are YAML (JSON is accepted as a YAML subset) and are turned
//! into an order-preserving `serde_json::Value` tree.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde_json::{Map, Number, Value};

use crate::error::LoadError;
use crate::types::{is_url, Location, DEFAULT_HTTP_TIMEOUT};

/// Source of raw document text.
///
/// The resolver only talks to documents through this trait, so tests and
/// embedders can serve fixtures from memory.
pub trait Loader {
    /// Return the raw content stored at `location`.
    fn load(&self, location: &Location) -> Result<String, LoadError>;
}

/// Loader for filesystem paths and http(s) URLs.
#[derive(Debug, Clone)]
pub struct DefaultLoader {
    timeout: Duration,
}

impl Default for DefaultLoader {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_TIMEOUT)
    }
}

impl DefaultLoader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Loader for DefaultLoader {
    fn load(&self, location: &Location) -> Result<String, LoadError> {
        match location {
            Location::Path(path) => read_file(path),
            #[cfg(feature = "remote")]
            Location::Url(url) => fetch_url(url.as_str(), self.timeout),
            #[cfg(not(feature = "remote"))]
            Location::Url(url) => {
                let _ = self.timeout;
                Err(LoadError::RemoteDisabled {
                    url: url.to_string(),
                })
            }
        }
    }
}

fn read_file(path: &Path) -> Result<String, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(feature = "remote")]
fn fetch_url(url: &str, timeout: Duration) -> Result<String, LoadError> {
    let network_error = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(network_error)?;

    let response = client.get(url).send().map_err(network_error)?;

    // Check for HTTP errors before reading the body
    let response = response.error_for_status().map_err(network_error)?;

    response.text().map_err(network_error)
}

/// Parsed documents of one resolution run, keyed by location.
///
/// Each location is fetched and parsed at most once, however many
/// references point into it.
#[derive(Debug, Default)]
pub struct FetchCache {
    documents: HashMap<Location, Value>,
    fetches: usize,
}

impl FetchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the document at `location`, loading it on first use.
    pub fn get_or_load<L: Loader + ?Sized>(
        &mut self,
        location: &Location,
        loader: &L,
    ) -> Result<&Value, LoadError> {
        if !self.documents.contains_key(location) {
            tracing::debug!(%location, "fetching document");
            let content = loader.load(location)?;
            let document = parse_document(&content, &location.to_string())?;
            self.fetches += 1;
            self.documents.insert(location.clone(), document);
        } else {
            tracing::trace!(%location, "document cache hit");
        }
        Ok(&self.documents[location])
    }

    /// Number of documents actually fetched.
    pub fn fetches(&self) -> usize {
        self.fetches
    }
}

/// Parse YAML or JSON text into a document tree.
///
/// Merge keys (`<<`) are applied, non-string mapping keys are stringified
/// and tags are dropped.
///
/// # Errors
///
/// Returns `LoadError::InvalidYaml` if the text isn't valid YAML.
pub fn parse_document(content: &str, origin: &str) -> Result<Value, LoadError> {
    let invalid = |source| LoadError::InvalidYaml {
        origin: origin.to_string(),
        source,
    };
    let mut yaml: serde_yaml::Value = serde_yaml::from_str(content).map_err(invalid)?;
    yaml.apply_merge().map_err(invalid)?;
    Ok(yaml_to_tree(yaml))
}

fn yaml_to_tree(yaml: serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => number_to_tree(&n),
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(seq) => {
            Value::Array(seq.into_iter().map(yaml_to_tree).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                map.insert(key_to_string(key), yaml_to_tree(value));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_tree(tagged.value),
    }
}

fn number_to_tree(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number(i.into())
    } else if let Some(u) = n.as_u64() {
        Value::Number(u.into())
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            // .nan and .inf have no JSON counterpart
            .unwrap_or_else(|| Value::String(n.to_string()))
    }
}

fn key_to_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Tagged(tagged) => key_to_string(tagged.value),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Load a document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidYaml` if the file isn't valid YAML.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    let content = read_file(path)?;
    parse_document(&content, &path.display().to_string())
}

/// Load a document from a YAML or JSON string.
///
/// # Errors
///
/// Returns `LoadError::InvalidYaml` if the string isn't valid YAML.
pub fn load_document_str(content: &str) -> Result<Value, LoadError> {
    parse_document(content, "<string>")
}

/// Load a document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails,
/// or `LoadError::InvalidYaml` if the response isn't valid YAML.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<Value, LoadError> {
    let content = fetch_url(url, DEFAULT_HTTP_TIMEOUT)?;
    parse_document(&content, url)
}

/// Load a document from a file path or URL.
///
/// Automatically detects whether the source is a URL or file path.
/// URL loading requires the `remote` feature.
pub fn load_document_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::RemoteDisabled {
                url: source.to_string(),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}

/// Split a pointer fragment (e.g. `#/components/headers/Foo` or `/Foo`)
/// into unescaped keys, ignoring empty segments.
pub fn fragment_keys(fragment: &str) -> Vec<String> {
    fragment
        .trim_start_matches('#')
        .split('/')
        .filter(|part| !part.is_empty())
        // Unescape JSON Pointer encoding (~1 = /, ~0 = ~)
        .map(|part| part.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Navigate a pointer fragment inside a document.
///
/// Mappings are indexed by key, sequences by decimal index. Returns `None`
/// as soon as one step is missing.
pub fn navigate_fragment<'a>(document: &'a Value, fragment: &str) -> Option<&'a Value> {
    let mut current = document;
    for key in fragment_keys(fragment) {
        current = match current {
            Value::Object(map) => map.get(&key)?,
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
