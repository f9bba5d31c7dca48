//! Error types for OpenAPI document loading and reference resolution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading or parsing a document.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("cannot fetch {url}: remote loading is disabled")]
    RemoteDisabled { url: String },

    // Parse errors (exit code 2)
    #[error("invalid YAML in {origin}: {source}")]
    InvalidYaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. }
            | LoadError::ReadError { .. }
            | LoadError::RemoteDisabled { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            LoadError::InvalidYaml { .. } => 2,
        }
    }
}

/// Errors during reference resolution and serialization.
///
/// `path` fields hold the location of the failing `$ref` node inside the
/// document being resolved, e.g. `/components/responses/400BadRequest`.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("unsupported reference scheme \"{reference}\" at {path}")]
    UnsupportedScheme { reference: String, path: String },

    #[error("\"{reference}\" at {path}: fragment {fragment} not found")]
    LookupFailure {
        reference: String,
        fragment: String,
        path: String,
    },

    #[error("\"{reference}\" at {path}: {source}")]
    FetchFailure {
        reference: String,
        path: String,
        #[source]
        source: LoadError,
    },

    #[error("circular reference \"{reference}\" at {path}")]
    CycleDetected { reference: String, path: String },

    #[error("\"{reference}\" at {path}: references nested deeper than {limit}")]
    DepthExceeded {
        reference: String,
        path: String,
        limit: usize,
    },

    #[error("failed to serialize document: {message}")]
    Serialize { message: String },
}

impl ResolveError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ResolveError::Load(e) => e.exit_code(),
            ResolveError::FetchFailure { source, .. } => source.exit_code(),
            _ => 2,
        }
    }

    /// The reference value that triggered the failure, if any.
    pub fn reference(&self) -> Option<&str> {
        match self {
            ResolveError::UnsupportedScheme { reference, .. }
            | ResolveError::LookupFailure { reference, .. }
            | ResolveError::FetchFailure { reference, .. }
            | ResolveError::CycleDetected { reference, .. }
            | ResolveError::DepthExceeded { reference, .. } => Some(reference),
            ResolveError::Load(_) | ResolveError::Serialize { .. } => None,
        }
    }
}

impl From<serde_yaml::Error> for ResolveError {
    fn from(e: serde_yaml::Error) -> Self {
        ResolveError::Serialize {
            message: e.to_string(),
        }
    }
}
