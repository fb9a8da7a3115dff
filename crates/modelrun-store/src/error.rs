//! Store error type

use modelrun_kernel::RunnerError;
use std::path::PathBuf;

/// Errors that can occur during [`ModelStore`](crate::ModelStore) operations
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No stored version matches the tag
    #[error("model not found: {0}")]
    NotFound(String),

    /// A version with the same tag is already stored
    #[error("model already exists: {0}")]
    AlreadyExists(String),

    /// An I/O operation on a specific path failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A `model.yaml` record could not be read or written
    #[error("invalid model record {}: {source}", path.display())]
    Record {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// The artifact writer callback failed
    #[error("failed to write artifact for {tag}: {source}")]
    Artifact {
        tag: String,
        source: std::io::Error,
    },

    /// A version that does not name a directory directly under its model
    #[error("invalid version {version:?} for model {name}")]
    InvalidVersion { name: String, version: String },

    #[error("invalid tag: {0}")]
    Tag(#[from] RunnerError),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<StoreError> for RunnerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(tag) => RunnerError::NotFound(tag),
            StoreError::Tag(inner) => inner,
            other => RunnerError::Store(other.to_string()),
        }
    }
}
