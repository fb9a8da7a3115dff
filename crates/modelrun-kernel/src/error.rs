//! Error taxonomy shared by the store, the runner and the adapters.
//!
//! Every variant carries the offending tag or operation in its message.
//! `RunnerError` is `Clone` so a runner can cache a load failure and hand the
//! same error back on every later call.

use thiserror::Error;

/// Errors surfaced by model resolution, loading and batch execution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// The identifier does not resolve in the model store
    #[error("Model not found: {0}")]
    NotFound(String),

    /// The stored artifact belongs to a different adapter family
    #[error("Model {tag} was saved with module {stored}, failed loading with {requested}")]
    ModuleMismatch {
        tag: String,
        stored: String,
        requested: String,
    },

    /// The artifact exists but could not be deserialized
    #[error("Model load failed for {tag}: {message}")]
    LoadFailure { tag: String, message: String },

    /// The native prediction call failed for one batch
    #[error("Inference failed for {tag}: {message}")]
    InferenceFailure { tag: String, message: String },

    /// The identifier is not a valid `name[:version]` tag
    #[error("Invalid tag {input:?}: {reason}")]
    InvalidTag { input: String, reason: String },

    /// Configuration error (bad quota, unavailable adapter, bad config file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The model store failed for a reason other than a missing entry
    #[error("Store error: {0}")]
    Store(String),
}

/// Result type for runner operations
pub type RunnerResult<T> = Result<T, RunnerError>;

impl RunnerError {
    pub fn load_failure(tag: impl ToString, message: impl ToString) -> Self {
        Self::LoadFailure {
            tag: tag.to_string(),
            message: message.to_string(),
        }
    }

    pub fn inference_failure(tag: impl ToString, message: impl ToString) -> Self {
        Self::InferenceFailure {
            tag: tag.to_string(),
            message: message.to_string(),
        }
    }

    /// True when the error is scoped to a single batch call and the runner
    /// stays usable afterwards.
    pub fn is_per_call(&self) -> bool {
        matches!(self, Self::InferenceFailure { .. })
    }
}

impl From<crate::config::ConfigError> for RunnerError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
