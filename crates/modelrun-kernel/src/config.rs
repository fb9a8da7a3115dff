//! Configuration loading
//!
//! Supports YAML, TOML and JSON files with `${VAR}` / `$VAR` environment
//! substitution, layered as: built-in defaults, then the optional file, then
//! `MODELRUN_*` environment variables.

use crate::resources::ResourceQuota;
use config::{Config as Cfg, Environment, File, FileFormat};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "MODELRUN";

static BRACED_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid braced env regex")
});

static BARE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("valid bare env regex")
});

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Process-wide settings consumed by the composition root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory of the local model store
    pub store_root: PathBuf,
    /// Resource quota for runners; `None` means the whole machine
    #[serde(default)]
    pub resources: Option<ResourceQuota>,
    /// Prediction mode used when a command does not pick one
    #[serde(default = "default_predict_mode")]
    pub default_predict_mode: String,
}

fn default_predict_mode() -> String {
    "standard".to_string()
}

impl AppConfig {
    /// Load the layered configuration.
    ///
    /// `default_store_root` is used when neither the file nor the
    /// environment names a store root.
    pub fn load(path: Option<&Path>, default_store_root: &Path) -> ConfigResult<Self> {
        let mut builder = Cfg::builder()
            .set_default("store_root", default_store_root.to_string_lossy().to_string())
            .and_then(|b| b.set_default("default_predict_mode", default_predict_mode()))
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        if let Some(path) = path {
            let display = path.to_string_lossy();
            let format = detect_format(&display)?;
            let content = std::fs::read_to_string(path)?;
            builder = builder.add_source(File::from_str(&substitute_env_vars(&content), format));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        let app: AppConfig = config
            .try_deserialize()
            .map_err(|e| ConfigError::Serialization(e.to_string()))?;

        if let Some(quota) = &app.resources {
            quota
                .validate()
                .map_err(|e| ConfigError::Parse(e.to_string()))?;
        }
        Ok(app)
    }
}

/// Detect configuration format from file extension
///
/// - YAML: `.yaml`, `.yml`
/// - TOML: `.toml`
/// - JSON: `.json`
pub fn detect_format(path: &str) -> ConfigResult<FileFormat> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Substitute `${VAR}` and `$VAR` references; unknown variables are left as-is.
pub fn substitute_env_vars(content: &str) -> String {
    let braced = BRACED_VAR.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });
    BARE_VAR
        .replace_all(&braced, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
