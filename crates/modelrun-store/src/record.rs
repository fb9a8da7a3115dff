//! Stored model records

use chrono::{DateTime, Utc};
use modelrun_kernel::{Options, Tag};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the record inside a version directory
pub const RECORD_FILE: &str = "model.yaml";

/// Framework information captured at save time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelContext {
    pub framework_name: String,
    pub framework_version: String,
    #[serde(default = "current_version")]
    pub modelrun_version: String,
}

fn current_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl ModelContext {
    pub fn new(framework_name: impl Into<String>, framework_version: impl Into<String>) -> Self {
        Self {
            framework_name: framework_name.into(),
            framework_version: framework_version.into(),
            modelrun_version: current_version(),
        }
    }
}

/// The persisted description of one model version (`model.yaml`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub tag: Tag,
    /// Adapter family that wrote the artifact, e.g. `modelrun.xgboost`
    pub module: String,
    #[serde(default)]
    pub options: Options,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    pub context: ModelContext,
    pub creation_time: DateTime<Utc>,
}

/// Everything needed to persist a new version, minus the artifact bytes
#[derive(Debug, Clone)]
pub struct NewModel {
    /// Target tag; a `latest` tag gets a generated version
    pub tag: Tag,
    pub module: String,
    pub options: Options,
    pub metadata: BTreeMap<String, Value>,
    pub context: ModelContext,
}

impl NewModel {
    pub fn new(tag: Tag, module: impl Into<String>, context: ModelContext) -> Self {
        Self {
            tag,
            module: module.into(),
            options: Options::new(),
            metadata: BTreeMap::new(),
            context,
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A resolved model reference: the record plus where its files live.
///
/// Immutable once returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredModel {
    record: ModelRecord,
    dir: PathBuf,
}

impl StoredModel {
    pub fn new(record: ModelRecord, dir: impl Into<PathBuf>) -> Self {
        Self {
            record,
            dir: dir.into(),
        }
    }

    /// Concrete tag (never `latest`)
    pub fn tag(&self) -> &Tag {
        &self.record.tag
    }

    pub fn module(&self) -> &str {
        &self.record.module
    }

    pub fn options(&self) -> &Options {
        &self.record.options
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.record.metadata
    }

    pub fn record(&self) -> &ModelRecord {
        &self.record
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a file inside this version's directory
    pub fn path_of(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}
