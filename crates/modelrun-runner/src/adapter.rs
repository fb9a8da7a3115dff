//! Batch execution adapters
//!
//! A [`BatchAdapter`] is the model-family-specific half of a runner: it
//! loads an artifact into a native handle, converts incoming batches into
//! the family's native batch type and runs prediction. The runner supplies
//! everything else (resolution, sizing, single-flight loading, logging).

use crate::sizing::Sizing;
use modelrun_kernel::{Options, RunnerError, RunnerResult};
use modelrun_store::ModelContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Errors reported by adapters.
///
/// The runner wraps these with the model tag: load-time errors become
/// `RunnerError::LoadFailure`, batch-time errors `RunnerError::InferenceFailure`.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AdapterError {
    /// The artifact could not be turned into a model handle
    #[error("{0}")]
    Load(String),

    /// The batch does not fit the model (shape, feature names, ragged rows)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The prediction call itself failed
    #[error("{0}")]
    Predict(String),

    /// The family's native capability is missing in this build/host
    #[error("adapter unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed model file: {0}")]
    Format(#[from] serde_json::Error),
}

/// Which prediction entry point a runner binds at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictMode {
    /// The regular predict path over a native batch
    #[default]
    Standard,
    /// Thread-safe in-place prediction, parallel over rows
    InPlace,
}

impl fmt::Display for PredictMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictMode::Standard => write!(f, "standard"),
            PredictMode::InPlace => write!(f, "in_place"),
        }
    }
}

impl FromStr for PredictMode {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" | "predict" => Ok(Self::Standard),
            "in_place" | "inplace" | "inplace_predict" => Ok(Self::InPlace),
            other => Err(RunnerError::Config(format!(
                "unknown predict mode {other:?}, expected standard or inplace"
            ))),
        }
    }
}

/// Named feature columns, one `Vec` per column
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<(String, Vec<f32>)>,
}

impl Table {
    pub fn new(columns: Vec<(String, Vec<f32>)>) -> Self {
        Self { columns }
    }

    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f32>) -> Self {
        self.columns.push((name.into(), values));
        self
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Row count, or an error when columns disagree on length.
    pub fn num_rows(&self) -> Result<usize, AdapterError> {
        let mut lens = self.columns.iter().map(|(_, v)| v.len());
        let first = lens.next().unwrap_or(0);
        if lens.any(|len| len != first) {
            return Err(AdapterError::InvalidInput(
                "table columns have different lengths".into(),
            ));
        }
        Ok(first)
    }
}

/// A batch of feature rows in one of the accepted representations
#[derive(Debug, Clone)]
pub enum Input<B> {
    /// Raw numeric rows
    Matrix(Vec<Vec<f32>>),
    /// Named columns
    Table(Table),
    /// Already in the family's native batch form; passed through as-is
    Native(B),
}

impl<B> Input<B> {
    pub fn native(batch: B) -> Self {
        Self::Native(batch)
    }
}

impl<B> From<Vec<Vec<f32>>> for Input<B> {
    fn from(rows: Vec<Vec<f32>>) -> Self {
        Self::Matrix(rows)
    }
}

impl<B> From<Table> for Input<B> {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

/// Dense prediction output, row-major
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    rows: usize,
    cols: usize,
    values: Vec<f32>,
}

impl Predictions {
    /// One value per row
    pub fn from_vec(values: Vec<f32>) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            values,
        }
    }

    pub fn with_shape(rows: usize, cols: usize, values: Vec<f32>) -> Result<Self, AdapterError> {
        if rows * cols != values.len() {
            return Err(AdapterError::Predict(format!(
                "prediction shape {rows}x{cols} does not match {} values",
                values.len()
            )));
        }
        Ok(Self { rows, cols, values })
    }

    /// Stack chunks computed separately back into one result
    pub fn concat(parts: Vec<Predictions>) -> Result<Self, AdapterError> {
        let cols = parts.first().map_or(1, |p| p.cols);
        if parts.iter().any(|p| p.cols != cols) {
            return Err(AdapterError::Predict(
                "cannot concatenate predictions with different widths".into(),
            ));
        }
        let rows = parts.iter().map(|p| p.rows).sum();
        let values = parts.into_iter().flat_map(|p| p.values).collect();
        Ok(Self { rows, cols, values })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        (index < self.rows).then(|| &self.values[index * self.cols..(index + 1) * self.cols])
    }
}

/// Model-family-specific loading and prediction.
///
/// Implementations must be stateless with respect to batches: nothing from
/// one `predict` call may influence the next.
pub trait BatchAdapter: Send + Sync + 'static {
    /// Loaded model; shared read-only by every batch call once created
    type Handle: Send + Sync + 'static;
    /// Native batch representation of the family
    type Batch: Send + 'static;

    /// Module name recorded with every model this family saves
    fn module(&self) -> &str;

    /// Whether a stored model written by `module` can be loaded here
    fn accepts_module(&self, module: &str) -> bool {
        module == self.module()
    }

    /// Artifact file name inside a stored version directory
    fn artifact_file(&self) -> &str;

    /// Framework information captured at save time
    fn context(&self) -> ModelContext;

    /// Probe the family's native capability; called once on registration
    fn check_available(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Fill in family defaults missing from the merged options
    fn apply_defaults(&self, _options: &mut Options) {}

    /// Explicit per-replica thread count requested by the options, if any
    fn thread_override(&self, _options: &Options) -> Option<usize> {
        None
    }

    /// Execution parameters for a computed sizing (layer 3 of the merge)
    fn execution_parameters(&self, sizing: &Sizing) -> Options;

    /// Deserialize the artifact at `path` with the effective configuration
    fn load(&self, path: &Path, config: &Options) -> Result<Self::Handle, AdapterError>;

    /// Write a handle back out as an artifact
    fn save(&self, handle: &Self::Handle, path: &Path) -> Result<(), AdapterError>;

    /// Convert a batch into native form; `Input::Native` must pass through
    fn to_native(
        &self,
        handle: &Self::Handle,
        input: Input<Self::Batch>,
    ) -> Result<Self::Batch, AdapterError>;

    /// Run the bound prediction function over a native batch
    fn predict(
        &self,
        handle: &Self::Handle,
        mode: PredictMode,
        batch: &Self::Batch,
    ) -> Result<Predictions, AdapterError>;
}

/// Adapter families known to the process, each probed once on registration
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    entries: Vec<RegisteredAdapter>,
}

/// Description of a registered adapter family
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredAdapter {
    pub module: String,
    pub artifact_file: String,
    pub context: ModelContext,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a family after checking its native capability.
    ///
    /// # Errors
    /// - `RunnerError::Config` when the family is unavailable or already registered
    pub fn register<A: BatchAdapter>(&mut self, adapter: &A) -> RunnerResult<()> {
        if self.get(adapter.module()).is_some() {
            return Err(RunnerError::Config(format!(
                "adapter {} is already registered",
                adapter.module()
            )));
        }
        adapter.check_available().map_err(|e| {
            RunnerError::Config(format!("adapter {} cannot be used: {e}", adapter.module()))
        })?;

        tracing::debug!(module = adapter.module(), "adapter registered");
        self.entries.push(RegisteredAdapter {
            module: adapter.module().to_string(),
            artifact_file: adapter.artifact_file().to_string(),
            context: adapter.context(),
        });
        Ok(())
    }

    pub fn get(&self, module: &str) -> Option<&RegisteredAdapter> {
        self.entries.iter().find(|e| e.module == module)
    }

    pub fn modules(&self) -> impl Iterator<Item = &RegisteredAdapter> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predict_mode_parse() {
        assert_eq!("predict".parse::<PredictMode>().unwrap(), PredictMode::Standard);
        assert_eq!(
            "inplace_predict".parse::<PredictMode>().unwrap(),
            PredictMode::InPlace
        );
        assert_eq!("InPlace".parse::<PredictMode>().unwrap(), PredictMode::InPlace);
        assert!("fast".parse::<PredictMode>().is_err());
    }

    #[test]
    fn test_table_rejects_ragged_columns() {
        let table = Table::default()
            .with_column("a", vec![1.0, 2.0])
            .with_column("b", vec![1.0]);
        assert!(table.num_rows().is_err());
        assert_eq!(Table::default().num_rows().unwrap(), 0);
    }

    #[test]
    fn test_predictions_rows() {
        let p = Predictions::with_shape(2, 3, vec![0.1, 0.2, 0.7, 0.3, 0.3, 0.4]).unwrap();
        assert_eq!(p.row(1), Some(&[0.3, 0.3, 0.4][..]));
        assert_eq!(p.row(2), None);
        assert!(Predictions::with_shape(2, 2, vec![0.0]).is_err());
    }

    #[test]
    fn test_predictions_concat() {
        let merged = Predictions::concat(vec![
            Predictions::from_vec(vec![0.1, 0.9]),
            Predictions::from_vec(vec![0.3]),
        ])
        .unwrap();
        assert_eq!(merged.rows(), 3);
        assert_eq!(merged.as_slice(), &[0.1, 0.9, 0.3]);

        let wide = Predictions::with_shape(1, 2, vec![0.5, 0.5]).unwrap();
        assert!(Predictions::concat(vec![Predictions::from_vec(vec![0.1]), wide]).is_err());
    }
}
