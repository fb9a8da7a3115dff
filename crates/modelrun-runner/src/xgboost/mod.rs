//! Tree-ensemble adapter family
//!
//! Loads models in the XGBoost JSON format (`saved_model.json`) and evaluates
//! them with a pure-Rust tree walker. GPU execution parameters are recorded
//! in the effective configuration for native engines downstream; evaluation
//! itself always runs on the host.

mod dmatrix;
mod model;

pub use dmatrix::DMatrix;
pub use model::{Booster, Objective};

use crate::adapter::{AdapterError, BatchAdapter, Input, PredictMode, Predictions, Table};
use crate::sizing::Sizing;
use modelrun_kernel::Options;
use modelrun_store::ModelContext;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::Path;
use tracing::{debug, warn};

/// Module name recorded with every model saved by this family
pub const MODULE: &str = "modelrun.xgboost";

/// Artifact file name inside a version directory
pub const ARTIFACT_FILE: &str = "saved_model.json";

/// Thread-count option key; `-1` means "use all available"
pub const NTHREAD: &str = "nthread";

const FRAMEWORK: &str = "xgboost";
const FORMAT_VERSION: &str = "1.7";

/// Adapter for XGBoost JSON tree ensembles
#[derive(Debug, Clone, Copy, Default)]
pub struct XgboostAdapter;

impl XgboostAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// A loaded booster plus the pool used for in-place prediction
pub struct XgboostModel {
    booster: Booster,
    pool: ThreadPool,
}

impl std::fmt::Debug for XgboostModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XgboostModel")
            .field("trees", &self.booster.num_trees())
            .field("objective", &self.booster.objective())
            .field("threads", &self.pool.current_num_threads())
            .finish()
    }
}

impl XgboostModel {
    /// Wrap a booster with a pool of `nthread` workers (`<= 0`: all cores)
    pub fn new(booster: Booster, nthread: i64) -> Result<Self, AdapterError> {
        let threads = usize::try_from(nthread).unwrap_or(0);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("modelrun-xgb-{i}"))
            .build()
            .map_err(|e| AdapterError::Load(format!("failed to start prediction pool: {e}")))?;
        Ok(Self { booster, pool })
    }

    pub fn booster(&self) -> &Booster {
        &self.booster
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl BatchAdapter for XgboostAdapter {
    type Handle = XgboostModel;
    type Batch = DMatrix;

    fn module(&self) -> &str {
        MODULE
    }

    fn artifact_file(&self) -> &str {
        ARTIFACT_FILE
    }

    fn context(&self) -> ModelContext {
        ModelContext::new(FRAMEWORK, FORMAT_VERSION)
    }

    fn check_available(&self) -> Result<(), AdapterError> {
        // The evaluator is compiled in; only the worker pool can fail.
        ThreadPoolBuilder::new()
            .num_threads(1)
            .build()
            .map(|_| ())
            .map_err(|e| AdapterError::Unavailable(e.to_string()))
    }

    fn apply_defaults(&self, options: &mut Options) {
        options.set_default(NTHREAD, -1i64);
    }

    fn thread_override(&self, options: &Options) -> Option<usize> {
        options
            .get_i64(NTHREAD)
            .filter(|&n| n > 0)
            .map(|n| n as usize)
    }

    fn execution_parameters(&self, sizing: &Sizing) -> Options {
        if sizing.on_gpu {
            Options::new()
                .with("predictor", "gpu_predictor")
                .with("tree_method", "gpu_hist")
                .with("gpu_id", i64::from(sizing.device.unwrap_or(0)))
                .with(NTHREAD, 1i64)
        } else {
            Options::new()
                .with("predictor", "cpu_predictor")
                .with(NTHREAD, sizing.threads)
        }
    }

    fn load(&self, path: &Path, config: &Options) -> Result<XgboostModel, AdapterError> {
        let booster = Booster::load(path)?;
        if config.get("predictor").and_then(|v| v.as_str()) == Some("gpu_predictor") {
            warn!(
                gpu_id = config.get_i64("gpu_id").unwrap_or(0),
                "gpu_predictor requested; evaluating on the host"
            );
        }
        let nthread = config.get_i64(NTHREAD).unwrap_or(-1);
        debug!(
            path = %path.display(),
            trees = booster.num_trees(),
            objective = ?booster.objective(),
            nthread,
            "booster parsed"
        );
        XgboostModel::new(booster, nthread)
    }

    fn save(&self, handle: &XgboostModel, path: &Path) -> Result<(), AdapterError> {
        handle.booster.save(path)
    }

    fn to_native(
        &self,
        handle: &XgboostModel,
        input: Input<DMatrix>,
    ) -> Result<DMatrix, AdapterError> {
        match input {
            Input::Native(dm) => Ok(dm),
            Input::Matrix(rows) => DMatrix::from_rows(&rows),
            Input::Table(table) => table_to_dmatrix(&handle.booster, table),
        }
    }

    fn predict(
        &self,
        handle: &XgboostModel,
        mode: PredictMode,
        batch: &DMatrix,
    ) -> Result<Predictions, AdapterError> {
        match mode {
            PredictMode::Standard => handle.booster.predict(batch),
            PredictMode::InPlace => handle.booster.predict_parallel(batch, &handle.pool),
        }
    }
}

/// Order table columns as the booster's features. Models saved without
/// feature names take the columns as given.
fn table_to_dmatrix(booster: &Booster, table: Table) -> Result<DMatrix, AdapterError> {
    for (i, (name, _)) in table.columns.iter().enumerate() {
        if table.columns[..i].iter().any(|(seen, _)| seen == name) {
            return Err(AdapterError::InvalidInput(format!(
                "column {name:?} appears more than once"
            )));
        }
    }

    let expected = booster.feature_names();
    if expected.is_empty() {
        return DMatrix::from_table(&table);
    }

    let mut columns = table.columns;
    if let Some((extra, _)) = columns.iter().find(|(name, _)| !expected.contains(name)) {
        return Err(AdapterError::InvalidInput(format!(
            "column {extra:?} is not a model feature"
        )));
    }

    let mut ordered = Vec::with_capacity(expected.len());
    for name in expected {
        let index = columns
            .iter()
            .position(|(column, _)| column == name)
            .ok_or_else(|| {
                AdapterError::InvalidInput(format!("missing feature column {name:?}"))
            })?;
        ordered.push(columns.swap_remove(index));
    }
    DMatrix::from_table(&Table::new(ordered))
}

#[cfg(test)]
mod tests {
    use super::model::fixtures::binary_model;
    use super::*;
    use tempfile::TempDir;

    fn loaded() -> (TempDir, XgboostModel) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ARTIFACT_FILE);
        std::fs::write(&path, serde_json::to_vec(&binary_model()).unwrap()).unwrap();
        let model = XgboostAdapter.load(&path, &Options::new().with(NTHREAD, 2i64)).unwrap();
        (dir, model)
    }

    #[test]
    fn test_execution_parameters() {
        let cpu = Sizing {
            replicas: 1,
            concurrency_per_replica: 4,
            threads: 4,
            on_gpu: false,
            device: None,
        };
        let params = XgboostAdapter.execution_parameters(&cpu);
        assert_eq!(params.get("predictor").and_then(|v| v.as_str()), Some("cpu_predictor"));
        assert_eq!(params.get_i64(NTHREAD), Some(4));
        assert!(!params.contains_key("gpu_id"));

        let gpu = Sizing {
            replicas: 2,
            concurrency_per_replica: 1,
            threads: 1,
            on_gpu: true,
            device: Some(0),
        };
        let params = XgboostAdapter.execution_parameters(&gpu);
        assert_eq!(params.get("tree_method").and_then(|v| v.as_str()), Some("gpu_hist"));
        assert_eq!(params.get_i64("gpu_id"), Some(0));
        assert_eq!(params.get_i64(NTHREAD), Some(1));
    }

    #[test]
    fn test_nthread_sentinel_is_not_an_override() {
        let mut options = Options::new();
        XgboostAdapter.apply_defaults(&mut options);
        assert_eq!(options.get_i64(NTHREAD), Some(-1));
        assert_eq!(XgboostAdapter.thread_override(&options), None);

        let options = Options::new().with(NTHREAD, 3i64);
        assert_eq!(XgboostAdapter.thread_override(&options), Some(3));
    }

    #[test]
    fn test_pool_sized_from_nthread() {
        let (_dir, model) = loaded();
        assert_eq!(model.threads(), 2);
    }

    #[test]
    fn test_table_columns_reordered() {
        let (_dir, model) = loaded();
        let table = Table::default()
            .with_column("income", vec![1.0, 3.0])
            .with_column("age", vec![0.0, 1.0]);
        let dm = XgboostAdapter.to_native(&model, Input::Table(table)).unwrap();
        assert_eq!(dm.row(0), &[0.0, 1.0]);
        assert_eq!(dm.row(1), &[1.0, 3.0]);

        let by_rows = XgboostAdapter
            .to_native(&model, Input::Matrix(vec![vec![0.0, 1.0], vec![1.0, 3.0]]))
            .unwrap();
        assert_eq!(
            XgboostAdapter.predict(&model, PredictMode::Standard, &dm).unwrap(),
            XgboostAdapter.predict(&model, PredictMode::Standard, &by_rows).unwrap()
        );
    }

    #[test]
    fn test_table_missing_or_extra_column() {
        let (_dir, model) = loaded();
        let missing = Table::default().with_column("age", vec![1.0]);
        assert!(matches!(
            XgboostAdapter.to_native(&model, Input::Table(missing)),
            Err(AdapterError::InvalidInput(_))
        ));

        let extra = Table::default()
            .with_column("age", vec![1.0])
            .with_column("income", vec![1.0])
            .with_column("zip", vec![1.0]);
        assert!(XgboostAdapter.to_native(&model, Input::Table(extra)).is_err());
    }

    #[test]
    fn test_table_duplicate_column_rejected() {
        let (_dir, model) = loaded();
        let repeated = Table::default()
            .with_column("age", vec![1.0])
            .with_column("income", vec![2.0])
            .with_column("age", vec![0.0]);
        let err = XgboostAdapter
            .to_native(&model, Input::Table(repeated))
            .unwrap_err();
        assert!(matches!(err, AdapterError::InvalidInput(_)), "{err}");
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_modes_agree() {
        let (_dir, model) = loaded();
        let dm = DMatrix::from_rows(&[vec![0.0, 1.0], vec![1.0, 3.0], vec![f32::NAN, 3.0]]).unwrap();
        let standard = XgboostAdapter.predict(&model, PredictMode::Standard, &dm).unwrap();
        let in_place = XgboostAdapter.predict(&model, PredictMode::InPlace, &dm).unwrap();
        assert_eq!(standard, in_place);
    }

    #[test]
    fn test_save_emits_loadable_model() {
        let (dir, model) = loaded();
        let copy = dir.path().join("copy.json");
        XgboostAdapter.save(&model, &copy).unwrap();
        let reloaded = XgboostAdapter.load(&copy, &Options::new()).unwrap();
        assert_eq!(reloaded.booster().num_trees(), 2);
        assert_eq!(reloaded.booster().feature_names(), &["age", "income"]);
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(ARTIFACT_FILE);
        std::fs::write(&path, b"\x00\x01 definitely not json").unwrap();
        assert!(XgboostAdapter.load(&path, &Options::new()).is_err());
        assert!(matches!(
            XgboostAdapter.load(&dir.path().join("absent.json"), &Options::new()),
            Err(AdapterError::Io(_))
        ));
    }
}
