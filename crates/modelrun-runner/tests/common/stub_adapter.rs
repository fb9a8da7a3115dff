//! Counting stub adapter.
//!
//! [`StubAdapter`] loads a comma-separated list of floats and answers every
//! batch by repeating that list row by row. It counts loads and conversions
//! so tests can check the single-flight and pass-through contracts.
//!
//! | Artifact content | Behaviour            |
//! |------------------|----------------------|
//! | `0.1,0.9,0.3`    | loads, returns those |
//! | `corrupt`        | load fails           |
//!
//! An empty row in a batch makes `predict` fail.

use modelrun_kernel::Options;
use modelrun_runner::{AdapterError, BatchAdapter, Input, PredictMode, Predictions, Sizing};
use modelrun_store::ModelContext;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const STUB_MODULE: &str = "modelrun.stub";
pub const STUB_ARTIFACT: &str = "stub.txt";

/// Native batch of the stub family
#[derive(Debug, Clone, PartialEq)]
pub struct StubBatch(pub Vec<Vec<f32>>);

#[derive(Debug)]
pub struct StubModel {
    pub outputs: Vec<f32>,
    pub config: Options,
}

#[derive(Debug, Clone, Default)]
pub struct StubAdapter {
    loads: Arc<AtomicUsize>,
    conversions: Arc<AtomicUsize>,
    load_delay: Duration,
}

impl StubAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep inside `load` to widen the first-call race window
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn conversion_count(&self) -> usize {
        self.conversions.load(Ordering::SeqCst)
    }
}

impl BatchAdapter for StubAdapter {
    type Handle = StubModel;
    type Batch = StubBatch;

    fn module(&self) -> &str {
        STUB_MODULE
    }

    fn artifact_file(&self) -> &str {
        STUB_ARTIFACT
    }

    fn context(&self) -> ModelContext {
        ModelContext::new("stub", "1.0")
    }

    fn apply_defaults(&self, options: &mut Options) {
        options.set_default("nthread", -1i64);
    }

    fn thread_override(&self, options: &Options) -> Option<usize> {
        options
            .get_i64("nthread")
            .filter(|&n| n > 0)
            .map(|n| n as usize)
    }

    fn execution_parameters(&self, sizing: &Sizing) -> Options {
        let device = if sizing.on_gpu { "gpu" } else { "cpu" };
        Options::new()
            .with("device", device)
            .with("nthread", sizing.threads)
    }

    fn load(&self, path: &Path, config: &Options) -> Result<StubModel, AdapterError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.load_delay);

        let text = std::fs::read_to_string(path)?;
        let outputs = text
            .trim()
            .split(',')
            .map(|v| v.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AdapterError::Load(format!("bad stub artifact: {e}")))?;
        Ok(StubModel {
            outputs,
            config: config.clone(),
        })
    }

    fn save(&self, handle: &StubModel, path: &Path) -> Result<(), AdapterError> {
        let text = handle
            .outputs
            .iter()
            .map(f32::to_string)
            .collect::<Vec<_>>()
            .join(",");
        std::fs::write(path, text)?;
        Ok(())
    }

    fn to_native(
        &self,
        _handle: &StubModel,
        input: Input<StubBatch>,
    ) -> Result<StubBatch, AdapterError> {
        match input {
            Input::Native(batch) => Ok(batch),
            Input::Matrix(rows) => {
                self.conversions.fetch_add(1, Ordering::SeqCst);
                Ok(StubBatch(rows))
            }
            Input::Table(_) => Err(AdapterError::InvalidInput(
                "stub adapter does not take tables".into(),
            )),
        }
    }

    fn predict(
        &self,
        handle: &StubModel,
        _mode: PredictMode,
        batch: &StubBatch,
    ) -> Result<Predictions, AdapterError> {
        if batch.0.iter().any(Vec::is_empty) {
            return Err(AdapterError::Predict("empty feature row".into()));
        }
        let values = (0..batch.0.len())
            .map(|i| handle.outputs[i % handle.outputs.len()])
            .collect();
        Ok(Predictions::from_vec(values))
    }
}
