//! The runner: one resolved model, sized for a quota, loaded on first use.

use crate::adapter::{BatchAdapter, Input, PredictMode, Predictions};
use crate::resolve::resolve_model;
use crate::sizing::{self, DeviceAssignment, Sizing};
use modelrun_kernel::{OptionValue, Options, ResourceQuota, RunnerError, RunnerResult, Tag};
use modelrun_store::{ModelStore, StoredModel};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

/// Lifecycle state of a runner's loaded-model slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerState {
    Uninitialized,
    Ready,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerState::Uninitialized => write!(f, "uninitialized"),
            RunnerState::Ready => write!(f, "ready"),
        }
    }
}

/// Adaptive batching hints. Stored and reported; sizing does not read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    pub enabled: bool,
    pub max_batch_size: usize,
    pub max_latency_ms: u64,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_batch_size: 1000,
            max_latency_ms: 10_000,
        }
    }
}

/// Builder for [`Runner`]
#[derive(Debug, Clone)]
pub struct RunnerBuilder {
    tag: Tag,
    options: Options,
    name: Option<String>,
    quota: Option<ResourceQuota>,
    batch_options: BatchOptions,
    mode: PredictMode,
    assignment: DeviceAssignment,
    replica_index: usize,
}

impl RunnerBuilder {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            options: Options::new(),
            name: None,
            quota: None,
            batch_options: BatchOptions::default(),
            mode: PredictMode::default(),
            assignment: DeviceAssignment::default(),
            replica_index: 0,
        }
    }

    /// Caller overrides layered on top of the stored options
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key, value);
        self
    }

    /// Runner name; defaults to the model name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Quota to size for; defaults to [`ResourceQuota::detect`]
    pub fn resource_quota(mut self, quota: ResourceQuota) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn batch_options(mut self, batch_options: BatchOptions) -> Self {
        self.batch_options = batch_options;
        self
    }

    pub fn predict_mode(mut self, mode: PredictMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn device_assignment(mut self, assignment: DeviceAssignment) -> Self {
        self.assignment = assignment;
        self
    }

    /// Which replica this instance serves; only used for per-replica devices
    pub fn replica_index(mut self, index: usize) -> Self {
        self.replica_index = index;
        self
    }

    /// Resolve the tag against `store`, size the runner and freeze its
    /// effective configuration. The artifact is not opened yet.
    ///
    /// # Errors
    /// - `RunnerError::NotFound` if the tag does not resolve
    /// - `RunnerError::ModuleMismatch` if the model belongs to another family
    /// - `RunnerError::Config` for an invalid quota or replica index
    pub fn build<A: BatchAdapter>(
        self,
        store: &dyn ModelStore,
        adapter: A,
    ) -> RunnerResult<Runner<A>> {
        let quota = match self.quota {
            Some(quota) => {
                quota.validate()?;
                quota
            }
            None => ResourceQuota::detect(),
        };

        let resolved = resolve_model(store, &adapter, &self.tag, &self.options)?;
        let sizing = sizing::plan(
            &quota,
            adapter.thread_override(&resolved.options),
            self.assignment,
            self.replica_index,
        )?;

        let mut config = resolved.options;
        config.overlay(&adapter.execution_parameters(&sizing));

        let name = self
            .name
            .unwrap_or_else(|| resolved.model.tag().name().to_string());
        let artifact = resolved.model.path_of(adapter.artifact_file());

        info!(
            runner = %name,
            tag = %resolved.model.tag(),
            replicas = sizing.replicas,
            concurrency = sizing.concurrency_per_replica,
            on_gpu = sizing.on_gpu,
            mode = %self.mode,
            "runner created"
        );

        Ok(Runner {
            name,
            adapter,
            model: resolved.model,
            artifact,
            quota,
            mode: self.mode,
            sizing,
            config,
            batch_options: self.batch_options,
            slot: OnceCell::new(),
        })
    }
}

/// A serving unit wrapping one stored model.
///
/// `Runner` is `Sync`: share it behind an `Arc` and call [`run_batch`] from
/// as many threads as the sizing allows. The first call (or [`setup`]) loads
/// the model; concurrent first callers wait for that single load.
///
/// [`run_batch`]: Runner::run_batch
/// [`setup`]: Runner::setup
pub struct Runner<A: BatchAdapter> {
    name: String,
    adapter: A,
    model: StoredModel,
    artifact: PathBuf,
    quota: ResourceQuota,
    mode: PredictMode,
    sizing: Sizing,
    config: Options,
    batch_options: BatchOptions,
    slot: OnceCell<RunnerResult<A::Handle>>,
}

impl<A: BatchAdapter> fmt::Debug for Runner<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("name", &self.name)
            .field("tag", self.model.tag())
            .field("module", &self.adapter.module())
            .field("sizing", &self.sizing)
            .field("mode", &self.mode)
            .field("state", &self.state())
            .finish()
    }
}

impl<A: BatchAdapter> Runner<A> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved tag; never `latest`
    pub fn tag(&self) -> &Tag {
        self.model.tag()
    }

    /// Models this runner depends on
    pub fn required_models(&self) -> Vec<Tag> {
        vec![self.model.tag().clone()]
    }

    pub fn num_replica(&self) -> usize {
        self.sizing.replicas
    }

    pub fn num_concurrency_per_replica(&self) -> usize {
        self.sizing.concurrency_per_replica
    }

    pub fn sizing(&self) -> &Sizing {
        &self.sizing
    }

    /// The frozen configuration the model is loaded with
    pub fn effective_config(&self) -> &Options {
        &self.config
    }

    pub fn resource_quota(&self) -> &ResourceQuota {
        &self.quota
    }

    pub fn batch_options(&self) -> &BatchOptions {
        &self.batch_options
    }

    pub fn predict_mode(&self) -> PredictMode {
        self.mode
    }

    pub fn stored_model(&self) -> &StoredModel {
        &self.model
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// `Ready` once the model loaded successfully. A failed load leaves the
    /// runner `Uninitialized` for good.
    pub fn state(&self) -> RunnerState {
        match self.slot.get() {
            Some(Ok(_)) => RunnerState::Ready,
            _ => RunnerState::Uninitialized,
        }
    }

    /// Load the model if it has not been loaded yet.
    ///
    /// Exactly one caller performs the load; the rest block until it
    /// finishes and observe its outcome. A failure is cached and returned
    /// unchanged on every later call.
    ///
    /// # Errors
    /// - `RunnerError::LoadFailure` if the artifact cannot be deserialized
    pub fn setup(&self) -> RunnerResult<()> {
        self.handle().map(|_| ())
    }

    fn handle(&self) -> RunnerResult<&A::Handle> {
        self.slot
            .get_or_init(|| self.load_model())
            .as_ref()
            .map_err(Clone::clone)
    }

    fn load_model(&self) -> RunnerResult<A::Handle> {
        let started = Instant::now();
        info!(
            runner = %self.name,
            tag = %self.tag(),
            path = %self.artifact.display(),
            "loading model"
        );

        match self.adapter.load(&self.artifact, &self.config) {
            Ok(handle) => {
                info!(
                    runner = %self.name,
                    tag = %self.tag(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "model loaded"
                );
                Ok(handle)
            }
            Err(e) => {
                error!(runner = %self.name, tag = %self.tag(), error = %e, "model load failed");
                Err(RunnerError::load_failure(self.tag(), e))
            }
        }
    }

    /// Predict over one batch, loading the model first if needed.
    ///
    /// # Errors
    /// - `RunnerError::LoadFailure` if the deferred load failed (now or earlier)
    /// - `RunnerError::InferenceFailure` if conversion or prediction fails;
    ///   the runner stays usable
    pub fn run_batch(&self, input: Input<A::Batch>) -> RunnerResult<Predictions> {
        let handle = self.handle()?;

        let batch = self
            .adapter
            .to_native(handle, input)
            .map_err(|e| RunnerError::inference_failure(self.tag(), e))?;
        let predictions = self
            .adapter
            .predict(handle, self.mode, &batch)
            .map_err(|e| RunnerError::inference_failure(self.tag(), e))?;

        debug!(runner = %self.name, rows = predictions.rows(), "batch predicted");
        Ok(predictions)
    }

    /// Predict a single feature row
    pub fn run(&self, row: Vec<f32>) -> RunnerResult<Predictions> {
        self.run_batch(Input::Matrix(vec![row]))
    }
}

/// Build a runner for `tag` with default settings and load it immediately.
///
/// # Errors
/// Everything [`RunnerBuilder::build`] and [`Runner::setup`] can return.
pub fn load_runner<A: BatchAdapter>(
    store: &dyn ModelStore,
    adapter: A,
    tag: Tag,
    quota: ResourceQuota,
) -> RunnerResult<Runner<A>> {
    let runner = RunnerBuilder::new(tag)
        .resource_quota(quota)
        .build(store, adapter)?;
    runner.setup()?;
    Ok(runner)
}
