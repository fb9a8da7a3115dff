//! Model reference resolution and the save/load entry points of an adapter
//! family.
//!
//! Resolution only locates a model: it reads the stored record, rejects
//! records written by another family and merges options. The artifact is not
//! opened here; the runner does that on first use.

use crate::adapter::BatchAdapter;
use modelrun_kernel::{Options, RunnerError, RunnerResult, Tag};
use modelrun_store::{ModelStore, NewModel, StoredModel};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A model located in the store and vetted for one adapter family
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub model: StoredModel,
    /// Stored options with caller overrides on top, plus family defaults
    pub options: Options,
}

/// Resolve `tag` for `adapter` and merge `overrides` into the stored options.
///
/// # Errors
/// - `RunnerError::NotFound` if no matching version exists
/// - `RunnerError::ModuleMismatch` if the stored module belongs to another family
pub fn resolve_model<A: BatchAdapter>(
    store: &dyn ModelStore,
    adapter: &A,
    tag: &Tag,
    overrides: &Options,
) -> RunnerResult<ResolvedModel> {
    let model = store.get(tag)?;

    if !adapter.accepts_module(model.module()) {
        return Err(RunnerError::ModuleMismatch {
            tag: model.tag().to_string(),
            stored: model.module().to_string(),
            requested: adapter.module().to_string(),
        });
    }

    let mut options = Options::layered(model.options(), overrides);
    adapter.apply_defaults(&mut options);

    debug!(
        requested = %tag,
        resolved = %model.tag(),
        module = model.module(),
        options = options.len(),
        "model resolved"
    );
    Ok(ResolvedModel { model, options })
}

/// Resolve and immediately load a model, bypassing runner sizing.
///
/// # Errors
/// - `RunnerError::NotFound` / `RunnerError::ModuleMismatch` from resolution
/// - `RunnerError::LoadFailure` if the artifact cannot be deserialized
pub fn load<A: BatchAdapter>(
    store: &dyn ModelStore,
    adapter: &A,
    tag: &Tag,
    options: &Options,
) -> RunnerResult<A::Handle> {
    let resolved = resolve_model(store, adapter, tag, options)?;
    let path = resolved.model.path_of(adapter.artifact_file());
    adapter
        .load(&path, &resolved.options)
        .map_err(|e| RunnerError::load_failure(resolved.model.tag(), e))
}

/// Persist `handle` under `name` as a new version and return its tag.
///
/// # Errors
/// - `RunnerError::InvalidTag` if `name` is not a valid model name
/// - `RunnerError::Store` if the artifact or record cannot be written
pub fn save<A: BatchAdapter>(
    store: &dyn ModelStore,
    adapter: &A,
    name: &str,
    handle: &A::Handle,
    options: Options,
    metadata: BTreeMap<String, Value>,
) -> RunnerResult<Tag> {
    let tag = Tag::with_generated_version(name)?;
    let new_model = NewModel::new(tag, adapter.module(), adapter.context())
        .with_options(options)
        .with_metadata(metadata);

    let artifact_file = adapter.artifact_file();
    let mut write = |dir: &std::path::Path| {
        adapter
            .save(handle, &dir.join(artifact_file))
            .map_err(|e| std::io::Error::other(e.to_string()))
    };
    let stored = store.persist(new_model, &mut write)?;

    info!(tag = %stored.tag(), module = stored.module(), "model saved");
    Ok(stored.tag().clone())
}
