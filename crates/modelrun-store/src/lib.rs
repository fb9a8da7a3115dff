//! # modelrun-store
//!
//! Versioned storage for saved models. A stored version is a directory
//! holding a `model.yaml` record and the artifact files written by the
//! adapter family that produced it:
//!
//! ```text
//! <root>/
//!   demo/
//!     latest                 # one line: the most recently saved version
//!     20210929_153BC4/
//!       model.yaml
//!       saved_model.json
//! ```
//!
//! Runners only see the [`ModelStore`] trait, so any backend that can map a
//! [`Tag`](modelrun_kernel::Tag) to a directory plugs in.

pub mod error;
pub mod local;
pub mod record;

pub use error::{StoreError, StoreResult};
pub use local::LocalModelStore;
pub use record::{ModelContext, ModelRecord, NewModel, StoredModel};

use modelrun_kernel::Tag;
use std::path::Path;

/// Callback that writes artifact files into the given staging directory
pub type ArtifactWriter<'a> = &'a mut dyn FnMut(&Path) -> std::io::Result<()>;

/// A store of named, versioned model artifacts
pub trait ModelStore: Send + Sync {
    /// Resolve `tag` (a missing version means `latest`) to a stored model.
    ///
    /// # Errors
    /// - `StoreError::NotFound` if no matching version exists
    fn get(&self, tag: &Tag) -> StoreResult<StoredModel>;

    /// Persist a new version. `write` receives a staging directory and must
    /// put the artifact files there; the version becomes visible only after
    /// it returns successfully.
    fn persist(&self, model: NewModel, write: ArtifactWriter<'_>) -> StoreResult<StoredModel>;

    /// Records for every stored version, optionally filtered by name,
    /// sorted by name then creation time.
    fn list(&self, name: Option<&str>) -> StoreResult<Vec<ModelRecord>>;

    /// Remove one version. Returns `false` when it did not exist.
    fn delete(&self, tag: &Tag) -> StoreResult<bool>;
}
