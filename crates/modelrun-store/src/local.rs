//! File-backed model store
//!
//! New versions are assembled in a staging directory next to their final
//! location and renamed into place, so a crash never leaves a half-written
//! version visible. The `latest` pointer is replaced with write-then-rename.

use crate::error::{StoreError, StoreResult};
use crate::record::{ModelRecord, NewModel, RECORD_FILE, StoredModel};
use crate::{ArtifactWriter, ModelStore};
use chrono::Utc;
use modelrun_kernel::Tag;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, warn};

const LATEST_FILE: &str = "latest";
const STAGING_PREFIX: &str = ".staging-";

/// Model store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalModelStore {
    root: PathBuf,
}

impl LocalModelStore {
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn name_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Directory of one version; must be a direct child of the name directory.
    fn version_dir(&self, name: &str, version: &str) -> StoreResult<PathBuf> {
        let mut parts = Path::new(version).components();
        match (parts.next(), parts.next()) {
            (Some(Component::Normal(_)), None) if !version.contains(['/', '\\']) => {
                Ok(self.name_dir(name).join(version))
            }
            _ => Err(StoreError::InvalidVersion {
                name: name.to_string(),
                version: version.to_string(),
            }),
        }
    }

    fn read_record(dir: &Path) -> StoreResult<ModelRecord> {
        let path = dir.join(RECORD_FILE);
        let payload = fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
        serde_yaml::from_slice(&payload).map_err(|source| StoreError::Record { path, source })
    }

    /// Every readable record stored under `name`, oldest first.
    fn records_for(&self, name: &str) -> StoreResult<Vec<ModelRecord>> {
        let dir = self.name_dir(name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| StoreError::io(&dir, e))? {
            let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
            let path = entry.path();
            let is_staging = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(STAGING_PREFIX));
            if !path.is_dir() || is_staging {
                continue;
            }
            match Self::read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt model record");
                }
            }
        }

        records.sort_by(|a, b| a.creation_time.cmp(&b.creation_time));
        Ok(records)
    }

    /// Version that `name:latest` currently resolves to.
    fn resolve_latest(&self, name: &str) -> StoreResult<String> {
        let pointer = self.name_dir(name).join(LATEST_FILE);
        if let Ok(content) = fs::read_to_string(&pointer) {
            let version = content.trim();
            let valid = matches!(
                self.version_dir(name, version),
                Ok(dir) if dir.join(RECORD_FILE).is_file()
            );
            if valid {
                return Ok(version.to_string());
            }
            warn!(name, pointer = %pointer.display(), "stale latest pointer, scanning versions");
        }

        self.records_for(name)?
            .last()
            .and_then(|r| r.tag.version().map(str::to_string))
            .ok_or_else(|| StoreError::NotFound(format!("{name}:latest")))
    }

    fn write_latest(&self, name: &str, version: &str) -> StoreResult<()> {
        let dir = self.name_dir(name);
        let target = dir.join(LATEST_FILE);
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tmp.write_all(version.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| StoreError::io(&target, e.error))?;
        Ok(())
    }
}

impl ModelStore for LocalModelStore {
    fn get(&self, tag: &Tag) -> StoreResult<StoredModel> {
        let version = match tag.version() {
            Some(v) => v.to_string(),
            None => self.resolve_latest(tag.name())?,
        };

        let dir = self.version_dir(tag.name(), &version)?;
        if !dir.join(RECORD_FILE).is_file() {
            return Err(StoreError::NotFound(tag.to_string()));
        }

        let record = Self::read_record(&dir)?;
        debug!(tag = %record.tag, dir = %dir.display(), "resolved model");
        Ok(StoredModel::new(record, dir))
    }

    fn persist(&self, model: NewModel, write: ArtifactWriter<'_>) -> StoreResult<StoredModel> {
        let tag = match model.tag.version() {
            Some(_) => model.tag.clone(),
            None => Tag::with_generated_version(model.tag.name())?,
        };
        let version = tag.version().unwrap_or_default().to_string();

        let name_dir = self.name_dir(tag.name());
        let final_dir = self.version_dir(tag.name(), &version)?;
        if final_dir.exists() {
            return Err(StoreError::AlreadyExists(tag.to_string()));
        }
        fs::create_dir_all(&name_dir).map_err(|e| StoreError::io(&name_dir, e))?;

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&name_dir)
            .map_err(|e| StoreError::io(&name_dir, e))?;

        write(staging.path()).map_err(|source| StoreError::Artifact {
            tag: tag.to_string(),
            source,
        })?;

        let record = ModelRecord {
            tag: tag.clone(),
            module: model.module,
            options: model.options,
            metadata: model.metadata,
            context: model.context,
            creation_time: Utc::now(),
        };
        let record_path = staging.path().join(RECORD_FILE);
        let yaml = serde_yaml::to_string(&record).map_err(|source| StoreError::Record {
            path: record_path.clone(),
            source,
        })?;
        fs::write(&record_path, yaml).map_err(|e| StoreError::io(&record_path, e))?;

        promote(staging, &final_dir)?;
        self.write_latest(tag.name(), &version)?;

        info!(tag = %tag, module = %record.module, "model saved");
        Ok(StoredModel::new(record, final_dir))
    }

    fn list(&self, name: Option<&str>) -> StoreResult<Vec<ModelRecord>> {
        let names: Vec<String> = match name {
            Some(n) => vec![Tag::new(n, None)?.name().to_string()],
            None => {
                let mut names = Vec::new();
                for entry in fs::read_dir(&self.root).map_err(|e| StoreError::io(&self.root, e))? {
                    let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
                    if entry.path().is_dir() {
                        if let Some(n) = entry.file_name().to_str() {
                            names.push(n.to_string());
                        }
                    }
                }
                names.sort();
                names
            }
        };

        let mut records = Vec::new();
        for n in names {
            records.extend(self.records_for(&n)?);
        }
        Ok(records)
    }

    fn delete(&self, tag: &Tag) -> StoreResult<bool> {
        let version = match tag.version() {
            Some(v) => v.to_string(),
            None => match self.resolve_latest(tag.name()) {
                Ok(v) => v,
                Err(StoreError::NotFound(_)) => return Ok(false),
                Err(e) => return Err(e),
            },
        };

        let dir = self.version_dir(tag.name(), &version)?;
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let name_dir = self.name_dir(tag.name());
        let pointer = name_dir.join(LATEST_FILE);
        match self.records_for(tag.name())?.last() {
            Some(newest) => {
                let newest = newest.tag.version().unwrap_or_default().to_string();
                self.write_latest(tag.name(), &newest)?;
            }
            None => {
                if pointer.exists() {
                    fs::remove_file(&pointer).map_err(|e| StoreError::io(&pointer, e))?;
                }
                // Only removes the directory when nothing else is left in it.
                let _ = fs::remove_dir(&name_dir);
            }
        }

        info!(name = tag.name(), version = %version, "model deleted");
        Ok(true)
    }
}

/// Rename a fully written staging directory to its final location.
fn promote(staging: TempDir, final_dir: &Path) -> StoreResult<()> {
    let staged = staging.into_path();
    if let Err(e) = fs::rename(&staged, final_dir) {
        let _ = fs::remove_dir_all(&staged);
        return Err(StoreError::io(final_dir, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ModelContext;
    use modelrun_kernel::Options;
    use tempfile::TempDir;

    fn new_model(tag: &str) -> NewModel {
        NewModel::new(
            Tag::parse(tag).unwrap(),
            "modelrun.xgboost",
            ModelContext::new("xgboost", "1.5.0"),
        )
        .with_options(Options::new().with("max_depth", 2))
    }

    fn write_artifact(dir: &Path) -> std::io::Result<()> {
        fs::write(dir.join("saved_model.json"), b"{}")
    }

    #[test]
    fn test_persist_and_get_by_version() {
        let temp = TempDir::new().unwrap();
        let store = LocalModelStore::new(temp.path()).unwrap();

        let saved = store
            .persist(new_model("demo:v1"), &mut write_artifact)
            .unwrap();
        assert_eq!(saved.tag().to_string(), "demo:v1");
        assert!(saved.path_of("saved_model.json").is_file());

        let got = store.get(&Tag::parse("demo:v1").unwrap()).unwrap();
        assert_eq!(got.module(), "modelrun.xgboost");
        assert_eq!(got.options().get_i64("max_depth"), Some(2));
        assert_eq!(got.dir(), saved.dir());
    }

    #[test]
    fn test_latest_follows_most_recent_save() {
        let temp = TempDir::new().unwrap();
        let store = LocalModelStore::new(temp.path()).unwrap();
        store.persist(new_model("demo:v1"), &mut write_artifact).unwrap();
        store.persist(new_model("demo:v2"), &mut write_artifact).unwrap();

        let latest = store.get(&Tag::parse("demo:latest").unwrap()).unwrap();
        assert_eq!(latest.tag().version(), Some("v2"));
    }

    #[test]
    fn test_latest_without_pointer_uses_creation_time() {
        let temp = TempDir::new().unwrap();
        let store = LocalModelStore::new(temp.path()).unwrap();
        store.persist(new_model("demo:a"), &mut write_artifact).unwrap();
        store.persist(new_model("demo:b"), &mut write_artifact).unwrap();
        fs::remove_file(temp.path().join("demo").join(LATEST_FILE)).unwrap();

        let latest = store.get(&Tag::parse("demo").unwrap()).unwrap();
        assert_eq!(latest.tag().version(), Some("b"));
    }

    #[test]
    fn test_generated_version_when_saving_latest() {
        let temp = TempDir::new().unwrap();
        let store = LocalModelStore::new(temp.path()).unwrap();
        let saved = store.persist(new_model("demo"), &mut write_artifact).unwrap();
        assert!(saved.tag().version().is_some());
        assert_eq!(
            store.get(&Tag::parse("demo").unwrap()).unwrap().tag(),
            saved.tag()
        );
    }

    #[test]
    fn test_missing_model_is_not_found() {
        let temp = TempDir::new().unwrap();
        let store = LocalModelStore::new(temp.path()).unwrap();
        store.persist(new_model("demo:v1"), &mut write_artifact).unwrap();

        for tag in ["ghost", "ghost:v1", "demo:v9"] {
            let err = store.get(&Tag::parse(tag).unwrap()).unwrap_err();
            assert!(matches!(err, StoreError::NotFound(_)), "{tag}: {err}");
        }
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let temp = TempDir::new().unwrap();
        let store = LocalModelStore::new(temp.path()).unwrap();
        store.persist(new_model("demo:v1"), &mut write_artifact).unwrap();
        let err = store
            .persist(new_model("demo:v1"), &mut write_artifact)
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn test_failed_writer_leaves_nothing_behind() {
        let temp = TempDir::new().unwrap();
        let store = LocalModelStore::new(temp.path()).unwrap();
        let mut failing = |_: &Path| -> std::io::Result<()> {
            Err(std::io::Error::other("disk full"))
        };
        let err = store.persist(new_model("demo:v1"), &mut failing).unwrap_err();
        assert!(matches!(err, StoreError::Artifact { .. }));
        assert!(!temp.path().join("demo").join("v1").exists());
        assert!(store.list(None).unwrap().is_empty());
    }

    #[test]
    fn test_list_skips_corrupt_records() {
        let temp = TempDir::new().unwrap();
        let store = LocalModelStore::new(temp.path()).unwrap();
        store.persist(new_model("alpha:v1"), &mut write_artifact).unwrap();
        store.persist(new_model("beta:v1"), &mut write_artifact).unwrap();

        let bad = temp.path().join("beta").join("broken");
        fs::create_dir_all(&bad).unwrap();
        fs::write(bad.join(RECORD_FILE), b"tag: [not valid").unwrap();

        let records = store.list(None).unwrap();
        let tags: Vec<String> = records.iter().map(|r| r.tag.to_string()).collect();
        assert_eq!(tags, vec!["alpha:v1", "beta:v1"]);

        assert_eq!(store.list(Some("beta")).unwrap().len(), 1);
    }

    #[test]
    fn test_parent_version_never_escapes_name_dir() {
        let temp = TempDir::new().unwrap();
        let store = LocalModelStore::new(temp.path()).unwrap();
        store.persist(new_model("demo:v1"), &mut write_artifact).unwrap();
        store.persist(new_model("other:v1"), &mut write_artifact).unwrap();

        for version in ["..", ".", "v1/..", ""] {
            assert!(matches!(
                store.version_dir("demo", version),
                Err(StoreError::InvalidVersion { .. })
            ));
        }

        // A tampered pointer is treated as stale, not followed.
        fs::write(temp.path().join("demo").join(LATEST_FILE), "..").unwrap();
        let latest = store.get(&Tag::parse("demo").unwrap()).unwrap();
        assert_eq!(latest.tag().version(), Some("v1"));

        fs::write(temp.path().join("demo").join(LATEST_FILE), "..").unwrap();
        assert!(store.delete(&Tag::parse("demo").unwrap()).unwrap());
        assert!(temp.path().is_dir());
        assert!(store.get(&Tag::parse("other:v1").unwrap()).is_ok());
        assert!(store.list(Some("..")).is_err());
    }

    #[test]
    fn test_delete_repoints_latest() {
        let temp = TempDir::new().unwrap();
        let store = LocalModelStore::new(temp.path()).unwrap();
        store.persist(new_model("demo:v1"), &mut write_artifact).unwrap();
        store.persist(new_model("demo:v2"), &mut write_artifact).unwrap();

        assert!(store.delete(&Tag::parse("demo:v2").unwrap()).unwrap());
        let latest = store.get(&Tag::parse("demo").unwrap()).unwrap();
        assert_eq!(latest.tag().version(), Some("v1"));

        assert!(store.delete(&Tag::parse("demo").unwrap()).unwrap());
        assert!(!temp.path().join("demo").exists());
        assert!(!store.delete(&Tag::parse("demo").unwrap()).unwrap());
    }
}
