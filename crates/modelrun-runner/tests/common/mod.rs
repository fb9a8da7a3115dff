//! Shared helpers for `modelrun-runner` integration tests.
//!
//! Declared with `mod common;` inside each test file that needs it.

#![allow(dead_code)]

pub mod stub_adapter;

use modelrun_kernel::{Options, Tag};
use modelrun_store::{LocalModelStore, ModelContext, ModelStore, NewModel, StoredModel};
use std::path::Path;
use tempfile::TempDir;

/// A store rooted in a fresh temporary directory
pub fn temp_store() -> (TempDir, LocalModelStore) {
    let dir = TempDir::new().expect("create temp dir");
    let store = LocalModelStore::new(dir.path().join("models")).expect("create store");
    (dir, store)
}

/// Persist one version with a single artifact file.
pub fn put_model(
    store: &LocalModelStore,
    tag: &str,
    module: &str,
    options: Options,
    artifact_file: &str,
    artifact: &[u8],
) -> StoredModel {
    let model = NewModel::new(
        Tag::parse(tag).expect("valid tag"),
        module,
        ModelContext::new("test", "0.0"),
    )
    .with_options(options);
    let mut write = |dir: &Path| std::fs::write(dir.join(artifact_file), artifact);
    store.persist(model, &mut write).expect("persist model")
}

/// XGBoost JSON model: binary:logistic over `age` and `income`.
///
/// tree 0: age < 0.5 ? +1 : -1 (missing goes left)
/// tree 1: income < 2.0 ? +0.5 : -0.5 (missing goes right)
pub fn xgboost_model_json() -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "learner": {
            "feature_names": ["age", "income"],
            "gradient_booster": {
                "name": "gbtree",
                "model": {
                    "tree_info": [0, 0],
                    "trees": [
                        {
                            "left_children": [1, -1, -1],
                            "right_children": [2, -1, -1],
                            "split_indices": [0, 0, 0],
                            "split_conditions": [0.5, 1.0, -1.0],
                            "default_left": [1, 0, 0]
                        },
                        {
                            "left_children": [1, -1, -1],
                            "right_children": [2, -1, -1],
                            "split_indices": [1, 0, 0],
                            "split_conditions": [2.0, 0.5, -0.5],
                            "default_left": [0, 0, 0]
                        }
                    ]
                }
            },
            "learner_model_param": {"base_score": "5E-1", "num_class": "0", "num_feature": "2"},
            "objective": {"name": "binary:logistic"}
        },
        "version": [1, 7, 6]
    }))
    .expect("serialize fixture")
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
