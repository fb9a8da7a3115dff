//! # modelrun-runner
//!
//! A [`Runner`] wraps one saved model and serves batch predictions from it.
//!
//! - Construction resolves the tag against a [`ModelStore`], rejects
//!   artifacts written by another adapter family and merges stored options
//!   with caller overrides.
//! - The [`sizing`] policy turns a [`ResourceQuota`] into a replica count,
//!   a per-replica concurrency and the execution parameters injected into
//!   the effective configuration.
//! - The model itself is loaded on first use, exactly once, even when many
//!   threads hit the first batch together.
//! - Model families plug in through the [`BatchAdapter`] trait.
//!
//! ## Features
//!
//! | Feature   | Description                                         |
//! |-----------|-----------------------------------------------------|
//! | `xgboost` | Tree-ensemble adapter for XGBoost JSON models (default) |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modelrun_kernel::{ResourceQuota, Tag};
//! use modelrun_runner::xgboost::XgboostAdapter;
//! use modelrun_runner::{Input, RunnerBuilder};
//! use modelrun_store::LocalModelStore;
//!
//! let store = LocalModelStore::new("/var/lib/modelrun/models").unwrap();
//! let runner = RunnerBuilder::new(Tag::parse("churn:latest").unwrap())
//!     .resource_quota(ResourceQuota::cpu(4.0).unwrap())
//!     .build(&store, XgboostAdapter::new())
//!     .unwrap();
//! let scores = runner.run_batch(Input::Matrix(vec![vec![0.0, 1.0]])).unwrap();
//! println!("{:?}", scores.as_slice());
//! ```
//!
//! [`ModelStore`]: modelrun_store::ModelStore
//! [`ResourceQuota`]: modelrun_kernel::ResourceQuota

pub mod adapter;
pub mod dispatch;
pub mod resolve;
pub mod runner;
pub mod sizing;

#[cfg(feature = "xgboost")]
pub mod xgboost;

pub use adapter::{
    AdapterError, AdapterRegistry, BatchAdapter, Input, PredictMode, Predictions,
    RegisteredAdapter, Table,
};
pub use dispatch::Dispatcher;
pub use resolve::{ResolvedModel, load, resolve_model, save};
pub use runner::{BatchOptions, Runner, RunnerBuilder, RunnerState, load_runner};
pub use sizing::{DeviceAssignment, Sizing};
