//! # modelrun-kernel
//!
//! Shared vocabulary for the modelrun workspace:
//!
//! - [`Tag`]: `name:version` model references
//! - [`Options`]: scalar option maps and their layered merge
//! - [`ResourceQuota`]: declared CPU/GPU capacity
//! - [`RunnerError`]: the error taxonomy every crate reports through
//! - [`config`]: multi-format configuration loading
//!
//! Nothing here performs model I/O; the store and runner crates build on top.

pub mod config;
pub mod error;
pub mod options;
pub mod resources;
pub mod tag;

pub use error::{RunnerError, RunnerResult};
pub use options::{OptionValue, Options};
pub use resources::ResourceQuota;
pub use tag::Tag;
