//! Command implementations

pub mod delete;
pub mod import;
pub mod info;
pub mod list;
pub mod plan;
pub mod predict;
