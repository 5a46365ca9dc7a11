//! Application layer for plaintrack.
//!
//! This crate wires the pure core to the filesystem: configuration, a
//! Markdown file store, and a service that runs load, mutate and persist
//! cycles on behalf of the CLI.

pub mod config;
pub mod filter_util;
pub mod service;
pub mod store;
pub mod validate;

// Re-exports for convenience
pub use config::ProjectConfig;
pub use filter_util::{FilterBuildError, FilterBuildResult, TaskFilterBuilder, parse_sorters};
pub use service::{Project, ProjectError, ProjectService};
pub use store::{FileStore, ProjectStore};
pub use validate::ValidationIssue;
