//! # Committer
//!
//! Root models of several modules are committed together with a
//! [`ModifiableModuleModel`](crate::module::ModifiableModuleModel) as one
//! roots change. [`ordering`] decides the commit order from the module
//! dependency graph; [`committer`] drives the commit itself.

pub mod committer;
pub mod ordering;

pub use committer::{commit_root_model, multi_commit};
pub use ordering::{DependencyGraph, TopologicalOrder};
