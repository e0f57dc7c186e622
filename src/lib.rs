//! # Module Roots Library
//!
//! This library models the roots of a project's modules: content roots with
//! typed source, test, resource and excluded folders, an ordered list of
//! dependencies (libraries, other modules, SDKs and provider-defined entries),
//! and per-module extension state. Every module keeps its configuration in
//! named layers, one of which is current.
//!
//! ## Quick Example
//!
//! ```
//! use std::sync::Arc;
//! use module_roots::content::ContentFolderType;
//! use module_roots::module::{Module, ModuleInfo};
//! use module_roots::registry::ExtensionRegistry;
//! use module_roots::services::ProjectServices;
//!
//! let services = ProjectServices::in_memory(Arc::new(ExtensionRegistry::new()));
//! let mut module = Module::new(ModuleInfo::new("app", Some("file:///work/app")), services);
//!
//! // Mutate a writable copy, then commit it into the baseline
//! let mut model = module.root_manager().modifiable_model().unwrap();
//! let layer = model.current_layer_mut().unwrap();
//! layer
//!     .add_content_entry("file:///work/app")
//!     .unwrap()
//!     .add_folder("file:///work/app/src", ContentFolderType::Production)
//!     .unwrap();
//! assert!(module.root_manager_mut().commit(&mut model).unwrap());
//!
//! assert_eq!(
//!     module.root_model().source_root_urls(false),
//!     vec!["file:///work/app/src"]
//! );
//! ```
//!
//! ## Core Concepts
//!
//! - **Layers (`layer`)**: one configuration of a module: content entries,
//!   order entries and extensions.
//! - **Root models (`root_model`)**: the named layers of a module. The
//!   committed baseline is read-only; changes go through a writable copy.
//! - **Modules (`module`)**: modules, their root managers and the module
//!   manager with its staged add, remove and rename operations.
//! - **Committer (`commit`)**: commits several root models at once,
//!   dependencies first.
//! - **Project (`project`)**: libraries, SDKs and modules loaded from a
//!   project file (`config`).
//! - **Services (`services`, `registry`, `vfs`)**: the extension registry,
//!   the virtual file system and file pointers shared by a project.

pub mod commit;
pub mod config;
pub mod content;
pub mod defaults;
pub mod error;
pub mod extension;
pub mod layer;
pub mod module;
pub mod order;
pub mod output;
pub mod progress;
pub mod project;
pub mod registry;
pub mod root_model;
pub mod services;
pub mod urls;
pub mod vfs;

#[cfg(test)]
mod urls_proptest;
