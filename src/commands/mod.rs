//! # CLI Command Implementations
//!
//! Each subcommand of the `module-roots` tool lives in its own file with an
//! `Args` struct derived with `clap` and an `execute` function that calls into
//! the `module_roots` library.

pub mod ls;
pub mod normalize;
pub mod order;
pub mod tree;
pub mod validate;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use module_roots::config::{self, ProjectFile};
use module_roots::output::LoadSpinner;
use module_roots::project::Project;
use module_roots::vfs::LocalFileSystem;

/// Read and validate a project file.
pub(crate) fn read_project_file(path: &Path) -> Result<ProjectFile> {
    if !path.exists() {
        anyhow::bail!(
            "Project file not found: {}\nCreate one or pass --project <FILE>",
            path.display()
        );
    }
    config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
}

/// Load a project against the local disk, with a spinner on interactive
/// terminals.
pub(crate) fn load_project(path: &Path) -> Result<Project> {
    let file = read_project_file(path)?;
    let spinner = LoadSpinner::new(console::Term::stderr().is_term());
    let project = Project::load(&file, Arc::new(LocalFileSystem), Some(&spinner));
    spinner.finish();
    project.with_context(|| format!("Failed to load project from {}", path.display()))
}
