//! # Validate Command Implementation
//!
//! Checks a project file without changing it.
//!
//! ## Functionality
//!
//! - **Parsing**: the file must parse and pass structural validation.
//! - **URLs**: content roots, folders, library and SDK roots must be
//!   well-formed URLs.
//! - **References**: order entries whose library, module or SDK does not
//!   resolve are reported as warnings.
//! - **Unknown data**: extensions and order-entry types no provider is
//!   registered for are reported as warnings.
//! - **Cycles**: mutually dependent modules are reported as warnings.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use module_roots::defaults::{DEFAULT_PROJECT_FILE, PROJECT_FILE_ENV};
use module_roots::output::{OutputConfig, Status};
use module_roots::urls;

/// Validate a project file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the project file.
    #[arg(short, long, value_name = "FILE", env = PROJECT_FILE_ENV, default_value = DEFAULT_PROJECT_FILE)]
    pub project: PathBuf,

    /// Use strict validation (fail on warnings).
    #[arg(long)]
    pub strict: bool,
}

pub fn execute(args: ValidateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    println!(
        "{} Validating project file: {}",
        out.marker(Status::Info),
        args.project.display()
    );

    let file = match super::read_project_file(&args.project) {
        Ok(file) => {
            println!("{} Project file parsed successfully", out.marker(Status::Ok));
            file
        }
        Err(e) => {
            println!("{} {:#}", out.marker(Status::Error), e);
            return Err(anyhow::anyhow!("Project file parsing failed"));
        }
    };

    let mut has_errors = false;
    let mut has_warnings = false;

    let mut checked = 0;
    for (owner, url) in declared_urls(&file) {
        checked += 1;
        if let Err(e) = urls::validate(&url) {
            println!("{} {}: invalid URL '{}': {}", out.marker(Status::Error), owner, url, e);
            has_errors = true;
        }
    }
    println!("   URLs checked: {}", checked);

    let project = match super::load_project(&args.project) {
        Ok(project) => project,
        Err(e) => {
            println!("{} {:#}", out.marker(Status::Error), e);
            return Err(anyhow::anyhow!("Project validation failed"));
        }
    };
    println!("\n{} Project Summary:", out.marker(Status::Info));
    println!("   Modules: {}", project.module_manager().len());
    println!("   Libraries: {}", file.libraries.len());
    println!("   SDKs: {}", project.sdks().len());

    for invalid in project.invalid_order_entries() {
        println!(
            "{} Module '{}' (layer '{}'): unresolved dependency '{}'",
            out.marker(Status::Warn),
            invalid.module,
            invalid.layer,
            invalid.entry
        );
        has_warnings = true;
    }

    for feature in project.services().unknown_features().features() {
        println!(
            "{} No provider for {} '{}'; its data is kept as is",
            out.marker(Status::Warn),
            feature.extension_point,
            feature.id
        );
        has_warnings = true;
    }

    let order = project.module_manager().dependency_order();
    for cycle in order.cycles() {
        println!(
            "{} Circular module dependency: {}",
            out.marker(Status::Warn),
            cycle.join(" <-> ")
        );
        has_warnings = true;
    }

    println!();
    if has_errors {
        println!("{} Project file has errors that must be fixed", out.marker(Status::Error));
        return Err(anyhow::anyhow!("Project validation failed"));
    }
    if has_warnings && args.strict {
        println!("{} Project file has warnings (strict mode enabled)", out.marker(Status::Error));
        return Err(anyhow::anyhow!("Project validation failed in strict mode"));
    }
    if has_warnings {
        println!("{} Project file is valid but has warnings", out.marker(Status::Warn));
    } else {
        println!("{} Project file is valid", out.marker(Status::Ok));
    }
    Ok(())
}

/// Every URL the file declares, with a description of where it appears
fn declared_urls(file: &module_roots::config::ProjectFile) -> Vec<(String, String)> {
    use module_roots::config::LayerChild;

    let mut found = Vec::new();
    for library in &file.libraries {
        for url in library.roots.values().flatten() {
            found.push((format!("library '{}'", library.name), url.clone()));
        }
    }
    for sdk in &file.sdks {
        for url in sdk.roots.values().flatten() {
            found.push((format!("SDK '{}'", sdk.name), url.clone()));
        }
    }
    for url in &file.excluded {
        found.push(("excluded roots".to_string(), url.clone()));
    }
    for module in &file.modules {
        let owner = format!("module '{}'", module.name);
        if let Some(dir) = &module.dir {
            found.push((owner.clone(), dir.clone()));
        }
        for layer in &module.roots.layers {
            for child in &layer.children {
                if let LayerChild::Content { content } = child {
                    found.push((owner.clone(), content.url.clone()));
                    for folder in &content.folders {
                        found.push((owner.clone(), folder.url.clone()));
                    }
                }
            }
        }
    }
    found
}
