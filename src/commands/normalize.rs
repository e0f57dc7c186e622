//! # Normalize Command Implementation
//!
//! Loads a project and writes it back in canonical form: modules, libraries
//! and SDKs in name order, duplicate content roots and module-source entries
//! dropped, a missing module-source entry added, defaults omitted. Unknown
//! extensions are written back unchanged.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use module_roots::config;
use module_roots::defaults::{DEFAULT_PROJECT_FILE, PROJECT_FILE_ENV};

/// Rewrite a project file in canonical form
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Path to the project file.
    #[arg(short, long, value_name = "FILE", env = PROJECT_FILE_ENV, default_value = DEFAULT_PROJECT_FILE)]
    pub project: PathBuf,

    /// Write the result to this file instead of stdout.
    #[arg(short, long, value_name = "FILE", conflicts_with = "in_place")]
    pub output: Option<PathBuf>,

    /// Overwrite the project file.
    #[arg(long)]
    pub in_place: bool,

    /// Exit with an error if the file is not already normalized.
    #[arg(long, conflicts_with_all = ["output", "in_place"])]
    pub check: bool,
}

pub fn execute(args: NormalizeArgs) -> Result<()> {
    let project = super::load_project(&args.project)?;
    let normalized = config::to_yaml(&project.to_config())?;

    if args.check {
        let current = std::fs::read_to_string(&args.project)
            .with_context(|| format!("Failed to read {}", args.project.display()))?;
        if current != normalized {
            anyhow::bail!("{} is not normalized", args.project.display());
        }
        println!("{} is normalized", args.project.display());
        return Ok(());
    }

    let target = if args.in_place {
        Some(args.project.clone())
    } else {
        args.output.clone()
    };
    match target {
        Some(path) => {
            std::fs::write(&path, &normalized)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("Wrote {}", path.display());
        }
        None => print!("{}", normalized),
    }
    Ok(())
}
