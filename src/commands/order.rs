//! # Order Command Implementation
//!
//! Shows the order in which modules are committed, dependencies first, or the
//! roots one module's order entries contribute.

use anyhow::Result;
use clap::{Args, ValueEnum};
use std::path::PathBuf;

use module_roots::defaults::{DEFAULT_PROJECT_FILE, PROJECT_FILE_ENV};
use module_roots::order::OrderRootType;

/// Show module commit order or a module's ordered roots
#[derive(Args, Debug)]
pub struct OrderArgs {
    /// Path to the project file.
    #[arg(short, long, value_name = "FILE", env = PROJECT_FILE_ENV, default_value = DEFAULT_PROJECT_FILE)]
    pub project: PathBuf,

    /// List the roots contributed by this module's order entries instead.
    #[arg(short, long, value_name = "NAME")]
    pub module: Option<String>,

    /// Root type to list with --module.
    #[arg(short, long, value_enum, default_value = "classes", requires = "module")]
    pub roots: RootKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum RootKind {
    #[default]
    Classes,
    Sources,
    Documentation,
}

impl From<RootKind> for OrderRootType {
    fn from(kind: RootKind) -> Self {
        match kind {
            RootKind::Classes => OrderRootType::Classes,
            RootKind::Sources => OrderRootType::Sources,
            RootKind::Documentation => OrderRootType::Documentation,
        }
    }
}

pub fn execute(args: OrderArgs) -> Result<()> {
    let project = super::load_project(&args.project)?;

    if let Some(module) = &args.module {
        let urls = project.order_root_urls(module, args.roots.into())?;
        for url in &urls {
            println!("{}", url);
        }
        if urls.is_empty() {
            println!(
                "No {} roots for module '{}'",
                OrderRootType::from(args.roots).id(),
                module
            );
        }
        return Ok(());
    }

    let order = project.module_manager().dependency_order();
    for (index, name) in order.names().iter().enumerate() {
        println!("{:>3}. {}", index + 1, name);
    }
    for cycle in order.cycles() {
        println!("cycle: {}", cycle.join(", "));
    }
    Ok(())
}
