//! # Ls Command Implementation
//!
//! Lists the modules of a project with their layers and roots.
//!
//! ## Functionality
//!
//! - **Module Listing**: one line per module, in name order
//! - **Pattern Filtering**: glob patterns over module names
//! - **Detailed Output**: `--long` adds content and source roots
//! - **JSON**: `--json` prints the listing as a JSON array

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use module_roots::defaults::{DEFAULT_PROJECT_FILE, PROJECT_FILE_ENV};
use module_roots::module::Module;
use module_roots::urls;

/// List the modules of a project
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Path to the project file.
    #[arg(short, long, value_name = "FILE", env = PROJECT_FILE_ENV, default_value = DEFAULT_PROJECT_FILE)]
    pub project: PathBuf,

    /// Filter modules by glob pattern (e.g., "core*").
    #[arg(value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Show content roots, source roots and dependencies.
    #[arg(short, long)]
    pub long: bool,

    /// Print the listing as JSON.
    #[arg(long)]
    pub json: bool,

    /// Show only the number of matching modules.
    #[arg(long, conflicts_with = "json")]
    pub count: bool,
}

#[derive(Debug, Serialize)]
struct ModuleListing {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dir: Option<String>,
    current_layer: Option<String>,
    layers: Vec<String>,
    content_roots: Vec<String>,
    source_roots: Vec<String>,
    test_source_roots: Vec<String>,
    dependencies: Vec<String>,
}

impl ModuleListing {
    fn new(module: &Module) -> Self {
        let model = module.root_model();
        let sources = model.source_root_urls(false);
        let tests = model
            .source_root_urls(true)
            .into_iter()
            .filter(|url| !sources.contains(url))
            .collect();
        Self {
            name: module.name().to_string(),
            dir: module.dir_url().map(str::to_string),
            current_layer: model.current_layer_name().map(str::to_string),
            layers: model.layer_names().into_iter().map(str::to_string).collect(),
            content_roots: model.content_root_urls(),
            source_roots: sources,
            test_source_roots: tests,
            dependencies: model.dependency_module_names(),
        }
    }
}

pub fn execute(args: LsArgs) -> Result<()> {
    let project = super::load_project(&args.project)?;

    let mut listings = Vec::new();
    for module in project.module_manager().modules() {
        if let Some(pattern) = &args.pattern {
            let matched = urls::glob_match(pattern, module.name())
                .map_err(|e| anyhow::anyhow!("Invalid glob pattern '{}': {}", pattern, e))?;
            if !matched {
                continue;
            }
        }
        listings.push(ModuleListing::new(module));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }
    if args.count {
        println!("{}", listings.len());
        return Ok(());
    }
    if listings.is_empty() {
        println!("No modules found.");
        return Ok(());
    }

    for listing in &listings {
        let layer = listing.current_layer.as_deref().unwrap_or("-");
        if listing.layers.len() > 1 {
            println!("{} [{} of {} layers]", listing.name, layer, listing.layers.len());
        } else {
            println!("{} [{}]", listing.name, layer);
        }
        if args.long {
            print_urls("content", &listing.content_roots);
            print_urls("sources", &listing.source_roots);
            print_urls("tests", &listing.test_source_roots);
            print_urls("depends on", &listing.dependencies);
        }
    }
    println!();
    println!("{} module(s)", listings.len());
    Ok(())
}

fn print_urls(label: &str, values: &[String]) {
    for value in values {
        println!("    {:<10} {}", label, value);
    }
}
