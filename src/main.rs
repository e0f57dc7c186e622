//! # Module Roots CLI
//!
//! Binary entry point for the `module-roots` command-line tool. It parses
//! arguments with `clap` and dispatches to a subcommand; all model logic lives
//! in the `module_roots` library.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
