//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// Module Roots - Inspect and normalize layered module root configurations
#[derive(Parser, Debug)]
#[command(name = "module-roots")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a project file
    Validate(commands::validate::ValidateArgs),

    /// List the modules of a project
    Ls(commands::ls::LsArgs),

    /// Display module dependencies as a tree
    Tree(commands::tree::TreeArgs),

    /// Show module commit order or a module's ordered roots
    Order(commands::order::OrderArgs),

    /// Rewrite a project file in canonical form
    Normalize(commands::normalize::NormalizeArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        self.init_logging();

        match self.command {
            Commands::Validate(args) => commands::validate::execute(args, &self.color),
            Commands::Ls(args) => commands::ls::execute(args),
            Commands::Tree(args) => commands::tree::execute(args),
            Commands::Order(args) => commands::order::execute(args),
            Commands::Normalize(args) => commands::normalize::execute(args),
        }
    }

    fn init_logging(&self) {
        let write_style = match self.color.to_lowercase().as_str() {
            "always" => env_logger::WriteStyle::Always,
            "never" => env_logger::WriteStyle::Never,
            _ => env_logger::WriteStyle::Auto,
        };
        let mut builder = env_logger::Builder::new();
        builder
            .parse_filters(&self.log_level)
            .write_style(write_style)
            .format_timestamp(None);
        if let Err(e) = builder.try_init() {
            eprintln!("Logging was already initialized: {}", e);
        }
    }
}
