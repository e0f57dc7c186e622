//! Default values for module root configuration.
//!
//! This module provides centralized default values used across the model and
//! the commands, ensuring consistency and avoiding duplication.

/// Name of the layer every module starts with.
pub const DEFAULT_LAYER_NAME: &str = "Default";

/// File name looked up when no project file is given on the command line.
pub const DEFAULT_PROJECT_FILE: &str = "modules.yaml";

/// Environment variable overriding [`DEFAULT_PROJECT_FILE`]. The `--project`
/// flag takes precedence over both.
pub const PROJECT_FILE_ENV: &str = "MODULE_ROOTS_PROJECT";
