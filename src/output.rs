//! # Output Configuration
//!
//! Terminal presentation for the CLI: whether to color status markers, and a
//! spinner that reports project loading progress.
//!
//! ## Respecting User Preferences
//!
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals

use crate::error::Result;
use crate::progress::{CancellationToken, ProgressIndicator};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::fmt;
use std::time::Duration;

/// Output configuration for controlling colors.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// `always` and `never` force the choice; anything else detects it from
    /// the environment and the terminal.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        Self { use_color }
    }

    fn detect_color_support() -> bool {
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    pub fn without_color() -> Self {
        Self { use_color: false }
    }

    /// Bracketed status marker, colored when enabled
    pub fn marker(&self, status: Status) -> String {
        let text = status.label();
        if !self.use_color {
            return text.to_string();
        }
        let styled = style(text).force_styling(true);
        match status {
            Status::Ok => styled.green().bold().to_string(),
            Status::Warn => styled.yellow().bold().to_string(),
            Status::Error => styled.red().bold().to_string(),
            Status::Info => styled.cyan().to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warn,
    Error,
    Info,
}

impl Status {
    pub fn label(self) -> &'static str {
        match self {
            Status::Ok => "[OK]",
            Status::Warn => "[WARN]",
            Status::Error => "[ERR]",
            Status::Info => "[INFO]",
        }
    }
}

/// Spinner shown while a project loads. Cancellation goes through the
/// wrapped token.
pub struct LoadSpinner {
    bar: ProgressBar,
    token: CancellationToken,
}

impl fmt::Debug for LoadSpinner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadSpinner")
            .field("hidden", &self.bar.is_hidden())
            .field("canceled", &self.token.is_canceled())
            .finish()
    }
}

impl LoadSpinner {
    /// A visible spinner, or a hidden one when `visible` is false
    pub fn new(visible: bool) -> Self {
        let bar = if visible {
            let bar = ProgressBar::new_spinner();
            if let Ok(spinner_style) = ProgressStyle::with_template("{spinner} {msg}") {
                bar.set_style(spinner_style);
            }
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::hidden()
        };
        Self {
            bar,
            token: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressIndicator for LoadSpinner {
    fn check_canceled(&self) -> Result<()> {
        self.token.check_canceled()
    }

    fn set_text(&self, text: &str) {
        self.bar.set_message(text.to_string());
    }
}
