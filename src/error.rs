//! # Error Handling
//!
//! This module defines the centralized error type for the module root model.
//! It uses the `thiserror` library to build a single `Error` enum covering
//! every failure the model reports, with enough context in each variant to
//! tell which module, layer or entry was involved.
//!
//! ## Key Components
//!
//! - **`Error`**: The enum of all failures. Most variants describe caller
//!   misuse of the model (mutating a baseline, committing twice, rearranging
//!   with a non-permutation); the rest wrap persisted-form and I/O failures.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Dangling library, module or SDK references are deliberately *not* errors:
//! they are representable states reported through `is_valid()`.

use thiserror::Error;

/// Main error type for module root model operations
#[derive(Error, Debug)]
pub enum Error {
    /// An operation was attempted on a model, layer or entry that has already
    /// been disposed.
    #[error("Already disposed: {what}")]
    Disposed { what: String },

    /// A mutation was attempted on a read-only (baseline) root model.
    #[error("Root model of module '{module}' is not writable")]
    NotWritable { module: String },

    /// A writable model was committed after it had already been committed or
    /// disposed.
    #[error("Root model of module '{module}' was already committed or disposed")]
    AlreadyCommitted { module: String },

    /// The new order passed to a rearrangement is not a permutation of the
    /// current order entries.
    #[error("Invalid order entry rearrangement: {message}")]
    InvalidRearrangement { message: String },

    /// The referenced order entry or content entry does not belong to the
    /// collection it was looked up in.
    #[error("Entry not found: {entry}")]
    EntryNotFound { entry: String },

    /// An entry with the same identity is already present.
    #[error("Duplicate entry: {entry}")]
    DuplicateEntry { entry: String },

    /// A content folder URL is not equal to or nested under its content root.
    #[error("Folder {folder} is not under content root {root}")]
    FolderOutsideContentRoot { folder: String, root: String },

    /// The content folder does not belong to the content entry.
    #[error("Folder {folder} does not belong to content entry {root}")]
    FolderNotOwned { folder: String, root: String },

    /// The operation is not supported by this kind of object.
    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation { operation: String },

    /// A custom order entry type was used without being registered.
    #[error("Order entry type is not registered: {type_id}")]
    UnknownOrderEntryType { type_id: String },

    /// No module extension with this id exists in the layer.
    #[error("Unknown module extension: {id}")]
    UnknownExtension { id: String },

    /// A setter was called on an immutable module extension.
    #[error("Module extension '{id}' is immutable")]
    ImmutableExtension { id: String },

    /// A module was asked to depend on itself.
    #[error("Module '{module}' cannot depend on itself")]
    SelfDependency { module: String },

    /// No module with this name is known.
    #[error("Module not found: {name}")]
    ModuleNotFound { name: String },

    /// A module with this name already exists (or is about to).
    #[error("Module with name '{name}' already exists")]
    ModuleNameExists { name: String },

    /// No layer with this name exists in the root model.
    #[error("Layer not found: {name}")]
    LayerNotFound { name: String },

    /// A model invariant was broken. This is a programming error.
    #[error("Invariant violated: {message}")]
    Invariant { message: String },

    /// Loading was canceled through the progress indicator.
    #[error("Operation canceled")]
    Canceled,

    /// An error occurred while interpreting a persisted configuration.
    ///
    /// This error includes the specific issue and optionally a hint about how
    /// to fix it.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// An error occurred during serialization.
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a `Disposed` error for the named object.
    pub(crate) fn disposed(what: impl Into<String>) -> Self {
        Error::Disposed { what: what.into() }
    }

    /// Build a `ConfigParse` error without a hint.
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            hint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_writable() {
        let error = Error::NotWritable {
            module: "core".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("not writable"));
        assert!(display.contains("core"));
    }

    #[test]
    fn test_error_display_config_parse_with_hint() {
        let error = Error::ConfigParse {
            message: "Missing url field".to_string(),
            hint: Some("Add 'url:' to the content block".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration parsing error"));
        assert!(display.contains("Missing url field"));
        assert!(display.contains("hint:"));
    }

    #[test]
    fn test_error_display_config_parse_without_hint() {
        let display = format!("{}", Error::config("bad layer"));
        assert!(display.contains("bad layer"));
        assert!(!display.contains("hint:"));
    }

    #[test]
    fn test_error_display_folder_outside_root() {
        let error = Error::FolderOutsideContentRoot {
            folder: "file:///other/src".to_string(),
            root: "file:///work".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("file:///other/src"));
        assert!(display.contains("file:///work"));
    }

    #[test]
    fn test_error_display_invalid_rearrangement() {
        let error = Error::InvalidRearrangement {
            message: "Size mismatch: old size=2; new size=1".to_string(),
        };
        assert!(format!("{}", error).contains("Size mismatch"));
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(format!("{}", error).contains("YAML parsing error"));
    }

    #[test]
    fn test_error_disposed_helper() {
        let display = format!("{}", Error::disposed("layer Default"));
        assert!(display.contains("Already disposed"));
        assert!(display.contains("layer Default"));
    }
}
