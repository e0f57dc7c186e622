//! URL manipulation utilities for virtual file URLs
//!
//! Content roots, folders and library roots are addressed by URLs such as
//! `file:///work/app/src` or `jar:///libs/junit.jar!/`. These helpers compare
//! and convert them without touching the disk.

use crate::error::{Error, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};

/// URL protocol prefix for local files
pub const FILE_PREFIX: &str = "file://";

/// Separator between an archive path and the path inside the archive
pub const JAR_SEPARATOR: &str = "!/";

/// Check whether `url` is equal to `ancestor` or nested under it.
///
/// Matching is done on path segment boundaries, so `file:///a/bc` is not under
/// `file:///a/b`. Trailing slashes on the ancestor are ignored.
pub fn is_equal_or_ancestor(ancestor: &str, url: &str) -> bool {
    let ancestor = trim_trailing_slash(ancestor);
    let url = trim_trailing_slash(url);
    if ancestor == url {
        return true;
    }
    if !url.starts_with(ancestor) {
        return false;
    }
    if ancestor.ends_with('/') {
        // Only the protocol root (e.g. `file:///`) keeps its slash.
        return true;
    }
    let rest = &url[ancestor.len()..];
    rest.starts_with('/') || rest.starts_with(JAR_SEPARATOR)
}

/// Check whether `url` is strictly nested under `ancestor`.
pub fn is_strict_ancestor(ancestor: &str, url: &str) -> bool {
    trim_trailing_slash(ancestor) != trim_trailing_slash(url) && is_equal_or_ancestor(ancestor, url)
}

/// Strip trailing slashes, keeping protocol roots like `file:///` intact.
pub fn trim_trailing_slash(url: &str) -> &str {
    let mut trimmed = url;
    while trimmed.ends_with('/') && !trimmed.ends_with("://") && !trimmed.ends_with(JAR_SEPARATOR) {
        trimmed = &trimmed[..trimmed.len() - 1];
    }
    trimmed
}

/// Convert a `file://` URL into a local path.
///
/// Returns `None` for other protocols.
pub fn url_to_path(url: &str) -> Option<PathBuf> {
    url.strip_prefix(FILE_PREFIX).map(PathBuf::from)
}

/// Convert a local path into a `file://` URL.
pub fn path_to_url<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref().to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("{}{}", FILE_PREFIX, path)
    } else {
        format!("{}/{}", FILE_PREFIX, path)
    }
}

/// Last path segment of a URL, used for presentable names.
pub fn file_name(url: &str) -> &str {
    let trimmed = trim_trailing_slash(url);
    let trimmed = trimmed.strip_suffix(JAR_SEPARATOR).unwrap_or(trimmed);
    match trimmed.rfind('/') {
        Some(index) => &trimmed[index + 1..],
        None => trimmed,
    }
}

/// Validate that a string is a well-formed URL.
pub fn validate(url: &str) -> Result<()> {
    ::url::Url::parse(url).map(|_| ()).map_err(Error::UrlParse)
}

/// Match a URL's path against a glob pattern.
pub fn glob_match(pattern: &str, value: &str) -> Result<bool> {
    let pattern = Pattern::new(pattern).map_err(Error::Glob)?;
    Ok(pattern.matches(value))
}
