//! Virtual file abstraction and explicitly released file pointers
//!
//! Content roots and folders refer to directories by URL. Those directories
//! do not have to exist; a [`VirtualFilePointer`] resolves its URL through a
//! [`VirtualFileSystem`] each time it is asked. Pointers are registered with a
//! [`VirtualFilePointerManager`] and must be released explicitly when the
//! owning entry is disposed.

use crate::urls;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

/// A resolved file or directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualFile {
    /// URL of the file
    pub url: String,
    /// Whether the file is a directory
    pub is_directory: bool,
}

impl VirtualFile {
    pub fn new(url: impl Into<String>, is_directory: bool) -> Self {
        Self {
            url: url.into(),
            is_directory,
        }
    }

    /// Last path segment of the URL
    pub fn name(&self) -> &str {
        urls::file_name(&self.url)
    }
}

/// Resolves URLs to live files.
pub trait VirtualFileSystem: Send + Sync + fmt::Debug {
    /// Find the file for a URL, or `None` if it does not currently exist.
    fn find_file_by_url(&self, url: &str) -> Option<VirtualFile>;

    /// Check whether a URL currently resolves.
    fn exists(&self, url: &str) -> bool {
        self.find_file_by_url(url).is_some()
    }
}

/// In-memory file system for fast, deterministic resolution
#[derive(Debug, Default)]
pub struct MemoryVfs {
    /// URL -> is-directory mapping
    files: RwLock<BTreeMap<String, bool>>,
}

impl MemoryVfs {
    /// Create a new empty file system
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory
    pub fn add_directory(&self, url: &str) {
        self.insert(url, true);
    }

    /// Add a regular file
    pub fn add_file(&self, url: &str) {
        self.insert(url, false);
    }

    /// Remove a file or directory together with everything under it.
    ///
    /// Returns the number of removed entries.
    pub fn remove(&self, url: &str) -> usize {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        let doomed: Vec<String> = files
            .keys()
            .filter(|existing| urls::is_equal_or_ancestor(url, existing))
            .cloned()
            .collect();
        for key in &doomed {
            files.remove(key);
        }
        doomed.len()
    }

    /// List all known URLs in sorted order
    pub fn list(&self) -> Vec<String> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.keys().cloned().collect()
    }

    /// Get the number of files
    pub fn len(&self) -> usize {
        self.files.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if the file system is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, url: &str, is_directory: bool) {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.insert(urls::trim_trailing_slash(url).to_string(), is_directory);
    }
}

impl VirtualFileSystem for MemoryVfs {
    fn find_file_by_url(&self, url: &str) -> Option<VirtualFile> {
        let url = urls::trim_trailing_slash(url);
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files
            .get(url)
            .map(|is_directory| VirtualFile::new(url, *is_directory))
    }
}

/// File system backed by the local disk, resolving `file://` URLs
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl VirtualFileSystem for LocalFileSystem {
    fn find_file_by_url(&self, url: &str) -> Option<VirtualFile> {
        let path = urls::url_to_path(url)?;
        let metadata = std::fs::metadata(&path).ok()?;
        Some(VirtualFile::new(
            urls::trim_trailing_slash(url),
            metadata.is_dir(),
        ))
    }
}

/// Receives validity change notifications for URLs that have live pointers.
pub trait VirtualFilePointerListener: Send + Sync {
    fn validity_changed(&self, urls: &[String]);
}

#[derive(Default)]
struct PointerTable {
    counts: HashMap<String, usize>,
    listeners: Vec<Arc<dyn VirtualFilePointerListener>>,
}

/// Registry of live file pointers
#[derive(Clone, Default)]
pub struct VirtualFilePointerManager {
    table: Arc<Mutex<PointerTable>>,
}

impl fmt::Debug for VirtualFilePointerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualFilePointerManager")
            .field("live", &self.live_pointer_count())
            .finish()
    }
}

impl VirtualFilePointerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pointer for a URL. The pointer stays registered until
    /// [`VirtualFilePointer::release`] is called.
    pub fn create(&self, url: &str) -> VirtualFilePointer {
        let url = url.to_string();
        {
            let mut table = self.lock();
            *table.counts.entry(url.clone()).or_insert(0) += 1;
        }
        VirtualFilePointer {
            url,
            manager: self.clone(),
            released: false,
        }
    }

    /// Register a listener notified by [`Self::fire_validity_changed`].
    pub fn add_listener(&self, listener: Arc<dyn VirtualFilePointerListener>) {
        self.lock().listeners.push(listener);
    }

    /// Total number of unreleased pointers
    pub fn live_pointer_count(&self) -> usize {
        self.lock().counts.values().sum()
    }

    /// Number of unreleased pointers for one URL
    pub fn pointer_count(&self, url: &str) -> usize {
        self.lock().counts.get(url).copied().unwrap_or(0)
    }

    /// Notify listeners that files at or under the given URLs were created or
    /// deleted. Only URLs with live pointers are reported; nothing is sent when
    /// none match.
    pub fn fire_validity_changed(&self, changed: &[String]) {
        let (affected, listeners) = {
            let table = self.lock();
            let mut affected: Vec<String> = table
                .counts
                .keys()
                .filter(|pointer_url| {
                    changed
                        .iter()
                        .any(|changed_url| urls::is_equal_or_ancestor(changed_url, pointer_url))
                })
                .cloned()
                .collect();
            affected.sort();
            (affected, table.listeners.clone())
        };
        if affected.is_empty() {
            return;
        }
        for listener in listeners {
            listener.validity_changed(&affected);
        }
    }

    fn release(&self, url: &str) {
        let mut table = self.lock();
        if let Some(count) = table.counts.get_mut(url) {
            *count -= 1;
            if *count == 0 {
                table.counts.remove(url);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PointerTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A URL registered with a [`VirtualFilePointerManager`]
pub struct VirtualFilePointer {
    url: String,
    manager: VirtualFilePointerManager,
    released: bool,
}

impl fmt::Debug for VirtualFilePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualFilePointer")
            .field("url", &self.url)
            .field("released", &self.released)
            .finish()
    }
}

impl VirtualFilePointer {
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolve the pointer against a file system.
    pub fn file(&self, file_system: &dyn VirtualFileSystem) -> Option<VirtualFile> {
        file_system.find_file_by_url(&self.url)
    }

    /// Unregister the pointer. Releasing twice is a no-op.
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.manager.release(&self.url);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}
