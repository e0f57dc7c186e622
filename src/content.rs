//! # Content Entries and Folders
//!
//! A content entry is one top-level directory contributed to a module. It owns
//! an ordered set of typed sub-folders (sources, tests, resources, exclusions)
//! which must all live at or under the entry's root URL.
//!
//! ## Key Components
//!
//! - **`ContentFolderType`**: The classification of a folder. Built-in types
//!   have fixed ids; anything else is a provider-defined custom type whose id is
//!   preserved as-is.
//! - **`ContentFolder`**: A typed folder with an optional property bag.
//! - **`ContentEntry`**: The content root. A *single* entry is an optimized
//!   variant that never carries explicit folders: reads behave like an empty
//!   entry and folder mutations are rejected.
//! - **`scopes`**: Ready-made folder type predicates.
//!
//! Folders reported by [`ContentEntry::folders`] include synthetic excluded
//! folders contributed by the registry's exclude policies. Those are flagged
//! with [`ContentFolder::is_synthetic`] and cannot be removed.

use crate::config::{ContentElement, FolderElement};
use crate::error::{Error, Result};
use crate::services::ProjectServices;
use crate::urls;
use crate::vfs::{VirtualFile, VirtualFilePointer};
use log::warn;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Extension point name reported for unknown folder types
pub const FOLDER_TYPE_EXTENSION_POINT: &str = "ContentFolderTypeProvider";

/// Classification of a content folder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentFolderType {
    Production,
    Test,
    ProductionResource,
    TestResource,
    Excluded,
    /// A provider-defined type, identified by its id
    Custom(String),
}

impl ContentFolderType {
    pub fn id(&self) -> &str {
        match self {
            ContentFolderType::Production => "PRODUCTION",
            ContentFolderType::Test => "TEST",
            ContentFolderType::ProductionResource => "PRODUCTION_RESOURCE",
            ContentFolderType::TestResource => "TEST_RESOURCE",
            ContentFolderType::Excluded => "EXCLUDED",
            ContentFolderType::Custom(id) => id,
        }
    }

    pub fn from_id(id: &str) -> Self {
        match id {
            "PRODUCTION" => ContentFolderType::Production,
            "TEST" => ContentFolderType::Test,
            "PRODUCTION_RESOURCE" => ContentFolderType::ProductionResource,
            "TEST_RESOURCE" => ContentFolderType::TestResource,
            "EXCLUDED" => ContentFolderType::Excluded,
            other => ContentFolderType::Custom(other.to_string()),
        }
    }

    pub fn is_builtin(&self) -> bool {
        !matches!(self, ContentFolderType::Custom(_))
    }
}

impl From<String> for ContentFolderType {
    fn from(id: String) -> Self {
        ContentFolderType::from_id(&id)
    }
}

impl From<ContentFolderType> for String {
    fn from(folder_type: ContentFolderType) -> Self {
        folder_type.id().to_string()
    }
}

impl fmt::Display for ContentFolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Folder type predicates
pub mod scopes {
    use super::ContentFolderType;

    pub fn all(_: &ContentFolderType) -> bool {
        true
    }

    pub fn production(folder_type: &ContentFolderType) -> bool {
        matches!(folder_type, ContentFolderType::Production)
    }

    pub fn test(folder_type: &ContentFolderType) -> bool {
        matches!(folder_type, ContentFolderType::Test)
    }

    pub fn production_and_test(folder_type: &ContentFolderType) -> bool {
        production(folder_type) || test(folder_type)
    }

    pub fn resources(folder_type: &ContentFolderType) -> bool {
        matches!(
            folder_type,
            ContentFolderType::ProductionResource | ContentFolderType::TestResource
        )
    }

    pub fn excluded(folder_type: &ContentFolderType) -> bool {
        matches!(folder_type, ContentFolderType::Excluded)
    }
}

/// A typed folder inside a content entry
#[derive(Debug)]
pub struct ContentFolder {
    url: String,
    folder_type: ContentFolderType,
    properties: BTreeMap<String, String>,
    synthetic: bool,
    pointer: Option<VirtualFilePointer>,
}

/// A clone is a detached value: it holds no file pointer and needs no disposal.
impl Clone for ContentFolder {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            folder_type: self.folder_type.clone(),
            properties: self.properties.clone(),
            synthetic: self.synthetic,
            pointer: None,
        }
    }
}

impl ContentFolder {
    fn owned(
        url: &str,
        folder_type: ContentFolderType,
        properties: BTreeMap<String, String>,
        services: &ProjectServices,
    ) -> Self {
        let url = urls::trim_trailing_slash(url).to_string();
        Self {
            pointer: Some(services.pointers().create(&url)),
            url,
            folder_type,
            properties,
            synthetic: false,
        }
    }

    fn synthetic_excluded(url: &str) -> Self {
        Self {
            url: url.to_string(),
            folder_type: ContentFolderType::Excluded,
            properties: BTreeMap::new(),
            synthetic: true,
            pointer: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn folder_type(&self) -> &ContentFolderType {
        &self.folder_type
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.properties.insert(key.into(), value.into())
    }

    pub fn remove_property(&mut self, key: &str) -> Option<String> {
        self.properties.remove(key)
    }

    /// Whether the folder was contributed by an exclude policy rather than
    /// owned by the entry
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn file(&self, services: &ProjectServices) -> Option<VirtualFile> {
        services.file_system().find_file_by_url(&self.url)
    }

    fn dispose(&mut self) {
        if let Some(pointer) = self.pointer.as_mut() {
            pointer.release();
        }
    }

    fn is_disposed(&self) -> bool {
        self.pointer.as_ref().map_or(true, VirtualFilePointer::is_released)
    }

    fn compare(&self, other: &ContentFolder) -> Ordering {
        self.url
            .cmp(&other.url)
            .then_with(|| self.folder_type.id().cmp(other.folder_type.id()))
            .then_with(|| self.properties.cmp(&other.properties))
    }

    fn to_element(&self) -> FolderElement {
        FolderElement {
            url: self.url.clone(),
            folder_type: self.folder_type.id().to_string(),
            properties: self.properties.clone(),
        }
    }
}

#[derive(Debug)]
enum FolderSet {
    Explicit(Vec<ContentFolder>),
    Single,
}

/// A content root with its typed folders
#[derive(Debug)]
pub struct ContentEntry {
    url: String,
    pointer: VirtualFilePointer,
    folders: FolderSet,
    services: Arc<ProjectServices>,
    disposed: bool,
}

impl ContentEntry {
    pub(crate) fn new(url: &str, services: Arc<ProjectServices>) -> Self {
        Self::with_folders(url, services, FolderSet::Explicit(Vec::new()))
    }

    pub(crate) fn new_single(url: &str, services: Arc<ProjectServices>) -> Self {
        Self::with_folders(url, services, FolderSet::Single)
    }

    fn with_folders(url: &str, services: Arc<ProjectServices>, folders: FolderSet) -> Self {
        let url = urls::trim_trailing_slash(url).to_string();
        Self {
            pointer: services.pointers().create(&url),
            url,
            folders,
            services,
            disposed: false,
        }
    }

    /// Rebuild an entry from its persisted form.
    ///
    /// Folders outside the root are dropped with a warning; custom folder types
    /// the registry does not know are kept and reported as unknown features.
    pub(crate) fn from_element(
        element: &ContentElement,
        services: Arc<ProjectServices>,
        single: bool,
    ) -> Self {
        if single {
            return Self::new_single(&element.url, services);
        }
        let mut entry = Self::new(&element.url, services);
        for folder in &element.folders {
            let folder_type = ContentFolderType::from_id(&folder.folder_type);
            if !folder_type.is_builtin() && !entry.services.registry().is_known_folder_type(folder_type.id()) {
                entry
                    .services
                    .unknown_features()
                    .register(FOLDER_TYPE_EXTENSION_POINT, folder_type.id());
            }
            if let Err(e) =
                entry.add_folder_with_properties(&folder.url, folder_type, folder.properties.clone())
            {
                warn!("Skipping persisted folder {} of {}: {}", folder.url, entry.url, e);
            }
        }
        entry
    }

    pub(crate) fn to_element(&self) -> ContentElement {
        let folders = match &self.folders {
            FolderSet::Explicit(folders) => folders.iter().map(ContentFolder::to_element).collect(),
            FolderSet::Single => Vec::new(),
        };
        ContentElement {
            url: self.url.clone(),
            folders,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The root directory, if it currently exists
    pub fn file(&self) -> Option<VirtualFile> {
        self.pointer.file(self.services.file_system())
    }

    /// Whether this is the optimized variant without explicit folders
    pub fn is_single(&self) -> bool {
        matches!(self.folders, FolderSet::Single)
    }

    pub fn add_folder(&mut self, url: &str, folder_type: ContentFolderType) -> Result<&mut ContentFolder> {
        self.add_folder_with_properties(url, folder_type, BTreeMap::new())
    }

    /// Add a typed folder under this root.
    ///
    /// Adding a (url, type) pair that already exists returns the existing
    /// folder unchanged.
    pub fn add_folder_with_properties(
        &mut self,
        url: &str,
        folder_type: ContentFolderType,
        properties: BTreeMap<String, String>,
    ) -> Result<&mut ContentFolder> {
        self.check_disposed()?;
        if !urls::is_equal_or_ancestor(&self.url, url) {
            return Err(Error::FolderOutsideContentRoot {
                folder: url.to_string(),
                root: self.url.clone(),
            });
        }
        let url = urls::trim_trailing_slash(url);
        let services = Arc::clone(&self.services);
        let root = self.url.clone();
        let folders = match &mut self.folders {
            FolderSet::Explicit(folders) => folders,
            FolderSet::Single => {
                return Err(Error::UnsupportedOperation {
                    operation: format!("adding folder {} to single content entry {}", url, root),
                })
            }
        };

        let index = match folders
            .iter()
            .position(|f| f.url == url && f.folder_type == folder_type)
        {
            Some(existing) => existing,
            None => {
                let folder = ContentFolder::owned(url, folder_type, properties, &services);
                let insert_at = folders
                    .iter()
                    .position(|f| f.compare(&folder) == Ordering::Greater)
                    .unwrap_or(folders.len());
                folders.insert(insert_at, folder);
                insert_at
            }
        };
        Ok(&mut folders[index])
    }

    /// Remove an owned folder, releasing its file pointer.
    pub fn remove_folder(&mut self, url: &str, folder_type: &ContentFolderType) -> Result<()> {
        self.check_disposed()?;
        let url = urls::trim_trailing_slash(url);
        let not_owned = || Error::FolderNotOwned {
            folder: url.to_string(),
            root: self.url.clone(),
        };
        let folders = match &mut self.folders {
            FolderSet::Explicit(folders) => folders,
            FolderSet::Single => return Err(not_owned()),
        };
        match folders
            .iter()
            .position(|f| f.url == url && &f.folder_type == folder_type)
        {
            Some(index) => {
                let mut folder = folders.remove(index);
                folder.dispose();
                Ok(())
            }
            None => Err(not_owned()),
        }
    }

    pub fn folder(&self, url: &str, folder_type: &ContentFolderType) -> Option<&ContentFolder> {
        let url = urls::trim_trailing_slash(url);
        self.owned_folders()
            .iter()
            .find(|f| f.url == url && &f.folder_type == folder_type)
    }

    pub fn folder_mut(&mut self, url: &str, folder_type: &ContentFolderType) -> Option<&mut ContentFolder> {
        let url = urls::trim_trailing_slash(url);
        match &mut self.folders {
            FolderSet::Explicit(folders) => folders
                .iter_mut()
                .find(|f| f.url == url && &f.folder_type == folder_type),
            FolderSet::Single => None,
        }
    }

    /// Folders whose type matches the predicate, followed by synthetic
    /// excluded folders contributed by exclude policies.
    pub fn folders<P>(&self, predicate: P) -> Vec<Cow<'_, ContentFolder>>
    where
        P: Fn(&ContentFolderType) -> bool,
    {
        let mut result: Vec<Cow<'_, ContentFolder>> = self
            .owned_folders()
            .iter()
            .filter(|f| predicate(&f.folder_type))
            .map(Cow::Borrowed)
            .collect();

        if predicate(&ContentFolderType::Excluded) {
            for url in self.services.registry().excluded_root_urls() {
                let already_owned = self.owned_folders().iter().any(|f| {
                    f.folder_type == ContentFolderType::Excluded && f.url == urls::trim_trailing_slash(&url)
                });
                if !already_owned && urls::is_equal_or_ancestor(&self.url, &url) {
                    result.push(Cow::Owned(ContentFolder::synthetic_excluded(
                        urls::trim_trailing_slash(&url),
                    )));
                }
            }
        }
        result
    }

    pub fn folder_urls<P>(&self, predicate: P) -> Vec<String>
    where
        P: Fn(&ContentFolderType) -> bool,
    {
        self.folders(predicate)
            .into_iter()
            .map(|f| f.url.clone())
            .collect()
    }

    /// Folders matching the predicate that currently exist
    pub fn folder_files<P>(&self, predicate: P) -> Vec<VirtualFile>
    where
        P: Fn(&ContentFolderType) -> bool,
    {
        self.folders(predicate)
            .iter()
            .filter_map(|f| f.file(&self.services))
            .collect()
    }

    /// Deep copy bound to another layer's services
    pub(crate) fn clone_into(&self, services: Arc<ProjectServices>) -> ContentEntry {
        let folders = match &self.folders {
            FolderSet::Explicit(folders) => FolderSet::Explicit(
                folders
                    .iter()
                    .map(|f| ContentFolder::owned(&f.url, f.folder_type.clone(), f.properties.clone(), &services))
                    .collect(),
            ),
            FolderSet::Single => FolderSet::Single,
        };
        ContentEntry::with_folders(&self.url, services, folders)
    }

    /// Order by root URL, then lexicographically by folders
    pub fn compare(&self, other: &ContentEntry) -> Ordering {
        self.url.cmp(&other.url).then_with(|| {
            let mine = self.owned_folders();
            let theirs = other.owned_folders();
            for (a, b) in mine.iter().zip(theirs.iter()) {
                let ordering = a.compare(b);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            mine.len().cmp(&theirs.len())
        })
    }

    /// Release the root pointer and every folder pointer.
    pub fn dispose(&mut self) {
        if let FolderSet::Explicit(folders) = &mut self.folders {
            for folder in folders.iter_mut() {
                folder.dispose();
            }
        }
        self.pointer.release();
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed && self.pointer.is_released() && self.owned_folders().iter().all(ContentFolder::is_disposed)
    }

    fn owned_folders(&self) -> &[ContentFolder] {
        match &self.folders {
            FolderSet::Explicit(folders) => folders,
            FolderSet::Single => &[],
        }
    }

    fn check_disposed(&self) -> Result<()> {
        if self.disposed {
            Err(Error::disposed(format!("content entry {}", self.url)))
        } else {
            Ok(())
        }
    }
}
