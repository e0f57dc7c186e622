//! Libraries and SDKs referenced by order entries

use super::OrderRootType;
use std::collections::BTreeMap;

/// Level of the project-wide library table
pub const PROJECT_LEVEL: &str = "project";
/// Level of the application-wide library table
pub const APPLICATION_LEVEL: &str = "application";
/// Level of the libraries a layer owns itself
pub const MODULE_LEVEL: &str = "module";

/// A named set of roots per root type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    name: String,
    level: String,
    roots: BTreeMap<OrderRootType, Vec<String>>,
}

impl Library {
    pub fn new(name: &str, level: &str) -> Self {
        Self {
            name: name.to_string(),
            level: level.to_string(),
            roots: BTreeMap::new(),
        }
    }

    pub fn with_root(mut self, root_type: OrderRootType, url: &str) -> Self {
        self.add_root(root_type, url);
        self
    }

    pub fn add_root(&mut self, root_type: OrderRootType, url: &str) {
        self.roots.entry(root_type).or_default().push(url.to_string());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn urls(&self, root_type: OrderRootType) -> &[String] {
        self.roots.get(&root_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn roots(&self) -> &BTreeMap<OrderRootType, Vec<String>> {
        &self.roots
    }
}

/// Libraries of one level, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryTable {
    level: String,
    libraries: BTreeMap<String, Library>,
}

impl LibraryTable {
    pub fn new(level: &str) -> Self {
        Self {
            level: level.to_string(),
            libraries: BTreeMap::new(),
        }
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    /// Add a library, moving it to this table's level. Returns the library it
    /// replaced, if any.
    pub fn add(&mut self, mut library: Library) -> Option<Library> {
        library.level = self.level.clone();
        self.libraries.insert(library.name.clone(), library)
    }

    pub fn remove(&mut self, name: &str) -> Option<Library> {
        self.libraries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Library> {
        self.libraries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Library> {
        self.libraries.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.libraries.contains_key(name)
    }

    pub fn clear(&mut self) {
        self.libraries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Library> {
        self.libraries.values()
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}

/// A named SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sdk {
    name: String,
    kind: String,
    roots: BTreeMap<OrderRootType, Vec<String>>,
}

impl Sdk {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            roots: BTreeMap::new(),
        }
    }

    pub fn with_root(mut self, root_type: OrderRootType, url: &str) -> Self {
        self.roots.entry(root_type).or_default().push(url.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn urls(&self, root_type: OrderRootType) -> &[String] {
        self.roots.get(&root_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn roots(&self) -> &BTreeMap<OrderRootType, Vec<String>> {
        &self.roots
    }
}

#[derive(Debug, Clone, Default)]
pub struct SdkTable {
    sdks: BTreeMap<String, Sdk>,
}

impl SdkTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sdk: Sdk) -> Option<Sdk> {
        self.sdks.insert(sdk.name.clone(), sdk)
    }

    pub fn remove(&mut self, name: &str) -> Option<Sdk> {
        self.sdks.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Sdk> {
        self.sdks.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sdk> {
        self.sdks.values()
    }

    pub fn len(&self) -> usize {
        self.sdks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sdks.is_empty()
    }
}
