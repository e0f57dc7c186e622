//! # Module Root Layer
//!
//! A layer is one named configuration of a module: its content entries, its
//! order list, the libraries it owns, and the state of every registered
//! module extension. A root model holds one or more layers and designates one
//! of them as current.
//!
//! ## Invariants
//!
//! - Content entries are keyed and ordered by root URL; URLs are unique.
//! - Order entry identities are unique and positions match list indices.
//! - Exactly one module-source order entry exists.
//!
//! Operations that would break an invariant return an error, log it, and
//! leave the layer unchanged.
//!
//! ## Lifecycle
//!
//! Layers of a baseline model hold immutable extensions and are only changed
//! through [`ModuleRootLayer::copy_to`] and [`ModuleRootLayer::load_state`].
//! Writability of everything else is enforced by the owning root model, which
//! hands out `&mut ModuleRootLayer` only for writable copies.

use crate::config::{ExtensionElement, LayerChild, OrderEntryElement};
use crate::content::{scopes, ContentEntry, ContentFolder, ContentFolderType};
use crate::error::{Error, Result};
use crate::extension::{self, ModuleExtension};
use crate::module::ModuleInfo;
use crate::order::custom::{CustomOrderEntry, CustomOrderEntryModel};
use crate::order::library::{Library, LibraryTable, MODULE_LEVEL};
use crate::order::serialization;
use crate::order::{
    CollectDependentModules, EntryId, LibraryOrderEntry, OrderEntry, OrderEntryKind, OrderEntryType,
    RootPolicy, RootsResolver,
};
use crate::progress::{self, ProgressIndicator};
use crate::root_model::RootConfigurationAccessor;
use crate::services::ProjectServices;
use crate::urls;
use crate::vfs::VirtualFile;
use log::{debug, error, warn};
use serde_yaml::Mapping;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// The order list with a lazily built shared snapshot
#[derive(Debug, Default)]
struct Order {
    entries: Vec<OrderEntry>,
    snapshot: OnceLock<Arc<[OrderEntry]>>,
}

impl Order {
    fn entries(&self) -> &[OrderEntry] {
        &self.entries
    }

    fn snapshot(&self) -> Arc<[OrderEntry]> {
        Arc::clone(self.snapshot.get_or_init(|| self.entries.iter().cloned().collect()))
    }

    fn index_of(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == id)
    }

    fn get_mut(&mut self, id: EntryId) -> Option<&mut OrderEntry> {
        self.invalidate();
        self.entries.iter_mut().find(|e| e.id() == id)
    }

    fn push(&mut self, entry: OrderEntry) {
        let index = self.entries.len();
        self.insert(index, entry);
    }

    fn insert(&mut self, index: usize, entry: OrderEntry) {
        self.entries.insert(index, entry);
        self.reindex(index);
    }

    fn remove(&mut self, index: usize) -> OrderEntry {
        let entry = self.entries.remove(index);
        self.reindex(index);
        entry
    }

    fn take_all(&mut self) -> Vec<OrderEntry> {
        self.invalidate();
        std::mem::take(&mut self.entries)
    }

    /// Reorder by a validated permutation of the current ids
    fn rearrange(&mut self, ids: &[EntryId]) {
        let mut by_id: HashMap<EntryId, OrderEntry> =
            self.take_all().into_iter().map(|e| (e.id(), e)).collect();
        self.entries = ids.iter().filter_map(|id| by_id.remove(id)).collect();
        self.reindex(0);
    }

    fn reindex(&mut self, from: usize) {
        for (index, entry) in self.entries.iter_mut().enumerate().skip(from) {
            entry.set_position(index);
        }
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.snapshot.take();
    }
}

/// Children parsed by `load_state` before they replace the current ones
struct Staged {
    extensions: BTreeMap<String, ModuleExtension>,
    unknown_extensions: Vec<ExtensionElement>,
    unknown_blocks: Vec<Mapping>,
    content: BTreeMap<String, ContentEntry>,
    order: Vec<OrderEntry>,
    module_libraries: LibraryTable,
}

pub struct ModuleRootLayer {
    module: ModuleInfo,
    content: BTreeMap<String, ContentEntry>,
    order: Order,
    /// Libraries referenced by `module` level library entries
    module_libraries: LibraryTable,
    extensions: BTreeMap<String, ModuleExtension>,
    unknown_extensions: Vec<ExtensionElement>,
    /// Blocks under keys no loader understands, in persisted order
    unknown_blocks: Vec<Mapping>,
    services: Arc<ProjectServices>,
    accessor: Arc<dyn RootConfigurationAccessor>,
    /// Whether extensions are created mutable
    writable: bool,
    disposed: bool,
}

impl fmt::Debug for ModuleRootLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRootLayer")
            .field("module", &self.module.name)
            .field("content", &self.content.keys().collect::<Vec<_>>())
            .field("order", &self.order.entries)
            .field("module_libraries", &self.module_libraries.len())
            .field("extensions", &self.extensions)
            .field("unknown_extensions", &self.unknown_extensions.len())
            .field("unknown_blocks", &self.unknown_blocks.len())
            .field("writable", &self.writable)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl ModuleRootLayer {
    /// An initialized layer: a module-source entry and one fresh extension per
    /// registered provider.
    pub(crate) fn new(
        module: ModuleInfo,
        services: Arc<ProjectServices>,
        accessor: Arc<dyn RootConfigurationAccessor>,
        writable: bool,
    ) -> Self {
        let mut layer = Self {
            module,
            content: BTreeMap::new(),
            order: Order::default(),
            module_libraries: LibraryTable::new(MODULE_LEVEL),
            extensions: BTreeMap::new(),
            unknown_extensions: Vec::new(),
            unknown_blocks: Vec::new(),
            services,
            accessor,
            writable,
            disposed: false,
        };
        layer.init();
        layer
    }

    /// A deep copy of `original`. Order entries get fresh identities, content
    /// entries fresh file pointers, extensions the requested mutability.
    pub(crate) fn from_original(
        original: &ModuleRootLayer,
        accessor: Arc<dyn RootConfigurationAccessor>,
        writable: bool,
    ) -> Self {
        let mut layer = Self {
            module: original.module.clone(),
            content: BTreeMap::new(),
            order: Order::default(),
            module_libraries: original.module_libraries.clone(),
            extensions: BTreeMap::new(),
            unknown_extensions: original.unknown_extensions.clone(),
            unknown_blocks: original.unknown_blocks.clone(),
            services: Arc::clone(&original.services),
            accessor,
            writable,
            disposed: false,
        };
        layer.extensions = layer.fresh_extensions(Some(original));
        layer.set_content_entries_from(original);
        layer.set_order_entries_from(original);
        layer
    }

    /// Reset the order list to a single module-source entry and recreate all
    /// extensions. Content entries are kept; module libraries go with their
    /// entries.
    pub fn init(&mut self) {
        self.remove_all_order_entries();
        self.module_libraries.clear();
        self.remove_all_extensions();
        self.order.push(OrderEntry::new(OrderEntryKind::ModuleSource));
        self.extensions = self.fresh_extensions(None);
    }

    pub fn module_name(&self) -> &str {
        &self.module.name
    }

    pub fn module_dir_url(&self) -> Option<&str> {
        self.module.dir_url.as_deref()
    }

    pub fn services(&self) -> &Arc<ProjectServices> {
        &self.services
    }

    pub fn accessor(&self) -> &dyn RootConfigurationAccessor {
        self.accessor.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    ////// PERSISTENCE //////

    /// Replace the layer's state with persisted children.
    ///
    /// Cancellation is checked every [`progress::CANCELLATION_CHECK_INTERVAL`]
    /// children. On error the layer keeps its previous state.
    pub fn load_state(
        &mut self,
        children: &[LayerChild],
        progress: Option<&dyn ProgressIndicator>,
    ) -> Result<()> {
        self.check_alive()?;
        let mut staged = Staged {
            extensions: self.fresh_extensions(None),
            unknown_extensions: Vec::new(),
            unknown_blocks: Vec::new(),
            content: BTreeMap::new(),
            order: Vec::new(),
            module_libraries: LibraryTable::new(MODULE_LEVEL),
        };
        if let Err(e) = self.load_children(children, progress, &mut staged) {
            for entry in staged.content.values_mut() {
                entry.dispose();
            }
            return Err(e);
        }
        if !staged
            .order
            .iter()
            .any(|e| e.entry_type() == OrderEntryType::ModuleSource)
        {
            staged.order.push(OrderEntry::new(OrderEntryKind::ModuleSource));
        }

        self.remove_all_content_entries();
        self.remove_all_order_entries();
        self.remove_all_extensions();
        self.extensions = staged.extensions;
        self.unknown_extensions = staged.unknown_extensions;
        self.unknown_blocks = staged.unknown_blocks;
        self.module_libraries = staged.module_libraries;
        self.content = staged.content;
        for entry in staged.order {
            self.order.push(entry);
        }
        Ok(())
    }

    fn load_children(
        &self,
        children: &[LayerChild],
        progress: Option<&dyn ProgressIndicator>,
        staged: &mut Staged,
    ) -> Result<()> {
        for (index, child) in children.iter().enumerate() {
            progress::checkpoint(progress, index + 1)?;
            match child {
                LayerChild::Extension { extension } => self.load_extension(extension, staged)?,
                LayerChild::Content { content } => {
                    let key = urls::trim_trailing_slash(&content.url).to_string();
                    if staged.content.contains_key(&key) {
                        warn!(
                            "Module '{}': duplicate content entry {} ignored",
                            self.module.name, key
                        );
                        continue;
                    }
                    let single = self.module.dir_url.is_none() && content.folders.is_empty();
                    let entry = ContentEntry::from_element(content, Arc::clone(&self.services), single);
                    staged.content.insert(key, entry);
                }
                LayerChild::OrderEntry { order_entry } => {
                    let kind = match serialization::load_order_entry(order_entry, &self.services)? {
                        Some(kind) => kind,
                        None => continue,
                    };
                    if let OrderEntryKind::Library(library) = &kind {
                        if library.level == MODULE_LEVEL
                            && !self.load_module_library(order_entry, library, staged)?
                        {
                            continue;
                        }
                    }
                    if matches!(kind, OrderEntryKind::ModuleSource)
                        && staged
                            .order
                            .iter()
                            .any(|e| e.entry_type() == OrderEntryType::ModuleSource)
                    {
                        debug!(
                            "Module '{}': extra module-source entry dropped",
                            self.module.name
                        );
                        continue;
                    }
                    staged.order.push(OrderEntry::new(kind));
                }
                LayerChild::Unknown(mapping) => {
                    if let Err(e) = LayerChild::check_unknown_block(mapping) {
                        return Err(self.violation(e));
                    }
                    let keys: Vec<&str> = mapping.keys().filter_map(|k| k.as_str()).collect();
                    warn!(
                        "Module '{}': unrecognized layer block {:?} kept as-is",
                        self.module.name, keys
                    );
                    staged.unknown_blocks.push(mapping.clone());
                }
            }
        }
        Ok(())
    }

    /// Stage the library a `module` level entry carries. Returns `false` when
    /// the entry repeats a library name and must be dropped.
    fn load_module_library(
        &self,
        element: &OrderEntryElement,
        entry: &LibraryOrderEntry,
        staged: &mut Staged,
    ) -> Result<bool> {
        let library = match serialization::load_module_library(element, entry)? {
            Some(library) => library,
            None => return Ok(true),
        };
        if staged.module_libraries.contains(library.name()) {
            warn!(
                "Module '{}': duplicate module library '{}' ignored",
                self.module.name,
                library.name()
            );
            return Ok(false);
        }
        staged.module_libraries.add(library);
        Ok(true)
    }

    fn load_extension(&self, element: &ExtensionElement, staged: &mut Staged) -> Result<()> {
        match element.id().and_then(|id| staged.extensions.get_mut(id)) {
            Some(known) => known.load_state(element),
            None => {
                let id = element.id().unwrap_or("<missing id>");
                warn!(
                    "Module '{}': extension '{}' has no provider, keeping it as-is",
                    self.module.name, id
                );
                self.services
                    .unknown_features()
                    .register(extension::EXTENSION_POINT, id);
                staged.unknown_extensions.push(element.clone());
                Ok(())
            }
        }
    }

    /// Persisted children: extension blocks sorted by id, unknown blocks as
    /// loaded, content entries in URL order, order entries by position.
    pub fn write_state(&self) -> Vec<LayerChild> {
        let mut extensions: Vec<ExtensionElement> = self
            .extensions
            .values()
            .filter_map(ModuleExtension::state)
            .chain(self.unknown_extensions.iter().cloned())
            .collect();
        extensions.sort_by(|a, b| a.id().cmp(&b.id()));

        let mut children: Vec<LayerChild> = extensions
            .into_iter()
            .map(|extension| LayerChild::Extension { extension })
            .collect();
        children.extend(self.unknown_blocks.iter().cloned().map(LayerChild::Unknown));
        children.extend(self.content.values().map(|entry| LayerChild::Content {
            content: entry.to_element(),
        }));
        children.extend(self.order.entries().iter().map(|entry| LayerChild::OrderEntry {
            order_entry: self.store_order_entry(entry),
        }));
        children
    }

    fn store_order_entry(&self, entry: &OrderEntry) -> OrderEntryElement {
        let element = serialization::store_order_entry(entry);
        match self.owned_library(entry) {
            Some(library) => serialization::store_module_library(element, library),
            None => element,
        }
    }

    pub fn unknown_extensions(&self) -> &[ExtensionElement] {
        &self.unknown_extensions
    }

    pub fn unknown_blocks(&self) -> &[Mapping] {
        &self.unknown_blocks
    }

    ////// CONTENT //////

    /// Add a content root, or return the existing one with the same URL.
    pub fn add_content_entry(&mut self, url: &str) -> Result<&mut ContentEntry> {
        self.insert_content_entry(url, ContentEntry::new)
    }

    /// Add an optimized content root that never carries explicit folders.
    pub fn add_single_content_entry(&mut self, url: &str) -> Result<&mut ContentEntry> {
        self.insert_content_entry(url, ContentEntry::new_single)
    }

    fn insert_content_entry(
        &mut self,
        url: &str,
        create: fn(&str, Arc<ProjectServices>) -> ContentEntry,
    ) -> Result<&mut ContentEntry> {
        self.check_alive()?;
        let key = urls::trim_trailing_slash(url).to_string();
        let services = Arc::clone(&self.services);
        Ok(self
            .content
            .entry(key)
            .or_insert_with_key(|key| create(key, services)))
    }

    pub fn remove_content_entry(&mut self, url: &str) -> Result<()> {
        self.check_alive()?;
        match self.content.remove(urls::trim_trailing_slash(url)) {
            Some(mut entry) => {
                entry.dispose();
                check_child_disposed(entry.is_disposed(), || format!("content entry {}", url));
                Ok(())
            }
            None => Err(self.violation(Error::EntryNotFound {
                entry: format!("content entry {}", url),
            })),
        }
    }

    pub fn content_entry(&self, url: &str) -> Option<&ContentEntry> {
        self.content.get(urls::trim_trailing_slash(url))
    }

    pub fn content_entry_mut(&mut self, url: &str) -> Option<&mut ContentEntry> {
        self.content.get_mut(urls::trim_trailing_slash(url))
    }

    /// Content entries in URL order
    pub fn content_entries(&self) -> impl Iterator<Item = &ContentEntry> {
        self.content.values()
    }

    pub fn content_root_urls(&self) -> Vec<String> {
        self.content.keys().cloned().collect()
    }

    /// Content roots that currently exist
    pub fn content_roots(&self) -> Vec<VirtualFile> {
        self.content.values().filter_map(ContentEntry::file).collect()
    }

    pub fn content_folders<P>(&self, predicate: P) -> Vec<Cow<'_, ContentFolder>>
    where
        P: Fn(&ContentFolderType) -> bool,
    {
        self.content
            .values()
            .flat_map(|entry| entry.folders(&predicate))
            .collect()
    }

    pub fn content_folder_urls<P>(&self, predicate: P) -> Vec<String>
    where
        P: Fn(&ContentFolderType) -> bool,
    {
        self.content
            .values()
            .flat_map(|entry| entry.folder_urls(&predicate))
            .collect()
    }

    pub fn content_folder_files<P>(&self, predicate: P) -> Vec<VirtualFile>
    where
        P: Fn(&ContentFolderType) -> bool,
    {
        self.content
            .values()
            .flat_map(|entry| entry.folder_files(&predicate))
            .collect()
    }

    /// Production source folder URLs, plus test folders when `include_tests`
    pub fn source_root_urls(&self, include_tests: bool) -> Vec<String> {
        if include_tests {
            self.content_folder_urls(scopes::production_and_test)
        } else {
            self.content_folder_urls(scopes::production)
        }
    }

    pub fn source_roots(&self, include_tests: bool) -> Vec<VirtualFile> {
        if include_tests {
            self.content_folder_files(scopes::production_and_test)
        } else {
            self.content_folder_files(scopes::production)
        }
    }

    pub fn exclude_root_urls(&self) -> Vec<String> {
        self.content_folder_urls(scopes::excluded)
    }

    pub fn exclude_roots(&self) -> Vec<VirtualFile> {
        self.content_folder_files(scopes::excluded)
    }

    ////// ORDER //////

    /// Append an entry built by the caller.
    pub fn add_order_entry(&mut self, entry: OrderEntry) -> Result<EntryId> {
        self.check_alive()?;
        if self.order.index_of(entry.id()).is_some() {
            return Err(self.violation(Error::DuplicateEntry {
                entry: format!("order entry {}", entry.id()),
            }));
        }
        self.check_insertable(entry.kind())?;
        let id = entry.id();
        self.order.push(entry);
        Ok(id)
    }

    pub fn add_library_entry(&mut self, library: &Library) -> Result<EntryId> {
        self.add_order_entry(OrderEntry::new(OrderEntryKind::library(library)))
    }

    /// Add a library owned by this layer together with the entry referencing
    /// it. The library is moved to the `module` level.
    pub fn add_module_library(&mut self, library: Library) -> Result<EntryId> {
        self.check_alive()?;
        if self.module_libraries.contains(library.name()) {
            return Err(self.violation(Error::DuplicateEntry {
                entry: format!("module library {}", library.name()),
            }));
        }
        let id = self.add_order_entry(OrderEntry::new(OrderEntryKind::library_named(
            library.name(),
            MODULE_LEVEL,
        )))?;
        self.module_libraries.add(library);
        Ok(id)
    }

    /// Libraries this layer owns
    pub fn module_library_table(&self) -> &LibraryTable {
        &self.module_libraries
    }

    pub fn module_library_mut(&mut self, name: &str) -> Option<&mut Library> {
        self.module_libraries.get_mut(name)
    }

    fn owned_library(&self, entry: &OrderEntry) -> Option<&Library> {
        match entry.kind() {
            OrderEntryKind::Library(library) if library.level == MODULE_LEVEL => {
                self.module_libraries.get(&library.name)
            }
            _ => None,
        }
    }

    /// Drop the module library a removed entry referenced.
    fn forget_module_library(&mut self, entry: &OrderEntry) {
        if let OrderEntryKind::Library(library) = entry.kind() {
            if library.level == MODULE_LEVEL {
                self.module_libraries.remove(&library.name);
            }
        }
    }

    /// Add a reference to a library that need not exist.
    pub fn add_invalid_library(&mut self, name: &str, level: &str) -> Result<EntryId> {
        self.add_order_entry(OrderEntry::new(OrderEntryKind::library_named(name, level)))
    }

    pub fn add_module_entry(&mut self, module_name: &str) -> Result<EntryId> {
        self.add_order_entry(OrderEntry::new(OrderEntryKind::module(module_name)))
    }

    /// Add the SDK entry of an extension: after the last SDK entry, else
    /// right before the module source, else first.
    pub fn add_module_extension_sdk_entry(&mut self, extension_id: &str) -> Result<EntryId> {
        self.check_alive()?;
        let kind = OrderEntryKind::module_extension_sdk(extension_id);
        self.check_insertable(&kind)?;
        let entries = self.order.entries();
        let index = match entries
            .iter()
            .rposition(|e| e.entry_type() == OrderEntryType::ModuleExtensionWithSdk)
        {
            Some(last_sdk) => last_sdk + 1,
            None => entries
                .iter()
                .position(|e| e.entry_type() == OrderEntryType::ModuleSource)
                .unwrap_or(0),
        };
        let entry = OrderEntry::new(kind);
        let id = entry.id();
        self.order.insert(index, entry);
        Ok(id)
    }

    pub fn add_custom_order_entry(
        &mut self,
        type_id: &str,
        model: Box<dyn CustomOrderEntryModel>,
    ) -> Result<EntryId> {
        self.add_order_entry(OrderEntry::new(OrderEntryKind::Custom(CustomOrderEntry::new(
            type_id, model,
        ))))
    }

    pub fn remove_order_entry(&mut self, id: EntryId) -> Result<()> {
        self.check_alive()?;
        let index = match self.order.index_of(id) {
            Some(index) => index,
            None => {
                return Err(self.violation(Error::EntryNotFound {
                    entry: format!("order entry {}", id),
                }))
            }
        };
        if self.order.entries()[index].entry_type() == OrderEntryType::ModuleSource {
            return Err(self.violation(Error::UnsupportedOperation {
                operation: "removing the module-source entry".to_string(),
            }));
        }
        let mut entry = self.order.remove(index);
        self.forget_module_library(&entry);
        entry.dispose();
        check_child_disposed(entry.is_disposed(), || format!("order entry {}", id));
        Ok(())
    }

    /// Reorder the entries. `new_order` must be a permutation of the current
    /// entry ids.
    pub fn rearrange_order_entries(&mut self, new_order: &[EntryId]) -> Result<()> {
        self.check_alive()?;
        if let Err(e) = self.check_valid_rearrangement(new_order) {
            return Err(self.violation(e));
        }
        self.order.rearrange(new_order);
        Ok(())
    }

    fn check_valid_rearrangement(&self, new_order: &[EntryId]) -> Result<()> {
        let current = self.order.entries();
        if current.len() != new_order.len() {
            return Err(Error::InvalidRearrangement {
                message: format!(
                    "Size mismatch: old size={}; new size={}",
                    current.len(),
                    new_order.len()
                ),
            });
        }
        let mut seen = HashSet::new();
        for id in new_order {
            if !current.iter().any(|e| e.id() == *id) {
                return Err(Error::InvalidRearrangement {
                    message: format!("Trying to add nonexisting order entry {}", id),
                });
            }
            if !seen.insert(*id) {
                return Err(Error::InvalidRearrangement {
                    message: format!("Trying to add duplicate order entry {}", id),
                });
            }
        }
        Ok(())
    }

    /// Replace the first entry of `entry_type` in place, or insert the
    /// replacement first when there is none. `None` removes the entry.
    ///
    /// The module-source entry cannot be replaced.
    pub fn replace_entry_of_type(
        &mut self,
        entry_type: OrderEntryType,
        replacement: Option<OrderEntryKind>,
    ) -> Result<Option<EntryId>> {
        self.check_alive()?;
        let replaces_source = entry_type == OrderEntryType::ModuleSource
            || matches!(replacement, Some(OrderEntryKind::ModuleSource));
        if replaces_source {
            return Err(self.violation(Error::UnsupportedOperation {
                operation: "replacing the module-source entry".to_string(),
            }));
        }
        if let Some(kind) = &replacement {
            self.check_insertable(kind)?;
        }

        let existing = self
            .order
            .entries()
            .iter()
            .position(|e| e.entry_type() == entry_type);
        let index = match existing {
            Some(index) => {
                let mut removed = self.order.remove(index);
                self.forget_module_library(&removed);
                removed.dispose();
                index
            }
            None => 0,
        };
        Ok(replacement.map(|kind| {
            let entry = OrderEntry::new(kind);
            let id = entry.id();
            self.order.insert(index, entry);
            id
        }))
    }

    fn check_insertable(&self, kind: &OrderEntryKind) -> Result<()> {
        let error = match kind {
            OrderEntryKind::ModuleSource
                if self
                    .order
                    .entries()
                    .iter()
                    .any(|e| e.entry_type() == OrderEntryType::ModuleSource) =>
            {
                Some(Error::DuplicateEntry {
                    entry: "module-source entry".to_string(),
                })
            }
            OrderEntryKind::Module(module)
                if self.accessor.module_name(&module.module_name) == self.module.name =>
            {
                Some(Error::SelfDependency {
                    module: self.module.name.clone(),
                })
            }
            OrderEntryKind::ModuleExtensionWithSdk(sdk)
                if !self.extensions.contains_key(&sdk.extension_id) =>
            {
                Some(Error::UnknownExtension {
                    id: sdk.extension_id.clone(),
                })
            }
            OrderEntryKind::Custom(custom)
                if self.services.registry().order_entry_type(custom.type_id()).is_none() =>
            {
                Some(Error::UnknownOrderEntryType {
                    type_id: custom.type_id().to_string(),
                })
            }
            _ => None,
        };
        match error {
            Some(e) => Err(self.violation(e)),
            None => Ok(()),
        }
    }

    pub fn order_entry(&self, id: EntryId) -> Option<&OrderEntry> {
        self.order.entries().iter().find(|e| e.id() == id)
    }

    /// Mutable access to one entry; invalidates the shared snapshot.
    pub fn order_entry_mut(&mut self, id: EntryId) -> Option<&mut OrderEntry> {
        self.order.get_mut(id)
    }

    /// Entries in position order
    pub fn order_entries(&self) -> &[OrderEntry] {
        self.order.entries()
    }

    /// A shared immutable copy of the order list, rebuilt after mutations
    pub fn order_snapshot(&self) -> Arc<[OrderEntry]> {
        self.order.snapshot()
    }

    pub fn find_library_order_entry(&self, name: &str, level: &str) -> Option<&OrderEntry> {
        self.order.entries().iter().find(|e| match e.kind() {
            OrderEntryKind::Library(library) => library.name == name && library.level == level,
            _ => false,
        })
    }

    pub fn find_module_order_entry(&self, module_name: &str) -> Option<&OrderEntry> {
        self.order.entries().iter().find(|e| match e.kind() {
            OrderEntryKind::Module(module) => module.module_name == module_name,
            _ => false,
        })
    }

    pub fn find_module_extension_sdk_entry(&self, extension_id: &str) -> Option<&OrderEntry> {
        self.order.entries().iter().find(|e| match e.kind() {
            OrderEntryKind::ModuleExtensionWithSdk(sdk) => sdk.extension_id == extension_id,
            _ => false,
        })
    }

    /// Run a policy over the entries in order
    pub fn process_order<R, P>(&self, policy: &mut P, initial: R) -> R
    where
        P: RootPolicy<R> + ?Sized,
    {
        self.order
            .entries()
            .iter()
            .fold(initial, |value, entry| entry.accept(policy, value))
    }

    /// Names of all modules referenced by module order entries
    pub fn dependency_module_names(&self) -> Vec<String> {
        self.process_order(&mut CollectDependentModules::default(), Vec::new())
    }

    /// Referenced modules, restricted to production-visible scopes unless
    /// `include_tests`
    pub fn module_dependencies(&self, include_tests: bool) -> Vec<String> {
        let mut policy = CollectDependentModules {
            production_only: !include_tests,
        };
        self.process_order(&mut policy, Vec::new())
    }

    /// Entries whose references do not resolve
    pub fn invalid_order_entries(&self, resolver: &dyn RootsResolver) -> Vec<&OrderEntry> {
        self.order
            .entries()
            .iter()
            .filter(|entry| !entry.is_valid(resolver, self))
            .collect()
    }

    /// Point module order entries at renamed modules. Returns the number of
    /// entries changed.
    pub(crate) fn rename_module_references(&mut self, renames: &HashMap<String, String>) -> usize {
        let mut renamed = 0;
        for entry in &mut self.order.entries {
            if let OrderEntryKind::Module(module) = entry.kind_mut() {
                if let Some(new_name) = renames.get(&module.module_name) {
                    module.module_name = new_name.clone();
                    renamed += 1;
                }
            }
        }
        if renamed > 0 {
            self.order.invalidate();
        }
        renamed
    }

    /// Store module references under the current names the layer's accessor
    /// resolves them to, then resolve names as written from now on.
    pub(crate) fn resolve_module_references(
        &mut self,
        accessor: Arc<dyn RootConfigurationAccessor>,
    ) -> usize {
        let mut resolved = 0;
        for entry in &mut self.order.entries {
            if let OrderEntryKind::Module(module) = entry.kind_mut() {
                let current = self.accessor.module_name(&module.module_name);
                if current != module.module_name {
                    debug!(
                        "Module '{}': reference '{}' stored as '{}'",
                        self.module.name, module.module_name, current
                    );
                    module.module_name = current;
                    resolved += 1;
                }
            }
        }
        if resolved > 0 {
            self.order.invalidate();
        }
        self.accessor = accessor;
        resolved
    }

    pub(crate) fn set_module_name(&mut self, name: &str) {
        self.module.name = name.to_string();
    }

    ////// EXTENSIONS //////

    /// Enabled extensions in id order
    pub fn extensions(&self) -> Vec<&ModuleExtension> {
        self.extensions.values().filter(|e| e.is_enabled()).collect()
    }

    /// The extension with this id, if enabled
    pub fn extension(&self, id: &str) -> Option<&ModuleExtension> {
        self.extensions.get(id).filter(|e| e.is_enabled())
    }

    pub fn extension_without_check(&self, id: &str) -> Option<&ModuleExtension> {
        self.extensions.get(id)
    }

    pub fn extension_mut(&mut self, id: &str) -> Option<&mut ModuleExtension> {
        self.extensions.get_mut(id)
    }

    fn fresh_extensions(&self, original: Option<&ModuleRootLayer>) -> BTreeMap<String, ModuleExtension> {
        let mut extensions = BTreeMap::new();
        for provider in self.services.registry().extension_providers() {
            let mut extension = provider.create_extension(self.writable);
            if let Some(original) = original {
                match original.extensions.get(provider.id()) {
                    Some(source) => extension.commit(source),
                    None => debug!(
                        "Module '{}': no '{}' extension to copy",
                        self.module.name,
                        provider.id()
                    ),
                }
            }
            extensions.insert(provider.id().to_string(), extension);
        }
        extensions
    }

    ////// COMPARISON AND COPY //////

    /// Whether any extension, order entry or content entry differs from
    /// `other`
    pub fn is_changed(&self, other: &ModuleRootLayer) -> bool {
        self.are_extensions_changed(other)
            || self.are_order_entries_changed(other)
            || self.module_libraries != other.module_libraries
            || self.are_content_entries_changed(other)
    }

    fn are_extensions_changed(&self, other: &ModuleRootLayer) -> bool {
        self.extensions.len() != other.extensions.len()
            || self.extensions.iter().any(|(id, extension)| {
                other
                    .extensions
                    .get(id)
                    .map_or(true, |original| extension.is_modified(original))
            })
    }

    fn are_order_entries_changed(&self, other: &ModuleRootLayer) -> bool {
        let mine = self.order.entries();
        let theirs = other.order.entries();
        mine.len() != theirs.len()
            || mine
                .iter()
                .zip(theirs.iter())
                .any(|(a, b)| !order_entries_equal(a, b))
    }

    fn are_content_entries_changed(&self, other: &ModuleRootLayer) -> bool {
        self.content.len() != other.content.len()
            || self
                .content
                .values()
                .zip(other.content.values())
                .any(|(a, b)| a.compare(b) != Ordering::Equal)
    }

    /// Merge this layer into `target`: modified extensions are committed one
    /// by one, order and content entries are replaced wholesale only when they
    /// differ, unknown extension and layer blocks are carried over.
    pub fn copy_to(&self, target: &mut ModuleRootLayer) -> Result<()> {
        self.check_alive()?;
        target.check_alive()?;
        for (id, extension) in &self.extensions {
            match target.extensions.get_mut(id) {
                Some(original) => {
                    if extension.is_modified(original) {
                        original.commit(extension);
                    }
                }
                None => {
                    let copy = extension.with_mutability(target.writable);
                    target.extensions.insert(id.clone(), copy);
                }
            }
        }
        if self.are_order_entries_changed(target) {
            target.set_order_entries_from(self);
        }
        if self.module_libraries != target.module_libraries {
            target.module_libraries = self.module_libraries.clone();
        }
        if self.are_content_entries_changed(target) {
            target.set_content_entries_from(self);
        }
        target.unknown_extensions = self.unknown_extensions.clone();
        target.unknown_blocks = self.unknown_blocks.clone();
        Ok(())
    }

    fn set_order_entries_from(&mut self, source: &ModuleRootLayer) {
        self.remove_all_order_entries();
        for entry in source.order.entries() {
            self.order.push(entry.clone_entry());
        }
    }

    fn set_content_entries_from(&mut self, source: &ModuleRootLayer) {
        self.remove_all_content_entries();
        for (url, entry) in &source.content {
            self.content
                .insert(url.clone(), entry.clone_into(Arc::clone(&self.services)));
        }
    }

    ////// DISPOSAL //////

    fn remove_all_content_entries(&mut self) {
        for (url, mut entry) in std::mem::take(&mut self.content) {
            entry.dispose();
            check_child_disposed(entry.is_disposed(), || format!("content entry {}", url));
        }
    }

    fn remove_all_order_entries(&mut self) {
        for mut entry in self.order.take_all() {
            entry.dispose();
            check_child_disposed(entry.is_disposed(), || format!("order entry {}", entry.id()));
        }
    }

    fn remove_all_extensions(&mut self) {
        self.extensions.clear();
    }

    /// Dispose every child and the layer itself.
    pub fn dispose(&mut self) {
        self.remove_all_content_entries();
        self.remove_all_order_entries();
        self.remove_all_extensions();
        self.unknown_extensions.clear();
        self.unknown_blocks.clear();
        self.module_libraries.clear();
        self.disposed = true;
    }

    fn check_alive(&self) -> Result<()> {
        if self.disposed {
            Err(self.violation(Error::disposed(format!("layer of module {}", self.module.name))))
        } else {
            Ok(())
        }
    }

    fn violation(&self, error: Error) -> Error {
        error!("Module '{}': {}", self.module.name, error);
        error
    }
}

/// Same kind, export flag, scope and referenced target
fn order_entries_equal(a: &OrderEntry, b: &OrderEntry) -> bool {
    a.entry_type() == b.entry_type()
        && a.is_exported() == b.is_exported()
        && a.scope() == b.scope()
        && a.is_equivalent_to(b)
}

fn check_child_disposed(disposed: bool, what: impl FnOnce() -> String) {
    if !disposed {
        error!("{} did not report disposal", what());
        debug_assert!(disposed, "child not disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::SimpleExtensionProvider;
    use crate::order::custom::{UrlListEntryType, UrlListModel};
    use crate::order::{DependencyScope, OrderRootType};
    use crate::registry::ExtensionRegistry;
    use crate::root_model::DefaultAccessor;

    fn services() -> Arc<ProjectServices> {
        let mut registry = ExtensionRegistry::new();
        registry
            .register_extension_provider(SimpleExtensionProvider::new("java").with_sdk(true))
            .register_extension_provider(SimpleExtensionProvider::new("kotlin").with_sdk(true))
            .register_order_entry_type(UrlListEntryType::new("url-list"));
        ProjectServices::in_memory(Arc::new(registry))
    }

    fn layer() -> ModuleRootLayer {
        ModuleRootLayer::new(
            ModuleInfo::new("app", Some("file:///work/app")),
            services(),
            Arc::new(DefaultAccessor),
            true,
        )
    }

    fn types(layer: &ModuleRootLayer) -> Vec<&str> {
        layer.order_entries().iter().map(OrderEntry::type_id).collect()
    }

    #[test]
    fn test_init_leaves_only_module_source() {
        let mut layer = layer();
        layer.add_invalid_library("junit", "project").unwrap();
        layer.init();
        assert_eq!(types(&layer), vec!["module-source"]);
        assert_eq!(layer.extensions().len(), 0);
        assert!(layer.extension_without_check("java").is_some());
    }

    #[test]
    fn test_add_content_entry_is_idempotent() {
        let mut layer = layer();
        layer
            .add_content_entry("file:///work/app")
            .unwrap()
            .add_folder("file:///work/app/src", ContentFolderType::Production)
            .unwrap();
        let again = layer.add_content_entry("file:///work/app/").unwrap();
        assert_eq!(again.folders(scopes::all).len(), 1);
        assert_eq!(layer.content_root_urls(), vec!["file:///work/app"]);
    }

    #[test]
    fn test_remove_missing_content_entry_fails() {
        let mut layer = layer();
        let result = layer.remove_content_entry("file:///work/app");
        assert!(matches!(result, Err(Error::EntryNotFound { .. })));
    }

    #[test]
    fn test_source_and_exclude_roots() {
        let mut layer = layer();
        let entry = layer.add_content_entry("file:///work/app").unwrap();
        entry
            .add_folder("file:///work/app/src", ContentFolderType::Production)
            .unwrap();
        entry
            .add_folder("file:///work/app/test", ContentFolderType::Test)
            .unwrap();
        entry
            .add_folder("file:///work/app/out", ContentFolderType::Excluded)
            .unwrap();

        assert_eq!(layer.source_root_urls(false), vec!["file:///work/app/src"]);
        assert_eq!(layer.source_root_urls(true).len(), 2);
        assert_eq!(layer.exclude_root_urls(), vec!["file:///work/app/out"]);
    }

    #[test]
    fn test_sdk_insertion_rule() {
        let mut layer = layer();
        layer.add_invalid_library("junit", "project").unwrap();
        layer.add_module_extension_sdk_entry("java").unwrap();
        assert_eq!(types(&layer), vec!["module-extension-sdk", "module-source", "library"]);

        layer.add_module_extension_sdk_entry("kotlin").unwrap();
        let sdks: Vec<String> = layer
            .order_entries()
            .iter()
            .take(2)
            .map(OrderEntry::presentable_name)
            .collect();
        assert_eq!(sdks, vec!["<java SDK>", "<kotlin SDK>"]);
        let positions: Vec<usize> = layer.order_entries().iter().map(OrderEntry::position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_sdk_entry_requires_extension() {
        let mut layer = layer();
        let result = layer.add_module_extension_sdk_entry("scala");
        assert!(matches!(result, Err(Error::UnknownExtension { .. })));
        assert_eq!(layer.order_entries().len(), 1);
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut layer = layer();
        assert!(matches!(
            layer.add_module_entry("app"),
            Err(Error::SelfDependency { .. })
        ));
        assert!(layer.add_module_entry("core").is_ok());
    }

    #[test]
    fn test_custom_entry_requires_registered_type() {
        let mut layer = layer();
        let model = UrlListModel {
            name: "generated".to_string(),
            classes: Vec::new(),
            sources: Vec::new(),
        };
        assert!(matches!(
            layer.add_custom_order_entry("gradle", Box::new(model.clone())),
            Err(Error::UnknownOrderEntryType { .. })
        ));
        layer.add_custom_order_entry("url-list", Box::new(model)).unwrap();
        assert_eq!(types(&layer), vec!["module-source", "url-list"]);
    }

    #[test]
    fn test_rearrange_requires_permutation() {
        let mut layer = layer();
        let source = layer.order_entries()[0].id();
        let junit = layer.add_invalid_library("junit", "project").unwrap();

        let err = layer.rearrange_order_entries(&[junit]).unwrap_err();
        assert!(format!("{}", err).contains("Size mismatch: old size=2; new size=1"));
        let err = layer.rearrange_order_entries(&[junit, junit]).unwrap_err();
        assert!(format!("{}", err).contains("duplicate"));
        let foreign = OrderEntry::new(OrderEntryKind::ModuleSource).id();
        let err = layer.rearrange_order_entries(&[junit, foreign]).unwrap_err();
        assert!(format!("{}", err).contains("nonexisting"));
        assert_eq!(types(&layer), vec!["module-source", "library"]);

        layer.rearrange_order_entries(&[junit, source]).unwrap();
        assert_eq!(types(&layer), vec!["library", "module-source"]);
        assert_eq!(layer.order_entries()[1].position(), 1);
    }

    #[test]
    fn test_replace_entry_of_type() {
        let mut layer = layer();
        layer.add_invalid_library("junit", "project").unwrap();
        let id = layer
            .replace_entry_of_type(
                OrderEntryType::Library,
                Some(OrderEntryKind::library_named("testng", "project")),
            )
            .unwrap()
            .unwrap();
        assert_eq!(layer.order_entry(id).unwrap().position(), 1);
        assert!(layer.find_library_order_entry("junit", "project").is_none());

        layer
            .replace_entry_of_type(OrderEntryType::Module, Some(OrderEntryKind::module("core")))
            .unwrap();
        assert_eq!(types(&layer), vec!["module", "module-source", "library"]);

        assert!(layer
            .replace_entry_of_type(OrderEntryType::ModuleSource, None)
            .is_err());
        layer.replace_entry_of_type(OrderEntryType::Library, None).unwrap();
        assert_eq!(types(&layer), vec!["module", "module-source"]);
    }

    #[test]
    fn test_module_source_cannot_be_removed_or_duplicated() {
        let mut layer = layer();
        let source = layer.order_entries()[0].id();
        assert!(layer.remove_order_entry(source).is_err());
        assert!(matches!(
            layer.add_order_entry(OrderEntry::new(OrderEntryKind::ModuleSource)),
            Err(Error::DuplicateEntry { .. })
        ));
    }

    #[test]
    fn test_snapshot_is_invalidated_on_mutation() {
        let mut layer = layer();
        let before = layer.order_snapshot();
        assert!(Arc::ptr_eq(&before, &layer.order_snapshot()));

        let junit = layer.add_invalid_library("junit", "project").unwrap();
        let after = layer.order_snapshot();
        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);

        layer
            .order_entry_mut(junit)
            .unwrap()
            .set_scope(DependencyScope::Test);
        assert_eq!(layer.order_snapshot()[1].scope(), Some(DependencyScope::Test));
        assert_eq!(after[1].scope(), Some(DependencyScope::Compile));
    }

    #[test]
    fn test_module_dependencies_by_scope() {
        let mut layer = layer();
        layer.add_module_entry("core").unwrap();
        let fixtures = layer.add_module_entry("fixtures").unwrap();
        layer
            .order_entry_mut(fixtures)
            .unwrap()
            .set_scope(DependencyScope::Test);

        assert_eq!(layer.dependency_module_names(), vec!["core", "fixtures"]);
        assert_eq!(layer.module_dependencies(false), vec!["core"]);
        assert_eq!(layer.module_dependencies(true).len(), 2);
    }

    #[test]
    fn test_is_changed_and_copy_to() {
        let services = services();
        let module = ModuleInfo::new("app", Some("file:///work/app"));
        let mut baseline = ModuleRootLayer::new(module, services, Arc::new(DefaultAccessor), false);
        let mut copy = ModuleRootLayer::from_original(&baseline, Arc::new(DefaultAccessor), true);
        assert!(!copy.is_changed(&baseline));

        copy.extension_mut("java").unwrap().set_enabled(true).unwrap();
        copy.add_content_entry("file:///work/app").unwrap();
        copy.add_module_entry("core").unwrap();
        assert!(copy.is_changed(&baseline));

        copy.copy_to(&mut baseline).unwrap();
        assert!(!copy.is_changed(&baseline));
        assert!(baseline.extension("java").is_some());
        assert!(!baseline.extension("java").unwrap().is_mutable());
        assert_ne!(baseline.order_entries()[1].id(), copy.order_entries()[1].id());
    }

    #[test]
    fn test_copy_to_keeps_identities_when_order_unchanged() {
        let services = services();
        let module = ModuleInfo::new("app", None);
        let mut baseline = ModuleRootLayer::new(module, services, Arc::new(DefaultAccessor), false);
        let source_id = baseline.order_entries()[0].id();
        let mut copy = ModuleRootLayer::from_original(&baseline, Arc::new(DefaultAccessor), true);
        copy.add_content_entry("file:///work/app").unwrap();

        copy.copy_to(&mut baseline).unwrap();
        assert_eq!(baseline.order_entries()[0].id(), source_id);
        assert_eq!(baseline.content_root_urls(), vec!["file:///work/app"]);
    }

    #[test]
    fn test_state_round_trip() {
        let mut layer = layer();
        layer.extension_mut("java").unwrap().set_enabled(true).unwrap();
        layer
            .extension_mut("java")
            .unwrap()
            .set_sdk_name(Some("jdk-17"))
            .unwrap();
        layer
            .add_content_entry("file:///work/app")
            .unwrap()
            .add_folder("file:///work/app/src", ContentFolderType::Production)
            .unwrap();
        layer.add_module_extension_sdk_entry("java").unwrap();
        layer.add_module_entry("core").unwrap();

        let children = layer.write_state();
        let mut loaded = ModuleRootLayer::new(
            ModuleInfo::new("app", Some("file:///work/app")),
            Arc::clone(layer.services()),
            Arc::new(DefaultAccessor),
            false,
        );
        loaded.load_state(&children, None).unwrap();
        assert!(!loaded.is_changed(&layer));
        assert_eq!(loaded.write_state(), children);
    }

    #[test]
    fn test_load_state_appends_missing_module_source() {
        let mut layer = layer();
        let children: Vec<LayerChild> = serde_yaml::from_str(
            "[{ order-entry: { type: library, name: junit } }, { order-entry: { type: module-source } }, { order-entry: { type: module-source } }]",
        )
        .unwrap();
        layer.load_state(&children, None).unwrap();
        assert_eq!(types(&layer), vec!["library", "module-source"]);

        let without_source: Vec<LayerChild> =
            serde_yaml::from_str("[{ order-entry: { type: module, name: core } }]").unwrap();
        layer.load_state(&without_source, None).unwrap();
        assert_eq!(types(&layer), vec!["module", "module-source"]);
    }

    #[test]
    fn test_load_state_single_entry_without_module_dir() {
        let mut layer = ModuleRootLayer::new(
            ModuleInfo::new("lib", None),
            services(),
            Arc::new(DefaultAccessor),
            true,
        );
        let children: Vec<LayerChild> =
            serde_yaml::from_str("[{ content: { url: file:///work/lib } }]").unwrap();
        layer.load_state(&children, None).unwrap();
        assert!(layer.content_entry("file:///work/lib").unwrap().is_single());
    }

    #[test]
    fn test_failed_load_keeps_previous_state() {
        let mut layer = layer();
        layer.add_module_entry("core").unwrap();
        let children: Vec<LayerChild> = serde_yaml::from_str(
            "[{ content: { url: file:///work/app } }, { order-entry: { type: library } }]",
        )
        .unwrap();
        assert!(layer.load_state(&children, None).is_err());
        assert!(layer.find_module_order_entry("core").is_some());
        assert!(layer.content_entries().next().is_none());
        assert_eq!(layer.services().pointers().live_pointer_count(), 0);
    }

    #[test]
    fn test_module_library_is_owned_by_the_layer() {
        let mut owner = layer();
        let gson = Library::new("gson", "project")
            .with_root(OrderRootType::Classes, "jar:///libs/gson.jar!/");
        owner.add_module_library(gson.clone()).unwrap();
        assert_eq!(
            owner.module_library_table().get("gson").unwrap().level(),
            MODULE_LEVEL
        );
        assert!(matches!(
            owner.add_module_library(gson),
            Err(Error::DuplicateEntry { .. })
        ));
        assert_eq!(types(&owner), vec!["module-source", "library"]);

        let mut copy = ModuleRootLayer::from_original(&owner, Arc::new(DefaultAccessor), true);
        assert!(!copy.is_changed(&owner));
        copy.module_library_mut("gson")
            .unwrap()
            .add_root(OrderRootType::Sources, "jar:///libs/gson-sources.jar!/");
        assert!(copy.is_changed(&owner));
        assert!(owner
            .module_library_table()
            .get("gson")
            .unwrap()
            .urls(OrderRootType::Sources)
            .is_empty());

        let mut loaded = layer();
        loaded.load_state(&copy.write_state(), None).unwrap();
        assert!(!loaded.is_changed(&copy));

        copy.copy_to(&mut owner).unwrap();
        assert_eq!(
            owner.module_library_table().get("gson").unwrap().urls(OrderRootType::Sources).len(),
            1
        );

        let id = copy.find_library_order_entry("gson", MODULE_LEVEL).unwrap().id();
        copy.remove_order_entry(id).unwrap();
        assert!(copy.module_library_table().is_empty());
    }

    #[test]
    fn test_module_library_entry_without_roots_dangles() {
        let mut owner = layer();
        let children: Vec<LayerChild> = serde_yaml::from_str(
            "[{ order-entry: { type: library, name: gson, level: module } }, \
              { order-entry: { type: library, name: guava, level: module, roots: {} } }, \
              { order-entry: { type: library, name: guava, level: module, roots: {} } }]",
        )
        .unwrap();
        owner.load_state(&children, None).unwrap();
        assert_eq!(types(&owner), vec!["library", "library", "module-source"]);
        assert!(!owner.module_library_table().contains("gson"));
        assert!(owner.module_library_table().contains("guava"));

        let mut reloaded = layer();
        reloaded.load_state(&owner.write_state(), None).unwrap();
        assert!(reloaded.module_library_table().contains("guava"));
        assert_eq!(reloaded.write_state(), owner.write_state());
    }

    #[test]
    fn test_unknown_block_survives_load_and_copy() {
        let mut layer = layer();
        let children: Vec<LayerChild> = serde_yaml::from_str(
            "[{ facet: { id: spring } }, { content: { url: file:///work/app } }]",
        )
        .unwrap();
        layer.load_state(&children, None).unwrap();
        assert_eq!(layer.unknown_blocks().len(), 1);
        assert_eq!(layer.content_root_urls(), vec!["file:///work/app"]);

        let copy = ModuleRootLayer::from_original(&layer, Arc::new(DefaultAccessor), true);
        let written = copy.write_state();
        assert!(matches!(&written[0], LayerChild::Unknown(mapping) if mapping.contains_key("facet")));
        assert_eq!(written.len(), 3);
    }

    #[test]
    fn test_malformed_content_block_fails_load() {
        let mut layer = layer();
        layer.add_module_entry("core").unwrap();
        let children: Vec<LayerChild> = serde_yaml::from_str(
            "[{ content: { url: file:///work/app, folders: [{ url: file:///work/app/src }] } }]",
        )
        .unwrap();
        assert!(matches!(
            layer.load_state(&children, None),
            Err(Error::ConfigParse { .. })
        ));
        assert!(layer.find_module_order_entry("core").is_some());
        assert!(layer.content_entries().next().is_none());
    }

    #[test]
    fn test_dispose_releases_everything() {
        let mut layer = layer();
        layer
            .add_content_entry("file:///work/app")
            .unwrap()
            .add_folder("file:///work/app/src", ContentFolderType::Production)
            .unwrap();
        layer.dispose();
        assert!(layer.is_disposed());
        assert_eq!(layer.services().pointers().live_pointer_count(), 0);
        assert!(matches!(
            layer.add_module_entry("core"),
            Err(Error::Disposed { .. })
        ));
    }
}
