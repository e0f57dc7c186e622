//! # Order Entries
//!
//! The order list of a layer is the module's ordered dependency list. Each
//! [`OrderEntry`] has a stable identity ([`EntryId`]), a position that the
//! owning layer re-indexes on every mutation, and one of a closed set of kinds:
//!
//! - the module's own sources (exactly one per layer),
//! - a library, referenced by level and name; `module` level libraries are
//!   owned by the layer itself,
//! - another module, referenced by name,
//! - the SDK of a module extension,
//! - a provider-defined custom entry.
//!
//! References to libraries, modules and SDKs may dangle. A dangling entry is
//! not an error: [`OrderEntry::is_valid`] reports `false` and it contributes
//! no URLs.
//!
//! Callers traverse the list with [`RootPolicy`], a visitor with one method
//! per kind, all defaulting to [`RootPolicy::visit_order_entry`].

pub mod custom;
pub mod library;
pub mod serialization;

use crate::layer::ModuleRootLayer;
use crate::root_model::RootModel;
use crate::vfs::{VirtualFile, VirtualFileSystem};
use custom::CustomOrderEntry;
use library::{Library, Sdk};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Kind of dependency an entry contributes to a classpath
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyScope {
    #[default]
    Compile,
    Runtime,
    Test,
    Provided,
}

impl DependencyScope {
    pub fn id(&self) -> &'static str {
        match self {
            DependencyScope::Compile => "COMPILE",
            DependencyScope::Runtime => "RUNTIME",
            DependencyScope::Test => "TEST",
            DependencyScope::Provided => "PROVIDED",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "COMPILE" => Some(DependencyScope::Compile),
            "RUNTIME" => Some(DependencyScope::Runtime),
            "TEST" => Some(DependencyScope::Test),
            "PROVIDED" => Some(DependencyScope::Provided),
            _ => None,
        }
    }

    pub fn is_for_production_compile(&self) -> bool {
        matches!(self, DependencyScope::Compile | DependencyScope::Provided)
    }

    pub fn is_for_production_runtime(&self) -> bool {
        matches!(self, DependencyScope::Compile | DependencyScope::Runtime)
    }

    pub fn is_for_test_compile(&self) -> bool {
        !matches!(self, DependencyScope::Runtime)
    }

    pub fn is_for_test_runtime(&self) -> bool {
        true
    }
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Kind of roots requested from an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderRootType {
    Classes,
    Sources,
    Documentation,
}

impl OrderRootType {
    pub fn id(&self) -> &'static str {
        match self {
            OrderRootType::Classes => "classes",
            OrderRootType::Sources => "sources",
            OrderRootType::Documentation => "documentation",
        }
    }
}

/// Stable identity of an order entry
///
/// Ids are unique per process. Copies made for another layer get fresh ids;
/// snapshots of the same layer share them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    fn next() -> EntryId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        EntryId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Discriminant of [`OrderEntryKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderEntryType {
    ModuleSource,
    Library,
    Module,
    ModuleExtensionWithSdk,
    Custom,
}

impl OrderEntryType {
    /// Persisted discriminator of built-in kinds
    pub fn id(&self) -> &'static str {
        match self {
            OrderEntryType::ModuleSource => serialization::MODULE_SOURCE,
            OrderEntryType::Library => serialization::LIBRARY,
            OrderEntryType::Module => serialization::MODULE,
            OrderEntryType::ModuleExtensionWithSdk => serialization::MODULE_EXTENSION_SDK,
            OrderEntryType::Custom => "custom",
        }
    }
}

/// A library dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryOrderEntry {
    pub name: String,
    pub level: String,
    pub exported: bool,
    pub scope: DependencyScope,
}

/// A dependency on another module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOrderEntry {
    pub module_name: String,
    pub exported: bool,
    pub scope: DependencyScope,
    /// Depend on the target's test sources as production code
    pub production_on_test: bool,
}

/// The SDK named by a module extension of the same layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleExtensionWithSdkOrderEntry {
    pub extension_id: String,
}

#[derive(Debug, Clone)]
pub enum OrderEntryKind {
    ModuleSource,
    Library(LibraryOrderEntry),
    Module(ModuleOrderEntry),
    ModuleExtensionWithSdk(ModuleExtensionWithSdkOrderEntry),
    Custom(CustomOrderEntry),
}

impl OrderEntryKind {
    pub fn library(library: &Library) -> Self {
        Self::library_named(library.name(), library.level())
    }

    pub fn library_named(name: &str, level: &str) -> Self {
        OrderEntryKind::Library(LibraryOrderEntry {
            name: name.to_string(),
            level: level.to_string(),
            exported: false,
            scope: DependencyScope::Compile,
        })
    }

    pub fn module(module_name: &str) -> Self {
        OrderEntryKind::Module(ModuleOrderEntry {
            module_name: module_name.to_string(),
            exported: false,
            scope: DependencyScope::Compile,
            production_on_test: false,
        })
    }

    pub fn module_extension_sdk(extension_id: &str) -> Self {
        OrderEntryKind::ModuleExtensionWithSdk(ModuleExtensionWithSdkOrderEntry {
            extension_id: extension_id.to_string(),
        })
    }

    pub fn entry_type(&self) -> OrderEntryType {
        match self {
            OrderEntryKind::ModuleSource => OrderEntryType::ModuleSource,
            OrderEntryKind::Library(_) => OrderEntryType::Library,
            OrderEntryKind::Module(_) => OrderEntryType::Module,
            OrderEntryKind::ModuleExtensionWithSdk(_) => OrderEntryType::ModuleExtensionWithSdk,
            OrderEntryKind::Custom(_) => OrderEntryType::Custom,
        }
    }
}

/// Resolves the references order entries make
pub trait RootsResolver {
    fn find_module(&self, name: &str) -> Option<&RootModel>;

    fn find_library(&self, level: &str, name: &str) -> Option<&Library>;

    fn find_sdk(&self, name: &str) -> Option<&Sdk>;

    fn file_system(&self) -> &dyn VirtualFileSystem;
}

/// Visitor over order entries, threading a value through the traversal
pub trait RootPolicy<R> {
    fn visit_order_entry(&mut self, _entry: &OrderEntry, value: R) -> R {
        value
    }

    fn visit_module_source(&mut self, entry: &OrderEntry, value: R) -> R {
        self.visit_order_entry(entry, value)
    }

    fn visit_library(&mut self, entry: &OrderEntry, _library: &LibraryOrderEntry, value: R) -> R {
        self.visit_order_entry(entry, value)
    }

    fn visit_module(&mut self, entry: &OrderEntry, _module: &ModuleOrderEntry, value: R) -> R {
        self.visit_order_entry(entry, value)
    }

    fn visit_module_extension_sdk(
        &mut self,
        entry: &OrderEntry,
        _sdk: &ModuleExtensionWithSdkOrderEntry,
        value: R,
    ) -> R {
        self.visit_order_entry(entry, value)
    }

    fn visit_custom(&mut self, entry: &OrderEntry, _custom: &CustomOrderEntry, value: R) -> R {
        self.visit_order_entry(entry, value)
    }
}

/// One entry of a layer's order list
///
/// `Clone` keeps the identity; use [`OrderEntry::clone_entry`] for a copy that
/// belongs to another layer.
#[derive(Debug, Clone)]
pub struct OrderEntry {
    id: EntryId,
    position: usize,
    kind: OrderEntryKind,
    disposed: bool,
}

impl OrderEntry {
    pub fn new(kind: OrderEntryKind) -> Self {
        Self {
            id: EntryId::next(),
            position: 0,
            kind,
            disposed: false,
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Index in the owning layer's order list
    pub fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    pub fn kind(&self) -> &OrderEntryKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut OrderEntryKind {
        &mut self.kind
    }

    pub fn entry_type(&self) -> OrderEntryType {
        self.kind.entry_type()
    }

    /// Persisted discriminator, the provider id for custom entries
    pub fn type_id(&self) -> &str {
        match &self.kind {
            OrderEntryKind::Custom(custom) => custom.type_id(),
            other => other.entry_type().id(),
        }
    }

    /// Whether the entry carries an export flag and a scope
    pub fn is_exportable(&self) -> bool {
        matches!(self.kind, OrderEntryKind::Library(_) | OrderEntryKind::Module(_))
    }

    pub fn is_exported(&self) -> bool {
        match &self.kind {
            OrderEntryKind::Library(library) => library.exported,
            OrderEntryKind::Module(module) => module.exported,
            _ => false,
        }
    }

    pub fn scope(&self) -> Option<DependencyScope> {
        match &self.kind {
            OrderEntryKind::Library(library) => Some(library.scope),
            OrderEntryKind::Module(module) => Some(module.scope),
            _ => None,
        }
    }

    /// Set the export flag; a no-op returning `false` for kinds without one.
    pub fn set_exported(&mut self, exported: bool) -> bool {
        match &mut self.kind {
            OrderEntryKind::Library(library) => library.exported = exported,
            OrderEntryKind::Module(module) => module.exported = exported,
            _ => return false,
        }
        true
    }

    /// Set the scope; a no-op returning `false` for kinds without one.
    pub fn set_scope(&mut self, scope: DependencyScope) -> bool {
        match &mut self.kind {
            OrderEntryKind::Library(library) => library.scope = scope,
            OrderEntryKind::Module(module) => module.scope = scope,
            _ => return false,
        }
        true
    }

    pub fn presentable_name(&self) -> String {
        match &self.kind {
            OrderEntryKind::ModuleSource => "<Module source>".to_string(),
            OrderEntryKind::Library(library) => library.name.clone(),
            OrderEntryKind::Module(module) => module.module_name.clone(),
            OrderEntryKind::ModuleExtensionWithSdk(sdk) => format!("<{} SDK>", sdk.extension_id),
            OrderEntryKind::Custom(custom) => custom.model().presentable_name(),
        }
    }

    /// Same kind and same referenced target
    pub fn is_equivalent_to(&self, other: &OrderEntry) -> bool {
        match (&self.kind, &other.kind) {
            (OrderEntryKind::ModuleSource, OrderEntryKind::ModuleSource) => true,
            (OrderEntryKind::Library(a), OrderEntryKind::Library(b)) => {
                a.name == b.name && a.level == b.level
            }
            (OrderEntryKind::Module(a), OrderEntryKind::Module(b)) => {
                a.module_name == b.module_name && a.production_on_test == b.production_on_test
            }
            (OrderEntryKind::ModuleExtensionWithSdk(a), OrderEntryKind::ModuleExtensionWithSdk(b)) => {
                a.extension_id == b.extension_id
            }
            (OrderEntryKind::Custom(a), OrderEntryKind::Custom(b)) => a.is_equivalent_to(b),
            _ => false,
        }
    }

    pub fn accept<R, P>(&self, policy: &mut P, value: R) -> R
    where
        P: RootPolicy<R> + ?Sized,
    {
        match &self.kind {
            OrderEntryKind::ModuleSource => policy.visit_module_source(self, value),
            OrderEntryKind::Library(library) => policy.visit_library(self, library, value),
            OrderEntryKind::Module(module) => policy.visit_module(self, module, value),
            OrderEntryKind::ModuleExtensionWithSdk(sdk) => {
                policy.visit_module_extension_sdk(self, sdk, value)
            }
            OrderEntryKind::Custom(custom) => policy.visit_custom(self, custom, value),
        }
    }

    /// Whether every reference of the entry currently resolves
    pub fn is_valid(&self, resolver: &dyn RootsResolver, layer: &ModuleRootLayer) -> bool {
        match &self.kind {
            OrderEntryKind::ModuleSource => true,
            OrderEntryKind::Library(library) => Self::resolve_library(library, resolver, layer).is_some(),
            OrderEntryKind::Module(module) => {
                let name = layer.accessor().module_name(&module.module_name);
                resolver.find_module(&name).is_some()
            }
            OrderEntryKind::ModuleExtensionWithSdk(sdk) => {
                Self::resolve_sdk(&sdk.extension_id, resolver, layer).is_some()
            }
            OrderEntryKind::Custom(custom) => custom.model().is_valid(resolver),
        }
    }

    /// URLs of the given root type this entry contributes
    pub fn urls(
        &self,
        root_type: OrderRootType,
        resolver: &dyn RootsResolver,
        layer: &ModuleRootLayer,
    ) -> Vec<String> {
        match &self.kind {
            OrderEntryKind::ModuleSource => match root_type {
                OrderRootType::Sources => layer.source_root_urls(true),
                _ => Vec::new(),
            },
            OrderEntryKind::Library(library) => Self::resolve_library(library, resolver, layer)
                .map(|l| l.urls(root_type).to_vec())
                .unwrap_or_default(),
            OrderEntryKind::Module(module) => {
                if root_type != OrderRootType::Sources {
                    return Vec::new();
                }
                let name = layer.accessor().module_name(&module.module_name);
                resolver
                    .find_module(&name)
                    .and_then(|model| model.current_layer().ok())
                    .map(|target| target.source_root_urls(module.production_on_test))
                    .unwrap_or_default()
            }
            OrderEntryKind::ModuleExtensionWithSdk(sdk) => {
                Self::resolve_sdk(&sdk.extension_id, resolver, layer)
                    .map(|s| s.urls(root_type).to_vec())
                    .unwrap_or_default()
            }
            OrderEntryKind::Custom(custom) => custom.model().urls(root_type, resolver),
        }
    }

    /// Contributed roots that currently exist
    pub fn files(
        &self,
        root_type: OrderRootType,
        resolver: &dyn RootsResolver,
        layer: &ModuleRootLayer,
    ) -> Vec<VirtualFile> {
        self.urls(root_type, resolver, layer)
            .iter()
            .filter_map(|url| resolver.file_system().find_file_by_url(url))
            .collect()
    }

    /// A copy with a fresh identity, for another layer
    pub fn clone_entry(&self) -> OrderEntry {
        OrderEntry::new(self.kind.clone())
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub(crate) fn dispose(&mut self) {
        if let OrderEntryKind::Custom(custom) = &mut self.kind {
            custom.model_mut().dispose();
        }
        self.disposed = true;
    }

    fn resolve_library<'r>(
        library: &LibraryOrderEntry,
        resolver: &'r dyn RootsResolver,
        layer: &'r ModuleRootLayer,
    ) -> Option<&'r Library> {
        if library.level == library::MODULE_LEVEL {
            layer.module_library_table().get(&library.name)
        } else {
            resolver.find_library(&library.level, &library.name)
        }
    }

    fn resolve_sdk<'r>(
        extension_id: &str,
        resolver: &'r dyn RootsResolver,
        layer: &ModuleRootLayer,
    ) -> Option<&'r Sdk> {
        layer
            .extension(extension_id)
            .and_then(|extension| extension.sdk_name())
            .and_then(|name| resolver.find_sdk(name))
    }
}

/// Collects the names of modules the order list depends on
#[derive(Debug, Default)]
pub struct CollectDependentModules {
    /// Keep only dependencies visible to production code
    pub production_only: bool,
}

impl RootPolicy<Vec<String>> for CollectDependentModules {
    fn visit_module(&mut self, _entry: &OrderEntry, module: &ModuleOrderEntry, mut names: Vec<String>) -> Vec<String> {
        let visible = !self.production_only
            || module.scope.is_for_production_compile()
            || module.scope.is_for_production_runtime();
        if visible && !names.contains(&module.module_name) {
            names.push(module.module_name.clone());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_ids_are_unique() {
        let a = OrderEntry::new(OrderEntryKind::ModuleSource);
        let b = OrderEntry::new(OrderEntryKind::ModuleSource);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
        assert_ne!(a.clone_entry().id(), a.id());
    }

    #[test]
    fn test_export_and_scope_only_on_exportable_kinds() {
        let mut library = OrderEntry::new(OrderEntryKind::library_named("junit", "project"));
        assert!(library.set_exported(true));
        assert!(library.set_scope(DependencyScope::Test));
        assert!(library.is_exported());
        assert_eq!(library.scope(), Some(DependencyScope::Test));

        let mut source = OrderEntry::new(OrderEntryKind::ModuleSource);
        assert!(!source.set_exported(true));
        assert!(!source.is_exported());
        assert_eq!(source.scope(), None);
    }

    #[test]
    fn test_equivalence_ignores_flags() {
        let mut a = OrderEntry::new(OrderEntryKind::module("core"));
        let b = OrderEntry::new(OrderEntryKind::module("core"));
        a.set_exported(true);
        assert!(a.is_equivalent_to(&b));
        assert!(!a.is_equivalent_to(&OrderEntry::new(OrderEntryKind::module("util"))));
        assert!(!a.is_equivalent_to(&OrderEntry::new(OrderEntryKind::library_named("core", "project"))));
    }

    #[test]
    fn test_scope_visibility() {
        assert!(DependencyScope::Provided.is_for_production_compile());
        assert!(!DependencyScope::Provided.is_for_production_runtime());
        assert!(!DependencyScope::Runtime.is_for_test_compile());
        assert!(!DependencyScope::Test.is_for_production_compile());
        assert_eq!(DependencyScope::from_id("TEST"), Some(DependencyScope::Test));
        assert_eq!(DependencyScope::from_id("test"), None);
    }

    struct CountKinds;

    impl RootPolicy<(usize, usize)> for CountKinds {
        fn visit_library(&mut self, _entry: &OrderEntry, _library: &LibraryOrderEntry, value: (usize, usize)) -> (usize, usize) {
            (value.0 + 1, value.1)
        }

        fn visit_order_entry(&mut self, _entry: &OrderEntry, value: (usize, usize)) -> (usize, usize) {
            (value.0, value.1 + 1)
        }
    }

    #[test]
    fn test_policy_dispatch_falls_back_to_visit_order_entry() {
        let entries = [
            OrderEntry::new(OrderEntryKind::ModuleSource),
            OrderEntry::new(OrderEntryKind::library_named("junit", "project")),
            OrderEntry::new(OrderEntryKind::module("core")),
        ];
        let mut policy = CountKinds;
        let counts = entries
            .iter()
            .fold((0, 0), |value, entry| entry.accept(&mut policy, value));
        assert_eq!(counts, (1, 2));
    }

    #[test]
    fn test_collect_dependent_modules() {
        let mut test_only = OrderEntry::new(OrderEntryKind::module("fixtures"));
        test_only.set_scope(DependencyScope::Test);
        let entries = [
            OrderEntry::new(OrderEntryKind::module("core")),
            test_only,
            OrderEntry::new(OrderEntryKind::module("core")),
        ];

        let mut all = CollectDependentModules::default();
        let names = entries.iter().fold(Vec::new(), |v, e| e.accept(&mut all, v));
        assert_eq!(names, vec!["core", "fixtures"]);

        let mut production = CollectDependentModules { production_only: true };
        let names = entries.iter().fold(Vec::new(), |v, e| e.accept(&mut production, v));
        assert_eq!(names, vec!["core"]);
    }
}
