//! # Extension Registry
//!
//! The registry is the project's view of what plug-ins contribute: module
//! extension providers, custom content folder types, custom order entry types
//! and exclude policies. Ids are kept in sorted maps so that every iteration
//! over providers is deterministic.

use crate::extension::ModuleExtensionProvider;
use crate::order::custom::CustomOrderEntryTypeProvider;
use crate::urls;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Contributes directories to exclude from every content entry that contains
/// them.
pub trait DirectoryIndexExcludePolicy: Send + Sync {
    fn excluded_root_urls(&self) -> Vec<String>;
}

/// Exclude policy over a fixed list of URLs
#[derive(Debug, Clone, Default)]
pub struct StaticExcludePolicy {
    urls: Vec<String>,
}

impl StaticExcludePolicy {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }
}

impl DirectoryIndexExcludePolicy for StaticExcludePolicy {
    fn excluded_root_urls(&self) -> Vec<String> {
        self.urls.clone()
    }
}

#[derive(Default)]
pub struct ExtensionRegistry {
    extension_providers: BTreeMap<String, Arc<dyn ModuleExtensionProvider>>,
    folder_types: BTreeSet<String>,
    order_entry_types: BTreeMap<String, Arc<dyn CustomOrderEntryTypeProvider>>,
    exclude_policies: Vec<Arc<dyn DirectoryIndexExcludePolicy>>,
}

impl fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("extension_providers", &self.extension_providers.keys().collect::<Vec<_>>())
            .field("folder_types", &self.folder_types)
            .field("order_entry_types", &self.order_entry_types.keys().collect::<Vec<_>>())
            .field("exclude_policies", &self.exclude_policies.len())
            .finish()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module extension provider, replacing any provider with the
    /// same id.
    pub fn register_extension_provider<P>(&mut self, provider: P) -> &mut Self
    where
        P: ModuleExtensionProvider + 'static,
    {
        self.extension_providers
            .insert(provider.id().to_string(), Arc::new(provider));
        self
    }

    pub fn register_folder_type(&mut self, id: impl Into<String>) -> &mut Self {
        self.folder_types.insert(id.into());
        self
    }

    pub fn register_order_entry_type<P>(&mut self, provider: P) -> &mut Self
    where
        P: CustomOrderEntryTypeProvider + 'static,
    {
        self.order_entry_types
            .insert(provider.id().to_string(), Arc::new(provider));
        self
    }

    pub fn register_exclude_policy<P>(&mut self, policy: P) -> &mut Self
    where
        P: DirectoryIndexExcludePolicy + 'static,
    {
        self.exclude_policies.push(Arc::new(policy));
        self
    }

    pub fn extension_provider(&self, id: &str) -> Option<&Arc<dyn ModuleExtensionProvider>> {
        self.extension_providers.get(id)
    }

    /// Providers in id order
    pub fn extension_providers(&self) -> impl Iterator<Item = &Arc<dyn ModuleExtensionProvider>> {
        self.extension_providers.values()
    }

    pub fn is_known_folder_type(&self, id: &str) -> bool {
        self.folder_types.contains(id)
    }

    pub fn folder_types(&self) -> impl Iterator<Item = &str> {
        self.folder_types.iter().map(String::as_str)
    }

    pub fn order_entry_type(&self, id: &str) -> Option<&Arc<dyn CustomOrderEntryTypeProvider>> {
        self.order_entry_types.get(id)
    }

    pub fn exclude_policies(&self) -> &[Arc<dyn DirectoryIndexExcludePolicy>] {
        &self.exclude_policies
    }

    /// Union of all policies' excluded roots, normalized and deduplicated
    pub fn excluded_root_urls(&self) -> Vec<String> {
        let urls: BTreeSet<String> = self
            .exclude_policies
            .iter()
            .flat_map(|policy| policy.excluded_root_urls())
            .map(|url| urls::trim_trailing_slash(&url).to_string())
            .collect();
        urls.into_iter().collect()
    }
}
