//! # Modules and the Module Manager
//!
//! A [`Module`] owns a [`ModuleRootManager`], which in turn owns the module's
//! baseline [`RootModel`]. The [`ModuleManager`] holds the committed modules of
//! a project; structural changes (new, disposed and renamed modules) are staged
//! in a [`ModifiableModuleModel`] and applied by the committer as one roots
//! change that listeners observe once.

use crate::commit::ordering::{DependencyGraph, TopologicalOrder};
use crate::config::RootModelElement;
use crate::error::{Error, Result};
use crate::progress::ProgressIndicator;
use crate::root_model::{RootConfigurationAccessor, RootModel};
use crate::services::ProjectServices;
use log::{debug, error};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Identity of a module as seen by its layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    /// URL of the module directory, if the module has one
    pub dir_url: Option<String>,
}

impl ModuleInfo {
    pub fn new(name: &str, dir_url: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            dir_url: dir_url.map(str::to_string),
        }
    }
}

/// Owner of a module's baseline root model
#[derive(Debug)]
pub struct ModuleRootManager {
    model: RootModel,
}

impl ModuleRootManager {
    pub fn new(module: ModuleInfo, services: Arc<ProjectServices>) -> Self {
        Self {
            model: RootModel::new(module, services),
        }
    }

    /// The committed, read-only root model
    pub fn root_model(&self) -> &RootModel {
        &self.model
    }

    pub fn modifiable_model(&self) -> Result<RootModel> {
        self.model.modifiable()
    }

    pub fn modifiable_model_with_accessor(
        &self,
        accessor: Arc<dyn RootConfigurationAccessor>,
    ) -> Result<RootModel> {
        self.model.modifiable_with_accessor(accessor)
    }

    /// Commit a writable copy into the baseline, or just dispose it when it
    /// changes nothing. Returns whether the baseline changed.
    ///
    /// Prefer the committer when other modules change too: this does not
    /// order commits by dependencies.
    pub fn commit(&mut self, model: &mut RootModel) -> Result<bool> {
        if model.module_name() != self.model.module_name() {
            let e = Error::Invariant {
                message: format!(
                    "root model of '{}' committed into module '{}'",
                    model.module_name(),
                    self.model.module_name()
                ),
            };
            error!("{}", e);
            return Err(e);
        }
        if model.is_disposed() {
            return Err(Error::AlreadyCommitted {
                module: model.module_name().to_string(),
            });
        }
        if model.is_changed(&self.model) {
            model.do_commit_and_dispose(&mut self.model)?;
            Ok(true)
        } else {
            debug!("Module '{}': nothing to commit", model.module_name());
            model.dispose()?;
            Ok(false)
        }
    }

    pub fn load_state(
        &mut self,
        element: &RootModelElement,
        progress: Option<&dyn ProgressIndicator>,
    ) -> Result<()> {
        self.model.load_state(element, progress)
    }

    pub fn state(&self) -> RootModelElement {
        self.model.state()
    }

    pub fn dependency_module_names(&self) -> Vec<String> {
        self.model.dependency_module_names()
    }

    fn set_module_name(&mut self, name: &str) {
        self.model.set_module_name(name);
    }

    fn rename_module_references(&mut self, renames: &HashMap<String, String>) -> usize {
        self.model.rename_module_references(renames)
    }

    fn dispose(&mut self) {
        if let Err(e) = self.model.dispose() {
            debug!("Module '{}': {}", self.model.module_name(), e);
        }
    }
}

#[derive(Debug)]
pub struct Module {
    name: String,
    dir_url: Option<String>,
    root_manager: ModuleRootManager,
}

impl Module {
    pub fn new(info: ModuleInfo, services: Arc<ProjectServices>) -> Self {
        Self {
            name: info.name.clone(),
            dir_url: info.dir_url.clone(),
            root_manager: ModuleRootManager::new(info, services),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir_url(&self) -> Option<&str> {
        self.dir_url.as_deref()
    }

    pub fn info(&self) -> ModuleInfo {
        ModuleInfo {
            name: self.name.clone(),
            dir_url: self.dir_url.clone(),
        }
    }

    pub fn root_manager(&self) -> &ModuleRootManager {
        &self.root_manager
    }

    pub fn root_manager_mut(&mut self) -> &mut ModuleRootManager {
        &mut self.root_manager
    }

    pub fn root_model(&self) -> &RootModel {
        self.root_manager.root_model()
    }

    fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        self.root_manager.set_module_name(name);
    }
}

/// What one roots change did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootsChangeEvent {
    /// Modules whose root models were committed, in commit order
    pub committed: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// `(old, new)` name pairs
    pub renamed: Vec<(String, String)>,
}

impl RootsChangeEvent {
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
            && self.renamed.is_empty()
    }
}

/// Observes roots changes of a module manager
pub trait RootsChangeListener: Send + Sync {
    fn before_roots_change(&self) {}

    fn roots_changed(&self, event: &RootsChangeEvent);
}

pub struct ModuleManager {
    modules: BTreeMap<String, Module>,
    services: Arc<ProjectServices>,
    listeners: Vec<Arc<dyn RootsChangeListener>>,
    modification_count: u64,
}

impl fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleManager")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.len())
            .field("modification_count", &self.modification_count)
            .finish()
    }
}

impl ModuleManager {
    pub fn new(services: Arc<ProjectServices>) -> Self {
        Self {
            modules: BTreeMap::new(),
            services,
            listeners: Vec::new(),
            modification_count: 0,
        }
    }

    pub fn services(&self) -> &Arc<ProjectServices> {
        &self.services
    }

    /// Modules in name order
    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn module_names(&self) -> Vec<String> {
        self.modules.keys().cloned().collect()
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn module_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.modules.get_mut(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Number of roots changes applied so far
    pub fn modification_count(&self) -> u64 {
        self.modification_count
    }

    pub fn add_listener(&mut self, listener: Arc<dyn RootsChangeListener>) {
        self.listeners.push(listener);
    }

    /// Register a module read from a project file, bypassing the modifiable
    /// module model.
    pub(crate) fn add_loaded_module(&mut self, module: Module) -> Result<()> {
        if self.modules.contains_key(module.name()) {
            return Err(Error::ModuleNameExists {
                name: module.name().to_string(),
            });
        }
        self.modules.insert(module.name().to_string(), module);
        Ok(())
    }

    pub fn modifiable_model(&self) -> ModifiableModuleModel {
        ModifiableModuleModel {
            modules: self.modules.keys().cloned().collect(),
            pending: BTreeMap::new(),
            to_dispose: Vec::new(),
            module_to_new_name: HashMap::new(),
            new_name_to_module: HashMap::new(),
            services: Arc::clone(&self.services),
            writable: true,
        }
    }

    /// Module names in dependency order: dependencies before dependents, ties
    /// and cycles broken by name.
    pub fn sorted_modules(&self) -> Vec<String> {
        self.dependency_order().names().to_vec()
    }

    /// Ordering of the committed modules, with the cycles among them
    pub fn dependency_order(&self) -> TopologicalOrder {
        let mut graph = DependencyGraph::new(self.modules.keys().cloned());
        for module in self.modules.values() {
            for dependency in module.root_manager.dependency_module_names() {
                graph.add_edge(module.name(), &dependency);
            }
        }
        graph.topological_order()
    }

    /// Apply a module model and the root commits made inside it as one roots
    /// change: removed modules are disposed, new modules added, `commit_roots`
    /// run, renames applied, and listeners notified once.
    pub(crate) fn commit_module_model<F>(
        &mut self,
        mut model: ModifiableModuleModel,
        commit_roots: F,
    ) -> Result<RootsChangeEvent>
    where
        F: FnOnce(&mut ModuleManager) -> Result<Vec<String>>,
    {
        if !model.writable {
            let e = Error::Invariant {
                message: "module model was already committed or disposed".to_string(),
            };
            error!("{}", e);
            return Err(e);
        }
        model.writable = false;
        for listener in &self.listeners {
            listener.before_roots_change();
        }

        let mut event = RootsChangeEvent::default();
        for name in std::mem::take(&mut model.to_dispose) {
            if let Some(mut module) = self.modules.remove(&name) {
                module.root_manager.dispose();
                event.removed.push(name);
            }
        }
        for (name, module) in std::mem::take(&mut model.pending) {
            self.modules.insert(name.clone(), module);
            event.added.push(name);
        }

        let committed = commit_roots(self);

        let renames = model.applicable_renames(self);
        if !renames.is_empty() {
            self.apply_renames(&renames);
            event.renamed = renames.into_iter().collect();
            event.renamed.sort();
        }

        self.modification_count += 1;
        event.committed = match committed {
            Ok(committed) => committed,
            Err(e) => {
                error!("Roots change failed: {}", e);
                return Err(e);
            }
        };
        for listener in &self.listeners {
            listener.roots_changed(&event);
        }
        Ok(event)
    }

    fn apply_renames(&mut self, renames: &HashMap<String, String>) {
        let mut moved: Vec<Module> = renames
            .keys()
            .filter_map(|old| self.modules.remove(old))
            .collect();
        for module in &mut moved {
            if let Some(new_name) = renames.get(module.name()) {
                let new_name = new_name.clone();
                module.rename(&new_name);
            }
        }
        for module in moved {
            self.modules.insert(module.name().to_string(), module);
        }
        for module in self.modules.values_mut() {
            let updated = module.root_manager.rename_module_references(renames);
            if updated > 0 {
                debug!(
                    "Module '{}': {} module reference(s) follow renames",
                    module.name(),
                    updated
                );
            }
        }
    }
}

/// Staged structural changes to a module manager
#[derive(Debug)]
pub struct ModifiableModuleModel {
    /// Current names of every module, pending ones included
    modules: Vec<String>,
    pending: BTreeMap<String, Module>,
    to_dispose: Vec<String>,
    module_to_new_name: HashMap<String, String>,
    new_name_to_module: HashMap<String, String>,
    services: Arc<ProjectServices>,
    writable: bool,
}

impl ModifiableModuleModel {
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Module names, pending ones included, by current name
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m == name)
    }

    /// Stage a new module.
    pub fn new_module(&mut self, name: &str, dir_url: Option<&str>) -> Result<&mut Module> {
        self.check_writable()?;
        if self.contains(name) || self.new_name_to_module.contains_key(name) {
            return Err(Error::ModuleNameExists {
                name: name.to_string(),
            });
        }
        let module = Module::new(ModuleInfo::new(name, dir_url), Arc::clone(&self.services));
        self.modules.push(name.to_string());
        Ok(self.pending.entry(name.to_string()).or_insert(module))
    }

    /// Stage removal of a module. A pending module is simply forgotten.
    pub fn dispose_module(&mut self, name: &str) -> Result<()> {
        self.check_writable()?;
        let index = self
            .modules
            .iter()
            .position(|m| m == name)
            .ok_or_else(|| Error::ModuleNotFound {
                name: name.to_string(),
            })?;
        self.modules.remove(index);
        if let Some(new_name) = self.module_to_new_name.remove(name) {
            self.new_name_to_module.remove(&new_name);
        }
        match self.pending.remove(name) {
            Some(mut module) => module.root_manager.dispose(),
            None => self.to_dispose.push(name.to_string()),
        }
        Ok(())
    }

    /// Stage a rename. Renaming back to the current name cancels a pending
    /// rename. Fails without changing anything when another module already
    /// has or is about to get `new_name`; this includes cancelling a rename
    /// after another module has claimed the old name.
    pub fn rename_module(&mut self, name: &str, new_name: &str) -> Result<()> {
        self.check_writable()?;
        if !self.contains(name) {
            return Err(Error::ModuleNotFound {
                name: name.to_string(),
            });
        }
        if let Some(owner) = self.module_by_new_name(new_name) {
            if owner != name {
                return Err(Error::ModuleNameExists {
                    name: new_name.to_string(),
                });
            }
        }

        if let Some(previous) = self.module_to_new_name.remove(name) {
            self.new_name_to_module.remove(&previous);
        }
        if name != new_name {
            self.module_to_new_name
                .insert(name.to_string(), new_name.to_string());
            self.new_name_to_module
                .insert(new_name.to_string(), name.to_string());
        }
        Ok(())
    }

    /// Current name of the module that is about to be called `new_name`
    pub fn module_to_be_renamed(&self, new_name: &str) -> Option<&str> {
        self.new_name_to_module.get(new_name).map(String::as_str)
    }

    pub fn new_name(&self, name: &str) -> Option<&str> {
        self.module_to_new_name.get(name).map(String::as_str)
    }

    /// Current name of the module that will be called `name` after commit
    pub fn module_by_new_name(&self, name: &str) -> Option<&str> {
        if let Some(old) = self.module_to_be_renamed(name) {
            return Some(old);
        }
        self.modules
            .iter()
            .find(|m| *m == name && !self.module_to_new_name.contains_key(*m))
            .map(String::as_str)
    }

    /// Resolve a stored module reference: by current name, then by pending new
    /// name. This is the module renames point the reference at on commit;
    /// references written through [`Self::accessor`] are stored under current
    /// names before they are resolved.
    pub fn resolve_reference(&self, name: &str) -> Option<&str> {
        self.modules
            .iter()
            .find(|m| *m == name)
            .map(String::as_str)
            .or_else(|| self.module_to_be_renamed(name))
    }

    pub fn is_disposing(&self, name: &str) -> bool {
        self.to_dispose.iter().any(|m| m == name)
    }

    pub fn pending_module(&self, name: &str) -> Option<&Module> {
        self.pending.get(name)
    }

    pub fn pending_module_mut(&mut self, name: &str) -> Option<&mut Module> {
        self.pending.get_mut(name)
    }

    /// Whether committing would change the module manager
    pub fn is_changed(&self, manager: &ModuleManager) -> bool {
        if !self.pending.is_empty() || !self.to_dispose.is_empty() || !self.module_to_new_name.is_empty() {
            return true;
        }
        self.modules.len() != manager.len() || self.modules.iter().any(|m| manager.module(m).is_none())
    }

    /// An accessor that resolves pending new names to current names
    pub fn accessor(&self) -> Arc<dyn RootConfigurationAccessor> {
        Arc::new(RenamingAccessor {
            new_name_to_module: self.new_name_to_module.clone(),
        })
    }

    /// Discard every staged change.
    pub fn dispose(mut self) {
        for module in self.pending.values_mut() {
            module.root_manager.dispose();
        }
        self.writable = false;
    }

    /// Renames whose module still exists after removals, keyed by old name
    fn applicable_renames(&self, manager: &ModuleManager) -> HashMap<String, String> {
        self.module_to_new_name
            .iter()
            .filter(|(old, _)| manager.module(old).is_some())
            .map(|(old, new)| (old.clone(), new.clone()))
            .collect()
    }

    fn check_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(Error::Invariant {
                message: "module model is not writable".to_string(),
            })
        }
    }
}

/// Maps pending new module names back to current ones
#[derive(Debug, Clone, Default)]
pub struct RenamingAccessor {
    new_name_to_module: HashMap<String, String>,
}

impl RootConfigurationAccessor for RenamingAccessor {
    fn module_name(&self, name: &str) -> String {
        self.new_name_to_module
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}
