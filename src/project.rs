//! # Project
//!
//! A [`Project`] ties the module manager to the library tables, the SDK table
//! and the shared services, and answers the reference lookups order entries
//! need ([`RootsResolver`]). It is built from a [`ProjectFile`] and written
//! back to one.

use crate::commit;
use crate::config::{LibraryElement, ModuleElement, ProjectFile, SdkElement};
use crate::error::{Error, Result};
use crate::module::{ModifiableModuleModel, Module, ModuleInfo, ModuleManager, RootsChangeEvent};
use crate::order::library::{Library, LibraryTable, Sdk, SdkTable, APPLICATION_LEVEL, PROJECT_LEVEL};
use crate::order::{OrderRootType, RootsResolver};
use crate::progress::ProgressIndicator;
use crate::root_model::RootModel;
use crate::services::ProjectServices;
use crate::vfs::VirtualFileSystem;
use log::{debug, info};
use std::sync::Arc;

/// An order entry whose reference does not resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidOrderEntry {
    pub module: String,
    pub layer: String,
    pub entry: String,
}

#[derive(Debug)]
pub struct Project {
    name: String,
    services: Arc<ProjectServices>,
    project_libraries: LibraryTable,
    application_libraries: LibraryTable,
    sdks: SdkTable,
    modules: ModuleManager,
    /// Registrations from the project file, written back unchanged
    settings: ProjectFile,
}

impl Project {
    pub fn new(name: &str, services: Arc<ProjectServices>) -> Self {
        Self {
            name: name.to_string(),
            modules: ModuleManager::new(Arc::clone(&services)),
            services,
            project_libraries: LibraryTable::new(PROJECT_LEVEL),
            application_libraries: LibraryTable::new(APPLICATION_LEVEL),
            sdks: SdkTable::new(),
            settings: ProjectFile {
                name: name.to_string(),
                ..ProjectFile::default()
            },
        }
    }

    /// Build a project from a file, with the registry the file declares.
    pub fn load(
        file: &ProjectFile,
        file_system: Arc<dyn VirtualFileSystem>,
        progress: Option<&dyn ProgressIndicator>,
    ) -> Result<Self> {
        let services = ProjectServices::new(Arc::new(file.registry()), file_system);
        Self::from_config(file, services, progress)
    }

    /// Build a project from a file using the given services.
    pub fn from_config(
        file: &ProjectFile,
        services: Arc<ProjectServices>,
        progress: Option<&dyn ProgressIndicator>,
    ) -> Result<Self> {
        file.validate()?;
        let mut project = Self::new(&file.name, services);
        project.settings = ProjectFile {
            libraries: Vec::new(),
            sdks: Vec::new(),
            modules: Vec::new(),
            ..file.clone()
        };

        for element in &file.libraries {
            let mut library = Library::new(&element.name, &element.level);
            for (root_type, urls) in &element.roots {
                for url in urls {
                    library.add_root(*root_type, url);
                }
            }
            project.library_table_mut(&element.level)?.add(library);
        }
        for element in &file.sdks {
            let sdk = element
                .roots
                .iter()
                .flat_map(|(root_type, urls)| urls.iter().map(move |url| (*root_type, url)))
                .fold(Sdk::new(&element.name, &element.kind), |sdk, (root_type, url)| {
                    sdk.with_root(root_type, url)
                });
            project.sdks.add(sdk);
        }

        for element in &file.modules {
            if let Some(progress) = progress {
                progress.check_canceled()?;
                progress.set_text(&format!("Loading module {}", element.name));
            }
            let mut module = Module::new(
                ModuleInfo::new(&element.name, element.dir.as_deref()),
                Arc::clone(&project.services),
            );
            module.root_manager_mut().load_state(&element.roots, progress)?;
            project.modules.add_loaded_module(module)?;
        }
        info!(
            "Loaded project '{}': {} module(s), {} library(ies), {} SDK(s)",
            project.name,
            project.modules.len(),
            project.project_libraries.len() + project.application_libraries.len(),
            project.sdks.len()
        );
        Ok(project)
    }

    /// The project file describing the current state
    pub fn to_config(&self) -> ProjectFile {
        let libraries = self
            .project_libraries
            .iter()
            .chain(self.application_libraries.iter())
            .map(|library| LibraryElement {
                name: library.name().to_string(),
                level: library.level().to_string(),
                roots: library.roots().clone(),
            })
            .collect();
        let sdks = self
            .sdks
            .iter()
            .map(|sdk| SdkElement {
                name: sdk.name().to_string(),
                kind: sdk.kind().to_string(),
                roots: sdk.roots().clone(),
            })
            .collect();
        let modules = self
            .modules
            .modules()
            .map(|module| ModuleElement {
                name: module.name().to_string(),
                dir: module.dir_url().map(str::to_string),
                roots: module.root_manager().state(),
            })
            .collect();
        ProjectFile {
            name: self.name.clone(),
            libraries,
            sdks,
            modules,
            ..self.settings.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn services(&self) -> &Arc<ProjectServices> {
        &self.services
    }

    ////// LIBRARIES AND SDKS //////

    pub fn library_table(&self, level: &str) -> Option<&LibraryTable> {
        match level {
            PROJECT_LEVEL => Some(&self.project_libraries),
            APPLICATION_LEVEL => Some(&self.application_libraries),
            _ => None,
        }
    }

    pub fn library_table_mut(&mut self, level: &str) -> Result<&mut LibraryTable> {
        match level {
            PROJECT_LEVEL => Ok(&mut self.project_libraries),
            APPLICATION_LEVEL => Ok(&mut self.application_libraries),
            _ => Err(Error::ConfigParse {
                message: format!("Unknown library level '{}'", level),
                hint: Some("Use 'project' or 'application'; module libraries are declared on their order entry".to_string()),
            }),
        }
    }

    pub fn sdks(&self) -> &SdkTable {
        &self.sdks
    }

    pub fn sdks_mut(&mut self) -> &mut SdkTable {
        &mut self.sdks
    }

    ////// MODULES //////

    pub fn module_manager(&self) -> &ModuleManager {
        &self.modules
    }

    pub fn module_manager_mut(&mut self) -> &mut ModuleManager {
        &mut self.modules
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.module(name)
    }

    /// Writable copy of a module's root model
    pub fn modifiable_root_model(&self, module: &str) -> Result<RootModel> {
        self.module(module)
            .ok_or_else(|| Error::ModuleNotFound {
                name: module.to_string(),
            })?
            .root_manager()
            .modifiable_model()
    }

    pub fn modifiable_module_model(&self) -> ModifiableModuleModel {
        self.modules.modifiable_model()
    }

    pub fn commit_root_model(&mut self, model: RootModel) -> Result<RootsChangeEvent> {
        commit::commit_root_model(&mut self.modules, model)
    }

    pub fn multi_commit(
        &mut self,
        models: Vec<RootModel>,
        module_model: ModifiableModuleModel,
    ) -> Result<RootsChangeEvent> {
        commit::multi_commit(&mut self.modules, models, module_model)
    }

    /// Module names, dependencies first
    pub fn sorted_modules(&self) -> Vec<String> {
        self.modules.sorted_modules()
    }

    ////// QUERIES //////

    /// URLs of one root type contributed by the order entries of a module's
    /// current layer, in order
    pub fn order_root_urls(&self, module: &str, root_type: OrderRootType) -> Result<Vec<String>> {
        let model = self
            .module(module)
            .ok_or_else(|| Error::ModuleNotFound {
                name: module.to_string(),
            })?
            .root_model();
        let layer = model.current_layer()?;
        let mut urls = Vec::new();
        for entry in layer.order_entries() {
            for url in entry.urls(root_type, self, layer) {
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
        Ok(urls)
    }

    /// Order entries in any layer of any module whose reference dangles
    pub fn invalid_order_entries(&self) -> Vec<InvalidOrderEntry> {
        let mut invalid = Vec::new();
        for module in self.modules.modules() {
            for (layer_name, layer) in module.root_model().layers() {
                for entry in layer.invalid_order_entries(self) {
                    invalid.push(InvalidOrderEntry {
                        module: module.name().to_string(),
                        layer: layer_name.to_string(),
                        entry: entry.presentable_name(),
                    });
                }
            }
        }
        debug!("{} invalid order entr(ies) in '{}'", invalid.len(), self.name);
        invalid
    }
}

impl RootsResolver for Project {
    fn find_module(&self, name: &str) -> Option<&RootModel> {
        self.modules.module(name).map(Module::root_model)
    }

    fn find_library(&self, level: &str, name: &str) -> Option<&Library> {
        self.library_table(level).and_then(|table| table.get(name))
    }

    fn find_sdk(&self, name: &str) -> Option<&Sdk> {
        self.sdks.get(name)
    }

    fn file_system(&self) -> &dyn VirtualFileSystem {
        self.services.file_system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::progress::CancellationToken;
    use crate::vfs::MemoryVfs;

    const PROJECT: &str = r#"
name: demo
extensions:
  - { id: java, sdk: true }
libraries:
  - name: junit
    roots:
      classes: [ "jar:///libs/junit.jar!/" ]
sdks:
  - name: jdk-17
    kind: java
    roots:
      classes: [ "jrt:///jdk-17" ]
modules:
  - name: app
    dir: file:///work/app
    roots:
      layers:
        - name: Default
          children:
            - extension: { id: java, enabled: true, sdk: jdk-17 }
            - content:
                url: file:///work/app
                folders:
                  - { url: file:///work/app/src, type: PRODUCTION }
            - order-entry: { type: module-extension-sdk, extension-id: java }
            - order-entry: { type: module-source }
            - order-entry: { type: library, name: junit, level: project, scope: TEST }
            - order-entry: { type: library, name: missing, level: project }
            - order-entry: { type: module, name: core }
  - name: core
    dir: file:///work/core
    roots:
      layers:
        - name: Default
          children:
            - content:
                url: file:///work/core
                folders:
                  - { url: file:///work/core/src, type: PRODUCTION }
            - order-entry: { type: module-source }
"#;

    fn load() -> Project {
        let file = config::parse(PROJECT).unwrap();
        Project::load(&file, Arc::new(MemoryVfs::new()), None).unwrap()
    }

    #[test]
    fn test_load_project() {
        let project = load();
        assert_eq!(project.name(), "demo");
        assert_eq!(project.module_manager().module_names(), vec!["app", "core"]);
        assert!(project.find_library(PROJECT_LEVEL, "junit").is_some());
        assert!(project.find_sdk("jdk-17").is_some());
        assert_eq!(project.sorted_modules(), vec!["core", "app"]);
    }

    #[test]
    fn test_invalid_entries_report_dangling_library() {
        let project = load();
        let invalid = project.invalid_order_entries();
        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].module, "app");
        assert_eq!(invalid[0].layer, "Default");
        assert_eq!(invalid[0].entry, "missing");
    }

    #[test]
    fn test_order_root_urls() {
        let project = load();
        assert_eq!(
            project.order_root_urls("app", OrderRootType::Classes).unwrap(),
            vec!["jrt:///jdk-17", "jar:///libs/junit.jar!/"]
        );
        assert_eq!(
            project.order_root_urls("app", OrderRootType::Sources).unwrap(),
            vec!["file:///work/app/src", "file:///work/core/src"]
        );
        assert!(matches!(
            project.order_root_urls("nope", OrderRootType::Classes),
            Err(Error::ModuleNotFound { .. })
        ));
    }

    #[test]
    fn test_module_library_resolves_through_its_layer() {
        let mut project = load();
        let mut model = project.modifiable_root_model("core").unwrap();
        model
            .current_layer_mut()
            .unwrap()
            .add_module_library(
                Library::new("gson", PROJECT_LEVEL)
                    .with_root(OrderRootType::Classes, "jar:///libs/gson.jar!/"),
            )
            .unwrap();
        project.commit_root_model(model).unwrap();

        assert_eq!(
            project.order_root_urls("core", OrderRootType::Classes).unwrap(),
            vec!["jar:///libs/gson.jar!/"]
        );
        assert_eq!(project.invalid_order_entries().len(), 1);
        assert!(project.find_library(PROJECT_LEVEL, "gson").is_none());

        let reloaded = Project::load(&project.to_config(), Arc::new(MemoryVfs::new()), None).unwrap();
        assert_eq!(
            reloaded.order_root_urls("core", OrderRootType::Classes).unwrap(),
            vec!["jar:///libs/gson.jar!/"]
        );
    }

    #[test]
    fn test_to_config_round_trip() {
        let project = load();
        let file = project.to_config();
        assert_eq!(file.extensions.len(), 1);
        let reloaded = Project::load(&file, Arc::new(MemoryVfs::new()), None).unwrap();
        assert_eq!(
            config::to_yaml(&reloaded.to_config()).unwrap(),
            config::to_yaml(&file).unwrap()
        );
    }

    #[test]
    fn test_load_is_cancelable() {
        let file = config::parse(PROJECT).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            Project::load(&file, Arc::new(MemoryVfs::new()), Some(&token)),
            Err(Error::Canceled)
        ));
    }

    #[test]
    fn test_commit_through_project() {
        let mut project = load();
        let mut model = project.modifiable_root_model("core").unwrap();
        model
            .current_layer_mut()
            .unwrap()
            .add_library_entry(&Library::new("junit", PROJECT_LEVEL))
            .unwrap();
        let event = project.commit_root_model(model).unwrap();
        assert_eq!(event.committed, vec!["core"]);
        assert!(project
            .module("core")
            .unwrap()
            .root_model()
            .current_layer()
            .unwrap()
            .find_library_order_entry("junit", PROJECT_LEVEL)
            .is_some());
    }
}
