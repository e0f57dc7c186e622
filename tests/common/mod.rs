//! Shared test utilities for integration and E2E tests.
//!
//! Add `mod common;` to a test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_project(projects::LAYERED);
//!     fixture.command().arg("ls").assert().success();
//! }
//! ```

#![allow(dead_code)]

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use module_roots::config;
use module_roots::defaults::DEFAULT_PROJECT_FILE;
use module_roots::extension::SimpleExtensionProvider;
use module_roots::module::{Module, ModuleInfo, ModuleManager};
use module_roots::project::Project;
use module_roots::registry::ExtensionRegistry;
use module_roots::root_model::RootModel;
use module_roots::services::ProjectServices;
use module_roots::vfs::MemoryVfs;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::projects;
    pub use super::TestFixture;
}

/// Project files used across tests.
pub mod projects {
    /// One module with one layer and nothing else.
    pub const MINIMAL: &str = r#"
name: minimal
modules:
  - name: app
    dir: file:///work/app
"#;

    /// Three modules with a dependency chain, two layers in `app`, a library
    /// and an SDK.
    pub const LAYERED: &str = r#"
name: layered
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
      current-layer: Default
      layers:
        - name: Default
          children:
            - extension: { id: java, enabled: true, sdk: jdk-17 }
            - content:
                url: file:///work/app
                folders:
                  - { url: file:///work/app/src, type: PRODUCTION }
                  - { url: file:///work/app/test, type: TEST }
            - order-entry: { type: module-extension-sdk, extension-id: java }
            - order-entry: { type: module-source }
            - order-entry: { type: library, name: junit, level: project, scope: TEST }
            - order-entry: { type: module, name: core }
        - name: Release
          children:
            - content:
                url: file:///work/app
            - order-entry: { type: module-source }
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
            - order-entry: { type: module, name: util, exported: true }
  - name: util
    dir: file:///work/util
    roots:
      layers:
        - name: Default
          children:
            - content:
                url: file:///work/util
            - order-entry: { type: module-source }
"#;

    /// A module carrying an extension and an order-entry type nobody
    /// registered.
    pub const WITH_UNKNOWN: &str = r#"
name: unknown
modules:
  - name: app
    roots:
      layers:
        - name: Default
          children:
            - extension: { id: kotlin, enabled: true, api-version: "1.9" }
            - order-entry: { type: module-source }
            - order-entry: { type: gradle-sync, name: jvm }
"#;

    /// A dependency on a library that is not declared.
    pub const DANGLING: &str = r#"
name: dangling
modules:
  - name: app
    roots:
      layers:
        - name: Default
          children:
            - order-entry: { type: module-source }
            - order-entry: { type: library, name: missing, level: project }
"#;

    /// Not YAML at all.
    pub const INVALID_YAML: &str = "name: [unclosed";
}

/// Services over an in-memory file system with a `java` SDK-capable
/// extension registered.
pub fn services() -> Arc<ProjectServices> {
    let mut registry = ExtensionRegistry::new();
    registry.register_extension_provider(SimpleExtensionProvider::new("java").with_sdk(true));
    ProjectServices::in_memory(Arc::new(registry))
}

/// A baseline root model for a module without a directory.
pub fn root_model(name: &str) -> RootModel {
    RootModel::new(ModuleInfo::new(name, None), services())
}

/// A module manager holding modules with the given names and no roots.
pub fn manager_with(names: &[&str]) -> ModuleManager {
    let services = services();
    let mut manager = ModuleManager::new(Arc::clone(&services));
    let mut model = manager.modifiable_model();
    for name in names {
        model
            .new_module(name, Some(&format!("file:///work/{}", name)))
            .expect("module names are unique");
    }
    module_roots::commit::multi_commit(&mut manager, Vec::new(), model)
        .expect("adding modules succeeds");
    manager
}

/// Commit a module dependency `from -> to` into the baseline.
pub fn add_dependency(manager: &mut ModuleManager, from: &str, to: &str) {
    let module: &Module = manager.module(from).expect("module exists");
    let mut model = module.root_manager().modifiable_model().expect("baseline is alive");
    model
        .current_layer_mut()
        .expect("copy is writable")
        .add_module_entry(to)
        .expect("dependency is insertable");
    module_roots::commit::commit_root_model(manager, model).expect("commit succeeds");
}

/// Load a project from YAML against an in-memory file system.
pub fn load_project(yaml: &str) -> Project {
    let file = config::parse(yaml).expect("project file parses");
    Project::load(&file, Arc::new(MemoryVfs::new()), None).expect("project loads")
}

/// A temporary directory holding a project file.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write the default project file with the given content.
    pub fn with_project(self, content: &str) -> Self {
        self.temp_dir
            .child(DEFAULT_PROJECT_FILE)
            .write_str(content)
            .expect("Failed to write project file");
        self
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn project_path(&self) -> PathBuf {
        self.temp_dir.path().join(DEFAULT_PROJECT_FILE)
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// A command running in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("module-roots");
        cmd.current_dir(self.path());
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
