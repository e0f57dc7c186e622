//! # Persisted Form and Project File Parsing
//!
//! This module defines the serde data structures for the persisted form of a
//! module's root configuration and for a whole project file, along with the
//! functions that parse them from YAML.
//!
//! ## Key Components
//!
//! - **`RootModelElement`**: The persisted form of one module's root model: the
//!   current layer name and the list of named layers.
//!
//! - **`LayerChild`**: An enum of the blocks a layer may contain (`extension`,
//!   `content`, `order-entry`). Blocks under any other key are kept as raw
//!   mappings so that they survive a load/store cycle. A block under one of
//!   the known keys that does not have that block's shape is a parse error
//!   when the layer is loaded (see [`LayerChild::check_unknown_block`]).
//!
//! - **`ExtensionElement`**: The raw mapping of an extension block. Key order is
//!   preserved, which lets extensions nobody understands be re-emitted
//!   byte-for-byte.
//!
//! - **`ProjectFile`**: A complete project: provider registrations, custom
//!   folder types, excluded roots, library and SDK tables, and every module
//!   with its root configuration.
//!
//! ## Parsing
//!
//! `parse` and `from_file` read a project file; `parse_root_model` reads the
//! persisted form of a single module. `to_yaml` is the inverse of `parse`.

use crate::error::{Error, Result};
use crate::order::OrderRootType;
use crate::registry::{ExtensionRegistry, StaticExcludePolicy};
use crate::extension::SimpleExtensionProvider;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

////// ROOT MODEL PERSISTED FORM //////

/// Persisted form of a module's root model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootModelElement {
    /// Name of the layer that is current after loading
    #[serde(default, rename = "current-layer", skip_serializing_if = "Option::is_none")]
    pub current_layer: Option<String>,
    /// Named layers in persisted order
    #[serde(default)]
    pub layers: Vec<LayerElement>,
}

impl RootModelElement {
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Persisted form of one layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerElement {
    pub name: String,
    #[serde(default)]
    pub children: Vec<LayerChild>,
}

/// A block inside a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerChild {
    /// State of a module extension, known or not.
    Extension { extension: ExtensionElement },
    /// A content root and its folders.
    Content { content: ContentElement },
    /// One dependency in the order list.
    OrderEntry {
        #[serde(rename = "order-entry")]
        order_entry: OrderEntryElement,
    },
    /// Anything else, kept as-is.
    Unknown(Mapping),
}

impl LayerChild {
    /// Reject a raw block that uses a known key without having the shape of
    /// that block. Blocks under other keys pass.
    pub fn check_unknown_block(mapping: &Mapping) -> Result<()> {
        for (key, value) in mapping {
            let key = match key.as_str() {
                Some(key @ ("extension" | "content" | "order-entry")) => key,
                _ => continue,
            };
            let shape = match key {
                "extension" => serde_yaml::from_value::<ExtensionElement>(value.clone()).map(drop),
                "content" => serde_yaml::from_value::<ContentElement>(value.clone()).map(drop),
                _ => serde_yaml::from_value::<OrderEntryElement>(value.clone()).map(drop),
            };
            let message = match shape {
                Err(e) => format!("Malformed '{}' block: {}", key, e),
                Ok(()) => format!("'{}' block could not be read", key),
            };
            return Err(Error::ConfigParse {
                message,
                hint: Some(format!(
                    "Check the '{}' block against the layer format, or rename its key to keep it as an unknown block",
                    key
                )),
            });
        }
        Ok(())
    }
}

/// Raw attributes of an extension block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionElement(pub Mapping);

impl ExtensionElement {
    /// An element carrying only the extension id
    pub fn new(id: &str) -> Self {
        let mut mapping = Mapping::new();
        mapping.insert(Value::from("id"), Value::from(id));
        Self(mapping)
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(Value::from(key), value.into());
    }

    /// Attribute pairs in persisted order
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.0.iter()
    }
}

/// Persisted form of a content entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentElement {
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub folders: Vec<FolderElement>,
}

/// Persisted form of a content folder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderElement {
    pub url: String,
    /// Folder type id (`PRODUCTION`, `TEST`, ... or a custom id)
    #[serde(rename = "type")]
    pub folder_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

/// Persisted form of an order entry
///
/// The `type` discriminator selects the loader; every other key is passed to
/// it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEntryElement {
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl OrderEntryElement {
    pub fn new(type_id: &str) -> Self {
        Self {
            type_id: type_id.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// A required string attribute
    pub fn string(&self, key: &str) -> Result<&str> {
        self.optional_string(key)?.ok_or_else(|| Error::ConfigParse {
            message: format!("Order entry of type '{}' is missing '{}'", self.type_id, key),
            hint: Some(format!("Add '{}:' to the order-entry block", key)),
        })
    }

    pub fn optional_string(&self, key: &str) -> Result<Option<&str>> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(Error::config(format!(
                "Attribute '{}' of order entry '{}' must be a string, got {:?}",
                key, self.type_id, other
            ))),
        }
    }

    /// A boolean attribute, `false` when absent
    pub fn flag(&self, key: &str) -> Result<bool> {
        match self.attributes.get(key) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(Error::config(format!(
                "Attribute '{}' of order entry '{}' must be a boolean, got {:?}",
                key, self.type_id, other
            ))),
        }
    }
}

/// Parse the persisted form of a single module
pub fn parse_root_model(yaml_content: &str) -> Result<RootModelElement> {
    if yaml_content.trim().is_empty() {
        return Ok(RootModelElement::default());
    }
    serde_yaml::from_str(yaml_content).map_err(Error::Yaml)
}

pub fn root_model_to_yaml(element: &RootModelElement) -> Result<String> {
    serde_yaml::to_string(element).map_err(Error::Yaml)
}

////// PROJECT FILE //////

/// Registration of a module extension provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionProviderElement {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether the extension may name an SDK
    #[serde(default)]
    pub sdk: bool,
}

fn default_library_level() -> String {
    crate::order::library::PROJECT_LEVEL.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryElement {
    pub name: String,
    /// Table the library lives in (`project` or `application`)
    #[serde(default = "default_library_level")]
    pub level: String,
    #[serde(default)]
    pub roots: BTreeMap<OrderRootType, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkElement {
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub roots: BTreeMap<OrderRootType, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleElement {
    pub name: String,
    /// Module directory URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default)]
    pub roots: RootModelElement,
}

/// A complete project file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub name: String,
    #[serde(default)]
    pub extensions: Vec<ExtensionProviderElement>,
    #[serde(default, rename = "folder-types")]
    pub folder_types: Vec<String>,
    #[serde(default)]
    pub excluded: Vec<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryElement>,
    #[serde(default)]
    pub sdks: Vec<SdkElement>,
    #[serde(default)]
    pub modules: Vec<ModuleElement>,
}

impl ProjectFile {
    /// Build the extension registry the file declares
    pub fn registry(&self) -> ExtensionRegistry {
        let mut registry = ExtensionRegistry::new();
        for extension in &self.extensions {
            let mut provider = SimpleExtensionProvider::new(&extension.id).with_sdk(extension.sdk);
            if let Some(name) = &extension.name {
                provider = provider.named(name);
            }
            registry.register_extension_provider(provider);
        }
        for folder_type in &self.folder_types {
            registry.register_folder_type(folder_type.clone());
        }
        if !self.excluded.is_empty() {
            registry.register_exclude_policy(StaticExcludePolicy::new(self.excluded.clone()));
        }
        registry
    }

    /// Check for duplicate module, library and SDK names
    pub fn validate(&self) -> Result<()> {
        fn first_duplicate<'a>(names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
            let mut seen = std::collections::BTreeSet::new();
            names.into_iter().find(|name| !seen.insert(*name))
        }

        if self.name.trim().is_empty() {
            return Err(Error::ConfigParse {
                message: "Project name is empty".to_string(),
                hint: Some("Add 'name:' at the top of the project file".to_string()),
            });
        }
        if let Some(name) = first_duplicate(self.modules.iter().map(|m| m.name.as_str())) {
            return Err(Error::ModuleNameExists {
                name: name.to_string(),
            });
        }
        for level in [crate::order::library::PROJECT_LEVEL, crate::order::library::APPLICATION_LEVEL] {
            let names = self
                .libraries
                .iter()
                .filter(|l| l.level == level)
                .map(|l| l.name.as_str());
            if let Some(name) = first_duplicate(names) {
                return Err(Error::config(format!("Duplicate {} library '{}'", level, name)));
            }
        }
        if let Some(level) = self
            .libraries
            .iter()
            .map(|l| l.level.as_str())
            .find(|level| {
                *level != crate::order::library::PROJECT_LEVEL
                    && *level != crate::order::library::APPLICATION_LEVEL
            })
        {
            return Err(Error::ConfigParse {
                message: format!("Unknown library level '{}'", level),
                hint: Some("Use 'project' or 'application'".to_string()),
            });
        }
        if let Some(name) = first_duplicate(self.sdks.iter().map(|s| s.name.as_str())) {
            return Err(Error::config(format!("Duplicate SDK '{}'", name)));
        }
        Ok(())
    }
}

/// Parses a project file from a YAML string.
pub fn parse(yaml_content: &str) -> Result<ProjectFile> {
    let project: ProjectFile = serde_yaml::from_str(yaml_content).map_err(Error::Yaml)?;
    project.validate()?;
    Ok(project)
}

/// Parse a project file from a YAML file path
pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<ProjectFile> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}

pub fn to_yaml(project: &ProjectFile) -> Result<String> {
    serde_yaml::to_string(project).map_err(Error::Yaml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root_model_children() {
        let yaml = r#"
current-layer: Default
layers:
  - name: Default
    children:
      - extension: { id: java, enabled: true, sdk: jdk-17 }
      - content:
          url: file:///work/app
          folders:
            - { url: file:///work/app/src, type: PRODUCTION }
      - order-entry: { type: module-source }
      - order-entry: { type: library, name: junit, level: project, scope: TEST }
"#;
        let element = parse_root_model(yaml).unwrap();
        assert_eq!(element.current_layer.as_deref(), Some("Default"));
        let children = &element.layers[0].children;
        assert_eq!(children.len(), 4);

        match &children[0] {
            LayerChild::Extension { extension } => {
                assert_eq!(extension.id(), Some("java"));
                assert_eq!(extension.get("sdk").and_then(Value::as_str), Some("jdk-17"));
            }
            other => panic!("Expected extension, got {:?}", other),
        }
        match &children[1] {
            LayerChild::Content { content } => {
                assert_eq!(content.url, "file:///work/app");
                assert_eq!(content.folders[0].folder_type, "PRODUCTION");
            }
            other => panic!("Expected content, got {:?}", other),
        }
        match &children[3] {
            LayerChild::OrderEntry { order_entry } => {
                assert_eq!(order_entry.type_id, "library");
                assert_eq!(order_entry.string("name").unwrap(), "junit");
                assert!(!order_entry.flag("exported").unwrap());
            }
            other => panic!("Expected order entry, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unknown_child_is_kept() {
        let yaml = r#"
layers:
  - name: Default
    children:
      - facet: { kind: web }
"#;
        let element = parse_root_model(yaml).unwrap();
        match &element.layers[0].children[0] {
            LayerChild::Unknown(mapping) => assert!(LayerChild::check_unknown_block(mapping).is_ok()),
            other => panic!("Expected unknown block, got {:?}", other),
        }
        let written = root_model_to_yaml(&element).unwrap();
        assert!(written.contains("facet"));
    }

    #[test]
    fn test_malformed_known_block_is_rejected() {
        let yaml = r#"
layers:
  - name: Default
    children:
      - content: { url: file:///work/app, folders: [{ url: file:///work/app/src }] }
"#;
        let element = parse_root_model(yaml).unwrap();
        let mapping = match &element.layers[0].children[0] {
            LayerChild::Unknown(mapping) => mapping,
            other => panic!("Expected unknown block, got {:?}", other),
        };
        match LayerChild::check_unknown_block(mapping) {
            Err(Error::ConfigParse { message, hint }) => {
                assert!(message.contains("Malformed 'content' block"), "{}", message);
                assert!(message.contains("type"), "{}", message);
                assert!(hint.is_some());
            }
            other => panic!("Expected ConfigParse, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_root_model() {
        assert!(parse_root_model("").unwrap().is_empty());
        assert!(parse_root_model("layers: []").unwrap().is_empty());
    }

    #[test]
    fn test_extension_element_preserves_key_order() {
        let yaml = "extension: { zeta: 1, id: scala, alpha: [a, b] }";
        let child: LayerChild = serde_yaml::from_str(yaml).unwrap();
        let written = serde_yaml::to_string(&child).unwrap();
        let zeta = written.find("zeta").unwrap();
        let id = written.find("id").unwrap();
        let alpha = written.find("alpha").unwrap();
        assert!(zeta < id && id < alpha);
    }

    #[test]
    fn test_order_entry_attribute_errors() {
        let element = OrderEntryElement::new("library").with("exported", "yes");
        assert!(matches!(element.string("name"), Err(Error::ConfigParse { hint: Some(_), .. })));
        assert!(element.flag("exported").is_err());
    }

    #[test]
    fn test_parse_project_file() {
        let yaml = r#"
name: demo
extensions:
  - { id: java, sdk: true }
folder-types: [GENERATED]
excluded: [file:///work/app/target]
libraries:
  - name: junit
    roots:
      classes: [jar:///repo/junit.jar!/]
sdks:
  - name: jdk-17
    kind: JavaSDK
modules:
  - name: app
    dir: file:///work/app
"#;
        let project = parse(yaml).unwrap();
        assert_eq!(project.name, "demo");
        assert_eq!(project.libraries[0].level, "project");
        assert_eq!(
            project.libraries[0].roots[&OrderRootType::Classes],
            vec!["jar:///repo/junit.jar!/".to_string()]
        );
        assert!(project.modules[0].roots.is_empty());

        let registry = project.registry();
        assert!(registry.extension_provider("java").unwrap().supports_sdk());
        assert!(registry.is_known_folder_type("GENERATED"));
        assert_eq!(registry.excluded_root_urls(), vec!["file:///work/app/target"]);
    }

    #[test]
    fn test_parse_duplicate_module_names() {
        let yaml = r#"
name: demo
modules:
  - name: app
  - name: app
"#;
        assert!(matches!(parse(yaml), Err(Error::ModuleNameExists { .. })));
    }

    #[test]
    fn test_parse_unknown_library_level() {
        let yaml = r#"
name: demo
libraries:
  - { name: junit, level: module }
"#;
        let error = parse(yaml).unwrap_err();
        assert!(format!("{}", error).contains("Unknown library level"));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        assert!(matches!(parse("name: [unclosed"), Err(Error::Yaml(_))));
    }

    #[test]
    fn test_from_file_nonexistent() {
        let result = from_file("/nonexistent/project.yaml");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_project_file_yaml_round_trip() {
        let yaml = r#"
name: demo
modules:
  - name: app
    roots:
      current-layer: Default
      layers:
        - name: Default
          children:
            - order-entry: { type: module-source }
"#;
        let project = parse(yaml).unwrap();
        let written = to_yaml(&project).unwrap();
        assert_eq!(parse(&written).unwrap(), project);
    }
}
