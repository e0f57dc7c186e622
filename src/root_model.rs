//! # Root Model
//!
//! A [`RootModel`] is the complete root configuration of one module: a set of
//! named layers, one of which is current.
//!
//! Every module owns a read-only *baseline* model. Changes are made on a
//! writable deep copy obtained with [`RootModel::modifiable`], which is then
//! either committed into the baseline with [`RootModel::do_commit_and_dispose`]
//! (usually through the committer) or discarded with [`RootModel::dispose`].
//!
//! ```text
//! baseline ──modifiable()──▶ writable copy ──mutate──▶ do_commit_and_dispose(baseline)
//!                                            └──────▶ dispose()
//! ```

use crate::config::{LayerElement, RootModelElement};
use crate::defaults::DEFAULT_LAYER_NAME;
use crate::error::{Error, Result};
use crate::layer::ModuleRootLayer;
use crate::module::ModuleInfo;
use crate::progress::ProgressIndicator;
use crate::services::ProjectServices;
use log::{error, warn};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Decides how module references made by a model are resolved.
///
/// A writable model created while modules are being renamed can use an
/// accessor that maps pending new names back to current ones.
pub trait RootConfigurationAccessor: Send + Sync + fmt::Debug {
    /// Name under which a referenced module is looked up
    fn module_name(&self, name: &str) -> String {
        name.to_string()
    }
}

/// Resolves module names as written
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAccessor;

impl RootConfigurationAccessor for DefaultAccessor {}

pub struct RootModel {
    module: ModuleInfo,
    layers: BTreeMap<String, ModuleRootLayer>,
    current_layer: Option<String>,
    writable: bool,
    disposed: bool,
    services: Arc<ProjectServices>,
    accessor: Arc<dyn RootConfigurationAccessor>,
}

impl fmt::Debug for RootModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootModel")
            .field("module", &self.module)
            .field("layers", &self.layers)
            .field("current_layer", &self.current_layer)
            .field("writable", &self.writable)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl RootModel {
    /// A baseline model with a single initialized `Default` layer
    pub fn new(module: ModuleInfo, services: Arc<ProjectServices>) -> Self {
        let mut model = Self {
            module,
            layers: BTreeMap::new(),
            current_layer: None,
            writable: false,
            disposed: false,
            services,
            accessor: Arc::new(DefaultAccessor),
        };
        model.init_default_layer();
        model
    }

    /// A writable deep copy resolving module names as written
    pub fn modifiable(&self) -> Result<RootModel> {
        self.modifiable_with_accessor(Arc::new(DefaultAccessor))
    }

    pub fn modifiable_with_accessor(
        &self,
        accessor: Arc<dyn RootConfigurationAccessor>,
    ) -> Result<RootModel> {
        self.check_alive()?;
        let layers = self
            .layers
            .iter()
            .map(|(name, layer)| {
                let copy = ModuleRootLayer::from_original(layer, Arc::clone(&accessor), true);
                (name.clone(), copy)
            })
            .collect();
        Ok(RootModel {
            module: self.module.clone(),
            layers,
            current_layer: self.current_layer.clone(),
            writable: true,
            disposed: false,
            services: Arc::clone(&self.services),
            accessor,
        })
    }

    pub fn module_name(&self) -> &str {
        &self.module.name
    }

    pub fn module_dir_url(&self) -> Option<&str> {
        self.module.dir_url.as_deref()
    }

    pub fn module_info(&self) -> &ModuleInfo {
        &self.module
    }

    pub fn services(&self) -> &Arc<ProjectServices> {
        &self.services
    }

    pub fn accessor(&self) -> &Arc<dyn RootConfigurationAccessor> {
        &self.accessor
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    ////// LAYERS //////

    pub fn current_layer_name(&self) -> Option<&str> {
        self.current_layer.as_deref()
    }

    pub fn current_layer(&self) -> Result<&ModuleRootLayer> {
        self.check_alive()?;
        let name = self.current_layer.as_deref().unwrap_or_default();
        self.layers.get(name).ok_or_else(|| Error::LayerNotFound {
            name: name.to_string(),
        })
    }

    pub fn current_layer_mut(&mut self) -> Result<&mut ModuleRootLayer> {
        self.check_writable()?;
        let name = self.current_layer.clone().unwrap_or_default();
        self.layers
            .get_mut(&name)
            .ok_or(Error::LayerNotFound { name })
    }

    pub fn layer(&self, name: &str) -> Option<&ModuleRootLayer> {
        self.layers.get(name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Result<&mut ModuleRootLayer> {
        self.check_writable()?;
        self.layers.get_mut(name).ok_or_else(|| Error::LayerNotFound {
            name: name.to_string(),
        })
    }

    /// Layers in name order
    pub fn layers(&self) -> impl Iterator<Item = (&str, &ModuleRootLayer)> {
        self.layers.iter().map(|(name, layer)| (name.as_str(), layer))
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.keys().map(String::as_str).collect()
    }

    /// Add a layer, copying `copy_from` when that layer exists. An existing
    /// layer with the same name is returned unchanged and not activated.
    pub fn add_layer(
        &mut self,
        name: &str,
        copy_from: Option<&str>,
        activate: bool,
    ) -> Result<&mut ModuleRootLayer> {
        self.check_writable()?;
        if !self.layers.contains_key(name) {
            let layer = match copy_from.and_then(|source| self.layers.get(source)) {
                Some(source) => ModuleRootLayer::from_original(source, Arc::clone(&self.accessor), true),
                None => self.new_layer(),
            };
            self.layers.insert(name.to_string(), layer);
            if activate {
                self.current_layer = Some(name.to_string());
            }
        }
        self.layer_mut(name)
    }

    /// Make `name` current. Returns `Ok(None)` and changes nothing when no
    /// such layer exists.
    pub fn set_current_layer(&mut self, name: &str) -> Result<Option<&mut ModuleRootLayer>> {
        self.check_writable()?;
        if !self.layers.contains_key(name) {
            return Ok(None);
        }
        self.current_layer = Some(name.to_string());
        Ok(self.layers.get_mut(name))
    }

    /// Remove and dispose a layer. When the current layer goes, the first
    /// remaining layer becomes current; with `init_default` an emptied model
    /// gets a fresh `Default` layer.
    pub fn remove_layer(&mut self, name: &str, init_default: bool) -> Result<bool> {
        self.check_writable()?;
        let mut removed = match self.layers.remove(name) {
            Some(layer) => layer,
            None => return Ok(false),
        };
        removed.dispose();
        if init_default && self.layers.is_empty() {
            self.init_default_layer();
        }
        if self.current_layer.as_deref() == Some(name) {
            self.current_layer = self.layers.keys().next().cloned();
        }
        Ok(true)
    }

    pub fn remove_all_layers(&mut self, init_default: bool) -> Result<()> {
        self.check_writable()?;
        self.dispose_layers();
        self.current_layer = None;
        if init_default {
            self.init_default_layer();
        }
        Ok(())
    }

    fn new_layer(&self) -> ModuleRootLayer {
        ModuleRootLayer::new(
            self.module.clone(),
            Arc::clone(&self.services),
            Arc::clone(&self.accessor),
            self.writable,
        )
    }

    fn init_default_layer(&mut self) {
        let layer = self.new_layer();
        self.layers.insert(DEFAULT_LAYER_NAME.to_string(), layer);
        self.current_layer = Some(DEFAULT_LAYER_NAME.to_string());
    }

    fn dispose_layers(&mut self) {
        for (_, mut layer) in std::mem::take(&mut self.layers) {
            layer.dispose();
        }
    }

    ////// COMMIT //////

    /// Whether committing would change `source`: a different current layer,
    /// added or removed layers, or a changed layer. Always `false` for a
    /// model that is not writable.
    pub fn is_changed(&self, source: &RootModel) -> bool {
        if !self.writable || self.disposed {
            return false;
        }
        if self.current_layer != source.current_layer {
            return true;
        }
        let changed_or_added = self.layers.iter().any(|(name, layer)| {
            source
                .layers
                .get(name)
                .map_or(true, |original| layer.is_changed(original))
        });
        changed_or_added || source.layers.keys().any(|name| !self.layers.contains_key(name))
    }

    /// Merge every layer into `target`, drop target layers this model no
    /// longer has, then dispose this model.
    pub fn do_commit_and_dispose(&mut self, target: &mut RootModel) -> Result<()> {
        if self.disposed {
            return Err(self.violation(Error::AlreadyCommitted {
                module: self.module.name.clone(),
            }));
        }
        if !self.writable {
            return Err(self.violation(Error::NotWritable {
                module: self.module.name.clone(),
            }));
        }
        target.check_alive()?;
        self.resolve_module_references();

        for (name, layer) in &self.layers {
            match target.layers.get_mut(name) {
                Some(existing) => layer.copy_to(existing)?,
                None => {
                    let mut created = target.new_layer();
                    layer.copy_to(&mut created)?;
                    target.layers.insert(name.clone(), created);
                }
            }
        }
        let stale: Vec<String> = target
            .layers
            .keys()
            .filter(|name| !self.layers.contains_key(*name))
            .cloned()
            .collect();
        for name in stale {
            if let Some(mut layer) = target.layers.remove(&name) {
                layer.dispose();
            }
        }
        target.current_layer = match &self.current_layer {
            Some(name) if target.layers.contains_key(name) => Some(name.clone()),
            _ => target.layers.keys().next().cloned(),
        };

        self.dispose_layers();
        self.disposed = true;
        self.writable = false;
        Ok(())
    }

    /// Discard the model and every layer in it.
    pub fn dispose(&mut self) -> Result<()> {
        self.check_alive()?;
        self.dispose_layers();
        self.disposed = true;
        self.writable = false;
        Ok(())
    }

    ////// PERSISTENCE //////

    /// Replace all layers with persisted ones. An empty element yields a
    /// single initialized `Default` layer. On error nothing changes.
    pub fn load_state(
        &mut self,
        element: &RootModelElement,
        progress: Option<&dyn ProgressIndicator>,
    ) -> Result<()> {
        self.check_alive()?;
        let mut layers: BTreeMap<String, ModuleRootLayer> = BTreeMap::new();
        for layer_element in &element.layers {
            if layers.contains_key(&layer_element.name) {
                warn!(
                    "Module '{}': duplicate layer '{}' ignored",
                    self.module.name, layer_element.name
                );
                continue;
            }
            let mut layer = self.new_layer();
            if let Err(e) = layer.load_state(&layer_element.children, progress) {
                layer.dispose();
                for loaded in layers.values_mut() {
                    loaded.dispose();
                }
                return Err(e);
            }
            layers.insert(layer_element.name.clone(), layer);
        }

        self.dispose_layers();
        self.layers = layers;
        if self.layers.is_empty() {
            self.init_default_layer();
            return Ok(());
        }
        self.current_layer = match &element.current_layer {
            Some(name) if self.layers.contains_key(name) => Some(name.clone()),
            _ => self.layers.keys().next().cloned(),
        };
        Ok(())
    }

    pub fn state(&self) -> RootModelElement {
        RootModelElement {
            current_layer: self.current_layer.clone(),
            layers: self
                .layers
                .iter()
                .map(|(name, layer)| LayerElement {
                    name: name.clone(),
                    children: layer.write_state(),
                })
                .collect(),
        }
    }

    ////// CURRENT LAYER SHORTCUTS //////

    /// Modules referenced from the current layer
    pub fn dependency_module_names(&self) -> Vec<String> {
        self.current_layer()
            .map(ModuleRootLayer::dependency_module_names)
            .unwrap_or_default()
    }

    pub fn content_root_urls(&self) -> Vec<String> {
        self.current_layer()
            .map(ModuleRootLayer::content_root_urls)
            .unwrap_or_default()
    }

    pub fn source_root_urls(&self, include_tests: bool) -> Vec<String> {
        self.current_layer()
            .map(|layer| layer.source_root_urls(include_tests))
            .unwrap_or_default()
    }

    ////// RENAMES //////

    pub(crate) fn set_module_name(&mut self, name: &str) {
        self.module.name = name.to_string();
        for layer in self.layers.values_mut() {
            layer.set_module_name(name);
        }
    }

    /// Rewrite module references to the current names the accessor maps them
    /// to and switch to [`DefaultAccessor`]. Calling it again changes nothing.
    pub(crate) fn resolve_module_references(&mut self) -> usize {
        let accessor: Arc<dyn RootConfigurationAccessor> = Arc::new(DefaultAccessor);
        self.accessor = Arc::clone(&accessor);
        self.layers
            .values_mut()
            .map(|layer| layer.resolve_module_references(Arc::clone(&accessor)))
            .sum()
    }

    pub(crate) fn rename_module_references(&mut self, renames: &HashMap<String, String>) -> usize {
        self.layers
            .values_mut()
            .map(|layer| layer.rename_module_references(renames))
            .sum()
    }

    fn check_alive(&self) -> Result<()> {
        if self.disposed {
            Err(self.violation(Error::disposed(format!("root model of module {}", self.module.name))))
        } else {
            Ok(())
        }
    }

    fn check_writable(&self) -> Result<()> {
        self.check_alive()?;
        if self.writable {
            Ok(())
        } else {
            Err(self.violation(Error::NotWritable {
                module: self.module.name.clone(),
            }))
        }
    }

    fn violation(&self, error: Error) -> Error {
        error!("Module '{}': {}", self.module.name, error);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentFolderType;
    use crate::extension::SimpleExtensionProvider;
    use crate::registry::ExtensionRegistry;

    fn baseline() -> RootModel {
        let mut registry = ExtensionRegistry::new();
        registry.register_extension_provider(SimpleExtensionProvider::new("java").with_sdk(true));
        RootModel::new(
            ModuleInfo::new("app", Some("file:///work/app")),
            ProjectServices::in_memory(Arc::new(registry)),
        )
    }

    #[test]
    fn test_baseline_is_read_only() {
        let mut model = baseline();
        assert_eq!(model.current_layer_name(), Some(DEFAULT_LAYER_NAME));
        assert!(model.current_layer().is_ok());
        assert!(matches!(model.current_layer_mut(), Err(Error::NotWritable { .. })));
        assert!(matches!(model.add_layer("Test", None, true), Err(Error::NotWritable { .. })));
    }

    #[test]
    fn test_fresh_copy_is_unchanged() {
        let model = baseline();
        let copy = model.modifiable().unwrap();
        assert!(copy.is_writable());
        assert!(!copy.is_changed(&model));
    }

    #[test]
    fn test_add_layer_is_idempotent() {
        let model = baseline();
        let mut copy = model.modifiable().unwrap();
        copy.add_layer("Test", Some(DEFAULT_LAYER_NAME), false)
            .unwrap()
            .add_module_entry("fixtures")
            .unwrap();
        let again = copy.add_layer("Test", None, true).unwrap();
        assert!(again.find_module_order_entry("fixtures").is_some());
        assert_eq!(copy.current_layer_name(), Some(DEFAULT_LAYER_NAME));
        assert!(copy.is_changed(&model));
    }

    #[test]
    fn test_set_current_layer_missing_is_noop() {
        let model = baseline();
        let mut copy = model.modifiable().unwrap();
        assert!(copy.set_current_layer("Missing").unwrap().is_none());
        assert_eq!(copy.current_layer_name(), Some(DEFAULT_LAYER_NAME));

        copy.add_layer("Test", None, false).unwrap();
        assert!(copy.set_current_layer("Test").unwrap().is_some());
        assert!(copy.is_changed(&model));
    }

    #[test]
    fn test_remove_current_layer_falls_back_to_first() {
        let model = baseline();
        let mut copy = model.modifiable().unwrap();
        copy.add_layer("Release", None, true).unwrap();
        assert!(copy.remove_layer("Release", false).unwrap());
        assert_eq!(copy.current_layer_name(), Some(DEFAULT_LAYER_NAME));
        assert!(!copy.remove_layer("Release", false).unwrap());

        assert!(copy.remove_layer(DEFAULT_LAYER_NAME, true).unwrap());
        assert_eq!(copy.layer_names(), vec![DEFAULT_LAYER_NAME]);
        assert_eq!(copy.current_layer_name(), Some(DEFAULT_LAYER_NAME));
    }

    #[test]
    fn test_remove_all_layers_without_default() {
        let model = baseline();
        let mut copy = model.modifiable().unwrap();
        copy.remove_all_layers(false).unwrap();
        assert!(copy.layer_names().is_empty());
        assert!(matches!(copy.current_layer(), Err(Error::LayerNotFound { .. })));
        assert!(copy.dependency_module_names().is_empty());
    }

    #[test]
    fn test_commit_merges_layers_and_disposes_copy() {
        let mut model = baseline();
        let mut copy = model.modifiable().unwrap();
        copy.current_layer_mut()
            .unwrap()
            .add_content_entry("file:///work/app")
            .unwrap()
            .add_folder("file:///work/app/src", ContentFolderType::Production)
            .unwrap();
        copy.add_layer("Test", None, true).unwrap();

        copy.do_commit_and_dispose(&mut model).unwrap();
        assert!(copy.is_disposed());
        assert!(!copy.is_writable());
        assert_eq!(model.layer_names(), vec![DEFAULT_LAYER_NAME, "Test"]);
        assert_eq!(model.current_layer_name(), Some("Test"));
        assert_eq!(
            model.layer(DEFAULT_LAYER_NAME).unwrap().source_root_urls(false),
            vec!["file:///work/app/src"]
        );

        let second = copy.do_commit_and_dispose(&mut model);
        assert!(matches!(second, Err(Error::AlreadyCommitted { .. })));
    }

    #[test]
    fn test_commit_removes_stale_layers() {
        let mut model = baseline();
        let mut copy = model.modifiable().unwrap();
        copy.add_layer("Test", None, true).unwrap();
        copy.do_commit_and_dispose(&mut model).unwrap();

        let mut copy = model.modifiable().unwrap();
        copy.remove_layer("Test", false).unwrap();
        assert!(copy.is_changed(&model));
        copy.do_commit_and_dispose(&mut model).unwrap();
        assert_eq!(model.layer_names(), vec![DEFAULT_LAYER_NAME]);
        assert_eq!(model.current_layer_name(), Some(DEFAULT_LAYER_NAME));
    }

    #[test]
    fn test_baseline_cannot_commit() {
        let mut model = baseline();
        let mut other = baseline();
        assert!(matches!(
            other.do_commit_and_dispose(&mut model),
            Err(Error::NotWritable { .. })
        ));
    }

    #[test]
    fn test_dispose_twice_fails() {
        let model = baseline();
        let mut copy = model.modifiable().unwrap();
        copy.dispose().unwrap();
        assert!(matches!(copy.dispose(), Err(Error::Disposed { .. })));
        assert!(matches!(copy.current_layer(), Err(Error::Disposed { .. })));
        assert_eq!(model.services().pointers().live_pointer_count(), 0);
    }

    #[test]
    fn test_load_empty_state_gives_default_layer() {
        let mut model = baseline();
        model.load_state(&RootModelElement::default(), None).unwrap();
        assert_eq!(model.layer_names(), vec![DEFAULT_LAYER_NAME]);
        assert_eq!(model.current_layer().unwrap().order_entries().len(), 1);
    }

    #[test]
    fn test_state_round_trip_with_layers() {
        let mut model = baseline();
        let mut copy = model.modifiable().unwrap();
        copy.add_layer("Test", Some(DEFAULT_LAYER_NAME), true)
            .unwrap()
            .add_module_entry("fixtures")
            .unwrap();
        copy.do_commit_and_dispose(&mut model).unwrap();

        let element = model.state();
        let mut loaded = baseline();
        loaded.load_state(&element, None).unwrap();
        assert_eq!(loaded.current_layer_name(), Some("Test"));
        assert_eq!(loaded.state(), element);
    }

    #[test]
    fn test_unknown_current_layer_falls_back_to_first() {
        let yaml = r#"
current-layer: Missing
layers:
  - name: Beta
  - name: Alpha
"#;
        let element = crate::config::parse_root_model(yaml).unwrap();
        let mut model = baseline();
        model.load_state(&element, None).unwrap();
        assert_eq!(model.current_layer_name(), Some("Alpha"));
    }
}
