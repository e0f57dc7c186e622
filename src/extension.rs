//! Module extensions: provider-supplied, per-layer state blocks
//!
//! Every registered [`ModuleExtensionProvider`] contributes one extension to
//! every layer. Baseline layers hold immutable extensions that only change
//! through [`ModuleExtension::commit`]; writable copies hold mutable ones.

use crate::config::ExtensionElement;
use crate::error::{Error, Result};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Extension point name reported for unknown extension ids
pub const EXTENSION_POINT: &str = "ModuleExtensionProvider";

const ID: &str = "id";
const ENABLED: &str = "enabled";
const SDK: &str = "sdk";

/// Creates the extension a provider contributes to each layer.
pub trait ModuleExtensionProvider: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str {
        self.id()
    }

    /// Whether extensions of this provider may name an SDK
    fn supports_sdk(&self) -> bool {
        false
    }

    fn create_extension(&self, mutable: bool) -> ModuleExtension {
        ModuleExtension::new(self.id(), mutable)
    }
}

/// A provider defined entirely by its registration data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleExtensionProvider {
    id: String,
    name: Option<String>,
    sdk: bool,
}

impl SimpleExtensionProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            sdk: false,
        }
    }

    pub fn with_sdk(mut self, sdk: bool) -> Self {
        self.sdk = sdk;
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
}

impl ModuleExtensionProvider for SimpleExtensionProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    fn supports_sdk(&self) -> bool {
        self.sdk
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleExtension {
    id: String,
    enabled: bool,
    sdk_name: Option<String>,
    properties: BTreeMap<String, String>,
    mutable: bool,
}

impl ModuleExtension {
    pub fn new(id: &str, mutable: bool) -> Self {
        Self {
            id: id.to_string(),
            enabled: false,
            sdk_name: None,
            properties: BTreeMap::new(),
            mutable,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn sdk_name(&self) -> Option<&str> {
        self.sdk_name.as_deref()
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.check_mutable()?;
        self.enabled = enabled;
        Ok(())
    }

    pub fn set_sdk_name(&mut self, sdk_name: Option<&str>) -> Result<()> {
        self.check_mutable()?;
        self.sdk_name = sdk_name.map(str::to_string);
        Ok(())
    }

    pub fn set_property(&mut self, key: &str, value: &str) -> Result<Option<String>> {
        self.check_mutable()?;
        Ok(self.properties.insert(key.to_string(), value.to_string()))
    }

    pub fn remove_property(&mut self, key: &str) -> Result<Option<String>> {
        self.check_mutable()?;
        Ok(self.properties.remove(key))
    }

    /// Whether the state differs from `original`. Mutability is not state.
    pub fn is_modified(&self, original: &ModuleExtension) -> bool {
        self.enabled != original.enabled
            || self.sdk_name != original.sdk_name
            || self.properties != original.properties
    }

    /// Copy the state of `from` into this extension, mutable or not.
    pub fn commit(&mut self, from: &ModuleExtension) {
        self.enabled = from.enabled;
        self.sdk_name = from.sdk_name.clone();
        self.properties = from.properties.clone();
    }

    /// A copy of this extension with the given mutability
    pub(crate) fn with_mutability(&self, mutable: bool) -> ModuleExtension {
        ModuleExtension {
            mutable,
            ..self.clone()
        }
    }

    /// Replace the state with a persisted block. Scalar attributes other than
    /// `id`, `enabled` and `sdk` become properties.
    pub fn load_state(&mut self, element: &ExtensionElement) -> Result<()> {
        let mut enabled = false;
        let mut sdk_name = None;
        let mut properties = BTreeMap::new();
        for (key, value) in element.iter() {
            let key = key.as_str().ok_or_else(|| {
                Error::config(format!("Extension '{}' has a non-string attribute name", self.id))
            })?;
            match key {
                ID => {}
                ENABLED => {
                    enabled = value.as_bool().ok_or_else(|| {
                        Error::config(format!("'enabled' of extension '{}' must be a boolean", self.id))
                    })?
                }
                SDK => sdk_name = value.as_str().map(str::to_string),
                _ => {
                    properties.insert(key.to_string(), scalar_to_string(&self.id, key, value)?);
                }
            }
        }
        self.enabled = enabled;
        self.sdk_name = sdk_name;
        self.properties = properties;
        Ok(())
    }

    /// The persisted block, or `None` when the extension is disabled
    pub fn state(&self) -> Option<ExtensionElement> {
        if !self.enabled {
            return None;
        }
        let mut element = ExtensionElement::new(&self.id);
        element.insert(ENABLED, true);
        if let Some(sdk) = &self.sdk_name {
            element.insert(SDK, sdk.as_str());
        }
        for (key, value) in &self.properties {
            element.insert(key, value.as_str());
        }
        Some(element)
    }

    fn check_mutable(&self) -> Result<()> {
        if self.mutable {
            Ok(())
        } else {
            Err(Error::ImmutableExtension { id: self.id.clone() })
        }
    }
}

fn scalar_to_string(id: &str, key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::ConfigParse {
            message: format!("Property '{}' of extension '{}' is not a scalar", key, id),
            hint: Some("Extension properties must be strings, numbers or booleans".to_string()),
        }),
    }
}
