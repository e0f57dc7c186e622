//! Provider-defined order entries
//!
//! A custom order entry carries an opaque model owned by the provider that
//! registered its type id. The layer only stores, clones, compares and
//! persists it through [`CustomOrderEntryModel`].

use super::{OrderRootType, RootsResolver};
use crate::config::OrderEntryElement;
use crate::error::Result;
use std::any::Any;
use std::fmt;

/// Extension point name reported for unknown order entry types
pub const ORDER_ENTRY_TYPE_EXTENSION_POINT: &str = "OrderEntryTypeProvider";

/// State of one custom order entry
pub trait CustomOrderEntryModel: Send + Sync + fmt::Debug {
    fn presentable_name(&self) -> String;

    fn is_valid(&self, _resolver: &dyn RootsResolver) -> bool {
        true
    }

    fn urls(&self, _root_type: OrderRootType, _resolver: &dyn RootsResolver) -> Vec<String> {
        Vec::new()
    }

    fn is_equivalent_to(&self, other: &dyn CustomOrderEntryModel) -> bool;

    /// Attributes written next to the `type` discriminator
    fn write(&self, element: &mut OrderEntryElement);

    fn clone_model(&self) -> Box<dyn CustomOrderEntryModel>;

    fn as_any(&self) -> &dyn Any;

    fn dispose(&mut self) {}
}

/// Loads custom order entries of one type id
pub trait CustomOrderEntryTypeProvider: Send + Sync {
    fn id(&self) -> &str;

    fn load(&self, element: &OrderEntryElement) -> Result<Box<dyn CustomOrderEntryModel>>;
}

/// A custom order entry: a registered type id plus its model
#[derive(Debug)]
pub struct CustomOrderEntry {
    type_id: String,
    model: Box<dyn CustomOrderEntryModel>,
}

impl Clone for CustomOrderEntry {
    fn clone(&self) -> Self {
        Self {
            type_id: self.type_id.clone(),
            model: self.model.clone_model(),
        }
    }
}

impl CustomOrderEntry {
    pub fn new(type_id: &str, model: Box<dyn CustomOrderEntryModel>) -> Self {
        Self {
            type_id: type_id.to_string(),
            model,
        }
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn model(&self) -> &dyn CustomOrderEntryModel {
        self.model.as_ref()
    }

    pub fn model_mut(&mut self) -> &mut dyn CustomOrderEntryModel {
        self.model.as_mut()
    }

    pub(crate) fn is_equivalent_to(&self, other: &CustomOrderEntry) -> bool {
        self.type_id == other.type_id && self.model.is_equivalent_to(other.model.as_ref())
    }
}

/// A custom model that is just a named list of URLs per root type.
///
/// Registered through [`UrlListEntryType`]; handy for generated or external
/// classpath contributions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlListModel {
    pub name: String,
    pub classes: Vec<String>,
    pub sources: Vec<String>,
}

impl CustomOrderEntryModel for UrlListModel {
    fn presentable_name(&self) -> String {
        self.name.clone()
    }

    fn urls(&self, root_type: OrderRootType, _resolver: &dyn RootsResolver) -> Vec<String> {
        match root_type {
            OrderRootType::Classes => self.classes.clone(),
            OrderRootType::Sources => self.sources.clone(),
            OrderRootType::Documentation => Vec::new(),
        }
    }

    fn is_equivalent_to(&self, other: &dyn CustomOrderEntryModel) -> bool {
        other
            .as_any()
            .downcast_ref::<UrlListModel>()
            .map_or(false, |other| other.name == self.name)
    }

    fn write(&self, element: &mut OrderEntryElement) {
        element.attributes.insert("name".to_string(), self.name.as_str().into());
        for (key, urls) in [("classes", &self.classes), ("sources", &self.sources)] {
            if !urls.is_empty() {
                let values = urls.iter().map(|u| serde_yaml::Value::from(u.as_str())).collect();
                element
                    .attributes
                    .insert(key.to_string(), serde_yaml::Value::Sequence(values));
            }
        }
    }

    fn clone_model(&self) -> Box<dyn CustomOrderEntryModel> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Provider for [`UrlListModel`] entries under a configurable type id
#[derive(Debug, Clone)]
pub struct UrlListEntryType {
    id: String,
}

impl UrlListEntryType {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl CustomOrderEntryTypeProvider for UrlListEntryType {
    fn id(&self) -> &str {
        &self.id
    }

    fn load(&self, element: &OrderEntryElement) -> Result<Box<dyn CustomOrderEntryModel>> {
        let urls = |key: &str| -> Vec<String> {
            element
                .attributes
                .get(key)
                .and_then(serde_yaml::Value::as_sequence)
                .map(|seq| seq.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                .unwrap_or_default()
        };
        Ok(Box::new(UrlListModel {
            name: element.string("name")?.to_string(),
            classes: urls("classes"),
            sources: urls("sources"),
        }))
    }
}
