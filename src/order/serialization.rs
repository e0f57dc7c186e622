//! Persisted form of order entries
//!
//! Every entry is written as an `order-entry` block whose `type` attribute
//! selects the loader. Built-in kinds are handled here; any other type id is
//! looked up among the registry's custom order entry providers.
//!
//! A library entry of level `module` carries the library itself under a
//! `roots` attribute; see [`load_module_library`].

use super::custom::{CustomOrderEntry, ORDER_ENTRY_TYPE_EXTENSION_POINT};
use super::library::{Library, MODULE_LEVEL};
use super::{
    DependencyScope, LibraryOrderEntry, ModuleExtensionWithSdkOrderEntry, ModuleOrderEntry,
    OrderEntry, OrderEntryKind, OrderRootType,
};
use crate::config::OrderEntryElement;
use crate::error::{Error, Result};
use crate::services::ProjectServices;
use log::warn;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

pub const MODULE_SOURCE: &str = "module-source";
pub const LIBRARY: &str = "library";
pub const MODULE: &str = "module";
pub const MODULE_EXTENSION_SDK: &str = "module-extension-sdk";

const NAME: &str = "name";
const LEVEL: &str = "level";
const EXPORTED: &str = "exported";
const SCOPE: &str = "scope";
const PRODUCTION_ON_TEST: &str = "production-on-test";
const EXTENSION_ID: &str = "extension-id";
const ROOTS: &str = "roots";

/// Build an entry kind from its persisted form.
///
/// Returns `Ok(None)` for a type id nobody registered; the id is reported to
/// the unknown-features collector and the block is dropped.
pub fn load_order_entry(
    element: &OrderEntryElement,
    services: &ProjectServices,
) -> Result<Option<OrderEntryKind>> {
    let kind = match element.type_id.as_str() {
        MODULE_SOURCE => OrderEntryKind::ModuleSource,
        LIBRARY => OrderEntryKind::Library(LibraryOrderEntry {
            name: element.string(NAME)?.to_string(),
            level: element
                .optional_string(LEVEL)?
                .unwrap_or(super::library::PROJECT_LEVEL)
                .to_string(),
            exported: element.flag(EXPORTED)?,
            scope: load_scope(element)?,
        }),
        MODULE => OrderEntryKind::Module(ModuleOrderEntry {
            module_name: element.string(NAME)?.to_string(),
            exported: element.flag(EXPORTED)?,
            scope: load_scope(element)?,
            production_on_test: element.flag(PRODUCTION_ON_TEST)?,
        }),
        MODULE_EXTENSION_SDK => OrderEntryKind::ModuleExtensionWithSdk(ModuleExtensionWithSdkOrderEntry {
            extension_id: element.string(EXTENSION_ID)?.to_string(),
        }),
        type_id => match services.registry().order_entry_type(type_id) {
            Some(provider) => OrderEntryKind::Custom(CustomOrderEntry::new(type_id, provider.load(element)?)),
            None => {
                warn!("Skipping order entry of unknown type '{}'", type_id);
                services
                    .unknown_features()
                    .register(ORDER_ENTRY_TYPE_EXTENSION_POINT, type_id);
                return Ok(None);
            }
        },
    };
    Ok(Some(kind))
}

/// Inverse of [`load_order_entry`]. Default-valued attributes are omitted.
pub fn store_order_entry(entry: &OrderEntry) -> OrderEntryElement {
    let mut element = OrderEntryElement::new(entry.type_id());
    match entry.kind() {
        OrderEntryKind::ModuleSource => {}
        OrderEntryKind::Library(library) => {
            element = element
                .with(NAME, library.name.as_str())
                .with(LEVEL, library.level.as_str());
            element = store_flags(element, library.exported, library.scope);
        }
        OrderEntryKind::Module(module) => {
            element = element.with(NAME, module.module_name.as_str());
            element = store_flags(element, module.exported, module.scope);
            if module.production_on_test {
                element = element.with(PRODUCTION_ON_TEST, true);
            }
        }
        OrderEntryKind::ModuleExtensionWithSdk(sdk) => {
            element = element.with(EXTENSION_ID, sdk.extension_id.as_str());
        }
        OrderEntryKind::Custom(custom) => custom.model().write(&mut element),
    }
    element
}

/// The module-level library persisted inline with a library entry.
///
/// `Ok(None)` when the entry has no `roots` attribute: it then refers to a
/// module library that does not exist.
pub fn load_module_library(
    element: &OrderEntryElement,
    entry: &LibraryOrderEntry,
) -> Result<Option<Library>> {
    let value = match element.attributes.get(ROOTS) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let roots: BTreeMap<OrderRootType, Vec<String>> =
        serde_yaml::from_value(value.clone()).map_err(|e| Error::ConfigParse {
            message: format!("Roots of module library '{}': {}", entry.name, e),
            hint: Some("Use lists of URLs under classes, sources or documentation".to_string()),
        })?;
    let mut library = Library::new(&entry.name, MODULE_LEVEL);
    for (root_type, urls) in roots {
        for url in &urls {
            library.add_root(root_type, url);
        }
    }
    Ok(Some(library))
}

/// Attach a module-level library to its stored entry.
pub fn store_module_library(element: OrderEntryElement, library: &Library) -> OrderEntryElement {
    let mut roots = Mapping::new();
    for (root_type, urls) in library.roots() {
        let urls = urls.iter().map(|url| Value::from(url.as_str())).collect();
        roots.insert(Value::from(root_type.id()), Value::Sequence(urls));
    }
    element.with(ROOTS, Value::Mapping(roots))
}

fn load_scope(element: &OrderEntryElement) -> Result<DependencyScope> {
    match element.optional_string(SCOPE)? {
        None => Ok(DependencyScope::default()),
        Some(id) => DependencyScope::from_id(id).ok_or_else(|| Error::ConfigParse {
            message: format!("Unknown dependency scope '{}'", id),
            hint: Some("Use one of COMPILE, RUNTIME, TEST, PROVIDED".to_string()),
        }),
    }
}

fn store_flags(mut element: OrderEntryElement, exported: bool, scope: DependencyScope) -> OrderEntryElement {
    if exported {
        element = element.with(EXPORTED, true);
    }
    if scope != DependencyScope::default() {
        element = element.with(SCOPE, scope.id());
    }
    element
}
