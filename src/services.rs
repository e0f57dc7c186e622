//! Project-wide services shared by every model of one project

use crate::registry::ExtensionRegistry;
use crate::vfs::{MemoryVfs, VirtualFilePointerManager, VirtualFileSystem};
use log::warn;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

/// A persisted feature no registered provider understands
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnknownFeature {
    /// Name of the extension point that failed to resolve the id
    pub extension_point: String,
    pub id: String,
}

/// Collects unknown features encountered while loading
#[derive(Debug, Default)]
pub struct UnknownFeaturesCollector {
    features: Mutex<BTreeSet<UnknownFeature>>,
}

impl UnknownFeaturesCollector {
    /// Record an unknown feature. Returns `false` if it was already known.
    pub fn register(&self, extension_point: &str, id: &str) -> bool {
        let feature = UnknownFeature {
            extension_point: extension_point.to_string(),
            id: id.to_string(),
        };
        let mut features = self.features.lock().unwrap_or_else(|e| e.into_inner());
        let inserted = features.insert(feature);
        if inserted {
            warn!("Unknown {} '{}': preserved but not interpreted", extension_point, id);
        }
        inserted
    }

    /// All recorded features in sorted order
    pub fn features(&self) -> Vec<UnknownFeature> {
        let features = self.features.lock().unwrap_or_else(|e| e.into_inner());
        features.iter().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.features
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}

/// Registry, file system and pointer bookkeeping for one project
#[derive(Debug)]
pub struct ProjectServices {
    registry: Arc<ExtensionRegistry>,
    file_system: Arc<dyn VirtualFileSystem>,
    pointers: VirtualFilePointerManager,
    unknown_features: UnknownFeaturesCollector,
}

impl ProjectServices {
    pub fn new(registry: Arc<ExtensionRegistry>, file_system: Arc<dyn VirtualFileSystem>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            file_system,
            pointers: VirtualFilePointerManager::new(),
            unknown_features: UnknownFeaturesCollector::default(),
        })
    }

    /// Services backed by an empty in-memory file system
    pub fn in_memory(registry: Arc<ExtensionRegistry>) -> Arc<Self> {
        Self::new(registry, Arc::new(MemoryVfs::new()))
    }

    pub fn registry(&self) -> &ExtensionRegistry {
        &self.registry
    }

    pub fn file_system(&self) -> &dyn VirtualFileSystem {
        self.file_system.as_ref()
    }

    pub fn pointers(&self) -> &VirtualFilePointerManager {
        &self.pointers
    }

    pub fn unknown_features(&self) -> &UnknownFeaturesCollector {
        &self.unknown_features
    }
}
