//! NodeTypeRegistry and factories (C3).
//!
//! New relative to the teacher (no persistence round trip there); grounded
//! in the registration-by-name pattern of `detectors::engine::DetectorEngine::
//! register`/`register_all` and the construct/apply-properties/apply-metrics/
//! apply-tags template spec.md §4.2 describes. The richer (factory-map)
//! variant is implemented per the Open Question resolution in DESIGN.md.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::model::{
    type_tags, ClassKind, ClassNode, FileNode, GraphNode, ImportedClassNode, NodeCommon,
    PackageNode, SourceOrigin,
};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("no factory registered for node type '{0}'")]
    UnknownType(String),

    #[error("duplicate factory registration for node type '{0}'")]
    DuplicateType(String),
}

/// A record as read back from the persistence adapter: raw enough that any
/// factory can reconstruct its node variant from it.
#[derive(Debug, Clone)]
pub struct StoredNode {
    pub id: String,
    pub node_type: String,
    pub display_label: String,
    pub properties: HashMap<String, Value>,
    pub metrics: HashMap<String, f64>,
    pub tags: HashSet<String>,
    pub inspector_execution_times: HashMap<String, DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
}

/// Reconstructs a node from a [`StoredNode`]. Only step 1 (minimal
/// construction) varies per type; steps 2-4 (properties/metrics/tags) are
/// shared and applied by [`NodeTypeRegistry::reconstruct`].
pub trait NodeFactory: Send + Sync {
    fn node_type(&self) -> &'static str;

    /// Step 1: construct the minimal node from id/type alone. Common fields
    /// (properties/metrics/tags/timestamps) are overwritten by the caller.
    fn construct_minimal(&self, stored: &StoredNode) -> GraphNode;
}

pub struct FileNodeFactory;

impl NodeFactory for FileNodeFactory {
    fn node_type(&self) -> &'static str {
        type_tags::FILE
    }

    fn construct_minimal(&self, stored: &StoredNode) -> GraphNode {
        // File-origin quirk (spec.md §4.2): an archive-origin FileNode is
        // reconstructed from stored relativePath/fileName/extension/
        // sourceArchivePath/archiveEntryPath, never by re-relativizing a
        // filesystem path, since those belong to a synthetic archive fs.
        let relative_path = stored
            .properties
            .get("relativePath")
            .and_then(|v| v.as_str())
            .unwrap_or(&stored.id)
            .to_string();
        let source_archive_path = stored
            .properties
            .get("sourceArchivePath")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let archive_entry_path = stored
            .properties
            .get("archiveEntryPath")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        if let (Some(archive), Some(entry)) = (&source_archive_path, &archive_entry_path) {
            let file_name = stored
                .properties
                .get("fileName")
                .and_then(|v| v.as_str())
                .unwrap_or(&relative_path)
                .to_string();
            let extension = stored
                .properties
                .get("fileExtension")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            GraphNode::File(FileNode::from_archive(
                stored.id.clone(),
                relative_path,
                file_name,
                extension,
                archive.clone(),
                entry.clone(),
            ))
        } else {
            GraphNode::File(FileNode::new(stored.id.clone(), relative_path))
        }
    }
}

pub struct ClassNodeFactory;

impl NodeFactory for ClassNodeFactory {
    fn node_type(&self) -> &'static str {
        type_tags::CLASS
    }

    fn construct_minimal(&self, stored: &StoredNode) -> GraphNode {
        let mut class = ClassNode::new(stored.id.clone());
        if let Some(kind) = stored.properties.get("classKind").and_then(|v| v.as_str()) {
            class.class_kind = match kind {
                "interface" => ClassKind::Interface,
                "enum" => ClassKind::Enum,
                "annotation" => ClassKind::Annotation,
                "record" => ClassKind::Record,
                _ => ClassKind::Class,
            };
        }
        if stored.properties.get("sourceOrigin").and_then(|v| v.as_str()) == Some("binary") {
            class.source_origin = SourceOrigin::Binary;
        }
        class.project_file_id = stored
            .properties
            .get("projectFileId")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        GraphNode::Class(class)
    }
}

pub struct PackageNodeFactory;

impl NodeFactory for PackageNodeFactory {
    fn node_type(&self) -> &'static str {
        type_tags::PACKAGE
    }

    fn construct_minimal(&self, stored: &StoredNode) -> GraphNode {
        GraphNode::Package(PackageNode::new(stored.id.clone()))
    }
}

pub struct ImportedClassNodeFactory;

impl NodeFactory for ImportedClassNodeFactory {
    fn node_type(&self) -> &'static str {
        type_tags::IMPORTED_CLASS
    }

    fn construct_minimal(&self, stored: &StoredNode) -> GraphNode {
        GraphNode::ImportedClass(ImportedClassNode::new(stored.id.clone()))
    }
}

pub struct NodeTypeRegistry {
    factories: HashMap<&'static str, Arc<dyn NodeFactory>>,
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::with_builtin_types()
    }
}

impl NodeTypeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// The four node kinds spec.md §3 names, pre-registered.
    pub fn with_builtin_types() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(FileNodeFactory)).unwrap();
        registry.register(Arc::new(ClassNodeFactory)).unwrap();
        registry.register(Arc::new(PackageNodeFactory)).unwrap();
        registry.register(Arc::new(ImportedClassNodeFactory)).unwrap();
        registry
    }

    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) -> Result<(), RegistryError> {
        let node_type = factory.node_type();
        if self.factories.contains_key(node_type) {
            return Err(RegistryError::DuplicateType(node_type.to_string()));
        }
        self.factories.insert(node_type, factory);
        Ok(())
    }

    pub fn is_registered(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Reconstruct a fully hydrated node from a stored record, applying the
    /// shared steps 2-4 (properties, metrics, tags) after the factory's
    /// type-specific step 1.
    pub fn reconstruct(&self, stored: &StoredNode) -> Result<GraphNode, RegistryError> {
        let factory = self
            .factories
            .get(stored.node_type.as_str())
            .ok_or_else(|| RegistryError::UnknownType(stored.node_type.clone()))?;
        let mut node = factory.construct_minimal(stored);
        let common = node.common_mut();
        common.display_label = stored.display_label.clone();
        common.properties = stored.properties.clone();
        common.metrics = stored.metrics.clone();
        common.tags = stored.tags.clone();
        common.inspector_execution_times = stored.inspector_execution_times.clone();
        common.last_modified = stored.last_modified;
        Ok(node)
    }
}

/// Construct a [`StoredNode`] from a minimal id/type/label; used by tests and
/// by the persistence adapter's row-to-record mapping.
impl StoredNode {
    pub fn minimal(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        let common = NodeCommon::new(id, &node_type.into(), "");
        Self {
            id: common.id,
            node_type: common.node_type,
            display_label: common.display_label,
            properties: common.properties,
            metrics: common.metrics,
            tags: common.tags,
            inspector_execution_times: common.inspector_execution_times,
            last_modified: common.last_modified,
        }
    }
}
