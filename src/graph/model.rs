//! Node and edge types for the typed property graph.
//!
//! Shape is grounded on `graph/store_models.rs`'s `CodeNode`/`CodeEdge`
//! (builder-style `with_*` setters, typed `get_i64`/`get_str` property
//! accessors) generalized from one struct into a tagged union of node
//! variants, since the spec requires variant-specific fields a single
//! `CodeNode` struct cannot carry.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known node type tags, as registered in the `NodeTypeRegistry` (C3).
pub mod type_tags {
    pub const FILE: &str = "file";
    pub const CLASS: &str = "java_class";
    pub const PACKAGE: &str = "package";
    pub const IMPORTED_CLASS: &str = "imported_class";
}

/// Well-known edge type constants. `edge_type` itself stays a `String` per
/// spec.md §3 — new relationship kinds can be introduced by inspectors
/// without touching this crate.
pub mod edge_types {
    pub const CONTAINS: &str = "contains";
    pub const DEPENDS_ON: &str = "depends_on";
    pub const EXTENDS: &str = "extends";
    pub const IMPLEMENTS: &str = "implements";
    pub const USES: &str = "uses";
    pub const IMPORTS: &str = "imports";
    pub const CALLS: &str = "calls";
}

/// Kind discriminant, used for `getNodesByClass`-style filtering without
/// matching on the full `NodeData` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Class,
    Package,
    ImportedClass,
}

impl NodeKind {
    pub fn type_tag(&self) -> &'static str {
        match self {
            NodeKind::File => type_tags::FILE,
            NodeKind::Class => type_tags::CLASS,
            NodeKind::Package => type_tags::PACKAGE,
            NodeKind::ImportedClass => type_tags::IMPORTED_CLASS,
        }
    }
}

/// Fields shared by every node variant: identity, the property bag, the tag
/// set, per-inspector execution timestamps, and `last_modified` (invariant 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCommon {
    pub id: String,
    pub node_type: String,
    pub display_label: String,
    pub properties: HashMap<String, Value>,
    pub tags: HashSet<String>,
    pub inspector_execution_times: HashMap<String, DateTime<Utc>>,
    pub last_modified: DateTime<Utc>,
    pub metrics: HashMap<String, f64>,
}

impl NodeCommon {
    pub fn new(id: impl Into<String>, node_type: &str, display_label: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            node_type: node_type.to_string(),
            display_label: display_label.into(),
            properties: HashMap::new(),
            tags: HashSet::new(),
            inspector_execution_times: HashMap::new(),
            last_modified: now,
            metrics: HashMap::new(),
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.properties.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.properties.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    /// Is `inspector` up to date on this node? (spec.md §4.9: `lastExecutedAt[X] >= lastModified`)
    pub fn is_up_to_date(&self, inspector: &str) -> bool {
        self.inspector_execution_times
            .get(inspector)
            .is_some_and(|t| *t >= self.last_modified)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    Class,
    Interface,
    Enum,
    Annotation,
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
    Source,
    Binary,
}

pub const DEFAULT_PACKAGE_ID: &str = "(default)";

/// Metric keys stored in `NodeCommon::metrics` for `ClassNode`s (spec.md §3:
/// "numeric metrics get their own numeric map" — design note in spec.md §9).
pub mod class_metrics {
    pub const METHOD_COUNT: &str = "methodCount";
    pub const FIELD_COUNT: &str = "fieldCount";
    pub const CYCLOMATIC: &str = "cyclomatic";
    pub const WMC: &str = "wmc";
    pub const CA: &str = "ca";
    pub const CE: &str = "ce";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileNode {
    pub common: NodeCommon,
    pub relative_path: String,
    pub file_name: String,
    pub file_extension: String,
    pub last_fs_modified: DateTime<Utc>,
    pub source_archive_path: Option<String>,
    pub archive_entry_path: Option<String>,
    pub from_archive: bool,
}

impl FileNode {
    pub fn new(id: impl Into<String>, relative_path: impl Into<String>) -> Self {
        let id = id.into();
        let relative_path = relative_path.into();
        let file_name = relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&relative_path)
            .to_string();
        let file_extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_string())
            .unwrap_or_default();
        Self {
            common: NodeCommon::new(id, type_tags::FILE, relative_path.clone()),
            relative_path,
            file_name,
            file_extension,
            last_fs_modified: Utc::now(),
            source_archive_path: None,
            archive_entry_path: None,
            from_archive: false,
        }
    }

    pub fn from_archive(
        id: impl Into<String>,
        relative_path: impl Into<String>,
        file_name: impl Into<String>,
        file_extension: impl Into<String>,
        source_archive_path: impl Into<String>,
        archive_entry_path: impl Into<String>,
    ) -> Self {
        let id = id.into();
        let relative_path = relative_path.into();
        let mut node = Self {
            common: NodeCommon::new(id, type_tags::FILE, relative_path.clone()),
            relative_path,
            file_name: file_name.into(),
            file_extension: file_extension.into(),
            last_fs_modified: Utc::now(),
            source_archive_path: Some(source_archive_path.into()),
            archive_entry_path: Some(archive_entry_path.into()),
            from_archive: true,
        };
        node.common.tags.insert("archive_entry".to_string());
        node
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassNode {
    pub common: NodeCommon,
    pub simple_name: String,
    pub package_name: String,
    pub class_kind: ClassKind,
    pub source_origin: SourceOrigin,
    pub project_file_id: Option<String>,
}

impl ClassNode {
    pub fn new(fqn: impl Into<String>) -> Self {
        let fqn = fqn.into();
        let (package_name, simple_name) = split_fqn(&fqn);
        Self {
            common: NodeCommon::new(fqn.clone(), type_tags::CLASS, fqn),
            simple_name,
            package_name,
            class_kind: ClassKind::Class,
            source_origin: SourceOrigin::Source,
            project_file_id: None,
        }
    }

    pub fn is_in_default_package(&self) -> bool {
        self.package_name.is_empty()
    }

    pub fn package_node_id(&self) -> String {
        if self.is_in_default_package() {
            DEFAULT_PACKAGE_ID.to_string()
        } else {
            self.package_name.clone()
        }
    }

    pub fn method_count(&self) -> Option<f64> {
        self.common.get_metric(class_metrics::METHOD_COUNT)
    }

    pub fn field_count(&self) -> Option<f64> {
        self.common.get_metric(class_metrics::FIELD_COUNT)
    }

    pub fn cyclomatic(&self) -> Option<f64> {
        self.common.get_metric(class_metrics::CYCLOMATIC)
    }

    pub fn wmc(&self) -> Option<f64> {
        self.common.get_metric(class_metrics::WMC)
    }
}

/// Split a fully-qualified name into (package, simple name). Empty package
/// for top-level/default-package types.
pub fn split_fqn(fqn: &str) -> (String, String) {
    match fqn.rsplit_once('.') {
        Some((pkg, simple)) => (pkg.to_string(), simple.to_string()),
        None => (String::new(), fqn.to_string()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageNode {
    pub common: NodeCommon,
}

impl PackageNode {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = if name.is_empty() {
            DEFAULT_PACKAGE_ID.to_string()
        } else {
            name
        };
        Self {
            common: NodeCommon::new(id.clone(), type_tags::PACKAGE, id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedClassNode {
    pub common: NodeCommon,
    pub simple_name: String,
}

impl ImportedClassNode {
    pub fn new(fqn: impl Into<String>) -> Self {
        let fqn = fqn.into();
        let (_, simple_name) = split_fqn(&fqn);
        Self {
            common: NodeCommon::new(fqn.clone(), type_tags::IMPORTED_CLASS, fqn),
            simple_name,
        }
    }
}

/// A node in the graph: a tagged union over the four concrete variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum GraphNode {
    File(FileNode),
    Class(ClassNode),
    Package(PackageNode),
    ImportedClass(ImportedClassNode),
}

impl GraphNode {
    pub fn common(&self) -> &NodeCommon {
        match self {
            GraphNode::File(n) => &n.common,
            GraphNode::Class(n) => &n.common,
            GraphNode::Package(n) => &n.common,
            GraphNode::ImportedClass(n) => &n.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut NodeCommon {
        match self {
            GraphNode::File(n) => &mut n.common,
            GraphNode::Class(n) => &mut n.common,
            GraphNode::Package(n) => &mut n.common,
            GraphNode::ImportedClass(n) => &mut n.common,
        }
    }

    pub fn id(&self) -> &str {
        &self.common().id
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            GraphNode::File(_) => NodeKind::File,
            GraphNode::Class(_) => NodeKind::Class,
            GraphNode::Package(_) => NodeKind::Package,
            GraphNode::ImportedClass(_) => NodeKind::ImportedClass,
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            GraphNode::File(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileNode> {
        match self {
            GraphNode::File(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassNode> {
        match self {
            GraphNode::Class(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_class_mut(&mut self) -> Option<&mut ClassNode> {
        match self {
            GraphNode::Class(n) => Some(n),
            _ => None,
        }
    }
}

/// An edge in the graph. Directed; `edge_type` plus `(source_id, target_id)`
/// forms the uniqueness key enforced by `GraphRepository` (invariant 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub edge_type: String,
    pub metadata: Option<HashMap<String, Value>>,
}

impl GraphEdge {
    pub fn new(
        id: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        edge_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            edge_type: edge_type.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
