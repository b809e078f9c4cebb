//! The Inspector contract and the NodeDecorator capability (C5).
//!
//! Directly grounded on `detectors::base::Detector` (`name`/`description`/
//! `detect`/`scope`/`is_dependent`/`dependencies`), kept the `Send + Sync`
//! bound and the `&'static str` name convention, generalized with an
//! explicit `TargetKind` (the teacher has one node shape and queries by
//! `NodeKind` inline) and `requires`/`produces` tag sets (new: the teacher
//! has no tag-dependency system).

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::graph::{GraphNode, GraphRepository};

#[derive(Debug, thiserror::Error)]
pub enum InspectorError {
    #[error("{0}")]
    Failed(String),
}

impl InspectorError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// The node variant(s) an inspector declares itself against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    File,
    Class,
    Any,
}

impl TargetKind {
    /// Whether an inspector declaring this target kind may run in a phase
    /// that processes `actual` nodes (spec.md §4.9: "wrong target are
    /// filtered out, not errored").
    pub fn matches(&self, actual: TargetKind) -> bool {
        matches!(self, TargetKind::Any) || *self == actual
    }
}

/// Static requires/produces tag metadata (spec.md §4.4/§4.5).
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    pub requires: HashSet<String>,
    pub produces: HashSet<String>,
}

impl Dependencies {
    pub fn new(requires: &[&str], produces: &[&str]) -> Self {
        Self {
            requires: requires.iter().map(|s| s.to_string()).collect(),
            produces: produces.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Capability given to inspectors to mutate the node under analysis.
/// Mutations go only through here (spec.md §4.4); it is the sole owner of
/// the `&mut GraphNode` reference, avoiding an aliasing conflict that would
/// arise from `inspect` taking both `&GraphNode` and `&mut NodeDecorator`
/// wrapping the same node.
pub struct NodeDecorator<'a> {
    node: &'a mut GraphNode,
    /// Non-tag-only changes must advance `last_modified`; tag-only changes
    /// (`enable_tag`) must not (spec.md §9, Open Question 1).
    mutated_data: bool,
}

impl<'a> NodeDecorator<'a> {
    pub fn new(node: &'a mut GraphNode) -> Self {
        Self {
            node,
            mutated_data: false,
        }
    }

    pub fn node(&self) -> &GraphNode {
        self.node
    }

    pub fn set_property(&mut self, key: &str, value: serde_json::Value) {
        self.node
            .common_mut()
            .properties
            .insert(key.to_string(), value);
        self.mutated_data = true;
    }

    /// Tag-only change: does not advance `last_modified`.
    pub fn enable_tag(&mut self, tag: &str) {
        self.node.common_mut().tags.insert(tag.to_string());
    }

    pub fn set_metric(&mut self, key: &str, value: f64) {
        self.node.common_mut().metrics.insert(key.to_string(), value);
        self.mutated_data = true;
    }

    /// Records an inspector failure into `processing.error` without
    /// unwinding the executor (spec.md §4.9's exception policy).
    pub fn error(&mut self, message: &str) {
        self.set_property(
            "processing.error",
            serde_json::Value::String(format!("ERROR: {message}")),
        );
    }

    /// Commits the pending `last_modified` advance, if any non-tag-only
    /// mutation occurred. Called by the executor after `inspect` returns.
    pub fn finish(self) {
        if self.mutated_data {
            self.node.common_mut().last_modified = Utc::now();
        }
    }
}

/// A bounded analyzer over one node variant.
pub trait Inspector: Send + Sync {
    fn name(&self) -> &'static str;

    fn target_kind(&self) -> TargetKind;

    /// Cheap structural predicate.
    fn supports(&self, node: &GraphNode) -> bool;

    /// Stricter gate used by the scheduler: combines `supports` with tag
    /// predicates (default: `supports` plus "all required tags present").
    fn can_process(&self, node: &GraphNode) -> bool {
        self.supports(node) && self.dependencies().requires.iter().all(|t| node.common().has_tag(t))
    }

    /// Performs the analysis; mutations go only through `decorator`.
    fn inspect(&self, decorator: &mut NodeDecorator) -> Result<(), InspectorError>;

    fn dependencies(&self) -> Dependencies {
        Dependencies::default()
    }
}

/// A constrained phase-1 inspector: tags files by extension, filename, or
/// content-sniff; never sets arbitrary properties beyond coarse language/
/// format classification.
pub trait FileDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, node: &GraphNode) -> bool;

    fn detect(&self, decorator: &mut NodeDecorator) -> Result<(), InspectorError>;
}

/// Adapts a [`FileDetector`] into the general [`Inspector`] contract so the
/// phase-1 walk can share the executor's node-decoration plumbing.
pub struct FileDetectorInspector<D: FileDetector> {
    detector: D,
}

impl<D: FileDetector> FileDetectorInspector<D> {
    pub fn new(detector: D) -> Self {
        Self { detector }
    }
}

impl<D: FileDetector> Inspector for FileDetectorInspector<D> {
    fn name(&self) -> &'static str {
        self.detector.name()
    }

    fn target_kind(&self) -> TargetKind {
        TargetKind::File
    }

    fn supports(&self, node: &GraphNode) -> bool {
        self.detector.supports(node)
    }

    fn can_process(&self, node: &GraphNode) -> bool {
        self.detector.supports(node)
    }

    fn inspect(&self, decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
        self.detector.detect(decorator)
    }
}

/// Is `inspector_name` up-to-date on the node stored in `repo` under `id`?
/// Convenience wrapper over `NodeCommon::is_up_to_date` for scheduler code.
pub fn is_up_to_date(repo: &GraphRepository, id: &str, inspector_name: &str) -> bool {
    repo.get_node_by_id(id)
        .is_some_and(|n| n.common().is_up_to_date(inspector_name))
}

/// Timestamp type alias used across the executor/profile for per-inspector
/// execution bookkeeping.
pub type ExecutionTimestamp = DateTime<Utc>;
