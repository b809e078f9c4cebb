//! Class-node collection (C8), phase 2.
//!
//! Grounded on the teacher's package/class/file relationship modeling
//! (`CodeNode::class`, `CodeEdge::contains`, `GraphStore::
//! get_classes_in_file`) generalized into an explicit `ClassNodeCollector`
//! trait. Parsing itself stays out of scope (spec.md §1): a pluggable
//! `ClassSource` supplies already-discovered types so the core never depends
//! on a parser.

use std::sync::Arc;

use crate::graph::{
    ClassKind, ClassRepository, FileRepository, GraphRepository, PackageRepository, SourceOrigin,
};

/// One type discovered inside a file, as reported by an injected parser.
#[derive(Debug, Clone)]
pub struct DiscoveredType {
    pub fqn: String,
    pub class_kind: ClassKind,
}

/// Injected parser boundary (spec.md §4.8: "parses the file via injected
/// parser; out of scope"). A test double or a future tree-sitter-backed
/// collector implements this without the core depending on a parser crate.
pub trait ClassSource: Send + Sync {
    /// Returns the types declared directly in `file_relative_path`, or an
    /// empty vec if the source cannot or need not be parsed.
    fn discover_types(&self, file_relative_path: &str, content: &[u8]) -> Vec<DiscoveredType>;
}

/// Handles shared by every collector invocation.
pub struct CollectionContext<'a> {
    pub files: FileRepository<'a>,
    pub classes: ClassRepository<'a>,
    pub packages: PackageRepository<'a>,
}

impl<'a> CollectionContext<'a> {
    pub fn new(repo: &'a GraphRepository) -> Self {
        Self {
            files: FileRepository::new(repo),
            classes: ClassRepository::new(repo),
            packages: PackageRepository::new(repo),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("collection error: {0}")]
    Failed(String),
}

/// A phase-2 collector: given a FileNode it can collect from, parses it
/// (via the injected `ClassSource`) and wires `ClassNode`s into the graph.
pub trait ClassNodeCollector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this collector applies to the given file (e.g. tagged
    /// `java.is_source` or `java.is_binary`).
    fn can_collect(&self, file_tags: &std::collections::HashSet<String>) -> bool;

    fn source_origin(&self) -> SourceOrigin;

    fn collect(
        &self,
        ctx: &CollectionContext,
        file_relative_path: &str,
        content: &[u8],
    ) -> Result<Vec<String>, CollectionError>;
}

/// The standard collector: delegates type discovery to a `ClassSource`,
/// then applies the four-step wiring spec.md §4.8 describes.
pub struct SourceBackedCollector {
    name: &'static str,
    required_tag: &'static str,
    source_origin: SourceOrigin,
    source: Arc<dyn ClassSource>,
}

impl SourceBackedCollector {
    pub fn new(
        name: &'static str,
        required_tag: &'static str,
        source_origin: SourceOrigin,
        source: Arc<dyn ClassSource>,
    ) -> Self {
        Self {
            name,
            required_tag,
            source_origin,
            source,
        }
    }
}

impl ClassNodeCollector for SourceBackedCollector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn can_collect(&self, file_tags: &std::collections::HashSet<String>) -> bool {
        file_tags.contains(self.required_tag)
    }

    fn source_origin(&self) -> SourceOrigin {
        self.source_origin
    }

    fn collect(
        &self,
        ctx: &CollectionContext,
        file_relative_path: &str,
        content: &[u8],
    ) -> Result<Vec<String>, CollectionError> {
        let discovered = self.source.discover_types(file_relative_path, content);
        let mut fqns = Vec::with_capacity(discovered.len());
        for found in discovered {
            let mut class = ctx
                .classes
                .get_or_create_by_fqn(&found.fqn)
                .map_err(|e| CollectionError::Failed(e.to_string()))?;

            // Source wins over binary for duplicate FQNs (spec.md §8).
            let should_set_origin = class.source_origin != SourceOrigin::Source
                || self.source_origin == SourceOrigin::Source;
            if should_set_origin {
                class.class_kind = found.class_kind;
                class.source_origin = self.source_origin;
                class.project_file_id = Some(file_relative_path.to_string());
                ctx.classes.repo.add_node(crate::graph::GraphNode::Class(class.clone())).ok();
            }

            let package = ctx
                .packages
                .get_or_create(&class.package_name)
                .map_err(|e| CollectionError::Failed(e.to_string()))?;
            ctx.classes
                .repo
                .get_or_create_contains_edge(&package.common.id, &class.common.id)
                .map_err(|e| CollectionError::Failed(e.to_string()))?;

            fqns.push(found.fqn);
        }
        Ok(fqns)
    }
}

/// Phase 2: runs once over every eligible FileNode with every registered
/// collector whose `can_collect` holds.
pub fn collect_classes(
    repo: &GraphRepository,
    collectors: &[Arc<dyn ClassNodeCollector>],
    read_content: impl Fn(&str) -> Option<Vec<u8>>,
) -> Vec<String> {
    let ctx = CollectionContext::new(repo);
    let mut collected = Vec::new();
    for file in ctx.files.all() {
        for collector in collectors {
            if !collector.can_collect(&file.common.tags) {
                continue;
            }
            let Some(content) = read_content(&file.common.id) else {
                continue;
            };
            if let Ok(fqns) = collector.collect(&ctx, &file.common.id, &content) {
                collected.extend(fqns);
            }
        }
    }
    collected
}
