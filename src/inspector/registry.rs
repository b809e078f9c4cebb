//! Inspector registry and dependency graph (C6): topological ordering
//! hints, cycle detection, and unused/duplicate-tag diagnostics.
//!
//! New relative to the teacher's flat independent/dependent partition
//! (`DetectorEngine::run` only partitions by `is_dependent()`); built with
//! `petgraph::graph::DiGraph` and `petgraph::algo::{toposort, tarjan_scc}` —
//! algorithms the teacher already depends on in `graph::store::
//! find_cycles_scc` — applied here to the inspector dependency graph instead
//! of the code graph.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

use super::base::{Inspector, TargetKind};

#[derive(Debug, thiserror::Error)]
pub enum InspectorRegistryError {
    #[error("duplicate inspector name: {0}")]
    DuplicateName(String),
}

/// Default threshold for "complex chain" diagnostics (spec.md §4.5).
pub const DEFAULT_COMPLEX_CHAIN_LENGTH: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct DependencyDiagnostics {
    /// Tags produced by some inspector but required by none.
    pub unused_tags: Vec<String>,
    /// Tag-name pairs that differ only by casing/prefix convention.
    pub potential_duplicate_tags: Vec<(String, String)>,
    /// Inspector-name chains at or above the complex-chain threshold.
    pub complex_chains: Vec<Vec<&'static str>>,
    /// Cycles among inspector names; execution proceeds, order within a
    /// cycle is unspecified (spec.md §4.5).
    pub cycles: Vec<Vec<&'static str>>,
}

pub struct InspectorRegistry {
    inspectors: Vec<Arc<dyn Inspector>>,
    by_name: HashMap<&'static str, usize>,
    complex_chain_length: usize,
}

impl Default for InspectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InspectorRegistry {
    pub fn new() -> Self {
        Self {
            inspectors: Vec::new(),
            by_name: HashMap::new(),
            complex_chain_length: DEFAULT_COMPLEX_CHAIN_LENGTH,
        }
    }

    pub fn with_complex_chain_length(mut self, length: usize) -> Self {
        self.complex_chain_length = length;
        self
    }

    /// Registration order is preserved and is the stable order used for
    /// `active_inspectors` iteration (spec.md §5).
    pub fn register(&mut self, inspector: Arc<dyn Inspector>) -> Result<(), InspectorRegistryError> {
        let name = inspector.name();
        if self.by_name.contains_key(name) {
            return Err(InspectorRegistryError::DuplicateName(name.to_string()));
        }
        self.by_name.insert(name, self.inspectors.len());
        self.inspectors.push(inspector);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inspectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inspectors.is_empty()
    }

    /// Registration-order list, optionally filtered by `target_kind` and by
    /// an explicit allow-list of requested names.
    pub fn inspectors_for(
        &self,
        target_kind: TargetKind,
        requested: Option<&HashSet<String>>,
    ) -> Vec<Arc<dyn Inspector>> {
        self.inspectors
            .iter()
            .filter(|i| i.target_kind().matches(target_kind))
            .filter(|i| requested.map_or(true, |r| r.contains(i.name())))
            .cloned()
            .collect()
    }

    pub fn all(&self) -> &[Arc<dyn Inspector>] {
        &self.inspectors
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Inspector>> {
        self.by_name.get(name).map(|&idx| self.inspectors[idx].clone())
    }

    /// Builds the produces/requires dependency graph and runs diagnostics.
    /// Vertices = inspectors; an edge P -> C labeled with the shared tag set
    /// exists iff `produces(P) ∩ requires(C)` is non-empty. Multiple shared
    /// tags consolidate into one edge (never parallel edges).
    pub fn diagnostics(&self) -> DependencyDiagnostics {
        let mut graph: DiGraph<&'static str, HashSet<String>> = DiGraph::new();
        let mut node_for: HashMap<&'static str, NodeIndex> = HashMap::new();
        for inspector in &self.inspectors {
            let idx = graph.add_node(inspector.name());
            node_for.insert(inspector.name(), idx);
        }

        let mut all_produced: HashSet<String> = HashSet::new();
        let mut all_required: HashSet<String> = HashSet::new();
        for inspector in &self.inspectors {
            let deps = inspector.dependencies();
            all_produced.extend(deps.produces.iter().cloned());
            all_required.extend(deps.requires.iter().cloned());
        }

        for producer in &self.inspectors {
            let produces = &producer.dependencies().produces;
            if produces.is_empty() {
                continue;
            }
            for consumer in &self.inspectors {
                if producer.name() == consumer.name() {
                    continue;
                }
                let requires = &consumer.dependencies().requires;
                let shared: HashSet<String> = produces.intersection(requires).cloned().collect();
                if shared.is_empty() {
                    continue;
                }
                let p_idx = node_for[producer.name()];
                let c_idx = node_for[consumer.name()];
                if let Some(edge) = graph.find_edge(p_idx, c_idx) {
                    graph[edge].extend(shared);
                } else {
                    graph.add_edge(p_idx, c_idx, shared);
                }
            }
        }

        let unused_tags: Vec<String> = all_produced.difference(&all_required).cloned().collect();
        let potential_duplicate_tags = find_potential_duplicates(&all_produced.union(&all_required).cloned().collect::<Vec<_>>());

        let cycles = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| scc.into_iter().map(|idx| graph[idx]).collect())
            .collect();

        let complex_chains = find_chains_at_least(&graph, self.complex_chain_length);

        let mut unused_sorted = unused_tags;
        unused_sorted.sort();

        DependencyDiagnostics {
            unused_tags: unused_sorted,
            potential_duplicate_tags,
            complex_chains,
            cycles,
        }
    }

    /// Topological ordering hint; used only to order items within a pass.
    /// Correctness never depends on this because the fixed-point loop (C9)
    /// reaches convergence regardless of order.
    pub fn topological_hint(&self) -> Option<Vec<&'static str>> {
        let mut graph: DiGraph<&'static str, ()> = DiGraph::new();
        let mut node_for: HashMap<&'static str, NodeIndex> = HashMap::new();
        for inspector in &self.inspectors {
            node_for.insert(inspector.name(), graph.add_node(inspector.name()));
        }
        for producer in &self.inspectors {
            for consumer in &self.inspectors {
                if producer.name() == consumer.name() {
                    continue;
                }
                let shared = producer
                    .dependencies()
                    .produces
                    .intersection(&consumer.dependencies().requires)
                    .next()
                    .is_some();
                if shared {
                    graph.add_edge(node_for[producer.name()], node_for[consumer.name()], ());
                }
            }
        }
        toposort(&graph, None)
            .ok()
            .map(|order| order.into_iter().map(|idx| graph[idx]).collect())
    }
}

fn find_potential_duplicates(tags: &[String]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for i in 0..tags.len() {
        for j in (i + 1)..tags.len() {
            if normalize_tag(&tags[i]) == normalize_tag(&tags[j]) && tags[i] != tags[j] {
                let (a, b) = if tags[i] < tags[j] {
                    (tags[i].clone(), tags[j].clone())
                } else {
                    (tags[j].clone(), tags[i].clone())
                };
                pairs.push((a, b));
            }
        }
    }
    pairs.sort();
    pairs.dedup();
    pairs
}

fn normalize_tag(tag: &str) -> String {
    tag.to_lowercase().replace(['_', '-', '.'], "")
}

fn find_chains_at_least(
    graph: &DiGraph<&'static str, HashSet<String>>,
    min_length: usize,
) -> Vec<Vec<&'static str>> {
    let mut chains = Vec::new();
    for start in graph.node_indices() {
        let mut path = vec![start];
        walk_chains(graph, start, &mut path, min_length, &mut chains);
    }
    chains.sort();
    chains.dedup();
    chains
}

fn walk_chains(
    graph: &DiGraph<&'static str, HashSet<String>>,
    current: NodeIndex,
    path: &mut Vec<NodeIndex>,
    min_length: usize,
    out: &mut Vec<Vec<&'static str>>,
) {
    if path.len() >= min_length {
        out.push(path.iter().map(|&idx| graph[idx]).collect());
    }
    if path.len() > graph.node_count() {
        return; // guard against cycles
    }
    for neighbor in graph.neighbors(current) {
        if path.contains(&neighbor) {
            continue;
        }
        path.push(neighbor);
        walk_chains(graph, neighbor, path, min_length, out);
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphNode;
    use crate::inspector::base::{Dependencies, InspectorError, NodeDecorator};

    struct Producer;
    impl Inspector for Producer {
        fn name(&self) -> &'static str {
            "Producer"
        }
        fn target_kind(&self) -> TargetKind {
            TargetKind::File
        }
        fn supports(&self, _node: &GraphNode) -> bool {
            true
        }
        fn inspect(&self, _decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
            Ok(())
        }
        fn dependencies(&self) -> Dependencies {
            Dependencies::new(&[], &["t"])
        }
    }

    struct Consumer;
    impl Inspector for Consumer {
        fn name(&self) -> &'static str {
            "Consumer"
        }
        fn target_kind(&self) -> TargetKind {
            TargetKind::File
        }
        fn supports(&self, _node: &GraphNode) -> bool {
            true
        }
        fn inspect(&self, _decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
            Ok(())
        }
        fn dependencies(&self) -> Dependencies {
            Dependencies::new(&["t"], &[])
        }
    }

    struct Orphan;
    impl Inspector for Orphan {
        fn name(&self) -> &'static str {
            "Orphan"
        }
        fn target_kind(&self) -> TargetKind {
            TargetKind::File
        }
        fn supports(&self, _node: &GraphNode) -> bool {
            true
        }
        fn inspect(&self, _decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
            Ok(())
        }
        fn dependencies(&self) -> Dependencies {
            Dependencies::new(&[], &["unused_tag"])
        }
    }

    #[test]
    fn duplicate_name_registration_rejected() {
        let mut registry = InspectorRegistry::new();
        registry.register(Arc::new(Producer)).unwrap();
        assert!(matches!(
            registry.register(Arc::new(Producer)),
            Err(InspectorRegistryError::DuplicateName(_))
        ));
    }

    #[test]
    fn diagnostics_find_unused_tags() {
        let mut registry = InspectorRegistry::new();
        registry.register(Arc::new(Producer)).unwrap();
        registry.register(Arc::new(Consumer)).unwrap();
        registry.register(Arc::new(Orphan)).unwrap();
        let diag = registry.diagnostics();
        assert_eq!(diag.unused_tags, vec!["unused_tag".to_string()]);
        assert!(diag.cycles.is_empty());
    }

    struct CycleA;
    impl Inspector for CycleA {
        fn name(&self) -> &'static str {
            "CycleA"
        }
        fn target_kind(&self) -> TargetKind {
            TargetKind::File
        }
        fn supports(&self, _node: &GraphNode) -> bool {
            true
        }
        fn inspect(&self, _decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
            Ok(())
        }
        fn dependencies(&self) -> Dependencies {
            Dependencies::new(&["b_tag"], &["a_tag"])
        }
    }

    struct CycleB;
    impl Inspector for CycleB {
        fn name(&self) -> &'static str {
            "CycleB"
        }
        fn target_kind(&self) -> TargetKind {
            TargetKind::File
        }
        fn supports(&self, _node: &GraphNode) -> bool {
            true
        }
        fn inspect(&self, _decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
            Ok(())
        }
        fn dependencies(&self) -> Dependencies {
            Dependencies::new(&["a_tag"], &["b_tag"])
        }
    }

    #[test]
    fn diagnostics_detect_cycles() {
        let mut registry = InspectorRegistry::new();
        registry.register(Arc::new(CycleA)).unwrap();
        registry.register(Arc::new(CycleB)).unwrap();
        let diag = registry.diagnostics();
        assert_eq!(diag.cycles.len(), 1);
        assert_eq!(diag.cycles[0].len(), 2);
    }

    #[test]
    fn topological_hint_orders_producer_before_consumer() {
        let mut registry = InspectorRegistry::new();
        registry.register(Arc::new(Consumer)).unwrap();
        registry.register(Arc::new(Producer)).unwrap();
        let order = registry.topological_hint().unwrap();
        let producer_pos = order.iter().position(|&n| n == "Producer").unwrap();
        let consumer_pos = order.iter().position(|&n| n == "Consumer").unwrap();
        assert!(producer_pos < consumer_pos);
    }
}
