//! The multi-pass executor (C9) — the heart of the system.
//!
//! Grounded on `detectors::engine::DetectorEngine::run`'s register ->
//! partition -> execute -> collect -> summarize shape and its
//! `std::panic::catch_unwind` wrapping in `run_single_detector`, restructured
//! into the bounded fixed-point loop spec.md §4.9 prescribes (the teacher
//! runs one sweep; this pass loop is new control flow, not a direct port).

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::graph::GraphRepository;
use crate::inspector::{Inspector, NodeDecorator, TargetKind};

use super::profile::ExecutionProfile;

#[derive(Debug, Clone)]
pub struct PassResult {
    pub passes_executed: usize,
    pub converged: bool,
}

/// Whether the executor should skip inspectors already up-to-date on a node
/// (`true` for normal incremental runs; tests may disable it to force
/// re-execution).
pub const DEFAULT_USE_TRACKING: bool = true;

/// Given: phase label, maximum passes M, a supplier of the current item
/// collection, an inspector list, and target kind filtering. Runs the
/// bounded fixed-point loop described in spec.md §4.9.
pub fn run_phase(
    phase_label: &str,
    max_passes: usize,
    repo: &GraphRepository,
    target_kind: TargetKind,
    inspectors: &[Arc<dyn Inspector>],
    use_tracking: bool,
    supplier: impl Fn() -> Vec<String>,
    profile: &mut ExecutionProfile,
) -> PassResult {
    let scoped: Vec<Arc<dyn Inspector>> = inspectors
        .iter()
        .filter(|i| i.target_kind().matches(target_kind))
        .cloned()
        .collect();

    let mut active_inspectors = scoped;
    let mut pass = 1usize;
    let mut converged = false;

    loop {
        let pass_start = Utc::now();
        let wall_start = Instant::now();
        let mut processed = 0usize;
        let mut triggered: HashSet<&'static str> = HashSet::new();

        let items = supplier();
        let scanned = items.len();
        for item_id in &items {
            let fired = analyze_item(repo, item_id, &active_inspectors, pass_start, use_tracking, pass, profile);
            if !fired.is_empty() {
                processed += 1;
                triggered.extend(fired);
            }
        }

        profile.record_phase(phase_label, wall_start.elapsed(), scanned, processed);

        if processed == 0 {
            converged = true;
            break;
        }

        // Invariant (I): an inspector that fired at least once this pass has
        // already reached every node it could touch; prune it for
        // subsequent passes.
        active_inspectors.retain(|i| !triggered.contains(i.name()));

        if pass >= max_passes {
            break;
        }
        pass += 1;
    }

    profile.passes_executed = profile.passes_executed.max(pass);
    profile.converged = profile.converged || converged;

    PassResult {
        passes_executed: pass,
        converged,
    }
}

/// The `ItemAnalyzer` contract: applies `active_inspectors` to one node,
/// returning the subset that actually ran (neither skipped by tracking nor
/// by `can_process`).
fn analyze_item(
    repo: &GraphRepository,
    item_id: &str,
    active_inspectors: &[Arc<dyn Inspector>],
    pass_start: chrono::DateTime<Utc>,
    use_tracking: bool,
    pass: usize,
    profile: &mut ExecutionProfile,
) -> HashSet<&'static str> {
    let mut fired = HashSet::new();
    for inspector in active_inspectors {
        let name = inspector.name();

        let should_run = repo
            .get_node_by_id(item_id)
            .map(|node| {
                if use_tracking && node.common().is_up_to_date(name) {
                    return false;
                }
                inspector.can_process(&node)
            })
            .unwrap_or(false);
        if !should_run {
            continue;
        }

        let start = Instant::now();
        let outcome = repo.with_node_mut(item_id, |node| {
            let mut decorator = NodeDecorator::new(node);
            let result = catch_unwind(AssertUnwindSafe(|| inspector.inspect(&mut decorator)));
            let outcome = match result {
                Ok(Ok(())) => {
                    decorator.finish();
                    Ok(())
                }
                Ok(Err(e)) => {
                    decorator.error(&e.to_string());
                    decorator.finish();
                    Err(e.to_string())
                }
                Err(panic) => {
                    let message = panic_message(&panic);
                    decorator.error(&message);
                    decorator.finish();
                    Err(message)
                }
            };
            // Record the execution time as the node's own `last_modified`
            // as of right now, not `pass_start` (captured before `finish()`
            // ran): a data-mutating inspect() advances `last_modified` past
            // `pass_start`, which would make the node immediately look
            // stale against the inspector that just ran on it (spec.md §8).
            let executed_at = node.common().last_modified.max(pass_start);
            node.common_mut()
                .inspector_execution_times
                .insert(name.to_string(), executed_at);
            outcome
        });
        let duration = start.elapsed();

        match outcome {
            Some(Ok(())) => {
                profile.record_invocation(name, pass, duration, false);
            }
            Some(Err(_)) => {
                // Exception policy: inspector still marked executed (above)
                // to prevent storms; profiling records the zero-duration
                // form only for genuine panics, actual elapsed time for a
                // returned InspectorError.
                profile.record_invocation(name, pass, duration, true);
            }
            None => continue, // node vanished mid-pass; nothing to record
        }

        fired.insert(name);
    }
    fired
}

fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "inspector panicked".to_string()
    }
}

/// Lexicographically-sorted id supplier: a deterministic order so repeated
/// runs over an unchanged graph produce reproducible results (spec.md §5).
pub fn sorted_ids(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FileNode, FileRepository, GraphNode};
    use crate::inspector::{Dependencies, InspectorError};

    struct TagProducer;
    impl Inspector for TagProducer {
        fn name(&self) -> &'static str {
            "TagProducer"
        }
        fn target_kind(&self) -> TargetKind {
            TargetKind::File
        }
        fn supports(&self, _node: &GraphNode) -> bool {
            true
        }
        fn inspect(&self, decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
            decorator.enable_tag("t");
            Ok(())
        }
        fn dependencies(&self) -> Dependencies {
            Dependencies::new(&[], &["t"])
        }
    }

    struct TagConsumer;
    impl Inspector for TagConsumer {
        fn name(&self) -> &'static str {
            "TagConsumer"
        }
        fn target_kind(&self) -> TargetKind {
            TargetKind::File
        }
        fn supports(&self, _node: &GraphNode) -> bool {
            true
        }
        fn inspect(&self, decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
            decorator.set_property("p", serde_json::json!(1));
            Ok(())
        }
        fn dependencies(&self) -> Dependencies {
            Dependencies::new(&["t"], &[])
        }
    }

    struct AlwaysPanics;
    impl Inspector for AlwaysPanics {
        fn name(&self) -> &'static str {
            "AlwaysPanics"
        }
        fn target_kind(&self) -> TargetKind {
            TargetKind::File
        }
        fn supports(&self, _node: &GraphNode) -> bool {
            true
        }
        fn inspect(&self, _decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
            panic!("boom");
        }
    }

    fn repo_with_one_file() -> GraphRepository {
        let repo = GraphRepository::new();
        let files = FileRepository::new(&repo);
        files.get_or_create(FileNode::new("a", "a")).unwrap();
        repo
    }

    #[test]
    fn two_pass_dependency_converges_in_two_passes() {
        let repo = repo_with_one_file();
        let inspectors: Vec<Arc<dyn Inspector>> =
            vec![Arc::new(TagProducer), Arc::new(TagConsumer)];
        let mut profile = ExecutionProfile::new();
        let result = run_phase(
            "phase3",
            5,
            &repo,
            TargetKind::File,
            &inspectors,
            true,
            || sorted_ids(repo.get_files().into_iter().map(|f| f.common.id).collect()),
            &mut profile,
        );
        assert!(result.converged);
        assert_eq!(result.passes_executed, 2);
        let node = repo.get_node_by_id("a").unwrap();
        assert_eq!(node.common().get_i64("p"), Some(1));
    }

    #[test]
    fn up_to_date_inspector_is_skipped_on_later_passes() {
        let repo = repo_with_one_file();
        let inspectors: Vec<Arc<dyn Inspector>> = vec![Arc::new(TagProducer)];
        let mut profile = ExecutionProfile::new();
        run_phase(
            "phase3",
            5,
            &repo,
            TargetKind::File,
            &inspectors,
            true,
            || vec!["a".to_string()],
            &mut profile,
        );
        // Pass 1 fires TagProducer; it is then pruned from active_inspectors
        // entirely (invariant I), so a second call with a *new* executor
        // instance but tracking enabled must skip it as already up-to-date.
        let mut profile2 = ExecutionProfile::new();
        run_phase(
            "phase3",
            5,
            &repo,
            TargetKind::File,
            &inspectors,
            true,
            || vec!["a".to_string()],
            &mut profile2,
        );
        assert!(!profile2.inspectors.contains_key("TagProducer"));
    }

    #[test]
    fn panicking_inspector_is_isolated_and_pass_continues() {
        let repo = GraphRepository::new();
        let files = FileRepository::new(&repo);
        files.get_or_create(FileNode::new("a", "a")).unwrap();
        files.get_or_create(FileNode::new("b", "b")).unwrap();

        let inspectors: Vec<Arc<dyn Inspector>> = vec![Arc::new(AlwaysPanics)];
        let mut profile = ExecutionProfile::new();
        let result = run_phase(
            "phase3",
            3,
            &repo,
            TargetKind::File,
            &inspectors,
            true,
            || sorted_ids(repo.get_files().into_iter().map(|f| f.common.id).collect()),
            &mut profile,
        );
        assert!(result.converged);
        let a = repo.get_node_by_id("a").unwrap();
        assert!(a.common().get_str("processing.error").unwrap().starts_with("ERROR:"));
        let b = repo.get_node_by_id("b").unwrap();
        assert!(b.common().get_str("processing.error").is_some());
    }

    #[test]
    fn empty_project_converges_in_pass_one() {
        let repo = GraphRepository::new();
        let inspectors: Vec<Arc<dyn Inspector>> = vec![Arc::new(TagProducer)];
        let mut profile = ExecutionProfile::new();
        let result = run_phase(
            "phase3",
            5,
            &repo,
            TargetKind::File,
            &inspectors,
            true,
            Vec::new,
            &mut profile,
        );
        assert!(result.converged);
        assert_eq!(result.passes_executed, 1);
    }
}
