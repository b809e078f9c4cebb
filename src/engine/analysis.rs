//! `AnalysisEngine::analyze_project`: the orchestration entry point wiring
//! discovery, collection, and the two executor phases into the strict
//! 1a -> 1b -> 1c -> 2 -> 3 -> 4 -> save order spec.md §5 mandates.
//!
//! Grounded on `detectors::engine::DetectorEngine::run`'s overall shape
//! (register collaborators up front, then run a fixed pipeline over them),
//! generalized to the multi-phase pipeline this spec requires.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::discovery::{collect_classes, discover_files, ClassNodeCollector, IgnoreFilter};
use crate::error::CodegraphError;
use crate::graph::NodeTypeRegistry;
use crate::inspector::{Inspector, InspectorRegistry, TargetKind};
use crate::persistence::{PersistenceError, PersistenceStore};
use crate::project::{
    load_project, save_project, Project, ProjectMetadata, DEFAULT_ANALYSIS_FILE_NAME,
};

use super::executor::{run_phase, sorted_ids, DEFAULT_USE_TRACKING};
use super::profile::ExecutionProfile;

pub const DEFAULT_MAX_PASSES: usize = 5;

/// Optional narrowing applied to a run: which inspectors to run (by name,
/// `None` means all registered) and which packages phase 4 should touch
/// (`None` means every package). Decided in DESIGN.md: `package_filters`
/// restricts phase 4's class supplier to classes whose package name starts
/// with one of the given prefixes, since packages are the only grouping
/// phase 4 operates over.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub requested_inspectors: Option<HashSet<String>>,
    pub max_passes: Option<usize>,
    pub package_filters: Option<Vec<String>>,
}

/// Bundles the collaborators a single analysis run needs: file detectors
/// (phase 1), the inspector registry (phases 3-4), class collectors
/// (phase 2), and the node-type registry used for project load rehydration.
pub struct AnalysisEngine {
    pub file_detectors: Vec<Arc<dyn Inspector>>,
    pub inspectors: InspectorRegistry,
    pub collectors: Vec<Arc<dyn ClassNodeCollector>>,
    pub node_types: NodeTypeRegistry,
}

impl AnalysisEngine {
    pub fn new(
        file_detectors: Vec<Arc<dyn Inspector>>,
        inspectors: InspectorRegistry,
        collectors: Vec<Arc<dyn ClassNodeCollector>>,
    ) -> Self {
        Self {
            file_detectors,
            inspectors,
            collectors,
            node_types: NodeTypeRegistry::with_builtin_types(),
        }
    }

    /// Runs the full pipeline over `project_path`, persisting through
    /// `store` and reading file contents for phase 2 via `read_content`.
    /// Returns the hydrated project plus the run's execution profile.
    pub fn analyze_project(
        &self,
        project_path: &Path,
        store: &PersistenceStore,
        read_content: impl Fn(&str) -> Option<Vec<u8>>,
        options: AnalyzeOptions,
    ) -> Result<(Project, ExecutionProfile), CodegraphError> {
        if !project_path.is_dir() {
            return Err(CodegraphError::config(format!(
                "project path does not exist or is not a directory: {}",
                project_path.display()
            )));
        }

        let analysis_file = project_path.join(DEFAULT_ANALYSIS_FILE_NAME);
        let mut project = if analysis_file.exists() {
            match load_project(&analysis_file, store, &self.node_types) {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load prior analysis, starting fresh");
                    fresh_project(project_path)
                }
            }
        } else {
            fresh_project(project_path)
        };

        let ignore_filter = IgnoreFilter::with_defaults();
        let mut profile = ExecutionProfile::new();
        let max_passes = options.max_passes.unwrap_or(DEFAULT_MAX_PASSES);

        tracing::info!(project = %project_path.display(), "phase 1: discovery");
        discover_files(project_path, &project.repo, &ignore_filter, &self.file_detectors)
            .map_err(|e| CodegraphError::discovery(e.to_string()))?;

        tracing::info!("phase 2: class collection");
        collect_classes(&project.repo, &self.collectors, &read_content);

        let requested = options.requested_inspectors.as_ref();

        tracing::info!("phase 3: file inspectors");
        let file_inspectors = self.inspectors.inspectors_for(TargetKind::File, requested);
        run_phase(
            "phase3",
            max_passes,
            &project.repo,
            TargetKind::File,
            &file_inspectors,
            DEFAULT_USE_TRACKING,
            || sorted_ids(project.repo.get_files().into_iter().map(|f| f.common.id).collect()),
            &mut profile,
        );

        tracing::info!("phase 4: class inspectors");
        let class_inspectors = self.inspectors.inspectors_for(TargetKind::Class, requested);
        let package_filters = options.package_filters.clone();
        run_phase(
            "phase4",
            max_passes,
            &project.repo,
            TargetKind::Class,
            &class_inspectors,
            DEFAULT_USE_TRACKING,
            || {
                let classes = project.repo.get_classes();
                let filtered: Vec<String> = classes
                    .into_iter()
                    .filter(|c| match &package_filters {
                        None => true,
                        Some(prefixes) => prefixes.is_empty()
                            || prefixes.iter().any(|p| c.package_name.starts_with(p.as_str())),
                    })
                    .map(|c| c.common.id)
                    .collect();
                sorted_ids(filtered)
            },
            &mut profile,
        );

        tracing::info!("phase save");
        match save_project(&project, &analysis_file, store) {
            Ok(()) => {}
            Err(crate::project::ProjectLoadError::Persistence(PersistenceError::Transient(msg))) => {
                tracing::warn!(error = %msg, "transient persistence error on save, retrying once");
                save_project(&project, &analysis_file, store)
                    .map_err(|e| CodegraphError::Persistence(PersistenceError::Permanent(e.to_string())))?;
            }
            Err(e) => {
                // Permanent save failure aborts the save but not the analysis
                // (spec.md §7): the in-memory project is still returned.
                tracing::error!(error = %e, "permanent persistence error, analysis results not saved");
            }
        }

        project.metadata.last_analyzed = chrono::Utc::now();
        Ok((project, profile))
    }
}

fn fresh_project(project_path: &Path) -> Project {
    let name = project_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project")
        .to_string();
    Project {
        metadata: ProjectMetadata::new(name, project_path.to_path_buf()),
        repo: crate::graph::GraphRepository::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{ClassSource, DiscoveredType, SourceBackedCollector};
    use crate::graph::{ClassKind, GraphNode, SourceOrigin};
    use crate::inspector::{Dependencies, FileDetector, FileDetectorInspector, InspectorError, NodeDecorator};

    struct JavaSourceDetector;
    impl FileDetector for JavaSourceDetector {
        fn name(&self) -> &'static str {
            "JavaSourceDetector"
        }
        fn supports(&self, node: &GraphNode) -> bool {
            node.as_file().is_some_and(|f| f.file_extension == "java")
        }
        fn detect(&self, decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
            decorator.enable_tag("java.is_source");
            Ok(())
        }
    }

    struct FixedSource;
    impl ClassSource for FixedSource {
        fn discover_types(&self, file_relative_path: &str, _content: &[u8]) -> Vec<DiscoveredType> {
            if file_relative_path.ends_with("Main.java") {
                vec![DiscoveredType {
                    fqn: "demo.Main".to_string(),
                    class_kind: ClassKind::Class,
                }]
            } else {
                Vec::new()
            }
        }
    }

    struct MethodCounter;
    impl Inspector for MethodCounter {
        fn name(&self) -> &'static str {
            "MethodCounter"
        }
        fn target_kind(&self) -> TargetKind {
            TargetKind::Class
        }
        fn supports(&self, node: &GraphNode) -> bool {
            node.as_class().is_some()
        }
        fn inspect(&self, decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
            decorator.set_metric("methodCount", 1.0);
            Ok(())
        }
        fn dependencies(&self) -> Dependencies {
            Dependencies::default()
        }
    }

    fn build_engine() -> AnalysisEngine {
        let file_detectors: Vec<Arc<dyn Inspector>> =
            vec![Arc::new(FileDetectorInspector::new(JavaSourceDetector))];
        let mut inspectors = InspectorRegistry::new();
        inspectors.register(Arc::new(MethodCounter)).unwrap();
        let collectors: Vec<Arc<dyn ClassNodeCollector>> = vec![Arc::new(SourceBackedCollector::new(
            "JavaSourceCollector",
            "java.is_source",
            SourceOrigin::Source,
            Arc::new(FixedSource),
        ))];
        AnalysisEngine::new(file_detectors, inspectors, collectors)
    }

    #[test]
    fn analyzes_single_file_project_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Main.java"), "package demo; class Main {}").unwrap();
        let store = PersistenceStore::in_memory().unwrap();
        let engine = build_engine();

        let (project, profile) = engine
            .analyze_project(dir.path(), &store, |_| Some(Vec::new()), AnalyzeOptions::default())
            .unwrap();

        assert_eq!(project.repo.get_files().len(), 1);
        let class = project.repo.find_class_by_fqn("demo.Main").unwrap();
        assert_eq!(class.method_count(), Some(1.0));
        assert!(profile.phases.contains_key("phase3"));
        assert!(profile.phases.contains_key("phase4"));
    }

    #[test]
    fn incremental_rerun_preserves_inspector_execution_times() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Main.java"), "package demo; class Main {}").unwrap();
        let store = PersistenceStore::in_memory().unwrap();
        let engine = build_engine();

        let (project1, _) = engine
            .analyze_project(dir.path(), &store, |_| Some(Vec::new()), AnalyzeOptions::default())
            .unwrap();
        let class1 = project1.repo.find_class_by_fqn("demo.Main").unwrap();
        let ts1 = class1
            .common
            .inspector_execution_times
            .get("MethodCounter")
            .copied();
        assert!(ts1.is_some());

        let (project2, profile2) = engine
            .analyze_project(dir.path(), &store, |_| Some(Vec::new()), AnalyzeOptions::default())
            .unwrap();
        assert_eq!(project2.repo.node_count(), project1.repo.node_count());
        // MethodCounter is already up to date on the unchanged class, so it
        // should not fire again in phase 4.
        assert!(!profile2.inspectors.contains_key("MethodCounter"));
    }

    #[test]
    fn rejects_missing_project_path() {
        let engine = build_engine();
        let store = PersistenceStore::in_memory().unwrap();
        let err = engine
            .analyze_project(
                Path::new("/nonexistent/path/for/codegraph/tests"),
                &store,
                |_| None,
                AnalyzeOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, CodegraphError::Config(_)));
    }
}
