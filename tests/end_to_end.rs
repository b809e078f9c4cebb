//! End-to-end coverage of the analysis pipeline through the public
//! `AnalysisEngine` surface: the seed scenarios that exercise discovery,
//! collection, inspection, persistence, and error isolation together rather
//! than each module in isolation.

use std::io::Write as _;
use std::sync::Arc;

use codegraph::discovery::{ClassNodeCollector, ClassSource, DiscoveredType, SourceBackedCollector};
use codegraph::engine::{AnalysisEngine, AnalyzeOptions};
use codegraph::graph::{ClassKind, GraphNode, SourceOrigin};
use codegraph::inspector::{
    Dependencies, FileDetector, FileDetectorInspector, Inspector, InspectorError, InspectorRegistry,
    NodeDecorator, TargetKind,
};
use codegraph::persistence::PersistenceStore;

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

struct ClassFileDetector;
impl FileDetector for ClassFileDetector {
    fn name(&self) -> &'static str {
        "ClassFileDetector"
    }
    fn supports(&self, node: &GraphNode) -> bool {
        node.as_file().is_some_and(|f| f.file_extension == "class")
    }
    fn detect(&self, decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
        decorator.enable_tag("java.is_binary");
        Ok(())
    }
}

/// A `ClassSource` double standing in for the injected parser boundary
/// (out of scope per spec.md §1): maps known filenames to fixed FQNs.
struct FixedSource;
impl ClassSource for FixedSource {
    fn discover_types(&self, file_relative_path: &str, _content: &[u8]) -> Vec<DiscoveredType> {
        if file_relative_path.ends_with("Main.java") || file_relative_path.ends_with("Main.class") {
            vec![DiscoveredType {
                fqn: "demo.Main".to_string(),
                class_kind: ClassKind::Class,
            }]
        } else if file_relative_path.ends_with("Util.java") {
            vec![DiscoveredType {
                fqn: "demo.Util".to_string(),
                class_kind: ClassKind::Class,
            }]
        } else {
            Vec::new()
        }
    }
}

struct TagProducer;
impl Inspector for TagProducer {
    fn name(&self) -> &'static str {
        "TagProducer"
    }
    fn target_kind(&self) -> TargetKind {
        TargetKind::Class
    }
    fn supports(&self, node: &GraphNode) -> bool {
        node.as_class().is_some()
    }
    fn inspect(&self, decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
        decorator.enable_tag("scanned");
        Ok(())
    }
    fn dependencies(&self) -> Dependencies {
        Dependencies::new(&[], &["scanned"])
    }
}

struct TagConsumer;
impl Inspector for TagConsumer {
    fn name(&self) -> &'static str {
        "TagConsumer"
    }
    fn target_kind(&self) -> TargetKind {
        TargetKind::Class
    }
    fn supports(&self, node: &GraphNode) -> bool {
        node.as_class().is_some()
    }
    fn inspect(&self, decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
        decorator.set_metric("methodCount", 2.0);
        Ok(())
    }
    fn dependencies(&self) -> Dependencies {
        Dependencies::new(&["scanned"], &[])
    }
}

struct AlwaysFails;
impl Inspector for AlwaysFails {
    fn name(&self) -> &'static str {
        "AlwaysFails"
    }
    fn target_kind(&self) -> TargetKind {
        TargetKind::Class
    }
    fn supports(&self, node: &GraphNode) -> bool {
        node.as_class().is_some_and(|c| c.simple_name == "Util")
    }
    fn inspect(&self, _decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
        Err(InspectorError::new("deliberately broken"))
    }
}

fn build_engine(inspectors_list: Vec<Arc<dyn Inspector>>) -> AnalysisEngine {
    let file_detectors: Vec<Arc<dyn Inspector>> = vec![
        Arc::new(FileDetectorInspector::new(JavaSourceDetector)),
        Arc::new(FileDetectorInspector::new(ClassFileDetector)),
    ];
    let mut inspectors = InspectorRegistry::new();
    for i in inspectors_list {
        inspectors.register(i).unwrap();
    }
    let collectors: Vec<Arc<dyn ClassNodeCollector>> = vec![
        Arc::new(SourceBackedCollector::new(
            "JavaSourceCollector",
            "java.is_source",
            SourceOrigin::Source,
            Arc::new(FixedSource),
        )),
        Arc::new(SourceBackedCollector::new(
            "JavaBinaryCollector",
            "java.is_binary",
            SourceOrigin::Binary,
            Arc::new(FixedSource),
        )),
    ];
    AnalysisEngine::new(file_detectors, inspectors, collectors)
}

fn read_all_files() -> impl Fn(&str) -> Option<Vec<u8>> {
    |_id: &str| Some(Vec::new())
}

#[test]
fn single_file_project_discovers_collects_and_inspects() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Main.java"), "package demo; class Main {}").unwrap();

    let store = PersistenceStore::in_memory().unwrap();
    let engine = build_engine(vec![Arc::new(TagProducer), Arc::new(TagConsumer)]);

    let (project, profile) = engine
        .analyze_project(dir.path(), &store, read_all_files(), AnalyzeOptions::default())
        .unwrap();

    assert_eq!(project.repo.get_files().len(), 1);
    let class = project.repo.find_class_by_fqn("demo.Main").unwrap();
    assert_eq!(class.method_count(), Some(2.0));
    assert!(profile.converged || profile.phases.contains_key("phase4"));
}

#[test]
fn two_pass_tag_dependency_converges_through_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Main.java"), "package demo; class Main {}").unwrap();

    let store = PersistenceStore::in_memory().unwrap();
    let engine = build_engine(vec![Arc::new(TagProducer), Arc::new(TagConsumer)]);

    let (project, profile) = engine
        .analyze_project(dir.path(), &store, read_all_files(), AnalyzeOptions::default())
        .unwrap();

    let class = project.repo.find_class_by_fqn("demo.Main").unwrap();
    assert_eq!(class.method_count(), Some(2.0));
    assert!(class.common.has_tag("scanned"));
    let phase4 = &profile.phases["phase4"];
    assert!(phase4.items_processed >= 1);
}

#[test]
fn archive_entries_are_discovered_and_collected() {
    let dir = tempfile::tempdir().unwrap();
    let jar_path = dir.path().join("lib.jar");
    let file = std::fs::File::create(&jar_path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("demo/Main.class", options).unwrap();
    zip.write_all(b"bytecode").unwrap();
    zip.finish().unwrap();

    let store = PersistenceStore::in_memory().unwrap();
    let engine = build_engine(vec![]);

    let (project, _profile) = engine
        .analyze_project(dir.path(), &store, read_all_files(), AnalyzeOptions::default())
        .unwrap();

    let extracted = project
        .repo
        .get_files()
        .into_iter()
        .find(|f| f.from_archive)
        .expect("archive entry became a first-class FileNode");
    assert_eq!(extracted.source_archive_path.as_deref(), Some("lib.jar"));

    let class = project.repo.find_class_by_fqn("demo.Main").unwrap();
    assert_eq!(class.source_origin, SourceOrigin::Binary);
}

#[test]
fn rerunning_analysis_does_not_duplicate_edges() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Main.java"), "package demo; class Main {}").unwrap();

    let store_dir = tempfile::tempdir().unwrap();
    let store = PersistenceStore::open(store_dir.path()).unwrap();
    let engine = build_engine(vec![]);

    let (project1, _) = engine
        .analyze_project(dir.path(), &store, read_all_files(), AnalyzeOptions::default())
        .unwrap();
    let edge_count1 = project1.repo.edge_count();

    let (project2, _) = engine
        .analyze_project(dir.path(), &store, read_all_files(), AnalyzeOptions::default())
        .unwrap();
    assert_eq!(project2.repo.edge_count(), edge_count1);
}

#[test]
fn incremental_load_skips_already_up_to_date_inspectors() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Main.java"), "package demo; class Main {}").unwrap();

    let store_dir = tempfile::tempdir().unwrap();
    let store = PersistenceStore::open(store_dir.path()).unwrap();
    let engine = build_engine(vec![Arc::new(TagProducer)]);

    let (project1, profile1) = engine
        .analyze_project(dir.path(), &store, read_all_files(), AnalyzeOptions::default())
        .unwrap();
    assert!(profile1.inspectors.contains_key("TagProducer"));
    let class1 = project1.repo.find_class_by_fqn("demo.Main").unwrap();
    assert!(class1.common.is_up_to_date("TagProducer"));

    let (_project2, profile2) = engine
        .analyze_project(dir.path(), &store, read_all_files(), AnalyzeOptions::default())
        .unwrap();
    assert!(!profile2.inspectors.contains_key("TagProducer"));
}

#[test]
fn a_failing_inspector_is_isolated_to_its_node() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Main.java"), "package demo; class Main {}").unwrap();
    std::fs::write(dir.path().join("Util.java"), "package demo; class Util {}").unwrap();

    let store = PersistenceStore::in_memory().unwrap();
    let engine = build_engine(vec![Arc::new(AlwaysFails), Arc::new(TagProducer)]);

    let (project, _profile) = engine
        .analyze_project(dir.path(), &store, read_all_files(), AnalyzeOptions::default())
        .unwrap();

    let broken = project.repo.find_class_by_fqn("demo.Util").unwrap();
    assert!(broken
        .common
        .get_str("processing.error")
        .is_some_and(|e| e.contains("deliberately broken")));

    let healthy = project.repo.find_class_by_fqn("demo.Main").unwrap();
    assert!(healthy.common.get_str("processing.error").is_none());
    assert!(healthy.common.has_tag("scanned"));
}
