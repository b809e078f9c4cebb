//! File discovery pipeline (C7 part 2): phases 1a (filesystem scan), 1b
//! (physical extraction), 1c (rescan of extracted content).
//!
//! Grounded on `cache::FileCache::warm`'s `ignore::WalkBuilder::new(root)
//! .hidden(false).git_ignore(true).build()` plus `rayon` for parallel reads;
//! `ignore` is used here purely as a plain recursive walker (gitignore
//! semantics turned off — the `IgnoreFilter` glob list is applied
//! separately, per spec.md §4.6's explicit own pattern list).

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use rayon::prelude::*;

use crate::graph::{FileNode, FileRepository, GraphRepository};
use crate::inspector::{FileDetector, Inspector, NodeDecorator, TargetKind};

use super::archive::{is_archive_extension, ExtractionManager, ExtractionReport};
use super::ignore_filter::IgnoreFilter;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("project path does not exist or is not a directory: {0}")]
    InvalidRoot(PathBuf),

    #[error("io error walking {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub files_discovered: usize,
    pub files_ignored: usize,
    pub archives_extracted: usize,
    pub archives_skipped: usize,
    pub archive_errors: Vec<(PathBuf, String)>,
}

fn to_chrono(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

fn relative_path_of(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Phase 1a: filesystem scan. Returns candidate file paths under `root`
/// that survive `ignore_filter`, read in parallel (pure I/O, no graph
/// writes — writes are serialized afterward through `GraphRepository`).
fn scan_filesystem(
    root: &Path,
    ignore_filter: &IgnoreFilter,
) -> Result<(Vec<PathBuf>, usize), DiscoveryError> {
    if !root.is_dir() {
        return Err(DiscoveryError::InvalidRoot(root.to_path_buf()));
    }
    let mut candidates = Vec::new();
    let mut ignored = 0usize;
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_exclude(false)
        .ignore(false)
        .build();
    for entry in walker {
        let entry = entry.map_err(|e| DiscoveryError::Io {
            path: root.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let relative = relative_path_of(root, path);
        if ignore_filter.should_exclude(&relative) {
            ignored += 1;
            continue;
        }
        candidates.push(path.to_path_buf());
    }
    Ok((candidates, ignored))
}

fn make_file_node(root: &Path, path: &Path) -> FileNode {
    let relative = relative_path_of(root, path);
    let mut node = FileNode::new(relative.clone(), relative);
    if let Ok(meta) = std::fs::metadata(path) {
        if let Ok(modified) = meta.modified() {
            node.last_fs_modified = to_chrono(modified);
        }
    }
    node
}

/// Runs phases 1a-1c, registering `FileNode`s into `repo` and running every
/// `FileDetector`-derived inspector whose `supports` predicate holds on each
/// new node. No cross-file inspectors run in phase 1 (spec.md §4.7).
pub fn discover_files(
    root: &Path,
    repo: &GraphRepository,
    ignore_filter: &IgnoreFilter,
    file_detectors: &[std::sync::Arc<dyn Inspector>],
) -> Result<DiscoveryReport, DiscoveryError> {
    let mut report = DiscoveryReport::default();

    // Phase 1a.
    let (candidates, ignored) = scan_filesystem(root, ignore_filter)?;
    report.files_ignored += ignored;

    let nodes: Vec<FileNode> = candidates
        .par_iter()
        .map(|path| make_file_node(root, path))
        .collect();

    let file_repo = FileRepository::new(repo);
    for node in nodes {
        file_repo.get_or_create(node).ok();
        report.files_discovered += 1;
    }
    run_file_detectors(repo, file_detectors);

    // Phase 1b: physical extraction of archive-typed files.
    let extraction_manager = ExtractionManager::new(root);
    let mut extraction_report = ExtractionReport::default();
    let mut newly_extracted: Vec<(String, super::archive::ExtractedEntry)> = Vec::new();
    for path in &candidates {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        if !is_archive_extension(extension) {
            continue;
        }
        let relative_archive = relative_path_of(root, path);
        file_repo.repo.with_node_mut(&relative_archive, |node| {
            let mut decorator = NodeDecorator::new(node);
            decorator.enable_tag("archive");
            decorator.finish();
        });
        match extraction_manager.extract(path, &mut extraction_report) {
            Ok(entries) => {
                for entry in entries {
                    newly_extracted.push((relative_archive.clone(), entry));
                }
            }
            Err(e) => {
                report.archive_errors.push((path.clone(), e.to_string()));
            }
        }
    }
    report.archives_extracted = extraction_report.succeeded.len();
    report.archives_skipped = extraction_report.skipped.len();

    // Phase 1c: rescan extracted content as first-class FileNodes, without
    // re-running file detectors that would re-flag the archive for
    // extraction (spec.md §4.6).
    for (relative_archive, entry) in newly_extracted {
        let extracted_relative = relative_path_of(root, &entry.extracted_path);
        let file_name = entry
            .extracted_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&entry.entry_path)
            .to_string();
        let extension = entry
            .extracted_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        let node = FileNode::from_archive(
            extracted_relative.clone(),
            extracted_relative,
            file_name,
            extension,
            relative_archive,
            entry.entry_path,
        );
        file_repo.get_or_create(node).ok();
        report.files_discovered += 1;
    }
    // Extracted entries still need a detector pass (e.g. a binary-class
    // detector tagging `java.is_binary`) so phase 2 collectors can see them;
    // re-running over phase-1a files too is a no-op since these detectors
    // are idempotent tag/property setters, not the extraction trigger.
    run_file_detectors(repo, file_detectors);

    Ok(report)
}

fn run_file_detectors(repo: &GraphRepository, detectors: &[std::sync::Arc<dyn Inspector>]) {
    let targets: Vec<String> = repo
        .get_files()
        .into_iter()
        .map(|f| f.common.id)
        .collect();
    for id in targets {
        for detector in detectors {
            if !detector.target_kind().matches(TargetKind::File) {
                continue;
            }
            repo.with_node_mut(&id, |node| {
                if detector.supports(node) {
                    let mut decorator = NodeDecorator::new(node);
                    let _ = detector.inspect(&mut decorator);
                    decorator.finish();
                }
            });
        }
    }
}

/// Helper for adapting a [`FileDetector`] list into `Inspector` trait
/// objects, mirroring the wrapping `discover_files` expects.
pub fn wrap_file_detectors<D: FileDetector + 'static>(
    detectors: Vec<D>,
) -> Vec<std::sync::Arc<dyn Inspector>> {
    detectors
        .into_iter()
        .map(|d| {
            std::sync::Arc::new(crate::inspector::FileDetectorInspector::new(d))
                as std::sync::Arc<dyn Inspector>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphNode;
    use crate::inspector::InspectorError;
    use std::io::Write as _;

    struct JavaSourceDetector;
    impl Inspector for JavaSourceDetector {
        fn name(&self) -> &'static str {
            "JavaSourceDetector"
        }
        fn target_kind(&self) -> TargetKind {
            TargetKind::File
        }
        fn supports(&self, node: &GraphNode) -> bool {
            node.as_file().is_some_and(|f| f.file_extension == "java")
        }
        fn inspect(&self, decorator: &mut NodeDecorator) -> Result<(), InspectorError> {
            decorator.enable_tag("java.is_source");
            decorator.set_property("java.language", serde_json::json!("java"));
            Ok(())
        }
    }

    #[test]
    fn discovers_files_and_runs_file_detectors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Main.java"), "package demo; class Main {}").unwrap();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target").join("Main.class"), "noise").unwrap();

        let repo = GraphRepository::new();
        let ignore_filter = IgnoreFilter::with_defaults();
        let detectors: Vec<std::sync::Arc<dyn Inspector>> =
            vec![std::sync::Arc::new(JavaSourceDetector)];

        let report = discover_files(dir.path(), &repo, &ignore_filter, &detectors).unwrap();
        assert_eq!(report.files_discovered, 1);
        assert_eq!(report.files_ignored, 1);

        let node = repo.get_node_by_id("Main.java").unwrap();
        assert!(node.common().has_tag("java.is_source"));
    }

    #[test]
    fn archive_entries_become_first_class_file_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let jar_path = dir.path().join("lib.jar");
        let file = std::fs::File::create(&jar_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("com/x/Y.class", options).unwrap();
        zip.write_all(b"bytecode").unwrap();
        zip.finish().unwrap();

        let repo = GraphRepository::new();
        let ignore_filter = IgnoreFilter::with_defaults();
        let report = discover_files(dir.path(), &repo, &ignore_filter, &[]).unwrap();
        assert_eq!(report.archives_extracted, 1);

        let extracted = repo
            .get_files()
            .into_iter()
            .find(|f| f.from_archive)
            .expect("extracted FileNode present");
        assert_eq!(extracted.archive_entry_path.as_deref(), Some("com/x/Y.class"));
        assert_eq!(extracted.source_archive_path.as_deref(), Some("lib.jar"));
    }
}
