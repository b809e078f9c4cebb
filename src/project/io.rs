//! Project load/save (C11).
//!
//! Grounded on `graph::store::GraphStore::save`/`load` (redb round trip),
//! generalized to include project metadata and a JSON master record per
//! spec.md §4.11/§6.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::graph::{GraphRepository, NodeTypeRegistry, StoredNode};
use crate::persistence::{NodeRow, PersistenceError, PersistenceStore};

/// Current schema/version for the master record (spec.md §6:
/// `<project>/<projectAnalysis>.json`).
pub const SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_ANALYSIS_FILE_NAME: &str = "codegraph-analysis.json";

#[derive(Debug, thiserror::Error)]
pub enum ProjectLoadError {
    #[error("incompatible schema version: expected {expected}, found {found}")]
    IncompatibleVersion { expected: u32, found: u32 },

    #[error("invalid saved project JSON: {0}")]
    InvalidJson(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_analyzed: DateTime<Utc>,
    /// Arbitrary project-level key-value bag (spec.md §4.11).
    pub project_data: HashMap<String, Value>,
}

impl ProjectMetadata {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            path,
            created_at: now,
            last_analyzed: now,
            project_data: HashMap::new(),
        }
    }
}

/// The master record persisted at `<project>/<DEFAULT_NAME>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MasterRecord {
    schema_version: u32,
    metadata: ProjectMetadata,
}

#[derive(Debug)]
pub struct Project {
    pub metadata: ProjectMetadata,
    pub repo: GraphRepository,
}

/// Serializes project metadata plus every node/edge through the persistence
/// adapter, and writes the JSON master record.
pub fn save_project(
    project: &Project,
    analysis_file: &Path,
    store: &PersistenceStore,
) -> Result<(), ProjectLoadError> {
    for node in project.repo.get_nodes_by_type(&[]) {
        let common = node.common();
        store.save_node(
            &common.id,
            &common.node_type,
            &common.display_label,
            &crate::graph::property::nest(&common.properties),
            &common.metrics,
            &common.tags,
            &common.inspector_execution_times,
            common.last_modified,
        )?;
    }
    for edge in project.repo.get_edges_by_type(&[]) {
        store.create_edge(&edge.id, &edge.source_id, &edge.target_id, &edge.edge_type, edge.metadata.clone())?;
    }

    let record = MasterRecord {
        schema_version: SCHEMA_VERSION,
        metadata: project.metadata.clone(),
    };
    let json = serde_json::to_vec_pretty(&record)
        .map_err(|e| ProjectLoadError::InvalidJson(e.to_string()))?;
    std::fs::write(analysis_file, json)
        .map_err(|e| ProjectLoadError::Persistence(PersistenceError::Permanent(e.to_string())))?;
    Ok(())
}

/// Loads a prior analysis: checks schema/version compatibility, rehydrates
/// nodes via C3 factories, and wires edges via endpoint lookup. Edges whose
/// endpoints do not rehydrate are dropped with a debug log, per spec.md
/// §4.11.
pub fn load_project(
    analysis_file: &Path,
    store: &PersistenceStore,
    registry: &NodeTypeRegistry,
) -> Result<Project, ProjectLoadError> {
    let bytes = std::fs::read(analysis_file)
        .map_err(|e| ProjectLoadError::InvalidJson(e.to_string()))?;
    let mut record: MasterRecord =
        serde_json::from_slice(&bytes).map_err(|e| ProjectLoadError::InvalidJson(e.to_string()))?;
    if record.schema_version != SCHEMA_VERSION {
        return Err(ProjectLoadError::IncompatibleVersion {
            expected: SCHEMA_VERSION,
            found: record.schema_version,
        });
    }

    let repo = GraphRepository::new();
    for row in store.find_all()? {
        let stored = stored_node_from_row(row);
        match registry.reconstruct(&stored) {
            Ok(node) => {
                repo.add_node(node).ok();
            }
            Err(e) => {
                tracing::debug!(node_type = %stored.node_type, error = %e, "skipping node with unknown type during load");
            }
        }
    }

    for edge in store.find_all_edges()? {
        match repo.restore_edge(&edge.id, &edge.source_id, &edge.target_id, &edge.edge_type, edge.metadata.clone()) {
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(edge_id = %edge.id, error = %e, "dropping edge with missing endpoint during load");
            }
        }
    }

    record.metadata.last_analyzed = Utc::now();
    Ok(Project {
        metadata: record.metadata,
        repo,
    })
}

fn stored_node_from_row(row: NodeRow) -> StoredNode {
    StoredNode {
        id: row.id,
        node_type: row.node_type,
        display_label: row.label,
        properties: crate::graph::property::nest(&row.properties_flat),
        metrics: row.metrics,
        tags: row.tags,
        inspector_execution_times: row.inspector_execution_times,
        last_modified: row.last_modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FileNode, FileRepository};

    #[test]
    fn save_then_load_round_trips_node_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::open(dir.path()).unwrap();

        let repo = GraphRepository::new();
        let files = FileRepository::new(&repo);
        files.get_or_create(FileNode::new("root/A.java", "A.java")).unwrap();

        let project = Project {
            metadata: ProjectMetadata::new("demo", dir.path().to_path_buf()),
            repo,
        };
        let analysis_file = dir.path().join(DEFAULT_ANALYSIS_FILE_NAME);
        save_project(&project, &analysis_file, &store).unwrap();

        let registry = NodeTypeRegistry::with_builtin_types();
        let loaded = load_project(&analysis_file, &store, &registry).unwrap();
        assert_eq!(loaded.repo.node_count(), 1);
        assert_eq!(loaded.metadata.name, "demo");
    }

    #[test]
    fn load_rejects_incompatible_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::open(dir.path()).unwrap();
        let analysis_file = dir.path().join(DEFAULT_ANALYSIS_FILE_NAME);
        let bad_record = serde_json::json!({
            "schema_version": 999,
            "metadata": {
                "name": "demo",
                "path": dir.path(),
                "created_at": Utc::now(),
                "last_analyzed": Utc::now(),
                "project_data": {}
            }
        });
        std::fs::write(&analysis_file, serde_json::to_vec(&bad_record).unwrap()).unwrap();

        let registry = NodeTypeRegistry::with_builtin_types();
        let err = load_project(&analysis_file, &store, &registry).unwrap_err();
        assert!(matches!(err, ProjectLoadError::IncompatibleVersion { .. }));
    }

    #[test]
    fn inspector_execution_times_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::open(dir.path()).unwrap();

        let repo = GraphRepository::new();
        let files = FileRepository::new(&repo);
        files.get_or_create(FileNode::new("a", "a")).unwrap();
        let ts = Utc::now();
        repo.with_node_mut("a", |node| {
            node.common_mut()
                .inspector_execution_times
                .insert("JavaSourceDetector".to_string(), ts);
        });

        let project = Project {
            metadata: ProjectMetadata::new("demo", dir.path().to_path_buf()),
            repo,
        };
        let analysis_file = dir.path().join(DEFAULT_ANALYSIS_FILE_NAME);
        save_project(&project, &analysis_file, &store).unwrap();

        let registry = NodeTypeRegistry::with_builtin_types();
        let loaded = load_project(&analysis_file, &store, &registry).unwrap();
        let node = loaded.repo.get_node_by_id("a").unwrap();
        assert!(node.common().is_up_to_date("JavaSourceDetector"));
    }

    #[test]
    fn edge_metadata_survives_round_trip() {
        // Edge metadata is persistence-only plumbing (no live creation path
        // sets it today); exercised here directly against the store, the
        // same shape a future metadata-carrying edge source would produce.
        let dir = tempfile::tempdir().unwrap();
        let store = PersistenceStore::open(dir.path()).unwrap();

        let repo = GraphRepository::new();
        let files = FileRepository::new(&repo);
        files.get_or_create(FileNode::new("a", "a")).unwrap();
        files.get_or_create(FileNode::new("b", "b")).unwrap();

        let project = Project {
            metadata: ProjectMetadata::new("demo", dir.path().to_path_buf()),
            repo,
        };
        let analysis_file = dir.path().join(DEFAULT_ANALYSIS_FILE_NAME);
        save_project(&project, &analysis_file, &store).unwrap();

        let mut metadata = HashMap::new();
        metadata.insert("weight".to_string(), serde_json::json!(3));
        store
            .create_edge("e1", "a", "b", crate::graph::model::edge_types::USES, Some(metadata.clone()))
            .unwrap();

        let registry = NodeTypeRegistry::with_builtin_types();
        let loaded = load_project(&analysis_file, &store, &registry).unwrap();
        let restored = loaded
            .repo
            .get_edges_by_type(&[crate::graph::model::edge_types::USES])
            .into_iter()
            .find(|e| e.source_id == "a" && e.target_id == "b")
            .expect("edge restored");
        assert_eq!(restored.id, "e1");
        assert_eq!(restored.metadata, Some(metadata));
    }
}
