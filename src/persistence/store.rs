//! `redb`-backed persistence adapter (C4): CRUD for nodes/edges/tags with
//! JSON property round-trip and merge-patch semantics.
//!
//! Grounded on `graph::store::GraphStore::save`/`load` (`redb::
//! TableDefinition`, `begin_write`/`begin_read`, `TableDoesNotExist` handled
//! as the fresh-database case).

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use redb::{Database, ReadableTable, ReadableTableMetadata};
use serde_json::Value;

use crate::graph::property;

use super::error::PersistenceError;
use super::schema::{EdgeRow, NodeRow, EDGES_TABLE, NODES_TABLE, NODE_TAGS_TABLE};

#[derive(Debug, Clone, Default)]
pub struct PersistenceStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub tag_count: usize,
}

pub struct PersistenceStore {
    db: Database,
    path: Option<PathBuf>,
}

impl PersistenceStore {
    /// Opens (creating if absent) a `redb` database at `<dir>/graph.redb`,
    /// mirroring `GraphStore::new`.
    pub fn open(dir: &Path) -> Result<Self, PersistenceError> {
        std::fs::create_dir_all(dir)
            .map_err(|e| PersistenceError::Permanent(format!("cannot create {dir:?}: {e}")))?;
        let path = dir.join("graph.redb");
        let db = Database::create(&path)?;
        let store = Self {
            db,
            path: Some(path),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    /// A throwaway store for tests and short-lived in-process use, backed by
    /// a temp file (redb has no first-class in-memory backend we depend on).
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let tmp = tempfile::NamedTempFile::new()
            .map_err(|e| PersistenceError::Permanent(format!("tempfile creation failed: {e}")))?;
        let path = tmp.into_temp_path();
        let path_buf = path.to_path_buf();
        path.keep()
            .map_err(|e| PersistenceError::Permanent(format!("tempfile keep failed: {e}")))?;
        let db = Database::create(&path_buf)?;
        let store = Self {
            db,
            path: Some(path_buf),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn ensure_tables(&self) -> Result<(), PersistenceError> {
        let write_txn = self.db.begin_write()?;
        {
            write_txn.open_table(NODES_TABLE)?;
            write_txn.open_table(EDGES_TABLE)?;
            write_txn.open_table(NODE_TAGS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    // -- nodes ------------------------------------------------------------

    /// Atomic upsert. `properties` is the nested form; validated, flattened,
    /// then persisted.
    pub fn save_node(
        &self,
        id: &str,
        node_type: &str,
        label: &str,
        properties: &HashMap<String, Value>,
        metrics: &HashMap<String, f64>,
        tags: &HashSet<String>,
        inspector_execution_times: &HashMap<String, chrono::DateTime<Utc>>,
        last_modified: chrono::DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        property::validate(properties)?;
        let now = Utc::now();
        let existing = self.find_row(id)?;
        let created_at = existing.as_ref().map(|r| r.created_at).unwrap_or(now);
        let row = NodeRow {
            id: id.to_string(),
            node_type: node_type.to_string(),
            label: label.to_string(),
            properties_flat: property::flatten(properties),
            metrics: metrics.clone(),
            tags: tags.clone(),
            inspector_execution_times: inspector_execution_times.clone(),
            last_modified,
            created_at,
            updated_at: now,
        };
        self.write_row(&row)?;
        self.reindex_tags(&existing.map(|r| r.tags).unwrap_or_default(), tags, id)?;
        Ok(())
    }

    /// Idempotent upsert used during re-analysis so rediscovering a file
    /// never errors; semantically identical to `save_node` here since
    /// `save_node` is already an upsert.
    pub fn merge_node(
        &self,
        id: &str,
        node_type: &str,
        label: &str,
        properties: &HashMap<String, Value>,
        metrics: &HashMap<String, f64>,
        tags: &HashSet<String>,
        inspector_execution_times: &HashMap<String, chrono::DateTime<Utc>>,
        last_modified: chrono::DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        self.save_node(id, node_type, label, properties, metrics, tags, inspector_execution_times, last_modified)
    }

    /// JSON-merge-patch semantics over the nested form: patch keys override,
    /// `null` deletes, absent keys are preserved.
    pub fn merge_properties(
        &self,
        node_id: &str,
        patch: &HashMap<String, Value>,
    ) -> Result<(), PersistenceError> {
        let mut row = self
            .find_row(node_id)?
            .ok_or_else(|| PersistenceError::Permanent(format!("no such node: {node_id}")))?;
        let mut nested = property::nest(&row.properties_flat);
        property::merge_patch(&mut nested, patch);
        property::validate(&nested)?;
        row.properties_flat = property::flatten(&nested);
        row.updated_at = Utc::now();
        self.write_row(&row)
    }

    fn write_row(&self, row: &NodeRow) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec(row)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(NODES_TABLE)?;
            table.insert(row.id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn find_row(&self, id: &str) -> Result<Option<NodeRow>, PersistenceError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(NODES_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<NodeRow>, PersistenceError> {
        self.find_row(id)
    }

    pub fn find_all(&self) -> Result<Vec<NodeRow>, PersistenceError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(NODES_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            out.push(serde_json::from_slice(value.value())?);
        }
        Ok(out)
    }

    pub fn find_by_type(&self, node_type: &str) -> Result<Vec<NodeRow>, PersistenceError> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|r| r.node_type == node_type)
            .collect())
    }

    /// `jsonPath` is a dotted path into the flattened property form.
    pub fn find_by_property_value(
        &self,
        json_path: &str,
        value: &Value,
    ) -> Result<Vec<NodeRow>, PersistenceError> {
        Ok(self
            .find_all()?
            .into_iter()
            .filter(|r| r.properties_flat.get(json_path) == Some(value))
            .collect())
    }

    pub fn find_by_tag(&self, tag: &str) -> Result<Vec<NodeRow>, PersistenceError> {
        let ids = self.tag_index_read(tag)?;
        self.rows_for_ids(&ids)
    }

    pub fn find_by_any_tags(&self, tags: &[&str]) -> Result<Vec<NodeRow>, PersistenceError> {
        let mut ids: HashSet<String> = HashSet::new();
        for tag in tags {
            ids.extend(self.tag_index_read(tag)?);
        }
        self.rows_for_ids(&ids.into_iter().collect::<Vec<_>>())
    }

    pub fn find_by_all_tags(&self, tags: &[&str]) -> Result<Vec<NodeRow>, PersistenceError> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let mut sets = Vec::new();
        for tag in tags {
            sets.push(self.tag_index_read(tag)?.into_iter().collect::<HashSet<_>>());
        }
        let mut iter = sets.into_iter();
        let first = iter.next().unwrap_or_default();
        let intersection = iter.fold(first, |acc, s| acc.intersection(&s).cloned().collect());
        self.rows_for_ids(&intersection.into_iter().collect::<Vec<_>>())
    }

    pub fn find_by_type_and_any_tags(
        &self,
        node_type: &str,
        tags: &[&str],
    ) -> Result<Vec<NodeRow>, PersistenceError> {
        Ok(self
            .find_by_any_tags(tags)?
            .into_iter()
            .filter(|r| r.node_type == node_type)
            .collect())
    }

    pub fn find_by_type_and_all_tags(
        &self,
        node_type: &str,
        tags: &[&str],
    ) -> Result<Vec<NodeRow>, PersistenceError> {
        Ok(self
            .find_by_all_tags(tags)?
            .into_iter()
            .filter(|r| r.node_type == node_type)
            .collect())
    }

    fn rows_for_ids(&self, ids: &[String]) -> Result<Vec<NodeRow>, PersistenceError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = self.find_row(id)? {
                out.push(row);
            }
        }
        Ok(out)
    }

    fn tag_index_read(&self, tag: &str) -> Result<Vec<String>, PersistenceError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(NODE_TAGS_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match table.get(tag)? {
            Some(guard) => Ok(serde_json::from_slice(guard.value())?),
            None => Ok(Vec::new()),
        }
    }

    fn reindex_tags(
        &self,
        old_tags: &HashSet<String>,
        new_tags: &HashSet<String>,
        node_id: &str,
    ) -> Result<(), PersistenceError> {
        let removed: Vec<&String> = old_tags.difference(new_tags).collect();
        let added: Vec<&String> = new_tags.difference(old_tags).collect();
        if removed.is_empty() && added.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(NODE_TAGS_TABLE)?;
            for tag in removed {
                let mut ids: Vec<String> = match table.get(tag.as_str())? {
                    Some(g) => serde_json::from_slice(g.value())?,
                    None => Vec::new(),
                };
                ids.retain(|id| id != node_id);
                table.insert(tag.as_str(), serde_json::to_vec(&ids)?.as_slice())?;
            }
            for tag in added {
                let mut ids: Vec<String> = match table.get(tag.as_str())? {
                    Some(g) => serde_json::from_slice(g.value())?,
                    None => Vec::new(),
                };
                if !ids.iter().any(|id| id == node_id) {
                    ids.push(node_id.to_string());
                }
                table.insert(tag.as_str(), serde_json::to_vec(&ids)?.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    // -- edges --------------------------------------------------------------

    pub fn create_edge(
        &self,
        id: &str,
        source_id: &str,
        target_id: &str,
        edge_type: &str,
        metadata: Option<HashMap<String, Value>>,
    ) -> Result<(), PersistenceError> {
        let row = EdgeRow {
            id: id.to_string(),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            edge_type: edge_type.to_string(),
            metadata,
            created_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&row)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(EDGES_TABLE)?;
            table.insert(row.id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn find_all_edges(&self) -> Result<Vec<EdgeRow>, PersistenceError> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(EDGES_TABLE) {
            Ok(t) => t,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            out.push(serde_json::from_slice(value.value())?);
        }
        Ok(out)
    }

    pub fn find_outgoing(&self, source_id: &str) -> Result<Vec<EdgeRow>, PersistenceError> {
        Ok(self
            .find_all_edges()?
            .into_iter()
            .filter(|e| e.source_id == source_id)
            .collect())
    }

    pub fn find_incoming(&self, target_id: &str) -> Result<Vec<EdgeRow>, PersistenceError> {
        Ok(self
            .find_all_edges()?
            .into_iter()
            .filter(|e| e.target_id == target_id)
            .collect())
    }

    pub fn find_edges_by_type(&self, edge_type: &str) -> Result<Vec<EdgeRow>, PersistenceError> {
        Ok(self
            .find_all_edges()?
            .into_iter()
            .filter(|e| e.edge_type == edge_type)
            .collect())
    }

    /// Truncates in FK-safe order: edges, tags, nodes.
    pub fn clear_all(&self) -> Result<(), PersistenceError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut edges = write_txn.open_table(EDGES_TABLE)?;
            edges.retain(|_, _| false)?;
            let mut tags = write_txn.open_table(NODE_TAGS_TABLE)?;
            tags.retain(|_, _| false)?;
            let mut nodes = write_txn.open_table(NODES_TABLE)?;
            nodes.retain(|_, _| false)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn statistics(&self) -> Result<PersistenceStatistics, PersistenceError> {
        let read_txn = self.db.begin_read()?;
        let node_count = match read_txn.open_table(NODES_TABLE) {
            Ok(t) => t.len()? as usize,
            Err(redb::TableError::TableDoesNotExist(_)) => 0,
            Err(e) => return Err(e.into()),
        };
        let edge_count = match read_txn.open_table(EDGES_TABLE) {
            Ok(t) => t.len()? as usize,
            Err(redb::TableError::TableDoesNotExist(_)) => 0,
            Err(e) => return Err(e.into()),
        };
        let tag_count = match read_txn.open_table(NODE_TAGS_TABLE) {
            Ok(t) => t.len()? as usize,
            Err(redb::TableError::TableDoesNotExist(_)) => 0,
            Err(e) => return Err(e.into()),
        };
        Ok(PersistenceStatistics {
            node_count,
            edge_count,
            tag_count,
        })
    }
}
