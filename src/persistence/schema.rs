//! Row shapes and `redb` table definitions for the three logical tables
//! spec.md §4.3 names: `nodes`, `edges`, `node_tags`.
//!
//! Grounded on `graph::store::{NODES_TABLE, EDGES_TABLE}` (`redb::
//! TableDefinition<&str, &[u8]>`, JSON-serialized values), generalized from
//! two ad hoc tables (the teacher serializes the whole `CodeNode`/`CodeEdge`)
//! into three normalized rows plus a denormalized tag index for
//! `findByTag`-style queries.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use redb::TableDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NODES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");
pub const EDGES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("edges");
/// Denormalized tag -> node-id-list index, keyed by tag name.
pub const NODE_TAGS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("node_tags");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRow {
    pub id: String,
    pub node_type: String,
    pub label: String,
    /// Flattened, dotted-path property map (persisted form; see
    /// `graph::property::flatten`/`nest`).
    pub properties_flat: HashMap<String, Value>,
    pub metrics: HashMap<String, f64>,
    pub tags: HashSet<String>,
    pub inspector_execution_times: HashMap<String, DateTime<Utc>>,
    /// The domain node's `NodeCommon::last_modified` (spec.md §8), distinct
    /// from `updated_at` below which tracks this row's own save history.
    pub last_modified: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRow {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub edge_type: String,
    pub metadata: Option<HashMap<String, Value>>,
    pub created_at: DateTime<Utc>,
}
