//! Persistence error taxonomy: transient vs. permanent (spec.md §7).
//!
//! Grounded on the teacher's `redb`-backed `GraphStore::save`/`load`, which
//! propagates `redb` errors directly; this crate distinguishes failure
//! classes explicitly so `project::io` can retry transient failures once.

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// A lock contention or I/O hiccup that is worth retrying once.
    #[error("transient persistence error: {0}")]
    Transient(String),

    /// Corrupt store, schema mismatch, or disk-full: retrying will not help.
    #[error("permanent persistence error: {0}")]
    Permanent(String),
}

impl From<redb::Error> for PersistenceError {
    fn from(err: redb::Error) -> Self {
        PersistenceError::Permanent(err.to_string())
    }
}

impl From<redb::TransactionError> for PersistenceError {
    fn from(err: redb::TransactionError) -> Self {
        PersistenceError::Transient(err.to_string())
    }
}

impl From<redb::TableError> for PersistenceError {
    fn from(err: redb::TableError) -> Self {
        PersistenceError::Permanent(err.to_string())
    }
}

impl From<redb::StorageError> for PersistenceError {
    fn from(err: redb::StorageError) -> Self {
        PersistenceError::Transient(err.to_string())
    }
}

impl From<redb::CommitError> for PersistenceError {
    fn from(err: redb::CommitError) -> Self {
        PersistenceError::Transient(err.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Permanent(format!("property serialization failed: {err}"))
    }
}

impl From<crate::graph::property::PropertyError> for PersistenceError {
    fn from(err: crate::graph::property::PropertyError) -> Self {
        PersistenceError::Permanent(err.to_string())
    }
}

impl From<redb::DatabaseError> for PersistenceError {
    fn from(err: redb::DatabaseError) -> Self {
        PersistenceError::Permanent(err.to_string())
    }
}
