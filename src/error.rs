//! Crate-wide error taxonomy.
//!
//! Leaf errors are concrete `thiserror` enums (one per subsystem, matching
//! spec.md §7's taxonomy); orchestration functions that stitch several
//! subsystems together return `anyhow::Result`.

use std::path::PathBuf;

use crate::persistence::PersistenceError;

/// Top-level error returned by `AnalysisEngine::analyze_project` and the
/// project load/save path.
#[derive(Debug, thiserror::Error)]
pub enum CodegraphError {
    /// Invalid ignore pattern, missing project path, bad persistence config.
    /// Aborts the run before phase 1.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unreadable file or failed archive extraction. The offending path is
    /// excluded and the pipeline continues; this variant only surfaces when
    /// discovery fails wholesale (e.g. the project root does not exist).
    #[error("discovery error: {0}")]
    Discovery(String),

    /// An inspector raised an error that could not be isolated to a single
    /// node (e.g. a registry-level contract violation).
    #[error("inspector error: {0}")]
    Inspector(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Invalid or incompatible saved project JSON.
    #[error("load error: {0}")]
    Load(String),

    /// Duplicate inspector name or cyclic dependency detected at startup.
    #[error("registry error: {0}")]
    Registry(String),
}

impl CodegraphError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }
}

/// Raised when a project path fails basic sanity checks before analysis starts.
#[derive(Debug, thiserror::Error)]
#[error("project path does not exist or is not a directory: {0}")]
pub struct InvalidProjectPath(pub PathBuf);
