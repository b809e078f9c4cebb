//! Engine configuration (ambient stack): project-level settings loaded from
//! an optional `codegraph.toml` in the project root.
//!
//! Grounded on `config::project_config::load_project_config`'s search-then-
//! fall-back-to-defaults shape, narrowed to the single TOML format this
//! crate's dependency stack supports (no YAML/JSON config parser pulled in).

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "codegraph.toml";
pub const DEFAULT_ANALYSIS_DIR: &str = ".analysis";
pub const DEFAULT_MAX_PASSES: usize = 5;

/// Settings governing one analysis run, merged from an optional
/// `codegraph.toml` over built-in defaults (spec.md §6's configuration
/// inputs: project root, ignore-pattern file, analysis-dir subpath,
/// persistence connection info, max-passes).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Subdirectory (relative to the project root) archive extraction and
    /// per-node exports are written under.
    pub analysis_dir: String,

    /// Upper bound on passes per phase before the executor gives up on
    /// convergence.
    pub max_passes: usize,

    /// Extra ignore glob patterns, appended to `IgnoreFilter::with_defaults`.
    pub ignore_patterns: Vec<String>,

    /// Restricts phase 4 to classes in these package prefixes. Empty means
    /// no restriction.
    pub package_filters: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis_dir: DEFAULT_ANALYSIS_DIR.to_string(),
            max_passes: DEFAULT_MAX_PASSES,
            ignore_patterns: Vec::new(),
            package_filters: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn analysis_dir_path(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.analysis_dir)
    }
}

/// Loads `codegraph.toml` from `project_root`, falling back to defaults if
/// absent. A malformed file is a hard configuration error (spec.md §7:
/// ConfigError aborts before phase 1).
pub fn load_config(project_root: &Path) -> Result<EngineConfig, crate::error::CodegraphError> {
    let path = project_root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        tracing::debug!("no {CONFIG_FILE_NAME} found, using defaults");
        return Ok(EngineConfig::default());
    }
    let content = std::fs::read_to_string(&path)
        .map_err(|e| crate::error::CodegraphError::config(format!("reading {}: {e}", path.display())))?;
    toml::from_str(&content)
        .map_err(|e| crate::error::CodegraphError::config(format!("parsing {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.max_passes, DEFAULT_MAX_PASSES);
        assert_eq!(config.analysis_dir, DEFAULT_ANALYSIS_DIR);
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "max_passes = 3\npackage_filters = [\"com.acme\"]\n",
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.max_passes, 3);
        assert_eq!(config.package_filters, vec!["com.acme".to_string()]);
        assert_eq!(config.analysis_dir, DEFAULT_ANALYSIS_DIR);
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "not valid toml [[[").unwrap();
        let err = load_config(dir.path()).unwrap_err();
        assert!(matches!(err, crate::error::CodegraphError::Config(_)));
    }
}
