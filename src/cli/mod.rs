//! Thin CLI surface over the library's `AnalysisEngine`. The core never
//! parses flags itself (spec.md §6): this is one possible embedding,
//! grounded on `cli::mod::{Cli, Commands, run}`'s clap-derive shape.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use codegraph::config::load_config;
use codegraph::discovery::ClassNodeCollector;
use codegraph::engine::{AnalysisEngine, AnalyzeOptions};
use codegraph::inspector::{Inspector, InspectorRegistry};
use codegraph::persistence::PersistenceStore;
use codegraph::project::DEFAULT_ANALYSIS_FILE_NAME;

#[derive(Parser, Debug)]
#[command(name = "codegraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the project to analyze (default: current directory).
    #[arg(global = true, default_value = ".")]
    pub path: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run discovery, collection, and inspectors over the project.
    Inventory {
        /// Restrict to these inspector names (default: all registered).
        #[arg(long = "inspector")]
        inspectors: Vec<String>,

        /// Maximum passes per phase before giving up on convergence
        /// (default: `codegraph.toml`'s `max_passes`, or 5).
        #[arg(long)]
        max_passes: Option<usize>,

        /// Restrict phase 4 to classes whose package starts with one of
        /// these prefixes (default: no restriction).
        #[arg(long = "package")]
        packages: Vec<String>,
    },

    /// Load a previously saved analysis, optionally re-running a subset of
    /// inspectors over it.
    Load {
        /// Inspector names to re-run after loading (default: none).
        #[arg(long = "re-analyze")]
        re_analyze: Vec<String>,
    },
}

/// Dispatches a parsed [`Cli`] invocation against a minimal built-in engine
/// (no Java parser wired in: class collection yields nothing unless an
/// embedder supplies `collectors`/`file_detectors` of its own).
pub fn run(cli: Cli) -> Result<()> {
    let file_detectors: Vec<std::sync::Arc<dyn Inspector>> = Vec::new();
    let inspectors = InspectorRegistry::new();
    let collectors: Vec<std::sync::Arc<dyn ClassNodeCollector>> = Vec::new();
    let engine = AnalysisEngine::new(file_detectors, inspectors, collectors);

    let config = load_config(&cli.path)?;
    let analysis_dir = config.analysis_dir_path(&cli.path).join("store");
    let store = PersistenceStore::open(&analysis_dir)
        .with_context(|| format!("opening persistence store at {}", analysis_dir.display()))?;

    match cli.command {
        Commands::Inventory {
            inspectors,
            max_passes,
            packages,
        } => {
            let options = AnalyzeOptions {
                requested_inspectors: if inspectors.is_empty() {
                    None
                } else {
                    Some(inspectors.into_iter().collect::<HashSet<_>>())
                },
                max_passes: Some(max_passes.unwrap_or(config.max_passes)),
                package_filters: if packages.is_empty() {
                    if config.package_filters.is_empty() {
                        None
                    } else {
                        Some(config.package_filters.clone())
                    }
                } else {
                    Some(packages)
                },
            };
            let (project, profile) = engine
                .analyze_project(&cli.path, &store, |_| None, options)
                .context("analysis failed")?;
            println!(
                "analyzed {} ({} nodes, {} passes, converged={})",
                project.metadata.name,
                project.repo.node_count(),
                profile.passes_executed,
                profile.converged
            );
        }
        Commands::Load { re_analyze } => {
            let analysis_file = cli.path.join(DEFAULT_ANALYSIS_FILE_NAME);
            let options = AnalyzeOptions {
                requested_inspectors: if re_analyze.is_empty() {
                    None
                } else {
                    Some(re_analyze.into_iter().collect::<HashSet<_>>())
                },
                ..AnalyzeOptions::default()
            };
            if !analysis_file.exists() {
                anyhow::bail!("no saved analysis at {}", analysis_file.display());
            }
            let (project, _profile) = engine
                .analyze_project(&cli.path, &store, |_| None, options)
                .context("re-analysis failed")?;
            println!("loaded {} ({} nodes)", project.metadata.name, project.repo.node_count());
        }
    }

    Ok(())
}
