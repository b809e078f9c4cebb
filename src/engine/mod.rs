//! The analysis engine (C9/C10): the multi-pass executor, its profile, and
//! the top-level orchestration entry point.

pub mod analysis;
pub mod executor;
pub mod profile;

pub use analysis::{AnalysisEngine, AnalyzeOptions, DEFAULT_MAX_PASSES};
pub use executor::{run_phase, sorted_ids, PassResult, DEFAULT_USE_TRACKING};
pub use profile::{ExecutionProfile, InspectorStats, PhaseStats};
