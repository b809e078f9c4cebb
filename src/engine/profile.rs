//! Execution profile (C10): per-phase timings/counts, per-inspector
//! call count/duration/failures/per-pass breakdown.
//!
//! Grounded on `detectors::base::DetectionSummary` (`add_result`,
//! per-severity counts) generalized to per-phase and per-inspector-per-pass
//! shape.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct PhaseStats {
    pub wall_time: Duration,
    pub items_scanned: usize,
    pub items_processed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct InspectorStats {
    pub call_count: u64,
    pub total_duration: Duration,
    pub failure_count: u64,
    /// Per-pass invocation counts, indexed from pass 1.
    pub per_pass_calls: Vec<u64>,
}

impl InspectorStats {
    fn record(&mut self, pass: usize, duration: Duration, failed: bool) {
        self.call_count += 1;
        self.total_duration += duration;
        if failed {
            self.failure_count += 1;
        }
        if self.per_pass_calls.len() < pass {
            self.per_pass_calls.resize(pass, 0);
        }
        self.per_pass_calls[pass - 1] += 1;
    }
}

/// Plain data value the executor returns; a reporter (out of scope) renders
/// it for humans.
#[derive(Debug, Clone, Default)]
pub struct ExecutionProfile {
    pub phases: HashMap<String, PhaseStats>,
    pub inspectors: HashMap<String, InspectorStats>,
    pub passes_executed: usize,
    pub converged: bool,
}

impl ExecutionProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_phase(&mut self, phase: &str, wall_time: Duration, scanned: usize, processed: usize) {
        let stats = self.phases.entry(phase.to_string()).or_default();
        stats.wall_time += wall_time;
        stats.items_scanned += scanned;
        stats.items_processed += processed;
    }

    pub fn record_invocation(
        &mut self,
        inspector_name: &str,
        pass: usize,
        duration: Duration,
        failed: bool,
    ) {
        self.inspectors
            .entry(inspector_name.to_string())
            .or_default()
            .record(pass, duration, failed);
    }

    pub fn merge(&mut self, other: ExecutionProfile) {
        for (phase, stats) in other.phases {
            let entry = self.phases.entry(phase).or_default();
            entry.wall_time += stats.wall_time;
            entry.items_scanned += stats.items_scanned;
            entry.items_processed += stats.items_processed;
        }
        for (name, stats) in other.inspectors {
            let entry = self.inspectors.entry(name).or_default();
            entry.call_count += stats.call_count;
            entry.total_duration += stats.total_duration;
            entry.failure_count += stats.failure_count;
            for (i, count) in stats.per_pass_calls.into_iter().enumerate() {
                if entry.per_pass_calls.len() <= i {
                    entry.per_pass_calls.resize(i + 1, 0);
                }
                entry.per_pass_calls[i] += count;
            }
        }
        self.passes_executed = self.passes_executed.max(other.passes_executed);
        self.converged = self.converged || other.converged;
    }
}
