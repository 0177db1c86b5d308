//! Process-wide orchestrator counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters shared by every pipeline an orchestrator runs.
///
/// Counters are monotonic; callers compute deltas themselves.
#[derive(Debug, Default)]
pub struct OrchestratorMetricsStorage {
    pub(crate) pipelines_started: AtomicU64,
    pub(crate) pipelines_completed: AtomicU64,
    pub(crate) pipelines_failed: AtomicU64,
    pub(crate) phases_completed: AtomicU64,
    pub(crate) segments_processed: AtomicU64,
}

impl OrchestratorMetricsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_pipeline_started(&self) {
        self.pipelines_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_pipeline_finished(&self, success: bool) {
        if success {
            self.pipelines_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.pipelines_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_phase_completed(&self, segments: usize) {
        self.phases_completed.fetch_add(1, Ordering::Relaxed);
        self.segments_processed
            .fetch_add(segments as u64, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> OrchestratorMetrics {
        OrchestratorMetrics {
            pipelines_started: self.pipelines_started.load(Ordering::Relaxed),
            pipelines_completed: self.pipelines_completed.load(Ordering::Relaxed),
            pipelines_failed: self.pipelines_failed.load(Ordering::Relaxed),
            phases_completed: self.phases_completed.load(Ordering::Relaxed),
            segments_processed: self.segments_processed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`OrchestratorMetricsStorage`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorMetrics {
    pub pipelines_started: u64,
    pub pipelines_completed: u64,
    pub pipelines_failed: u64,
    pub phases_completed: u64,
    pub segments_processed: u64,
}

impl OrchestratorMetrics {
    /// Pipelines started but not yet finished.
    pub fn pipelines_in_flight(&self) -> u64 {
        self.pipelines_started
            .saturating_sub(self.pipelines_completed + self.pipelines_failed)
    }
}
