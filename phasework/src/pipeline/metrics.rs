use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TaskMetrics {
    pub name: String,
    pub segment: usize,
    pub items_processed: u64,
    /// Attempts it took to succeed (1 = no retries).
    pub attempts: u32,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseMetrics {
    pub index: usize,
    pub phase: String,
    pub segments: usize,
    pub items_processed: u64,
    pub duration_ms: u128,
    /// Per-segment metrics, in completion order.
    pub tasks: Vec<TaskMetrics>,
}

impl PhaseMetrics {
    pub fn retries(&self) -> u32 {
        self.tasks.iter().map(|t| t.attempts.saturating_sub(1)).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineMetrics {
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub total_duration_ms: u128,
    pub phases: Vec<PhaseMetrics>,
}

impl PipelineMetrics {
    pub fn phase_duration_ms(&self, name: &str) -> Option<u128> {
        self.phases
            .iter()
            .find(|phase| phase.phase == name)
            .map(|phase| phase.duration_ms)
    }

    pub fn retries(&self) -> u32 {
        self.phases.iter().map(PhaseMetrics::retries).sum()
    }
}
