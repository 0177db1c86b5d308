//! Fan-out/fan-in execution framework.
//!
//! This module provides the executor the orchestrator dispatches segments to:
//! - Concurrent dispatch of independent tasks, bounded by a worker limit
//! - Fan-in that resolves once every task finished (completion order)
//! - Bounded fixed-delay retry of transient task failures
//! - Per-task, per-phase and per-pipeline timing metrics
//!
//! ## Architecture
//!
//! ```text
//! Orchestrator → chord(Executor, [Task; N], continuation)
//!
//! - Executor: spawns tasks, fans results back in
//! - Task: one work item bound to its phase handler
//! - continuation: the phase's collect step
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use phasework::pipeline::{TokioExecutor, RetryPolicy, SegmentTask, chord};
//!
//! let executor = TokioExecutor::new(8, RetryPolicy::default())?;
//! let tasks = items
//!     .into_iter()
//!     .map(|item| SegmentTask::boxed(Arc::clone(&handler), item))
//!     .collect();
//! let aggregate = chord(&executor, tasks, |outcomes| async move {
//!     handler.collect(outcomes.into_iter().map(|o| o.result).collect())
//! })
//! .await?;
//! ```

mod executor;
mod metrics;
mod retry;
mod task;

pub use executor::{Executor, TaskHandle, TaskOutcome, TokioExecutor, chain, chord};
pub use metrics::{PhaseMetrics, PipelineMetrics, TaskMetrics};
pub use retry::RetryPolicy;
pub use task::{BoxedTask, PipelineTask, SegmentTask};
