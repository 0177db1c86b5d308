//! Phase orchestrator.
//!
//! Drives one job through its pipeline:
//!
//! ```text
//! Idle ──▶ Preparing ──▶ FanningOut ──▶ Collecting ──▶ Advancing ──┬──▶ Idle (next phase)
//!                                                                  └──▶ Terminal
//! ```
//!
//! `start_phase` resolves the handler, prepares work items and dispatches
//! them as a chord whose continuation collects the aggregate; `end_phase` is
//! chained after it and decides whether the pipeline advances. No state is
//! shared between jobs: every transition hands an owned [`JobContext`] to the
//! next phase.

mod state;

pub use state::{JobContext, PhaseState, PipelineMetadata, Transition};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use phasework_shared::PhaseworkResult;
use serde_json::Value;
use ulid::Ulid;

use crate::config::PhaseworkOptions;
use crate::metrics::{OrchestratorMetrics, OrchestratorMetricsStorage};
use crate::phase::{PhaseRegistry, total_items};
use crate::pipeline::{
    Executor, PhaseMetrics, PipelineMetrics, SegmentTask, TokioExecutor, chain, chord,
};
use crate::segment::SegmentCount;

/// Width of the phase banners written to the log.
const BANNER_WIDTH: usize = 186;

/// Final aggregate of a pipeline plus its timing.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub result: Value,
    pub metrics: PipelineMetrics,
}

/// One completed phase: what happens next, and how long it took.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub transition: Transition,
    pub metrics: PhaseMetrics,
}

/// Runs pipelines of registered phases on an executor.
pub struct Orchestrator {
    registry: Arc<PhaseRegistry>,
    executor: Arc<dyn Executor>,
    options: PhaseworkOptions,
    metrics: OrchestratorMetricsStorage,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator. `options` are validated here.
    pub fn new(
        registry: Arc<PhaseRegistry>,
        executor: Arc<dyn Executor>,
        options: PhaseworkOptions,
    ) -> PhaseworkResult<Self> {
        options.validate()?;
        Ok(Self {
            registry,
            executor,
            options,
            metrics: OrchestratorMetricsStorage::new(),
        })
    }

    /// Orchestrator with the built-in phases and a tokio executor.
    pub fn from_options(options: PhaseworkOptions) -> PhaseworkResult<Self> {
        let registry = Arc::new(PhaseRegistry::builtin(&options)?);
        let executor = Arc::new(TokioExecutor::from_options(&options)?);
        tracing::debug!(
            max_concurrency = options.max_concurrency,
            retry = ?executor.retry_policy(),
            "Created tokio executor"
        );
        Self::new(registry, executor, options)
    }

    pub fn registry(&self) -> &PhaseRegistry {
        &self.registry
    }

    pub fn options(&self) -> &PhaseworkOptions {
        &self.options
    }

    pub fn metrics(&self) -> OrchestratorMetrics {
        self.metrics.snapshot()
    }

    /// Run `tasks` in order over `data` and return the final aggregate.
    ///
    /// `segments` defaults to the configured segment count. The pipeline
    /// either completes or fails with an error naming the phase; it never
    /// returns a partial aggregate.
    pub async fn run_pipeline(
        &self,
        data: Value,
        tasks: Vec<String>,
        segments: Option<usize>,
    ) -> PhaseworkResult<PipelineOutput> {
        let segments = match segments {
            Some(n) => SegmentCount::new(n)?,
            None => self.options.segment_count()?,
        };
        let mut ctx = JobContext::new(data, tasks, segments)?;
        let job_id = ctx.job_id;

        tracing::info!(
            job_id = %job_id,
            tasks = ?ctx.metadata.all_tasks,
            segments = %segments,
            "Starting pipeline"
        );
        self.metrics.record_pipeline_started();

        let started_at = Utc::now();
        let start = Instant::now();
        let mut phases = Vec::with_capacity(ctx.metadata.all_tasks.len());

        let outcome = loop {
            match self.start_phase(ctx).await {
                Ok(report) => {
                    phases.push(report.metrics);
                    match report.transition {
                        Transition::Next(next) => ctx = next,
                        Transition::Terminal(result) => break Ok(result),
                    }
                }
                Err(e) => break Err(e),
            }
        };

        let total_duration_ms = start.elapsed().as_millis();
        self.metrics.record_pipeline_finished(outcome.is_ok());

        match outcome {
            Ok(result) => {
                tracing::info!("{}", banner("# End Job."));
                tracing::info!(
                    job_id = %job_id,
                    phases = phases.len(),
                    duration_ms = total_duration_ms as u64,
                    "Pipeline completed"
                );
                Ok(PipelineOutput {
                    result,
                    metrics: PipelineMetrics {
                        job_id: job_id.to_string(),
                        started_at,
                        total_duration_ms,
                        phases,
                    },
                })
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job_id,
                    phase = e.phase().unwrap_or("-"),
                    duration_ms = total_duration_ms as u64,
                    error = %e,
                    "Pipeline failed"
                );
                Err(e)
            }
        }
    }

    /// Run the phase named by `ctx.metadata.current_task`.
    ///
    /// Prepares the work items, fans them out, collects the aggregate and
    /// chains into [`Orchestrator::end_phase`]. With no work items the
    /// handler's `collect` runs immediately on an empty list.
    pub async fn start_phase(&self, ctx: JobContext) -> PhaseworkResult<PhaseReport> {
        let JobContext {
            job_id,
            data,
            metadata,
            segments,
        } = ctx;
        let phase = metadata.current_task.clone();
        let name = phase.as_str();

        log_state(job_id, name, PhaseState::Idle);
        let index = metadata.position()?;
        let handler = self.registry.get(name)?;
        tracing::info!("{}", banner(&format!("# Begin {} ", name)));

        log_state(job_id, name, PhaseState::Preparing);
        let items = handler
            .prepare(data, segments)
            .map_err(|e| e.in_phase(name))?;
        let segment_count = items.len();

        log_state(job_id, name, PhaseState::FanningOut);
        tracing::debug!(job_id = %job_id, phase = name, segments = segment_count, "Dispatching segments");
        let tasks = items
            .into_iter()
            .map(|item| SegmentTask::boxed(Arc::clone(&handler), item))
            .collect();

        let phase_start = Instant::now();
        let report = chain(
            chord(self.executor.as_ref(), tasks, |outcomes| async move {
                log_state(job_id, name, PhaseState::Collecting);
                let (results, task_metrics): (Vec<_>, Vec<_>) = outcomes
                    .into_iter()
                    .map(|outcome| (outcome.result, outcome.metrics))
                    .unzip();
                let items_processed = total_items(&results);
                let aggregate = handler.collect(results)?;
                Ok((aggregate, items_processed, task_metrics))
            }),
            |(aggregate, items_processed, tasks)| async move {
                let metrics = PhaseMetrics {
                    index,
                    phase: name.to_string(),
                    segments: segment_count,
                    items_processed,
                    duration_ms: phase_start.elapsed().as_millis(),
                    tasks,
                };
                tracing::info!(
                    job_id = %job_id,
                    phase = name,
                    segments = segment_count,
                    items_processed,
                    duration_ms = metrics.duration_ms as u64,
                    "Phase collected"
                );
                tracing::info!("{}", banner(&format!("# End {}.", name)));

                let transition = self.end_phase(job_id, aggregate, metadata, segments)?;
                Ok(PhaseReport {
                    transition,
                    metrics,
                })
            },
        )
        .await
        .map_err(|e| e.in_phase(name))?;

        self.metrics.record_phase_completed(segment_count);
        Ok(report)
    }

    /// Decide what follows the phase in `metadata.current_task`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `current_task` is not part of
    /// `all_tasks`.
    pub fn end_phase(
        &self,
        job_id: Ulid,
        aggregate: Value,
        metadata: PipelineMetadata,
        segments: SegmentCount,
    ) -> PhaseworkResult<Transition> {
        log_state(job_id, &metadata.current_task, PhaseState::Advancing);

        match metadata.advance()? {
            Some(next) => {
                tracing::debug!(
                    job_id = %job_id,
                    from = %metadata.current_task,
                    to = %next.current_task,
                    "Advancing to next phase"
                );
                Ok(Transition::Next(JobContext {
                    job_id,
                    data: aggregate,
                    metadata: next,
                    segments,
                }))
            }
            None => {
                log_state(job_id, &metadata.current_task, PhaseState::Terminal);
                Ok(Transition::Terminal(aggregate))
            }
        }
    }
}

fn log_state(job_id: Ulid, phase: &str, state: PhaseState) {
    tracing::debug!(job_id = %job_id, phase, state = %state, "Phase state");
}

/// Pad `title` with dashes to the banner width, ending in `#`.
fn banner(title: &str) -> String {
    let fill = (BANNER_WIDTH - 1).saturating_sub(title.chars().count());
    format!("{}{}#", title, "-".repeat(fill))
}
