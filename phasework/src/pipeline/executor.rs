//! Fan-out/fan-in executor.
//!
//! Tasks are spawned onto the tokio runtime as soon as they are submitted and
//! wait for a concurrency permit there. [`Executor::fan_in`] resolves once
//! every handle has finished, yielding outcomes in completion order. The
//! first fatal error aborts the remaining tasks and is returned, so a failed
//! phase never leaves fan-in waiting.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use phasework_shared::{PhaseworkError, PhaseworkResult};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::metrics::TaskMetrics;
use super::retry::{RetryPolicy, run_with_retry};
use super::task::BoxedTask;
use crate::config::PhaseworkOptions;
use crate::phase::SegmentResult;

/// Result of one task plus how it got there.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub result: SegmentResult,
    pub metrics: TaskMetrics,
}

/// Handle to a submitted task.
pub struct TaskHandle {
    phase: String,
    segment: usize,
    inner: JoinHandle<PhaseworkResult<TaskOutcome>>,
}

impl TaskHandle {
    pub fn segment(&self) -> usize {
        self.segment
    }

    /// Wait for this task alone.
    pub async fn join(self) -> PhaseworkResult<TaskOutcome> {
        let TaskHandle {
            phase,
            segment,
            inner,
        } = self;
        flatten_join(&phase, segment, inner.await)
    }
}

/// Dispatch contract the orchestrator relies on.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Start `task` asynchronously.
    fn submit(&self, task: BoxedTask) -> TaskHandle;

    /// Wait for every handle; results are in completion order.
    async fn fan_in(&self, handles: Vec<TaskHandle>) -> PhaseworkResult<Vec<TaskOutcome>>;
}

/// Executor backed by the tokio runtime.
///
/// Concurrency is bounded by a semaphore; transient task failures are
/// retried according to the configured [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    permits: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl TokioExecutor {
    pub fn new(max_concurrency: usize, retry: RetryPolicy) -> PhaseworkResult<Self> {
        if max_concurrency == 0 {
            return Err(PhaseworkError::Config(
                "max_concurrency must be at least 1".into(),
            ));
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(max_concurrency)),
            retry,
        })
    }

    pub fn from_options(options: &PhaseworkOptions) -> PhaseworkResult<Self> {
        Self::new(options.max_concurrency, (&options.retry).into())
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

#[async_trait]
impl Executor for TokioExecutor {
    fn submit(&self, task: BoxedTask) -> TaskHandle {
        let phase = task.name().to_string();
        let segment = task.segment();
        let permits = Arc::clone(&self.permits);
        let retry = self.retry.clone();

        let inner = tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| PhaseworkError::Internal(format!("executor closed: {}", e)))?;
            run_with_retry(task.as_ref(), &retry).await
        });

        TaskHandle {
            phase,
            segment,
            inner,
        }
    }

    async fn fan_in(&self, handles: Vec<TaskHandle>) -> PhaseworkResult<Vec<TaskOutcome>> {
        let abort_handles: Vec<_> = handles.iter().map(|h| h.inner.abort_handle()).collect();
        let mut pending: FuturesUnordered<_> = handles.into_iter().map(TaskHandle::join).collect();

        let mut outcomes = Vec::with_capacity(abort_handles.len());
        while let Some(joined) = pending.next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    for handle in &abort_handles {
                        handle.abort();
                    }
                    tracing::warn!(
                        error = %e,
                        aborted = abort_handles.len() - outcomes.len() - 1,
                        "Fan-in aborted"
                    );
                    return Err(e);
                }
            }
        }

        Ok(outcomes)
    }
}

fn flatten_join(
    phase: &str,
    segment: usize,
    joined: Result<PhaseworkResult<TaskOutcome>, tokio::task::JoinError>,
) -> PhaseworkResult<TaskOutcome> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(PhaseworkError::Internal(format!(
            "segment {} of phase '{}' panicked",
            segment, phase
        ))),
        Err(_) => Err(PhaseworkError::Internal(format!(
            "segment {} of phase '{}' was cancelled",
            segment, phase
        ))),
    }
}

/// Submit every task, wait for all of them, then hand the outcomes to
/// `continuation`.
///
/// With no tasks the continuation runs immediately with an empty list.
pub async fn chord<E, F, Fut, T>(
    executor: &E,
    tasks: Vec<BoxedTask>,
    continuation: F,
) -> PhaseworkResult<T>
where
    E: Executor + ?Sized,
    F: FnOnce(Vec<TaskOutcome>) -> Fut,
    Fut: Future<Output = PhaseworkResult<T>>,
{
    let handles = tasks.into_iter().map(|task| executor.submit(task)).collect();
    let outcomes = executor.fan_in(handles).await?;
    continuation(outcomes).await
}

/// Sequential composition: `step2` receives the output of `step1`.
pub async fn chain<A, B, S1, F, Fut>(step1: S1, step2: F) -> PhaseworkResult<B>
where
    S1: Future<Output = PhaseworkResult<A>>,
    F: FnOnce(A) -> Fut,
    Fut: Future<Output = PhaseworkResult<B>>,
{
    let output = step1.await?;
    step2(output).await
}
