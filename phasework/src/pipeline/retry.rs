//! Bounded fixed-delay retry for segment tasks.

use std::time::{Duration, Instant};

use phasework_shared::{PhaseworkError, PhaseworkResult};

use super::executor::TaskOutcome;
use super::metrics::TaskMetrics;
use super::task::PipelineTask;
use crate::config::RetryOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Fixed wait between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Fail on the first error.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        (&RetryOptions::default()).into()
    }
}

impl From<&RetryOptions> for RetryPolicy {
    fn from(options: &RetryOptions) -> Self {
        Self::new(options.max_retries, options.delay())
    }
}

/// Run `task`, retrying transient failures according to `policy`.
///
/// Non-transient errors are returned immediately. Once retries are used up
/// the last transient error is reported as [`PhaseworkError::RetriesExhausted`].
pub(crate) async fn run_with_retry(
    task: &dyn PipelineTask,
    policy: &RetryPolicy,
) -> PhaseworkResult<TaskOutcome> {
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match task.run().await {
            Ok(result) => {
                return Ok(TaskOutcome {
                    metrics: TaskMetrics {
                        name: task.name().to_string(),
                        segment: task.segment(),
                        items_processed: result.items_processed,
                        attempts,
                        duration_ms: start.elapsed().as_millis(),
                    },
                    result,
                });
            }
            Err(e) if e.is_retryable() && attempts <= policy.max_retries => {
                tracing::warn!(
                    phase = task.name(),
                    segment = task.segment(),
                    attempt = attempts,
                    max_retries = policy.max_retries,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %e,
                    "Segment failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) if e.is_retryable() => {
                return Err(PhaseworkError::RetriesExhausted {
                    phase: task.name().to_string(),
                    segment: task.segment(),
                    attempts,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::SegmentResult;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails transiently `failures` times, then succeeds.
    struct FlakyTask {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyTask {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl PipelineTask for FlakyTask {
        async fn run(&self) -> PhaseworkResult<SegmentResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(PhaseworkError::Transient(format!("attempt {} busy", call + 1)))
            } else {
                Ok(SegmentResult::new(3, json!(6)))
            }
        }

        fn name(&self) -> &str {
            "flaky"
        }

        fn segment(&self) -> usize {
            1
        }
    }

    struct BrokenTask;

    #[async_trait]
    impl PipelineTask for BrokenTask {
        async fn run(&self) -> PhaseworkResult<SegmentResult> {
            Err(PhaseworkError::InvalidArgument("bad payload".into()))
        }

        fn name(&self) -> &str {
            "broken"
        }

        fn segment(&self) -> usize {
            0
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_succeeds_with_same_result() {
        let task = FlakyTask::new(2);
        let policy = RetryPolicy::new(10, Duration::from_secs(60));

        let outcome = run_with_retry(&task, &policy).await.unwrap();

        assert_eq!(outcome.result, SegmentResult::new(3, json!(6)));
        assert_eq!(outcome.metrics.attempts, 3);
        assert_eq!(task.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_attempts() {
        let task = FlakyTask::new(u32::MAX);
        let policy = RetryPolicy::new(2, Duration::from_secs(60));

        let err = run_with_retry(&task, &policy).await.unwrap_err();

        match err {
            PhaseworkError::RetriesExhausted {
                phase,
                segment,
                attempts,
                reason,
            } => {
                assert_eq!(phase, "flaky");
                assert_eq!(segment, 1);
                assert_eq!(attempts, 3);
                assert!(reason.contains("busy"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(task.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_error_is_not_retried() {
        let policy = RetryPolicy::new(5, Duration::from_secs(60));
        let err = run_with_retry(&BrokenTask, &policy).await.unwrap_err();
        assert!(matches!(err, PhaseworkError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_no_retry_policy_fails_on_first_transient() {
        let task = FlakyTask::new(1);
        let err = run_with_retry(&task, &RetryPolicy::none()).await.unwrap_err();
        assert!(matches!(
            err,
            PhaseworkError::RetriesExhausted { attempts: 1, .. }
        ));
    }

    #[test]
    fn test_policy_from_options() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 10);
        assert_eq!(policy.delay, Duration::from_secs(60));
    }
}
