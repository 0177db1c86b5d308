//! Error taxonomy for phase pipelines.
//!
//! Three classes of failure matter to the orchestrator:
//! - **Transient**: raised by a segment's `run`, retried by the executor.
//! - **Configuration**: unknown phase, bad pipeline metadata, bad segment count.
//!   Fatal and never retried.
//! - **Phase failure**: `prepare`/`collect` errors and retry exhaustion. Aborts
//!   the whole pipeline; no partial aggregate is ever advanced.

use thiserror::Error;

pub type PhaseworkResult<T> = Result<T, PhaseworkError>;

#[derive(Debug, Error)]
pub enum PhaseworkError {
    /// Invalid pipeline or runtime configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// No handler registered under the requested phase name.
    #[error("configuration error: unknown phase '{0}'")]
    UnknownPhase(String),

    /// Phase input that a handler cannot process.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Recoverable failure inside a segment (I/O hiccup, contention).
    #[error("transient error: {0}")]
    Transient(String),

    /// A segment kept failing after every allowed retry.
    #[error("segment {segment} of phase '{phase}' failed after {attempts} attempts: {reason}")]
    RetriesExhausted {
        phase: String,
        segment: usize,
        attempts: u32,
        reason: String,
    },

    /// A phase aborted; wraps the underlying cause.
    #[error("phase '{phase}' failed: {source}")]
    PhaseFailed {
        phase: String,
        #[source]
        source: Box<PhaseworkError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl PhaseworkError {
    /// Whether the executor may re-run the failed segment.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PhaseworkError::Transient(_))
    }

    /// Whether this is a configuration error (never retried, surfaced as-is).
    pub fn is_config(&self) -> bool {
        match self {
            PhaseworkError::Config(_) | PhaseworkError::UnknownPhase(_) => true,
            PhaseworkError::PhaseFailed { source, .. } => source.is_config(),
            _ => false,
        }
    }

    /// Name of the phase that failed, if the error carries one.
    pub fn phase(&self) -> Option<&str> {
        match self {
            PhaseworkError::PhaseFailed { phase, .. }
            | PhaseworkError::RetriesExhausted { phase, .. } => Some(phase),
            _ => None,
        }
    }

    /// Wrap `self` as a failure of `phase`.
    ///
    /// Configuration errors and errors already attributed to a phase pass
    /// through unchanged.
    pub fn in_phase(self, phase: &str) -> Self {
        match self {
            e @ (PhaseworkError::Config(_)
            | PhaseworkError::UnknownPhase(_)
            | PhaseworkError::PhaseFailed { .. }) => e,
            other => PhaseworkError::PhaseFailed {
                phase: phase.to_string(),
                source: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(PhaseworkError::Transient("busy".into()).is_retryable());
        assert!(!PhaseworkError::Config("bad".into()).is_retryable());
        assert!(!PhaseworkError::InvalidArgument("nan".into()).is_retryable());
        assert!(!PhaseworkError::Internal("oops".into()).is_retryable());
    }

    #[test]
    fn test_in_phase_wraps_and_reports_phase() {
        let err = PhaseworkError::InvalidArgument("not a number".into()).in_phase("add");
        assert_eq!(err.phase(), Some("add"));
        assert!(err.to_string().contains("phase 'add' failed"));
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn test_in_phase_keeps_config_errors() {
        let err = PhaseworkError::UnknownPhase("nope".into()).in_phase("add");
        assert!(matches!(err, PhaseworkError::UnknownPhase(_)));
        assert!(err.is_config());
    }

    #[test]
    fn test_in_phase_does_not_double_wrap() {
        let err = PhaseworkError::Internal("x".into())
            .in_phase("add")
            .in_phase("word_count");
        assert_eq!(err.phase(), Some("add"));
    }

    #[test]
    fn test_retries_exhausted_display() {
        let err = PhaseworkError::RetriesExhausted {
            phase: "add".into(),
            segment: 2,
            attempts: 11,
            reason: "disk busy".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("segment 2"));
        assert!(msg.contains("11 attempts"));
        assert_eq!(err.phase(), Some("add"));
    }
}
