//! Multi-phase fan-out/fan-in batch pipelines.
//!
//! A pipeline is an ordered list of named phases. Each phase splits its input
//! into segments, processes the segments concurrently and reduces their
//! results into an aggregate that becomes the next phase's input.
//!
//! ```ignore
//! use phasework::{Orchestrator, PhaseworkOptions};
//!
//! let orchestrator = Orchestrator::from_options(PhaseworkOptions::default())?;
//! let output = orchestrator
//!     .run_pipeline(serde_json::json!("the quick brown fox"), vec!["word_count".into(), "add".into()], None)
//!     .await?;
//! println!("{}", output.result);
//! ```

pub mod config;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod phase;
pub mod phases;
pub mod pipeline;
pub mod segment;

pub use config::{LogOptions, LogRotation, PhaseworkOptions, RetryOptions, ScheduleEntry};
pub use logging::init_logging;
pub use metrics::{OrchestratorMetrics, OrchestratorMetricsStorage};
pub use orchestrator::{
    JobContext, Orchestrator, PhaseReport, PhaseState, PipelineMetadata, PipelineOutput,
    Transition,
};
pub use phase::{PhaseHandler, PhaseRegistry, SegmentResult, WorkItem};
pub use phasework_shared::{PhaseworkError, PhaseworkResult};
pub use segment::{DEFAULT_SEGMENTS, SegmentCount, segment};
