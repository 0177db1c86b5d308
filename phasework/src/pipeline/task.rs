//! Unit-of-work trait for executor dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use phasework_shared::PhaseworkResult;

use crate::phase::{PhaseHandler, SegmentResult, WorkItem};

/// Trait for tasks the executor can dispatch.
///
/// `run` takes `&self` because the executor re-runs a task after a transient
/// failure; implementations must return the same result every time.
#[async_trait]
pub trait PipelineTask: Send + Sync {
    /// Execute the task once.
    async fn run(&self) -> PhaseworkResult<SegmentResult>;

    /// Name of the phase the task belongs to.
    fn name(&self) -> &str;

    /// Zero-based segment index, for logging.
    fn segment(&self) -> usize;
}

pub type BoxedTask = Box<dyn PipelineTask>;

/// One work item bound to the handler that processes it.
pub struct SegmentTask {
    handler: Arc<dyn PhaseHandler>,
    item: WorkItem,
}

impl SegmentTask {
    pub fn new(handler: Arc<dyn PhaseHandler>, item: WorkItem) -> Self {
        Self { handler, item }
    }

    pub fn boxed(handler: Arc<dyn PhaseHandler>, item: WorkItem) -> BoxedTask {
        Box::new(Self::new(handler, item))
    }
}

#[async_trait]
impl PipelineTask for SegmentTask {
    async fn run(&self) -> PhaseworkResult<SegmentResult> {
        self.handler.run(&self.item).await
    }

    fn name(&self) -> &str {
        self.handler.name()
    }

    fn segment(&self) -> usize {
        self.item.index
    }
}
