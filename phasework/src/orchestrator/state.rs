//! Per-job state carried across phase boundaries.

use std::fmt;

use phasework_shared::{PhaseworkError, PhaseworkResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ulid::Ulid;

use crate::segment::SegmentCount;

/// Position of a job within its pipeline.
///
/// Each in-flight job owns its copy; advancing returns a new value instead of
/// mutating a shared one. `current_index` pins the position so pipelines that
/// repeat a phase name still advance; without it the first task named
/// `current_task` is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    pub current_task: String,
    pub all_tasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_index: Option<usize>,
}

impl PipelineMetadata {
    /// Metadata positioned at the first task.
    pub fn new(all_tasks: Vec<String>) -> PhaseworkResult<Self> {
        let current_task = all_tasks
            .first()
            .cloned()
            .ok_or_else(|| PhaseworkError::Config("pipeline has no tasks".into()))?;
        Ok(Self {
            current_task,
            all_tasks,
            current_index: Some(0),
        })
    }

    /// Index of `current_task` in `all_tasks`.
    pub fn position(&self) -> PhaseworkResult<usize> {
        let position = match self.current_index {
            Some(index) => Some(index)
                .filter(|&i| self.all_tasks.get(i) == Some(&self.current_task)),
            None => self
                .all_tasks
                .iter()
                .position(|task| task == &self.current_task),
        };
        position.ok_or_else(|| {
            PhaseworkError::Config(format!(
                "current task '{}'{} is not part of pipeline [{}]",
                self.current_task,
                self.current_index
                    .map(|i| format!(" at position {}", i))
                    .unwrap_or_default(),
                self.all_tasks.join(", ")
            ))
        })
    }

    /// Metadata for the next task, or `None` when `current_task` is last.
    pub fn advance(&self) -> PhaseworkResult<Option<Self>> {
        let next = self.position()? + 1;
        Ok(self.all_tasks.get(next).map(|task| Self {
            current_task: task.clone(),
            all_tasks: self.all_tasks.clone(),
            current_index: Some(next),
        }))
    }
}

/// Input of one phase invocation.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: Ulid,
    pub data: Value,
    pub metadata: PipelineMetadata,
    pub segments: SegmentCount,
}

impl JobContext {
    /// Context for a fresh job, starting at the first task.
    pub fn new(data: Value, tasks: Vec<String>, segments: SegmentCount) -> PhaseworkResult<Self> {
        Ok(Self {
            job_id: Ulid::new(),
            data,
            metadata: PipelineMetadata::new(tasks)?,
            segments,
        })
    }
}

/// Orchestrator state, as reported in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    Idle,
    Preparing,
    FanningOut,
    Collecting,
    Advancing,
    Terminal,
}

impl fmt::Display for PhaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PhaseState::Idle => "idle",
            PhaseState::Preparing => "preparing",
            PhaseState::FanningOut => "fanning_out",
            PhaseState::Collecting => "collecting",
            PhaseState::Advancing => "advancing",
            PhaseState::Terminal => "terminal",
        };
        f.write_str(name)
    }
}

/// Outcome of `end_phase`.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Run the next phase with this context.
    Next(JobContext),
    /// The pipeline finished with this aggregate.
    Terminal(Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tasks(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_new_starts_at_first_task() {
        let metadata = PipelineMetadata::new(tasks(&["word_count", "add"])).unwrap();
        assert_eq!(metadata.current_task, "word_count");
        assert_eq!(metadata.position().unwrap(), 0);
    }

    #[test]
    fn test_new_rejects_empty_pipeline() {
        let err = PipelineMetadata::new(Vec::new()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_advance_then_terminal() {
        let first = PipelineMetadata::new(tasks(&["a", "b"])).unwrap();
        let second = first.advance().unwrap().unwrap();
        assert_eq!(second.current_task, "b");
        assert_eq!(second.all_tasks, first.all_tasks);
        assert!(second.advance().unwrap().is_none());
    }

    #[test]
    fn test_unknown_current_task_is_config_error() {
        let metadata = PipelineMetadata {
            current_task: "c".into(),
            all_tasks: tasks(&["a", "b"]),
            current_index: None,
        };
        assert!(metadata.position().unwrap_err().is_config());
        assert!(metadata.advance().unwrap_err().is_config());
    }

    #[test]
    fn test_repeated_task_advances_by_position() {
        let first = PipelineMetadata::new(tasks(&["a", "b", "a"])).unwrap();
        let second = first.advance().unwrap().unwrap();
        let third = second.advance().unwrap().unwrap();

        assert_eq!(third.current_task, "a");
        assert_eq!(third.position().unwrap(), 2);
        assert!(third.advance().unwrap().is_none());
    }

    #[test]
    fn test_index_must_match_current_task() {
        let metadata = PipelineMetadata {
            current_task: "a".into(),
            all_tasks: tasks(&["a", "b"]),
            current_index: Some(1),
        };
        assert!(metadata.position().unwrap_err().is_config());

        let out_of_range = PipelineMetadata {
            current_index: Some(5),
            ..metadata
        };
        assert!(out_of_range.advance().unwrap_err().is_config());
    }

    #[test]
    fn test_metadata_without_index_deserializes() {
        let metadata: PipelineMetadata =
            serde_json::from_value(serde_json::json!({"current_task": "b", "all_tasks": ["a", "b"]}))
                .unwrap();
        assert_eq!(metadata.current_index, None);
        assert_eq!(metadata.position().unwrap(), 1);
        assert!(metadata.advance().unwrap().is_none());
    }

    #[test]
    fn test_metadata_serde_field_names() {
        let metadata = PipelineMetadata::new(tasks(&["add"])).unwrap();
        let encoded = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            encoded,
            serde_json::json!({"current_task": "add", "all_tasks": ["add"], "current_index": 0})
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PhaseState::FanningOut.to_string(), "fanning_out");
        assert_eq!(PhaseState::Terminal.to_string(), "terminal");
    }
}
