//! Phase handler contract.
//!
//! A phase turns its input into work items (`prepare`), processes each item
//! independently (`run`), and reduces the per-segment results (`collect`).
//!
//! ```text
//! data ──prepare──▶ [WorkItem; N] ──run (concurrent)──▶ [SegmentResult; N] ──collect──▶ aggregate
//! ```
//!
//! `collect` receives results in completion order, so it must not depend on
//! segment order. `run` may be re-executed after a transient failure and must
//! return the same result for the same item.

mod registry;

pub use registry::{PhaseRegistration, PhaseRegistry};

use async_trait::async_trait;
use phasework_shared::PhaseworkResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::segment::{SegmentCount, segment};

/// One segment of a phase's input, processed by exactly one `run` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Phase that produced the item.
    pub phase: String,
    /// Zero-based segment index. Used for logging only.
    pub index: usize,
    pub payload: Value,
}

/// Output of processing one work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub items_processed: u64,
    pub result: Value,
}

impl SegmentResult {
    pub fn new(items_processed: u64, result: Value) -> Self {
        Self {
            items_processed,
            result,
        }
    }
}

/// Trait implemented by every pipeline phase.
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    /// Registry name of the phase.
    fn name(&self) -> &str;

    /// Split `data` into work items. Empty input yields no items.
    ///
    /// Runs on the orchestrator's task and may block briefly (file input).
    fn prepare(&self, data: Value, segments: SegmentCount) -> PhaseworkResult<Vec<WorkItem>>;

    /// Process one work item.
    ///
    /// Return `PhaseworkError::Transient` for failures worth retrying.
    async fn run(&self, item: &WorkItem) -> PhaseworkResult<SegmentResult>;

    /// Reduce all segment results into the phase aggregate.
    ///
    /// `collect(vec![])` returns the identity aggregate.
    fn collect(&self, results: Vec<SegmentResult>) -> PhaseworkResult<Value>;
}

/// Segment `values` and wrap each segment as a work item of `phase`.
pub fn segment_into_items(
    phase: &str,
    values: &[Value],
    segments: SegmentCount,
) -> PhaseworkResult<Vec<WorkItem>> {
    Ok(segment(values, segments.get())?
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| WorkItem {
            phase: phase.to_string(),
            index,
            payload: Value::Array(chunk),
        })
        .collect())
}

/// Total number of items across `results`.
pub fn total_items(results: &[SegmentResult]) -> u64 {
    results.iter().map(|r| r.items_processed).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_segment_into_items_indexes_segments() {
        let values: Vec<Value> = (1..=5).map(|n| json!(n)).collect();
        let items = segment_into_items("add", &values, SegmentCount::new(2).unwrap()).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].index, 0);
        assert_eq!(items[1].index, 1);
        assert_eq!(items[0].payload, json!([1, 2, 3]));
        assert_eq!(items[1].payload, json!([4, 5]));
        assert!(items.iter().all(|i| i.phase == "add"));
    }

    #[test]
    fn test_segment_into_items_empty() {
        let items = segment_into_items("add", &[], SegmentCount::default()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_segment_result_serde_field_names() {
        let result = SegmentResult::new(3, json!({"a": 2, "b": 1}));
        let encoded = serde_json::to_value(&result).unwrap();
        assert_eq!(
            encoded,
            json!({"items_processed": 3, "result": {"a": 2, "b": 1}})
        );
    }

    #[test]
    fn test_total_items() {
        let results = vec![
            SegmentResult::new(4, json!(10)),
            SegmentResult::new(3, json!(18)),
        ];
        assert_eq!(total_items(&results), 7);
        assert_eq!(total_items(&[]), 0);
    }
}
