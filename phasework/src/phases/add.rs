//! Phase: sum numbers.
//!
//! Accepts a JSON array of numbers, or an object whose values are numbers
//! (for example a `word_count` aggregate, which totals the counted words).

use std::sync::Arc;

use async_trait::async_trait;
use phasework_shared::{PhaseworkError, PhaseworkResult};
use serde_json::{Number, Value};

use crate::config::PhaseworkOptions;
use crate::phase::{
    PhaseHandler, SegmentResult, WorkItem, segment_into_items, total_items,
};
use crate::segment::SegmentCount;

pub const NAME: &str = "add";

pub struct AddPhase;

pub(crate) fn build(_options: &PhaseworkOptions) -> Arc<dyn PhaseHandler> {
    Arc::new(AddPhase)
}

#[async_trait]
impl PhaseHandler for AddPhase {
    fn name(&self) -> &str {
        NAME
    }

    fn prepare(&self, data: Value, segments: SegmentCount) -> PhaseworkResult<Vec<WorkItem>> {
        let numbers = numbers_from_input(data)?;
        tracing::info!(items = numbers.len(), "Prep add");

        if numbers.is_empty() {
            tracing::info!("No numbers to add");
            return Ok(Vec::new());
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            let expected = sum(numbers.iter())?;
            tracing::debug!(expected = %expected, "Direct sum for verification");
        }

        tracing::info!(
            items = numbers.len(),
            segments = %segments,
            "Segmenting numbers"
        );
        segment_into_items(NAME, &numbers, segments)
    }

    async fn run(&self, item: &WorkItem) -> PhaseworkResult<SegmentResult> {
        let numbers = item.payload.as_array().ok_or_else(|| {
            PhaseworkError::InvalidArgument(format!(
                "add segment {} payload must be an array",
                item.index
            ))
        })?;
        tracing::debug!(segment = item.index, items = numbers.len(), "Do add");

        let partial = sum(numbers.iter())?;
        Ok(SegmentResult::new(numbers.len() as u64, partial))
    }

    fn collect(&self, results: Vec<SegmentResult>) -> PhaseworkResult<Value> {
        tracing::info!(
            results = results.len(),
            items = total_items(&results),
            "Collect add"
        );

        let total = sum(results.iter().map(|r| &r.result))?;
        tracing::info!(result = %total, "Final add result");
        Ok(total)
    }
}

/// Numbers from an array, or from the values of an object.
fn numbers_from_input(data: Value) -> PhaseworkResult<Vec<Value>> {
    let values = match data {
        Value::Array(values) => values,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        other => {
            return Err(PhaseworkError::InvalidArgument(format!(
                "add expects an array or object of numbers, got {}",
                kind(&other)
            )));
        }
    };

    if let Some(bad) = values.iter().find(|v| !v.is_number()) {
        return Err(PhaseworkError::InvalidArgument(format!(
            "add expects numbers, found {}",
            kind(bad)
        )));
    }

    Ok(values)
}

/// Running total that stays exact while every input is an integer.
///
/// Integers accumulate in `i128`, so the outcome does not depend on the order
/// partial sums arrive in; the range of `i64`/`u64` is only checked once at
/// the end.
#[derive(Debug, Clone, Copy)]
enum Total {
    Int(i128),
    Float(f64),
}

impl Total {
    fn add(self, n: &Number) -> Self {
        let int = n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from));
        match (self, int) {
            (Total::Int(acc), Some(i)) => match acc.checked_add(i) {
                Some(sum) => Total::Int(sum),
                None => Total::Float(acc as f64 + i as f64),
            },
            (Total::Int(acc), None) => Total::Float(acc as f64 + n.as_f64().unwrap_or(f64::NAN)),
            (Total::Float(acc), _) => Total::Float(acc + n.as_f64().unwrap_or(f64::NAN)),
        }
    }

    fn into_value(self) -> PhaseworkResult<Value> {
        let float = match self {
            Total::Int(i) => {
                if let Ok(small) = i64::try_from(i) {
                    return Ok(Value::from(small));
                }
                if let Ok(large) = u64::try_from(i) {
                    return Ok(Value::from(large));
                }
                i as f64
            }
            Total::Float(f) => f,
        };
        Number::from_f64(float).map(Value::Number).ok_or_else(|| {
            PhaseworkError::InvalidArgument(format!("sum is not a finite number: {}", float))
        })
    }
}

fn sum<'a>(values: impl Iterator<Item = &'a Value>) -> PhaseworkResult<Value> {
    let mut total = Total::Int(0);
    for value in values {
        let n = value.as_number().ok_or_else(|| {
            PhaseworkError::InvalidArgument(format!("add expects numbers, found {}", kind(value)))
        })?;
        total = total.add(n);
    }
    total.into_value()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
