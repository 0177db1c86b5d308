//! Phase: count word frequencies.
//!
//! Input forms:
//! - a JSON string of raw text,
//! - `{"path": "<file>"}`, raw text read from a file,
//! - a JSON array of strings, taken as already-tokenized words.
//!
//! Raw text is lower-cased, stripped of ASCII punctuation, split on
//! whitespace, and filtered of English stop words.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use phasework_shared::{PhaseworkError, PhaseworkResult};
use serde_json::{Map, Value};
use tokio::runtime::{Handle, RuntimeFlavor};

use super::stop_words;
use crate::config::PhaseworkOptions;
use crate::phase::{
    PhaseHandler, SegmentResult, WorkItem, segment_into_items, total_items,
};
use crate::segment::SegmentCount;

pub const NAME: &str = "word_count";

pub struct WordCountPhase {
    top_words: usize,
}

impl WordCountPhase {
    pub fn new(top_words: usize) -> Self {
        Self { top_words }
    }
}

pub(crate) fn build(options: &PhaseworkOptions) -> Arc<dyn PhaseHandler> {
    Arc::new(WordCountPhase::new(options.word_count.top_words))
}

#[async_trait]
impl PhaseHandler for WordCountPhase {
    fn name(&self) -> &str {
        NAME
    }

    fn prepare(&self, data: Value, segments: SegmentCount) -> PhaseworkResult<Vec<WorkItem>> {
        let words = words_from_input(data)?;
        tracing::info!(words = words.len(), "Prep word count");

        if words.is_empty() {
            tracing::info!("No words to count");
            return Ok(Vec::new());
        }

        tracing::info!(words = words.len(), segments = %segments, "Segmenting words");
        segment_into_items(NAME, &words, segments)
    }

    async fn run(&self, item: &WorkItem) -> PhaseworkResult<SegmentResult> {
        let words = item.payload.as_array().ok_or_else(|| {
            PhaseworkError::InvalidArgument(format!(
                "word_count segment {} payload must be an array",
                item.index
            ))
        })?;
        tracing::debug!(segment = item.index, items = words.len(), "Do count words");

        let mut counts = Map::new();
        for word in words {
            let word = word.as_str().ok_or_else(|| {
                PhaseworkError::InvalidArgument("word_count expects strings".into())
            })?;
            increment(&mut counts, word, 1)?;
        }

        Ok(SegmentResult::new(words.len() as u64, Value::Object(counts)))
    }

    fn collect(&self, results: Vec<SegmentResult>) -> PhaseworkResult<Value> {
        tracing::info!(
            results = results.len(),
            items = total_items(&results),
            "Collect word count"
        );

        let mut totals = Map::new();
        for result in &results {
            let counts = result.result.as_object().ok_or_else(|| {
                PhaseworkError::InvalidArgument("word_count result must be an object".into())
            })?;
            for (word, count) in counts {
                let count = count.as_u64().ok_or_else(|| {
                    PhaseworkError::InvalidArgument(format!(
                        "count for '{}' must be a non-negative integer",
                        word
                    ))
                })?;
                increment(&mut totals, word, count)?;
            }
        }

        log_top_words(&totals, self.top_words);
        Ok(Value::Object(totals))
    }
}

fn increment(counts: &mut Map<String, Value>, word: &str, by: u64) -> PhaseworkResult<()> {
    let current = counts.get(word).and_then(Value::as_u64).unwrap_or(0);
    let next = current.checked_add(by).ok_or_else(|| {
        PhaseworkError::InvalidArgument(format!("count for '{}' overflowed", word))
    })?;
    counts.insert(word.to_string(), Value::from(next));
    Ok(())
}

fn log_top_words(totals: &Map<String, Value>, limit: usize) {
    if limit == 0 {
        return;
    }

    let mut ranked: Vec<(&str, u64)> = totals
        .iter()
        .map(|(word, count)| (word.as_str(), count.as_u64().unwrap_or(0)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    tracing::info!(distinct = ranked.len(), limit, "Top words");
    for (rank, (word, count)) in ranked.into_iter().take(limit).enumerate() {
        tracing::info!(rank = rank + 1, word, count, "Top word");
    }
}

fn words_from_input(data: Value) -> PhaseworkResult<Vec<Value>> {
    match data {
        Value::String(text) => Ok(tokenize(&text)),
        Value::Object(map) => {
            let path = map.get("path").and_then(Value::as_str).ok_or_else(|| {
                PhaseworkError::InvalidArgument(
                    "word_count object input must have a string 'path'".into(),
                )
            })?;
            tracing::info!(path, "Reading word count input");
            Ok(tokenize(&read_text(Path::new(path))?))
        }
        Value::Array(words) => {
            if words.iter().any(|w| !w.is_string()) {
                return Err(PhaseworkError::InvalidArgument(
                    "word_count array input must contain only strings".into(),
                ));
            }
            Ok(words)
        }
        _ => Err(PhaseworkError::InvalidArgument(
            "word_count expects text, a word array, or {\"path\": ...}".into(),
        )),
    }
}

/// Read the whole input file.
///
/// On a multi-threaded runtime the read is moved off the worker through
/// `block_in_place`; elsewhere it blocks the calling thread.
fn read_text(path: &Path) -> PhaseworkResult<String> {
    let read = || {
        std::fs::read_to_string(path).map_err(|e| {
            PhaseworkError::InvalidArgument(format!("failed to read {}: {}", path.display(), e))
        })
    };
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(read)
        }
        _ => read(),
    }
}

/// Normalize raw text into countable words.
pub(crate) fn tokenize(text: &str) -> Vec<Value> {
    let stop: HashSet<&str> = stop_words::ENGLISH.iter().copied().collect();
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();

    cleaned
        .split(is_separator)
        .filter(|w| !w.is_empty() && !stop.contains(w))
        .map(|w| Value::String(w.to_string()))
        .collect()
}

/// ASCII whitespace, including vertical tab.
fn is_separator(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0b'
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn phase() -> WordCountPhase {
        WordCountPhase::new(10)
    }

    fn segments(n: usize) -> SegmentCount {
        SegmentCount::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_single_segment_counts() {
        let items = phase().prepare(json!(["a", "a", "b"]), segments(1)).unwrap();
        assert_eq!(items.len(), 1);

        let result = phase().run(&items[0]).await.unwrap();
        assert_eq!(result, SegmentResult::new(3, json!({"a": 2, "b": 1})));

        assert_eq!(phase().collect(vec![result]).unwrap(), json!({"a": 2, "b": 1}));
    }

    #[tokio::test]
    async fn test_collect_merges_and_is_order_invariant() {
        let items = phase()
            .prepare(json!(["x", "y", "x", "z", "x", "y", "w"]), segments(3))
            .unwrap();
        let mut results = Vec::new();
        for item in &items {
            results.push(phase().run(item).await.unwrap());
        }

        let forward = phase().collect(results.clone()).unwrap();
        results.reverse();
        let backward = phase().collect(results).unwrap();

        assert_eq!(forward, json!({"w": 1, "x": 3, "y": 2, "z": 1}));
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_empty_input_and_identity() {
        assert!(phase().prepare(json!(""), segments(4)).unwrap().is_empty());
        assert!(phase().prepare(json!([]), segments(4)).unwrap().is_empty());
        assert_eq!(phase().collect(Vec::new()).unwrap(), json!({}));
    }

    #[test]
    fn test_tokenize_normalizes_text() {
        let words = tokenize("Call me Ishmael.\tSome years ago--never mind\nhow long!");
        let words: Vec<&str> = words.iter().map(|w| w.as_str().unwrap()).collect();
        assert_eq!(
            words,
            vec!["call", "ishmael", "years", "agonever", "mind", "long"]
        );
    }

    #[test]
    fn test_prepare_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "The whale! The WHALE.").unwrap();

        let input = json!({ "path": file.path().to_str().unwrap() });
        let items = phase().prepare(input, segments(8)).unwrap();
        let words: Vec<Value> = items
            .into_iter()
            .flat_map(|i| i.payload.as_array().unwrap().clone())
            .collect();
        assert_eq!(words, vec![json!("whale"), json!("whale")]);
    }

    #[test]
    fn test_vertical_tab_separates_words() {
        let words = tokenize("harpoon\x0bwhale\x0b\x0bocean");
        assert_eq!(words, vec![json!("harpoon"), json!("whale"), json!("ocean")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_prepare_reads_file_on_multi_thread_runtime() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Ahab ahab harpoon").unwrap();

        let input = json!({ "path": file.path().to_str().unwrap() });
        let items = phase().prepare(input, segments(1)).unwrap();
        assert_eq!(items[0].payload, json!(["ahab", "ahab", "harpoon"]));
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let err = phase()
            .prepare(json!({"path": "/nonexistent/moby_dick.txt"}), segments(2))
            .unwrap_err();
        assert!(matches!(err, PhaseworkError::InvalidArgument(_)));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(phase().prepare(json!(42), segments(2)).is_err());
        assert!(phase().prepare(json!(["ok", 1]), segments(2)).is_err());
        assert!(phase().prepare(json!({"file": "x"}), segments(2)).is_err());
        assert!(
            phase()
                .collect(vec![SegmentResult::new(1, json!([1]))])
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_run_is_repeatable() {
        let item = WorkItem {
            phase: NAME.into(),
            index: 2,
            payload: json!(["sea", "ship", "sea"]),
        };
        assert_eq!(
            phase().run(&item).await.unwrap(),
            phase().run(&item).await.unwrap()
        );
    }
}
