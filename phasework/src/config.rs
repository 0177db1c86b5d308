//! Runtime configuration.
//!
//! Options are plain data: built once (defaults, or a JSON file), validated,
//! then passed by value into the orchestrator and executor. There is no
//! process-wide mutable configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use phasework_shared::{PhaseworkError, PhaseworkResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::segment::{DEFAULT_SEGMENTS, SegmentCount};

/// Top-level options for a phasework process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhaseworkOptions {
    /// Segments per phase when the caller does not specify one.
    pub segments: usize,
    /// Maximum number of segments executing at the same time.
    pub max_concurrency: usize,
    /// Retry policy for segment processing.
    pub retry: RetryOptions,
    /// Options for the built-in `word_count` phase.
    pub word_count: WordCountOptions,
    pub logging: LogOptions,
    /// Pipelines to run periodically (`phasework schedule`).
    pub schedules: Vec<ScheduleEntry>,
}

impl Default for PhaseworkOptions {
    fn default() -> Self {
        Self {
            segments: DEFAULT_SEGMENTS,
            max_concurrency: 8,
            retry: RetryOptions::default(),
            word_count: WordCountOptions::default(),
            logging: LogOptions::default(),
            schedules: Vec::new(),
        }
    }
}

impl PhaseworkOptions {
    /// Load options from a JSON file and validate them.
    pub fn from_file(path: &Path) -> PhaseworkResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PhaseworkError::Config(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let options: Self = serde_json::from_str(&raw).map_err(|e| {
            PhaseworkError::Config(format!(
                "failed to parse config file {}: {}",
                path.display(),
                e
            ))
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Reject values the orchestrator cannot run with.
    pub fn validate(&self) -> PhaseworkResult<()> {
        SegmentCount::new(self.segments)?;

        if self.max_concurrency == 0 {
            return Err(PhaseworkError::Config(
                "max_concurrency must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.schedules {
            if !seen.insert(entry.name.as_str()) {
                return Err(PhaseworkError::Config(format!(
                    "duplicate schedule name '{}'",
                    entry.name
                )));
            }
            entry.validate()?;
        }

        Ok(())
    }

    pub fn segment_count(&self) -> PhaseworkResult<SegmentCount> {
        SegmentCount::new(self.segments)
    }
}

/// Bounded fixed-delay retry for segment processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryOptions {
    /// Retries after the first attempt (default: 10).
    pub max_retries: u32,
    /// Seconds to wait between attempts (default: 60).
    pub delay_secs: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 10,
            delay_secs: 60,
        }
    }
}

impl RetryOptions {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WordCountOptions {
    /// How many of the most frequent words to log after collecting.
    pub top_words: usize,
}

impl Default for WordCountOptions {
    fn default() -> Self {
        Self { top_words: 100 }
    }
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogOptions {
    /// Directory for the log file. Logs go to stderr only when unset.
    pub dir: Option<PathBuf>,
    pub file_name: String,
    pub rotation: LogRotation,
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            dir: None,
            file_name: "phasework.log".to_string(),
            rotation: LogRotation::Daily,
            level: "info".to_string(),
        }
    }
}

/// A pipeline that runs on a fixed interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleEntry {
    pub name: String,
    /// Phase names, in pipeline order.
    pub tasks: Vec<String>,
    /// Initial data handed to the first phase.
    #[serde(default)]
    pub data: Value,
    /// Overrides the process-wide segment count.
    #[serde(default)]
    pub segments: Option<usize>,
    pub every_secs: u64,
}

impl ScheduleEntry {
    fn validate(&self) -> PhaseworkResult<()> {
        if self.tasks.is_empty() {
            return Err(PhaseworkError::Config(format!(
                "schedule '{}' has no tasks",
                self.name
            )));
        }
        if self.every_secs == 0 {
            return Err(PhaseworkError::Config(format!(
                "schedule '{}' must have every_secs >= 1",
                self.name
            )));
        }
        if let Some(segments) = self.segments {
            SegmentCount::new(segments)?;
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.every_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let options = PhaseworkOptions::default();
        assert_eq!(options.segments, 8);
        assert_eq!(options.retry.max_retries, 10);
        assert_eq!(options.retry.delay(), Duration::from_secs(60));
        assert_eq!(options.word_count.top_words, 100);
        assert_eq!(options.logging.rotation, LogRotation::Daily);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial_overrides() {
        let file = write_config(
            r#"{
                "segments": 3,
                "retry": { "max_retries": 2 },
                "logging": { "dir": "/tmp/phasework-logs", "rotation": "hourly" }
            }"#,
        );

        let options = PhaseworkOptions::from_file(file.path()).unwrap();
        assert_eq!(options.segments, 3);
        assert_eq!(options.retry.max_retries, 2);
        assert_eq!(options.retry.delay_secs, 60);
        assert_eq!(options.logging.rotation, LogRotation::Hourly);
        assert_eq!(options.logging.file_name, "phasework.log");
    }

    #[test]
    fn test_from_file_with_schedule() {
        let file = write_config(
            r#"{
                "schedules": [{
                    "name": "word_count-pipeline",
                    "tasks": ["word_count", "add"],
                    "data": { "path": "moby_dick.txt" },
                    "every_secs": 300
                }]
            }"#,
        );

        let options = PhaseworkOptions::from_file(file.path()).unwrap();
        assert_eq!(options.schedules.len(), 1);
        assert_eq!(options.schedules[0].interval(), Duration::from_secs(300));
        assert_eq!(options.schedules[0].segments, None);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let file = write_config(r#"{ "segmentz": 3 }"#);
        let err = PhaseworkOptions::from_file(file.path()).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_zero_segments_rejected() {
        let options = PhaseworkOptions {
            segments: 0,
            ..Default::default()
        };
        assert!(options.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let options = PhaseworkOptions {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_invalid_schedules_rejected() {
        let entry = ScheduleEntry {
            name: "s".into(),
            tasks: vec!["add".into()],
            data: Value::Null,
            segments: None,
            every_secs: 60,
        };

        let empty_tasks = PhaseworkOptions {
            schedules: vec![ScheduleEntry {
                tasks: vec![],
                ..entry.clone()
            }],
            ..Default::default()
        };
        assert!(empty_tasks.validate().is_err());

        let duplicate = PhaseworkOptions {
            schedules: vec![entry.clone(), entry.clone()],
            ..Default::default()
        };
        assert!(
            duplicate
                .validate()
                .unwrap_err()
                .to_string()
                .contains("duplicate schedule")
        );

        let zero_interval = PhaseworkOptions {
            schedules: vec![ScheduleEntry {
                every_secs: 0,
                ..entry
            }],
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = PhaseworkOptions::from_file(Path::new("/nonexistent/phasework.json")).unwrap_err();
        assert!(err.is_config());
    }
}
