use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::lang::Language;
use crate::parser::{self, Classification, ParseMode, RunStatistics};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MEMORY_LIMIT: u64 = 100 * 1024 * 1024; // 100 MiB

/// One program of a submission: which adapter handles it and its source text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgramSpec {
    pub language: String,
    pub source: String,
}

/// The immutable configuration of one judging request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    pub testee: ProgramSpec,
    pub checker: ProgramSpec,
    pub samples: Vec<String>,
    /// Per-sample wall-clock limit for the testee, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Per-sample wall-clock limit for the checker; defaults to `timeout`.
    #[serde(default)]
    pub checker_timeout: Option<u64>,
    /// Sandbox memory limit in bytes.
    #[serde(default = "default_memory_limit")]
    pub memory_limit: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_memory_limit() -> u64 {
    DEFAULT_MEMORY_LIMIT
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("need {0} language property, but not found")]
    MissingLanguage(&'static str),
    #[error("need {0} source property, but not found")]
    MissingSource(&'static str),
    #[error("need samples array, but not found")]
    MissingSamples,
    #[error("{role}: {source}")]
    UnsupportedLanguage {
        role: &'static str,
        source: crate::lang::UnsupportedLanguage,
    },
}

impl JobConfig {
    pub fn checker_timeout(&self) -> u64 {
        self.checker_timeout.unwrap_or(self.timeout)
    }

    /// Submission-time validation: both programs need a known language
    /// and a non-empty source, and there must be at least one sample.
    /// Anything caught here is a request-level error; the job never
    /// reaches the scheduler.
    pub fn validate(&self) -> Result<(), SubmissionError> {
        for (role, spec) in [("testee", &self.testee), ("checker", &self.checker)] {
            if spec.language.is_empty() {
                return Err(SubmissionError::MissingLanguage(role));
            }
            if spec.source.is_empty() {
                return Err(SubmissionError::MissingSource(role));
            }
            Language::from_tag(&spec.language)
                .map_err(|source| SubmissionError::UnsupportedLanguage { role, source })?;
        }
        if self.samples.is_empty() {
            return Err(SubmissionError::MissingSamples);
        }
        Ok(())
    }
}

/// Lifecycle state of a job, composed with the phase prefix when polled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Starting,
    Running,
    Exception,
    Finished(Classification),
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Exception => "exception",
            Self::Finished(classification) => classification.status_word(),
        }
    }
}

/// The live result published to pollers, shaped per phase kind.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Empty {},
    Build { output: String },
    Run(RunStatistics),
    Exception { error: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub status: String,
    #[serde(flatten)]
    pub result: ResultPayload,
}

struct JobInner {
    touched: DateTime<Utc>,
    status: JobStatus,
    status_prefix: &'static str,
    payload: ResultPayload,
    /// Statistics of the most recent run-phase parse; the checker phase
    /// parses on top of these instead of starting fresh.
    statistics: RunStatistics,
}

/// The mutable state/result record of one submitted judging request.
///
/// Exactly one worker mutates a job at a time; the scheduler only reads
/// the status for admission and the liveness timestamp for GC, and
/// pollers only take snapshots. Every mutation refreshes the liveness
/// timestamp.
pub struct Job {
    pub id: Uuid,
    pub config: JobConfig,
    inner: Mutex<JobInner>,
}

impl Job {
    pub fn new(config: JobConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            inner: Mutex::new(JobInner {
                touched: Utc::now(),
                status: JobStatus::Starting,
                status_prefix: "",
                payload: ResultPayload::Empty {},
                statistics: RunStatistics::default(),
            }),
        }
    }

    pub fn status(&self) -> JobStatus {
        self.inner.lock().status
    }

    pub fn set_status(&self, status: JobStatus) {
        let mut inner = self.inner.lock();
        inner.touched = Utc::now();
        inner.status = status;
    }

    /// Atomically replaces the live result and optionally the status.
    pub fn set_result(&self, payload: ResultPayload, status: Option<JobStatus>) {
        let mut inner = self.inner.lock();
        inner.touched = Utc::now();
        inner.payload = payload;
        if let Some(status) = status {
            inner.status = status;
        }
    }

    /// Enters the next pipeline phase: records its status prefix and
    /// marks the job running under it.
    pub fn enter_phase(&self, prefix: &'static str) {
        let mut inner = self.inner.lock();
        inner.touched = Utc::now();
        inner.status_prefix = prefix;
        inner.status = JobStatus::Running;
    }

    /// Clears the phase prefix after an overall pass so the terminal
    /// status polls as plain `success`.
    pub fn clear_phase(&self) {
        let mut inner = self.inner.lock();
        inner.touched = Utc::now();
        inner.status_prefix = "";
    }

    /// Re-parses the cumulative sandbox output under the given mode and
    /// publishes the partial (or, with `status`, final) phase result.
    pub fn apply_output(&self, mode: ParseMode, lines: &[String], status: Option<JobStatus>) {
        let mut inner = self.inner.lock();
        inner.touched = Utc::now();
        inner.payload = match mode {
            ParseMode::Build => ResultPayload::Build {
                output: parser::parse_build(lines),
            },
            ParseMode::Run => {
                let stats = parser::parse_run(lines);
                inner.statistics = stats.clone();
                ResultPayload::Run(stats)
            }
            ParseMode::Check => {
                let stats = parser::parse_check(lines, &inner.statistics);
                inner.statistics = stats.clone();
                ResultPayload::Run(stats)
            }
        };
        if let Some(status) = status {
            inner.status = status;
        }
    }

    /// Copy of the status-tagged result, safe to take while the worker
    /// is mid-phase.
    pub fn snapshot(&self) -> JobSnapshot {
        let inner = self.inner.lock();
        JobSnapshot {
            id: self.id,
            status: format!("{}{}", inner.status_prefix, inner.status.as_str()),
            result: inner.payload.clone(),
        }
    }

    /// Whether the job has gone `max_age` without a status mutation.
    pub fn expired(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now - self.inner.lock().touched >= max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> JobConfig {
        serde_json::from_value(serde_json::json!({
            "testee": { "language": "py", "source": "print(input())" },
            "checker": { "language": "py", "source": "exit(0)" },
            "samples": ["42"],
        }))
        .unwrap()
    }

    #[test]
    fn config_defaults() {
        let config = config();
        assert_eq!(config.timeout, 10);
        assert_eq!(config.checker_timeout(), 10);
        assert_eq!(config.memory_limit, 100 * 1024 * 1024);
    }

    #[test]
    fn checker_timeout_override() {
        let mut config = config();
        config.checker_timeout = Some(360);
        assert_eq!(config.checker_timeout(), 360);
    }

    #[test]
    fn validation_rejects_bad_submissions() {
        let mut bad = config();
        bad.testee.source.clear();
        assert!(matches!(
            bad.validate(),
            Err(SubmissionError::MissingSource("testee"))
        ));

        let mut bad = config();
        bad.checker.language = "cobol".to_string();
        assert!(matches!(
            bad.validate(),
            Err(SubmissionError::UnsupportedLanguage { role: "checker", .. })
        ));

        let mut bad = config();
        bad.samples.clear();
        assert!(matches!(bad.validate(), Err(SubmissionError::MissingSamples)));

        assert!(config().validate().is_ok());
    }

    #[test]
    fn snapshot_composes_prefix_and_status() {
        let job = Job::new(config());
        assert_eq!(job.snapshot().status, "starting");

        job.enter_phase("testee_build_");
        assert_eq!(job.snapshot().status, "testee_build_running");

        job.set_status(JobStatus::Finished(Classification::Error));
        assert_eq!(job.snapshot().status, "testee_build_error");

        job.enter_phase("checker_");
        job.set_status(JobStatus::Finished(Classification::Success));
        job.clear_phase();
        assert_eq!(job.snapshot().status, "success");
    }

    #[test]
    fn expiry_tracks_last_mutation() {
        let job = Job::new(config());
        let later = Utc::now() + chrono::Duration::hours(25);
        assert!(job.expired(later, chrono::Duration::hours(24)));
        assert!(!job.expired(Utc::now(), chrono::Duration::hours(24)));
    }
}
