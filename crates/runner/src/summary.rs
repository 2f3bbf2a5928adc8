//! Per-file records and the benchmark summary.

use crate::error::BenchmarkError;
use bts_bench_core::Backend;
use serde::{Serialize, Serializer};
use std::path::Path;
use std::time::Duration;

/// How one query file ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum QueryOutcome {
    Success,
    Failure { reason: String },
    /// The file held no statements.
    Skipped,
}

/// Result of running one query file.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryExecutionRecord {
    pub file: String,
    #[serde(flatten)]
    pub outcome: QueryOutcome,
    /// Time spent in the last attempt.
    #[serde(rename = "elapsed_secs", serialize_with = "secs")]
    pub elapsed: Duration,
    pub attempts: u32,
    /// User the file ran as.
    pub user: String,
}

impl QueryExecutionRecord {
    pub fn is_success(&self) -> bool {
        self.outcome == QueryOutcome::Success
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, QueryOutcome::Failure { .. })
    }
}

/// Aggregated results of one benchmark run, in execution order.
#[derive(Clone, Debug, Serialize)]
pub struct BenchmarkSummary {
    pub backend: Backend,
    pub records: Vec<QueryExecutionRecord>,
    /// Wall-clock time of the whole run, retries and pauses included.
    #[serde(rename = "wall_secs", serialize_with = "secs")]
    pub wall_time: Duration,
}

impl BenchmarkSummary {
    pub fn new(backend: Backend, records: Vec<QueryExecutionRecord>, wall_time: Duration) -> Self {
        Self {
            backend,
            records,
            wall_time,
        }
    }

    pub fn successes(&self) -> impl Iterator<Item = &QueryExecutionRecord> {
        self.records.iter().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &QueryExecutionRecord> {
        self.records.iter().filter(|r| r.is_failure())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &QueryExecutionRecord> {
        self.records
            .iter()
            .filter(|r| r.outcome == QueryOutcome::Skipped)
    }

    /// Sum of successful execution times.
    pub fn total_query_time(&self) -> Duration {
        self.successes().map(|r| r.elapsed).sum()
    }

    /// A run with any failed file exits non-zero.
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Generate a summary string.
    pub fn summary(&self) -> String {
        let executed = self.successes().count() + self.failures().count();
        let mut summary = format!(
            "Benchmark Summary: {}\n\
             =================\n\
             Successful queries: {}/{}\n\
             Failed queries: {}\n\
             Skipped files: {}\n\
             Total execution time: {}\n",
            self.backend,
            self.successes().count(),
            executed,
            self.failures().count(),
            self.skipped().count(),
            format_minutes(self.total_query_time()),
        );

        if self.successes().next().is_some() {
            summary.push_str("\nSuccessful:\n");
            for record in self.successes() {
                let retried = if record.attempts > 1 {
                    format!(" (attempt {})", record.attempts)
                } else {
                    String::new()
                };
                summary.push_str(&format!(
                    "- {}: {}{}\n",
                    record.file,
                    format_minutes(record.elapsed),
                    retried
                ));
            }
        }

        if self.has_failures() {
            summary.push_str("\nFailed:\n");
            for record in self.failures() {
                if let QueryOutcome::Failure { reason } = &record.outcome {
                    summary.push_str(&format!(
                        "- {} after {} attempt(s): {}\n",
                        record.file, record.attempts, reason
                    ));
                }
            }
        }

        if self.skipped().next().is_some() {
            summary.push_str("\nSkipped:\n");
            for record in self.skipped() {
                summary.push_str(&format!("- {}\n", record.file));
            }
        }

        summary
    }

    /// Write the summary as pretty-printed JSON.
    pub async fn write_json(&self, path: &Path) -> Result<(), BenchmarkError> {
        let report_err = |source: std::io::Error| BenchmarkError::Report {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| report_err(std::io::Error::other(e)))?;
        tokio::fs::write(path, json).await.map_err(report_err)
    }
}

/// `83.5s` -> `1m 23.50s`.
pub fn format_minutes(duration: Duration) -> String {
    let total = duration.as_secs_f64();
    let minutes = (total / 60.0).floor();
    format!("{}m {:.2}s", minutes as u64, total - minutes * 60.0)
}

fn secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
