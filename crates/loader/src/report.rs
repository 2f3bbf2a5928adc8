//! Load run report.

use crate::loader::{LoadJob, LoaderFamily};
use bts_bench_core::Backend;
use std::time::Duration;

/// Result of a completed load run.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub backend: Backend,
    pub family: LoaderFamily,
    /// Per-table results, in dataset order.
    pub jobs: Vec<LoadJob>,
    pub total_elapsed: Duration,
}

impl LoadReport {
    pub fn new(
        backend: Backend,
        family: LoaderFamily,
        jobs: Vec<LoadJob>,
        total_elapsed: Duration,
    ) -> Self {
        Self {
            backend,
            family,
            jobs,
            total_elapsed,
        }
    }

    /// Sum of known row counts.
    pub fn total_rows(&self) -> u64 {
        self.jobs.iter().filter_map(|j| j.rows_loaded).sum()
    }

    /// Generate a summary string.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Load Report: {}\n\
             ===========\n\
             Loader: {}\n\
             Tables: {}\n\n",
            self.backend,
            self.family,
            self.jobs.len()
        );

        for job in &self.jobs {
            let rows = job
                .rows_loaded
                .map_or_else(|| "unknown".to_string(), format_count);
            let rate = job
                .throughput()
                .map_or_else(|| "-".to_string(), |r| format_count(r.round() as u64));
            summary.push_str(&format!(
                "- {}: {} rows in {:.1}s ({} rows/sec)\n",
                job.table,
                rows,
                job.elapsed.as_secs_f64(),
                rate
            ));
        }

        summary.push_str(&format!(
            "\nTotal: {} rows in {:.1}s\n",
            format_count(self.total_rows()),
            self.total_elapsed.as_secs_f64()
        ));
        summary
    }
}

/// `1234567` -> `1,234,567`.
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn test_summary() {
        let report = LoadReport::new(
            Backend::Doris,
            LoaderFamily::StreamingIngestion,
            vec![
                LoadJob::new("airlines", "a.csv", Some(14), Duration::from_secs(1)),
                LoadJob::new("flights", "f.csv", Some(2_000_000), Duration::from_secs(4)),
                LoadJob::new("airports", "p.csv", None, Duration::from_secs(1)),
            ],
            Duration::from_secs(6),
        );
        assert_eq!(report.total_rows(), 2_000_014);

        let summary = report.summary();
        assert!(summary.contains("Load Report: doris"));
        assert!(summary.contains("- flights: 2,000,000 rows in 4.0s (500,000 rows/sec)"));
        assert!(summary.contains("- airports: unknown rows in 1.0s (- rows/sec)"));
        assert!(summary.contains("Total: 2,000,014 rows in 6.0s"));
    }
}
