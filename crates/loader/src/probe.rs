//! Readiness polling shared by every loader.

use crate::loader::{ReadinessDetail, ReadinessProbeResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default gap between progress messages while waiting.
pub const DEFAULT_PROGRESS_EVERY: Duration = Duration::from_secs(20);

/// Repeats a single readiness check until it succeeds or time runs out.
#[derive(Clone, Debug)]
pub struct ReadinessProbe {
    label: String,
    interval: Duration,
    progress_every: Duration,
}

impl ReadinessProbe {
    pub fn new(label: impl Into<String>, interval: Duration) -> Self {
        Self {
            label: label.into(),
            interval,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    pub fn with_progress_every(mut self, progress_every: Duration) -> Self {
        self.progress_every = progress_every;
        self
    }

    /// Runs `probe_once` every `interval` until it reports ready.
    ///
    /// Each check is cut off at the remaining time, so the loop never
    /// overruns `timeout` by more than one scheduling tick.
    pub async fn wait<F, Fut>(&self, timeout: Duration, mut probe_once: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ReadinessProbeResult>,
    {
        if timeout.is_zero() {
            debug!("{}: zero readiness timeout, not probing", self.label);
            return false;
        }

        let start = Instant::now();
        let mut last_progress = start;
        let mut attempts = 0u32;

        info!(
            "Waiting up to {}s for {} to become ready",
            timeout.as_secs(),
            self.label
        );

        loop {
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }

            attempts += 1;
            let result = match tokio::time::timeout(remaining, probe_once()).await {
                Ok(result) => result,
                Err(_) => ReadinessProbeResult::not_ready(ReadinessDetail::Unreachable(
                    "readiness check timed out".to_string(),
                )),
            };

            if result.ready {
                info!(
                    "{} is ready after {:.1}s ({})",
                    self.label,
                    start.elapsed().as_secs_f64(),
                    result.detail
                );
                return true;
            }

            debug!(
                "{} not ready (attempt {attempts}): {}",
                self.label, result.detail
            );

            if last_progress.elapsed() >= self.progress_every {
                let elapsed = start.elapsed();
                info!(
                    "Still waiting for {} ({}s elapsed, {}s remaining): {}",
                    self.label,
                    elapsed.as_secs(),
                    timeout.saturating_sub(elapsed).as_secs(),
                    result.detail
                );
                last_progress = Instant::now();
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(self.interval.min(remaining)).await;
        }

        warn!(
            "{} was not ready within {}s ({attempts} check(s))",
            self.label,
            timeout.as_secs()
        );
        false
    }
}
