//! Benchmark tuning knobs.

use bts_bench_core::Identity;
use std::path::PathBuf;
use std::time::Duration;

/// User tried after the primary identity is rejected.
pub const FALLBACK_USER: &str = "default";

/// Settings for one benchmark run.
#[derive(Clone, Debug)]
pub struct BenchmarkSettings {
    pub queries_dir: PathBuf,
    /// Attempts per file for retryable failures, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Extra pause before reopening a connection dropped after a resource-limit failure.
    pub reconnect_delay: Duration,
    pub fallback_user: String,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            queries_dir: PathBuf::from("queries/sql"),
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(2),
            fallback_user: FALLBACK_USER.to_string(),
        }
    }
}

impl BenchmarkSettings {
    pub fn with_queries_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.queries_dir = dir.into();
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Identities to try, in order. Each is used at most once.
    ///
    /// The fallback keeps the primary password and is omitted when the
    /// primary user already is the fallback user.
    pub fn identity_ladder(&self, primary: &Identity) -> Vec<Identity> {
        let mut ladder = vec![primary.clone()];
        if primary.user != self.fallback_user {
            ladder.push(primary.with_user(self.fallback_user.clone()));
        }
        ladder
    }
}
