//! Error types for the benchmark runner.

use crate::classify::{classify, FailureKind};
use bts_bench_core::{PreconditionError, SqlError};
use std::path::PathBuf;
use thiserror::Error;

/// A failed statement together with its classification.
#[derive(Error, Debug, Clone)]
#[error("{kind}: {source}")]
pub struct QueryError {
    pub kind: FailureKind,
    #[source]
    pub source: SqlError,
}

impl From<SqlError> for QueryError {
    fn from(source: SqlError) -> Self {
        Self {
            kind: classify(&source),
            source,
        }
    }
}

/// Errors that end a benchmark run without a summary.
#[derive(Error, Debug)]
pub enum BenchmarkError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// The backend could not be reached at all.
    #[error("Cannot connect to {address} as '{user}': {source}")]
    Connect {
        address: String,
        user: String,
        #[source]
        source: SqlError,
    },

    /// Every identity on the ladder was rejected.
    #[error("Authorization failed for '{user}' with no fallback identity left{}: {source}", file_suffix(.file))]
    AuthorizationExhausted {
        user: String,
        /// Query file being executed, `None` when the handshake was rejected.
        file: Option<String>,
        #[source]
        source: SqlError,
    },

    /// Writing the JSON report failed.
    #[error("Failed to write report {}: {source}", path.display())]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn file_suffix(file: &Option<String>) -> String {
    file.as_ref()
        .map(|f| format!(" (while running {f})"))
        .unwrap_or_default()
}
