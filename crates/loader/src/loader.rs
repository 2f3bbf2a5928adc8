//! The per-backend loader contract and the values it produces.

use crate::error::{LoadError, SchemaError};
use async_trait::async_trait;
use bts_bench_core::Backend;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How a backend ingests bulk data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoaderFamily {
    /// HTTP stream load into the frontend (Doris, StarRocks).
    StreamingIngestion,
    /// An external bulk import tool run per table (TiDB Lightning).
    ExternalBulkTool,
    /// A bulk importer run inside the database container (ColumnStore).
    ContainerizedColumnar,
    /// The vendor CLI reading CSV from stdin (ClickHouse).
    ClientPipe,
}

impl LoaderFamily {
    /// Whether tables of this family may be loaded concurrently.
    pub fn is_parallel(&self) -> bool {
        matches!(
            self,
            LoaderFamily::StreamingIngestion | LoaderFamily::ClientPipe
        )
    }
}

impl fmt::Display for LoaderFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoaderFamily::StreamingIngestion => "streaming ingestion",
            LoaderFamily::ExternalBulkTool => "external bulk tool",
            LoaderFamily::ContainerizedColumnar => "containerized columnar",
            LoaderFamily::ClientPipe => "client pipe",
        };
        f.write_str(name)
    }
}

/// Outcome of loading one table.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadJob {
    pub table: String,
    pub source: PathBuf,
    /// `None` when the backend offers no way to count what was loaded.
    pub rows_loaded: Option<u64>,
    pub elapsed: Duration,
}

impl LoadJob {
    pub fn new(
        table: impl Into<String>,
        source: impl Into<PathBuf>,
        rows_loaded: Option<u64>,
        elapsed: Duration,
    ) -> Self {
        Self {
            table: table.into(),
            source: source.into(),
            rows_loaded,
            elapsed,
        }
    }

    /// Rows per second, if a row count is known and time has passed.
    pub fn throughput(&self) -> Option<f64> {
        let rows = self.rows_loaded?;
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            Some(rows as f64 / secs)
        } else {
            None
        }
    }
}

/// What one readiness check observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadinessDetail {
    /// No session could be opened.
    Unreachable(String),
    /// The server answers queries.
    Reachable,
    /// Cluster frontends report how many worker nodes are alive.
    AliveNodes { alive: usize, total: usize },
    /// The database container is not running.
    ContainerMissing(String),
}

impl fmt::Display for ReadinessDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessDetail::Unreachable(reason) => write!(f, "unreachable: {reason}"),
            ReadinessDetail::Reachable => f.write_str("reachable"),
            ReadinessDetail::AliveNodes { alive, total } => {
                write!(f, "{alive}/{total} backend node(s) alive")
            }
            ReadinessDetail::ContainerMissing(name) => {
                write!(f, "container '{name}' not running")
            }
        }
    }
}

/// Result of a single readiness check inside a polling loop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadinessProbeResult {
    pub ready: bool,
    pub detail: ReadinessDetail,
}

impl ReadinessProbeResult {
    pub fn ready(detail: ReadinessDetail) -> Self {
        Self {
            ready: true,
            detail,
        }
    }

    pub fn not_ready(detail: ReadinessDetail) -> Self {
        Self {
            ready: false,
            detail,
        }
    }
}

/// Loads the BTS dataset into one backend.
///
/// One implementation exists per [`LoaderFamily`]; the orchestrator only talks
/// to this trait.
#[async_trait]
pub trait DatabaseLoader: Send + Sync {
    fn backend(&self) -> Backend;

    fn family(&self) -> LoaderFamily;

    fn supports_parallel_load(&self) -> bool {
        self.family().is_parallel()
    }

    /// Polls until the backend accepts work or `timeout` elapses.
    ///
    /// Returns `false` on timeout; a zero timeout returns `false` without
    /// polling.
    async fn probe_ready(&self, timeout: Duration) -> bool;

    /// Drops and recreates the database and its tables.
    ///
    /// Statements run in order and are not transactional: a failure aborts the
    /// sequence and leaves earlier statements applied.
    async fn create_schema(&self) -> Result<(), SchemaError>;

    /// One-time work between schema setup and the first table load.
    async fn prepare_load(&self) -> Result<(), LoadError> {
        Ok(())
    }

    /// Bulk-loads one source file into one table.
    async fn load_table(&self, table: &str, source: &Path) -> Result<LoadJob, LoadError>;

    /// Work after every table has been loaded.
    async fn post_load(&self) -> Result<(), LoadError> {
        Ok(())
    }
}
