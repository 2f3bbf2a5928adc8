//! MySQL-protocol access used by the loaders: readiness checks, DDL and counts.

use crate::error::{ConnectivityError, SchemaError};
use crate::loader::{ReadinessDetail, ReadinessProbeResult};
use bts_bench_core::{count_rows, BackendConfig, QueryRows, SessionTarget, SqlConnector, SqlError, SqlSession};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Opens a short-lived session per operation against one backend.
#[derive(Clone)]
pub struct SqlCatalog {
    connector: Arc<dyn SqlConnector>,
    config: Arc<BackendConfig>,
}

impl SqlCatalog {
    pub fn new(connector: Arc<dyn SqlConnector>, config: Arc<BackendConfig>) -> Self {
        Self { connector, config }
    }

    async fn open(&self, target: &SessionTarget) -> Result<Box<dyn SqlSession>, SqlError> {
        self.connector.connect(target).await
    }

    /// Connect and `SELECT 1`.
    pub async fn probe_connectivity(&self) -> ReadinessProbeResult {
        let mut session = match self.open(&self.config.server_target()).await {
            Ok(session) => session,
            Err(e) => return ReadinessProbeResult::not_ready(ReadinessDetail::Unreachable(e.to_string())),
        };
        let result = session.query("SELECT 1").await;
        release(session).await;

        match result {
            Ok(_) => ReadinessProbeResult::ready(ReadinessDetail::Reachable),
            Err(e) => ReadinessProbeResult::not_ready(ReadinessDetail::Unreachable(e.to_string())),
        }
    }

    /// Connect, `SELECT 1`, then require at least one alive node in
    /// `SHOW BACKENDS`.
    pub async fn probe_cluster(&self) -> ReadinessProbeResult {
        let mut session = match self.open(&self.config.server_target()).await {
            Ok(session) => session,
            Err(e) => return ReadinessProbeResult::not_ready(ReadinessDetail::Unreachable(e.to_string())),
        };

        let result = match session.query("SELECT 1").await {
            Ok(_) => session.query("SHOW BACKENDS").await,
            Err(e) => Err(e),
        };
        release(session).await;

        match result {
            Ok(rows) => {
                let (alive, total) = alive_nodes(&rows);
                let detail = ReadinessDetail::AliveNodes { alive, total };
                if alive > 0 {
                    ReadinessProbeResult::ready(detail)
                } else {
                    ReadinessProbeResult::not_ready(detail)
                }
            }
            Err(e) => ReadinessProbeResult::not_ready(ReadinessDetail::Unreachable(e.to_string())),
        }
    }

    /// Runs DDL statements in order on one session, stopping at the first
    /// failure.
    pub async fn run_schema(&self, statements: &[String], pause: Duration) -> Result<(), SchemaError> {
        let mut session = self
            .open(&self.config.server_target())
            .await
            .map_err(|e| SchemaError::Connect(ConnectivityError::Sql(e)))?;

        let total = statements.len();
        for (i, statement) in statements.iter().enumerate() {
            let index = i + 1;
            info!("Executing schema statement {index}/{total}: {}", preview(statement));

            if let Err(source) = session.execute(statement).await {
                release(session).await;
                return Err(SchemaError::Statement {
                    index,
                    total,
                    preview: preview(statement),
                    source,
                });
            }

            if index < total && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
        }

        release(session).await;
        info!("Schema for '{}' created ({total} statements)", self.config.database);
        Ok(())
    }

    /// `SELECT COUNT(*)` over one table of the run's database.
    pub async fn count_rows(&self, table: &str) -> Result<u64, SqlError> {
        let mut session = self.open(&self.config.server_target()).await?;
        let result = count_rows(session.as_mut(), &self.config.qualified(table)).await;
        release(session).await;
        result
    }

    /// Runs one statement on a fresh session.
    pub async fn execute(&self, statement: &str) -> Result<(), SqlError> {
        let mut session = self.open(&self.config.server_target()).await?;
        let result = session.execute(statement).await;
        release(session).await;
        result
    }
}

async fn release(mut session: Box<dyn SqlSession>) {
    if let Err(e) = session.close().await {
        debug!("Ignoring error while closing session: {e}");
    }
}

/// `(alive, total)` from a `SHOW BACKENDS` result.
pub fn alive_nodes(rows: &QueryRows) -> (usize, usize) {
    match rows.column_values("Alive") {
        Some(values) => {
            let alive = values
                .iter()
                .filter(|v| v.is_some_and(|v| v.trim().eq_ignore_ascii_case("true")))
                .count();
            (alive, values.len())
        }
        None => (0, rows.rows.len()),
    }
}

/// First line of a statement, shortened for log messages.
pub(crate) fn preview(statement: &str) -> String {
    let first = statement
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("--"))
        .unwrap_or_default();
    if first.chars().count() > 60 {
        let short: String = first.chars().take(57).collect();
        format!("{short}...")
    } else {
        first.to_string()
    }
}
