//! ClickHouse loads by piping each CSV file into `clickhouse client`.
//!
//! Readiness, DDL and counts go through the same CLI over the native protocol.

use crate::error::{ConnectivityError, LoadError, SchemaError};
use crate::loader::{DatabaseLoader, LoadJob, LoaderFamily, ReadinessDetail, ReadinessProbeResult};
use crate::probe::ReadinessProbe;
use crate::process::{run_captured, run_with_stdin, split_command};
use crate::schema::schema_statements;
use crate::settings::LoadSettings;
use async_trait::async_trait;
use bts_bench_core::{Backend, BackendConfig};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// Read by `clickhouse client` when `--password` is not given.
pub const PASSWORD_ENV: &str = "CLICKHOUSE_PASSWORD";

/// Insert tuning passed to every load.
const INSERT_SETTINGS: &[(&str, &str)] = &[
    ("--max_memory_usage", "20000000000"),
    ("--max_threads", "16"),
    ("--max_insert_threads", "8"),
    ("--max_insert_block_size", "1000000"),
    ("--min_insert_block_size_rows", "100000"),
    ("--min_insert_block_size_bytes", "268435456"),
    ("--async_insert", "1"),
    ("--wait_for_async_insert", "0"),
    ("--async_insert_max_data_size", "1000000000"),
    ("--async_insert_busy_timeout_ms", "1000"),
    ("--input_format_csv_empty_as_default", "1"),
];

pub struct ClickHouseLoader {
    config: Arc<BackendConfig>,
    settings: Arc<LoadSettings>,
    probe: ReadinessProbe,
}

impl ClickHouseLoader {
    pub fn new(config: Arc<BackendConfig>, settings: Arc<LoadSettings>) -> Self {
        let probe = ReadinessProbe::new(Backend::ClickHouse.name(), PROBE_INTERVAL)
            .with_progress_every(settings.progress_every);
        Self {
            config,
            settings,
            probe,
        }
    }

    fn program_name(&self) -> String {
        self.settings
            .clickhouse_command
            .first()
            .cloned()
            .unwrap_or_else(|| "clickhouse".to_string())
    }

    /// `clickhouse client` with connection arguments.
    fn client_command(&self) -> std::io::Result<(String, Vec<String>)> {
        let (program, mut args) = split_command(&self.settings.clickhouse_command)?;
        args.extend([
            "client".to_string(),
            "--host".to_string(),
            self.config.host.clone(),
            "--port".to_string(),
            self.config.port.to_string(),
            "--user".to_string(),
            self.config.identity.user.clone(),
        ]);
        Ok((program, args))
    }

    /// Environment for every client invocation. The password never goes on
    /// the command line.
    pub fn client_env(&self) -> Vec<(&'static str, String)> {
        let password = &self.config.identity.password;
        if password.is_empty() {
            Vec::new()
        } else {
            vec![(PASSWORD_ENV, password.clone())]
        }
    }

    /// Arguments for piping one CSV file into `table`.
    pub fn insert_args(&self, table: &str) -> std::io::Result<(String, Vec<String>)> {
        let (program, mut args) = self.client_command()?;
        for (name, value) in INSERT_SETTINGS {
            args.extend([name.to_string(), value.to_string()]);
        }
        args.extend([
            "--input_format_csv_skip_first_lines".to_string(),
            self.settings.header_lines().to_string(),
            "--query".to_string(),
            format!("INSERT INTO {} FORMAT CSV", self.config.qualified(table)),
        ]);
        Ok((program, args))
    }

    /// Runs one query and returns its trimmed stdout.
    pub async fn query(&self, sql: &str) -> Result<String, ConnectivityError> {
        let spawn = |source| ConnectivityError::Spawn {
            program: self.program_name(),
            source,
        };
        let (program, mut args) = self.client_command().map_err(spawn)?;
        args.extend(["--query".to_string(), sql.to_string()]);

        let output = run_captured(&program, &args, &self.client_env())
            .await
            .map_err(spawn)?;
        if output.success {
            Ok(output.stdout.trim().to_string())
        } else {
            Err(ConnectivityError::Command {
                program,
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    async fn count_rows(&self, table: &str) -> Result<u64, String> {
        let qualified = self.config.qualified(table);
        let out = self
            .query(&format!("SELECT COUNT(*) FROM {qualified}"))
            .await
            .map_err(|e| e.to_string())?;
        out.parse::<u64>()
            .map_err(|e| format!("COUNT(*) on {qualified} returned '{out}': {e}"))
    }
}

#[async_trait]
impl DatabaseLoader for ClickHouseLoader {
    fn backend(&self) -> Backend {
        Backend::ClickHouse
    }

    fn family(&self) -> LoaderFamily {
        LoaderFamily::ClientPipe
    }

    async fn probe_ready(&self, timeout: Duration) -> bool {
        self.probe
            .wait(timeout, || async move {
                match self.query("SELECT 1").await {
                    Ok(_) => ReadinessProbeResult::ready(ReadinessDetail::Reachable),
                    Err(e) => {
                        ReadinessProbeResult::not_ready(ReadinessDetail::Unreachable(e.to_string()))
                    }
                }
            })
            .await
    }

    async fn create_schema(&self) -> Result<(), SchemaError> {
        let statements = schema_statements(Backend::ClickHouse, &self.config.database);
        let total = statements.len();

        for (i, statement) in statements.iter().enumerate() {
            let index = i + 1;
            info!("Executing schema statement {index}/{total}");
            match self.query(statement).await {
                Ok(_) => {}
                Err(e @ ConnectivityError::Spawn { .. }) => return Err(SchemaError::Connect(e)),
                Err(e) => {
                    return Err(SchemaError::Command {
                        index,
                        total,
                        message: e.to_string(),
                    })
                }
            }
        }

        info!("Schema for '{}' created ({total} statements)", self.config.database);
        Ok(())
    }

    async fn load_table(&self, table: &str, source: &Path) -> Result<LoadJob, LoadError> {
        let file = std::fs::File::open(source).map_err(|e| LoadError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
        let (program, args) = self.insert_args(table).map_err(|source| LoadError::Spawn {
            program: self.program_name(),
            source,
        })?;

        info!(
            "Piping {} into {}",
            source.display(),
            self.config.qualified(table)
        );

        let start = Instant::now();
        let output = run_with_stdin(&program, &args, &self.client_env(), Stdio::from(file))
            .await
            .map_err(|source| LoadError::Spawn {
                program: program.clone(),
                source,
            })?;
        let elapsed = start.elapsed();

        if !output.success {
            return Err(LoadError::ProcessFailed {
                program,
                table: table.to_string(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        let rows = match self.count_rows(table).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Could not count rows in {}: {e}", self.config.qualified(table));
                None
            }
        };

        info!("Loaded {table} in {:.1}s", elapsed.as_secs_f64());
        Ok(LoadJob::new(table, source, rows, elapsed))
    }
}
