//! bts-bench library
//!
//! Command-line option groups shared by the `load` and `bench` subcommands,
//! and their resolution into the immutable run configuration consumed by
//! `bts-bench-loader` and `bts-bench-runner`.
//!
//! # CLI Usage
//!
//! ```bash
//! # Create the schema and stream-load the dataset into Doris
//! bts-bench load --backend doris --data-dir csv
//!
//! # Run the query suite against StarRocks, writing a JSON report
//! bts-bench bench --backend starrocks --queries-folder queries/sql --report-json report.json
//! ```

use bts_bench_core::{Backend, BackendConfig, Dataset, Identity};
use bts_bench_loader::{LoadPlan, LoadSettings};
use bts_bench_runner::BenchmarkSettings;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Which backend to talk to and how to reach it.
#[derive(Parser, Clone, Debug)]
pub struct ConnectionOpts {
    /// Backend to target
    #[arg(long, value_enum, visible_alias = "database")]
    pub backend: Backend,

    /// Database host
    #[arg(long, default_value = "127.0.0.1", env = "BTS_HOST")]
    pub host: String,

    /// Database port (default depends on the backend and subcommand)
    #[arg(long, env = "BTS_PORT")]
    pub port: Option<u16>,

    /// Database user (default depends on the backend)
    #[arg(long, env = "BTS_USER")]
    pub user: Option<String>,

    /// Database password (default depends on the backend)
    #[arg(long, env = "BTS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Target database name
    #[arg(long, default_value = "bts")]
    pub database_name: String,

    /// Seconds to wait for the backend to become ready (default depends on the backend)
    #[arg(long, value_name = "SECONDS")]
    pub connection_timeout: Option<u64>,
}

/// Which port and default user a subcommand uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Surface {
    Load,
    Bench,
}

impl ConnectionOpts {
    /// Resolve defaults for `surface` into a [`BackendConfig`].
    pub fn backend_config(&self, surface: Surface) -> BackendConfig {
        let backend = self.backend;
        let (default_port, default_user) = match surface {
            Surface::Load => (backend.default_load_port(), backend.default_load_user()),
            Surface::Bench => (backend.default_query_port(), backend.default_query_user()),
        };
        let identity = Identity::new(
            self.user.clone().unwrap_or_else(|| default_user.to_string()),
            self.password
                .clone()
                .unwrap_or_else(|| backend.default_password().to_string()),
        );
        BackendConfig::new(
            self.host.clone(),
            self.port.unwrap_or(default_port),
            identity,
            self.database_name.clone(),
        )
    }

    pub fn readiness_timeout(&self) -> Duration {
        self.connection_timeout
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.backend.default_readiness_timeout())
    }

    /// Overrides given on the command line, with the password masked.
    pub fn overrides(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(port) = self.port {
            out.push(format!("port={port}"));
        }
        if let Some(user) = &self.user {
            out.push(format!("user={user}"));
        }
        if self.password.is_some() {
            out.push("password=***".to_string());
        }
        if let Some(timeout) = self.connection_timeout {
            out.push(format!("connection_timeout={timeout}s"));
        }
        out
    }
}

/// Options of the `load` subcommand.
#[derive(Parser, Clone, Debug)]
pub struct LoadOpts {
    /// Skip schema creation and assume the tables already exist
    #[arg(long)]
    pub skip_schema: bool,

    /// Skip the backend's post-load step (TiFlash replica for TiDB)
    #[arg(long)]
    pub skip_post_load: bool,

    /// Directory holding bts.airlines.csv, bts.airports.csv and bts.flights.csv
    #[arg(long, default_value = "csv", value_name = "DIR")]
    pub data_dir: PathBuf,

    /// Source files start with one header line
    #[arg(long)]
    pub csv_header: bool,

    /// Concurrent table loads for backends that support it (default: one per table)
    #[arg(long)]
    pub workers: Option<usize>,

    /// Stream load HTTP port (Doris, StarRocks)
    #[arg(long, default_value_t = 8040)]
    pub http_port: u16,

    /// Maximum tolerated ratio of filtered rows per stream load
    #[arg(long, default_value_t = 0.1)]
    pub max_filter_ratio: f64,

    /// TiDB Lightning configuration file
    #[arg(long, default_value = "load/tidb-lightning.toml", value_name = "PATH")]
    pub lightning_config: PathBuf,

    /// ColumnStore container name
    #[arg(long, default_value = "mcs1")]
    pub container: String,
}

impl LoadOpts {
    pub fn settings(&self) -> LoadSettings {
        LoadSettings::default()
            .with_csv_header(self.csv_header)
            .with_http_port(self.http_port)
            .with_max_filter_ratio(self.max_filter_ratio)
            .with_lightning_config(self.lightning_config.clone())
            .with_container(self.container.clone())
    }

    pub fn plan(&self, readiness_timeout: Duration) -> LoadPlan {
        let plan = LoadPlan::new(Dataset::bts(&self.data_dir), readiness_timeout)
            .with_skip_schema(self.skip_schema)
            .with_skip_post_load(self.skip_post_load);
        match self.workers {
            Some(workers) => plan.with_workers(workers),
            None => plan,
        }
    }
}

/// Options of the `bench` subcommand.
#[derive(Parser, Clone, Debug)]
pub struct BenchOpts {
    /// Directory of numbered .sql query files
    #[arg(long, default_value = "queries/sql", value_name = "DIR")]
    pub queries_folder: PathBuf,

    /// Also write the summary as JSON to this file
    #[arg(long, value_name = "PATH")]
    pub report_json: Option<PathBuf>,

    /// Attempts per query file for memory and timeout failures
    #[arg(long, default_value_t = 3)]
    pub max_attempts: u32,

    /// Seconds between attempts
    #[arg(long, default_value_t = 5)]
    pub retry_delay: u64,
}

impl BenchOpts {
    pub fn settings(&self) -> BenchmarkSettings {
        BenchmarkSettings::default()
            .with_queries_dir(self.queries_folder.clone())
            .with_max_attempts(self.max_attempts)
            .with_retry_delay(Duration::from_secs(self.retry_delay))
    }
}
