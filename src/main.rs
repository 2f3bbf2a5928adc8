//! Command-line interface for bts-bench
//!
//! # Usage Examples
//!
//! ## Load
//! ```bash
//! # Recreate the schema and stream-load the dataset into Doris
//! bts-bench load --backend doris --data-dir csv
//!
//! # TiDB through TiDB Lightning, tables already created
//! bts-bench load --backend tidb --skip-schema \
//!   --lightning-config load/tidb-lightning.toml
//!
//! # ColumnStore, files carry a header line
//! bts-bench load --backend columnstore --container mcs1 --csv-header
//! ```
//!
//! ## Benchmark
//! ```bash
//! # Run queries/sql/*.sql in numeric order against StarRocks
//! bts-bench bench --backend starrocks
//!
//! # ClickHouse over its MySQL interface, with a JSON report
//! bts-bench bench --backend clickhouse --report-json results/clickhouse.json
//! ```
//!
//! Exit status is 0 on full success and 1 on any setup error, readiness
//! timeout, failed load, failed query file or interrupt.

use anyhow::Context;
use bts_bench::{BenchOpts, ConnectionOpts, LoadOpts, Surface};
use bts_bench_loader::{create_loader, LoadPipeline};
use bts_bench_runner::BenchmarkRunner;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bts-bench")]
#[command(about = "Load the BTS flights dataset into analytical databases and benchmark queries")]
#[command(long_about = None)]
struct Cli {
    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema and bulk-load the dataset
    Load {
        #[command(flatten)]
        conn: ConnectionOpts,

        #[command(flatten)]
        opts: LoadOpts,
    },

    /// Run the ordered query files and report timings
    Bench {
        #[command(flatten)]
        conn: ConnectionOpts,

        #[command(flatten)]
        opts: BenchOpts,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .with_context(|| format!("Invalid log level '{}'", cli.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let work = async {
        match cli.command {
            Commands::Load { conn, opts } => run_load(conn, opts).await,
            Commands::Bench { conn, opts } => run_bench(conn, opts).await,
        }
    };

    tokio::select! {
        result = work => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            tracing::warn!("Received interrupt signal (Ctrl+C), aborting");
            anyhow::bail!("Interrupted")
        }
    }
}

fn log_overrides(conn: &ConnectionOpts) {
    let overrides = conn.overrides();
    if !overrides.is_empty() {
        tracing::info!("Overrides: {}", overrides.join(", "));
    }
}

async fn run_load(conn: ConnectionOpts, opts: LoadOpts) -> anyhow::Result<()> {
    let config = Arc::new(conn.backend_config(Surface::Load));
    tracing::info!(
        "Target: {} at {}:{} as '{}' (database: {})",
        conn.backend,
        config.host,
        config.port,
        config.identity.user,
        config.database
    );
    log_overrides(&conn);

    let loader = create_loader(conn.backend, config, Arc::new(opts.settings()));
    let pipeline = LoadPipeline::new(loader, opts.plan(conn.readiness_timeout()));
    let report = pipeline
        .run()
        .await
        .with_context(|| format!("Loading into {} failed", conn.backend))?;

    for line in report.summary().lines() {
        tracing::info!("{line}");
    }
    tracing::info!("Load completed successfully");
    Ok(())
}

async fn run_bench(conn: ConnectionOpts, opts: BenchOpts) -> anyhow::Result<()> {
    let config = Arc::new(conn.backend_config(Surface::Bench));
    tracing::info!(
        "Target: {} at {}:{} as '{}' (database: {})",
        conn.backend,
        config.host,
        config.port,
        config.identity.user,
        config.database
    );
    log_overrides(&conn);

    let connect_timeout = conn
        .connection_timeout
        .map(Duration::from_secs)
        .unwrap_or(bts_bench_mysql::DEFAULT_CONNECT_TIMEOUT);
    let runner = BenchmarkRunner::new(conn.backend, config, opts.settings(), connect_timeout);
    let summary = runner
        .run()
        .await
        .with_context(|| format!("Benchmark on {} aborted", conn.backend))?;

    for line in summary.summary().lines() {
        tracing::info!("{line}");
    }
    if let Some(path) = &opts.report_json {
        summary.write_json(path).await?;
        tracing::info!("Wrote report to {}", path.display());
    }

    let failed = summary.failures().count();
    if failed > 0 {
        anyhow::bail!("{failed} query file(s) failed");
    }
    tracing::info!("Benchmark completed successfully");
    Ok(())
}
