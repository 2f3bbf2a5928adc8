//! TiDB loads through the TiDB Lightning bulk importer.

use crate::catalog::SqlCatalog;
use crate::error::{LoadError, SchemaError};
use crate::loader::{DatabaseLoader, LoadJob, LoaderFamily};
use crate::probe::ReadinessProbe;
use crate::process::{run_logged, split_command};
use crate::schema::schema_statements;
use crate::settings::LoadSettings;
use async_trait::async_trait;
use bts_bench_core::{Backend, BackendConfig, SqlConnector};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const PROBE_INTERVAL: Duration = Duration::from_secs(2);

pub struct LightningLoader {
    catalog: SqlCatalog,
    config: Arc<BackendConfig>,
    settings: Arc<LoadSettings>,
    probe: ReadinessProbe,
}

impl LightningLoader {
    pub fn new(
        config: Arc<BackendConfig>,
        settings: Arc<LoadSettings>,
        connector: Arc<dyn SqlConnector>,
    ) -> Self {
        let probe = ReadinessProbe::new(Backend::Tidb.name(), PROBE_INTERVAL)
            .with_progress_every(settings.progress_every);
        Self {
            catalog: SqlCatalog::new(connector, config.clone()),
            config,
            settings,
            probe,
        }
    }

    fn check_config(&self) -> Result<(), LoadError> {
        if self.settings.lightning_config.is_file() {
            Ok(())
        } else {
            Err(LoadError::MissingConfig(self.settings.lightning_config.clone()))
        }
    }

    /// Program and arguments importing one table.
    pub fn command(&self, table: &str) -> Result<(String, Vec<String>), LoadError> {
        let (program, mut args) =
            split_command(&self.settings.lightning_command).map_err(|source| LoadError::Spawn {
                program: "tidb-lightning".to_string(),
                source,
            })?;

        args.extend([
            "-config".to_string(),
            self.settings.lightning_config.display().to_string(),
            "-f".to_string(),
            self.config.qualified(table),
        ]);
        Ok((program, args))
    }
}

#[async_trait]
impl DatabaseLoader for LightningLoader {
    fn backend(&self) -> Backend {
        Backend::Tidb
    }

    fn family(&self) -> LoaderFamily {
        LoaderFamily::ExternalBulkTool
    }

    async fn probe_ready(&self, timeout: Duration) -> bool {
        self.probe
            .wait(timeout, || self.catalog.probe_connectivity())
            .await
    }

    async fn create_schema(&self) -> Result<(), SchemaError> {
        let statements = schema_statements(Backend::Tidb, &self.config.database);
        self.catalog
            .run_schema(&statements, self.settings.ddl_pause)
            .await
    }

    async fn prepare_load(&self) -> Result<(), LoadError> {
        self.check_config()?;
        info!(
            "Using TiDB Lightning config {}",
            self.settings.lightning_config.display()
        );
        Ok(())
    }

    async fn load_table(&self, table: &str, source: &Path) -> Result<LoadJob, LoadError> {
        self.check_config()?;
        let (program, args) = self.command(table)?;

        // The importer reads its sources from the config, not from `source`.
        info!(
            "Importing {} with {program} (source {})",
            self.config.qualified(table),
            source.display()
        );

        let start = Instant::now();
        let output = run_logged(&program, &args, "tidb-lightning")
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
                stderr: output.stderr,
            });
        }

        let rows = match self.catalog.count_rows(table).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Could not count rows in {}: {e}", self.config.qualified(table));
                None
            }
        };

        info!(
            "TiDB Lightning imported {table} in {:.1}s",
            elapsed.as_secs_f64()
        );
        Ok(LoadJob::new(table, source, rows, elapsed))
    }

    /// Adds a TiFlash replica for `flights`. Failure only warns: clusters
    /// without TiFlash nodes still serve queries from TiKV.
    async fn post_load(&self) -> Result<(), LoadError> {
        let statement = format!(
            "ALTER TABLE {} SET TIFLASH REPLICA 1",
            self.config.qualified("flights")
        );
        info!("Setting TiFlash replica for flights");
        if let Err(e) = self.catalog.execute(&statement).await {
            warn!("Could not set TiFlash replica: {e}");
        }
        Ok(())
    }
}
