//! MariaDB ColumnStore loads with `cpimport` inside the database container.
//!
//! The host data directory is mounted into the container, so only file names
//! cross the boundary.

use crate::catalog::SqlCatalog;
use crate::error::{LoadError, SchemaError};
use crate::loader::{DatabaseLoader, LoadJob, LoaderFamily, ReadinessDetail, ReadinessProbeResult};
use crate::probe::ReadinessProbe;
use crate::process::{run_captured, split_command, CommandOutput};
use crate::schema::schema_statements;
use crate::settings::LoadSettings;
use async_trait::async_trait;
use bts_bench_core::{Backend, BackendConfig, SqlConnector};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const PROBE_INTERVAL: Duration = Duration::from_secs(2);

pub struct ColumnStoreLoader {
    catalog: SqlCatalog,
    config: Arc<BackendConfig>,
    settings: Arc<LoadSettings>,
    probe: ReadinessProbe,
}

impl ColumnStoreLoader {
    pub fn new(
        config: Arc<BackendConfig>,
        settings: Arc<LoadSettings>,
        connector: Arc<dyn SqlConnector>,
    ) -> Self {
        let probe = ReadinessProbe::new(Backend::ColumnStore.name(), PROBE_INTERVAL)
            .with_progress_every(settings.progress_every);
        Self {
            catalog: SqlCatalog::new(connector, config.clone()),
            config,
            settings,
            probe,
        }
    }

    async fn docker(&self, args: &[&str]) -> std::io::Result<CommandOutput> {
        let (program, mut full) = split_command(&self.settings.docker_command)?;
        full.extend(args.iter().map(|a| a.to_string()));
        run_captured(&program, &full, &[]).await
    }

    fn docker_program(&self) -> String {
        self.settings
            .docker_command
            .first()
            .cloned()
            .unwrap_or_else(|| "docker".to_string())
    }

    /// Whether `docker ps` lists the container by its exact name.
    pub async fn container_running(&self) -> std::io::Result<bool> {
        let filter = format!("name={}", self.settings.container);
        let output = self
            .docker(&["ps", "--filter", filter.as_str(), "--format", "{{.Names}}"])
            .await?;
        Ok(output.success
            && output
                .stdout
                .lines()
                .any(|name| name.trim() == self.settings.container))
    }

    async fn probe_once(&self) -> ReadinessProbeResult {
        match self.container_running().await {
            Ok(true) => self.catalog.probe_connectivity().await,
            Ok(false) => ReadinessProbeResult::not_ready(ReadinessDetail::ContainerMissing(
                self.settings.container.clone(),
            )),
            Err(e) => ReadinessProbeResult::not_ready(ReadinessDetail::Unreachable(format!(
                "{}: {e}",
                self.docker_program()
            ))),
        }
    }

    /// Path of `source` as seen from inside the container.
    pub fn container_path(&self, source: &Path) -> Result<String, LoadError> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LoadError::Io {
                path: source.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "source path has no file name",
                ),
            })?;
        Ok(format!(
            "{}/{}",
            self.settings.container_data_dir.trim_end_matches('/'),
            name
        ))
    }
}

#[async_trait]
impl DatabaseLoader for ColumnStoreLoader {
    fn backend(&self) -> Backend {
        Backend::ColumnStore
    }

    fn family(&self) -> LoaderFamily {
        LoaderFamily::ContainerizedColumnar
    }

    async fn probe_ready(&self, timeout: Duration) -> bool {
        self.probe.wait(timeout, || self.probe_once()).await
    }

    async fn create_schema(&self) -> Result<(), SchemaError> {
        let statements = schema_statements(Backend::ColumnStore, &self.config.database);
        self.catalog
            .run_schema(&statements, self.settings.ddl_pause)
            .await
    }

    /// Runs the container's `provision` step; a container that was provisioned
    /// earlier counts as success.
    async fn prepare_load(&self) -> Result<(), LoadError> {
        let container = self.settings.container.as_str();
        let spawn = |source| LoadError::Spawn {
            program: self.docker_program(),
            source,
        };

        if !self.container_running().await.map_err(spawn)? {
            return Err(LoadError::ContainerMissing(container.to_string()));
        }

        info!("Provisioning ColumnStore container '{container}'");
        let output = self
            .docker(&["exec", container, "provision", container])
            .await
            .map_err(spawn)?;
        let combined = output.combined();

        if output.success || combined.to_lowercase().contains("already provisioned") {
            info!("Container '{container}' is provisioned");
            Ok(())
        } else {
            Err(LoadError::Provision {
                container: container.to_string(),
                output: combined.trim().to_string(),
            })
        }
    }

    async fn load_table(&self, table: &str, source: &Path) -> Result<LoadJob, LoadError> {
        if !source.is_file() {
            return Err(LoadError::Io {
                path: source.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "source file not found"),
            });
        }
        if self.settings.csv_header {
            warn!("cpimport cannot skip a header row; the first line of {table} loads as data");
        }

        let container_path = self.container_path(source)?;
        let container = self.settings.container.as_str();
        let database = self.config.database.as_str();
        info!("Importing {container_path} into {database}.{table} with cpimport");

        let start = Instant::now();
        let output = self
            .docker(&[
                "exec",
                container,
                "cpimport",
                "-s",
                ",",
                "-E",
                "\"",
                database,
                table,
                container_path.as_str(),
            ])
            .await
            .map_err(|source| LoadError::Spawn {
                program: self.docker_program(),
                source,
            })?;
        let elapsed = start.elapsed();

        let stderr = output.stderr.trim();
        if stderr.to_lowercase().contains("error") {
            return Err(LoadError::ToolError {
                tool: "cpimport".to_string(),
                table: table.to_string(),
                stderr: stderr.to_string(),
            });
        }
        if !output.success {
            warn!("cpimport exited with {:?} for {table}", output.code);
        }
        if !stderr.is_empty() {
            warn!("cpimport: {stderr}");
        }

        let rows = match self.catalog.count_rows(table).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!("Could not count rows in {}: {e}", self.config.qualified(table));
                None
            }
        };

        info!("cpimport loaded {table} in {:.1}s", elapsed.as_secs_f64());
        Ok(LoadJob::new(table, source, rows, elapsed))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::FakeServer;
    use bts_bench_core::Identity;
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        csv: PathBuf,
        calls: PathBuf,
        server: Arc<FakeServer>,
        loader: ColumnStoreLoader,
    }

    /// A fake `docker` driven by shell snippets per subcommand.
    fn fixture(ps: &str, provision: &str, cpimport: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("bts.airlines.csv");
        std::fs::write(&csv, "AA,American Airlines\n").unwrap();
        let calls = dir.path().join("calls");
        let script = dir.path().join("docker.sh");
        std::fs::write(
            &script,
            format!(
                "echo \"$@\" >> {calls}\n\
                 case \"$1\" in\n\
                 ps) {ps} ;;\n\
                 exec) case \"$3\" in\n\
                   provision) {provision} ;;\n\
                   cpimport) {cpimport} ;;\n\
                 esac ;;\n\
                 esac\n",
                calls = calls.display()
            ),
        )
        .unwrap();

        let server = FakeServer::new();
        let settings = LoadSettings::default()
            .with_docker_command(vec!["sh".into(), script.display().to_string()]);
        let loader = ColumnStoreLoader::new(
            Arc::new(BackendConfig::new(
                "127.0.0.1",
                3306,
                Identity::new("admin", "C0lumnStore!"),
                "bts",
            )),
            Arc::new(settings),
            server.connector(),
        );
        Fixture {
            _dir: dir,
            csv,
            calls,
            server,
            loader,
        }
    }

    #[tokio::test]
    async fn test_missing_container_is_not_ready() {
        let f = fixture("true", "true", "true");
        assert!(!f.loader.probe_ready(Duration::from_millis(200)).await);
        // Never got as far as the SQL endpoint.
        assert_eq!(f.server.connects(), 0);
    }

    #[tokio::test]
    async fn test_running_container_and_sql_is_ready() {
        let f = fixture("echo mcs1", "true", "true");
        assert!(f.loader.probe_ready(Duration::from_secs(5)).await);
        assert_eq!(f.server.connects(), 1);
    }

    #[tokio::test]
    async fn test_already_provisioned_counts_as_success() {
        let f = fixture("echo mcs1", "echo 'Container already provisioned' >&2; exit 1", "true");
        assert!(f.loader.prepare_load().await.is_ok());

        let f = fixture("echo mcs1", "echo 'provision failed: no PM' >&2; exit 2", "true");
        let err = f.loader.prepare_load().await.unwrap_err();
        assert!(matches!(err, LoadError::Provision { .. }));

        let f = fixture("true", "true", "true");
        let err = f.loader.prepare_load().await.unwrap_err();
        assert!(matches!(err, LoadError::ContainerMissing(name) if name == "mcs1"));
    }

    #[tokio::test]
    async fn test_cpimport_uses_container_path() {
        let f = fixture("echo mcs1", "true", "echo 'Bulk load completed'");
        f.server.set_count("bts.airlines", 1);

        let job = f.loader.load_table("airlines", &f.csv).await.unwrap();
        assert_eq!(job.rows_loaded, Some(1));

        let calls = std::fs::read_to_string(&f.calls).unwrap();
        assert!(calls.contains(
            "exec mcs1 cpimport -s , -E \" bts airlines /var/lib/columnstore/csv/bts.airlines.csv"
        ));
    }

    #[tokio::test]
    async fn test_cpimport_error_output_fails_the_table() {
        let f = fixture(
            "echo mcs1",
            "true",
            "echo 'ERROR: Table bts.airlines does not exist' >&2",
        );
        let err = f.loader.load_table("airlines", &f.csv).await.unwrap_err();
        assert!(matches!(err, LoadError::ToolError { .. }));
    }

    #[tokio::test]
    async fn test_cpimport_nonzero_exit_without_error_text_only_warns() {
        let f = fixture("echo mcs1", "true", "echo 'rejected 1 row' >&2; exit 1");
        f.server.set_count("bts.airlines", 0);
        let job = f.loader.load_table("airlines", &f.csv).await.unwrap();
        assert_eq!(job.rows_loaded, Some(0));
    }

    #[test]
    fn test_container_path() {
        let f = fixture("true", "true", "true");
        assert_eq!(
            f.loader
                .container_path(Path::new("/home/me/csv/bts.flights.csv"))
                .unwrap(),
            "/var/lib/columnstore/csv/bts.flights.csv"
        );
    }
}
