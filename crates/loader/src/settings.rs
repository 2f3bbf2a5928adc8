//! Loader tuning knobs resolved once from the command line.

use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by every loader family.
///
/// Each family reads only the fields it needs; the rest keep their defaults.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadSettings {
    /// Source files start with a header row.
    pub csv_header: bool,
    /// Stream load HTTP port on the frontend.
    pub http_port: u16,
    pub max_filter_ratio: f64,
    /// Server-side stream load timeout.
    pub stream_load_timeout: Duration,
    /// Program and leading arguments that launch TiDB Lightning.
    pub lightning_command: Vec<String>,
    pub lightning_config: PathBuf,
    /// Program and leading arguments that launch the Docker CLI.
    pub docker_command: Vec<String>,
    pub container: String,
    /// Where the host data directory is mounted inside the container.
    pub container_data_dir: String,
    /// Program and leading arguments that launch the ClickHouse CLI.
    pub clickhouse_command: Vec<String>,
    /// Gap between progress messages while waiting for readiness.
    pub progress_every: Duration,
    /// Pause between DDL statements, giving cluster metadata time to settle.
    pub ddl_pause: Duration,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            csv_header: false,
            http_port: 8040,
            max_filter_ratio: 0.1,
            stream_load_timeout: Duration::from_secs(600),
            lightning_command: vec!["tiup".to_string(), "tidb-lightning".to_string()],
            lightning_config: PathBuf::from("load/tidb-lightning.toml"),
            docker_command: vec!["docker".to_string()],
            container: "mcs1".to_string(),
            container_data_dir: "/var/lib/columnstore/csv".to_string(),
            clickhouse_command: vec!["clickhouse".to_string()],
            progress_every: Duration::from_secs(20),
            ddl_pause: Duration::from_millis(500),
        }
    }
}

impl LoadSettings {
    pub fn with_csv_header(mut self, csv_header: bool) -> Self {
        self.csv_header = csv_header;
        self
    }

    pub fn with_http_port(mut self, http_port: u16) -> Self {
        self.http_port = http_port;
        self
    }

    pub fn with_max_filter_ratio(mut self, ratio: f64) -> Self {
        self.max_filter_ratio = ratio;
        self
    }

    pub fn with_lightning_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.lightning_config = path.into();
        self
    }

    pub fn with_lightning_command(mut self, command: Vec<String>) -> Self {
        self.lightning_command = command;
        self
    }

    pub fn with_docker_command(mut self, command: Vec<String>) -> Self {
        self.docker_command = command;
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = container.into();
        self
    }

    pub fn with_clickhouse_command(mut self, command: Vec<String>) -> Self {
        self.clickhouse_command = command;
        self
    }

    pub fn with_ddl_pause(mut self, pause: Duration) -> Self {
        self.ddl_pause = pause;
        self
    }

    /// Lines to skip at the top of each source file.
    pub fn header_lines(&self) -> u32 {
        u32::from(self.csv_header)
    }
}
