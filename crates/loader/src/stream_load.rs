//! HTTP stream load for Doris and StarRocks.
//!
//! Each table is sent as one `PUT /api/{db}/{table}/_stream_load` request whose
//! body is streamed from disk. The frontend's MySQL port is used for readiness,
//! DDL and row counts.

use crate::catalog::SqlCatalog;
use crate::error::{LoadError, SchemaError};
use crate::loader::{DatabaseLoader, LoadJob, LoaderFamily};
use crate::probe::ReadinessProbe;
use crate::schema::{schema_statements, table_columns};
use crate::settings::LoadSettings;
use async_trait::async_trait;
use bts_bench_core::{Backend, BackendConfig, SqlConnector};
use reqwest::header::{CONTENT_LENGTH, EXPECT};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

const PROBE_INTERVAL: Duration = Duration::from_secs(5);

/// Extra client-side allowance on top of the server-side load timeout.
const CLIENT_TIMEOUT_SLACK: Duration = Duration::from_secs(60);

/// Lowest filter ratio accepted for the fact table, whose raw export carries
/// more malformed rows than the dimension tables.
pub const FLIGHTS_MIN_FILTER_RATIO: f64 = 0.2;

/// Where the two stream-load dialects differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamLoadFlavor {
    Doris,
    /// Also receives an explicit `columns` header.
    StarRocks,
}

impl StreamLoadFlavor {
    pub fn backend(&self) -> Backend {
        match self {
            StreamLoadFlavor::Doris => Backend::Doris,
            StreamLoadFlavor::StarRocks => Backend::StarRocks,
        }
    }

    fn sends_columns(&self) -> bool {
        matches!(self, StreamLoadFlavor::StarRocks)
    }

    /// Name of the header that skips leading lines of the CSV body.
    pub fn skip_header_name(&self) -> &'static str {
        match self {
            StreamLoadFlavor::Doris => "skip_lines",
            StreamLoadFlavor::StarRocks => "skip_header",
        }
    }
}

/// The fields of a stream-load reply that matter here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamLoadResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub number_loaded_rows: Option<u64>,
    #[serde(default)]
    pub number_filtered_rows: Option<u64>,
    #[serde(default)]
    pub load_time_ms: Option<u64>,
}

impl StreamLoadResponse {
    pub fn is_success(&self) -> bool {
        self.status == "Success"
    }
}

pub struct StreamLoader {
    flavor: StreamLoadFlavor,
    catalog: SqlCatalog,
    config: Arc<BackendConfig>,
    settings: Arc<LoadSettings>,
    probe: ReadinessProbe,
}

impl StreamLoader {
    pub fn new(
        flavor: StreamLoadFlavor,
        config: Arc<BackendConfig>,
        settings: Arc<LoadSettings>,
        connector: Arc<dyn SqlConnector>,
    ) -> Self {
        let probe = ReadinessProbe::new(flavor.backend().name(), PROBE_INTERVAL)
            .with_progress_every(settings.progress_every);
        Self {
            flavor,
            catalog: SqlCatalog::new(connector, config.clone()),
            config,
            settings,
            probe,
        }
    }

    pub fn url(&self, table: &str) -> String {
        format!(
            "http://{}:{}/api/{}/{}/_stream_load",
            self.config.host, self.settings.http_port, self.config.database, table
        )
    }

    /// Headers sent with every load request, apart from auth and length.
    pub fn load_headers(&self, table: &str, label: &str) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("label", label.to_string()),
            ("format", "csv".to_string()),
            ("column_separator", ",".to_string()),
            ("enclose", "\"".to_string()),
            ("escape", "\\".to_string()),
            ("trim_double_quotes", "true".to_string()),
            ("max_filter_ratio", self.max_filter_ratio(table).to_string()),
            ("strict_mode", "false".to_string()),
            ("timeout", self.settings.stream_load_timeout.as_secs().to_string()),
            (
                self.flavor.skip_header_name(),
                self.settings.header_lines().to_string(),
            ),
        ];

        if self.flavor.sends_columns() {
            if let Some(columns) = table_columns(table) {
                headers.push(("columns", columns.join(",")));
            }
        }

        headers
    }

    fn max_filter_ratio(&self, table: &str) -> f64 {
        if table == "flights" {
            self.settings.max_filter_ratio.max(FLIGHTS_MIN_FILTER_RATIO)
        } else {
            self.settings.max_filter_ratio
        }
    }

    fn label(&self, table: &str) -> String {
        format!(
            "{}_load_{}_{}",
            self.flavor.backend().name(),
            table,
            chrono::Utc::now().timestamp()
        )
    }

    async fn send(&self, table: &str, source: &Path) -> Result<StreamLoadResponse, LoadError> {
        let io_error = |source_err| LoadError::Io {
            path: source.to_path_buf(),
            source: source_err,
        };
        let transport = |source_err| LoadError::Transport {
            table: table.to_string(),
            source: source_err,
        };

        let file = tokio::fs::File::open(source).await.map_err(io_error)?;
        let length = file.metadata().await.map_err(io_error)?.len();

        let client = reqwest::Client::builder()
            .timeout(self.settings.stream_load_timeout + CLIENT_TIMEOUT_SLACK)
            .build()
            .map_err(transport)?;

        let label = self.label(table);
        let mut request = client
            .put(self.url(table))
            .basic_auth(
                &self.config.identity.user,
                Some(&self.config.identity.password),
            )
            .header(EXPECT, "100-continue")
            .header(CONTENT_LENGTH, length);
        for (name, value) in self.load_headers(table, &label) {
            request = request.header(name, value);
        }

        info!(
            "Stream loading {} ({length} bytes) into {} with label {label}",
            source.display(),
            self.config.qualified(table)
        );

        let response = request
            .body(reqwest::Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        if !status.is_success() {
            return Err(LoadError::HttpStatus {
                table: table.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: StreamLoadResponse =
            serde_json::from_str(&body).map_err(|source| LoadError::Response {
                table: table.to_string(),
                source,
            })?;

        if !parsed.is_success() {
            return Err(LoadError::Rejected {
                table: table.to_string(),
                status: parsed.status,
                message: parsed.message,
            });
        }

        Ok(parsed)
    }
}

#[async_trait]
impl DatabaseLoader for StreamLoader {
    fn backend(&self) -> Backend {
        self.flavor.backend()
    }

    fn family(&self) -> LoaderFamily {
        LoaderFamily::StreamingIngestion
    }

    async fn probe_ready(&self, timeout: Duration) -> bool {
        self.probe
            .wait(timeout, || self.catalog.probe_cluster())
            .await
    }

    async fn create_schema(&self) -> Result<(), SchemaError> {
        let statements = schema_statements(self.backend(), &self.config.database);
        self.catalog
            .run_schema(&statements, self.settings.ddl_pause)
            .await
    }

    async fn load_table(&self, table: &str, source: &Path) -> Result<LoadJob, LoadError> {
        let start = Instant::now();
        let response = self.send(table, source).await?;
        let elapsed = start.elapsed();

        if let Some(filtered) = response.number_filtered_rows.filter(|n| *n > 0) {
            warn!("{table}: {filtered} row(s) filtered by the server");
        }

        let rows = match self.catalog.count_rows(table).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(
                    "Could not count rows in {}, using the stream load report instead: {e}",
                    self.config.qualified(table)
                );
                response.number_loaded_rows
            }
        };

        let job = LoadJob::new(table, source, rows, elapsed);
        info!(
            "Loaded {table}: {} rows in {:.1}s (server load time {}ms)",
            rows.map_or_else(|| "unknown".to_string(), |r| r.to_string()),
            elapsed.as_secs_f64(),
            response.load_time_ms.unwrap_or_default()
        );
        Ok(job)
    }
}
