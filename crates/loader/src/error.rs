//! Error types for schema setup, table loads and the load pipeline.

use bts_bench_core::{Backend, PreconditionError, SqlError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The backend could not be reached while it was expected to be up.
#[derive(Error, Debug)]
pub enum ConnectivityError {
    #[error(transparent)]
    Sql(#[from] SqlError),

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {code:?}: {stderr}")]
    Command {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Database or table creation failed.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema setup could not connect: {0}")]
    Connect(#[source] ConnectivityError),

    #[error("Schema statement {index}/{total} failed ({preview}): {source}")]
    Statement {
        index: usize,
        total: usize,
        preview: String,
        #[source]
        source: SqlError,
    },

    #[error("Schema statement {index}/{total} failed: {message}")]
    Command {
        index: usize,
        total: usize,
        message: String,
    },
}

/// One table could not be loaded.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream load of {table} failed to send: {source}")]
    Transport {
        table: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Stream load of {table} returned HTTP {status}: {body}")]
    HttpStatus {
        table: String,
        status: u16,
        body: String,
    },

    #[error("Stream load of {table} was rejected with status '{status}': {message}")]
    Rejected {
        table: String,
        status: String,
        message: String,
    },

    #[error("Stream load of {table} returned an unreadable response: {source}")]
    Response {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed for {table} with exit code {code:?}: {stderr}")]
    ProcessFailed {
        program: String,
        table: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} reported an error for {table}: {stderr}")]
    ToolError {
        tool: String,
        table: String,
        stderr: String,
    },

    #[error("Bulk tool config not found: {}", .0.display())]
    MissingConfig(PathBuf),

    #[error("Container '{0}' is not running")]
    ContainerMissing(String),

    #[error("Provisioning container '{container}' failed: {output}")]
    Provision { container: String, output: String },

    #[error("{context}: {source}")]
    Sql {
        context: String,
        #[source]
        source: SqlError,
    },
}

/// A table that failed inside a parallel load.
#[derive(Debug)]
pub struct TableFailure {
    pub table: String,
    pub error: LoadError,
}

/// The load run stopped.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("{backend} was not ready within {}s", timeout.as_secs())]
    NotReady { backend: Backend, timeout: Duration },

    #[error("Schema setup failed: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{} table load(s) failed: {}", .0.len(), describe_failures(.0))]
    TableLoads(Vec<TableFailure>),

    #[error("Load worker failed: {0}")]
    Worker(String),
}

fn describe_failures(failures: &[TableFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.table, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}
