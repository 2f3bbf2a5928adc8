//! Core types for bts-bench.
//!
//! This crate holds the pieces shared by the loader crate and the benchmark
//! runner crate:
//!
//! - [`Backend`] - The closed set of supported analytical databases
//! - [`BackendConfig`] - Immutable connection parameters for one run
//! - [`Dataset`] - The fixed table to source-file mapping
//! - [`SqlConnector`] / [`SqlSession`] - The seam over MySQL-protocol sessions
//!
//! # Architecture
//!
//! ```text
//! bts-bench-core (this crate)
//!    │
//!    ├─── bts-bench-mysql   (implements SqlConnector over mysql_async)
//!    ├─── bts-bench-loader  (DatabaseLoader families + load orchestrator)
//!    └─── bts-bench-runner  (ordered query-file benchmark runner)
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod error;
pub mod sql;

pub use backend::Backend;
pub use config::{BackendConfig, Identity, SessionTarget};
pub use dataset::{Dataset, TableSource};
pub use error::PreconditionError;
pub use sql::{
    count_rows, split_statements, QueryRows, SqlConnector, SqlError, SqlSession,
};
