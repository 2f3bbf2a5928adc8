//! Backend loaders and the load orchestrator for bts-bench.
//!
//! Each supported backend gets a [`DatabaseLoader`] from one of four families:
//!
//! - [`stream_load`] - HTTP stream load (Doris, StarRocks)
//! - [`lightning`] - TiDB Lightning, one invocation per table
//! - [`columnstore`] - `cpimport` inside the ColumnStore container
//! - [`clickhouse`] - CSV piped into `clickhouse client`
//!
//! [`LoadPipeline`] drives a loader through readiness, schema creation, table
//! loads and the post-load step, producing a [`LoadReport`].

pub mod catalog;
pub mod clickhouse;
pub mod columnstore;
pub mod error;
pub mod lightning;
pub mod loader;
pub mod pipeline;
pub mod probe;
pub mod process;
pub mod registry;
pub mod report;
pub mod schema;
pub mod settings;
pub mod stream_load;

#[cfg(test)]
mod testing;

pub use error::{ConnectivityError, LoadError, OrchestratorError, SchemaError, TableFailure};
pub use loader::{DatabaseLoader, LoadJob, LoaderFamily, ReadinessDetail, ReadinessProbeResult};
pub use pipeline::{LoadPipeline, LoadPlan};
pub use probe::ReadinessProbe;
pub use registry::{create_loader, create_loader_with};
pub use report::{format_count, LoadReport};
pub use settings::LoadSettings;
