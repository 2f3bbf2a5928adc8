//! Ordered query-file benchmark runner for bts-bench.
//!
//! [`BenchmarkRunner`] executes every `.sql` file of a directory in numeric
//! order over one session, retrying memory and timeout failures a bounded
//! number of times and switching to a fallback identity at most once when the
//! primary one is rejected. Results come back as a [`BenchmarkSummary`].

pub mod classify;
pub mod discovery;
pub mod error;
pub mod runner;
pub mod settings;
pub mod summary;

pub use classify::{classify, FailureKind};
pub use discovery::{discover_query_files, order_file_names, QueryFile};
pub use error::{BenchmarkError, QueryError};
pub use runner::{BenchmarkRunner, RunnerState};
pub use settings::{BenchmarkSettings, FALLBACK_USER};
pub use summary::{format_minutes, BenchmarkSummary, QueryExecutionRecord, QueryOutcome};
