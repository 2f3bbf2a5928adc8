//! Errors raised before any connection is attempted.

use std::path::PathBuf;
use thiserror::Error;

/// A required local input is missing.
#[derive(Error, Debug)]
pub enum PreconditionError {
    /// One or more dataset files do not exist.
    #[error("Missing required source files: {}", display_paths(.0))]
    MissingSourceFiles(Vec<PathBuf>),

    /// The query-script directory does not exist.
    #[error("Queries folder not found: {}", .0.display())]
    MissingQueryDir(PathBuf),

    /// The query-script directory has no `.sql` files.
    #[error("No SQL files found in {}", .0.display())]
    NoQueryFiles(PathBuf),

    /// Reading a local input failed.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
