//! Finding and ordering query files.

use bts_bench_core::PreconditionError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One `.sql` file in the query directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryFile {
    pub name: String,
    pub path: PathBuf,
}

/// List the `.sql` files in `dir` in execution order.
///
/// Fails before any connection is made if the directory is missing or holds
/// no query files.
pub async fn discover_query_files(dir: &Path) -> Result<Vec<QueryFile>, PreconditionError> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {}
        _ => return Err(PreconditionError::MissingQueryDir(dir.to_path_buf())),
    }

    let io_err = |source: std::io::Error| PreconditionError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !name.ends_with(".sql") {
            continue;
        }
        if entry.file_type().await.map_err(io_err)?.is_file() {
            names.push(name);
        }
    }

    if names.is_empty() {
        return Err(PreconditionError::NoQueryFiles(dir.to_path_buf()));
    }

    let ordered = order_file_names(names);
    debug!("Query files in {}: {:?}", dir.display(), ordered);
    Ok(ordered
        .into_iter()
        .map(|name| QueryFile {
            path: dir.join(&name),
            name,
        })
        .collect())
}

/// Ascending by numeric prefix (`10.sql` after `2.sql`).
///
/// If any name lacks a numeric prefix the whole set is ordered lexically.
pub fn order_file_names(mut names: Vec<String>) -> Vec<String> {
    if names.iter().all(|n| numeric_prefix(n).is_some()) {
        names.sort_by_cached_key(|n| (numeric_prefix(n), n.clone()));
    } else {
        debug!("Not every query file has a numeric prefix; ordering lexically");
        names.sort();
    }
    names
}

/// `"12.sql"` -> `Some(12)`, `"q12.sql"` -> `None`.
fn numeric_prefix(name: &str) -> Option<u64> {
    name.split('.').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_numeric_order() {
        assert_eq!(
            order_file_names(names(&["10.sql", "2.sql", "1.sql"])),
            names(&["1.sql", "2.sql", "10.sql"])
        );
    }

    #[test]
    fn test_lexical_fallback_applies_to_whole_set() {
        assert_eq!(
            order_file_names(names(&["10.sql", "2.sql", "warmup.sql", "1.sql"])),
            names(&["1.sql", "10.sql", "2.sql", "warmup.sql"])
        );
    }

    #[test]
    fn test_same_number_breaks_tie_by_name() {
        assert_eq!(
            order_file_names(names(&["02.sql", "2.sql", "1.sql"])),
            names(&["1.sql", "02.sql", "2.sql"])
        );
    }

    #[tokio::test]
    async fn test_discover_only_sql_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["10.sql", "2.sql", "1.sql", "README.md", "3.sql.bak"] {
            std::fs::write(dir.path().join(name), "SELECT 1;").unwrap();
        }
        std::fs::create_dir(dir.path().join("4.sql")).unwrap();

        let files = discover_query_files(dir.path()).await.unwrap();
        let found: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(found, vec!["1.sql", "2.sql", "10.sql"]);
        assert_eq!(files[2].path, dir.path().join("10.sql"));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("queries");
        let err = discover_query_files(&missing).await.unwrap_err();
        assert!(matches!(err, PreconditionError::MissingQueryDir(p) if p == missing));
    }

    #[tokio::test]
    async fn test_directory_without_sql_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        let err = discover_query_files(dir.path()).await.unwrap_err();
        assert!(matches!(err, PreconditionError::NoQueryFiles(_)));
    }
}
