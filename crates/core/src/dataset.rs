//! The fixed BTS dataset: three tables, each fed by one CSV file.

use crate::error::PreconditionError;
use std::path::{Path, PathBuf};

/// Table name and file name pairs, in load order.
pub const BTS_TABLES: [(&str, &str); 3] = [
    ("airlines", "bts.airlines.csv"),
    ("airports", "bts.airports.csv"),
    ("flights", "bts.flights.csv"),
];

/// One table and the file that populates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSource {
    pub table: String,
    pub path: PathBuf,
}

impl TableSource {
    pub fn new(table: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            table: table.into(),
            path: path.into(),
        }
    }
}

/// The set of tables a load run populates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dataset {
    pub tables: Vec<TableSource>,
}

impl Dataset {
    /// The BTS flights dataset rooted at `data_dir`.
    pub fn bts(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            tables: BTS_TABLES
                .iter()
                .map(|(table, file)| TableSource::new(*table, data_dir.join(file)))
                .collect(),
        }
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.table.as_str()).collect()
    }

    /// Fails with every missing file listed when any source file is absent.
    pub fn verify(&self) -> Result<(), PreconditionError> {
        let missing: Vec<PathBuf> = self
            .tables
            .iter()
            .filter(|t| !t.path.is_file())
            .map(|t| t.path.clone())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PreconditionError::MissingSourceFiles(missing))
        }
    }
}
