//! Supported backend identifiers and their per-backend defaults.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Analytical databases bts-bench can load into and benchmark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ClickHouse
    #[value(name = "clickhouse")]
    ClickHouse,
    /// TiDB (loaded through TiDB Lightning)
    #[value(name = "tidb")]
    Tidb,
    /// Apache Doris
    #[value(name = "doris")]
    Doris,
    /// StarRocks
    #[value(name = "starrocks")]
    StarRocks,
    /// MariaDB ColumnStore
    #[value(name = "columnstore")]
    ColumnStore,
}

impl Backend {
    /// Every supported backend, in the order they are listed to users.
    pub const ALL: [Backend; 5] = [
        Backend::ClickHouse,
        Backend::Tidb,
        Backend::Doris,
        Backend::StarRocks,
        Backend::ColumnStore,
    ];

    /// Identifier used on the command line and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::ClickHouse => "clickhouse",
            Backend::Tidb => "tidb",
            Backend::Doris => "doris",
            Backend::StarRocks => "starrocks",
            Backend::ColumnStore => "columnstore",
        }
    }

    /// Port the loader talks to.
    ///
    /// ClickHouse is loaded through its native client protocol; everything
    /// else speaks the MySQL protocol.
    pub fn default_load_port(&self) -> u16 {
        match self {
            Backend::ClickHouse => 9000,
            Backend::Tidb => 4000,
            Backend::Doris | Backend::StarRocks => 9030,
            Backend::ColumnStore => 3306,
        }
    }

    /// Port the benchmark runner talks to (always a MySQL-protocol port).
    pub fn default_query_port(&self) -> u16 {
        match self {
            Backend::ClickHouse => 9004,
            other => other.default_load_port(),
        }
    }

    /// User the loader connects as unless overridden.
    pub fn default_load_user(&self) -> &'static str {
        match self {
            Backend::ClickHouse => "default",
            Backend::ColumnStore => "admin",
            _ => "root",
        }
    }

    /// User the benchmark runner connects as unless overridden.
    pub fn default_query_user(&self) -> &'static str {
        self.default_load_user()
    }

    /// Password paired with the default user.
    pub fn default_password(&self) -> &'static str {
        match self {
            Backend::ColumnStore => "C0lumnStore!",
            _ => "",
        }
    }

    /// How long the loader waits for the backend to report usable capacity.
    ///
    /// Doris and StarRocks need extra time for their backend nodes to
    /// register with the frontend.
    pub fn default_readiness_timeout(&self) -> Duration {
        match self {
            Backend::Doris | Backend::StarRocks => Duration::from_secs(120),
            _ => Duration::from_secs(60),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_enum_names_match_display() {
        for backend in Backend::ALL {
            let value = backend.to_possible_value().unwrap();
            assert_eq!(value.get_name(), backend.name());
        }
    }

    #[test]
    fn test_clickhouse_uses_mysql_interface_for_queries() {
        assert_eq!(Backend::ClickHouse.default_load_port(), 9000);
        assert_eq!(Backend::ClickHouse.default_query_port(), 9004);
        assert_eq!(Backend::Doris.default_query_port(), 9030);
    }

    #[test]
    fn test_cluster_backends_wait_longer() {
        assert_eq!(
            Backend::StarRocks.default_readiness_timeout(),
            Duration::from_secs(120)
        );
        assert_eq!(
            Backend::Tidb.default_readiness_timeout(),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_clickhouse_user_is_default_on_both_surfaces() {
        assert_eq!(Backend::ClickHouse.default_load_user(), "default");
        assert_eq!(Backend::ClickHouse.default_query_user(), "default");
        assert_eq!(Backend::Doris.default_query_user(), "root");
        assert_eq!(Backend::ColumnStore.default_query_user(), "admin");
    }

    #[test]
    fn test_columnstore_credentials() {
        assert_eq!(Backend::ColumnStore.default_load_user(), "admin");
        assert_eq!(Backend::ColumnStore.default_password(), "C0lumnStore!");
    }
}
