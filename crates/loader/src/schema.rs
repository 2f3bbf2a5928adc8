//! Embedded DDL for each backend.
//!
//! Scripts live under `schemas/` and use `{database}` as the database name
//! placeholder.

use bts_bench_core::{split_statements, Backend};

const CLICKHOUSE: &str = include_str!("../schemas/clickhouse.sql");
const TIDB: &str = include_str!("../schemas/tidb.sql");
const DORIS: &str = include_str!("../schemas/doris.sql");
const STARROCKS: &str = include_str!("../schemas/starrocks.sql");
const COLUMNSTORE: &str = include_str!("../schemas/columnstore.sql");

const AIRLINES_COLUMNS: &[&str] = &["iata_code", "airline"];

const AIRPORTS_COLUMNS: &[&str] = &[
    "iata_code", "airport", "city", "state", "country", "latitude", "longitude",
];

/// Column order of `flights`, matching the CSV layout.
pub const FLIGHTS_COLUMNS: &[&str] = &[
    "year",
    "month",
    "day",
    "day_of_week",
    "fl_date",
    "carrier",
    "tail_num",
    "fl_num",
    "origin",
    "dest",
    "crs_dep_time",
    "dep_time",
    "dep_delay",
    "taxi_out",
    "wheels_off",
    "wheels_on",
    "taxi_in",
    "crs_arr_time",
    "arr_time",
    "arr_delay",
    "cancelled",
    "cancellation_code",
    "diverted",
    "crs_elapsed_time",
    "actual_elapsed_time",
    "air_time",
    "distance",
    "carrier_delay",
    "weather_delay",
    "nas_delay",
    "security_delay",
    "late_aircraft_delay",
];

pub fn schema_script(backend: Backend) -> &'static str {
    match backend {
        Backend::ClickHouse => CLICKHOUSE,
        Backend::Tidb => TIDB,
        Backend::Doris => DORIS,
        Backend::StarRocks => STARROCKS,
        Backend::ColumnStore => COLUMNSTORE,
    }
}

/// Ordered DDL statements for `backend`, targeting `database`.
pub fn schema_statements(backend: Backend, database: &str) -> Vec<String> {
    split_statements(&schema_script(backend).replace("{database}", database))
}

/// CSV column order of a BTS table.
pub fn table_columns(table: &str) -> Option<&'static [&'static str]> {
    match table {
        "airlines" => Some(AIRLINES_COLUMNS),
        "airports" => Some(AIRPORTS_COLUMNS),
        "flights" => Some(FLIGHTS_COLUMNS),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_backend_recreates_database_and_three_tables() {
        for backend in Backend::ALL {
            let statements = schema_statements(backend, "bench");
            assert!(
                statements[0].starts_with("DROP DATABASE IF EXISTS"),
                "{backend}: {}",
                statements[0]
            );
            assert!(statements[1].starts_with("CREATE DATABASE"), "{backend}");
            let tables = statements
                .iter()
                .filter(|s| s.starts_with("CREATE TABLE"))
                .count();
            assert_eq!(tables, 3, "{backend}");
            assert!(statements.iter().all(|s| !s.contains("{database}")));
            assert!(statements[0].contains("bench"));
        }
    }

    #[test]
    fn test_flights_columns_match_every_script() {
        assert_eq!(FLIGHTS_COLUMNS.len(), 32);
        for backend in Backend::ALL {
            let script = schema_script(backend);
            for column in FLIGHTS_COLUMNS {
                assert!(script.contains(column), "{backend} is missing {column}");
            }
        }
    }

    #[test]
    fn test_table_columns() {
        assert_eq!(table_columns("airlines"), Some(AIRLINES_COLUMNS));
        assert_eq!(table_columns("unknown"), None);
    }
}
