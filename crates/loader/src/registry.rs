//! Maps a backend identifier to its loader.

use crate::clickhouse::ClickHouseLoader;
use crate::columnstore::ColumnStoreLoader;
use crate::lightning::LightningLoader;
use crate::loader::DatabaseLoader;
use crate::settings::LoadSettings;
use crate::stream_load::{StreamLoadFlavor, StreamLoader};
use bts_bench_core::{Backend, BackendConfig, SqlConnector};
use bts_bench_mysql::MySqlConnector;
use std::sync::Arc;

/// Loader for `backend` using MySQL-protocol sessions from `mysql_async`.
pub fn create_loader(
    backend: Backend,
    config: Arc<BackendConfig>,
    settings: Arc<LoadSettings>,
) -> Arc<dyn DatabaseLoader> {
    create_loader_with(
        backend,
        config,
        settings,
        Arc::new(MySqlConnector::default()),
    )
}

/// Loader for `backend` with an explicit session connector.
///
/// ClickHouse talks through its own client and ignores `connector`.
pub fn create_loader_with(
    backend: Backend,
    config: Arc<BackendConfig>,
    settings: Arc<LoadSettings>,
    connector: Arc<dyn SqlConnector>,
) -> Arc<dyn DatabaseLoader> {
    match backend {
        Backend::ClickHouse => Arc::new(ClickHouseLoader::new(config, settings)),
        Backend::Tidb => Arc::new(LightningLoader::new(config, settings, connector)),
        Backend::Doris => Arc::new(StreamLoader::new(
            StreamLoadFlavor::Doris,
            config,
            settings,
            connector,
        )),
        Backend::StarRocks => Arc::new(StreamLoader::new(
            StreamLoadFlavor::StarRocks,
            config,
            settings,
            connector,
        )),
        Backend::ColumnStore => Arc::new(ColumnStoreLoader::new(config, settings, connector)),
    }
}
