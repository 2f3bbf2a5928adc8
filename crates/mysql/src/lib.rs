//! MySQL-protocol sessions for bts-bench.
//!
//! Every supported backend exposes a MySQL-compatible endpoint (ClickHouse on
//! its MySQL interface port). This crate implements the
//! [`SqlConnector`]/[`SqlSession`] seam from `bts-bench-core` on top of
//! `mysql_async`, one dedicated connection per session.

mod value;

use async_trait::async_trait;
use bts_bench_core::{QueryRows, SessionTarget, SqlConnector, SqlError, SqlSession};
use mysql_async::prelude::*;
use mysql_async::{Conn, OptsBuilder, Row};
use std::time::Duration;
use tracing::debug;

pub use value::value_to_text;

/// Default time allowed for the TCP connect and handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Opens one `mysql_async::Conn` per session.
#[derive(Clone, Debug)]
pub struct MySqlConnector {
    connect_timeout: Duration,
}

impl MySqlConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for MySqlConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl SqlConnector for MySqlConnector {
    async fn connect(&self, target: &SessionTarget) -> Result<Box<dyn SqlSession>, SqlError> {
        let address = target.address();
        debug!(
            "Connecting to {} as '{}' (database: {:?})",
            address, target.identity.user, target.database
        );

        let opts = OptsBuilder::default()
            .ip_or_hostname(target.host.clone())
            .tcp_port(target.port)
            .user(Some(target.identity.user.clone()))
            .pass(Some(target.identity.password.clone()))
            .db_name(target.database.clone());

        let conn = match tokio::time::timeout(self.connect_timeout, Conn::new(opts)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(connect_error(&address, e)),
            Err(_) => {
                return Err(SqlError::Connect {
                    address,
                    message: format!(
                        "connect timed out after {}s",
                        self.connect_timeout.as_secs()
                    ),
                })
            }
        };

        Ok(Box::new(MySqlSession { conn: Some(conn) }))
    }
}

/// A session over one exclusive connection.
///
/// The connection is released by [`SqlSession::close`]; if the session is
/// dropped without closing, `mysql_async` disconnects it on drop.
pub struct MySqlSession {
    conn: Option<Conn>,
}

impl MySqlSession {
    fn conn(&mut self) -> Result<&mut Conn, SqlError> {
        self.conn
            .as_mut()
            .ok_or_else(|| SqlError::Driver("session already closed".to_string()))
    }
}

#[async_trait]
impl SqlSession for MySqlSession {
    async fn execute(&mut self, statement: &str) -> Result<(), SqlError> {
        let conn = self.conn()?;
        let result = conn.query_iter(statement).await.map_err(statement_error)?;
        // Drains every pending result set, not just the first.
        result.drop_result().await.map_err(statement_error)
    }

    async fn query(&mut self, statement: &str) -> Result<QueryRows, SqlError> {
        let conn = self.conn()?;
        let rows: Vec<Row> = conn
            .query::<Row, _>(statement)
            .await
            .map_err(statement_error)?;

        let columns = rows
            .first()
            .map(|row| {
                row.columns_ref()
                    .iter()
                    .map(|c| c.name_str().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let values = rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|i| row.as_ref(i).and_then(value_to_text))
                    .collect()
            })
            .collect();

        Ok(QueryRows::new(columns, values))
    }

    async fn commit(&mut self) -> Result<(), SqlError> {
        let conn = self.conn()?;
        conn.query_drop("COMMIT").await.map_err(statement_error)
    }

    async fn ping(&mut self) -> Result<(), SqlError> {
        let conn = self.conn()?;
        conn.ping().await.map_err(statement_error)
    }

    async fn close(&mut self) -> Result<(), SqlError> {
        match self.conn.take() {
            Some(conn) => conn.disconnect().await.map_err(statement_error),
            None => Ok(()),
        }
    }
}

fn connect_error(address: &str, err: mysql_async::Error) -> SqlError {
    match err {
        // Rejected credentials surface as server errors during the handshake.
        mysql_async::Error::Server(server) => SqlError::Server {
            code: server.code,
            message: server.message,
        },
        other => SqlError::Connect {
            address: address.to_string(),
            message: other.to_string(),
        },
    }
}

fn statement_error(err: mysql_async::Error) -> SqlError {
    match err {
        mysql_async::Error::Server(server) => SqlError::Server {
            code: server.code,
            message: server.message,
        },
        other => SqlError::Driver(other.to_string()),
    }
}
