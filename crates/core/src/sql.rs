//! The seam between bts-bench and MySQL-protocol backends.
//!
//! Loaders and the benchmark runner only see [`SqlConnector`] and
//! [`SqlSession`]; `bts-bench-mysql` provides the production implementation and
//! tests provide in-memory fakes.

use crate::config::SessionTarget;
use async_trait::async_trait;
use thiserror::Error;

/// A failure reported by a session or by the connector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SqlError {
    /// The server rejected a statement or the handshake.
    #[error("Server error {code}: {message}")]
    Server { code: u16, message: String },

    /// No session could be established (network, DNS, refused).
    #[error("Connection to {address} failed: {message}")]
    Connect { address: String, message: String },

    /// Client-side driver failure.
    #[error("Driver error: {0}")]
    Driver(String),

    /// The server answered with something we could not interpret.
    #[error("Unexpected result: {0}")]
    Unexpected(String),
}

impl SqlError {
    /// Server error code, when the server supplied one.
    pub fn code(&self) -> Option<u16> {
        match self {
            SqlError::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Opens sessions. Each session is owned exclusively by one unit of work.
#[async_trait]
pub trait SqlConnector: Send + Sync {
    async fn connect(&self, target: &SessionTarget) -> Result<Box<dyn SqlSession>, SqlError>;
}

/// One open connection.
///
/// Callers must call [`SqlSession::close`] on every exit path; implementations
/// also release the connection when dropped.
#[async_trait]
pub trait SqlSession: Send {
    /// Runs one statement and drains every result set it produces.
    async fn execute(&mut self, statement: &str) -> Result<(), SqlError>;

    /// Runs one statement and returns its first result set as text.
    async fn query(&mut self, statement: &str) -> Result<QueryRows, SqlError>;

    async fn commit(&mut self) -> Result<(), SqlError>;

    /// Cheap liveness check.
    async fn ping(&mut self) -> Result<(), SqlError>;

    async fn close(&mut self) -> Result<(), SqlError>;
}

/// A result set rendered as text, with column names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Values of one column across all rows. `None` if the column is absent.
    pub fn column_values(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let index = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).and_then(|v| v.as_deref()))
                .collect(),
        )
    }

    /// First column of the first row.
    pub fn first_value(&self) -> Option<&str> {
        self.rows.first()?.first()?.as_deref()
    }
}

/// `SELECT COUNT(*)` over a qualified table name.
pub async fn count_rows(session: &mut dyn SqlSession, qualified: &str) -> Result<u64, SqlError> {
    let rows = session
        .query(&format!("SELECT COUNT(*) FROM {qualified}"))
        .await?;
    let value = rows
        .first_value()
        .ok_or_else(|| SqlError::Unexpected(format!("COUNT(*) on {qualified} returned no rows")))?;
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| SqlError::Unexpected(format!("COUNT(*) on {qualified} returned '{value}': {e}")))
}

/// Splits a script on `;` into trimmed, non-empty statements.
///
/// Chunks made only of `--` comment lines are dropped. Semicolons inside string
/// literals are not recognised; scripts must not contain them.
pub fn split_statements(script: &str) -> Vec<String> {
    script
        .split(';')
        .map(str::trim)
        .filter(|chunk| {
            chunk
                .lines()
                .map(str::trim)
                .any(|line| !line.is_empty() && !line.starts_with("--"))
        })
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountSession {
        reply: QueryRows,
        seen: Vec<String>,
    }

    #[async_trait]
    impl SqlSession for CountSession {
        async fn execute(&mut self, _statement: &str) -> Result<(), SqlError> {
            Ok(())
        }

        async fn query(&mut self, statement: &str) -> Result<QueryRows, SqlError> {
            self.seen.push(statement.to_string());
            Ok(self.reply.clone())
        }

        async fn commit(&mut self) -> Result<(), SqlError> {
            Ok(())
        }

        async fn ping(&mut self) -> Result<(), SqlError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SqlError> {
            Ok(())
        }
    }

    #[test]
    fn test_split_statements_drops_empties() {
        let script = "SELECT 1;\n\n  ;SELECT 2 ;\n";
        assert_eq!(split_statements(script), vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_split_statements_drops_comment_only_chunks() {
        let script = "-- warm up\nSELECT 1;\n-- trailing note\n";
        assert_eq!(split_statements(script), vec!["-- warm up\nSELECT 1"]);
    }

    #[test]
    fn test_column_lookup_is_case_insensitive() {
        let rows = QueryRows::new(
            vec!["BackendId".into(), "Alive".into()],
            vec![
                vec![Some("1".into()), Some("true".into())],
                vec![Some("2".into()), None],
            ],
        );
        assert_eq!(rows.column_index("alive"), Some(1));
        assert_eq!(
            rows.column_values("ALIVE").unwrap(),
            vec![Some("true"), None]
        );
        assert!(rows.column_values("missing").is_none());
    }

    #[tokio::test]
    async fn test_count_rows_parses_first_value() {
        let mut session = CountSession {
            reply: QueryRows::new(vec!["count(*)".into()], vec![vec![Some("1234".into())]]),
            seen: Vec::new(),
        };
        let count = count_rows(&mut session, "bts.flights").await.unwrap();
        assert_eq!(count, 1234);
        assert_eq!(session.seen, vec!["SELECT COUNT(*) FROM bts.flights"]);
    }

    #[tokio::test]
    async fn test_count_rows_rejects_empty_result() {
        let mut session = CountSession {
            reply: QueryRows::default(),
            seen: Vec::new(),
        };
        let err = count_rows(&mut session, "bts.flights").await.unwrap_err();
        assert!(matches!(err, SqlError::Unexpected(_)));
    }

    #[test]
    fn test_sql_error_code() {
        let err = SqlError::Server {
            code: 1045,
            message: "Access denied".into(),
        };
        assert_eq!(err.code(), Some(1045));
    }
}
