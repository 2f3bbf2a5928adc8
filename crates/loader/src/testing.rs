//! In-memory MySQL-protocol server for loader unit tests.

use async_trait::async_trait;
use bts_bench_core::{QueryRows, SessionTarget, SqlConnector, SqlError, SqlSession};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    /// database -> tables, in creation order
    databases: BTreeMap<String, Vec<String>>,
    executed: Vec<String>,
    connects: usize,
    open: usize,
    refuse: bool,
    fail_containing: Option<String>,
    backends: QueryRows,
    counts: HashMap<String, u64>,
}

/// Interprets the handful of DDL forms the schema scripts use.
#[derive(Default)]
pub struct FakeServer {
    state: Mutex<State>,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connector(self: &Arc<Self>) -> Arc<dyn SqlConnector> {
        Arc::new(FakeConnector {
            server: self.clone(),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state().refuse = refuse;
    }

    pub fn fail_statements_containing(&self, needle: &str) {
        self.state().fail_containing = Some(needle.to_string());
    }

    pub fn set_backends(&self, rows: QueryRows) {
        self.state().backends = rows;
    }

    pub fn set_count(&self, qualified: &str, count: u64) {
        self.state().counts.insert(qualified.to_string(), count);
    }

    pub fn tables(&self, database: &str) -> Option<Vec<String>> {
        self.state().databases.get(database).cloned()
    }

    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn connects(&self) -> usize {
        self.state().connects
    }

    pub fn open_sessions(&self) -> usize {
        self.state().open
    }

    fn apply(&self, current: &mut Option<String>, statement: &str) -> Result<(), SqlError> {
        let mut state = self.state();
        state.executed.push(statement.to_string());

        if let Some(needle) = &state.fail_containing {
            if statement.contains(needle.as_str()) {
                return Err(SqlError::Server {
                    code: 1105,
                    message: format!("injected failure for '{needle}'"),
                });
            }
        }

        let words: Vec<String> = statement
            .split_whitespace()
            .map(|w| w.trim_matches('`').to_string())
            .collect();
        let upper: Vec<String> = words.iter().map(|w| w.to_ascii_uppercase()).collect();
        let upper: Vec<&str> = upper.iter().map(String::as_str).collect();

        match upper.as_slice() {
            ["DROP", "DATABASE", "IF", "EXISTS", ..] => {
                state.databases.remove(&words[4]);
            }
            ["CREATE", "DATABASE", ..] => {
                let name = words[2].clone();
                if state.databases.contains_key(&name) {
                    return Err(SqlError::Server {
                        code: 1007,
                        message: format!("Can't create database '{name}'; database exists"),
                    });
                }
                state.databases.insert(name, Vec::new());
            }
            ["USE", ..] => {
                let name = words[1].clone();
                if !state.databases.contains_key(&name) {
                    return Err(SqlError::Server {
                        code: 1049,
                        message: format!("Unknown database '{name}'"),
                    });
                }
                *current = Some(name);
            }
            ["CREATE", "TABLE", ..] => {
                let raw = words[2].trim_end_matches('(').to_string();
                let (database, table) = match raw.split_once('.') {
                    Some((db, table)) => (Some(db.to_string()), table.to_string()),
                    None => (current.clone(), raw),
                };
                let database = database.ok_or_else(|| SqlError::Server {
                    code: 1046,
                    message: "No database selected".to_string(),
                })?;
                let tables = state.databases.get_mut(&database).ok_or_else(|| SqlError::Server {
                    code: 1049,
                    message: format!("Unknown database '{database}'"),
                })?;
                tables.push(table);
            }
            _ => {}
        }
        Ok(())
    }

    fn answer(&self, statement: &str) -> Result<QueryRows, SqlError> {
        let state = self.state();
        if statement == "SELECT 1" {
            return Ok(QueryRows::new(vec!["1".into()], vec![vec![Some("1".into())]]));
        }
        if statement == "SHOW BACKENDS" {
            return Ok(state.backends.clone());
        }
        if let Some(qualified) = statement.strip_prefix("SELECT COUNT(*) FROM ") {
            return match state.counts.get(qualified) {
                Some(count) => Ok(QueryRows::new(
                    vec!["count(*)".into()],
                    vec![vec![Some(count.to_string())]],
                )),
                None => Err(SqlError::Server {
                    code: 1146,
                    message: format!("Table '{qualified}' doesn't exist"),
                }),
            };
        }
        Err(SqlError::Server {
            code: 1064,
            message: format!("unsupported query: {statement}"),
        })
    }
}

struct FakeConnector {
    server: Arc<FakeServer>,
}

#[async_trait]
impl SqlConnector for FakeConnector {
    async fn connect(&self, target: &SessionTarget) -> Result<Box<dyn SqlSession>, SqlError> {
        let mut state = self.server.state();
        state.connects += 1;
        if state.refuse {
            return Err(SqlError::Connect {
                address: target.address(),
                message: "Connection refused".to_string(),
            });
        }
        state.open += 1;
        Ok(Box::new(FakeSession {
            server: self.server.clone(),
            current: target.database.clone(),
            closed: false,
        }))
    }
}

struct FakeSession {
    server: Arc<FakeServer>,
    current: Option<String>,
    closed: bool,
}

#[async_trait]
impl SqlSession for FakeSession {
    async fn execute(&mut self, statement: &str) -> Result<(), SqlError> {
        self.server.apply(&mut self.current, statement)
    }

    async fn query(&mut self, statement: &str) -> Result<QueryRows, SqlError> {
        self.server.answer(statement)
    }

    async fn commit(&mut self) -> Result<(), SqlError> {
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), SqlError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SqlError> {
        if !self.closed {
            self.closed = true;
            self.server.state().open -= 1;
        }
        Ok(())
    }
}
