//! The benchmark state machine.
//!
//! Query files run in order over one shared session. Failures are classified
//! ([`FailureKind`]) and drive explicit state transitions:
//!
//! ```text
//! Disconnected ──connect──▶ Connected ──next file──▶ Executing
//!      ▲  ▲                     ▲                        │
//!      │  │                     └──── success / other ───┤
//!      │  └──── reconnect ──── Retrying ◀── transient ───┤
//!      └──────────────── CredentialDowngrade ◀── auth ───┘
//! ```
//!
//! The identity ladder is consumed at most once, so a second authorization
//! failure ends the run instead of looping.

use crate::classify::FailureKind;
use crate::discovery::{discover_query_files, QueryFile};
use crate::error::{BenchmarkError, QueryError};
use crate::settings::BenchmarkSettings;
use crate::summary::{BenchmarkSummary, QueryExecutionRecord, QueryOutcome};
use bts_bench_core::{
    split_statements, Backend, BackendConfig, Identity, SqlConnector, SqlError, SqlSession,
};
use bts_bench_mysql::MySqlConnector;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Where the runner is between two steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunnerState {
    /// No open session.
    Disconnected,
    /// A session is open and idle.
    Connected,
    /// Running the current file.
    Executing,
    /// The current file failed transiently and will be attempted again.
    Retrying { reconnect: bool },
    /// The current identity was rejected; move to the next one.
    CredentialDowngrade,
    Done,
}

/// Runs the query files of one directory against one backend.
pub struct BenchmarkRunner {
    backend: Backend,
    config: Arc<BackendConfig>,
    settings: BenchmarkSettings,
    connector: Arc<dyn SqlConnector>,
}

impl BenchmarkRunner {
    /// Runner over MySQL-protocol sessions from `mysql_async`.
    pub fn new(
        backend: Backend,
        config: Arc<BackendConfig>,
        settings: BenchmarkSettings,
        connect_timeout: Duration,
    ) -> Self {
        Self::with_connector(
            backend,
            config,
            settings,
            Arc::new(MySqlConnector::new(connect_timeout)),
        )
    }

    pub fn with_connector(
        backend: Backend,
        config: Arc<BackendConfig>,
        settings: BenchmarkSettings,
        connector: Arc<dyn SqlConnector>,
    ) -> Self {
        Self {
            backend,
            config,
            settings,
            connector,
        }
    }

    /// Run every query file and summarise.
    ///
    /// Returns `Err` only for fatal conditions: missing query files, an
    /// unreachable backend, or every identity being rejected. Failed files
    /// are reported through the summary.
    pub async fn run(&self) -> Result<BenchmarkSummary, BenchmarkError> {
        let files = discover_query_files(&self.settings.queries_dir).await?;
        info!(
            "Running {} query file(s) from {} on {}",
            files.len(),
            self.settings.queries_dir.display(),
            self.backend
        );

        let start = Instant::now();
        let mut run = Run::new(self, files);
        let result = run.drive().await;
        run.drop_session().await;
        result?;

        Ok(BenchmarkSummary::new(
            self.backend,
            run.records,
            start.elapsed(),
        ))
    }
}

/// The authorization failure that triggered a downgrade.
struct Rejection {
    error: QueryError,
    /// `None` when the handshake itself was rejected.
    file: Option<String>,
}

/// Mutable state of one run.
struct Run<'a> {
    runner: &'a BenchmarkRunner,
    files: Vec<QueryFile>,
    /// Remaining identities; the front one is in use.
    identities: Vec<Identity>,
    session: Option<Box<dyn SqlSession>>,
    /// Index of the file being worked on.
    cursor: usize,
    /// Attempt number for the current file, starting at 1.
    attempt: u32,
    rejection: Option<Rejection>,
    /// Set once the ladder has been stepped down.
    downgraded: bool,
    records: Vec<QueryExecutionRecord>,
}

impl<'a> Run<'a> {
    fn new(runner: &'a BenchmarkRunner, files: Vec<QueryFile>) -> Self {
        let identities = runner
            .settings
            .identity_ladder(&runner.config.identity);
        Self {
            runner,
            files,
            identities,
            session: None,
            cursor: 0,
            attempt: 1,
            rejection: None,
            downgraded: false,
            records: Vec::new(),
        }
    }

    fn identity(&self) -> &Identity {
        &self.identities[0]
    }

    fn current_file(&self) -> &QueryFile {
        &self.files[self.cursor]
    }

    async fn drive(&mut self) -> Result<(), BenchmarkError> {
        let mut state = RunnerState::Disconnected;
        loop {
            debug!("Benchmark state: {:?}", state);
            state = match state {
                RunnerState::Done => return Ok(()),
                RunnerState::Disconnected => self.connect().await?,
                RunnerState::Connected => {
                    if self.cursor >= self.files.len() {
                        RunnerState::Done
                    } else {
                        RunnerState::Executing
                    }
                }
                RunnerState::Executing => self.execute_current().await,
                RunnerState::Retrying { reconnect } => self.retry(reconnect).await,
                RunnerState::CredentialDowngrade => self.downgrade().await?,
            };
        }
    }

    async fn connect(&mut self) -> Result<RunnerState, BenchmarkError> {
        if self.cursor >= self.files.len() {
            return Ok(RunnerState::Done);
        }

        let target = self
            .runner
            .config
            .database_target()
            .with_identity(self.identity().clone());
        info!(
            "Connecting to {} at {} as '{}'",
            self.runner.backend,
            target.address(),
            target.identity.user
        );

        match self.runner.connector.connect(&target).await {
            Ok(session) => {
                self.session = Some(session);
                Ok(RunnerState::Connected)
            }
            Err(e) => {
                let error = QueryError::from(e);
                if error.kind == FailureKind::Authorization {
                    warn!(
                        "User '{}' was rejected while connecting: {}",
                        target.identity.user, error.source
                    );
                    self.rejection = Some(Rejection { error, file: None });
                    return Ok(RunnerState::CredentialDowngrade);
                }
                Err(BenchmarkError::Connect {
                    address: target.address(),
                    user: target.identity.user,
                    source: error.source,
                })
            }
        }
    }

    async fn execute_current(&mut self) -> RunnerState {
        let file = self.current_file().clone();
        if self.attempt == 1 {
            info!("Processing {}", file.name);
        }

        let script = match tokio::fs::read_to_string(&file.path).await {
            Ok(script) => script,
            Err(e) => {
                error!("Unable to read {}: {}", file.name, e);
                self.finish_file(
                    QueryOutcome::Failure {
                        reason: format!("unreadable: {e}"),
                    },
                    Duration::ZERO,
                );
                return RunnerState::Connected;
            }
        };

        let statements = split_statements(&script);
        if statements.is_empty() {
            warn!("Empty SQL file: {}", file.name);
            self.attempt = 0;
            self.finish_file(QueryOutcome::Skipped, Duration::ZERO);
            return RunnerState::Connected;
        }

        let started = Instant::now();
        let result = match self.session.as_mut() {
            Some(session) => execute_statements(session.as_mut(), &statements).await,
            None => return RunnerState::Disconnected,
        };
        let elapsed = started.elapsed();

        match result {
            Ok(()) => {
                info!(
                    "Executed {} successfully in {:.2}s (attempt {})",
                    file.name,
                    elapsed.as_secs_f64(),
                    self.attempt
                );
                self.finish_file(QueryOutcome::Success, elapsed);
                RunnerState::Connected
            }
            Err(error) => self.on_failure(&file, error, elapsed).await,
        }
    }

    async fn on_failure(
        &mut self,
        file: &QueryFile,
        error: QueryError,
        elapsed: Duration,
    ) -> RunnerState {
        let max_attempts = self.runner.settings.max_attempts;
        match error.kind {
            kind if kind.is_transient() => {
                if self.attempt < max_attempts {
                    warn!(
                        "{} failure on attempt {}/{} for {}: {}. Retrying in {}s",
                        kind,
                        self.attempt,
                        max_attempts,
                        file.name,
                        error.source,
                        self.runner.settings.retry_delay.as_secs_f64()
                    );
                    RunnerState::Retrying {
                        reconnect: kind == FailureKind::ResourceLimit,
                    }
                } else {
                    error!(
                        "Failed to execute {} after {} attempts due to {}: {}",
                        file.name, self.attempt, kind, error.source
                    );
                    self.finish_file(
                        QueryOutcome::Failure {
                            reason: error.to_string(),
                        },
                        elapsed,
                    );
                    if kind == FailureKind::ResourceLimit {
                        self.drop_session().await;
                        RunnerState::Disconnected
                    } else {
                        RunnerState::Connected
                    }
                }
            }
            FailureKind::Authorization if self.identities.len() == 1 && !self.downgraded => {
                // Nothing to fall back to: a denied statement is a failed file.
                error!(
                    "Privilege error for user '{}' in {}: {}",
                    self.identity().user,
                    file.name,
                    error.source
                );
                self.finish_file(
                    QueryOutcome::Failure {
                        reason: error.to_string(),
                    },
                    elapsed,
                );
                RunnerState::Connected
            }
            FailureKind::Authorization => {
                warn!(
                    "Privilege error for user '{}' in {}: {}",
                    self.identity().user,
                    file.name,
                    error.source
                );
                self.rejection = Some(Rejection {
                    error,
                    file: Some(file.name.clone()),
                });
                RunnerState::CredentialDowngrade
            }
            _ => {
                error!("Error executing {}: {}", file.name, error.source);
                let driver_failure = error.source.code().is_none();
                self.finish_file(
                    QueryOutcome::Failure {
                        reason: error.to_string(),
                    },
                    elapsed,
                );
                // A client-side failure may have left the session unusable.
                if driver_failure && !self.session_alive().await {
                    self.drop_session().await;
                    RunnerState::Disconnected
                } else {
                    RunnerState::Connected
                }
            }
        }
    }

    async fn retry(&mut self, reconnect: bool) -> RunnerState {
        tokio::time::sleep(self.runner.settings.retry_delay).await;
        self.attempt += 1;

        if reconnect {
            debug!("Discarding session after resource-limit failure");
            self.drop_session().await;
            tokio::time::sleep(self.runner.settings.reconnect_delay).await;
            return RunnerState::Disconnected;
        }

        if self.session_alive().await {
            RunnerState::Connected
        } else {
            debug!("Session did not answer ping; reconnecting");
            self.drop_session().await;
            RunnerState::Disconnected
        }
    }

    /// Move to the next identity and resume at the current file.
    async fn downgrade(&mut self) -> Result<RunnerState, BenchmarkError> {
        self.drop_session().await;
        let rejected = self.identities.remove(0);
        let rejection = self.rejection.take();

        if self.identities.is_empty() {
            let (file, source) = match rejection {
                Some(r) => (r.file, r.error.source),
                None => (None, SqlError::Unexpected("identity rejected".to_string())),
            };
            return Err(BenchmarkError::AuthorizationExhausted {
                user: rejected.user,
                file,
                source,
            });
        }

        info!(
            "Switching from user '{}' to '{}' and resuming",
            rejected.user,
            self.identity().user
        );
        self.attempt = 1;
        self.downgraded = true;
        Ok(RunnerState::Disconnected)
    }

    fn finish_file(&mut self, outcome: QueryOutcome, elapsed: Duration) {
        let file = self.current_file().name.clone();
        self.records.push(QueryExecutionRecord {
            file,
            outcome,
            elapsed,
            attempts: self.attempt,
            user: self.identity().user.clone(),
        });
        self.cursor += 1;
        self.attempt = 1;
    }

    async fn session_alive(&mut self) -> bool {
        match self.session.as_mut() {
            Some(session) => session.ping().await.is_ok(),
            None => false,
        }
    }

    async fn drop_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.close().await {
                debug!("Error closing session: {}", e);
            }
        }
    }
}

/// Execute, drain, then commit each statement in order.
async fn execute_statements(
    session: &mut dyn SqlSession,
    statements: &[String],
) -> Result<(), QueryError> {
    for statement in statements {
        session.execute(statement).await?;
        session.commit().await?;
    }
    Ok(())
}
