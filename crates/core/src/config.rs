//! Connection parameters for one run.

use std::fmt;

/// A user/password pair presented to a backend.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub password: String,
}

impl Identity {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Same password, different user.
    pub fn with_user(&self, user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: self.password.clone(),
        }
    }
}

// Passwords never reach the logs.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Immutable connection and target parameters for one run.
///
/// Built once from the command line and shared by reference (usually behind an
/// `Arc`) with every component of the run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    pub identity: Identity,
    /// Target database name, created by schema setup and queried afterwards.
    pub database: String,
}

impl BackendConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        identity: Identity,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            identity,
            database: database.into(),
        }
    }

    /// Session target with no default database selected.
    ///
    /// Used for schema setup, which drops and recreates the database itself.
    pub fn server_target(&self) -> SessionTarget {
        SessionTarget {
            host: self.host.clone(),
            port: self.port,
            identity: self.identity.clone(),
            database: None,
        }
    }

    /// Session target with the run's database selected.
    pub fn database_target(&self) -> SessionTarget {
        SessionTarget {
            database: Some(self.database.clone()),
            ..self.server_target()
        }
    }

    /// `database.table`, as used in count queries and load targets.
    pub fn qualified(&self, table: &str) -> String {
        format!("{}.{}", self.database, table)
    }
}

/// Everything needed to open one session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionTarget {
    pub host: String,
    pub port: u16,
    pub identity: Identity,
    pub database: Option<String>,
}

impl SessionTarget {
    pub fn with_identity(self, identity: Identity) -> Self {
        Self { identity, ..self }
    }

    /// `host:port`, for log lines.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
