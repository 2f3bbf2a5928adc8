//! Sorting execution failures into the kinds the runner reacts to.

use bts_bench_core::SqlError;
use serde::Serialize;
use std::fmt;

/// How the runner reacts to a failed statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The backend ran out of memory. Retry on a fresh connection.
    ResourceLimit,
    /// The statement timed out or was cancelled. Retry on the same connection.
    Timeout,
    /// The identity was rejected.
    Authorization,
    /// Anything else. Recorded, never retried.
    Other,
}

impl FailureKind {
    /// Resource-limit and timeout failures are retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, FailureKind::ResourceLimit | FailureKind::Timeout)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::ResourceLimit => "resource limit",
            FailureKind::Timeout => "timeout",
            FailureKind::Authorization => "authorization",
            FailureKind::Other => "error",
        })
    }
}

const RESOURCE_PATTERNS: &[&str] = &["mem_limit_exceeded", "memory not enough", "memory limit"];
const TIMEOUT_PATTERNS: &[&str] = &["timeout", "timed out", "cancelled"];
const AUTH_PATTERNS: &[&str] = &[
    "access denied",
    "authentication",
    "unknown user",
    "password",
    "denied",
];

/// ER_DBACCESS_DENIED_ERROR, ER_ACCESS_DENIED_ERROR, ER_TABLEACCESS_DENIED_ERROR,
/// ER_SPECIFIC_ACCESS_DENIED_ERROR.
const AUTH_CODES: &[u16] = &[1044, 1045, 1142, 1227];

/// ER_QUERY_TIMEOUT (`MAX_EXECUTION_TIME` exceeded).
const TIMEOUT_CODES: &[u16] = &[3024];

/// Classify by server code first, then by message text.
///
/// Resource-limit patterns win over timeout patterns, which win over
/// authorization patterns: an out-of-memory message mentioning a cancelled
/// query is still a resource-limit failure.
pub fn classify(error: &SqlError) -> FailureKind {
    if let Some(code) = error.code() {
        if AUTH_CODES.contains(&code) {
            return FailureKind::Authorization;
        }
        if TIMEOUT_CODES.contains(&code) {
            return FailureKind::Timeout;
        }
    }

    let message = match error {
        SqlError::Server { message, .. } => message.to_lowercase(),
        other => other.to_string().to_lowercase(),
    };
    let contains_any = |patterns: &[&str]| patterns.iter().any(|p| message.contains(p));

    if contains_any(RESOURCE_PATTERNS) {
        FailureKind::ResourceLimit
    } else if contains_any(TIMEOUT_PATTERNS) {
        FailureKind::Timeout
    } else if contains_any(AUTH_PATTERNS) {
        FailureKind::Authorization
    } else {
        FailureKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(code: u16, message: &str) -> SqlError {
        SqlError::Server {
            code,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_memory_messages_are_resource_limits() {
        for message in [
            "errCode = 2, detailMessage = MEM_LIMIT_EXCEEDED: process memory used 3.1 GB",
            "Memory not enough for hash join",
            "Query exceeded memory limit of 2 GiB, query cancelled",
        ] {
            assert_eq!(classify(&server(1105, message)), FailureKind::ResourceLimit, "{message}");
        }
    }

    #[test]
    fn test_timeouts() {
        assert_eq!(
            classify(&server(1105, "query timeout after 300s")),
            FailureKind::Timeout
        );
        assert_eq!(
            classify(&server(1105, "Query was cancelled by coordinator")),
            FailureKind::Timeout
        );
        assert_eq!(
            classify(&server(3024, "Query execution was interrupted")),
            FailureKind::Timeout
        );
        assert_eq!(
            classify(&SqlError::Driver("read timed out".into())),
            FailureKind::Timeout
        );
    }

    #[test]
    fn test_authorization_by_code_and_message() {
        assert_eq!(
            classify(&server(1045, "Access denied for user 'root'@'%'")),
            FailureKind::Authorization
        );
        assert_eq!(
            classify(&server(1142, "SELECT command not allowed")),
            FailureKind::Authorization
        );
        assert_eq!(
            classify(&server(1105, "Authentication failed: password is incorrect")),
            FailureKind::Authorization
        );
        assert_eq!(
            classify(&server(516, "default: Authentication failed")),
            FailureKind::Authorization
        );
    }

    #[test]
    fn test_bare_user_mention_is_not_authorization() {
        assert_eq!(
            classify(&server(1105, "Unknown column 'user_id' in 'field list'")),
            FailureKind::Other
        );
    }

    #[test]
    fn test_other_failures() {
        let kind = classify(&server(1064, "You have an error in your SQL syntax"));
        assert_eq!(kind, FailureKind::Other);
        assert!(!kind.is_transient());
        assert!(FailureKind::ResourceLimit.is_transient());
        assert!(FailureKind::Timeout.is_transient());
    }
}
