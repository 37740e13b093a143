//! Execution failure classification
//!
//! Structured information (driver error variant, SQLSTATE) decides first;
//! message markers only apply when the error carries no code.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Connection,
    Timeout,
    Deadlock,
    ResourceExhausted,
    Syntax,
    UndefinedObject,
    TypeMismatch,
    PermissionDenied,
    Other,
}

impl FailureCategory {
    /// Transient failures worth re-running the identical query for
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FailureCategory::Connection
                | FailureCategory::Timeout
                | FailureCategory::Deadlock
                | FailureCategory::ResourceExhausted
        )
    }

    /// Map a PostgreSQL SQLSTATE code
    pub fn from_sqlstate(code: &str) -> Self {
        match code {
            "57014" => FailureCategory::Timeout,
            "40P01" | "40001" => FailureCategory::Deadlock,
            "42601" => FailureCategory::Syntax,
            "42703" | "42P01" | "42883" | "42P02" | "3F000" => FailureCategory::UndefinedObject,
            "42804" | "42846" => FailureCategory::TypeMismatch,
            "42501" | "25006" => FailureCategory::PermissionDenied,
            c if c.starts_with("08") => FailureCategory::Connection,
            c if c.starts_with("57P0") => FailureCategory::Connection,
            c if c.starts_with("53") => FailureCategory::ResourceExhausted,
            c if c.starts_with("22") => FailureCategory::TypeMismatch,
            c if c.starts_with("42") => FailureCategory::Syntax,
            _ => FailureCategory::Other,
        }
    }

    /// Fallback for messages without a structured code
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") {
            FailureCategory::Timeout
        } else if lower.contains("deadlock") {
            FailureCategory::Deadlock
        } else if lower.contains("too many connections") || lower.contains("resource") {
            FailureCategory::ResourceExhausted
        } else if lower.contains("connection")
            || lower.contains("temporary")
            || lower.contains("transient")
        {
            FailureCategory::Connection
        } else {
            FailureCategory::Other
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::Connection => "connection",
            FailureCategory::Timeout => "timeout",
            FailureCategory::Deadlock => "deadlock",
            FailureCategory::ResourceExhausted => "resource_exhausted",
            FailureCategory::Syntax => "syntax",
            FailureCategory::UndefinedObject => "undefined_object",
            FailureCategory::TypeMismatch => "type_mismatch",
            FailureCategory::PermissionDenied => "permission_denied",
            FailureCategory::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// Classify a driver error
pub fn classify_sqlx(err: &sqlx::Error) -> FailureCategory {
    match err {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => FailureCategory::from_sqlstate(&code),
            None => FailureCategory::from_message(db.message()),
        },
        sqlx::Error::PoolTimedOut => FailureCategory::Timeout,
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
            FailureCategory::Connection
        }
        sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => FailureCategory::Connection,
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => FailureCategory::TypeMismatch,
        other => FailureCategory::from_message(&other.to_string()),
    }
}
