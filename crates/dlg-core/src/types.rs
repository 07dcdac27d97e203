//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a delegate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelegateId(pub String);

impl DelegateId {
    /// Create a new delegate ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DelegateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DelegateId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DelegateId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Outcome of one reachability probe as produced by a validator.
///
/// Account and delegate are stamped on later by the validation runner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultFragment {
    /// Opaque identity of the probed target
    pub criteria: String,
    /// Whether the delegate can reach the target
    pub validated: bool,
    /// Probe duration in milliseconds, when the validator measured it itself
    pub duration: Option<u64>,
}

impl ResultFragment {
    /// Fragment without a duration of its own
    pub fn new(criteria: impl Into<String>, validated: bool) -> Self {
        Self {
            criteria: criteria.into(),
            validated,
            duration: None,
        }
    }

    /// Fragment carrying a measured duration
    pub fn timed(criteria: impl Into<String>, validated: bool, duration_ms: u64) -> Self {
        Self {
            criteria: criteria.into(),
            validated,
            duration: Some(duration_ms),
        }
    }
}

/// Persisted result of one validation attempt.
///
/// Unique per `(account_id, delegate_id, criteria)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionResult {
    pub account_id: String,
    pub delegate_id: DelegateId,
    pub criteria: String,
    pub validated: bool,
    /// Milliseconds
    pub duration: u64,
}

impl ConnectionResult {
    /// Key under which the result is upserted
    pub fn key(&self) -> (String, DelegateId, String) {
        (
            self.account_id.clone(),
            self.delegate_id.clone(),
            self.criteria.clone(),
        )
    }
}

/// Whether any result in a batch validated the task
pub fn any_validated(results: &[ConnectionResult]) -> bool {
    results.iter().any(|r| r.validated)
}

/// Terminal status of a command, transfer or script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Failure,
}

impl ExecutionStatus {
    /// Map a process exit status
    pub fn from_exit_code(code: i64) -> Self {
        if code == 0 {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failure
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "SUCCESS"),
            ExecutionStatus::Failure => write!(f, "FAILURE"),
        }
    }
}

/// Severity of an execution log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// One line of in-progress status written to the log sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLog {
    pub app_id: String,
    /// Execution the line belongs to
    pub activity_id: String,
    pub log_level: LogLevel,
    pub command_unit_name: String,
    pub host_name: String,
    pub log_line: String,
    /// Set on the line that closes a command unit
    pub execution_result: Option<ExecutionStatus>,
}
