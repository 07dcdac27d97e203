//! Execution log sink
//!
//! The log sink is the only channel through which in-progress status of a
//! command, transfer or script becomes observable. It is append-only.

use std::sync::Mutex;

use crate::types::{ExecutionLog, ExecutionStatus, LogLevel};

/// Append-only consumer of execution log lines
pub trait LogSink: Send + Sync {
    /// Append one line for an account
    fn save(&self, account_id: &str, log: ExecutionLog);
}

/// Forwards every line to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn save(&self, account_id: &str, log: ExecutionLog) {
        let result = log
            .execution_result
            .map(|r| r.to_string())
            .unwrap_or_default();
        match log.log_level {
            LogLevel::Info => tracing::info!(
                account_id,
                activity_id = %log.activity_id,
                unit = %log.command_unit_name,
                host = %log.host_name,
                result = %result,
                "{}",
                log.log_line
            ),
            LogLevel::Warn => tracing::warn!(
                account_id,
                activity_id = %log.activity_id,
                unit = %log.command_unit_name,
                host = %log.host_name,
                result = %result,
                "{}",
                log.log_line
            ),
            LogLevel::Error => tracing::error!(
                account_id,
                activity_id = %log.activity_id,
                unit = %log.command_unit_name,
                host = %log.host_name,
                result = %result,
                "{}",
                log.log_line
            ),
        }
    }
}

/// Keeps every line in memory, in arrival order
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<(String, ExecutionLog)>>,
}

impl MemoryLogSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all saved lines with their account
    pub fn entries(&self) -> Vec<(String, ExecutionLog)> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the saved log text only
    pub fn lines(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|(_, log)| log.log_line)
            .collect()
    }

    /// Terminal status recorded by the last closing line, if any
    pub fn final_status(&self) -> Option<ExecutionStatus> {
        self.entries()
            .into_iter()
            .rev()
            .find_map(|(_, log)| log.execution_result)
    }

    pub fn len(&self) -> usize {
        self.lines.lock().map(|lines| lines.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for MemoryLogSink {
    fn save(&self, account_id: &str, log: ExecutionLog) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((account_id.to_string(), log));
        }
    }
}
