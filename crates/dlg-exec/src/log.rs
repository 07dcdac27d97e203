//! Execution log writer bound to one command unit on one host

use std::sync::Arc;

use dlg_core::traits::LogSink;
use dlg_core::{ExecutionLog, ExecutionStatus, LogLevel};

use crate::descriptor::SessionDescriptor;

/// Writes lines for a single execution to the log sink
#[derive(Clone)]
pub struct ExecutionLogger {
    sink: Arc<dyn LogSink>,
    account_id: String,
    app_id: String,
    activity_id: String,
    command_unit_name: String,
    host_name: String,
}

impl ExecutionLogger {
    pub fn new(
        sink: Arc<dyn LogSink>,
        account_id: impl Into<String>,
        app_id: impl Into<String>,
        activity_id: impl Into<String>,
        command_unit_name: impl Into<String>,
        host_name: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            account_id: account_id.into(),
            app_id: app_id.into(),
            activity_id: activity_id.into(),
            command_unit_name: command_unit_name.into(),
            host_name: host_name.into(),
        }
    }

    /// Logger for the execution a descriptor belongs to
    pub fn for_descriptor(sink: Arc<dyn LogSink>, descriptor: &SessionDescriptor) -> Self {
        Self::new(
            sink,
            descriptor.account_id(),
            descriptor.app_id(),
            descriptor.execution_id(),
            descriptor.command_unit_name(),
            descriptor.host(),
        )
    }

    pub fn info(&self, line: impl Into<String>) {
        self.save(LogLevel::Info, line.into(), None);
    }

    pub fn warn(&self, line: impl Into<String>) {
        self.save(LogLevel::Warn, line.into(), None);
    }

    pub fn error(&self, line: impl Into<String>) {
        self.save(LogLevel::Error, line.into(), None);
    }

    /// Write the closing line carrying the terminal status
    pub fn finish(&self, status: ExecutionStatus, line: impl Into<String>) {
        let level = if status.is_success() {
            LogLevel::Info
        } else {
            LogLevel::Error
        };
        self.save(level, line.into(), Some(status));
    }

    fn save(&self, log_level: LogLevel, log_line: String, execution_result: Option<ExecutionStatus>) {
        self.sink.save(
            &self.account_id,
            ExecutionLog {
                app_id: self.app_id.clone(),
                activity_id: self.activity_id.clone(),
                log_level,
                command_unit_name: self.command_unit_name.clone(),
                host_name: self.host_name.clone(),
                log_line,
                execution_result,
            },
        );
    }
}
