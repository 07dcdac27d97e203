//! Execution error types
//!
//! Failures of the remote command, transfer or script themselves are not
//! errors: they end in [`ExecutionStatus::Failure`](dlg_core::ExecutionStatus)
//! plus log lines. `ExecError` is reserved for requests the caller got wrong.

use thiserror::Error;

/// Errors returned to the caller of an executor
#[derive(Error, Debug)]
pub enum ExecError {
    /// A harvest variable name that is not a valid shell identifier
    #[error("Invalid environment variable name: {0:?}")]
    InvalidVariableName(String),

    /// The transfer source cannot be sent as a single file
    #[error("Invalid transfer source: {0}")]
    InvalidSource(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
