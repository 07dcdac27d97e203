//! dlg-core: Core abstractions and configuration for delegate-runtime
//!
//! This crate provides the shared domain types, error taxonomy, sink traits
//! and configuration structures used by the validation and execution crates
//! and by the CLI.

pub mod config;
pub mod error;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{ConfigError, ConnectionError, DlgError, ValidationError};
pub use types::{
    any_validated, ConnectionResult, DelegateId, ExecutionLog, ExecutionStatus, LogLevel,
    ResultFragment,
};
