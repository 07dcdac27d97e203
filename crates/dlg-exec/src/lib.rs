//! dlg-exec: Carrying out SSH-class tasks for delegate-runtime
//!
//! - [`descriptor`] describes one execution's connection to one host
//! - [`session`] opens sessions (russh) and caches them per execution
//! - [`command`] streams remote commands and pushes files over cached sessions
//! - [`scp`] speaks the single-file SCP sink exchange
//! - [`script`] runs scripts locally with the same output contract
//!
//! Outcomes are reported as [`ExecutionStatus`](dlg_core::ExecutionStatus)
//! plus lines written to a [`LogSink`](dlg_core::traits::LogSink).

pub mod command;
pub mod descriptor;
pub mod error;
pub mod log;
pub mod scp;
pub mod script;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use command::{CommandExecutor, CommandOutcome, StreamSettings};
pub use descriptor::{BastionConfig, KeySource, SessionAuth, SessionDescriptor};
pub use error::ExecError;
pub use log::ExecutionLogger;
pub use scp::{BytesFileProvider, FileProvider, LocalFileProvider};
pub use script::{LocalScriptExecutor, ScriptRequest, ScriptType};
pub use session::{RusshConnector, SessionCache, SessionConnector};
