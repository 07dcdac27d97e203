//! Remote shell sessions
//!
//! The transport is hidden behind three small traits so that the session
//! cache and the command streaming loop do not depend on a particular SSH
//! implementation:
//!
//! - [`SessionConnector`] establishes an authenticated session
//! - [`RemoteSession`] opens exec channels on it
//! - [`ExecChannel`] streams one command's output and exit status

mod cache;
mod ssh;

pub use cache::{SessionCache, LIVENESS_COMMAND};
pub use ssh::RusshConnector;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use dlg_core::ConnectionError;

use crate::descriptor::SessionDescriptor;

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique session number
pub fn next_session_id() -> u64 {
    SESSION_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Event read from an exec channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Output bytes (stdout and stderr share the pseudo-terminal)
    Data(Bytes),
    /// The channel closed; carries the exit status if the server sent one
    Closed { exit_status: Option<u32> },
}

/// One command running on a remote session
#[async_trait]
pub trait ExecChannel: Send {
    /// Wait for the next event. Returns `Closed` once and for every call after.
    async fn next_event(&mut self) -> ChannelEvent;

    /// Write to the command's standard input
    async fn write(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// Close the channel if it is still open
    async fn close(&mut self);
}

/// Bidirectional byte stream over an exec channel
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ByteStream for T {}

/// An authenticated session to one host
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Process-unique number of the underlying connection
    fn id(&self) -> u64;

    /// Start a command, optionally on a pseudo-terminal
    async fn open_exec(
        &self,
        command: &str,
        pty: bool,
    ) -> Result<Box<dyn ExecChannel>, ConnectionError>;

    /// Start a command and expose its stdin/stdout as a raw byte stream
    async fn open_exec_stream(&self, command: &str) -> Result<Box<dyn ByteStream>, ConnectionError>;

    /// Tear the connection down
    async fn disconnect(&self);
}

/// Establishes sessions from descriptors
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(
        &self,
        descriptor: &SessionDescriptor,
    ) -> Result<Arc<dyn RemoteSession>, ConnectionError>;
}
