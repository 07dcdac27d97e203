//! Probe seams used by validators
//!
//! Validators never touch the network directly; they go through these
//! traits so that tests can count or fake every outbound call.

mod cluster;
mod handshake;
mod network;

pub use cluster::ConfiguredClusterResolver;
pub use handshake::SshHandshakeProbe;
pub use network::{parse_tcp_target, NetworkProbe, DEFAULT_TCP_PORT};

use async_trait::async_trait;

use dlg_core::{ConnectionError, ValidationError};
use dlg_exec::SessionDescriptor;

use crate::params::ClusterConfig;

/// Generic reachability checks
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Whether an HTTP(S) endpoint answers at all
    async fn http_reachable(&self, url: &str) -> bool;

    /// Whether a TCP connection can be opened
    async fn tcp_reachable(&self, host: &str, port: u16) -> bool;
}

/// Lightweight connect-and-disconnect against deployment hosts
#[async_trait]
pub trait HandshakeProbe: Send + Sync {
    /// Full SSH handshake including authentication
    async fn ssh_handshake(&self, descriptor: &SessionDescriptor) -> Result<(), ConnectionError>;

    /// Connect to a WinRM listener
    async fn winrm_connect(&self, host: &str, port: u16) -> Result<(), ConnectionError>;
}

/// Authenticated reads against Vault
#[async_trait]
pub trait VaultReader: Send + Sync {
    /// Read `url` with a Vault token and return the HTTP status
    async fn read_status(
        &self,
        url: &str,
        token: &str,
        namespace: Option<&str>,
    ) -> Result<u16, ValidationError>;
}

/// Finds the API endpoint of a managed cluster
#[async_trait]
pub trait ClusterResolver: Send + Sync {
    async fn resolve_endpoint(&self, cluster: &ClusterConfig) -> Result<String, ValidationError>;
}
