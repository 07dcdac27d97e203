//! Host handshakes: SSH through the exec connector, WinRM as a TCP connect

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use dlg_core::ConnectionError;
use dlg_exec::{RusshConnector, SessionDescriptor};

use super::HandshakeProbe;

/// Production [`HandshakeProbe`]
#[derive(Debug, Clone)]
pub struct SshHandshakeProbe {
    connector: RusshConnector,
    tcp_timeout: Duration,
}

impl SshHandshakeProbe {
    pub fn new(default_user: impl Into<String>, tcp_timeout: Duration) -> Self {
        Self {
            connector: RusshConnector::new(default_user),
            tcp_timeout,
        }
    }
}

#[async_trait]
impl HandshakeProbe for SshHandshakeProbe {
    async fn ssh_handshake(&self, descriptor: &SessionDescriptor) -> Result<(), ConnectionError> {
        self.connector.handshake(descriptor).await
    }

    async fn winrm_connect(&self, host: &str, port: u16) -> Result<(), ConnectionError> {
        let target = format!("{}:{}", host, port);
        match tokio::time::timeout(self.tcp_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::ConnectionRefused(format!("{}: {}", target, e))),
            Err(_) => Err(ConnectionError::Timeout(target)),
        }
    }
}
