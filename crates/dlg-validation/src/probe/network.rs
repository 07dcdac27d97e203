//! HTTP and TCP probes on reqwest and tokio

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use url::Url;

use dlg_core::config::ValidationSection;
use dlg_core::ValidationError;

use super::{ReachabilityProbe, VaultReader};

/// Port used for a bare host name
pub const DEFAULT_TCP_PORT: u16 = 80;

/// Header carrying the Vault token
const VAULT_TOKEN_HEADER: &str = "X-Vault-Token";
const VAULT_NAMESPACE_HEADER: &str = "X-Vault-Namespace";

/// Network probe shared by all validators of a delegate
#[derive(Debug, Clone)]
pub struct NetworkProbe {
    client: reqwest::Client,
    tcp_timeout: Duration,
}

impl NetworkProbe {
    pub fn new(http_timeout: Duration, tcp_timeout: Duration) -> Result<Self, ValidationError> {
        let client = reqwest::Client::builder()
            .timeout(http_timeout)
            .connect_timeout(http_timeout.min(tcp_timeout))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ValidationError::Http(e.to_string()))?;
        Ok(Self {
            client,
            tcp_timeout,
        })
    }

    pub fn from_config(settings: &ValidationSection) -> Result<Self, ValidationError> {
        Self::new(settings.http_timeout, settings.tcp_timeout)
    }
}

#[async_trait]
impl ReachabilityProbe for NetworkProbe {
    async fn http_reachable(&self, url: &str) -> bool {
        // Any HTTP response proves the path; only transport failures count.
        match self.client.head(url).send().await {
            Ok(response) => {
                tracing::debug!(url, status = %response.status(), "HTTP endpoint answered");
                true
            }
            Err(e) => {
                tracing::debug!(url, "HTTP probe failed: {}", e);
                false
            }
        }
    }

    async fn tcp_reachable(&self, host: &str, port: u16) -> bool {
        match tokio::time::timeout(self.tcp_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(host, port, "TCP probe failed: {}", e);
                false
            }
            Err(_) => {
                tracing::debug!(host, port, "TCP probe timed out");
                false
            }
        }
    }
}

#[async_trait]
impl VaultReader for NetworkProbe {
    async fn read_status(
        &self,
        url: &str,
        token: &str,
        namespace: Option<&str>,
    ) -> Result<u16, ValidationError> {
        let mut request = self.client.get(url).header(VAULT_TOKEN_HEADER, token);
        if let Some(namespace) = namespace {
            request = request.header(VAULT_NAMESPACE_HEADER, namespace);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ValidationError::Http(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

/// Split a non-HTTP criteria into `(host, port)`.
///
/// Accepts `scheme://host[:port]/...`, `host:port` and a bare host.
pub fn parse_tcp_target(criteria: &str, default_port: u16) -> Option<(String, u16)> {
    let criteria = criteria.trim();
    if criteria.is_empty() {
        return None;
    }
    if criteria.contains("://") {
        let url = Url::parse(criteria).ok()?;
        let host = url.host_str()?.to_string();
        return Some((host, url.port().unwrap_or(default_port)));
    }
    match criteria.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !host.contains(':') => {
            let port = port.parse().ok()?;
            Some((host.to_string(), port))
        }
        Some(_) => None,
        None => Some((criteria.to_string(), default_port)),
    }
}
