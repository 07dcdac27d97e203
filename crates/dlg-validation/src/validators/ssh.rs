//! Single-host validation by handshake

use dlg_core::{ConnectionError, ResultFragment, ValidationError};
use dlg_exec::{KeySource, SessionAuth, SessionDescriptor};

use crate::context::ValidationContext;
use crate::params::{HostConnection, SshHostConfig, TaskParameter};
use crate::probe::parse_tcp_target;

/// Execution id carried by validation handshakes
const VALIDATION_EXECUTION_ID: &str = "capability-validation";

const DEFAULT_SSH_PORT: u16 = 22;
const WINRM_HTTP_PORT: u16 = 5985;
const WINRM_HTTPS_PORT: u16 = 5986;

/// Auth material for an SSH connection config
fn session_auth(connection: &HostConnection) -> SessionAuth {
    match connection {
        HostConnection::Ssh {
            key: Some(pem),
            passphrase,
            ..
        } => SessionAuth::Key {
            key: KeySource::Pem(pem.clone()),
            passphrase: passphrase.clone(),
        },
        HostConnection::Ssh {
            key_path: Some(path),
            passphrase,
            ..
        } => SessionAuth::key_file(path.as_str(), passphrase.clone()),
        HostConnection::Ssh { password, .. } => {
            SessionAuth::password(password.clone().unwrap_or_default())
        }
        HostConnection::Winrm { .. } => SessionAuth::password(""),
    }
}

/// Connect to `host` the way `connection` says and disconnect at once
pub(super) async fn connect_and_disconnect(
    ctx: &ValidationContext,
    host: &str,
    connection: &HostConnection,
) -> Result<(), ConnectionError> {
    match connection {
        HostConnection::Ssh { user, port, .. } => {
            let (host, port) = match parse_tcp_target(host, port.unwrap_or(DEFAULT_SSH_PORT)) {
                Some(target) => target,
                None => (host.to_string(), port.unwrap_or(DEFAULT_SSH_PORT)),
            };
            let user = if user.is_empty() {
                ctx.default_user.as_str()
            } else {
                user.as_str()
            };
            let descriptor = SessionDescriptor::builder(VALIDATION_EXECUTION_ID, host)
                .port(port)
                .user(user)
                .auth(session_auth(connection))
                .connect_timeout(ctx.settings.ssh_timeout)
                .build();
            ctx.handshake.ssh_handshake(&descriptor).await
        }
        HostConnection::Winrm { port, use_ssl } => {
            let default_port = if *use_ssl {
                WINRM_HTTPS_PORT
            } else {
                WINRM_HTTP_PORT
            };
            ctx.handshake
                .winrm_connect(host, port.unwrap_or(default_port))
                .await
        }
    }
}

fn first_host(params: &[TaskParameter]) -> Option<&SshHostConfig> {
    params.iter().find_map(|p| match p {
        TaskParameter::SshHost(config) => Some(config),
        _ => None,
    })
}

pub(super) fn criteria(params: &[TaskParameter]) -> Vec<String> {
    first_host(params)
        .map(|config| config.host.clone())
        .into_iter()
        .collect()
}

/// A rejected credential still proves the host is reachable
pub(super) async fn validate(
    params: &[TaskParameter],
    ctx: &ValidationContext,
) -> Result<Vec<ResultFragment>, ValidationError> {
    let config = first_host(params)
        .ok_or_else(|| ValidationError::MissingParameter("host config".to_string()))?;

    let validated = match connect_and_disconnect(ctx, &config.host, &config.connection).await {
        Ok(()) => true,
        Err(e) if e.is_auth_failure() => {
            tracing::debug!(host = %config.host, "Host reachable, credentials rejected: {}", e);
            true
        }
        Err(e) => {
            tracing::debug!(host = %config.host, "Host unreachable: {}", e);
            false
        }
    };
    Ok(vec![ResultFragment::new(config.host.clone(), validated)])
}
