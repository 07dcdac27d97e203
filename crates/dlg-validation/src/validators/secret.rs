//! Secret manager and Vault validation

use dlg_core::{ResultFragment, ValidationError};

use super::connectivity::probe;
use crate::context::ValidationContext;
use crate::params::{EncryptionType, SecretManagerConfig, TaskParameter, VaultConfig};
use crate::probe::DEFAULT_TCP_PORT;

/// KV mount read when the config names none
const DEFAULT_SECRET_ENGINE: &str = "secret";

/// Vault endpoint that answers without a token
const VAULT_HEALTH_PATH: &str = "v1/sys/health";

fn first_secret_manager(params: &[TaskParameter]) -> Option<&SecretManagerConfig> {
    params.iter().find_map(|p| match p {
        TaskParameter::SecretManager(config) => Some(config),
        _ => None,
    })
}

fn first_vault(params: &[TaskParameter]) -> Option<&VaultConfig> {
    params.iter().find_map(|p| match p {
        TaskParameter::Vault(config) => Some(config),
        _ => None,
    })
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub(super) fn secret_manager_criteria(params: &[TaskParameter]) -> Vec<String> {
    first_secret_manager(params)
        .map(|config| config.url.clone())
        .into_iter()
        .collect()
}

/// Vault secrets are validated by an authenticated read, other backends by reachability
pub(super) async fn validate_secret_manager(
    params: &[TaskParameter],
    ctx: &ValidationContext,
) -> Result<Vec<ResultFragment>, ValidationError> {
    let config = first_secret_manager(params)
        .ok_or_else(|| ValidationError::MissingParameter("secret manager config".to_string()))?;

    let validated = match config.encryption_type {
        EncryptionType::Vault => {
            let token = config
                .auth_token
                .as_deref()
                .ok_or_else(|| ValidationError::MissingParameter("authToken".to_string()))?;
            let engine = config
                .secret_engine
                .as_deref()
                .unwrap_or(DEFAULT_SECRET_ENGINE);
            let read_url = join_url(
                &config.url,
                &format!(
                    "v1/{}/{}",
                    engine.trim_matches('/'),
                    ctx.settings.vault_validation_path.trim_matches('/')
                ),
            );
            match ctx
                .vault
                .read_status(&read_url, token, config.namespace.as_deref())
                .await
            {
                Ok(status) => {
                    tracing::debug!(url = %read_url, status, "Vault validation read");
                    (200..300).contains(&status)
                }
                Err(ValidationError::Http(e)) => {
                    tracing::debug!(url = %read_url, "Vault validation read got no response: {}", e);
                    false
                }
                Err(e) => return Err(e),
            }
        }
        _ => probe(ctx, &config.url, DEFAULT_TCP_PORT).await?,
    };

    Ok(vec![ResultFragment::new(config.url.clone(), validated)])
}

pub(super) fn vault_criteria(params: &[TaskParameter]) -> Vec<String> {
    first_vault(params)
        .map(|config| config.vault_url.clone())
        .into_iter()
        .collect()
}

pub(super) async fn validate_vault(
    params: &[TaskParameter],
    ctx: &ValidationContext,
) -> Result<Vec<ResultFragment>, ValidationError> {
    let config = first_vault(params)
        .ok_or_else(|| ValidationError::MissingParameter("vault config".to_string()))?;
    let validated = ctx
        .reachability
        .http_reachable(&join_url(&config.vault_url, VAULT_HEALTH_PATH))
        .await;
    Ok(vec![ResultFragment::new(config.vault_url.clone(), validated)])
}
