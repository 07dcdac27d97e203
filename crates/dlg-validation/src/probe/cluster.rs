use async_trait::async_trait;

use dlg_core::ValidationError;

use super::ClusterResolver;
use crate::params::ClusterConfig;

/// Resolves clusters from the endpoint carried in their config.
///
/// Managed clusters without a known `masterUrl` cannot be resolved.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfiguredClusterResolver;

#[async_trait]
impl ClusterResolver for ConfiguredClusterResolver {
    async fn resolve_endpoint(&self, cluster: &ClusterConfig) -> Result<String, ValidationError> {
        match cluster {
            ClusterConfig::Gcp {
                master_url: Some(url),
                ..
            }
            | ClusterConfig::Azure {
                master_url: Some(url),
                ..
            }
            | ClusterConfig::Direct { master_url: url } => Ok(url.clone()),
            other => Err(ValidationError::Lookup(format!(
                "no API endpoint known for {}",
                other.criteria()
            ))),
        }
    }
}
