//! Task parameters
//!
//! A task carries an ordered list of heterogeneous target configs. Each
//! entry is matched against a closed set of shapes by its field names;
//! anything unrecognised is kept as [`TaskParameter::Other`] and ignored by
//! validators.

use serde::{Deserialize, Serialize};

/// One entry of a task's parameter list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskParameter {
    HostList(HostListConfig),
    SshHost(SshHostConfig),
    Cluster(ClusterConfig),
    SecretManager(SecretManagerConfig),
    Vault(VaultConfig),
    Git(GitConfig),
    Url(UrlConfig),
    Other(serde_json::Value),
}

impl TaskParameter {
    /// The endpoint this parameter points at, if it names one
    pub fn target(&self) -> Option<String> {
        match self {
            TaskParameter::HostList(config) => config.hosts.first().cloned(),
            TaskParameter::SshHost(config) => Some(config.host.clone()),
            TaskParameter::Cluster(ClusterConfig::Direct { master_url }) => {
                Some(master_url.clone())
            }
            TaskParameter::Cluster(_) => None,
            TaskParameter::SecretManager(config) => Some(config.url.clone()),
            TaskParameter::Vault(config) => Some(config.vault_url.clone()),
            TaskParameter::Git(config) => Some(config.repo_url.clone()),
            TaskParameter::Url(config) => Some(config.url().to_string()),
            TaskParameter::Other(_) => None,
        }
    }
}

/// Configs that only contribute a URL to probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlConfig {
    #[serde(rename_all = "camelCase")]
    DockerRegistry { registry_url: String },
    #[serde(rename_all = "camelCase")]
    Artifactory { artifactory_url: String },
    #[serde(rename_all = "camelCase")]
    Nexus { nexus_url: String },
    #[serde(rename_all = "camelCase")]
    Jenkins { jenkins_url: String },
    #[serde(rename_all = "camelCase")]
    Bamboo { bamboo_url: String },
    #[serde(rename_all = "camelCase")]
    AppDynamics { controller_url: String },
    #[serde(rename_all = "camelCase")]
    NewRelic { new_relic_url: String },
    #[serde(rename_all = "camelCase")]
    Prometheus { prometheus_url: String },
    #[serde(rename_all = "camelCase")]
    Elk { elk_url: String },
    #[serde(rename_all = "camelCase")]
    Splunk { splunk_url: String },
    #[serde(rename_all = "camelCase")]
    SumoLogic { sumo_url: String },
}

impl UrlConfig {
    pub fn url(&self) -> &str {
        match self {
            UrlConfig::DockerRegistry { registry_url: url }
            | UrlConfig::Artifactory {
                artifactory_url: url,
            }
            | UrlConfig::Nexus { nexus_url: url }
            | UrlConfig::Jenkins { jenkins_url: url }
            | UrlConfig::Bamboo { bamboo_url: url }
            | UrlConfig::AppDynamics {
                controller_url: url,
            }
            | UrlConfig::NewRelic { new_relic_url: url }
            | UrlConfig::Prometheus { prometheus_url: url }
            | UrlConfig::Elk { elk_url: url }
            | UrlConfig::Splunk { splunk_url: url }
            | UrlConfig::SumoLogic { sumo_url: url } => url,
        }
    }
}

/// Container cluster a task deploys to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cloudProvider")]
pub enum ClusterConfig {
    #[serde(rename = "AWS")]
    Aws { region: String },
    #[serde(rename = "GCP", rename_all = "camelCase")]
    Gcp {
        cluster_name: String,
        #[serde(default)]
        zone: Option<String>,
        /// API endpoint when already known
        #[serde(default)]
        master_url: Option<String>,
    },
    #[serde(rename = "AZURE", rename_all = "camelCase")]
    Azure {
        subscription_id: String,
        resource_group: String,
        cluster_name: String,
        #[serde(default)]
        master_url: Option<String>,
    },
    #[serde(rename = "DIRECT", rename_all = "camelCase")]
    Direct { master_url: String },
    /// Runs only on the named delegate
    #[serde(rename = "DELEGATE", rename_all = "camelCase")]
    Pinned { delegate_name: String },
}

impl ClusterConfig {
    /// Canonical criteria string for the cluster
    pub fn criteria(&self) -> String {
        match self {
            ClusterConfig::Aws { region } => format!("AWS:{}", region),
            ClusterConfig::Gcp { cluster_name, .. } => format!("GCP:{}", cluster_name),
            ClusterConfig::Azure {
                subscription_id,
                resource_group,
                cluster_name,
                ..
            } => format!("Azure:{}{}{}", subscription_id, resource_group, cluster_name),
            ClusterConfig::Direct { master_url } => master_url.clone(),
            ClusterConfig::Pinned { delegate_name } => format!("delegate-name: {}", delegate_name),
        }
    }
}

/// How to open a lightweight connection to a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "connectionType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostConnection {
    #[serde(rename_all = "camelCase")]
    Ssh {
        #[serde(default)]
        user: String,
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        password: Option<String>,
        #[serde(default)]
        key_path: Option<String>,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        passphrase: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Winrm {
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        use_ssl: bool,
    },
}

/// Single SSH host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshHostConfig {
    pub host: String,
    pub connection: HostConnection,
}

/// Deployment target hosts validated together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostListConfig {
    pub hosts: Vec<String>,
    pub connection: HostConnection,
}

/// Encryption backend of a secret manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncryptionType {
    Vault,
    Kms,
    GcpKms,
    AzureVault,
    CyberArk,
    Local,
}

/// Secret manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretManagerConfig {
    pub encryption_type: EncryptionType,
    /// Service endpoint (the Vault address for Vault)
    pub url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// KV engine mount, `secret` when unset
    #[serde(default)]
    pub secret_engine: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Vault server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    pub vault_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
}

/// Git repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitConfig {
    pub repo_url: String,
    #[serde(default)]
    pub branch: Option<String>,
}
