//! Capability validators
//!
//! A closed set of validator kinds. Each kind derives its criteria from the
//! task parameters and knows how to check them; [`ValidatorKind::for_task_type`]
//! maps the dispatcher's task types onto kinds.

mod cluster;
mod connectivity;
mod git;
mod host_list;
mod secret;
mod ssh;
mod url_config;

pub use connectivity::is_http_url;

use std::fmt;

use serde::{Deserialize, Serialize};

use dlg_core::{DelegateId, ResultFragment, ValidationError};

use crate::context::ValidationContext;
use crate::params::TaskParameter;

/// Criteria of tasks without a connectivity precondition
pub const ALWAYS_TRUE_CRITERIA: &str = "ALWAYS_TRUE_CRITERIA";

/// Kind of target a validator checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidatorKind {
    /// Generic reachability of the first target found in the parameters
    Connectivity,
    /// Artifact servers, build servers, monitoring and log stores
    UrlConfig,
    /// Container clusters and pinned delegates
    Cluster,
    /// A single SSH host
    SshHost,
    SecretManager,
    Git,
    Vault,
    AlwaysTrue,
    /// Deployment hosts under one time budget
    HostList,
}

impl ValidatorKind {
    /// Validator kind for a dispatcher task type; unknown types use [`ValidatorKind::Connectivity`]
    pub fn for_task_type(task_type: &str) -> Self {
        match task_type.trim().to_ascii_uppercase().as_str() {
            "DOCKER_VALIDATE_ARTIFACT_SERVER"
            | "DOCKER_GET_BUILDS"
            | "ARTIFACTORY_COLLECTION"
            | "ARTIFACTORY_VALIDATE_ARTIFACT_SERVER"
            | "NEXUS_COLLECTION"
            | "NEXUS_VALIDATE_ARTIFACT_SERVER"
            | "JENKINS_COLLECTION"
            | "JENKINS_GET_BUILDS"
            | "JENKINS_VALIDATE_ARTIFACT_SERVER"
            | "BAMBOO_COLLECTION"
            | "APPDYNAMICS_CONFIGURATION_VALIDATE_TASK"
            | "APPDYNAMICS_COLLECT_METRIC_DATA"
            | "NEWRELIC_VALIDATE_CONFIGURATION_TASK"
            | "NEWRELIC_COLLECT_METRIC_DATA"
            | "PROMETHEUS_METRIC_DATA_PER_HOST"
            | "ELK_COLLECT_LOG_DATA"
            | "ELK_CONFIGURATION_VALIDATE_TASK"
            | "SPLUNK_COLLECT_LOG_DATA"
            | "SPLUNK_CONFIGURATION_VALIDATE_TASK"
            | "SUMO_COLLECT_LOG_DATA"
            | "SUMO_VALIDATE_CONFIGURATION_TASK" => ValidatorKind::UrlConfig,
            "K8S_COMMAND_TASK" | "CONTAINER_ACTIVE_SERVICE_COUNTS" | "CONTAINER_INFO"
            | "CONTROLLER_NAMES_WITH_LABELS" | "ECS_COMMAND_TASK" | "HELM_COMMAND_TASK" => {
                ValidatorKind::Cluster
            }
            "COMMAND" | "SSH_COMMAND_TASK" | "SCP_COMMAND_TASK" => ValidatorKind::SshHost,
            "HOST_VALIDATION" | "CONNECTIVITY_VALIDATION" => ValidatorKind::HostList,
            "SECRET_DECRYPT" | "BATCH_SECRET_DECRYPT" | "SECRET_DECRYPT_REF" => {
                ValidatorKind::SecretManager
            }
            "GIT_COMMAND" | "GIT_FETCH_FILES_TASK" => ValidatorKind::Git,
            "VAULT_GET_CHANGELOG" | "VAULT_RENEW_TOKEN" | "VAULT_LIST_ENGINES" => {
                ValidatorKind::Vault
            }
            "SHELL_SCRIPT_APPROVAL" | "SHELL_SCRIPT_PROVISION_TASK" | "CUSTOM_LOG_COLLECTION_TASK"
            | "TRIGGER_TASK" => ValidatorKind::AlwaysTrue,
            _ => ValidatorKind::Connectivity,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorKind::Connectivity => "CONNECTIVITY",
            ValidatorKind::UrlConfig => "URL_CONFIG",
            ValidatorKind::Cluster => "CLUSTER",
            ValidatorKind::SshHost => "SSH_HOST",
            ValidatorKind::SecretManager => "SECRET_MANAGER",
            ValidatorKind::Git => "GIT",
            ValidatorKind::Vault => "VAULT",
            ValidatorKind::AlwaysTrue => "ALWAYS_TRUE",
            ValidatorKind::HostList => "HOST_LIST",
        }
    }
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation attempt of a task on this delegate
#[derive(Debug, Clone)]
pub struct CapabilityValidator {
    pub delegate_id: DelegateId,
    pub account_id: String,
    pub kind: ValidatorKind,
    pub parameters: Vec<TaskParameter>,
}

impl CapabilityValidator {
    pub fn new(
        kind: ValidatorKind,
        delegate_id: impl Into<DelegateId>,
        account_id: impl Into<String>,
        parameters: Vec<TaskParameter>,
    ) -> Self {
        Self {
            delegate_id: delegate_id.into(),
            account_id: account_id.into(),
            kind,
            parameters,
        }
    }

    /// Criteria this validator checks, in order
    pub fn criteria(&self) -> Vec<String> {
        let params = self.parameters.as_slice();
        match self.kind {
            ValidatorKind::Connectivity => connectivity::criteria(params),
            ValidatorKind::UrlConfig => url_config::criteria(params),
            ValidatorKind::Cluster => cluster::criteria(params),
            ValidatorKind::SshHost => ssh::criteria(params),
            ValidatorKind::SecretManager => secret::secret_manager_criteria(params),
            ValidatorKind::Git => git::criteria(params),
            ValidatorKind::Vault => secret::vault_criteria(params),
            ValidatorKind::AlwaysTrue => vec![ALWAYS_TRUE_CRITERIA.to_string()],
            ValidatorKind::HostList => host_list::criteria(params),
        }
    }

    /// Check the criteria from this delegate
    pub async fn validate(
        &self,
        ctx: &ValidationContext,
    ) -> Result<Vec<ResultFragment>, ValidationError> {
        let params = self.parameters.as_slice();
        match self.kind {
            ValidatorKind::Connectivity => connectivity::validate(params, ctx).await,
            ValidatorKind::UrlConfig => url_config::validate(params, ctx).await,
            ValidatorKind::Cluster => cluster::validate(params, ctx).await,
            ValidatorKind::SshHost => ssh::validate(params, ctx).await,
            ValidatorKind::SecretManager => secret::validate_secret_manager(params, ctx).await,
            ValidatorKind::Git => git::validate(params, ctx).await,
            ValidatorKind::Vault => secret::validate_vault(params, ctx).await,
            ValidatorKind::AlwaysTrue => Ok(vec![ResultFragment::new(ALWAYS_TRUE_CRITERIA, true)]),
            ValidatorKind::HostList => host_list::validate(params, ctx).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Probe fakes shared by validator tests

    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use dlg_core::config::DelegateConfig;
    use dlg_core::{ConnectionError, ValidationError};
    use dlg_exec::SessionDescriptor;

    use crate::context::ValidationContext;
    use crate::params::ClusterConfig;
    use crate::probe::{ClusterResolver, HandshakeProbe, ReachabilityProbe, VaultReader};

    /// Counts calls; targets in `reachable` answer
    #[derive(Default)]
    pub struct FakeNetwork {
        pub reachable: Mutex<HashSet<String>>,
        pub calls: AtomicUsize,
        pub probed: Mutex<Vec<String>>,
        pub vault_status: Mutex<Option<u16>>,
    }

    impl FakeNetwork {
        pub fn reaching(targets: &[&str]) -> Arc<Self> {
            let network = Self::default();
            network
                .reachable
                .lock()
                .unwrap()
                .extend(targets.iter().map(|t| t.to_string()));
            Arc::new(network)
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn probed(&self) -> Vec<String> {
            self.probed.lock().unwrap().clone()
        }

        fn record(&self, target: String) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reachable = self.reachable.lock().unwrap().contains(&target);
            self.probed.lock().unwrap().push(target);
            reachable
        }
    }

    #[async_trait]
    impl ReachabilityProbe for FakeNetwork {
        async fn http_reachable(&self, url: &str) -> bool {
            self.record(url.to_string())
        }

        async fn tcp_reachable(&self, host: &str, port: u16) -> bool {
            self.record(format!("{}:{}", host, port))
        }
    }

    #[async_trait]
    impl VaultReader for FakeNetwork {
        async fn read_status(
            &self,
            url: &str,
            _token: &str,
            _namespace: Option<&str>,
        ) -> Result<u16, ValidationError> {
            self.record(url.to_string());
            self.vault_status
                .lock()
                .unwrap()
                .ok_or_else(|| ValidationError::Http("connection refused".to_string()))
        }
    }

    #[async_trait]
    impl ClusterResolver for FakeNetwork {
        async fn resolve_endpoint(&self, cluster: &ClusterConfig) -> Result<String, ValidationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("https://{}.k8s.example.com", cluster.criteria().replace(':', "-")))
        }
    }

    /// Per-host handshake behaviour
    #[derive(Debug, Clone, Copy)]
    pub enum HostBehaviour {
        Accept,
        RejectCredentials,
        Refuse,
    }

    /// Handshake fake with per-host outcome and delay
    #[derive(Default)]
    pub struct FakeHosts {
        pub hosts: Mutex<Vec<(String, HostBehaviour, Duration)>>,
        pub attempts: Mutex<Vec<String>>,
        pub descriptors: Mutex<Vec<SessionDescriptor>>,
    }

    impl FakeHosts {
        pub fn with(hosts: &[(&str, HostBehaviour, u64)]) -> Arc<Self> {
            let fake = Self::default();
            fake.hosts.lock().unwrap().extend(
                hosts
                    .iter()
                    .map(|(h, b, secs)| (h.to_string(), *b, Duration::from_secs(*secs))),
            );
            Arc::new(fake)
        }

        pub fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }

        async fn attempt(&self, host: &str) -> Result<(), ConnectionError> {
            self.attempts.lock().unwrap().push(host.to_string());
            let found = self
                .hosts
                .lock()
                .unwrap()
                .iter()
                .find(|(h, _, _)| h == host)
                .map(|(_, b, d)| (*b, *d));
            let (behaviour, delay) = found.unwrap_or((HostBehaviour::Refuse, Duration::ZERO));
            tokio::time::sleep(delay).await;
            match behaviour {
                HostBehaviour::Accept => Ok(()),
                HostBehaviour::RejectCredentials => Err(ConnectionError::AuthenticationFailed {
                    user: "deploy".to_string(),
                }),
                HostBehaviour::Refuse => Err(ConnectionError::ConnectionRefused(host.to_string())),
            }
        }
    }

    #[async_trait]
    impl HandshakeProbe for FakeHosts {
        async fn ssh_handshake(&self, descriptor: &SessionDescriptor) -> Result<(), ConnectionError> {
            self.descriptors.lock().unwrap().push(descriptor.clone());
            self.attempt(descriptor.host()).await
        }

        async fn winrm_connect(&self, host: &str, port: u16) -> Result<(), ConnectionError> {
            self.attempt(&format!("{}:{}", host, port)).await
        }
    }

    /// Context whose every probe is a fake
    pub fn context(network: Arc<FakeNetwork>, hosts: Arc<FakeHosts>) -> ValidationContext {
        let mut config = DelegateConfig::default();
        config.delegate.name = "delegate-east".to_string();
        config.delegate.region = Some("us-east-1".to_string());
        ValidationContext::from_config(&config)
            .unwrap()
            .with_reachability(network.clone())
            .with_vault(network.clone())
            .with_clusters(network)
            .with_handshake(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{context, FakeHosts, FakeNetwork};
    use super::*;
    use serde_json::json;

    fn params(values: serde_json::Value) -> Vec<TaskParameter> {
        serde_json::from_value(values).unwrap()
    }

    #[test]
    fn test_task_type_lookup() {
        assert_eq!(
            ValidatorKind::for_task_type("DOCKER_VALIDATE_ARTIFACT_SERVER"),
            ValidatorKind::UrlConfig
        );
        assert_eq!(ValidatorKind::for_task_type("k8s_command_task"), ValidatorKind::Cluster);
        assert_eq!(ValidatorKind::for_task_type("HOST_VALIDATION"), ValidatorKind::HostList);
        assert_eq!(
            ValidatorKind::for_task_type("SHELL_SCRIPT_APPROVAL"),
            ValidatorKind::AlwaysTrue
        );
        assert_eq!(
            ValidatorKind::for_task_type("SOMETHING_NEW"),
            ValidatorKind::Connectivity
        );
    }

    #[tokio::test]
    async fn test_registry_url_among_other_params() {
        let network = FakeNetwork::reaching(&["https://reg.example.com"]);
        let ctx = context(network.clone(), FakeHosts::with(&[]));
        let validator = CapabilityValidator::new(
            ValidatorKind::UrlConfig,
            "dlg-1",
            "acc",
            params(json!([
                {"timeout": 30},
                {"registryUrl": "https://reg.example.com", "username": "ci"},
                {"jenkinsUrl": "https://ci.example.com"}
            ])),
        );

        assert_eq!(validator.criteria(), vec!["https://reg.example.com"]);
        let fragments = validator.validate(&ctx).await.unwrap();
        assert_eq!(
            fragments,
            vec![ResultFragment::new("https://reg.example.com", true)]
        );
    }

    #[tokio::test]
    async fn test_always_true() {
        let network = FakeNetwork::reaching(&[]);
        let ctx = context(network.clone(), FakeHosts::with(&[]));
        let validator =
            CapabilityValidator::new(ValidatorKind::AlwaysTrue, "dlg-1", "acc", Vec::new());

        assert_eq!(validator.criteria(), vec![ALWAYS_TRUE_CRITERIA]);
        let fragments = validator.validate(&ctx).await.unwrap();
        assert_eq!(fragments, vec![ResultFragment::new(ALWAYS_TRUE_CRITERIA, true)]);
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_criteria_match_validated_criteria() {
        let network = FakeNetwork::reaching(&[]);
        let ctx = context(network.clone(), FakeHosts::with(&[]));
        let parameters = params(json!([
            {"repoUrl": "https://git.example.com/org/repo.git"},
            {"vaultUrl": "https://vault.example.com"},
            {"cloudProvider": "DELEGATE", "delegateName": "delegate-east"},
            {"encryptionType": "KMS", "url": "https://kms.us-east-1.amazonaws.com"},
            {"elkUrl": "https://elk.example.com"},
            {"host": "web-1", "connection": {"connectionType": "SSH", "user": "deploy"}},
            {"hosts": ["a", "b", "a"], "connection": {"connectionType": "WINRM"}}
        ]));

        for kind in [
            ValidatorKind::Connectivity,
            ValidatorKind::UrlConfig,
            ValidatorKind::Cluster,
            ValidatorKind::SshHost,
            ValidatorKind::SecretManager,
            ValidatorKind::Git,
            ValidatorKind::Vault,
            ValidatorKind::AlwaysTrue,
            ValidatorKind::HostList,
        ] {
            let validator = CapabilityValidator::new(kind, "dlg-1", "acc", parameters.clone());
            let criteria = validator.criteria();
            assert_eq!(criteria, validator.criteria(), "{} is not deterministic", kind);

            let fragments = validator.validate(&ctx).await.unwrap();
            for fragment in &fragments {
                assert!(
                    criteria.contains(&fragment.criteria),
                    "{} produced {} outside {:?}",
                    kind,
                    fragment.criteria,
                    criteria
                );
            }
        }
    }
}
