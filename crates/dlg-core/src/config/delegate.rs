//! Delegate runtime configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Default ceiling on output read from a single remote command (1 GiB)
pub const DEFAULT_MAX_OUTPUT_BYTES: u64 = 1024 * 1024 * 1024;

/// Root configuration for a delegate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegateConfig {
    /// Identity of this delegate
    pub delegate: DelegateSection,
    /// Capability validation tuning
    pub validation: ValidationSection,
    /// Remote shell execution tuning
    pub remote: RemoteSection,
    /// Local script execution
    pub script: ScriptSection,
}

/// Who this delegate is and where it runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegateSection {
    /// Delegate ID assigned by the control plane
    pub id: String,

    /// Delegate name, matched by pinned-delegate criteria
    pub name: String,

    /// Account this delegate belongs to
    pub account_id: String,

    /// Cloud region the delegate itself runs in (e.g. `us-east-1`)
    pub region: Option<String>,
}

impl Default for DelegateSection {
    fn default() -> Self {
        let name = gethostname::gethostname().to_string_lossy().into_owned();
        Self {
            id: name.clone(),
            name,
            account_id: String::new(),
            region: None,
        }
    }
}

/// Capability validation tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSection {
    /// Timeout for a single HTTP reachability probe
    #[serde(with = "duration_secs")]
    pub http_timeout: Duration,

    /// Timeout for a single TCP connect probe
    #[serde(with = "duration_secs")]
    pub tcp_timeout: Duration,

    /// Timeout for a single SSH handshake probe
    #[serde(with = "duration_secs")]
    pub ssh_timeout: Duration,

    /// Wall-clock ceiling for a whole host-list validation
    #[serde(with = "duration_secs")]
    pub host_list_budget: Duration,

    /// Secret path read when validating a Vault-backed secret manager
    pub vault_validation_path: String,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(15),
            tcp_timeout: Duration::from_secs(10),
            ssh_timeout: Duration::from_secs(15),
            host_list_budget: Duration::from_secs(30),
            vault_validation_path: "delegate-validation".to_string(),
        }
    }
}

/// Remote shell execution tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    /// Connect + handshake timeout for new sessions
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Time allowed for the liveness probe on a cached session
    #[serde(with = "duration_secs")]
    pub liveness_timeout: Duration,

    /// Interval between polls of a running command's output
    pub poll_interval_ms: u64,

    /// Ceiling on bytes read from a single command
    pub max_output_bytes: u64,

    /// User for sessions whose descriptor names none
    pub default_user: String,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            liveness_timeout: Duration::from_secs(10),
            poll_interval_ms: 1000,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            default_user: whoami::username(),
        }
    }
}

impl RemoteSection {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Local script execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSection {
    /// Parent of the per-execution working directories
    pub working_root: PathBuf,

    /// Interpreter for shell scripts
    pub shell: String,

    /// Executable used to run PowerShell scripts
    pub powershell: String,
}

impl Default for ScriptSection {
    fn default() -> Self {
        Self {
            working_root: std::env::temp_dir().join("delegate-runtime"),
            shell: "/bin/bash".to_string(),
            powershell: "pwsh".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DelegateConfig::default();
        assert_eq!(config.validation.host_list_budget, Duration::from_secs(30));
        assert_eq!(config.remote.max_output_bytes, 1 << 30);
        assert_eq!(config.remote.poll_interval(), Duration::from_secs(1));
        assert!(!config.delegate.name.is_empty());
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let remote = RemoteSection {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert_eq!(remote.poll_interval(), Duration::from_millis(1));
    }
}
