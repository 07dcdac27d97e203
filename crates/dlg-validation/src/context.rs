//! Everything a validator needs from the delegate it runs on

use std::sync::Arc;

use dlg_core::config::{DelegateConfig, DelegateSection, ValidationSection};
use dlg_core::ValidationError;

use crate::probe::{
    ClusterResolver, ConfiguredClusterResolver, HandshakeProbe, NetworkProbe, ReachabilityProbe,
    SshHandshakeProbe, VaultReader,
};

/// Delegate identity, tuning and probes shared by validators
#[derive(Clone)]
pub struct ValidationContext {
    pub delegate: DelegateSection,
    pub settings: ValidationSection,
    /// Login user for host handshakes that name none
    pub default_user: String,
    pub reachability: Arc<dyn ReachabilityProbe>,
    pub handshake: Arc<dyn HandshakeProbe>,
    pub vault: Arc<dyn VaultReader>,
    pub clusters: Arc<dyn ClusterResolver>,
}

impl ValidationContext {
    /// Context with the network-backed probes
    pub fn from_config(config: &DelegateConfig) -> Result<Self, ValidationError> {
        let network = Arc::new(NetworkProbe::from_config(&config.validation)?);
        Ok(Self {
            delegate: config.delegate.clone(),
            settings: config.validation.clone(),
            default_user: config.remote.default_user.clone(),
            reachability: Arc::clone(&network) as Arc<dyn ReachabilityProbe>,
            handshake: Arc::new(SshHandshakeProbe::new(
                config.remote.default_user.clone(),
                config.validation.tcp_timeout,
            )),
            vault: network,
            clusters: Arc::new(ConfiguredClusterResolver),
        })
    }

    pub fn with_reachability(mut self, probe: Arc<dyn ReachabilityProbe>) -> Self {
        self.reachability = probe;
        self
    }

    pub fn with_handshake(mut self, probe: Arc<dyn HandshakeProbe>) -> Self {
        self.handshake = probe;
        self
    }

    pub fn with_vault(mut self, reader: Arc<dyn VaultReader>) -> Self {
        self.vault = reader;
        self
    }

    pub fn with_clusters(mut self, resolver: Arc<dyn ClusterResolver>) -> Self {
        self.clusters = resolver;
        self
    }
}
