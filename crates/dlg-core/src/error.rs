//! Core error types for delegate-runtime

use dlg_protocol::ProtocolError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the delegate runtime
#[derive(Error, Debug)]
pub enum DlgError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while opening or using a remote shell session
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The server rejected the supplied credentials
    #[error("Authentication failed for user {user}")]
    AuthenticationFailed { user: String },

    /// TCP connection could not be established
    #[error("Connection refused: {0}")]
    ConnectionRefused(String),

    /// Connect or handshake did not finish in time
    #[error("Connection timed out: {0}")]
    Timeout(String),

    /// Private key could not be read or decrypted
    #[error("Failed to load private key {source_name}: {message}")]
    KeyLoad {
        source_name: String,
        message: String,
    },

    /// The descriptor asks for an authentication mechanism the transport lacks
    #[error("Unsupported authentication: {0}")]
    UnsupportedAuth(String),

    /// Bastion hop or port forwarding failed
    #[error("Tunnel error: {0}")]
    Tunnel(String),

    /// Channel could not be opened or a request on it was refused
    #[error("Channel error: {0}")]
    Channel(String),

    /// Any other SSH protocol failure
    #[error("SSH error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Whether the network path worked and only the credential was rejected
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ConnectionError::AuthenticationFailed { .. } | ConnectionError::KeyLoad { .. }
        )
    }

    /// Message suitable for an execution log line
    pub fn human_message(&self) -> String {
        match self {
            ConnectionError::AuthenticationFailed { .. } => "Invalid credentials".to_string(),
            ConnectionError::ConnectionRefused(target) => {
                format!("Unable to connect to remote host {}", target)
            }
            ConnectionError::Timeout(target) => format!("Connection timed out: {}", target),
            ConnectionError::KeyLoad { .. } => {
                "Invalid key or passphrase for SSH key authentication".to_string()
            }
            ConnectionError::UnsupportedAuth(mechanism) => {
                format!("Authentication mechanism not supported: {}", mechanism)
            }
            ConnectionError::Tunnel(message) => {
                format!("Unable to reach host through bastion: {}", message)
            }
            ConnectionError::Channel(message) => {
                format!("Unable to open remote channel: {}", message)
            }
            ConnectionError::Transport(message) => format!("SSH error: {}", message),
        }
    }
}

/// Errors raised by a capability validator
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The task parameters lack the config this validator needs
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// The criteria string cannot be probed
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    /// A side lookup (cluster endpoint, vault) failed
    #[error("Lookup failed: {0}")]
    Lookup(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Connection error
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
