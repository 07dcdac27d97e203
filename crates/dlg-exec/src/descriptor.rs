//! Per-execution connection descriptor

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default SSH port
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default connect + handshake timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a private key comes from
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Key file on the delegate's disk
    Path(PathBuf),
    /// PEM/OpenSSH encoded key material
    Pem(String),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            KeySource::Pem(_) => f.write_str("Pem(<redacted>)"),
        }
    }
}

/// Authentication material for one SSH hop
#[derive(Clone, PartialEq, Eq)]
pub enum SessionAuth {
    /// Password authentication
    Password { password: String },
    /// Public-key authentication
    Key {
        key: KeySource,
        passphrase: Option<String>,
    },
    /// Kerberos (GSSAPI) with an optional credential cache
    Kerberos {
        principal: String,
        realm: String,
        ticket_path: Option<PathBuf>,
    },
}

impl SessionAuth {
    pub fn password(password: impl Into<String>) -> Self {
        SessionAuth::Password {
            password: password.into(),
        }
    }

    pub fn key_file(path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        SessionAuth::Key {
            key: KeySource::Path(path.into()),
            passphrase,
        }
    }

    /// Short name used in log lines
    pub fn mechanism(&self) -> &'static str {
        match self {
            SessionAuth::Password { .. } => "password",
            SessionAuth::Key { .. } => "publickey",
            SessionAuth::Kerberos { .. } => "gssapi-with-mic",
        }
    }
}

impl fmt::Debug for SessionAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionAuth::Password { .. } => f.write_str("Password(<redacted>)"),
            SessionAuth::Key { key, passphrase } => f
                .debug_struct("Key")
                .field("key", key)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
            SessionAuth::Kerberos {
                principal,
                realm,
                ticket_path,
            } => f
                .debug_struct("Kerberos")
                .field("principal", principal)
                .field("realm", realm)
                .field("ticket_path", ticket_path)
                .finish(),
        }
    }
}

/// Jump host the target is reached through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BastionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: SessionAuth,
}

/// Connection details for one execution against one host.
///
/// Immutable once built.
#[derive(Clone)]
pub struct SessionDescriptor {
    account_id: String,
    app_id: String,
    execution_id: String,
    command_unit_name: String,
    host: String,
    port: u16,
    user: String,
    auth: SessionAuth,
    bastion: Option<BastionConfig>,
    connect_timeout: Duration,
    working_directory: Option<String>,
    sudo_password: Option<String>,
}

impl SessionDescriptor {
    /// Start building a descriptor for an execution on a host
    pub fn builder(
        execution_id: impl Into<String>,
        host: impl Into<String>,
    ) -> SessionDescriptorBuilder {
        SessionDescriptorBuilder::new(execution_id.into(), host.into())
    }

    /// Key of the session cache entry serving this descriptor
    pub fn cache_key(&self) -> String {
        cache_key(&self.execution_id, &self.host)
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    pub fn command_unit_name(&self) -> &str {
        &self.command_unit_name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn auth(&self) -> &SessionAuth {
        &self.auth
    }

    pub fn bastion(&self) -> Option<&BastionConfig> {
        self.bastion.as_ref()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn working_directory(&self) -> Option<&str> {
        self.working_directory.as_deref()
    }

    pub fn sudo_password(&self) -> Option<&str> {
        self.sudo_password.as_deref()
    }

    /// `host:port` of the target
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for SessionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDescriptor")
            .field("execution_id", &self.execution_id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("auth", &self.auth)
            .field("bastion", &self.bastion)
            .finish_non_exhaustive()
    }
}

/// Cache key for an execution on a host: `<executionId>~<host>`, trimmed
pub fn cache_key(execution_id: &str, host: &str) -> String {
    format!("{}~{}", execution_id.trim(), host.trim())
}

/// Builder for [`SessionDescriptor`]
#[derive(Debug)]
pub struct SessionDescriptorBuilder {
    inner: SessionDescriptor,
}

impl SessionDescriptorBuilder {
    fn new(execution_id: String, host: String) -> Self {
        Self {
            inner: SessionDescriptor {
                account_id: String::new(),
                app_id: String::new(),
                execution_id,
                command_unit_name: String::new(),
                host,
                port: DEFAULT_SSH_PORT,
                user: String::new(),
                auth: SessionAuth::password(""),
                bastion: None,
                connect_timeout: DEFAULT_CONNECT_TIMEOUT,
                working_directory: None,
                sudo_password: None,
            },
        }
    }

    pub fn account_id(mut self, account_id: impl Into<String>) -> Self {
        self.inner.account_id = account_id.into();
        self
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.inner.app_id = app_id.into();
        self
    }

    pub fn command_unit_name(mut self, name: impl Into<String>) -> Self {
        self.inner.command_unit_name = name.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.inner.port = port;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.inner.user = user.into();
        self
    }

    pub fn auth(mut self, auth: SessionAuth) -> Self {
        self.inner.auth = auth;
        self
    }

    pub fn bastion(mut self, bastion: BastionConfig) -> Self {
        self.inner.bastion = Some(bastion);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.inner.connect_timeout = timeout;
        self
    }

    pub fn working_directory(mut self, dir: impl Into<String>) -> Self {
        self.inner.working_directory = Some(dir.into());
        self
    }

    pub fn sudo_password(mut self, password: impl Into<String>) -> Self {
        self.inner.sudo_password = Some(password.into());
        self
    }

    pub fn build(self) -> SessionDescriptor {
        self.inner
    }
}
