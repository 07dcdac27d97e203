//! SSH transport on russh
//!
//! Opens authenticated client sessions for a [`SessionDescriptor`], either
//! directly or through a bastion. A bastion hop binds a listener on
//! `127.0.0.1:0`, bridges its single accepted connection to a
//! `direct-tcpip` channel on the bastion session, and then runs the normal
//! handshake against the forwarded local port with the target's
//! credentials.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use russh::client::{self, Config, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::{KeyPair, PublicKey};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use dlg_core::ConnectionError;

use super::{
    next_session_id, ByteStream, ChannelEvent, ExecChannel, RemoteSession, SessionConnector,
};
use crate::descriptor::{KeySource, SessionAuth, SessionDescriptor};

/// Terminal type requested for command channels
const PTY_TERM: &str = "xterm";

/// Opens russh sessions
#[derive(Debug, Clone)]
pub struct RusshConnector {
    /// User for descriptors that name none
    default_user: String,
}

impl RusshConnector {
    /// Create a connector with a fallback login user
    pub fn new(default_user: impl Into<String>) -> Self {
        Self {
            default_user: default_user.into(),
        }
    }

    /// Connect, authenticate and immediately disconnect
    pub async fn handshake(&self, descriptor: &SessionDescriptor) -> Result<(), ConnectionError> {
        let session = self.connect(descriptor).await?;
        session.disconnect().await;
        Ok(())
    }

    fn user_for<'a>(&'a self, user: &'a str) -> &'a str {
        if user.is_empty() {
            &self.default_user
        } else {
            user
        }
    }

    /// TCP connect, SSH handshake and authentication against one hop
    async fn open(
        &self,
        host: &str,
        port: u16,
        user: &str,
        auth: &SessionAuth,
        timeout: Duration,
    ) -> Result<Handle<ClientHandler>, ConnectionError> {
        let credential = Credential::resolve(auth)?;
        let address = format!("{}:{}", host, port);

        tracing::debug!(address = %address, user, mechanism = auth.mechanism(), "Opening SSH session");

        let config = Arc::new(Config::default());
        let mut handle = tokio::time::timeout(
            timeout,
            client::connect(config, (host.to_string(), port), ClientHandler::new(address.clone())),
        )
        .await
        .map_err(|_| ConnectionError::Timeout(address.clone()))?
        .map_err(|e| classify_transport_error(&address, e))?;

        let authenticated = match credential {
            Credential::Password(password) => handle.authenticate_password(user, password).await,
            Credential::Key(key) => handle.authenticate_publickey(user, key).await,
        }
        .map_err(|e| ConnectionError::Transport(format!("{}: {}", address, e)))?;

        if !authenticated {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await;
            return Err(ConnectionError::AuthenticationFailed {
                user: user.to_string(),
            });
        }

        Ok(handle)
    }
}

#[async_trait]
impl SessionConnector for RusshConnector {
    async fn connect(
        &self,
        descriptor: &SessionDescriptor,
    ) -> Result<Arc<dyn RemoteSession>, ConnectionError> {
        let user = self.user_for(descriptor.user());
        let timeout = descriptor.connect_timeout();

        let Some(bastion) = descriptor.bastion() else {
            let handle = self
                .open(descriptor.host(), descriptor.port(), user, descriptor.auth(), timeout)
                .await?;
            return Ok(Arc::new(RusshSession::new(descriptor.host(), handle, None)));
        };

        let bastion_handle = Arc::new(
            self.open(
                &bastion.host,
                bastion.port,
                self.user_for(&bastion.user),
                &bastion.auth,
                timeout,
            )
            .await?,
        );

        let target_host = descriptor.host().to_string();
        let target_port = descriptor.port();
        let forward_handle = Arc::clone(&bastion_handle);
        let (local_port, forward) = match forward_local_port(
            descriptor.address(),
            move |peer| open_direct_tcpip(forward_handle, target_host, target_port, peer),
        )
        .await
        {
            Ok(forwarding) => forwarding,
            Err(e) => {
                disconnect_handle(&bastion_handle).await;
                return Err(e);
            }
        };

        tracing::debug!(
            bastion = %bastion.host,
            target = %descriptor.address(),
            local_port,
            "Forwarding through bastion"
        );

        match self
            .open("127.0.0.1", local_port, user, descriptor.auth(), timeout)
            .await
        {
            Ok(handle) => Ok(Arc::new(RusshSession::new(
                descriptor.host(),
                handle,
                Some(BastionHop {
                    handle: bastion_handle,
                    forward,
                }),
            ))),
            Err(e) => {
                forward.abort();
                disconnect_handle(&bastion_handle).await;
                Err(e)
            }
        }
    }
}

/// Resolved authentication material
enum Credential {
    Password(String),
    Key(Arc<KeyPair>),
}

impl Credential {
    fn resolve(auth: &SessionAuth) -> Result<Self, ConnectionError> {
        match auth {
            SessionAuth::Password { password } => Ok(Credential::Password(password.clone())),
            SessionAuth::Key { key, passphrase } => {
                let passphrase = passphrase.as_deref().filter(|p| !p.is_empty());
                let pair = match key {
                    KeySource::Path(path) => {
                        russh_keys::load_secret_key(path, passphrase).map_err(|e| {
                            ConnectionError::KeyLoad {
                                source_name: path.display().to_string(),
                                message: e.to_string(),
                            }
                        })?
                    }
                    KeySource::Pem(pem) => {
                        russh_keys::decode_secret_key(pem, passphrase).map_err(|e| {
                            ConnectionError::KeyLoad {
                                source_name: "inline key".to_string(),
                                message: e.to_string(),
                            }
                        })?
                    }
                };
                Ok(Credential::Key(Arc::new(pair)))
            }
            SessionAuth::Kerberos { .. } => Err(ConnectionError::UnsupportedAuth(
                auth.mechanism().to_string(),
            )),
        }
    }
}

fn classify_transport_error(address: &str, error: russh::Error) -> ConnectionError {
    match error {
        russh::Error::IO(io) => ConnectionError::ConnectionRefused(format!("{}: {}", address, io)),
        other => ConnectionError::Transport(format!("{}: {}", address, other)),
    }
}

async fn disconnect_handle(handle: &Handle<ClientHandler>) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "closing", "en")
        .await
    {
        tracing::debug!("Disconnect failed: {}", e);
    }
}

/// Bind a local port whose first connection is bridged to a stream from `open`.
///
/// `open` gets the accepted peer's address and returns the far side of the
/// bridge, a `direct-tcpip` channel in production.
async fn forward_local_port<F, Fut, S>(
    target: String,
    open: F,
) -> Result<(u16, JoinHandle<()>), ConnectionError>
where
    F: FnOnce(SocketAddr) -> Fut + Send + 'static,
    Fut: Future<Output = Result<S, ConnectionError>> + Send + 'static,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| ConnectionError::Tunnel(format!("Failed to bind local port: {}", e)))?;
    let local_port = listener
        .local_addr()
        .map_err(|e| ConnectionError::Tunnel(e.to_string()))?
        .port();

    let forward = tokio::spawn(async move {
        let (mut local, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("Bastion forward accept failed: {}", e);
                return;
            }
        };

        let mut remote = match open(peer).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(target = %target, "Bastion refused forwarding: {}", e);
                return;
            }
        };

        if let Err(e) = tokio::io::copy_bidirectional(&mut local, &mut remote).await {
            tracing::debug!(target = %target, "Bastion forward ended: {}", e);
        }
    });

    Ok((local_port, forward))
}

/// Open a `direct-tcpip` channel to the target on the bastion session
async fn open_direct_tcpip(
    bastion: Arc<Handle<ClientHandler>>,
    target_host: String,
    target_port: u16,
    peer: SocketAddr,
) -> Result<impl AsyncRead + AsyncWrite + Unpin + Send, ConnectionError> {
    bastion
        .channel_open_direct_tcpip(
            target_host,
            u32::from(target_port),
            peer.ip().to_string(),
            u32::from(peer.port()),
        )
        .await
        .map(Channel::into_stream)
        .map_err(|e| ConnectionError::Tunnel(e.to_string()))
}

struct BastionHop {
    handle: Arc<Handle<ClientHandler>>,
    forward: JoinHandle<()>,
}

/// An authenticated russh session
pub struct RusshSession {
    id: u64,
    host: String,
    handle: Handle<ClientHandler>,
    bastion: Option<BastionHop>,
}

impl RusshSession {
    fn new(host: &str, handle: Handle<ClientHandler>, bastion: Option<BastionHop>) -> Self {
        let id = next_session_id();
        tracing::debug!(session = id, host, "SSH session established");
        Self {
            id,
            host: host.to_string(),
            handle,
            bastion,
        }
    }

    async fn open_channel(&self) -> Result<Channel<Msg>, ConnectionError> {
        if self.handle.is_closed() {
            return Err(ConnectionError::Channel(format!(
                "session to {} is closed",
                self.host
            )));
        }
        self.handle
            .channel_open_session()
            .await
            .map_err(|e| ConnectionError::Channel(e.to_string()))
    }
}

#[async_trait]
impl RemoteSession for RusshSession {
    fn id(&self) -> u64 {
        self.id
    }

    async fn open_exec(
        &self,
        command: &str,
        pty: bool,
    ) -> Result<Box<dyn ExecChannel>, ConnectionError> {
        let channel = self.open_channel().await?;

        if pty {
            channel
                .request_pty(false, PTY_TERM, 80, 24, 0, 0, &[])
                .await
                .map_err(|e| ConnectionError::Channel(format!("pty request failed: {}", e)))?;
        }

        channel
            .exec(true, command)
            .await
            .map_err(|e| ConnectionError::Channel(format!("exec failed: {}", e)))?;

        Ok(Box::new(RusshExecChannel {
            channel,
            exit_status: None,
            closed: false,
        }))
    }

    async fn open_exec_stream(&self, command: &str) -> Result<Box<dyn ByteStream>, ConnectionError> {
        let channel = self.open_channel().await?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| ConnectionError::Channel(format!("exec failed: {}", e)))?;
        Ok(Box::new(channel.into_stream()))
    }

    async fn disconnect(&self) {
        tracing::debug!(session = self.id, host = %self.host, "Disconnecting SSH session");
        disconnect_handle(&self.handle).await;
        if let Some(bastion) = &self.bastion {
            bastion.forward.abort();
            disconnect_handle(&bastion.handle).await;
        }
    }
}

/// Exec channel on a russh session
struct RusshExecChannel {
    channel: Channel<Msg>,
    exit_status: Option<u32>,
    closed: bool,
}

#[async_trait]
impl ExecChannel for RusshExecChannel {
    async fn next_event(&mut self) -> ChannelEvent {
        while !self.closed {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    return ChannelEvent::Data(Bytes::copy_from_slice(&data));
                }
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    return ChannelEvent::Data(Bytes::copy_from_slice(&data));
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    self.exit_status = Some(exit_status);
                }
                Some(ChannelMsg::Close) | None => {
                    self.closed = true;
                }
                Some(_) => {}
            }
        }
        ChannelEvent::Closed {
            exit_status: self.exit_status,
        }
    }

    async fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.channel
            .data(data)
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::BrokenPipe, e.to_string()))
    }

    async fn close(&mut self) {
        if !self.closed {
            let _ = self.channel.close().await;
            self.closed = true;
        }
    }
}

/// SSH client handler
pub struct ClientHandler {
    /// `host:port` being connected, for logging
    address: String,
}

impl ClientHandler {
    fn new(address: String) -> Self {
        Self { address }
    }
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    /// Host keys are accepted; the fingerprint is logged for audit.
    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!(
            address = %self.address,
            "Server host key: {}",
            server_public_key.fingerprint()
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kerberos_is_unsupported() {
        let auth = SessionAuth::Kerberos {
            principal: "deploy".to_string(),
            realm: "EXAMPLE.COM".to_string(),
            ticket_path: None,
        };
        assert!(matches!(
            Credential::resolve(&auth),
            Err(ConnectionError::UnsupportedAuth(_))
        ));
    }

    #[test]
    fn test_missing_key_file_is_key_load_error() {
        let auth = SessionAuth::key_file("/nonexistent/dlg/id_rsa", None);
        let err = match Credential::resolve(&auth) {
            Err(e) => e,
            Ok(_) => panic!("Expected key load failure"),
        };
        assert!(err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_connect_refused_is_not_auth_failure() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let descriptor = SessionDescriptor::builder("exec-1", "127.0.0.1")
            .port(port)
            .user("deploy")
            .auth(SessionAuth::password("secret"))
            .connect_timeout(Duration::from_secs(5))
            .build();

        let err = RusshConnector::new("deploy")
            .handshake(&descriptor)
            .await
            .unwrap_err();
        assert!(!err.is_auth_failure());
    }

    #[tokio::test]
    async fn test_forwarded_port_bridges_to_target() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let (far, mut target) = tokio::io::duplex(64);
        let (port, forward) = forward_local_port("db-1:22".to_string(), move |_peer| async move {
            Ok::<_, ConnectionError>(far)
        })
        .await
        .unwrap();

        let mut local = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        local.write_all(b"SSH-2.0-client\r\n").await.unwrap();
        let mut greeting = [0u8; 16];
        target.read_exact(&mut greeting).await.unwrap();
        assert_eq!(&greeting, b"SSH-2.0-client\r\n");

        target.write_all(b"SSH-2.0-server\r\n").await.unwrap();
        local.read_exact(&mut greeting).await.unwrap();
        assert_eq!(&greeting, b"SSH-2.0-server\r\n");

        drop(target);
        let mut rest = Vec::new();
        local.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
        drop(local);
        forward.await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_forward_closes_local_connection() {
        use tokio::io::AsyncReadExt;

        let (port, forward) = forward_local_port("db-1:22".to_string(), |_peer| async {
            Err::<tokio::io::DuplexStream, _>(ConnectionError::Tunnel(
                "administratively prohibited".to_string(),
            ))
        })
        .await
        .unwrap();

        let mut local = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        let mut buf = Vec::new();
        assert_eq!(local.read_to_end(&mut buf).await.unwrap(), 0);
        forward.await.unwrap();
    }
}
