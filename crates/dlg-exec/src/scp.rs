//! Single-file push over an `scp -t` sink
//!
//! The exchange on the exec channel is:
//!
//! 1. sink sends an ack once it is ready
//! 2. we send `C0644 <size> <name>\n`, sink acks
//! 3. we send exactly `<size>` raw bytes followed by one NUL, sink acks
//!
//! Any non-zero ack aborts the transfer with the sink's message.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Framed;

use dlg_protocol::{ProtocolError, ScpCodec, ScpMessage};

use crate::error::ExecError;

/// Source of the one file sent by a transfer
#[async_trait]
pub trait FileProvider: Send + Sync {
    /// Name the file gets in the destination directory
    fn name(&self) -> &str;

    /// Exact number of bytes [`FileProvider::open`] will produce
    fn size(&self) -> u64;

    /// Open the content for reading
    async fn open(&self) -> io::Result<Box<dyn AsyncRead + Unpin + Send>>;
}

/// Serves a file from the delegate's disk
#[derive(Debug, Clone)]
pub struct LocalFileProvider {
    path: PathBuf,
    name: String,
    size: u64,
}

impl LocalFileProvider {
    /// Stat a local file; the remote name is its file name
    pub async fn new(path: impl AsRef<Path>) -> Result<Self, ExecError> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(ExecError::InvalidSource(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ExecError::InvalidSource(path.display().to_string()))?;
        Ok(Self {
            path,
            name,
            size: metadata.len(),
        })
    }

    /// Send under a different remote name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl FileProvider for LocalFileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn open(&self) -> io::Result<Box<dyn AsyncRead + Unpin + Send>> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }
}

/// Serves an in-memory buffer
#[derive(Debug, Clone)]
pub struct BytesFileProvider {
    name: String,
    data: Bytes,
}

impl BytesFileProvider {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

#[async_trait]
impl FileProvider for BytesFileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn open(&self) -> io::Result<Box<dyn AsyncRead + Unpin + Send>> {
        Ok(Box::new(io::Cursor::new(self.data.clone())))
    }
}

async fn expect_ack<S>(framed: &mut Framed<S, ScpCodec>) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match framed.next().await {
        Some(Ok(ack)) => ack.into_result(),
        Some(Err(e)) => Err(e),
        None => Err(ProtocolError::UnexpectedEof),
    }
}

/// Push one file through a stream connected to `scp -t`. Returns bytes sent.
pub async fn push_file<S>(stream: S, provider: &dyn FileProvider) -> Result<u64, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let size = provider.size();
    let control = ScpMessage::file(provider.name(), size)?;

    let mut framed = Framed::new(stream, ScpCodec::new());
    expect_ack(&mut framed).await?;

    framed.send(control).await?;
    expect_ack(&mut framed).await?;

    let reader = provider.open().await?;
    let sent = {
        let stream = framed.get_mut();
        let sent = tokio::io::copy(&mut reader.take(size), stream).await?;
        stream.flush().await?;
        sent
    };
    if sent != size {
        return Err(ProtocolError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("source produced {} of {} bytes", sent, size),
        )));
    }

    framed.send(ScpMessage::EndOfFile).await?;
    expect_ack(&mut framed).await?;

    if let Err(e) = framed.get_mut().shutdown().await {
        tracing::debug!("Closing scp stream: {}", e);
    }
    Ok(sent)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_delivers_exact_bytes() {
        let payload: Vec<u8> = (0..70_000u32).map(|i| (i % 251) as u8).collect();
        let provider = BytesFileProvider::new("app.tar", payload.clone());
        let (client, server) = tokio::io::duplex(1024);

        let sink = tokio::spawn(sink::run(server, None));
        let sent = push_file(client, &provider).await.unwrap();
        let received = sink.await.unwrap();

        assert_eq!(sent, payload.len() as u64);
        assert_eq!(received.control, format!("C0644 {} app.tar\n", payload.len()));
        assert_eq!(received.data, payload);
    }

    #[tokio::test]
    async fn test_empty_file() {
        let provider = BytesFileProvider::new("empty", Bytes::new());
        let (client, server) = tokio::io::duplex(64);

        let sink = tokio::spawn(sink::run(server, None));
        assert_eq!(push_file(client, &provider).await.unwrap(), 0);
        assert!(sink.await.unwrap().data.is_empty());
    }

    #[tokio::test]
    async fn test_error_ack_surfaces_remote_message() {
        let provider = BytesFileProvider::new("app.tar", &b"data"[..]);
        let (client, server) = tokio::io::duplex(64);

        let sink = tokio::spawn(sink::run(
            server,
            Some("scp: /opt/app/app.tar: Permission denied"),
        ));
        let err = push_file(client, &provider).await.unwrap_err();
        sink.await.unwrap();

        match err {
            ProtocolError::Remote(message) => {
                assert_eq!(message, "scp: /opt/app/app.tar: Permission denied")
            }
            other => panic!("Expected remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sink_closing_early_is_eof() {
        let provider = BytesFileProvider::new("a", &b"x"[..]);
        let (client, server) = tokio::io::duplex(64);
        drop(server);

        let err = push_file(client, &provider).await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedEof | ProtocolError::Io(_)));
    }

    #[tokio::test]
    async fn test_local_provider_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("build.zip");
        tokio::fs::write(&path, b"zipdata").await.unwrap();

        let provider = LocalFileProvider::new(&path).await.unwrap();
        assert_eq!(provider.name(), "build.zip");
        assert_eq!(provider.size(), 7);

        assert!(LocalFileProvider::new(dir.path()).await.is_err());
    }
}
