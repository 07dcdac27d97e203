//! In-process session fakes for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::DuplexStream;

use dlg_core::ConnectionError;

use crate::descriptor::SessionDescriptor;
use crate::session::{
    next_session_id, ByteStream, ChannelEvent, ExecChannel, RemoteSession, SessionConnector,
};

/// Output and exit status one exec channel will replay
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub chunks: Vec<Bytes>,
    pub exit_status: Option<u32>,
}

impl Script {
    pub fn new(chunks: &[&str], exit_status: u32) -> Self {
        Self {
            chunks: chunks
                .iter()
                .map(|c| Bytes::copy_from_slice(c.as_bytes()))
                .collect(),
            exit_status: Some(exit_status),
        }
    }
}

/// Session whose channels replay queued scripts
#[derive(Default)]
pub struct ScriptedSession {
    id: u64,
    pub alive: AtomicBool,
    pub disconnected: AtomicBool,
    scripts: Mutex<VecDeque<Script>>,
    streams: Mutex<VecDeque<DuplexStream>>,
    pub commands: Mutex<Vec<String>>,
    pub stdin: Arc<Mutex<Vec<u8>>>,
    pub channels_closed: Arc<AtomicUsize>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self {
            id: next_session_id(),
            alive: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn push_script(&self, script: Script) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn push_stream(&self, stream: DuplexStream) {
        self.streams.lock().unwrap().push_back(stream);
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn stdin(&self) -> Vec<u8> {
        self.stdin.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteSession for ScriptedSession {
    fn id(&self) -> u64 {
        self.id
    }

    async fn open_exec(
        &self,
        command: &str,
        _pty: bool,
    ) -> Result<Box<dyn ExecChannel>, ConnectionError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(ConnectionError::Channel("session dropped".to_string()));
        }
        self.commands.lock().unwrap().push(command.to_string());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Script {
                chunks: Vec::new(),
                exit_status: Some(0),
            });
        Ok(Box::new(ScriptedChannel {
            chunks: script.chunks.into(),
            exit_status: script.exit_status,
            stdin: Arc::clone(&self.stdin),
            closed: Arc::clone(&self.channels_closed),
            open: true,
        }))
    }

    async fn open_exec_stream(&self, command: &str) -> Result<Box<dyn ByteStream>, ConnectionError> {
        self.commands.lock().unwrap().push(command.to_string());
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .map(|s| Box::new(s) as Box<dyn ByteStream>)
            .ok_or_else(|| ConnectionError::Channel("no stream queued".to_string()))
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

struct ScriptedChannel {
    chunks: VecDeque<Bytes>,
    exit_status: Option<u32>,
    stdin: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicUsize>,
    open: bool,
}

#[async_trait]
impl ExecChannel for ScriptedChannel {
    async fn next_event(&mut self) -> ChannelEvent {
        match self.chunks.pop_front() {
            Some(chunk) => ChannelEvent::Data(chunk),
            None => ChannelEvent::Closed {
                exit_status: self.exit_status,
            },
        }
    }

    async fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.stdin.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Connector handing out [`ScriptedSession`]s and counting handshakes
#[derive(Default)]
pub struct FakeConnector {
    pub connects: AtomicUsize,
    pub refuse: AtomicBool,
    sessions: Mutex<Vec<Arc<ScriptedSession>>>,
    prepared: Mutex<VecDeque<Arc<ScriptedSession>>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the session the next connect returns
    pub fn prepare(&self, session: Arc<ScriptedSession>) {
        self.prepared.lock().unwrap().push_back(session);
    }

    /// Make every handshake to `host` take `delay`
    pub fn delay_host(&self, host: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(host.to_string(), delay);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn session(&self, index: usize) -> Arc<ScriptedSession> {
        Arc::clone(&self.sessions.lock().unwrap()[index])
    }
}

#[async_trait]
impl SessionConnector for FakeConnector {
    async fn connect(
        &self,
        descriptor: &SessionDescriptor,
    ) -> Result<Arc<dyn RemoteSession>, ConnectionError> {
        let delay = self.delays.lock().unwrap().get(descriptor.host()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(ConnectionError::ConnectionRefused(descriptor.address()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        let session = self
            .prepared
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Arc::new(ScriptedSession::new()));
        self.sessions.lock().unwrap().push(Arc::clone(&session));
        Ok(session)
    }
}
