//! Session cache
//!
//! One live session per `executionId~host`. A cached entry is probed with a
//! no-op command before reuse and replaced when the probe fails. Entries
//! are only removed by [`SessionCache::evict`]; there is no idle expiry.
//!
//! Acquisition is serialized per key only, so a slow handshake to one host
//! never holds up another host or execution.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::Mutex;

use dlg_core::ConnectionError;

use super::{ChannelEvent, RemoteSession, SessionConnector};
use crate::descriptor::{cache_key, SessionDescriptor};

/// Command run on a cached session to prove it still works
pub const LIVENESS_COMMAND: &str = "true";

/// Keyed store of live sessions
pub struct SessionCache {
    sessions: DashMap<String, Arc<dyn RemoteSession>>,
    /// Serializes get-or-create-or-replace for one key
    acquiring: DashMap<String, Arc<Mutex<()>>>,
    connector: Arc<dyn SessionConnector>,
    liveness_timeout: Duration,
}

impl SessionCache {
    /// Create an empty cache over a connector
    pub fn new(connector: Arc<dyn SessionConnector>, liveness_timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            acquiring: DashMap::new(),
            connector,
            liveness_timeout,
        }
    }

    /// Return the live session for the descriptor, connecting or replacing as needed
    pub async fn get_or_connect(
        &self,
        descriptor: &SessionDescriptor,
    ) -> Result<Arc<dyn RemoteSession>, ConnectionError> {
        let key = descriptor.cache_key();
        let lock = self.key_lock(&key);
        let _guard = lock.lock().await;

        let cached = self.sessions.get(&key).map(|entry| Arc::clone(entry.value()));

        let Some(stale) = cached else {
            let session = self.connector.connect(descriptor).await?;
            tracing::debug!(key = %key, session = session.id(), "Cached new session");
            self.sessions.insert(key, Arc::clone(&session));
            return Ok(session);
        };

        if self.is_alive(stale.as_ref()).await {
            return Ok(stale);
        }

        tracing::info!(key = %key, session = stale.id(), "Cached session failed liveness check, reconnecting");
        stale.disconnect().await;

        let fresh = match self.connector.connect(descriptor).await {
            Ok(session) => session,
            Err(e) => {
                self.sessions
                    .remove_if(&key, |_, current| current.id() == stale.id());
                return Err(e);
            }
        };

        // Swap only if the entry still holds the session that failed.
        let (winner, loser) = match self.sessions.entry(key) {
            Entry::Occupied(mut entry) if entry.get().id() == stale.id() => {
                entry.insert(Arc::clone(&fresh));
                (fresh, None)
            }
            Entry::Occupied(entry) => (Arc::clone(entry.get()), Some(fresh)),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&fresh));
                (fresh, None)
            }
        };
        if let Some(loser) = loser {
            loser.disconnect().await;
        }
        Ok(winner)
    }

    /// Remove and disconnect the session for an execution on a host
    pub async fn evict(&self, execution_id: &str, host: &str) -> bool {
        let key = cache_key(execution_id, host);
        self.acquiring
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        match self.sessions.remove(&key) {
            Some((_, session)) => {
                tracing::debug!(key = %key, session = session.id(), "Evicting session");
                session.disconnect().await;
                true
            }
            None => false,
        }
    }

    /// Disconnect every cached session
    pub async fn evict_all(&self) {
        let keys: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            if let Some((_, session)) = self.sessions.remove(&key) {
                session.disconnect().await;
            }
        }
        self.acquiring.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    pub fn contains(&self, execution_id: &str, host: &str) -> bool {
        self.sessions.contains_key(&cache_key(execution_id, host))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.acquiring
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    async fn is_alive(&self, session: &dyn RemoteSession) -> bool {
        let probe = async {
            let mut channel = session.open_exec(LIVENESS_COMMAND, false).await?;
            let status = loop {
                if let ChannelEvent::Closed { exit_status } = channel.next_event().await {
                    break exit_status;
                }
            };
            channel.close().await;
            Ok::<_, ConnectionError>(status)
        };

        match tokio::time::timeout(self.liveness_timeout, probe).await {
            Ok(Ok(status)) => status.map_or(true, |code| code == 0),
            Ok(Err(e)) => {
                tracing::debug!(session = session.id(), "Liveness probe failed: {}", e);
                false
            }
            Err(_) => {
                tracing::debug!(session = session.id(), "Liveness probe timed out");
                false
            }
        }
    }
}
