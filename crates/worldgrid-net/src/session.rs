//! Active session tracking.
//!
//! Every accepted connection holds a slot in the [`SessionRegistry`] for its
//! lifetime. The registry enforces the node's session limit and fans
//! broadcast packets out to every connection's outbound queue.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// Process-unique connection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Handle to one connected client.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queue a packet for this client. Returns false once the connection
    /// has gone away.
    pub fn send(&self, packet: Vec<u8>) -> bool {
        self.outbound.send(packet).is_ok()
    }
}

/// Bounded set of live sessions, cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
    next_id: Arc<AtomicU64>,
    limit: usize,
}

impl SessionRegistry {
    pub fn new(limit: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Claim a slot for `peer`. Returns `None` when the node is full.
    pub async fn open(
        &self,
        peer: SocketAddr,
    ) -> Option<(Session, mpsc::UnboundedReceiver<Vec<u8>>)> {
        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.limit {
            return None;
        }
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (outbound, rx) = mpsc::unbounded_channel();
        let session = Session { id, peer, outbound };
        sessions.insert(id, session.clone());
        debug!(%id, %peer, active = sessions.len(), "session opened");
        Some((session, rx))
    }

    pub async fn close(&self, id: SessionId) {
        let mut sessions = self.sessions.write().await;
        if sessions.remove(&id).is_some() {
            debug!(%id, active = sessions.len(), "session closed");
        }
    }

    /// Drop every session's outbound queue, which ends its connection task.
    pub async fn close_all(&self) {
        self.sessions.write().await.clear();
    }

    /// Queue `packet` to every session. Returns how many accepted it.
    pub async fn broadcast(&self, packet: &[u8]) -> usize {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|s| s.send(packet.to_vec()))
            .count()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
