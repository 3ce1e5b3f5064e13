//! Shared types used across WorldGrid crates.

use std::fmt;
use std::num::NonZeroU32;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Stable unique identifier of a world server process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(String);

impl WorldId {
    /// Generate a fresh identifier for this process.
    ///
    /// Mixes the process id with the current time, so two nodes started on
    /// the same host get distinct ids.
    pub fn generate() -> Self {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::process::id().hash(&mut hasher);
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
            .hash(&mut hasher);
        Self(format!("world-{:016x}", hasher.finish()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorldId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network endpoint advertised to the coordination service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Identity and capacity of this node, fixed for the process lifetime.
///
/// The endpoint carries the port the listener actually bound, which may
/// differ from the configured one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub world_id: WorldId,
    pub server_group: String,
    pub endpoint: Endpoint,
    pub session_limit: NonZeroU32,
}

/// Cluster-assigned channel id, written at most once.
///
/// Stays empty when registration produced no assignment; readers must
/// treat that as the degraded, unassigned state.
#[derive(Debug, Default)]
pub struct ChannelAssignment {
    channel_id: OnceLock<i32>,
}

impl ChannelAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the assigned channel. Returns the rejected value if a channel
    /// was already assigned.
    pub fn assign(&self, channel_id: i32) -> Result<(), i32> {
        self.channel_id.set(channel_id)
    }

    pub fn channel_id(&self) -> Option<i32> {
        self.channel_id.get().copied()
    }

    pub fn is_assigned(&self) -> bool {
        self.channel_id.get().is_some()
    }
}
