//! Shared world state handed to every component.

use std::sync::{Arc, OnceLock};

use world_core::{ChannelAssignment, MessageCatalog, NodeIdentity, WorldConfig};
use worldgrid_net::SessionRegistry;
use worldgrid_state::StateStore;

/// Everything a running node shares between its listener, handlers and
/// shutdown path. Built once during bootstrap and cloned freely.
///
/// The identity and the channel assignment are write-once: the identity
/// is fixed as soon as the listener has bound, the channel after
/// registration.
#[derive(Debug, Clone)]
pub struct WorldContext {
    pub config: Arc<WorldConfig>,
    pub messages: Arc<MessageCatalog>,
    pub store: StateStore,
    pub sessions: SessionRegistry,
    pub channel: Arc<ChannelAssignment>,
    identity: Arc<OnceLock<NodeIdentity>>,
}

impl WorldContext {
    pub fn new(
        config: Arc<WorldConfig>,
        messages: Arc<MessageCatalog>,
        store: StateStore,
        sessions: SessionRegistry,
    ) -> Self {
        Self {
            config,
            messages,
            store,
            sessions,
            channel: Arc::new(ChannelAssignment::new()),
            identity: Arc::new(OnceLock::new()),
        }
    }

    pub fn identity(&self) -> Option<&NodeIdentity> {
        self.identity.get()
    }

    /// Fix the node identity. Returns the rejected identity if one was
    /// already set.
    pub fn set_identity(&self, identity: NodeIdentity) -> Result<(), NodeIdentity> {
        self.identity.set(identity)
    }

    pub fn channel_id(&self) -> Option<i32> {
        self.channel.channel_id()
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use world_core::{Endpoint, WorldId};

    use super::*;

    fn context() -> WorldContext {
        WorldContext::new(
            Arc::new(WorldConfig::scaffold("S1", 1337)),
            Arc::new(MessageCatalog::default()),
            StateStore::open_in_memory().unwrap(),
            SessionRegistry::new(10),
        )
    }

    #[test]
    fn identity_is_write_once() {
        let ctx = context();
        assert!(ctx.identity().is_none());

        let identity = NodeIdentity {
            world_id: WorldId::generate(),
            server_group: "S1".into(),
            endpoint: Endpoint::new("127.0.0.1", 1337),
            session_limit: NonZeroU32::new(10).unwrap(),
        };
        ctx.set_identity(identity.clone()).unwrap();
        assert!(ctx.set_identity(identity.clone()).is_err());

        // Clones share the same cells.
        let clone = ctx.clone();
        assert_eq!(clone.identity(), Some(&identity));
    }

    #[test]
    fn channel_is_shared_between_clones() {
        let ctx = context();
        let clone = ctx.clone();
        ctx.channel.assign(3).unwrap();
        assert_eq!(clone.channel_id(), Some(3));
    }
}
