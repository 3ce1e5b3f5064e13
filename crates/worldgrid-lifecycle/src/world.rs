//! World-wide operations the shutdown path relies on.

use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;
use tracing::{debug, info};
use worldgrid_state::{WorldSnapshot, WorldSnapshotMapping};

use crate::context::WorldContext;

/// Broadcast and save, as seen by the shutdown coordinator.
pub trait WorldServices: Send + Sync + 'static {
    /// Send `message` to every connected session. Returns how many
    /// sessions accepted it.
    fn broadcast(&self, message: &str) -> impl Future<Output = usize> + Send;

    /// Persist all in-memory world state.
    fn save_all(&self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// The node's world, backed by the session registry and the state store.
#[derive(Debug, Clone)]
pub struct World {
    context: WorldContext,
}

impl World {
    pub fn new(context: WorldContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &WorldContext {
        &self.context
    }

    async fn snapshot(&self) -> anyhow::Result<WorldSnapshot> {
        let identity = self
            .context
            .identity()
            .context("node identity not established")?;
        let saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Ok(WorldSnapshot {
            world_id: identity.world_id.to_string(),
            server_group: identity.server_group.clone(),
            channel_id: self.context.channel_id(),
            endpoint: identity.endpoint.to_string(),
            active_sessions: self.context.sessions.len().await,
            saved_at,
        })
    }
}

impl WorldServices for World {
    async fn broadcast(&self, message: &str) -> usize {
        let delivered = self.context.sessions.broadcast(message.as_bytes()).await;
        debug!(delivered, "broadcast queued");
        delivered
    }

    async fn save_all(&self) -> anyhow::Result<()> {
        let snapshot = self.snapshot().await?;
        self.context
            .store
            .put_domain::<WorldSnapshotMapping>(&snapshot.world_id, &snapshot)
            .context("failed to write world snapshot")?;
        info!(
            world_id = %snapshot.world_id,
            sessions = snapshot.active_sessions,
            "world state saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::num::NonZeroU32;
    use std::sync::Arc;

    use world_core::{Endpoint, MessageCatalog, NodeIdentity, WorldConfig, WorldId};
    use worldgrid_net::SessionRegistry;
    use worldgrid_state::{MappingRegistry, StateStore, register_world_mappings};

    use super::*;

    fn world() -> World {
        let mut registry = MappingRegistry::new();
        register_world_mappings(&mut registry).unwrap();
        let store = StateStore::open_in_memory()
            .unwrap()
            .with_mappings(registry.freeze());

        let context = WorldContext::new(
            Arc::new(WorldConfig::scaffold("S1", 1337)),
            Arc::new(MessageCatalog::default()),
            store,
            SessionRegistry::new(10),
        );
        context
            .set_identity(NodeIdentity {
                world_id: WorldId::from("world-0000000000000001"),
                server_group: "S1".into(),
                endpoint: Endpoint::new("127.0.0.1", 1338),
                session_limit: NonZeroU32::new(10).unwrap(),
            })
            .unwrap();
        World::new(context)
    }

    #[tokio::test]
    async fn broadcast_counts_sessions() {
        let world = world();
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        let (_session, mut rx) = world.context().sessions.open(peer).await.unwrap();

        assert_eq!(world.broadcast("bye").await, 1);
        assert_eq!(rx.recv().await.unwrap(), b"bye".to_vec());
    }

    #[tokio::test]
    async fn save_all_writes_snapshot() {
        let world = world();
        world.context().channel.assign(2).unwrap();
        world.save_all().await.unwrap();

        let saved = world
            .context()
            .store
            .get_domain::<WorldSnapshotMapping>("world-0000000000000001")
            .unwrap()
            .unwrap();
        assert_eq!(saved.channel_id, Some(2));
        assert_eq!(saved.endpoint, "127.0.0.1:1338");
        assert_eq!(saved.active_sessions, 0);
    }

    #[tokio::test]
    async fn save_without_mappings_fails() {
        let context = WorldContext::new(
            Arc::new(WorldConfig::scaffold("S1", 1337)),
            Arc::new(MessageCatalog::default()),
            StateStore::open_in_memory().unwrap(),
            SessionRegistry::new(10),
        );
        context
            .set_identity(NodeIdentity {
                world_id: WorldId::generate(),
                server_group: "S1".into(),
                endpoint: Endpoint::new("127.0.0.1", 1337),
                session_limit: NonZeroU32::new(10).unwrap(),
            })
            .unwrap();
        assert!(World::new(context).save_all().await.is_err());
    }
}
