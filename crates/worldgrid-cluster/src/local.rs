//! In-process coordination for standalone nodes.
//!
//! Hands out the lowest free channel id (starting at 1) per server group,
//! up to a fixed number of channels. A full group answers with no
//! assignment, the same way a remote hub does.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use tracing::{info, warn};
use world_core::{Endpoint, NodeIdentity};

use crate::client::CoordinationService;
use crate::error::CoordinationError;

/// A world server known to the local coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredWorld {
    pub channel_id: i32,
    pub identity: NodeIdentity,
}

#[derive(Debug)]
pub struct LocalCoordination {
    max_channels: i32,
    /// server group → channel id → world.
    groups: Mutex<HashMap<String, BTreeMap<i32, RegisteredWorld>>>,
}

impl LocalCoordination {
    /// Channel ids are `i32` on the wire, so larger counts saturate.
    pub fn new(max_channels: u32) -> Self {
        Self {
            max_channels: i32::try_from(max_channels).unwrap_or(i32::MAX),
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// Worlds currently registered in `server_group`, by channel.
    pub fn worlds(&self, server_group: &str) -> Vec<RegisteredWorld> {
        let groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        groups
            .get(server_group)
            .map(|g| g.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl CoordinationService for LocalCoordination {
    async fn register_worldserver(
        &self,
        server_group: &str,
        identity: &NodeIdentity,
    ) -> Result<Option<i32>, CoordinationError> {
        let mut groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        let group = groups.entry(server_group.to_string()).or_default();

        // Re-registration of the same endpoint keeps its channel.
        if let Some(existing) = group
            .values()
            .find(|w| w.identity.endpoint == identity.endpoint)
        {
            return Ok(Some(existing.channel_id));
        }

        let Some(channel_id) = (1..=self.max_channels).find(|id| !group.contains_key(id))
        else {
            warn!(%server_group, max = self.max_channels, "no free channel in server group");
            return Ok(None);
        };

        group.insert(
            channel_id,
            RegisteredWorld {
                channel_id,
                identity: identity.clone(),
            },
        );
        info!(%server_group, channel_id, endpoint = %identity.endpoint, "worldserver registered");
        Ok(Some(channel_id))
    }

    async fn unregister_worldserver(
        &self,
        server_group: &str,
        endpoint: &Endpoint,
    ) -> Result<(), CoordinationError> {
        let mut groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(group) = groups.get_mut(server_group) {
            let before = group.len();
            group.retain(|_, w| &w.identity.endpoint != endpoint);
            if group.len() < before {
                info!(%server_group, %endpoint, "worldserver unregistered");
            }
        }
        Ok(())
    }
}
