//! Register/deregister with a time bound.
//!
//! Wraps any [`CoordinationService`] so the lifecycle never waits on the hub
//! longer than the configured timeout, and folds "answered without a
//! channel" into [`RegistrationError::Absent`].

use std::time::Duration;

use tracing::{error, info, warn};
use world_core::{Endpoint, NodeIdentity};

use crate::client::CoordinationService;
use crate::error::RegistrationError;

#[derive(Debug)]
pub struct ClusterRegistrationClient<C> {
    service: C,
    timeout: Duration,
}

impl<C: CoordinationService> ClusterRegistrationClient<C> {
    pub fn new(service: C, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    pub fn service(&self) -> &C {
        &self.service
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Announce this node and return the assigned channel id.
    pub async fn register(
        &self,
        server_group: &str,
        identity: &NodeIdentity,
    ) -> Result<i32, RegistrationError> {
        let call = self.service.register_worldserver(server_group, identity);
        let answer = match tokio::time::timeout(self.timeout, call).await {
            Ok(answer) => answer,
            Err(_) => {
                error!(%server_group, timeout = ?self.timeout, "registration timed out");
                return Err(RegistrationError::Timeout(self.timeout));
            }
        };

        match answer {
            Ok(Some(channel_id)) => {
                info!(%server_group, channel_id, endpoint = %identity.endpoint, "channel assigned");
                Ok(channel_id)
            }
            Ok(None) => {
                error!(%server_group, "coordination service assigned no channel");
                Err(RegistrationError::Absent {
                    server_group: server_group.to_string(),
                })
            }
            Err(e) => {
                error!(%server_group, error = %e, "registration failed");
                Err(e.into())
            }
        }
    }

    /// Withdraw the node listening on `endpoint`.
    pub async fn deregister(
        &self,
        server_group: &str,
        endpoint: &Endpoint,
    ) -> Result<(), RegistrationError> {
        let call = self.service.unregister_worldserver(server_group, endpoint);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(())) => {
                info!(%server_group, %endpoint, "deregistered from coordination service");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(%server_group, %endpoint, error = %e, "deregistration failed");
                Err(e.into())
            }
            Err(_) => {
                warn!(%server_group, %endpoint, timeout = ?self.timeout, "deregistration timed out");
                Err(RegistrationError::Timeout(self.timeout))
            }
        }
    }
}
