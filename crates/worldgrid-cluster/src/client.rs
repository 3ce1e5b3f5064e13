//! Coordination service RPC surface.
//!
//! [`CoordinationService`] is the seam the lifecycle depends on. The gRPC
//! client speaks to a remote hub; `LocalCoordination` stands in when the
//! node runs on its own.

use std::future::Future;
use std::time::Duration;

use tonic::transport::Channel;
use tracing::{debug, warn};
use world_core::{Endpoint, NodeIdentity};

use crate::error::CoordinationError;
use crate::proto;

/// Calls this node makes on the coordination service.
pub trait CoordinationService: Send + Sync + 'static {
    /// Announce a world server. `Ok(None)` means the hub answered without
    /// assigning a channel.
    fn register_worldserver(
        &self,
        server_group: &str,
        identity: &NodeIdentity,
    ) -> impl Future<Output = Result<Option<i32>, CoordinationError>> + Send;

    /// Withdraw the world server listening on `endpoint`.
    fn unregister_worldserver(
        &self,
        server_group: &str,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<(), CoordinationError>> + Send;
}

/// gRPC client for a remote coordination hub.
///
/// The channel connects lazily, so construction never blocks and a hub
/// that is down surfaces as an error on the first call.
#[derive(Debug, Clone)]
pub struct GrpcCoordinationClient {
    channel: Channel,
    uri: String,
}

impl GrpcCoordinationClient {
    /// Build a client for `addr` (`host:port` or a full `http://` URI).
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect_lazy(addr: &str, connect_timeout: Duration) -> Result<Self, CoordinationError> {
        let uri = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.to_string()
        } else {
            format!("http://{addr}")
        };

        let endpoint = tonic::transport::Endpoint::from_shared(uri.clone())
            .map_err(|e| CoordinationError::InvalidEndpoint {
                endpoint: uri.clone(),
                reason: e.to_string(),
            })?
            .connect_timeout(connect_timeout);

        debug!(%uri, "coordination channel created");
        Ok(Self {
            channel: endpoint.connect_lazy(),
            uri,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    async fn unary<Req, Resp>(
        &self,
        path: &'static str,
        request: Req,
    ) -> Result<Resp, CoordinationError>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| CoordinationError::Transport(e.to_string()))?;

        let codec = tonic::codec::ProstCodec::<Req, Resp>::default();
        let response = grpc
            .unary(
                tonic::Request::new(request),
                http::uri::PathAndQuery::from_static(path),
                codec,
            )
            .await?;
        Ok(response.into_inner())
    }
}

impl CoordinationService for GrpcCoordinationClient {
    async fn register_worldserver(
        &self,
        server_group: &str,
        identity: &NodeIdentity,
    ) -> Result<Option<i32>, CoordinationError> {
        let request = proto::RegisterWorldserverRequest {
            server_group: server_group.to_string(),
            worldserver: Some(proto::Worldserver::from(identity)),
        };
        let response: proto::RegisterWorldserverResponse =
            self.unary(proto::REGISTER_WORLDSERVER, request).await?;
        Ok(response.channel_id)
    }

    async fn unregister_worldserver(
        &self,
        server_group: &str,
        endpoint: &Endpoint,
    ) -> Result<(), CoordinationError> {
        let request = proto::UnregisterWorldserverRequest {
            server_group: server_group.to_string(),
            endpoint: Some(proto::Endpoint::from(endpoint)),
        };
        let response: proto::UnregisterWorldserverResponse =
            self.unary(proto::UNREGISTER_WORLDSERVER, request).await?;
        if !response.acknowledged {
            warn!(%server_group, %endpoint, "coordination service did not recognise this worldserver");
        }
        Ok(())
    }
}
