//! Protobuf messages of the coordination service.
//!
//! Package `worldgrid.coordination`, service `Coordination`:
//!
//! ```text
//! rpc RegisterWorldserver(RegisterWorldserverRequest) returns (RegisterWorldserverResponse);
//! rpc UnregisterWorldserver(UnregisterWorldserverRequest) returns (UnregisterWorldserverResponse);
//! ```

use world_core::NodeIdentity;

pub const REGISTER_WORLDSERVER: &str = "/worldgrid.coordination.Coordination/RegisterWorldserver";
pub const UNREGISTER_WORLDSERVER: &str =
    "/worldgrid.coordination.Coordination/UnregisterWorldserver";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Endpoint {
    #[prost(string, tag = "1")]
    pub address: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub port: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Worldserver {
    #[prost(string, tag = "1")]
    pub world_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub endpoint: ::core::option::Option<Endpoint>,
    #[prost(uint32, tag = "3")]
    pub session_limit: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterWorldserverRequest {
    #[prost(string, tag = "1")]
    pub server_group: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub worldserver: ::core::option::Option<Worldserver>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterWorldserverResponse {
    /// Unset when the hub has no channel for this node.
    #[prost(int32, optional, tag = "1")]
    pub channel_id: ::core::option::Option<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnregisterWorldserverRequest {
    #[prost(string, tag = "1")]
    pub server_group: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub endpoint: ::core::option::Option<Endpoint>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnregisterWorldserverResponse {
    #[prost(bool, tag = "1")]
    pub acknowledged: bool,
}

impl From<&world_core::Endpoint> for Endpoint {
    fn from(ep: &world_core::Endpoint) -> Self {
        Self {
            address: ep.address.clone(),
            port: ep.port as u32,
        }
    }
}

impl From<&NodeIdentity> for Worldserver {
    fn from(identity: &NodeIdentity) -> Self {
        Self {
            world_id: identity.world_id.to_string(),
            endpoint: Some(Endpoint::from(&identity.endpoint)),
            session_limit: identity.session_limit.get(),
        }
    }
}
