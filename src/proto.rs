//! Wire messages for the peer fetch RPC (`cachering.v1.PeerService/Get`).

use bytes::Bytes;

/// Full path of the unary fetch method.
pub const PEER_SERVICE_GET_PATH: &str = "/cachering.v1.PeerService/Get";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRequest {
    /// Logical cache group (namespace) the key belongs to.
    #[prost(string, tag = "1")]
    pub group: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub key: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetResponse {
    #[prost(bytes = "bytes", tag = "1")]
    pub value: Bytes,
}

impl GetRequest {
    pub fn new(group: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
        }
    }
}
