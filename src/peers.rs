use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::proto::{GetRequest, GetResponse};

#[derive(Error, Debug)]
pub enum RemoteFetchError {
    #[error("Invalid peer address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },

    #[error("Peer {peer} unreachable: {message}")]
    Unreachable { peer: String, message: String },

    #[error("Key {key} not found in group {group} on peer {peer}")]
    NotFound {
        peer: String,
        group: String,
        key: String,
    },

    #[error("Peer {peer} timed out: {message}")]
    Timeout { peer: String, message: String },

    #[error("Peer {peer} returned {code:?}: {message}")]
    Status {
        peer: String,
        code: tonic::Code,
        message: String,
    },
}

/// Fetches values from one specific remote node.
///
/// Implementations own their transport, including timeouts. Errors are
/// returned as-is; retrying is left to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeerGetter: Send + Sync + 'static {
    async fn get(&self, request: &GetRequest) -> Result<GetResponse, RemoteFetchError>;
}

pub type PeerHandle = Arc<dyn PeerGetter>;

/// Locates the peer that owns a specific key.
pub trait PeerPicker: Send + Sync {
    /// Returns the handle of the remote owner of `key`, or `None` when no
    /// remote node owns it and the caller should serve the key locally.
    fn pick_peer(&self, key: &str) -> Option<PeerHandle>;
}

/// Picker for a cache group running without peers. Every key is local.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPicker;

impl PeerPicker for LocalPicker {
    fn pick_peer(&self, _key: &str) -> Option<PeerHandle> {
        None
    }
}
