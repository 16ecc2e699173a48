use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, info};

use crate::consistent_hashring::{ConsistentHashRing, RingError};
use crate::peers::{PeerHandle, PeerPicker, RemoteFetchError};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Ring error: {0}")]
    Ring(#[from] RingError),

    #[error("Failed to connect peer: {0}")]
    Connect(#[from] RemoteFetchError),
}

/// Immutable view of the cluster: the ring and a getter per remote node.
struct Snapshot {
    ring: ConsistentHashRing,
    getters: HashMap<String, PeerHandle>,
}

/// Consistent-hash peer picker for a cache group.
///
/// Membership changes rebuild the whole ring off to the side and swap it in,
/// so concurrent `pick_peer` calls see either the old or the new cluster view.
pub struct PeerPool {
    self_id: String,
    replicas: usize,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl PeerPool {
    /// Create an empty pool for the node identified by `self_id`.
    pub fn new(self_id: impl Into<String>, replicas: usize) -> Result<Self, PoolError> {
        let ring = ConsistentHashRing::new(replicas)?;
        Ok(Self {
            self_id: self_id.into(),
            replicas,
            snapshot: RwLock::new(Arc::new(Snapshot {
                ring,
                getters: HashMap::new(),
            })),
        })
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Replace the peer set.
    ///
    /// `peers` is the complete membership and may include this node; `connect`
    /// is called once for every other peer. On error the previous peer set
    /// stays in effect.
    pub fn set_peers<I, S, F>(&self, peers: I, mut connect: F) -> Result<(), PoolError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: FnMut(&str) -> Result<PeerHandle, RemoteFetchError>,
    {
        let peers: Vec<String> = peers.into_iter().map(Into::into).collect();

        let mut ring = ConsistentHashRing::new(self.replicas)?;
        ring.add_nodes(peers.iter().cloned())?;

        let mut getters = HashMap::with_capacity(peers.len());
        for peer in &peers {
            if *peer == self.self_id || getters.contains_key(peer) {
                continue;
            }
            getters.insert(peer.clone(), connect(peer.as_str())?);
        }

        let next = Arc::new(Snapshot { ring, getters });
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = next;

        info!(self_id = %self.self_id, peers = ?peers, "Peer set updated");
        Ok(())
    }

    /// The node owning `key`, which may be this node.
    pub fn owner(&self, key: &str) -> Option<String> {
        self.current().ring.get_node(key).map(str::to_string)
    }

    /// Node identifiers currently on the ring, in sorted order.
    pub fn peers(&self) -> Vec<String> {
        self.current()
            .ring
            .nodes()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn current(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PeerPicker for PeerPool {
    fn pick_peer(&self, key: &str) -> Option<PeerHandle> {
        let snapshot = self.current();
        let owner = snapshot.ring.get_node(key)?;
        if owner == self.self_id {
            return None;
        }

        debug!(key = %key, peer = %owner, "Picked peer");
        snapshot.getters.get(owner).cloned()
    }
}
