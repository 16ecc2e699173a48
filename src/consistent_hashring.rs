use std::{
    collections::{
        BTreeMap,
        BTreeSet,
    },
    fmt,
    sync::Arc,
};

use thiserror::Error;

/// Function mapping arbitrary bytes to a position on the ring.
///
/// Every process sharing a cluster view must use the same function, otherwise
/// they will disagree about key ownership.
pub type HashFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("Replica count must be at least 1")]
    ZeroReplicas,

    #[error("Node identifier must not be empty")]
    EmptyNodeId,
}

/// A consistent hash ring implementation.
///
/// This structure maps keys to nodes in a way that minimizes redistribution
/// when nodes are added. Each node is placed on the ring `replicas` times; the
/// virtual position for replica `i` of node `n` is `hash(format!("{i}{n}"))`.
///
/// Lookups take `&self` and registration takes `&mut self`. Callers sharing a
/// ring across threads must wrap it in a lock (see [`crate::pool::PeerPool`]).
pub struct ConsistentHashRing {
    /// The virtual nodes in the ring, mapping hash positions to node
    /// identifiers. On collision the node registered last wins.
    ring: BTreeMap<u32, String>,

    /// The number of virtual nodes per real node.
    replicas: usize,

    hash: HashFn,
}

impl ConsistentHashRing {
    /// Create a new ring hashed with CRC32 (IEEE).
    pub fn new(replicas: usize) -> Result<Self, RingError> {
        Self::with_hasher(replicas, Arc::new(crc32fast::hash))
    }

    /// Create a new ring with a custom hash function.
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Result<Self, RingError> {
        if replicas == 0 {
            return Err(RingError::ZeroReplicas);
        }

        Ok(ConsistentHashRing {
            ring: BTreeMap::new(),
            replicas,
            hash,
        })
    }

    /// Create a CRC32 ring and register `nodes` on it.
    pub fn with_nodes<I, S>(replicas: usize, nodes: I) -> Result<Self, RingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ring = Self::new(replicas)?;
        ring.add_nodes(nodes)?;
        Ok(ring)
    }

    /// Add nodes to the hash ring.
    ///
    /// All identifiers are validated before any is placed, so a rejected call
    /// leaves the ring untouched. Duplicate identifiers are not filtered.
    pub fn add_nodes<I, S>(&mut self, nodes: I) -> Result<(), RingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes: Vec<String> = nodes.into_iter().map(Into::into).collect();
        if nodes.iter().any(|node| node.is_empty()) {
            return Err(RingError::EmptyNodeId);
        }

        for node in nodes {
            for i in 0..self.replicas {
                let position = (self.hash)(format!("{i}{node}").as_bytes());
                self.ring.insert(position, node.clone());
            }
        }

        Ok(())
    }

    /// Get the node responsible for the given key.
    ///
    /// Returns `None` only when no node has been registered.
    pub fn get_node<K>(&self, key: &K) -> Option<&str>
    where
        K: AsRef<[u8]> + ?Sized,
    {
        if self.ring.is_empty() {
            return None;
        }

        let key_hash = (self.hash)(key.as_ref());
        match self.ring.range(key_hash..).next() {
            Some((_, node)) => Some(node.as_str()),
            // Past the last position, wrap to the first.
            None => self.ring.values().next().map(String::as_str),
        }
    }

    /// Number of virtual positions on the ring.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Distinct node identifiers currently owning at least one position.
    pub fn nodes(&self) -> BTreeSet<&str> {
        self.ring.values().map(String::as_str).collect()
    }
}

impl fmt::Debug for ConsistentHashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsistentHashRing")
            .field("replicas", &self.replicas)
            .field("positions", &self.ring.len())
            .field("nodes", &self.nodes())
            .finish()
    }
}
