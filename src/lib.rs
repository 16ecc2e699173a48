pub mod config;
pub mod consistent_hashring;
pub mod grpc_getter;
pub mod observability;
pub mod peers;
pub mod pool;
pub mod proto;

pub use crate::consistent_hashring::{ConsistentHashRing, HashFn, RingError};
pub use crate::peers::{LocalPicker, PeerGetter, PeerHandle, PeerPicker, RemoteFetchError};
pub use crate::pool::{PeerPool, PoolError};
pub use crate::proto::{GetRequest, GetResponse};
