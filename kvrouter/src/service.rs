//! tarpc service definition for storage nodes
//!
//! Every storage node serves this interface; the router only consumes it
//! through [`crate::node::RemoteNode`].

use crate::error::RouterError;
use crate::types::*;

/// Storage node RPC service definition.
#[tarpc::service]
pub trait NodeRpc {
    /// Store a single value
    async fn store(kv: KeyValue) -> Result<(), RouterError>;

    /// Store several values in one call
    async fn store_pairs(kvs: Vec<KeyValue>) -> Result<(), RouterError>;

    /// Fetch a value; `KeyNotFound` if absent
    async fn receive(key: String) -> Result<Vec<u8>, RouterError>;

    /// List every key held by the node
    async fn explore() -> Result<Vec<String>, RouterError>;

    /// Delete a key
    async fn remove(key: String) -> Result<(), RouterError>;

    /// Transfer the listed keys to their destination nodes
    async fn move_keys(request: MoveRequest) -> Result<(), RouterError>;

    /// Self-reported node metadata
    async fn meta() -> NodeMeta;
}
