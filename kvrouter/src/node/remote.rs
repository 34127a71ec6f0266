//! Remote node client
//!
//! One [`RemoteNode`] is bound to exactly one storage node's RPC endpoint for
//! its whole lifetime. Every operation is a single RPC with a deadline; no
//! retries are attempted here.

use super::Node;
use crate::config::ClientConfig;
use crate::error::{Result, RouterError};
use crate::metrics::CallTimer;
use crate::service::NodeRpcClient;
use crate::types::*;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::fmt;
use std::time::{Duration, Instant};
use tarpc::client::{Config as TarpcConfig, RpcError};
use tarpc::context;
use tarpc::tokio_serde::formats::Bincode;
use tracing::{debug, info};

/// Dial a node's RPC endpoint over TCP
pub async fn connect_client(rpc_address: &str, config: &ClientConfig) -> Result<NodeRpcClient> {
    debug!("Connecting to storage node at {}", rpc_address);

    let connecting = tarpc::serde_transport::tcp::connect(rpc_address, Bincode::default);
    let transport = tokio::time::timeout(config.connect_timeout(), connecting)
        .await
        .map_err(|_| {
            RouterError::NodeUnavailable(format!("Connection to {} timed out", rpc_address))
        })?
        .map_err(|e| {
            RouterError::NodeUnavailable(format!("Failed to connect to {}: {}", rpc_address, e))
        })?;

    Ok(NodeRpcClient::new(TarpcConfig::default(), transport).spawn())
}

/// Proxy for one remote storage node
pub struct RemoteNode {
    meta: RwLock<NodeMeta>,
    client: NodeRpcClient,
    request_timeout: Duration,
}

impl RemoteNode {
    /// Bind to a node whose metadata is already known
    pub async fn connect(meta: NodeMeta, config: &ClientConfig) -> Result<Self> {
        meta.validate()?;
        let client = connect_client(&meta.rpc_address, config).await?;
        info!("Connected to node {} at {}", meta.id, meta.rpc_address);
        Ok(Self::from_client(meta, client, config.request_timeout()))
    }

    /// Bind to a bare RPC address and adopt the node's self-reported metadata
    pub async fn connect_by_addr(rpc_address: &str, config: &ClientConfig) -> Result<Self> {
        let client = connect_client(rpc_address, config).await?;
        let mut meta = fetch_meta(&client, rpc_address, config.request_timeout()).await?;
        if meta.rpc_address.is_empty() {
            meta.rpc_address = rpc_address.to_string();
        }
        meta.validate()?;
        info!(
            "Node {} registered itself from {} (power={}, capacity={})",
            meta.id, rpc_address, meta.power, meta.capacity
        );
        Ok(Self::from_client(meta, client, config.request_timeout()))
    }

    /// Bind to an already spawned client, e.g. over an in-process transport
    pub fn from_client(meta: NodeMeta, client: NodeRpcClient, request_timeout: Duration) -> Self {
        Self {
            meta: RwLock::new(meta),
            client,
            request_timeout,
        }
    }

    pub fn rpc_address(&self) -> String {
        self.meta.read().rpc_address.clone()
    }

    /// Overwrite the weight fields; callers must re-optimize the registry
    pub fn set_weights(&self, power: f64, capacity: f64) -> Result<()> {
        let mut meta = self.meta.write();
        crate::types::validate_power(&meta.id, power)?;
        meta.power = power;
        meta.capacity = capacity;
        Ok(())
    }

    /// Create a context with the configured request deadline
    fn context(&self) -> context::Context {
        deadline_context(self.request_timeout)
    }

    fn finish<T>(
        &self,
        timer: CallTimer,
        result: std::result::Result<Result<T>, RpcError>,
    ) -> Result<T> {
        timer.finish(result.unwrap_or_else(|e| Err(unavailable(&self.id(), e))))
    }
}

fn deadline_context(timeout: Duration) -> context::Context {
    let mut ctx = context::current();
    ctx.deadline = Instant::now() + timeout;
    ctx
}

fn unavailable(node: &str, err: RpcError) -> RouterError {
    RouterError::NodeUnavailable(format!("{}: {}", node, err))
}

async fn fetch_meta(client: &NodeRpcClient, label: &str, timeout: Duration) -> Result<NodeMeta> {
    let timer = CallTimer::start("meta", label);
    let result = client
        .meta(deadline_context(timeout))
        .await
        .map_err(|e| unavailable(label, e));
    timer.finish(result)
}

impl fmt::Debug for RemoteNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteNode")
            .field("meta", &*self.meta.read())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[async_trait]
impl Node for RemoteNode {
    fn id(&self) -> String {
        self.meta.read().id.clone()
    }

    fn power(&self) -> f64 {
        self.meta.read().power
    }

    fn capacity(&self) -> f64 {
        self.meta.read().capacity
    }

    fn meta(&self) -> NodeMeta {
        self.meta.read().clone()
    }

    /// Re-read the node's self-reported weights.
    ///
    /// Identity and addresses stay as bound; only power and capacity change.
    async fn refresh_meta(&self) -> Result<NodeMeta> {
        let (id, rpc_address) = {
            let meta = self.meta.read();
            (meta.id.clone(), meta.rpc_address.clone())
        };
        let remote = fetch_meta(&self.client, &id, self.request_timeout).await?;
        if remote.id != id {
            return Err(RouterError::InvalidNode(format!(
                "node at {} now reports id {} instead of {}",
                rpc_address, remote.id, id
            )));
        }
        self.set_weights(remote.power, remote.capacity)?;
        Ok(self.meta())
    }

    async fn store(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let id = self.id();
        debug!("Store key({}) on {}", key, id);
        let timer = CallTimer::start("store", &id);
        let result = self
            .client
            .store(self.context(), KeyValue::new(key, value))
            .await;
        self.finish(timer, result)
    }

    async fn store_pairs(&self, pairs: Vec<KeyValue>) -> Result<()> {
        let id = self.id();
        debug!("Store {} pairs on {}", pairs.len(), id);
        let timer = CallTimer::start("store_pairs", &id);
        let result = self.client.store_pairs(self.context(), pairs).await;
        self.finish(timer, result)
    }

    async fn receive(&self, key: &str) -> Result<Vec<u8>> {
        let id = self.id();
        debug!("Receive key({}) from {}", key, id);
        let timer = CallTimer::start("receive", &id);
        let result = self.client.receive(self.context(), key.to_string()).await;
        self.finish(timer, result)
    }

    async fn explore(&self) -> Result<Vec<String>> {
        let id = self.id();
        debug!("Exploring {}", id);
        let timer = CallTimer::start("explore", &id);
        let result = self.client.explore(self.context()).await;
        self.finish(timer, result)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let id = self.id();
        debug!("Remove key({}) from {}", key, id);
        let timer = CallTimer::start("remove", &id);
        let result = self.client.remove(self.context(), key.to_string()).await;
        self.finish(timer, result)
    }

    async fn move_keys(&self, request: MoveRequest) -> Result<()> {
        let id = self.id();
        debug!(
            "Move {} keys from {} to {} destinations",
            request.key_count(),
            id,
            request.moves.len()
        );
        let timer = CallTimer::start("move_keys", &id);
        let result = self.client.move_keys(self.context(), request).await;
        self.finish(timer, result)
    }
}
