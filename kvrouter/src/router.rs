//! Router façade
//!
//! Single-key operations are routed to the owning node and surface its
//! errors verbatim. Cluster-wide queries fan out to every registered node:
//!
//! ```text
//! explore_cluster → [node 1, node 2, ...] → collector → ClusterKeys
//!                          ↓
//!           parallel tasks, per-node timeout
//!                          ↓
//!           failed nodes recorded and dropped
//! ```

use crate::balancer::Balancer;
use crate::config::{ClientConfig, RouterConfig};
use crate::error::Result;
use crate::metrics;
use crate::node::{Node, RemoteNode};
use crate::types::{KeyMove, KeyValue, MoveRequest, NodeMeta};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// A node dropped from a fan-out result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node_id: String,
    pub reason: String,
    pub is_timeout: bool,
}

/// Outcome of one fan-out participant
#[derive(Debug, Clone)]
pub enum NodeOutcome<T> {
    Success(T),
    Failure(NodeFailure),
}

/// Per-node accounting of a fan-out
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FanoutStatus {
    /// Number of nodes queried
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub failures: Vec<NodeFailure>,
}

impl FanoutStatus {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    pub fn record_success(&mut self) {
        self.successful += 1;
    }

    pub fn record_failure(&mut self, failure: NodeFailure) {
        self.failed += 1;
        self.failures.push(failure);
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Ids of the nodes that failed
    pub fn failed_nodes(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.node_id.as_str()).collect()
    }
}

/// Keys per node from a cluster-wide listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterKeys {
    pub keys: HashMap<String, Vec<String>>,
    pub status: FanoutStatus,
}

/// Summary of a redistribution pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebalanceReport {
    /// Keys found on a node other than their owner
    pub misplaced_keys: usize,
    /// Keys covered by instructions the holders acknowledged
    pub moved_keys: usize,
    /// Move instructions issued (one per holder)
    pub instructions: usize,
    pub explore_status: FanoutStatus,
    pub move_status: FanoutStatus,
}

/// Receives outcomes from concurrently running fan-out tasks
struct FanoutCollector<T> {
    outcomes: Mutex<HashMap<String, NodeOutcome<T>>>,
}

impl<T> FanoutCollector<T> {
    fn new() -> Self {
        Self {
            outcomes: Mutex::new(HashMap::new()),
        }
    }

    fn put(&self, node_id: String, outcome: NodeOutcome<T>) {
        self.outcomes.lock().insert(node_id, outcome);
    }

    fn take(&self) -> HashMap<String, NodeOutcome<T>> {
        std::mem::take(&mut *self.outcomes.lock())
    }
}

/// Routes key operations to their owning nodes
pub struct Router {
    balancer: Arc<dyn Balancer>,
    config: RouterConfig,
    client_config: ClientConfig,
    semaphore: Arc<Semaphore>,
}

impl Router {
    /// Create a router over an explicitly constructed registry
    pub fn new(balancer: Arc<dyn Balancer>, config: RouterConfig) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));
        Self {
            balancer,
            config,
            client_config: ClientConfig::default(),
            semaphore,
        }
    }

    /// Client settings used by [`Router::register_node`]
    pub fn with_client_config(mut self, client_config: ClientConfig) -> Self {
        self.client_config = client_config;
        self
    }

    pub fn balancer(&self) -> &Arc<dyn Balancer> {
        &self.balancer
    }

    /// Node owning `key`
    pub fn locate_key(&self, key: &str) -> Result<Arc<dyn Node>> {
        self.balancer.locate_key(key)
    }

    /// Store a value on the owning node
    pub async fn store(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let node = self.locate_key(key)?;
        node.store(key, value).await
    }

    /// Fetch a value from the owning node
    pub async fn receive(&self, key: &str) -> Result<Vec<u8>> {
        let node = self.locate_key(key)?;
        node.receive(key).await
    }

    /// Delete a key on the owning node
    pub async fn remove(&self, key: &str) -> Result<()> {
        let node = self.locate_key(key)?;
        node.remove(key).await
    }

    /// Store pairs, one bulk call per owning node.
    ///
    /// Calls run concurrently and the first error is returned; pairs already
    /// accepted by other nodes stay stored.
    pub async fn store_pairs(&self, pairs: Vec<KeyValue>) -> Result<()> {
        let mut batches: HashMap<String, (Arc<dyn Node>, Vec<KeyValue>)> = HashMap::new();
        for kv in pairs {
            let node = self.locate_key(&kv.key)?;
            batches
                .entry(node.id())
                .or_insert_with(|| (node, Vec::new()))
                .1
                .push(kv);
        }
        debug!("Storing pairs on {} nodes", batches.len());

        let calls = batches
            .into_values()
            .map(|(node, batch)| async move { node.store_pairs(batch).await });
        futures::future::try_join_all(calls).await?;
        Ok(())
    }

    /// Keys held by every reachable node.
    ///
    /// Best-effort snapshot: nodes answer at slightly different times, and a
    /// node that errors or times out is logged and left out of the map.
    pub async fn explore_cluster(&self) -> Result<ClusterKeys> {
        let nodes = self.balancer.nodes()?;
        let calls = nodes
            .into_iter()
            .map(|node| (node.id(), async move { node.explore().await }))
            .collect();
        let (keys, status) = self.fan_out("explore", calls).await;
        Ok(ClusterKeys { keys, status })
    }

    /// Metadata of every registered node
    pub fn list_nodes(&self) -> Result<Vec<NodeMeta>> {
        Ok(self.balancer.nodes()?.iter().map(|n| n.meta()).collect())
    }

    /// Register a node by its bare RPC address using its self-reported metadata
    pub async fn register_node(&self, rpc_address: &str) -> Result<NodeMeta> {
        let node = RemoteNode::connect_by_addr(rpc_address, &self.client_config).await?;
        let meta = node.meta();
        self.balancer.add_node(Arc::new(node), true)?;
        info!("Registered node {} ({})", meta.id, rpc_address);
        Ok(meta)
    }

    /// Register an already bound node
    pub fn add_node(&self, node: Arc<dyn Node>) -> Result<()> {
        self.balancer.add_node(node, true)
    }

    pub fn deregister_node(&self, id: &str) -> Result<()> {
        self.balancer.remove_node(id)?;
        info!("Deregistered node {}", id);
        Ok(())
    }

    /// Re-read every node's weights, then rebuild the partition once.
    ///
    /// Nodes that fail to answer keep their last known weights.
    pub async fn refresh_weights(&self) -> Result<FanoutStatus> {
        let nodes = self.balancer.nodes()?;
        let calls = nodes
            .into_iter()
            .map(|node| (node.id(), async move { node.refresh_meta().await }))
            .collect();
        let (_, status) = self.fan_out("refresh_meta", calls).await;
        self.balancer.optimize()?;
        info!(
            "Weights refreshed from {}/{} nodes",
            status.successful, status.total
        );
        Ok(status)
    }

    /// Move every misplaced key to its owner under the current partition.
    ///
    /// Each holder receives one instruction listing its keys per destination.
    pub async fn rebalance(&self) -> Result<RebalanceReport> {
        let explored = self.explore_cluster().await?;

        let mut plan: HashMap<String, HashMap<String, KeyMove>> = HashMap::new();
        let mut misplaced_keys = 0;
        for (holder, keys) in &explored.keys {
            for key in keys {
                let owner = self.balancer.locate_key(key)?;
                let owner_id = owner.id();
                if &owner_id == holder {
                    continue;
                }
                misplaced_keys += 1;
                plan.entry(holder.clone())
                    .or_default()
                    .entry(owner_id)
                    .or_insert_with(|| KeyMove {
                        destination: owner.meta(),
                        keys: Vec::new(),
                    })
                    .keys
                    .push(key.clone());
            }
        }

        let mut key_counts = HashMap::new();
        let mut calls = Vec::new();
        for (holder, destinations) in plan {
            let node = match self.balancer.get_node(&holder) {
                Ok(node) => node,
                Err(e) => {
                    warn!("Skipping moves from {}: {}", holder, e);
                    continue;
                }
            };
            let request = MoveRequest {
                moves: destinations.into_values().collect(),
            };
            key_counts.insert(holder.clone(), request.key_count());
            calls.push((holder, async move { node.move_keys(request).await }));
        }
        let instructions = calls.len();

        let (acknowledged, move_status) = self.fan_out("move_keys", calls).await;
        let moved_keys = acknowledged
            .keys()
            .filter_map(|id| key_counts.get(id))
            .sum();
        metrics::record_keys_moved(moved_keys);
        info!(
            "Rebalance: {} misplaced keys, {} moved via {} instructions",
            misplaced_keys, moved_keys, instructions
        );

        Ok(RebalanceReport {
            misplaced_keys,
            moved_keys,
            instructions,
            explore_status: explored.status,
            move_status,
        })
    }

    /// Run one call per node concurrently and wait for all of them.
    ///
    /// Each call is bounded by the fan-out timeout; failures are recorded in
    /// the status instead of aborting the whole operation.
    async fn fan_out<T, F>(
        &self,
        operation: &'static str,
        calls: Vec<(String, F)>,
    ) -> (HashMap<String, T>, FanoutStatus)
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let started = Instant::now();
        let mut status = FanoutStatus::new(calls.len());
        let collector = Arc::new(FanoutCollector::new());
        let timeout = self.config.fanout_timeout();
        let node_ids: Vec<String> = calls.iter().map(|(id, _)| id.clone()).collect();

        let mut tasks = JoinSet::new();
        for (node_id, call) in calls {
            let semaphore = Arc::clone(&self.semaphore);
            let collector = Arc::clone(&collector);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = match tokio::time::timeout(timeout, call).await {
                    Ok(Ok(value)) => NodeOutcome::Success(value),
                    Ok(Err(e)) => NodeOutcome::Failure(NodeFailure {
                        node_id: node_id.clone(),
                        reason: e.to_string(),
                        is_timeout: false,
                    }),
                    Err(_) => NodeOutcome::Failure(NodeFailure {
                        node_id: node_id.clone(),
                        reason: format!("no reply within {}ms", timeout.as_millis()),
                        is_timeout: true,
                    }),
                };
                collector.put(node_id, outcome);
            });
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!("{} task did not complete: {}", operation, e);
            }
        }

        let mut outcomes = collector.take();
        let mut results = HashMap::new();
        for node_id in node_ids {
            let outcome = outcomes.remove(&node_id).unwrap_or_else(|| {
                NodeOutcome::Failure(NodeFailure {
                    node_id: node_id.clone(),
                    reason: "task aborted".to_string(),
                    is_timeout: false,
                })
            });
            match outcome {
                NodeOutcome::Success(value) => {
                    status.record_success();
                    results.insert(node_id, value);
                }
                NodeOutcome::Failure(failure) => {
                    warn!("{}: {} failed: {}", failure.node_id, operation, failure.reason);
                    metrics::record_fanout_failure(operation, &failure.node_id, failure.is_timeout);
                    status.record_failure(failure);
                }
            }
        }

        metrics::record_fanout(operation, status.total, status.failed, started.elapsed());
        if !status.all_succeeded() {
            warn!(
                "{} returned partial results: {}/{} nodes failed",
                operation, status.failed, status.total
            );
        }
        (results, status)
    }
}
