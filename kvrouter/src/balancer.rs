//! Cluster registry
//!
//! Owns the authoritative node set and the partition of the curve's index
//! space. One `RwLock` guards both, so lookups run concurrently while
//! membership changes are serialized and always leave the partition in step
//! with the node table.

use crate::config::BalancerConfig;
use crate::error::{Result, RouterError};
use crate::metrics;
use crate::node::Node;
use crate::sfc::{new_curve, Curve, Group, KeyTransform, Optimizer, RangeOptimizer, Space, Transform};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry operations the router depends on
pub trait Balancer: Send + Sync + fmt::Debug {
    /// Insert a node, recomputing the partition right away if asked to
    fn add_node(&self, node: Arc<dyn Node>, reoptimize_now: bool) -> Result<()>;

    /// Delete a node and recompute the partition
    fn remove_node(&self, id: &str) -> Result<()>;

    /// Replace the whole node set; on error the registry is left untouched
    fn set_nodes(&self, nodes: Vec<Arc<dyn Node>>) -> Result<()>;

    /// Node owning `key` under the current partition
    fn locate_key(&self, key: &str) -> Result<Arc<dyn Node>>;

    /// Snapshot of every registered node, in enumeration order
    fn nodes(&self) -> Result<Vec<Arc<dyn Node>>>;

    fn get_node(&self, id: &str) -> Result<Arc<dyn Node>>;

    /// Recompute the partition from the nodes' current weights
    fn optimize(&self) -> Result<()>;
}

/// Node table plus the partition computed from it
#[derive(Clone, Default)]
struct Registry {
    order: Vec<String>,
    nodes: HashMap<String, Arc<dyn Node>>,
    space: Space,
}

impl Registry {
    fn insert(&mut self, node: Arc<dyn Node>) -> Result<()> {
        let meta = node.meta();
        if self.nodes.contains_key(&meta.id) {
            return Err(RouterError::DuplicateNode(meta.id));
        }
        meta.validate()?;
        self.order.push(meta.id.clone());
        self.nodes.insert(meta.id, node);
        Ok(())
    }

    fn weights(&self) -> Vec<(String, f64)> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|n| (id.clone(), n.power())))
            .collect()
    }
}

/// Registry partitioned along a space-filling curve
pub struct SfcBalancer {
    curve: Box<dyn Curve>,
    transform: Box<dyn Transform>,
    optimizer: Box<dyn Optimizer>,
    state: RwLock<Registry>,
}

impl SfcBalancer {
    /// Build the registry from balancer settings, with the default key
    /// transform and range optimizer
    pub fn new(config: &BalancerConfig) -> Result<Self> {
        let curve = new_curve(config.curve, config.dimensions, config.size)?;
        info!(
            "Balancer using {} curve, {} dimensions, size {}",
            config.curve, config.dimensions, config.size
        );
        Ok(Self::with_parts(
            curve,
            Box::new(KeyTransform),
            Box::new(RangeOptimizer),
        ))
    }

    /// Build the registry from explicit components
    pub fn with_parts(
        curve: Box<dyn Curve>,
        transform: Box<dyn Transform>,
        optimizer: Box<dyn Optimizer>,
    ) -> Self {
        Self {
            curve,
            transform,
            optimizer,
            state: RwLock::new(Registry::default()),
        }
    }

    /// Snapshot of the current index ranges
    pub fn groups(&self) -> Vec<Group> {
        self.state.read().space.groups().to_vec()
    }

    /// Curve index of a key; independent of membership
    pub fn key_index(&self, key: &str) -> Result<u64> {
        let coords = self
            .transform
            .coordinates(key, self.curve.dimensions(), self.curve.size());
        self.curve.encode(&coords)
    }

    fn reoptimize(&self, registry: &mut Registry) -> Result<()> {
        registry.space = self
            .optimizer
            .optimize(&registry.weights(), self.curve.length())?;
        debug!(
            "Partition recomputed: {} ranges over {} indices",
            registry.space.groups().len(),
            self.curve.length()
        );
        Ok(())
    }

    /// Swap in a registry that was fully built off to the side
    fn commit(&self, live: &mut Registry, staged: Registry, reoptimized: bool) {
        *live = staged;
        if reoptimized {
            metrics::record_reoptimize(live.order.len());
        } else {
            metrics::record_registry_size(live.order.len());
        }
    }
}

impl fmt::Debug for SfcBalancer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("SfcBalancer")
            .field("curve", &self.curve)
            .field("nodes", &state.order)
            .field("groups", &state.space.groups().len())
            .finish()
    }
}

impl Balancer for SfcBalancer {
    fn add_node(&self, node: Arc<dyn Node>, reoptimize_now: bool) -> Result<()> {
        let mut state = self.state.write();
        let id = node.id();
        let mut staged = state.clone();
        staged.insert(node)?;
        if reoptimize_now {
            self.reoptimize(&mut staged)?;
        }
        self.commit(&mut state, staged, reoptimize_now);
        info!("Node {} added ({} nodes)", id, state.order.len());
        Ok(())
    }

    fn remove_node(&self, id: &str) -> Result<()> {
        let mut state = self.state.write();
        if !state.nodes.contains_key(id) {
            return Err(RouterError::NodeNotFound(id.to_string()));
        }
        let mut staged = state.clone();
        staged.nodes.remove(id);
        staged.order.retain(|n| n != id);
        self.reoptimize(&mut staged)?;
        self.commit(&mut state, staged, true);
        info!("Node {} removed ({} nodes)", id, state.order.len());
        Ok(())
    }

    fn set_nodes(&self, nodes: Vec<Arc<dyn Node>>) -> Result<()> {
        let mut state = self.state.write();
        let mut staged = Registry::default();
        for node in nodes {
            staged.insert(node)?;
        }
        self.reoptimize(&mut staged)?;
        self.commit(&mut state, staged, true);
        info!("Node set replaced ({} nodes)", state.order.len());
        Ok(())
    }

    fn locate_key(&self, key: &str) -> Result<Arc<dyn Node>> {
        let index = self.key_index(key)?;
        let state = self.state.read();
        if state.order.is_empty() {
            return Err(RouterError::EmptyCluster);
        }
        let id = state.space.locate(index).ok_or_else(|| {
            RouterError::Internal(format!("no range covers index {}; partition not optimized", index))
        })?;
        state
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| RouterError::WrongType(format!("range owner {} is not a registered node", id)))
    }

    fn nodes(&self) -> Result<Vec<Arc<dyn Node>>> {
        let state = self.state.read();
        state
            .order
            .iter()
            .map(|id| {
                state
                    .nodes
                    .get(id)
                    .cloned()
                    .ok_or_else(|| RouterError::WrongType(format!("{} missing from node table", id)))
            })
            .collect()
    }

    fn get_node(&self, id: &str) -> Result<Arc<dyn Node>> {
        self.state
            .read()
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| RouterError::NodeNotFound(id.to_string()))
    }

    fn optimize(&self) -> Result<()> {
        let mut state = self.state.write();
        let mut staged = state.clone();
        self.reoptimize(&mut staged)?;
        self.commit(&mut state, staged, true);
        Ok(())
    }
}
