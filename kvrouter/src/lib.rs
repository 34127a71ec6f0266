//! kvrouter - Key routing for a cluster of key-value storage nodes
//!
//! Every key is owned by exactly one storage node. Ownership is decided by
//! projecting the key onto a space-filling curve and splitting the curve's
//! index range among nodes in proportion to their power.
//!
//! # Architecture
//!
//! - **SFC**: Hilbert/Morton curves, key transform and range optimizer
//! - **Balancer**: Cluster registry holding the node table and partition
//! - **Node**: Node contract and the tarpc-backed remote client
//! - **Service**: tarpc RPC interface every storage node serves
//! - **Router**: Single-key routing and cluster-wide fan-out
//! - **API**: Thin axum gateway over the router
//!
//! # Key Operations
//!
//! - Core: store, receive, remove, store_pairs
//! - Cluster: explore_cluster, list_nodes, rebalance
//! - Membership: register_node (self-registration), deregister_node,
//!   refresh_weights

pub mod api;
pub mod balancer;
pub mod config;
pub mod error;
pub mod metrics;
pub mod node;
pub mod router;
pub mod service;
pub mod sfc;
pub mod types;

pub use api::ApiServer;
pub use balancer::{Balancer, SfcBalancer};
pub use config::{BalancerConfig, ClientConfig, Config, RouterConfig, ServerConfig};
pub use error::{Result, RouterError};
pub use node::{Node, RemoteNode};
pub use router::{ClusterKeys, FanoutStatus, NodeFailure, RebalanceReport, Router};
pub use service::{NodeRpc, NodeRpcClient};
pub use sfc::CurveType;
pub use types::*;
