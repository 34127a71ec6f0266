//! Node descriptors and RPC wire types
//!
//! These types travel over the tarpc transport and are returned by the
//! gateway, so they all derive Serialize/Deserialize.

use crate::error::{Result, RouterError};
use serde::{Deserialize, Serialize};

/// Self-reported metadata of a storage node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    /// Unique, stable identity; the registry key
    pub id: String,
    /// Client-facing address (informational)
    pub address: String,
    /// Address of the node's RPC endpoint
    pub rpc_address: String,
    /// Relative weight used to size the node's share of the key space
    pub power: f64,
    /// Secondary weight, reported independently of power
    pub capacity: f64,
}

impl NodeMeta {
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        rpc_address: impl Into<String>,
        power: f64,
        capacity: f64,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            rpc_address: rpc_address.into(),
            power,
            capacity,
        }
    }

    /// Check that the descriptor can be placed in a partition
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(RouterError::InvalidNode("empty node id".to_string()));
        }
        validate_power(&self.id, self.power)
    }
}

/// Power must be a finite, strictly positive number
pub(crate) fn validate_power(id: &str, power: f64) -> Result<()> {
    if !power.is_finite() || power <= 0.0 {
        return Err(RouterError::InvalidNode(format!(
            "node {} has invalid power {}",
            id, power
        )));
    }
    Ok(())
}

/// A single key/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Keys that should be transferred to one destination node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyMove {
    pub destination: NodeMeta,
    pub keys: Vec<String>,
}

/// Transfer instruction sent to the node currently holding the keys
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MoveRequest {
    pub moves: Vec<KeyMove>,
}

impl MoveRequest {
    /// Total number of keys across all destinations
    pub fn key_count(&self) -> usize {
        self.moves.iter().map(|m| m.keys.len()).sum()
    }
}
