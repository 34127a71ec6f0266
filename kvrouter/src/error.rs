//! Router error types
//!
//! A single error enum is used on both sides of the RPC boundary, so it is
//! `Clone` and serializable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while routing keys or talking to storage nodes
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RouterError {
    #[error("Node already registered: {0}")]
    DuplicateNode(String),

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Cluster has no nodes")]
    EmptyCluster,

    #[error("Node unavailable: {0}")]
    NodeUnavailable(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The partition resolved to something that is not a registered node.
    #[error("Wrong node type: {0}")]
    WrongType(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            RouterError::DuplicateNode(_) => "duplicate_node",
            RouterError::InvalidNode(_) => "invalid_node",
            RouterError::NodeNotFound(_) => "node_not_found",
            RouterError::EmptyCluster => "empty_cluster",
            RouterError::NodeUnavailable(_) => "node_unavailable",
            RouterError::KeyNotFound(_) => "key_not_found",
            RouterError::WrongType(_) => "wrong_type",
            RouterError::Storage(_) => "storage",
            RouterError::Config(_) => "config",
            RouterError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for RouterError {
    fn from(err: std::io::Error) -> Self {
        RouterError::NodeUnavailable(err.to_string())
    }
}

impl From<tarpc::client::RpcError> for RouterError {
    fn from(err: tarpc::client::RpcError) -> Self {
        RouterError::NodeUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;
