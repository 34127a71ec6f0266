//! Router configuration
//!
//! Default config file: `kvrouter.toml`
//!
//! ```toml
//! seed_nodes = ["127.0.0.1:9090"]
//!
//! [server]
//! bind_addr = "127.0.0.1:8080"
//!
//! [balancer]
//! curve = "hilbert"
//! dimensions = 2
//! size = 1024
//!
//! [client]
//! connect_timeout_ms = 5000
//! request_timeout_ms = 10000
//!
//! [router]
//! fanout_timeout_ms = 5000
//! max_concurrent_requests = 16
//! ```

use crate::error::{Result, RouterError};
use crate::sfc::CurveType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub balancer: BalancerConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub router: RouterConfig,
    /// RPC addresses of nodes registered at startup
    #[serde(default)]
    pub seed_nodes: Vec<String>,
}

impl Config {
    /// Load config from file path, or fall back to defaults if it is missing
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            RouterError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse config from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| RouterError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.balancer.validate()?;
        if self.router.max_concurrent_requests == 0 {
            return Err(RouterError::Config(
                "router.max_concurrent_requests must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// HTTP gateway settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Partitioning settings; fixed for the lifetime of the registry
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BalancerConfig {
    /// Space filling curve type
    #[serde(default)]
    pub curve: CurveType,

    /// Amount of curve dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: u32,

    /// Cells per dimension (power of two)
    #[serde(default = "default_size")]
    pub size: u64,
}

fn default_dimensions() -> u32 {
    2
}

fn default_size() -> u64 {
    1024
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            curve: CurveType::default(),
            dimensions: default_dimensions(),
            size: default_size(),
        }
    }
}

impl BalancerConfig {
    pub fn validate(&self) -> Result<()> {
        crate::sfc::new_curve(self.curve, self.dimensions, self.size).map(|_| ())
    }
}

/// Remote node client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Per-request deadline in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_request_timeout() -> u64 {
    10000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl ClientConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Fan-out settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterConfig {
    /// Upper bound on one participant of a cluster-wide query
    #[serde(default = "default_fanout_timeout")]
    pub fanout_timeout_ms: u64,

    /// Maximum concurrent node requests during fan-out
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

fn default_fanout_timeout() -> u64 {
    5000
}

fn default_max_concurrent() -> usize {
    16
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            fanout_timeout_ms: default_fanout_timeout(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

impl RouterConfig {
    pub fn fanout_timeout(&self) -> Duration {
        Duration::from_millis(self.fanout_timeout_ms)
    }
}
