//! Router observability metrics
//!
//! Prometheus-compatible metrics recorded through the `metrics` facade:
//! - `kvrouter_node_call_duration_seconds{method}`: latency of node calls
//! - `kvrouter_node_calls_total{node, method, outcome}`: `outcome` is `ok` or
//!   the error type
//! - `kvrouter_fanout_duration_seconds{operation}` and participant counts for
//!   cluster-wide queries
//! - Registry size, partition recomputations and keys moved by rebalancing

use crate::error::Result;
use std::time::{Duration, Instant};

/// Record one finished call to a storage node
pub fn record_node_call(method: &'static str, node: &str, outcome: &'static str, duration: Duration) {
    metrics::histogram!("kvrouter_node_call_duration_seconds", "method" => method)
        .record(duration.as_secs_f64());
    metrics::counter!(
        "kvrouter_node_calls_total",
        "node" => node.to_string(),
        "method" => method,
        "outcome" => outcome,
    )
    .increment(1);
}

/// Record one completed fan-out over `nodes` participants
pub fn record_fanout(operation: &'static str, nodes: usize, failed: usize, duration: Duration) {
    metrics::histogram!("kvrouter_fanout_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
    metrics::counter!(
        "kvrouter_fanout_participants_total",
        "operation" => operation,
        "result" => "ok",
    )
    .increment(nodes.saturating_sub(failed) as u64);
    metrics::counter!(
        "kvrouter_fanout_participants_total",
        "operation" => operation,
        "result" => "failed",
    )
    .increment(failed as u64);
}

/// Record a node dropped from a fan-out result
pub fn record_fanout_failure(operation: &'static str, node_id: &str, is_timeout: bool) {
    metrics::counter!(
        "kvrouter_fanout_failures_total",
        "operation" => operation,
        "node" => node_id.to_string(),
        "timeout" => is_timeout.to_string(),
    )
    .increment(1);
}

/// Update the registered node gauge
pub fn record_registry_size(size: usize) {
    metrics::gauge!("kvrouter_registry_nodes").set(size as f64);
}

/// Record a partition recomputation
pub fn record_reoptimize(nodes: usize) {
    metrics::counter!("kvrouter_reoptimize_total").increment(1);
    record_registry_size(nodes);
}

/// Record keys instructed to move during a rebalance
pub fn record_keys_moved(count: usize) {
    metrics::counter!("kvrouter_rebalance_keys_moved_total").increment(count as u64);
}

/// Times one call to a storage node
pub struct CallTimer {
    method: &'static str,
    node: String,
    start: Instant,
}

impl CallTimer {
    pub fn start(method: &'static str, node: &str) -> Self {
        Self {
            method,
            node: node.to_string(),
            start: Instant::now(),
        }
    }

    /// Record duration and outcome, then hand the result back
    pub fn finish<T>(self, result: Result<T>) -> Result<T> {
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.error_type(),
        };
        record_node_call(self.method, &self.node, outcome, self.start.elapsed());
        result
    }
}
