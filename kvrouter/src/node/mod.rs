//! Node contract
//!
//! The registry and router only see nodes through the [`Node`] trait, so the
//! remote implementation can be swapped for an in-process one in tests.

mod remote;

pub use remote::{connect_client, RemoteNode};

use crate::error::Result;
use crate::types::{KeyValue, MoveRequest, NodeMeta};
use async_trait::async_trait;
use std::fmt;

/// A storage node as seen by the router
#[async_trait]
pub trait Node: Send + Sync + fmt::Debug {
    /// Registry key
    fn id(&self) -> String;

    /// Relative share of the key space
    fn power(&self) -> f64;

    /// Secondary weight
    fn capacity(&self) -> f64;

    /// Snapshot of the node's metadata
    fn meta(&self) -> NodeMeta;

    /// Pick up weight changes from the node itself.
    ///
    /// Nodes without a remote source of truth report their current metadata.
    async fn refresh_meta(&self) -> Result<NodeMeta> {
        Ok(self.meta())
    }

    async fn store(&self, key: &str, value: Vec<u8>) -> Result<()>;

    async fn store_pairs(&self, pairs: Vec<KeyValue>) -> Result<()>;

    async fn receive(&self, key: &str) -> Result<Vec<u8>>;

    /// Every key held by the node
    async fn explore(&self) -> Result<Vec<String>>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Instruct the node to hand the listed keys to their destinations
    async fn move_keys(&self, request: MoveRequest) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process node used by registry and router unit tests

    use super::*;
    use crate::error::RouterError;
    use parking_lot::{Mutex, RwLock};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug)]
    pub struct MockNode {
        meta: RwLock<NodeMeta>,
        data: Mutex<BTreeMap<String, Vec<u8>>>,
        moves: Mutex<Vec<MoveRequest>>,
        failing: AtomicBool,
        delay: Option<Duration>,
    }

    impl MockNode {
        pub fn new(id: &str, power: f64) -> Arc<Self> {
            Arc::new(Self::build(id, power, None))
        }

        pub fn slow(id: &str, power: f64, delay: Duration) -> Arc<Self> {
            Arc::new(Self::build(id, power, Some(delay)))
        }

        fn build(id: &str, power: f64, delay: Option<Duration>) -> Self {
            Self {
                meta: RwLock::new(NodeMeta::new(
                    id,
                    format!("{}.local:8080", id),
                    format!("{}.local:9090", id),
                    power,
                    power,
                )),
                data: Mutex::new(BTreeMap::new()),
                moves: Mutex::new(Vec::new()),
                failing: AtomicBool::new(false),
                delay,
            }
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn set_power(&self, power: f64) {
            self.meta.write().power = power;
        }

        pub fn insert(&self, key: &str, value: &[u8]) {
            self.data.lock().insert(key.to_string(), value.to_vec());
        }

        pub fn keys(&self) -> Vec<String> {
            self.data.lock().keys().cloned().collect()
        }

        pub fn moves(&self) -> Vec<MoveRequest> {
            self.moves.lock().clone()
        }

        async fn check(&self) -> Result<()> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(RouterError::NodeUnavailable(self.id()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Node for MockNode {
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

        async fn refresh_meta(&self) -> Result<NodeMeta> {
            self.check().await?;
            Ok(self.meta())
        }

        async fn store(&self, key: &str, value: Vec<u8>) -> Result<()> {
            self.check().await?;
            self.data.lock().insert(key.to_string(), value);
            Ok(())
        }

        async fn store_pairs(&self, pairs: Vec<KeyValue>) -> Result<()> {
            self.check().await?;
            let mut data = self.data.lock();
            for kv in pairs {
                data.insert(kv.key, kv.value);
            }
            Ok(())
        }

        async fn receive(&self, key: &str) -> Result<Vec<u8>> {
            self.check().await?;
            self.data
                .lock()
                .get(key)
                .cloned()
                .ok_or_else(|| RouterError::KeyNotFound(key.to_string()))
        }

        async fn explore(&self) -> Result<Vec<String>> {
            self.check().await?;
            Ok(self.keys())
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.check().await?;
            self.data.lock().remove(key);
            Ok(())
        }

        async fn move_keys(&self, request: MoveRequest) -> Result<()> {
            self.check().await?;
            self.moves.lock().push(request);
            Ok(())
        }
    }
}
