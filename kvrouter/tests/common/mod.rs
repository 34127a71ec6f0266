//! Shared fixtures: an in-memory storage node served over tarpc

#![allow(dead_code)]

use futures::{future, StreamExt};
use kvrouter::node::connect_client;
use kvrouter::{ClientConfig, KeyValue, MoveRequest, NodeMeta, NodeRpc, NodeRpcClient, RouterError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tarpc::context::Context;
use tarpc::server::{BaseChannel, Channel};
use tarpc::tokio_serde::formats::Bincode;

/// Storage node keeping everything in a map
#[derive(Clone)]
pub struct MemoryNode {
    meta: Arc<Mutex<NodeMeta>>,
    data: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryNode {
    pub fn new(id: &str, rpc_address: &str, power: f64) -> Self {
        Self {
            meta: Arc::new(Mutex::new(NodeMeta::new(
                id,
                format!("{}.local:8080", id),
                rpc_address,
                power,
                power,
            ))),
            data: Arc::new(Mutex::new(BTreeMap::new())),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> String {
        self.meta.lock().id.clone()
    }

    /// Current metadata, as `meta` would report it
    pub fn snapshot(&self) -> NodeMeta {
        self.meta.lock().clone()
    }

    pub fn set_power(&self, power: f64) {
        let mut meta = self.meta.lock();
        meta.power = power;
        meta.capacity = power;
    }

    pub fn set_id(&self, id: &str) {
        self.meta.lock().id = id.to_string();
    }

    /// Make every data operation fail with `Storage`
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn insert(&self, key: &str, value: &[u8]) {
        self.data.lock().insert(key.to_string(), value.to_vec());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.data.lock().keys().cloned().collect()
    }

    fn check(&self) -> Result<(), RouterError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RouterError::Storage(format!("{} is failing", self.id())));
        }
        Ok(())
    }
}

impl NodeRpc for MemoryNode {
    async fn store(self, _: Context, kv: KeyValue) -> Result<(), RouterError> {
        self.check()?;
        self.data.lock().insert(kv.key, kv.value);
        Ok(())
    }

    async fn store_pairs(self, _: Context, kvs: Vec<KeyValue>) -> Result<(), RouterError> {
        self.check()?;
        let mut data = self.data.lock();
        for kv in kvs {
            data.insert(kv.key, kv.value);
        }
        Ok(())
    }

    async fn receive(self, _: Context, key: String) -> Result<Vec<u8>, RouterError> {
        self.check()?;
        self.get(&key).ok_or(RouterError::KeyNotFound(key))
    }

    async fn explore(self, _: Context) -> Result<Vec<String>, RouterError> {
        self.check()?;
        Ok(self.keys())
    }

    async fn remove(self, _: Context, key: String) -> Result<(), RouterError> {
        self.check()?;
        self.data.lock().remove(&key);
        Ok(())
    }

    async fn move_keys(self, _: Context, request: MoveRequest) -> Result<(), RouterError> {
        self.check()?;
        for key_move in request.moves {
            let pairs: Vec<KeyValue> = {
                let data = self.data.lock();
                key_move
                    .keys
                    .iter()
                    .filter_map(|k| data.get(k).map(|v| KeyValue::new(k.clone(), v.clone())))
                    .collect()
            };
            let client =
                connect_client(&key_move.destination.rpc_address, &ClientConfig::default()).await?;
            client
                .store_pairs(tarpc::context::current(), pairs)
                .await
                .map_err(RouterError::from)??;

            let mut data = self.data.lock();
            for key in &key_move.keys {
                data.remove(key);
            }
        }
        Ok(())
    }

    async fn meta(self, _: Context) -> NodeMeta {
        self.snapshot()
    }
}

/// Serve `node` over an in-process channel and return a client bound to it
pub fn serve_in_process(node: MemoryNode) -> NodeRpcClient {
    let (client_transport, server_transport) = tarpc::transport::channel::unbounded();
    tokio::spawn(
        BaseChannel::with_defaults(server_transport)
            .execute(node.serve())
            .for_each(|response| async move {
                tokio::spawn(response);
            }),
    );
    NodeRpcClient::new(tarpc::client::Config::default(), client_transport).spawn()
}

/// Start a TCP node on a random local port; its metadata carries that port
pub async fn serve_tcp(id: &str, power: f64) -> MemoryNode {
    let mut listener = tarpc::serde_transport::tcp::listen("127.0.0.1:0", Bincode::default)
        .await
        .unwrap();
    listener.config_mut().max_frame_length(usize::MAX);
    let addr = listener.local_addr().to_string();

    let node = MemoryNode::new(id, &addr, power);
    let served = node.clone();
    tokio::spawn(
        listener
            .filter_map(|conn| future::ready(conn.ok()))
            .map(BaseChannel::with_defaults)
            .for_each(move |channel| {
                let served = served.clone();
                async move {
                    tokio::spawn(channel.execute(served.serve()).for_each(
                        |response| async move {
                            tokio::spawn(response);
                        },
                    ));
                }
            }),
    );
    node
}

/// A local address nothing listens on
pub async fn dead_address() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);
    addr
}

pub fn fast_client_config() -> ClientConfig {
    ClientConfig {
        connect_timeout_ms: 500,
        request_timeout_ms: 1000,
    }
}
