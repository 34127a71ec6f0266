//! End-to-end HTTP gateway tests
//!
//! Each test starts a real axum server on a random port in front of TCP
//! storage nodes and drives it with reqwest.

mod common;

use common::{dead_address, fast_client_config, serve_tcp, MemoryNode};
use kvrouter::{ApiServer, BalancerConfig, NodeMeta, RebalanceReport, Router, RouterConfig, SfcBalancer};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

async fn start_gateway() -> (Arc<Router>, String) {
    let balancer = SfcBalancer::new(&BalancerConfig::default()).unwrap();
    let router = Arc::new(
        Router::new(Arc::new(balancer), RouterConfig::default())
            .with_client_config(fast_client_config()),
    );
    let app = ApiServer::new(router.clone()).router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    (router, base_url)
}

async fn register(client: &Client, base: &str, node: &MemoryNode) -> NodeMeta {
    let resp = client
        .post(format!("{}/nodes", base))
        .json(&json!({ "rpc_address": node.snapshot().rpc_address }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn test_register_put_get() {
    let (_, base) = start_gateway().await;
    let client = Client::new();
    let n1 = serve_tcp("n1", 1.0).await;
    let n2 = serve_tcp("n2", 1.0).await;

    let meta = register(&client, &base, &n1).await;
    assert_eq!(meta.id, "n1");
    register(&client, &base, &n2).await;

    let resp = client
        .post(format!("{}/put/greeting", base))
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "OK");

    let resp = client
        .get(format!("{}/get/greeting", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"hello");

    let stored = [n1.get("greeting"), n2.get("greeting")];
    assert_eq!(stored.iter().filter(|v| v.is_some()).count(), 1);
}

#[tokio::test]
async fn test_nodes_and_list() {
    let (router, base) = start_gateway().await;
    let client = Client::new();
    let n1 = serve_tcp("n1", 1.0).await;
    let n2 = serve_tcp("n2", 3.0).await;
    register(&client, &base, &n1).await;
    register(&client, &base, &n2).await;

    let nodes: Vec<NodeMeta> = client
        .get(format!("{}/nodes", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes.iter().find(|m| m.id == "n2").unwrap().power, 3.0);

    for i in 0..10 {
        router.store(&format!("k{}", i), vec![i]).await.unwrap();
    }
    let listing: HashMap<String, Vec<String>> = client
        .get(format!("{}/list", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let total: usize = listing.values().map(|keys| keys.len()).sum();
    assert_eq!(total, 10);
}

#[tokio::test]
async fn test_errors_map_to_status_codes() {
    let (_, base) = start_gateway().await;
    let client = Client::new();

    let resp = client
        .get(format!("{}/get/anything", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.text().await.unwrap().contains("no nodes"));

    let resp = client
        .post(format!("{}/nodes", base))
        .header("content-type", "application/json")
        .body("{\"wrong\": 1}")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .post(format!("{}/nodes", base))
        .json(&json!({ "rpc_address": dead_address().await }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_deregister_and_rebalance() {
    let (router, base) = start_gateway().await;
    let client = Client::new();
    let n1 = serve_tcp("n1", 1.0).await;
    register(&client, &base, &n1).await;
    for i in 0..20 {
        router.store(&format!("k{}", i), vec![i]).await.unwrap();
    }
    let n2 = serve_tcp("n2", 1.0).await;
    register(&client, &base, &n2).await;

    let resp = client
        .post(format!("{}/rebalance", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report: RebalanceReport = resp.json().await.unwrap();
    assert_eq!(report.moved_keys, n2.keys().len());

    let resp = client
        .delete(format!("{}/nodes/n2", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let nodes: Value = client
        .get(format!("{}/nodes", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(nodes.as_array().unwrap().len(), 1);
    assert_eq!(nodes[0]["id"], "n1");
}
