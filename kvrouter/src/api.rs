//! HTTP gateway over the router
//!
//! Every router error becomes a 500 with the error text as body; malformed
//! request bodies are rejected with 400.

use crate::router::{FanoutStatus, RebalanceReport, Router};
use crate::types::NodeMeta;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub prometheus: Option<PrometheusHandle>,
}

/// Gateway error carrying the status and a plain text body
pub struct ApiError(StatusCode, String);

impl From<crate::error::RouterError> for ApiError {
    fn from(e: crate::error::RouterError) -> Self {
        tracing::error!("Request failed: {}", e);
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub rpc_address: String,
}

/// GET /nodes
pub async fn list_nodes(State(state): State<AppState>) -> ApiResult<Json<Vec<NodeMeta>>> {
    Ok(Json(state.router.list_nodes()?))
}

/// POST /put/:key
pub async fn put(
    Path(key): Path<String>,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<&'static str> {
    state.router.store(&key, body.to_vec()).await?;
    Ok("OK")
}

/// GET /get/:key
pub async fn get_value(
    Path(key): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Vec<u8>> {
    Ok(state.router.receive(&key).await?)
}

/// GET /list
pub async fn list_keys(
    State(state): State<AppState>,
) -> ApiResult<Json<HashMap<String, Vec<String>>>> {
    let listing = state.router.explore_cluster().await?;
    Ok(Json(listing.keys))
}

/// POST /nodes
pub async fn register_node(
    State(state): State<AppState>,
    request: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Json<NodeMeta>> {
    let Json(request) = request.map_err(|e| ApiError(StatusCode::BAD_REQUEST, e.body_text()))?;
    if request.rpc_address.trim().is_empty() {
        return Err(ApiError(
            StatusCode::BAD_REQUEST,
            "rpc_address must not be empty".into(),
        ));
    }
    Ok(Json(state.router.register_node(&request.rpc_address).await?))
}

/// DELETE /nodes/:id
pub async fn deregister_node(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<&'static str> {
    state.router.deregister_node(&id)?;
    Ok("OK")
}

/// POST /refresh
pub async fn refresh_weights(State(state): State<AppState>) -> ApiResult<Json<FanoutStatus>> {
    Ok(Json(state.router.refresh_weights().await?))
}

/// POST /rebalance
pub async fn rebalance(State(state): State<AppState>) -> ApiResult<Json<RebalanceReport>> {
    Ok(Json(state.router.rebalance().await?))
}

/// GET /metrics
pub async fn prometheus_scrape(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            (StatusCode::OK, headers, handle.render()).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub struct ApiServer {
    router: Arc<Router>,
    prometheus: Option<PrometheusHandle>,
}

impl ApiServer {
    pub fn new(router: Arc<Router>) -> Self {
        Self {
            router,
            prometheus: None,
        }
    }

    /// Expose the recorder behind `handle` on GET /metrics
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    pub fn router(&self) -> axum::Router {
        let state = AppState {
            router: self.router.clone(),
            prometheus: self.prometheus.clone(),
        };

        let mut app = axum::Router::new()
            .route("/nodes", get(list_nodes).post(register_node))
            .route("/nodes/:id", delete(deregister_node))
            .route("/put/:key", post(put))
            .route("/get/:key", get(get_value))
            .route("/list", get(list_keys))
            .route("/rebalance", post(rebalance))
            .route("/refresh", post(refresh_weights));
        if self.prometheus.is_some() {
            app = app.route("/metrics", get(prometheus_scrape));
        }

        app.with_state(state).layer(TraceLayer::new_for_http())
    }

    pub async fn serve(self, addr: &str) -> crate::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            crate::RouterError::Config(format!("Failed to bind {}: {}", addr, e))
        })?;
        tracing::info!("Gateway listening on {}", addr);

        axum::serve(listener, self.router())
            .await
            .map_err(|e| crate::RouterError::Internal(e.to_string()))?;

        Ok(())
    }
}
