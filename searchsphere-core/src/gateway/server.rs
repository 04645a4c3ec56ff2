//! Gateway HTTP server built on axum.

use super::forwarder::Forwarder;
use super::reconcile::ForwardedResponse;
use super::{GatewayConfig, Operation};
use crate::config::SearchSphereConfig;
use crate::error::GatewayError;
use crate::origin::BackendOrigin;
use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::Method,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared, immutable gateway state handed to every handler.
#[derive(Debug, Clone)]
pub struct GatewayState {
    inner: Arc<GatewayInner>,
}

#[derive(Debug)]
struct GatewayInner {
    config: GatewayConfig,
    forwarder: Forwarder,
    started_at: DateTime<Utc>,
    shutdown: CancellationToken,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, forwarder: Forwarder) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                config,
                forwarder,
                started_at: Utc::now(),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Resolve the backend origin once and build the state from configuration.
    pub fn from_config(config: &SearchSphereConfig) -> Result<Self, GatewayError> {
        let origin = config.origin.resolve();
        let forwarder = Forwarder::new(origin, &config.http)?;
        Ok(Self::new(config.gateway.clone(), forwarder))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn forwarder(&self) -> &Forwarder {
        &self.inner.forwarder
    }

    pub fn origin(&self) -> &BackendOrigin {
        self.inner.forwarder.origin()
    }

    /// Cancelling this token stops the server and aborts in-flight forwards.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    /// Uptime in seconds since the state was created.
    pub fn uptime_secs(&self) -> u64 {
        let elapsed = Utc::now() - self.inner.started_at;
        elapsed.num_seconds().max(0) as u64
    }

    async fn forward(&self, operation: Operation, body: Bytes) -> ForwardedResponse {
        let cancel = self.inner.shutdown.child_token();
        self.inner.forwarder.forward(operation, body, &cancel).await
    }
}

/// Build the gateway router.
pub fn router(state: GatewayState) -> Router {
    let permissive_cors = state.config().permissive_cors;

    let router = Router::new()
        .route("/api/search", post(search_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/run-eval", post(run_eval_handler))
        .route("/api/eval/precision", post(run_eval_handler))
        .route("/api/eval/label-assist", post(label_assist_handler))
        .route("/api/label-assist", post(label_assist_handler))
        .route("/api/eval/{*rest}", post(eval_passthrough_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if permissive_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn search_handler(State(gw): State<GatewayState>, body: Bytes) -> ForwardedResponse {
    gw.forward(Operation::Search, body).await
}

async fn chat_handler(State(gw): State<GatewayState>, body: Bytes) -> ForwardedResponse {
    gw.forward(Operation::Chat, body).await
}

async fn metrics_handler(State(gw): State<GatewayState>) -> ForwardedResponse {
    gw.forward(Operation::Metrics, Bytes::new()).await
}

async fn run_eval_handler(State(gw): State<GatewayState>, body: Bytes) -> ForwardedResponse {
    gw.forward(Operation::RunEval, body).await
}

async fn label_assist_handler(State(gw): State<GatewayState>, body: Bytes) -> ForwardedResponse {
    gw.forward(Operation::LabelAssist, body).await
}

/// Any other `/api/eval/*` path is relayed verbatim. Precision runs are
/// routed through [`run_eval_handler`] so the document is validated first.
async fn eval_passthrough_handler(
    State(gw): State<GatewayState>,
    Path(rest): Path<String>,
    body: Bytes,
) -> ForwardedResponse {
    let cancel = gw.inner.shutdown.child_token();
    let path = format!("/api/eval/{}", rest.trim_start_matches('/'));
    gw.forwarder()
        .forward_path(Method::POST, &path, Some(body), &cancel)
        .await
}

/// Health check endpoint.
async fn health_handler(State(gw): State<GatewayState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "ok",
        "origin": gw.origin().as_str(),
        "uptime_secs": gw.uptime_secs(),
    });
    axum::Json(body)
}

/// Serve the gateway on an already-bound listener until shutdown.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: GatewayState,
) -> Result<(), std::io::Error> {
    let shutdown = state.shutdown_token();
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Start the gateway on the configured address.
///
/// Runs until the state's shutdown token is cancelled.
pub async fn run(state: GatewayState) -> Result<(), std::io::Error> {
    let addr = state.config().bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, origin = %state.origin(), "Gateway listening");
    serve(listener, state).await
}
