//! Typed HTTP client for the gateway surface.

use super::types::{
    ChatRequest, ChatResponse, EvalResult, LabelAssistRequest, LabelAssistResponse,
    SearchRequest, SearchResponse,
};
use crate::config::{HttpClientConfig, SearchSphereConfig};
use crate::error::ClientError;
use crate::gateway::{LatencyTimer, inject_latency};
use crate::groundtruth::GroundTruthDocument;
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Calls the gateway's `/api/*` routes.
///
/// Every call takes a cancellation token; a cancelled call resolves to
/// [`ClientError::Cancelled`] and its response is never decoded.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: Client,
    base: String,
}

impl GatewayClient {
    pub fn new(base: &str, http: &HttpClientConfig) -> Result<Self, ClientError> {
        let client = http.build_client().map_err(|e| ClientError::Transport {
            operation: "Client setup",
            message: e.to_string(),
        })?;
        Ok(Self::with_client(client, base))
    }

    pub fn with_client(http: Client, base: &str) -> Self {
        Self {
            http,
            base: base.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &SearchSphereConfig) -> Result<Self, ClientError> {
        Self::new(&config.client_base(), &config.http)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Run a search. A blank query is sent as `*`.
    pub async fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse, ClientError> {
        let builder = self.http.post(self.url("/api/search")).json(&request.effective());
        let value = self.send("Search", builder, true, cancel).await?;
        decode("Search", value)
    }

    pub async fn chat(
        &self,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ClientError> {
        let builder = self.http.post(self.url("/api/chat")).json(request);
        let value = self.send("Chat", builder, true, cancel).await?;
        decode("Chat", value)
    }

    /// Fetch the raw metrics document.
    pub async fn metrics(&self, cancel: &CancellationToken) -> Result<Value, ClientError> {
        let builder = self.http.get(self.url("/api/metrics"));
        self.send("Metrics", builder, false, cancel).await
    }

    pub async fn run_eval(
        &self,
        document: &GroundTruthDocument,
        cancel: &CancellationToken,
    ) -> Result<EvalResult, ClientError> {
        self.post_typed("Run eval", "/api/run-eval", &document.to_json(), cancel)
            .await
    }

    pub async fn label_assist(
        &self,
        request: &LabelAssistRequest,
        cancel: &CancellationToken,
    ) -> Result<LabelAssistResponse, ClientError> {
        self.post_typed("Label assist", "/api/eval/label-assist", request, cancel)
            .await
    }

    async fn post_typed<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<T, ClientError> {
        let builder = self.http.post(self.url(path)).json(body);
        let value = self.send(operation, builder, false, cancel).await?;
        decode(operation, value)
    }

    async fn send(
        &self,
        operation: &'static str,
        builder: RequestBuilder,
        measure: bool,
        cancel: &CancellationToken,
    ) -> Result<Value, ClientError> {
        let timer = LatencyTimer::start();

        let call = async {
            let response = builder.send().await.map_err(|e| ClientError::Transport {
                operation,
                message: e.to_string(),
            })?;
            let status = response.status();
            if !status.is_success() {
                return Err(ClientError::Status {
                    operation,
                    status: status.as_u16(),
                });
            }
            response
                .json::<Value>()
                .await
                .map_err(|e| ClientError::Decode {
                    operation,
                    message: e.to_string(),
                })
        };

        let mut value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled { operation }),
            result = call => result?,
        };

        let elapsed_ms = timer.elapsed_ms();
        if measure && let Value::Object(object) = &mut value {
            inject_latency(object, elapsed_ms);
        }
        debug!(operation, elapsed_ms, "Gateway call completed");
        Ok(value)
    }
}

fn decode<T: DeserializeOwned>(operation: &'static str, value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::Decode {
        operation,
        message: e.to_string(),
    })
}
