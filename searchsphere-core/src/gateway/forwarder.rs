//! Relays logical operations to the backend.

use super::Operation;
use super::latency::LatencyTimer;
use super::reconcile::{ForwardedResponse, reconcile};
use crate::config::HttpClientConfig;
use crate::error::GatewayError;
use crate::groundtruth;
use crate::origin::BackendOrigin;
use bytes::Bytes;
use reqwest::{Client, Method, header::CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Forwards requests to a single, pre-resolved backend origin.
///
/// Cheap to clone; the underlying HTTP client is reference counted.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    origin: BackendOrigin,
}

impl Forwarder {
    /// Build a forwarder with its own HTTP client.
    pub fn new(origin: BackendOrigin, http: &HttpClientConfig) -> Result<Self, GatewayError> {
        let client = http.build_client().map_err(|e| GatewayError::ClientBuild {
            message: e.to_string(),
        })?;
        Ok(Self::with_client(client, origin))
    }

    pub fn with_client(client: Client, origin: BackendOrigin) -> Self {
        Self { client, origin }
    }

    pub fn origin(&self) -> &BackendOrigin {
        &self.origin
    }

    /// Forward one logical operation.
    ///
    /// Never fails: network errors, validation errors and cancellation all
    /// come back as a [`ForwardedResponse`] carrying an error body.
    pub async fn forward(
        &self,
        operation: Operation,
        body: Bytes,
        cancel: &CancellationToken,
    ) -> ForwardedResponse {
        let timer = LatencyTimer::start();

        let body = match operation {
            Operation::Metrics => None,
            Operation::RunEval => match Self::validated_eval_body(&body) {
                Ok(body) => Some(body),
                Err(err) => {
                    debug!(error = %err, "Rejected evaluation document");
                    return ForwardedResponse::from_error(&err);
                }
            },
            Operation::LabelAssist if body.is_empty() => Some(Bytes::from_static(b"{}")),
            _ => Some(body),
        };

        let response = self
            .forward_path(operation.method(), operation.upstream_path(), body, cancel)
            .await;

        if operation.measures_latency() {
            response.with_latency(timer.elapsed_ms())
        } else {
            response
        }
    }

    /// Forward to an arbitrary backend path with the standard reconciliation.
    pub async fn forward_path(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        cancel: &CancellationToken,
    ) -> ForwardedResponse {
        let timer = LatencyTimer::start();
        let url = self.origin.join(path);

        match self.exchange(method.clone(), &url, body, cancel).await {
            Ok(response) => {
                debug!(
                    method = %method,
                    target = %url,
                    status = response.status.as_u16(),
                    elapsed_ms = timer.elapsed_ms(),
                    "Forwarded request"
                );
                response
            }
            Err(GatewayError::Cancelled) => {
                debug!(target = %url, "Forwarded request cancelled");
                ForwardedResponse::from_error(&GatewayError::Cancelled)
            }
            Err(err) => {
                warn!(method = %method, target = %url, error = %err, "Upstream unreachable");
                ForwardedResponse::from_error(&err)
            }
        }
    }

    async fn exchange(
        &self,
        method: Method,
        url: &str,
        body: Option<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<ForwardedResponse, GatewayError> {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let call = async {
            let upstream = request.send().await?;
            let status = upstream.status();
            let content_type = upstream
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let text = upstream.text().await?;
            Ok::<_, GatewayError>(reconcile(status, content_type.as_deref(), text))
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(GatewayError::Cancelled),
            result = call => result,
        }
    }

    /// Validate raw evaluation input and re-encode it in canonical form.
    fn validated_eval_body(raw: &[u8]) -> Result<Bytes, GatewayError> {
        let text = String::from_utf8_lossy(raw);
        let document = groundtruth::parse(&text)?;
        Ok(Bytes::from(document.to_json().to_string()))
    }
}
