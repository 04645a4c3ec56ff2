//! Upstream response reconciliation.
//!
//! The backend answers with JSON objects most of the time, but bare JSON
//! strings and plain-text error pages do show up. [`reconcile`] maps every
//! upstream reply onto [`ForwardedBody`] without ever dropping the body or
//! turning a non-JSON reply into an error.

use super::latency::inject_latency;
use crate::error::{GatewayError, GatewayErrorKind};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};

/// Error message used when a failure carries no message of its own.
pub const PROXY_FAILED: &str = "proxy_failed";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Header carrying the gateway-side elapsed time for search responses.
pub const PROXY_LATENCY_HEADER: &str = "x-proxy-latency";

/// Body of a forwarded response.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardedBody {
    /// The upstream body parsed as a JSON object.
    StructuredJson(Map<String, Value>),
    /// The upstream body, verbatim, with the content type to send it under.
    RawText { text: String, content_type: String },
    /// A gateway-level failure.
    Error {
        kind: GatewayErrorKind,
        message: String,
    },
}

/// A reconciled response ready to hand back to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub body: ForwardedBody,
    /// Gateway-side elapsed time, sent as `x-proxy-latency` when set.
    pub proxy_latency_ms: Option<u64>,
}

impl ForwardedResponse {
    pub fn structured(status: StatusCode, object: Map<String, Value>) -> Self {
        Self {
            status,
            body: ForwardedBody::StructuredJson(object),
            proxy_latency_ms: None,
        }
    }

    pub fn raw(status: StatusCode, text: String, content_type: impl Into<String>) -> Self {
        Self {
            status,
            body: ForwardedBody::RawText {
                text,
                content_type: content_type.into(),
            },
            proxy_latency_ms: None,
        }
    }

    /// Convert a gateway failure into a renderable response.
    ///
    /// Validation failures become 400, cancellation 503, everything else 500.
    pub fn from_error(err: &GatewayError) -> Self {
        let kind = err.kind();
        let status = match kind {
            GatewayErrorKind::InvalidGroundTruth => StatusCode::BAD_REQUEST,
            GatewayErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            GatewayErrorKind::UpstreamUnreachable => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = err.to_string();
        Self {
            status,
            body: ForwardedBody::Error {
                kind,
                message: if message.trim().is_empty() {
                    PROXY_FAILED.to_string()
                } else {
                    message
                },
            },
            proxy_latency_ms: None,
        }
    }

    /// The structured object, if the upstream replied with one.
    pub fn json(&self) -> Option<&Map<String, Value>> {
        match &self.body {
            ForwardedBody::StructuredJson(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.body, ForwardedBody::Error { .. })
    }

    /// Stamp a measured latency onto structured bodies and the proxy header.
    pub fn with_latency(mut self, elapsed_ms: u64) -> Self {
        if let ForwardedBody::StructuredJson(object) = &mut self.body {
            inject_latency(object, elapsed_ms);
            self.proxy_latency_ms = Some(elapsed_ms);
        }
        self
    }

    /// Content type the response will be sent with.
    pub fn content_type(&self) -> &str {
        match &self.body {
            ForwardedBody::RawText { content_type, .. } => content_type,
            _ => JSON_CONTENT_TYPE,
        }
    }
}

/// Map an upstream reply onto a [`ForwardedResponse`].
///
/// 1. JSON object: structured, upstream status.
/// 2. Other valid JSON: original text, forced `application/json`.
/// 3. Not JSON: original text, upstream content type (default `application/json`).
pub fn reconcile(status: StatusCode, content_type: Option<&str>, text: String) -> ForwardedResponse {
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(object)) => ForwardedResponse::structured(status, object),
        Ok(_) => ForwardedResponse::raw(status, text, JSON_CONTENT_TYPE),
        Err(_) => {
            let content_type = content_type
                .map(str::trim)
                .filter(|ct| !ct.is_empty())
                .unwrap_or(JSON_CONTENT_TYPE)
                .to_string();
            ForwardedResponse::raw(status, text, content_type)
        }
    }
}

impl IntoResponse for ForwardedResponse {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            ForwardedBody::StructuredJson(object) => {
                (self.status, Json(Value::Object(object))).into_response()
            }
            ForwardedBody::RawText { text, content_type } => {
                let header = HeaderValue::from_str(&content_type)
                    .unwrap_or_else(|_| HeaderValue::from_static(JSON_CONTENT_TYPE));
                (self.status, [(CONTENT_TYPE, header)], text).into_response()
            }
            ForwardedBody::Error { message, .. } => {
                (self.status, Json(serde_json::json!({ "error": message }))).into_response()
            }
        };
        if let Some(ms) = self.proxy_latency_ms {
            response
                .headers_mut()
                .insert(PROXY_LATENCY_HEADER, HeaderValue::from(ms));
        }
        response
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        ForwardedResponse::from_error(&self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GroundTruthError;
    use serde_json::json;

    #[test]
    fn test_object_is_structured() {
        let resp = reconcile(
            StatusCode::OK,
            Some("application/json"),
            r#"{"results":[],"mode":"hybrid"}"#.into(),
        );
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.json().unwrap()["mode"], json!("hybrid"));
    }

    #[test]
    fn test_non_object_json_forces_json_content_type() {
        let resp = reconcile(StatusCode::ACCEPTED, Some("text/plain"), "\"queued\"".into());
        assert_eq!(resp.status, StatusCode::ACCEPTED);
        assert_eq!(
            resp.body,
            ForwardedBody::RawText {
                text: "\"queued\"".into(),
                content_type: "application/json".into()
            }
        );

        let resp = reconcile(StatusCode::OK, None, "[1,2]".into());
        assert_eq!(resp.content_type(), "application/json");
    }

    #[test]
    fn test_non_json_keeps_upstream_content_type_and_status() {
        let resp = reconcile(
            StatusCode::BAD_GATEWAY,
            Some("text/html; charset=utf-8"),
            "<h1>Bad gateway</h1>".into(),
        );
        assert_eq!(resp.status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            resp.body,
            ForwardedBody::RawText {
                text: "<h1>Bad gateway</h1>".into(),
                content_type: "text/html; charset=utf-8".into()
            }
        );
    }

    #[test]
    fn test_non_json_without_content_type_defaults_to_json() {
        let resp = reconcile(StatusCode::INTERNAL_SERVER_ERROR, None, "boom".into());
        assert_eq!(resp.content_type(), "application/json");
        assert!(!resp.is_error());

        let resp = reconcile(StatusCode::OK, Some(""), "".into());
        assert_eq!(resp.content_type(), "application/json");
    }

    #[test]
    fn test_from_error_statuses() {
        let resp = ForwardedResponse::from_error(&GatewayError::UpstreamUnreachable {
            message: "connection refused".into(),
        });
        assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.body,
            ForwardedBody::Error {
                kind: GatewayErrorKind::UpstreamUnreachable,
                message: "connection refused".into()
            }
        );

        let resp = ForwardedResponse::from_error(&GatewayError::UpstreamUnreachable {
            message: " ".into(),
        });
        assert!(matches!(
            resp.body,
            ForwardedBody::Error { ref message, .. } if message == PROXY_FAILED
        ));

        let resp = ForwardedResponse::from_error(&GroundTruthError::EmptyItems.into());
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_with_latency_only_touches_structured() {
        let resp = reconcile(StatusCode::OK, None, r#"{"answer":"hi"}"#.into()).with_latency(12);
        assert_eq!(resp.json().unwrap()["__latency_ms"], json!(12));
        assert_eq!(resp.proxy_latency_ms, Some(12));

        let resp = reconcile(StatusCode::OK, None, "plain".into()).with_latency(12);
        assert_eq!(resp.proxy_latency_ms, None);
    }

    #[tokio::test]
    async fn test_into_response_renders_error_body() {
        let resp = GatewayError::UpstreamUnreachable {
            message: "dns failure".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, json!({"error": "dns failure"}));
    }

    #[tokio::test]
    async fn test_into_response_raw_text() {
        let resp = ForwardedResponse::raw(StatusCode::IM_A_TEAPOT, "short".into(), "text/plain")
            .into_response();
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(resp.headers()[CONTENT_TYPE], "text/plain");
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        assert_eq!(&body[..], b"short");
    }

    #[tokio::test]
    async fn test_into_response_sets_proxy_latency_header() {
        let resp = reconcile(StatusCode::OK, None, "{}".into())
            .with_latency(9)
            .into_response();
        assert_eq!(resp.headers()[PROXY_LATENCY_HEADER], "9");
    }
}
