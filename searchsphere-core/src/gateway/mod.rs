//! # Forwarding Gateway
//!
//! An axum server that relays browser requests to the SearchSphere backend.
//! Resolves the backend origin once, forwards each logical operation to its
//! fixed upstream path, reconciles the upstream body into a closed set of
//! response shapes, and injects a measured latency into search and chat
//! responses that do not already carry one.

mod forwarder;
pub mod latency;
mod reconcile;
mod server;

pub use forwarder::Forwarder;
pub use latency::{LATENCY_FIELD, LatencyTimer, inject_latency};
pub use reconcile::{
    ForwardedBody, ForwardedResponse, PROXY_FAILED, PROXY_LATENCY_HEADER, reconcile,
};
pub use server::{
    GatewayState, router as gateway_router, run as run_gateway, serve as serve_gateway,
};

use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration for the gateway HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Answer CORS preflights for any origin.
    pub permissive_cors: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            permissive_cors: true,
        }
    }
}

impl GatewayConfig {
    /// Socket address string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// A logical operation the gateway knows how to forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Search,
    Chat,
    Metrics,
    #[serde(alias = "precision")]
    RunEval,
    LabelAssist,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Search,
        Operation::Chat,
        Operation::Metrics,
        Operation::RunEval,
        Operation::LabelAssist,
    ];

    /// Backend path this operation is forwarded to.
    pub fn upstream_path(self) -> &'static str {
        match self {
            Operation::Search => "/api/search",
            Operation::Chat => "/api/chat",
            Operation::Metrics => "/api/metrics",
            Operation::RunEval => "/api/eval/precision",
            Operation::LabelAssist => "/api/eval/label-assist",
        }
    }

    /// HTTP method used both inbound and upstream.
    pub fn method(self) -> Method {
        match self {
            Operation::Metrics => Method::GET,
            _ => Method::POST,
        }
    }

    /// Whether a request body is relayed.
    pub fn has_body(self) -> bool {
        self != Operation::Metrics
    }

    /// Whether the gateway stamps `__latency_ms` on structured responses.
    pub fn measures_latency(self) -> bool {
        matches!(self, Operation::Search | Operation::Chat)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Search => "search",
            Operation::Chat => "chat",
            Operation::Metrics => "metrics",
            Operation::RunEval => "run-eval",
            Operation::LabelAssist => "label-assist",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search" => Ok(Operation::Search),
            "chat" => Ok(Operation::Chat),
            "metrics" => Ok(Operation::Metrics),
            "run-eval" | "precision" => Ok(Operation::RunEval),
            "label-assist" => Ok(Operation::LabelAssist),
            other => Err(format!("unknown operation: {other}")),
        }
    }
}
