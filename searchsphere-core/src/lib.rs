//! # SearchSphere Core
//!
//! Core library for the SearchSphere request-forwarding gateway.
//! Provides backend origin resolution, ground-truth normalization, the axum
//! forwarding gateway with response reconciliation and latency stamping, a
//! typed gateway client with last-request-wins supersession, the metrics
//! poller, and layered configuration.

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod groundtruth;
pub mod origin;
pub mod poller;

// Re-export commonly used types at the crate root.
pub use client::{GatewayClient, Outcome, Slot, SupersessionController};
pub use config::{HttpClientConfig, SearchSphereConfig, load_config};
pub use error::{
    ClientError, ConfigError, GatewayError, GatewayErrorKind, GroundTruthError, Result,
    SearchSphereError,
};
pub use gateway::{
    ForwardedBody, ForwardedResponse, Forwarder, GatewayConfig, GatewayState, Operation,
};
pub use groundtruth::{GroundTruthDocument, GroundTruthItem};
pub use origin::{BackendOrigin, OriginSources, normalize_base};
pub use poller::{
    EvalSummary, LatencySample, LatencyWindow, MetricsPoller, MetricsSource, PollerConfig,
};
