//! Error types for the SearchSphere gateway core.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering ground-truth validation, forwarding, client calls, and configuration.

use std::path::PathBuf;

/// Top-level error type for the SearchSphere core library.
#[derive(Debug, thiserror::Error)]
pub enum SearchSphereError {
    #[error("Invalid ground truth: {0}")]
    GroundTruth(#[from] GroundTruthError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Shape violations found while normalizing an evaluation document.
///
/// Every message names the violated constraint so it can be shown to the
/// user verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroundTruthError {
    #[error("payload is not valid JSON: {message}")]
    NotJson { message: String },

    #[error("payload must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },

    #[error("missing required field `items`")]
    MissingItems,

    #[error("`items` must be an array, got {found}")]
    ItemsNotArray { found: &'static str },

    #[error("`items` must contain at least one entry")]
    EmptyItems,

    #[error("items[{index}] must be an object, got {found}")]
    ItemNotObject { index: usize, found: &'static str },

    #[error("items[{index}].query must be a non-empty string")]
    InvalidQuery { index: usize },

    #[error("items[{index}].relevant_ids must be an array, got {found}")]
    RelevantIdsNotArray { index: usize, found: &'static str },

    #[error("items[{index}].relevant_ids[{position}] must be a string, got {found}")]
    RelevantIdNotString {
        index: usize,
        position: usize,
        found: &'static str,
    },
}

/// Which failure class a gateway error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Network-level failure reaching the backend.
    UpstreamUnreachable,
    /// User-supplied evaluation document failed validation.
    InvalidGroundTruth,
    /// The forwarded call was superseded or abandoned.
    Cancelled,
}

/// Errors from the forwarding layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{message}")]
    UpstreamUnreachable { message: String },

    #[error("{0}")]
    InvalidGroundTruth(#[from] GroundTruthError),

    #[error("Forwarded request was cancelled")]
    Cancelled,

    #[error("Failed to build HTTP client: {message}")]
    ClientBuild { message: String },
}

impl GatewayError {
    /// Failure class used when rendering the error to a client.
    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            GatewayError::UpstreamUnreachable { .. } | GatewayError::ClientBuild { .. } => {
                GatewayErrorKind::UpstreamUnreachable
            }
            GatewayError::InvalidGroundTruth(_) => GatewayErrorKind::InvalidGroundTruth,
            GatewayError::Cancelled => GatewayErrorKind::Cancelled,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::UpstreamUnreachable {
            message: err.to_string(),
        }
    }
}

/// Errors from the typed gateway client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{operation} failed: {status}")]
    Status { operation: &'static str, status: u16 },

    #[error("{operation} request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} response could not be decoded: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    #[error("{operation} request was cancelled")]
    Cancelled { operation: &'static str },

    #[error("Invalid ground truth: {0}")]
    GroundTruth(#[from] GroundTruthError),
}

impl ClientError {
    /// Cancellation is a normal outcome of supersession, not a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled { .. })
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::ParseError {
            message: err.to_string(),
        }
    }
}

/// A type alias for results using the top-level `SearchSphereError`.
pub type Result<T> = std::result::Result<T, SearchSphereError>;
