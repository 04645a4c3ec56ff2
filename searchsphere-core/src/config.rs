//! Configuration system for SearchSphere.
//!
//! Uses `figment` for layered configuration: defaults -> config files ->
//! well-known backend environment variables -> `SEARCHSPHERE_` environment ->
//! explicit overrides. Configuration is read once at process start; nothing in
//! the forwarding path looks at the environment again.

use crate::error::ConfigError;
use crate::gateway::GatewayConfig;
use crate::origin::{OriginSources, PUBLIC_BASE_ENV, SERVER_BASE_ENVS};
use crate::poller::PollerConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSphereConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub origin: OriginSources,
    #[serde(default)]
    pub http: HttpClientConfig,
    #[serde(default)]
    pub metrics: PollerConfig,
    #[serde(default)]
    pub client: ClientConfig,
}

/// Timeouts for outbound HTTP calls, shared by the forwarder and the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

impl HttpClientConfig {
    /// Build a `reqwest` client with these timeouts.
    pub fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs.max(1)))
            .timeout(Duration::from_secs(self.request_timeout_secs.max(1)))
            .build()
    }
}

/// Where the command-line client sends its requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Gateway base URL. Defaults to the local gateway's bind address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
}

impl SearchSphereConfig {
    /// Base URL the client should talk to.
    pub fn client_base(&self) -> String {
        match self.client.gateway_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => {
                let host = match self.gateway.host.as_str() {
                    "0.0.0.0" | "::" => "127.0.0.1",
                    host => host,
                };
                format!("http://{}:{}", host, self.gateway.port)
            }
        }
    }

    /// Validate the configuration and return any warnings.
    ///
    /// Never errors; problems are reported as human-readable messages.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.origin.is_configured() {
            warnings.push(format!(
                "no backend origin configured; falling back to {}",
                crate::origin::DEFAULT_ORIGIN
            ));
        }

        let resolved = self.origin.resolve();
        if let Err(e) = url::Url::parse(resolved.as_str()) {
            warnings.push(format!(
                "backend origin '{}' is not a valid URL: {}",
                resolved, e
            ));
        }

        if self.gateway.port == 0 {
            warnings.push("gateway.port is 0; an ephemeral port will be used".to_string());
        }
        if self.http.connect_timeout_secs == 0 || self.http.request_timeout_secs == 0 {
            warnings.push("http timeouts of 0 are raised to 1 second".to_string());
        }
        warnings.extend(self.metrics.validate());

        warnings
    }
}

/// Maps the well-known backend variables onto the `origin` table.
fn origin_env() -> Env {
    let mut keys = vec![PUBLIC_BASE_ENV];
    keys.extend(SERVER_BASE_ENVS);

    Env::raw().only(&keys).map(|key| {
        let name = key.as_str();
        let field = if name.eq_ignore_ascii_case(PUBLIC_BASE_ENV) {
            "public_base"
        } else if name.eq_ignore_ascii_case(SERVER_BASE_ENVS[0]) {
            "backend_url"
        } else if name.eq_ignore_ascii_case(SERVER_BASE_ENVS[1]) {
            "public_backend_url"
        } else {
            "backend_api_base"
        };
        format!("origin.{field}").into()
    })
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "searchsphere", "searchsphere")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".searchsphere").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables prefixed with `SEARCHSPHERE_` (`__` nests)
/// 3. `NEXT_PUBLIC_API_BASE`, `BACKEND_URL`, `NEXT_PUBLIC_BACKEND_URL`, `BACKEND_API_BASE`
/// 4. An explicit config file (`--config`)
/// 5. Workspace-local config (`.searchsphere/config.toml`)
/// 6. User config (`~/.config/searchsphere/config.toml`)
/// 7. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    config_file: Option<&Path>,
    overrides: Option<&SearchSphereConfig>,
) -> Result<SearchSphereConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(SearchSphereConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = config_file {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment
        .merge(origin_env())
        .merge(Env::prefixed("SEARCHSPHERE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    Ok(figment.extract()?)
}

/// Check whether any SearchSphere configuration file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        return true;
    }

    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}
