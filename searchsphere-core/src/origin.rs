//! Backend origin resolution.
//!
//! The gateway talks to exactly one backend. Its origin is picked from an
//! ordered list of configuration sources and normalized so that callers can
//! append `/api/...` paths without worrying about doubled slashes or a
//! doubled `/api` segment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin used when no source is configured.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8080";

/// Environment variable holding the public, browser-visible override.
pub const PUBLIC_BASE_ENV: &str = "NEXT_PUBLIC_API_BASE";

/// Server-only override variables, in fallback order.
pub const SERVER_BASE_ENVS: [&str; 3] = [
    "BACKEND_URL",
    "NEXT_PUBLIC_BACKEND_URL",
    "BACKEND_API_BASE",
];

/// Normalize a configured base URL.
///
/// Trims whitespace, strips a trailing `/`, then strips a trailing
/// case-insensitive `/api`, repeating until nothing changes so that
/// `normalize_base(normalize_base(x)) == normalize_base(x)`. Returns an empty
/// string for blank input.
pub fn normalize_base(raw: &str) -> String {
    let mut s = raw.trim();
    loop {
        let before = s.len();
        if let Some(stripped) = s.strip_suffix('/') {
            s = stripped;
        }
        let bytes = s.as_bytes();
        if bytes.len() >= 4 && bytes[bytes.len() - 4..].eq_ignore_ascii_case(b"/api") {
            s = &s[..s.len() - 4];
        }
        s = s.trim_end();
        if s.len() == before {
            return s.to_string();
        }
    }
}

/// The raw, unnormalized origin sources.
///
/// Field order is precedence order: the public override wins over every
/// server-only override, and the server-only overrides are consulted top to
/// bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginSources {
    /// Public, browser-visible backend base (`NEXT_PUBLIC_API_BASE`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base: Option<String>,
    /// `BACKEND_URL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_url: Option<String>,
    /// `NEXT_PUBLIC_BACKEND_URL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_backend_url: Option<String>,
    /// `BACKEND_API_BASE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_api_base: Option<String>,
}

impl OriginSources {
    /// Sources with only the public override set.
    pub fn public(base: impl Into<String>) -> Self {
        Self {
            public_base: Some(base.into()),
            ..Self::default()
        }
    }

    /// Server-only overrides in fallback order.
    pub fn server_overrides(&self) -> [Option<&str>; 3] {
        [
            self.backend_url.as_deref(),
            self.public_backend_url.as_deref(),
            self.backend_api_base.as_deref(),
        ]
    }

    /// Resolve the backend origin.
    ///
    /// Picks the first source that is non-empty after normalization and falls
    /// back to [`DEFAULT_ORIGIN`].
    pub fn resolve(&self) -> BackendOrigin {
        if let Some(public) = self.public_base.as_deref().map(normalize_base)
            && !public.is_empty()
        {
            return BackendOrigin(public);
        }

        let server = self
            .server_overrides()
            .into_iter()
            .flatten()
            .map(normalize_base)
            .find(|s| !s.is_empty());

        match server {
            Some(origin) => BackendOrigin(origin),
            None => {
                tracing::debug!(default = DEFAULT_ORIGIN, "No backend origin configured");
                BackendOrigin(DEFAULT_ORIGIN.to_string())
            }
        }
    }

    /// Whether any source carries a non-blank value.
    pub fn is_configured(&self) -> bool {
        std::iter::once(self.public_base.as_deref())
            .chain(self.server_overrides())
            .flatten()
            .any(|s| !normalize_base(s).is_empty())
    }
}

/// A normalized backend origin. Never empty, never ends in `/` or `/api`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendOrigin(String);

impl BackendOrigin {
    /// Build an origin from an arbitrary base, normalizing it.
    ///
    /// Blank input yields the default origin.
    pub fn new(base: &str) -> Self {
        let normalized = normalize_base(base);
        if normalized.is_empty() {
            Self(DEFAULT_ORIGIN.to_string())
        } else {
            Self(normalized)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join an absolute path (starting with `/`) onto the origin.
    pub fn join(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.0, path)
        } else {
            format!("{}/{}", self.0, path)
        }
    }
}

impl Default for BackendOrigin {
    fn default() -> Self {
        Self(DEFAULT_ORIGIN.to_string())
    }
}

impl fmt::Display for BackendOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BackendOrigin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
