//! Client configuration, supplied once at construction.

use std::collections::BTreeMap;
use std::env;
use std::fmt;

use serde::Deserialize;

use crate::error::PnutError;

/// Production API root.
pub const DEFAULT_API_ROOT: &str = "https://api.pnut.io/v0";

pub const ENV_API_ROOT: &str = "PNUT_API_ROOT";
pub const ENV_ACCESS_TOKEN: &str = "PNUT_ACCESS_TOKEN";
pub const ENV_VERIFY_SSL: &str = "PNUT_VERIFY_SSL";

/// Everything a `Client` needs to know before its first request.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_root: String,
    /// Sent as `Authorization: Bearer <token>` on every request.
    pub access_token: Option<String>,
    /// Extra default headers. Per-call headers override them.
    pub extra_headers: BTreeMap<String, String>,
    pub verify_ssl: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            access_token: None,
            extra_headers: BTreeMap::new(),
            verify_ssl: true,
        }
    }
}

impl ClientConfig {
    pub fn new(api_root: impl Into<String>) -> Self {
        Self {
            api_root: api_root.into(),
            ..Self::default()
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Defaults overridden by `PNUT_API_ROOT`, `PNUT_ACCESS_TOKEN` and
    /// `PNUT_VERIFY_SSL` when they are set.
    pub fn from_env() -> Result<Self, PnutError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PnutError> {
        let mut config = Self::default();
        if let Some(root) = lookup(ENV_API_ROOT).filter(|v| !v.is_empty()) {
            config.api_root = root;
        }
        config.access_token = lookup(ENV_ACCESS_TOKEN).filter(|v| !v.is_empty());
        if let Some(raw) = lookup(ENV_VERIFY_SSL) {
            config.verify_ssl = parse_flag(&raw).ok_or_else(|| {
                PnutError::Config(format!("{ENV_VERIFY_SSL} must be a boolean, got `{raw}`"))
            })?;
        }
        Ok(config)
    }

    /// API root without a trailing slash.
    pub(crate) fn root(&self) -> &str {
        self.api_root.trim_end_matches('/')
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_root", &self.api_root)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("extra_headers", &self.extra_headers)
            .field("verify_ssl", &self.verify_ssl)
            .finish()
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
