//! Client settings loaded from the environment or a config file.

use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::{HttpClientError, PipelineBuilder, Result};

/// Prefix of the environment variables read by [`ClientSettings::from_env`].
pub const ENV_PREFIX: &str = "COURIER_HTTP";

/// Scalar pipeline settings.
///
/// | variable | field |
/// |---|---|
/// | `COURIER_HTTP_BASE_ADDRESS` | `base_address` |
/// | `COURIER_HTTP_TIMEOUT_MS` | `timeout_ms` |
/// | `COURIER_HTTP_MAX_REDIRECTS` | `max_redirects` |
/// | `COURIER_HTTP_NO_CACHE` | `no_cache` |
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Base address relative endpoints are resolved against.
    pub base_address: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Redirect limit, zero disables redirects.
    pub max_redirects: Option<usize>,
    /// Send `Cache-Control: no-cache, private`.
    pub no_cache: bool,
}

impl ClientSettings {
    /// Read settings from `COURIER_HTTP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`, keyed by full variable name.
    pub fn from_env_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(&format!("{}_{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        Ok(Self {
            base_address: var("BASE_ADDRESS"),
            timeout_ms: var("TIMEOUT_MS")
                .map(|v| parse("TIMEOUT_MS", &v))
                .transpose()?,
            max_redirects: var("MAX_REDIRECTS")
                .map(|v| parse("MAX_REDIRECTS", &v))
                .transpose()?,
            no_cache: var("NO_CACHE")
                .map(|v| parse_flag("NO_CACHE", &v))
                .transpose()?
                .unwrap_or(false),
        })
    }

    /// Request timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Apply the settings that are set to `builder`.
    pub fn apply<'a>(&self, builder: &'a mut PipelineBuilder) -> &'a mut PipelineBuilder {
        if let Some(base_address) = &self.base_address {
            builder.base_address(base_address.clone());
        }
        if let Some(timeout) = self.timeout() {
            builder.timeout(timeout);
        }
        if let Some(max) = self.max_redirects {
            builder.max_redirects(max);
        }
        if self.no_cache {
            builder.no_cache();
        }
        builder
    }
}

fn parse<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        HttpClientError::Configuration(format!("{}_{}='{}': {}", ENV_PREFIX, name, value, e))
    })
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(HttpClientError::Configuration(format!(
            "{}_{}='{}': expected a boolean",
            ENV_PREFIX, name, value
        ))),
    }
}
