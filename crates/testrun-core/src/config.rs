use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const MIN_POLL_INTERVAL_MS: u64 = 250;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(
        default,
        rename = "api-url",
        alias = "api_url",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_url: Option<String>,

    #[serde(
        default,
        rename = "log-level",
        alias = "log_level",
        skip_serializing_if = "Option::is_none"
    )]
    pub log_level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling: Option<PollingConfig>,

    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, toml::Value>,
}

/// Status polling and request timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between status fetches in milliseconds (default: 5000)
    #[serde(
        default = "PollingConfig::default_interval_ms",
        rename = "interval-ms",
        alias = "interval_ms"
    )]
    pub interval_ms: u64,

    /// Per-request timeout in milliseconds (default: 5000)
    #[serde(
        default = "PollingConfig::default_request_timeout_ms",
        rename = "request-timeout-ms",
        alias = "request_timeout_ms"
    )]
    pub request_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl PollingConfig {
    fn default_interval_ms() -> u64 {
        DEFAULT_POLL_INTERVAL_MS
    }

    fn default_request_timeout_ms() -> u64 {
        DEFAULT_REQUEST_TIMEOUT_MS
    }

    pub fn effective_interval_ms(&self) -> u64 {
        if self.interval_ms == 0 {
            DEFAULT_POLL_INTERVAL_MS
        } else {
            self.interval_ms
        }
    }

    pub fn effective_request_timeout_ms(&self) -> u64 {
        if self.request_timeout_ms == 0 {
            DEFAULT_REQUEST_TIMEOUT_MS
        } else {
            self.request_timeout_ms
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid api url: {url}")]
    InvalidApiUrl { url: String },
    #[error("poll interval must be >= 250ms (got {ms}ms)")]
    PollIntervalTooShort { ms: u64 },
}

impl ConfigFile {
    /// Reads `path`, treating a missing file as an empty config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let cfg: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = self.api_url.as_deref() {
            validate_api_url(url)?;
        }

        if let Some(polling) = &self.polling {
            let ms = polling.effective_interval_ms();
            if ms < MIN_POLL_INTERVAL_MS {
                return Err(ConfigError::PollIntervalTooShort { ms });
            }
        }

        Ok(())
    }

    pub fn effective_api_url(&self) -> &str {
        match self.api_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => DEFAULT_API_URL,
        }
    }

    /// Returns the effective polling config, using defaults if not specified.
    pub fn effective_polling(&self) -> PollingConfig {
        self.polling.clone().unwrap_or_default()
    }

    /// Applies command-line/environment overrides on top of the file values.
    pub fn with_overrides(
        &self,
        api_url: Option<&str>,
        poll_interval_ms: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let mut next = self.clone();
        if let Some(url) = api_url {
            next.api_url = Some(url.trim().to_owned());
        }
        if let Some(ms) = poll_interval_ms {
            let mut polling = next.effective_polling();
            polling.interval_ms = ms;
            next.polling = Some(polling);
        }
        next.validate()?;
        Ok(next)
    }
}

pub fn validate_api_url(url: &str) -> Result<(), ConfigError> {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"));
    match rest {
        Some(host) if !host.is_empty() && !host.starts_with('/') => Ok(()),
        _ => Err(ConfigError::InvalidApiUrl {
            url: trimmed.to_owned(),
        }),
    }
}
