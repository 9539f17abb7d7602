// Runtime configuration. Every value has a sensible default so the CLI
// works out of the box; environment variables override individual knobs.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DISK_API_URL: &str = "https://cloud-api.yandex.net";
pub const DEFAULT_CAT_API_URL: &str = "https://cataas.com";
pub const DEFAULT_DOG_API_URL: &str = "https://dog.ceo/api";
pub const DEFAULT_RESULTS_PATH: &str = "results.json";

/// Cloud drive settings.
#[derive(Debug, Clone)]
pub struct DiskConfig {
    pub base_url: String,
    /// Prefix placed before the token in the `Authorization` header.
    pub auth_scheme: String,
    pub upload_timeout: Duration,
}

/// Base URL and inter-request pause for one image API.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub delay: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub disk: DiskConfig,
    pub cats: SourceConfig,
    pub dogs: SourceConfig,
    pub http_timeout: Duration,
    pub results_path: PathBuf,
}

impl Config {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Missing keys
    /// fall back to defaults; present but unparsable values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| -> String {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Config {
            disk: DiskConfig {
                base_url: trim_base(text("DISK_API_URL", DEFAULT_DISK_API_URL)),
                auth_scheme: text("DISK_AUTH_SCHEME", "OAuth"),
                upload_timeout: Duration::from_secs(parse_or(&lookup, "UPLOAD_TIMEOUT_SECS", 30)?),
            },
            cats: SourceConfig {
                base_url: trim_base(text("CAT_API_URL", DEFAULT_CAT_API_URL)),
                delay: Duration::from_millis(parse_or(&lookup, "CAT_DELAY_MS", 500)?),
            },
            dogs: SourceConfig {
                base_url: trim_base(text("DOG_API_URL", DEFAULT_DOG_API_URL)),
                delay: Duration::from_millis(parse_or(&lookup, "DOG_DELAY_MS", 1000)?),
            },
            http_timeout: Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 10)?),
            results_path: PathBuf::from(text("RESULTS_PATH", DEFAULT_RESULTS_PATH)),
        })
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}
