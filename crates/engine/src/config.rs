//! Provider settings loaded from the environment

use anyhow::{Context, Result};
use std::time::Duration;

pub const DEFAULT_BINANCE_BASE_URL: &str = "https://api.binance.com";
pub const DEFAULT_FRED_BASE_URL: &str = "https://api.stlouisfed.org";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_FETCH_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Bounded retry for a single series fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub attempts: u32,
    /// Delay before retry `n` is `backoff * n`
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_FETCH_RETRIES,
            backoff: Duration::from_millis(DEFAULT_RETRY_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

/// Everything the market-data clients need
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub fred_api_key: Option<String>,
    pub fred_base_url: String,
    pub binance_base_url: String,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            fred_api_key: None,
            fred_base_url: DEFAULT_FRED_BASE_URL.to_string(),
            binance_base_url: DEFAULT_BINANCE_BASE_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl ProviderSettings {
    /// Read settings from environment variables, falling back to defaults.
    ///
    /// `FRED_API_KEY`, `FRED_BASE_URL`, `BINANCE_BASE_URL`,
    /// `MACRO_GAP_HTTP_TIMEOUT_SECS`, `MACRO_GAP_FETCH_RETRIES`,
    /// `MACRO_GAP_RETRY_BACKOFF_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let timeout_secs = parse_var(&lookup, "MACRO_GAP_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        let attempts = parse_var(&lookup, "MACRO_GAP_FETCH_RETRIES", DEFAULT_FETCH_RETRIES)?;
        let backoff_ms = parse_var(&lookup, "MACRO_GAP_RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS)?;

        Ok(Self {
            fred_api_key: lookup("FRED_API_KEY").filter(|k| !k.trim().is_empty()),
            fred_base_url: lookup("FRED_BASE_URL").unwrap_or(defaults.fred_base_url),
            binance_base_url: lookup("BINANCE_BASE_URL").unwrap_or(defaults.binance_base_url),
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
            retry: RetryPolicy {
                attempts: attempts.max(1),
                backoff: Duration::from_millis(backoff_ms),
            },
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}
