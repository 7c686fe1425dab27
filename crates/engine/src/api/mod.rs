//! Market-data providers
//!
//! Every source of dated values sits behind [`SeriesProvider`]. Concrete
//! clients talk to Binance (prices) and FRED (macro series); wrappers add
//! retries and a process-wide cache; [`StaticProvider`] serves in-memory
//! series for tests and offline fixtures.

pub mod binance;
pub mod cache;
pub mod fred;
pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{ProviderSettings, RetryPolicy};
use crate::types::TimeSeries;

pub use binance::BinanceClient;
pub use cache::CachedProvider;
pub use fred::FredClient;
pub use memory::StaticProvider;

/// Source id prefix routed to FRED
pub const FRED_PREFIX: &str = "FRED:";
/// Optional explicit prefix for Binance symbols
pub const BINANCE_PREFIX: &str = "BINANCE:";

/// Fetches a dated series for an opaque source id, starting at `start`.
///
/// Unknown ids, empty payloads and transport problems are all plain errors;
/// callers decide whether a failure is fatal.
#[async_trait]
pub trait SeriesProvider: Send + Sync {
    async fn fetch_series(&self, source_id: &str, start: NaiveDate) -> Result<TimeSeries>;
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Dispatches `FRED:<code>` to FRED and `BINANCE:<symbol>` or bare symbols
/// to Binance.
pub struct MarketDataRouter {
    binance: BinanceClient,
    fred: FredClient,
}

impl MarketDataRouter {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            binance: BinanceClient::new(settings)?,
            fred: FredClient::new(settings)?,
        })
    }
}

#[async_trait]
impl SeriesProvider for MarketDataRouter {
    async fn fetch_series(&self, source_id: &str, start: NaiveDate) -> Result<TimeSeries> {
        let id = source_id.trim();
        if let Some(code) = strip_prefix_ignore_case(id, FRED_PREFIX) {
            return self.fred.get_observations(code, start).await;
        }
        let symbol = strip_prefix_ignore_case(id, BINANCE_PREFIX).unwrap_or(id);
        if symbol.is_empty() || symbol.contains(':') {
            anyhow::bail!("unsupported source id '{}'", source_id);
        }
        self.binance.get_daily_closes(symbol, start).await
    }
}

fn strip_prefix_ignore_case<'a>(id: &'a str, prefix: &str) -> Option<&'a str> {
    let head = id.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&id[prefix.len()..])
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Retries failed fetches with linear backoff
pub struct RetryingProvider {
    inner: Arc<dyn SeriesProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn SeriesProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl SeriesProvider for RetryingProvider {
    async fn fetch_series(&self, source_id: &str, start: NaiveDate) -> Result<TimeSeries> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.fetch_series(source_id, start).await {
                Ok(series) => return Ok(series),
                Err(e) if attempt < attempts => {
                    warn!(source = source_id, attempt, error = %e, "Fetch failed, retrying");
                    tokio::time::sleep(self.policy.backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(source = source_id, attempts, "Giving up after retries");
                    return Err(e);
                }
            }
        }
    }
}

/// Standard network stack: router, bounded retry, then cache
pub fn build_network_provider(settings: &ProviderSettings) -> Result<CachedProvider> {
    let router: Arc<dyn SeriesProvider> = Arc::new(MarketDataRouter::new(settings)?);
    let retrying: Arc<dyn SeriesProvider> = Arc::new(RetryingProvider::new(router, settings.retry));
    Ok(CachedProvider::new(retrying))
}
