//! Process-wide cache of fetched series keyed by (source id, start date)

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use super::SeriesProvider;
use crate::types::TimeSeries;

type CacheKey = (String, NaiveDate);

/// Memoizes successful fetches until [`CachedProvider::invalidate`].
/// Failures are never cached.
pub struct CachedProvider {
    inner: Arc<dyn SeriesProvider>,
    entries: RwLock<HashMap<CacheKey, TimeSeries>>,
}

impl CachedProvider {
    pub fn new(inner: Arc<dyn SeriesProvider>) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drop every cached series, returning how many were held
    pub fn invalidate(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &CacheKey) -> Option<TimeSeries> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }
}

#[async_trait]
impl SeriesProvider for CachedProvider {
    async fn fetch_series(&self, source_id: &str, start: NaiveDate) -> Result<TimeSeries> {
        let key = (source_id.to_string(), start);
        if let Some(hit) = self.lookup(&key) {
            debug!(source = source_id, %start, "Series cache hit");
            return Ok(hit);
        }

        let series = self.inner.fetch_series(source_id, start).await?;
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, series.clone());
        Ok(series)
    }
}
