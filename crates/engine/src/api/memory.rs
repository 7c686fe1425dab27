//! In-memory provider backed by a map of series

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;

use super::SeriesProvider;
use crate::types::TimeSeries;

/// Serves pre-loaded series by exact source id
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    series: HashMap<String, TimeSeries>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, source_id: impl Into<String>, series: TimeSeries) -> Self {
        self.insert(source_id, series);
        self
    }

    pub fn insert(&mut self, source_id: impl Into<String>, series: TimeSeries) {
        self.series.insert(source_id.into(), series);
    }

    /// Load a fixture file: a JSON object mapping source ids to arrays of
    /// `{"date": "YYYY-MM-DD", "value": f64}`.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("invalid fixture {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let series: HashMap<String, TimeSeries> = serde_json::from_str(raw)?;
        Ok(Self { series })
    }

    pub fn source_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.series.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl SeriesProvider for StaticProvider {
    async fn fetch_series(&self, source_id: &str, start: NaiveDate) -> Result<TimeSeries> {
        self.series
            .get(source_id)
            .map(|s| s.since(start))
            .with_context(|| format!("unknown source id '{}'", source_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::*;

    #[tokio::test]
    async fn test_serves_from_start_date() {
        let provider = StaticProvider::new().with_series("AAA", series(&[1.0, 2.0, 3.0]));
        let s = provider.fetch_series("AAA", day(1)).await.unwrap();
        assert_eq!(s.values(), vec![2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_unknown_source_fails() {
        let provider = StaticProvider::new();
        let err = provider.fetch_series("NOPE", day(0)).await.unwrap_err();
        assert!(err.to_string().contains("NOPE"));
    }

    #[test]
    fn test_from_json_str() {
        let provider = StaticProvider::from_json_str(
            r#"{
                "BTCUSDT": [{"date": "2024-01-01", "value": 42000.0}],
                "FRED:DGS10": [{"date": "2024-01-01", "value": 3.9}, {"date": "2024-01-02", "value": 4.0}]
            }"#,
        )
        .unwrap();
        assert_eq!(provider.source_ids(), vec!["BTCUSDT", "FRED:DGS10"]);
    }

    #[test]
    fn test_from_json_rejects_unordered_series() {
        let result = StaticProvider::from_json_str(
            r#"{"X": [{"date": "2024-01-02", "value": 1.0}, {"date": "2024-01-01", "value": 2.0}]}"#,
        );
        assert!(result.is_err());
    }
}
