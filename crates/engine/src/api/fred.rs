//! FRED (Federal Reserve Economic Data) observations client

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, info};

use crate::config::ProviderSettings;
use crate::types::{Observation, TimeSeries};

/// FRED marks missing observations with a lone dot
const MISSING_MARKER: &str = ".";

/// FRED series observations client
#[derive(Clone)]
pub struct FredClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

impl FredClient {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(settings.http_timeout)
                .build()
                .context("failed to build HTTP client")?,
            base_url: settings.fred_base_url.trim_end_matches('/').to_string(),
            api_key: settings.fred_api_key.clone(),
        })
    }

    /// GET /fred/series/observations — daily or lower-frequency values from `start`
    pub async fn get_observations(&self, series_id: &str, start: NaiveDate) -> Result<TimeSeries> {
        let Some(api_key) = self.api_key.as_deref() else {
            anyhow::bail!("FRED_API_KEY is not configured, cannot fetch {}", series_id);
        };
        if series_id.is_empty() {
            anyhow::bail!("empty FRED series id");
        }

        let url = format!(
            "{}/fred/series/observations?series_id={}&api_key={}&file_type=json&observation_start={}",
            self.base_url,
            series_id,
            api_key,
            start.format("%Y-%m-%d")
        );
        debug!(series_id, "Fetching FRED observations");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("FRED API error {} for {}: {}", status, series_id, body);
        }

        let payload: ObservationsResponse = response.json().await?;
        let series = parse_observations(payload.observations);
        if series.is_empty() {
            anyhow::bail!("FRED returned no observations for {}", series_id);
        }

        info!(series_id, observations = series.len(), "FRED series fetched");
        Ok(series)
    }
}

fn parse_observations(raw: Vec<RawObservation>) -> TimeSeries {
    TimeSeries::from_observations(
        raw.into_iter()
            .filter(|o| o.value.trim() != MISSING_MARKER)
            .filter_map(|o| {
                let date = NaiveDate::parse_from_str(&o.date, "%Y-%m-%d").ok()?;
                let value = Decimal::from_str(o.value.trim()).ok()?.to_f64()?;
                Some(Observation::new(date, value))
            })
            .collect(),
    )
}
