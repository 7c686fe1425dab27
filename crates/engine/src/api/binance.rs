//! Binance public API client for daily price series (no authentication required)

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::IgnoredAny;
use std::str::FromStr;
use tracing::{debug, info};

use crate::config::ProviderSettings;
use crate::types::{Observation, TimeSeries};

const MAX_KLINES_PER_REQUEST: u32 = 1000;
const DAILY_INTERVAL: &str = "1d";

/// The parts of a daily bar the close series needs
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    pub open_time: i64,
    pub close: Decimal,
    /// Drives pagination
    pub close_time: i64,
}

/// Binance public market data client
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

/// One kline row as sent by Binance (12-element array): open time, close
/// and close time are read, the rest is skipped
type RawKline = (
    i64,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    String,
    IgnoredAny,
    i64,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
    IgnoredAny,
);

impl BinanceClient {
    pub fn new(settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(settings.http_timeout)
                .build()
                .context("failed to build HTTP client")?,
            base_url: settings.binance_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch klines (candlestick data) for a symbol
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<Kline>> {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}",
            self.base_url, symbol, interval
        );

        if let Some(start) = start_time {
            url.push_str(&format!("&startTime={}", start));
        }
        if let Some(end) = end_time {
            url.push_str(&format!("&endTime={}", end));
        }

        let limit = limit.unwrap_or(500).min(MAX_KLINES_PER_REQUEST);
        url.push_str(&format!("&limit={}", limit));

        debug!(symbol, interval, "Fetching klines from Binance");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let raw_klines: Vec<RawKline> = response.json().await?;

        let klines: Vec<Kline> = raw_klines
            .into_iter()
            .filter_map(|raw| {
                Some(Kline {
                    open_time: raw.0,
                    close: Decimal::from_str(&raw.4).ok()?,
                    close_time: raw.6,
                })
            })
            .collect();

        debug!(count = klines.len(), "Fetched klines");
        Ok(klines)
    }

    /// Fetch klines with automatic pagination for ranges > 1000 bars
    pub async fn get_klines_paginated(
        &self,
        symbol: &str,
        interval: &str,
        start_time: i64,
        end_time: i64,
    ) -> Result<Vec<Kline>> {
        let mut all_klines = Vec::new();
        let mut current_start = start_time;

        loop {
            if current_start >= end_time {
                break;
            }

            let klines = self
                .get_klines(
                    symbol,
                    interval,
                    Some(current_start),
                    Some(end_time),
                    Some(MAX_KLINES_PER_REQUEST),
                )
                .await?;

            if klines.is_empty() {
                break;
            }

            let full_page = klines.len() as u32 >= MAX_KLINES_PER_REQUEST;
            let last_close_time = klines.last().map(|k| k.close_time).unwrap_or(end_time);
            all_klines.extend(klines);

            if !full_page {
                break;
            }
            current_start = last_close_time + 1;

            // Small delay to respect rate limits
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }

        Ok(all_klines)
    }

    /// Daily close series for `symbol` from `start` to now
    pub async fn get_daily_closes(&self, symbol: &str, start: NaiveDate) -> Result<TimeSeries> {
        let start_ms = start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp_millis())
            .context("invalid start date")?;
        let end_ms = Utc::now().timestamp_millis();

        let klines = self
            .get_klines_paginated(symbol, DAILY_INTERVAL, start_ms, end_ms)
            .await?;
        let series = klines_to_closes(&klines);

        if series.is_empty() {
            anyhow::bail!("Binance returned no daily klines for {}", symbol);
        }
        info!(symbol, days = series.len(), "Daily closes fetched from Binance");
        Ok(series)
    }
}

/// One observation per kline, dated by the UTC day the bar opened
pub fn klines_to_closes(klines: &[Kline]) -> TimeSeries {
    TimeSeries::from_observations(
        klines
            .iter()
            .filter_map(|k| {
                let date = DateTime::<Utc>::from_timestamp_millis(k.open_time)?.date_naive();
                Some(Observation::new(date, k.close.to_f64()?))
            })
            .collect(),
    )
}
