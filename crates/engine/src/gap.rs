//! Divergence between normalized price and the macro index
//!
//! `gap = price_norm - macro_index`. Positive means the price trades rich
//! against what the macro backdrop implies, negative means cheap.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::stats::pearson_dense;

/// Default |gap| beyond which the reading is no longer "fair"
pub const DEFAULT_GAP_THRESHOLD: f64 = 0.3;

/// Default forward-return horizon for the gap backtest, in rows
pub const DEFAULT_FORWARD_HORIZON: usize = 20;

/// Classification of a gap reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSignal {
    Overheated,
    Undervalued,
    Fair,
}

impl std::fmt::Display for GapSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GapSignal::Overheated => write!(f, "Overheated"),
            GapSignal::Undervalued => write!(f, "Undervalued"),
            GapSignal::Fair => write!(f, "Fair"),
        }
    }
}

/// Gap at a single date
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapReading {
    pub date: NaiveDate,
    pub price_norm: f64,
    pub macro_index: f64,
    pub gap: f64,
    pub signal: GapSignal,
}

/// Gap at the last common position of the two series
pub fn compute_gap(price_norm: &[f64], macro_norm: &[f64]) -> Option<f64> {
    let n = price_norm.len().min(macro_norm.len());
    if n == 0 {
        return None;
    }
    Some(price_norm[n - 1] - macro_norm[n - 1])
}

/// Pointwise gap over history
pub fn gap_series(price_norm: &[f64], macro_norm: &[f64]) -> Vec<f64> {
    price_norm
        .iter()
        .zip(macro_norm)
        .map(|(p, m)| p - m)
        .collect()
}

/// Strictly beyond `threshold` on either side leaves "fair"
pub fn classify_gap(gap: f64, threshold: f64) -> GapSignal {
    if gap > threshold {
        GapSignal::Overheated
    } else if gap < -threshold {
        GapSignal::Undervalued
    } else {
        GapSignal::Fair
    }
}

/// `price[t + horizon] / price[t] - 1`, missing where the window runs out
/// or the base price is zero
pub fn forward_returns(prices: &[f64], horizon: usize) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|t| {
            let future = *t.checked_add(horizon).and_then(|i| prices.get(i))?;
            let base = prices[t];
            if base == 0.0 || horizon == 0 {
                None
            } else {
                Some(future / base - 1.0)
            }
        })
        .collect()
}

/// One point of the gap-vs-forward-return scatter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapReturnSample {
    pub date: NaiveDate,
    pub gap: f64,
    pub forward_return: f64,
}

/// Does the gap predict mean reversion?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapBacktest {
    pub horizon: usize,
    /// Correlation of gap with forward return; `None` when undefined
    pub correlation: Option<f64>,
    /// 0-100, only non-zero when the correlation is negative
    pub confidence: u8,
    pub samples: Vec<GapReturnSample>,
}

impl GapBacktest {
    pub fn empty(horizon: usize) -> Self {
        Self {
            horizon,
            correlation: None,
            confidence: 0,
            samples: Vec::new(),
        }
    }
}

/// Confidence score: `min(100, round(100 * |corr|))` for a negative
/// correlation, else 0
pub fn confidence_score(correlation: Option<f64>) -> u8 {
    match correlation {
        Some(c) if c < 0.0 => (100.0 * c.abs()).round().min(100.0) as u8,
        _ => 0,
    }
}

/// Correlate the gap series with the forward return over `horizon` rows
pub fn backtest_gap(dates: &[NaiveDate], gaps: &[f64], prices: &[f64], horizon: usize) -> GapBacktest {
    let fwd = forward_returns(prices, horizon);

    let samples: Vec<GapReturnSample> = dates
        .iter()
        .zip(gaps)
        .zip(&fwd)
        .filter_map(|((&date, &gap), r)| {
            r.map(|forward_return| GapReturnSample {
                date,
                gap,
                forward_return,
            })
        })
        .collect();

    let xs: Vec<f64> = samples.iter().map(|s| s.gap).collect();
    let ys: Vec<f64> = samples.iter().map(|s| s.forward_return).collect();
    let correlation = pearson_dense(&xs, &ys);

    GapBacktest {
        horizon,
        correlation,
        confidence: confidence_score(correlation),
        samples,
    }
}
