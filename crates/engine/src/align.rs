//! Series alignment onto the price calendar
//!
//! Macro feeds rarely share the security's trading calendar: they can be
//! monthly, have holidays of their own, or simply have holes. Every indicator
//! is therefore reindexed onto the price series' date index before anything
//! else happens to it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::TimeSeries;

/// How gaps are filled after reindexing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Exact-date reindex, linear interpolation by position, then backward
    /// fill of leading gaps and forward fill of trailing gaps.
    #[default]
    Interpolate,
    /// As-of carry: each target date takes the latest observation dated on
    /// or before it. Dates before the first observation stay missing.
    ForwardFill,
}

impl std::fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillPolicy::Interpolate => write!(f, "interpolate"),
            FillPolicy::ForwardFill => write!(f, "ffill"),
        }
    }
}

impl std::str::FromStr for FillPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "interpolate" | "interp" => Ok(FillPolicy::Interpolate),
            "ffill" | "forward" | "forward_fill" => Ok(FillPolicy::ForwardFill),
            other => Err(format!("unknown fill policy '{}'", other)),
        }
    }
}

/// Align `indicator` onto `target` (the price dates) using `policy`.
///
/// The result has exactly `target.len()` entries. It is all `None` only when
/// the indicator has no usable observation for the target window.
pub fn align(indicator: &TimeSeries, target: &[NaiveDate], policy: FillPolicy) -> Vec<Option<f64>> {
    match policy {
        FillPolicy::Interpolate => {
            let mut values = reindex(indicator, target);
            interpolate_linear(&mut values);
            backward_fill(&mut values);
            forward_fill(&mut values);
            values
        }
        FillPolicy::ForwardFill => target.iter().map(|&d| indicator.value_as_of(d)).collect(),
    }
}

/// Exact-date reindex. Indicator dates outside `target` are dropped.
pub fn reindex(indicator: &TimeSeries, target: &[NaiveDate]) -> Vec<Option<f64>> {
    target.iter().map(|&d| indicator.get(d)).collect()
}

/// Fill interior gaps by straight line between the surrounding known values,
/// treating positions as equally spaced. Edges are left untouched.
pub fn interpolate_linear(values: &mut [Option<f64>]) {
    let mut last_known: Option<(usize, f64)> = None;

    for i in 0..values.len() {
        let Some(v) = values[i] else { continue };

        if let Some((j, prev)) = last_known {
            let span = (i - j) as f64;
            for k in (j + 1)..i {
                let t = (k - j) as f64 / span;
                values[k] = Some(prev + (v - prev) * t);
            }
        }
        last_known = Some((i, v));
    }
}

/// Fill leading gaps with the first known value
pub fn backward_fill(values: &mut [Option<f64>]) {
    let mut next: Option<f64> = None;
    for slot in values.iter_mut().rev() {
        match slot {
            Some(v) => next = Some(*v),
            None => *slot = next,
        }
    }
}

/// Fill trailing gaps with the last known value
pub fn forward_fill(values: &mut [Option<f64>]) {
    let mut prev: Option<f64> = None;
    for slot in values.iter_mut() {
        match slot {
            Some(v) => prev = Some(*v),
            None => *slot = prev,
        }
    }
}
