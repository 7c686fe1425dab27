//! Macro-gap analysis pipeline
//!
//! price + indicator configs → align → lag shift → normalize → aggregate →
//! inner join with price → gap and gap backtest.
//!
//! Only a missing price series aborts a run. Each indicator that cannot be
//! fetched, aligned or normalized is dropped with a [`SkipReason`] and its
//! weight leaves the denominator.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, WeightedComponent, WeightingMode};
use crate::align::{align, FillPolicy};
use crate::api::SeriesProvider;
use crate::error::{AnalysisError, AnalysisResult, NormalizeError};
use crate::gap::{
    backtest_gap, classify_gap, GapBacktest, GapReading, DEFAULT_FORWARD_HORIZON,
    DEFAULT_GAP_THRESHOLD,
};
use crate::lag::{null_edges, shift};
use crate::normalize::{min_max, min_max_dense};
use crate::types::{IndicatorConfig, TimeSeries};

/// Weight total the configuration is expected to add up to
pub const EXPECTED_TOTAL_WEIGHT: f64 = 100.0;

// ============================================================================
// Types
// ============================================================================

/// Knobs shared by every indicator in one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    /// Positive: indicator leads price by `lag` rows (see [`crate::lag`])
    pub lag: i32,
    pub fill_policy: FillPolicy,
    pub weighting: WeightingMode,
    pub gap_threshold: f64,
    pub forward_horizon: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            lag: 0,
            fill_policy: FillPolicy::default(),
            weighting: WeightingMode::default(),
            gap_threshold: DEFAULT_GAP_THRESHOLD,
            forward_horizon: DEFAULT_FORWARD_HORIZON,
        }
    }
}

/// Request for a single analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub ticker: String,
    pub start_date: NaiveDate,
    pub indicators: Vec<IndicatorConfig>,
    #[serde(flatten)]
    pub params: AnalysisParams,
}

/// Why an indicator was left out of the composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    FetchFailed { message: String },
    EmptySeries,
    /// No observation could be placed on the price calendar
    NoOverlap,
    /// The lag shift left nothing to normalize
    NoDataAfterLag,
    /// Constant over the window, min-max undefined
    DegenerateRange,
    /// Regression only: a linear combination of candidates already fitted
    LinearlyDependent,
    /// Regression only: adding it would leave fewer complete rows than the
    /// fit needs
    TooFewCompleteRows { rows: usize, required: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::FetchFailed { message } => write!(f, "fetch failed: {}", message),
            SkipReason::EmptySeries => write!(f, "empty series"),
            SkipReason::NoOverlap => write!(f, "no overlap with price dates"),
            SkipReason::NoDataAfterLag => write!(f, "no data left after lag shift"),
            SkipReason::DegenerateRange => write!(f, "constant series"),
            SkipReason::LinearlyDependent => write!(f, "linear combination of other candidates"),
            SkipReason::TooFewCompleteRows { rows, required } => {
                write!(f, "{} complete rows, regression needs {}", rows, required)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedIndicator {
    pub name: String,
    pub source_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// Configured weights do not add up to the expected total
    WeightImbalance { configured_total: f64, expected_total: f64 },
    IndicatorsSkipped { count: usize },
}

/// An indicator that made it into the composite, on the price calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSeries {
    pub name: String,
    pub source_id: String,
    pub weight: f64,
    pub inverse: bool,
    /// Aligned raw values, before the lag shift
    pub aligned: Vec<Option<f64>>,
    /// Lag-shifted, min-max scaled (and possibly inverted) values
    pub normalized: Vec<Option<f64>>,
}

/// A single row of the joined price/macro table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRow {
    pub date: NaiveDate,
    pub price: f64,
    pub macro_index: f64,
    pub price_norm: f64,
    pub gap: f64,
}

/// Price and macro index inner-joined on date, chronologically ordered
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisFrame {
    pub rows: Vec<FrameRow>,
}

impl AnalysisFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&FrameRow> {
        self.rows.last()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.rows.iter().map(|r| r.date).collect()
    }

    pub fn prices(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.price).collect()
    }

    pub fn macro_index(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.macro_index).collect()
    }

    pub fn gaps(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.gap).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Complete,
    /// At least one configured indicator was skipped
    Partial,
}

/// Everything one analysis run produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub ticker: String,
    pub params: AnalysisParams,
    pub status: AnalysisStatus,
    pub frame: AnalysisFrame,
    /// Price-calendar dates the components are indexed on
    pub dates: Vec<NaiveDate>,
    pub components: Vec<ComponentSeries>,
    pub skipped: Vec<SkippedIndicator>,
    pub warnings: Vec<AnalysisWarning>,
    pub latest: Option<GapReading>,
    pub backtest: GapBacktest,
}

/// An indicator config together with the outcome of fetching it
#[derive(Debug, Clone)]
pub struct FetchedIndicator {
    pub config: IndicatorConfig,
    pub series: Result<TimeSeries, String>,
}

// ============================================================================
// Per-indicator preparation
// ============================================================================

/// Aligned and normalized values for one indicator
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSeries {
    pub aligned: Vec<Option<f64>>,
    pub normalized: Vec<Option<f64>>,
}

/// Align onto `target`, shift by `lag`, then min-max normalize.
///
/// The shift happens before normalization so the range only reflects rows
/// that survive the shift.
pub fn prepare_indicator(
    series: &TimeSeries,
    target: &[NaiveDate],
    lag: i32,
    fill_policy: FillPolicy,
    invert: bool,
) -> Result<PreparedSeries, SkipReason> {
    if series.is_empty() {
        return Err(SkipReason::EmptySeries);
    }

    let aligned = align(series, target, fill_policy);
    if aligned.iter().all(Option::is_none) {
        return Err(SkipReason::NoOverlap);
    }

    let shifted = shift(&aligned, lag);
    let normalized = min_max(&shifted, invert).map_err(|e| match e {
        NormalizeError::Empty => SkipReason::NoDataAfterLag,
        NormalizeError::DegenerateRange { .. } => SkipReason::DegenerateRange,
    })?;

    Ok(PreparedSeries {
        aligned,
        normalized,
    })
}

// ============================================================================
// Validation
// ============================================================================

/// Reject configurations that break the per-run invariants
pub fn validate_request(indicators: &[IndicatorConfig], params: &AnalysisParams) -> AnalysisResult<()> {
    let mut seen = HashSet::new();
    for cfg in indicators {
        if cfg.name.trim().is_empty() {
            return Err(AnalysisError::InvalidConfig("indicator name is empty".to_string()));
        }
        if !seen.insert(cfg.name.as_str()) {
            return Err(AnalysisError::InvalidConfig(format!(
                "duplicate indicator name '{}'",
                cfg.name
            )));
        }
        if !cfg.weight.is_finite() || cfg.weight < 0.0 {
            return Err(AnalysisError::InvalidConfig(format!(
                "weight of '{}' must be a non-negative number, got {}",
                cfg.name, cfg.weight
            )));
        }
    }
    if !params.gap_threshold.is_finite() || params.gap_threshold < 0.0 {
        return Err(AnalysisError::InvalidConfig(format!(
            "gap threshold must be non-negative, got {}",
            params.gap_threshold
        )));
    }
    if params.forward_horizon == 0 {
        return Err(AnalysisError::InvalidConfig(
            "forward horizon must be at least 1".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run the pipeline on already-fetched data. Pure: identical inputs give
/// identical output.
pub fn build_analysis(
    ticker: &str,
    price: &TimeSeries,
    indicators: Vec<FetchedIndicator>,
    params: AnalysisParams,
) -> AnalysisResult<AnalysisReport> {
    let configs: Vec<IndicatorConfig> = indicators.iter().map(|f| f.config.clone()).collect();
    validate_request(&configs, &params)?;

    if price.is_empty() {
        return Err(AnalysisError::PriceUnavailable {
            ticker: ticker.to_string(),
            reason: "empty price series".to_string(),
        });
    }

    let dates = price.dates();
    let mut warnings = Vec::new();

    let configured_total: f64 = configs.iter().map(|c| c.weight).sum();
    if !configs.is_empty() && (configured_total - EXPECTED_TOTAL_WEIGHT).abs() > 1e-6 {
        warn!(
            ticker,
            configured_total,
            expected = EXPECTED_TOTAL_WEIGHT,
            "Indicator weights do not sum to the expected total, using actual sum"
        );
        warnings.push(AnalysisWarning::WeightImbalance {
            configured_total,
            expected_total: EXPECTED_TOTAL_WEIGHT,
        });
    }

    let mut components = Vec::new();
    let mut skipped = Vec::new();

    for fetched in indicators {
        let FetchedIndicator { config, series } = fetched;
        let prepared = series
            .map_err(|message| SkipReason::FetchFailed { message })
            .and_then(|s| prepare_indicator(&s, &dates, params.lag, params.fill_policy, config.inverse));

        match prepared {
            Ok(p) => {
                debug!(name = %config.name, weight = config.weight, "Indicator loaded");
                components.push(ComponentSeries {
                    name: config.name,
                    source_id: config.source_id,
                    weight: config.weight,
                    inverse: config.inverse,
                    aligned: p.aligned,
                    normalized: p.normalized,
                });
            }
            Err(reason) => {
                warn!(name = %config.name, source = %config.source_id, %reason, "Indicator skipped");
                skipped.push(SkippedIndicator {
                    name: config.name,
                    source_id: config.source_id,
                    reason,
                });
            }
        }
    }

    if !skipped.is_empty() {
        warnings.push(AnalysisWarning::IndicatorsSkipped {
            count: skipped.len(),
        });
    }

    let weighted: Vec<WeightedComponent<'_>> = components
        .iter()
        .map(|c| WeightedComponent {
            values: &c.normalized,
            weight: c.weight,
        })
        .collect();
    let mut macro_index = aggregate(&weighted, dates.len(), params.weighting);

    let loaded_weight: f64 = components.iter().map(|c| c.weight).sum();
    if loaded_weight > 0.0 {
        null_edges(&mut macro_index, params.lag);
    }

    let frame = build_frame(ticker, price, &macro_index)?;

    let latest = frame.last().map(|row| GapReading {
        date: row.date,
        price_norm: row.price_norm,
        macro_index: row.macro_index,
        gap: row.gap,
        signal: classify_gap(row.gap, params.gap_threshold),
    });
    let backtest = backtest_gap(
        &frame.dates(),
        &frame.gaps(),
        &frame.prices(),
        params.forward_horizon,
    );

    let status = if skipped.is_empty() {
        AnalysisStatus::Complete
    } else {
        AnalysisStatus::Partial
    };

    info!(
        ticker,
        loaded = components.len(),
        skipped = skipped.len(),
        rows = frame.len(),
        gap = ?latest.map(|l| l.gap),
        "Analysis complete"
    );

    Ok(AnalysisReport {
        ticker: ticker.to_string(),
        params,
        status,
        frame,
        dates,
        components,
        skipped,
        warnings,
        latest,
        backtest,
    })
}

/// Inner join on date: keep price rows where the macro index is defined,
/// then normalize price over the kept rows.
fn build_frame(ticker: &str, price: &TimeSeries, macro_index: &[Option<f64>]) -> AnalysisResult<AnalysisFrame> {
    let joined: Vec<(NaiveDate, f64, f64)> = price
        .points()
        .iter()
        .zip(macro_index)
        .filter_map(|(p, m)| m.map(|m| (p.date, p.value, m)))
        .collect();

    if joined.is_empty() {
        return Ok(AnalysisFrame::default());
    }

    let prices: Vec<f64> = joined.iter().map(|r| r.1).collect();
    let price_norm = min_max_dense(&prices, false).map_err(|_| AnalysisError::DegeneratePrice {
        ticker: ticker.to_string(),
    })?;

    let rows = joined
        .into_iter()
        .zip(price_norm)
        .map(|((date, price, macro_index), price_norm)| FrameRow {
            date,
            price,
            macro_index,
            price_norm,
            gap: price_norm - macro_index,
        })
        .collect();

    Ok(AnalysisFrame { rows })
}

/// Fetch price and indicators sequentially, then run [`build_analysis`].
///
/// A failed or empty price fetch is the only fatal data condition.
pub async fn run_analysis(
    provider: &dyn SeriesProvider,
    request: &AnalysisRequest,
) -> AnalysisResult<AnalysisReport> {
    validate_request(&request.indicators, &request.params)?;

    info!(
        ticker = %request.ticker,
        start = %request.start_date,
        indicators = request.indicators.len(),
        lag = request.params.lag,
        "Starting macro-gap analysis"
    );

    let price = fetch_price(provider, &request.ticker, request.start_date).await?;

    let mut fetched = Vec::with_capacity(request.indicators.len());
    for config in &request.indicators {
        let series = provider
            .fetch_series(&config.source_id, request.start_date)
            .await
            .map_err(|e| format!("{:#}", e));
        fetched.push(FetchedIndicator {
            config: config.clone(),
            series,
        });
    }

    build_analysis(&request.ticker, &price, fetched, request.params)
}

/// Fetch the primary price series, mapping every failure to
/// [`AnalysisError::PriceUnavailable`]
pub(crate) async fn fetch_price(
    provider: &dyn SeriesProvider,
    ticker: &str,
    start: NaiveDate,
) -> AnalysisResult<TimeSeries> {
    match provider.fetch_series(ticker, start).await {
        Ok(series) if series.is_empty() => Err(AnalysisError::PriceUnavailable {
            ticker: ticker.to_string(),
            reason: "empty price series".to_string(),
        }),
        Ok(series) => Ok(series),
        Err(e) => Err(AnalysisError::PriceUnavailable {
            ticker: ticker.to_string(),
            reason: format!("{:#}", e),
        }),
    }
}
