//! Auto-fit of indicator mixes
//!
//! Picks a small, weighted subset of candidate indicators whose normalized
//! values track the security's normalized price, either by ranking Pearson
//! correlations or by the coefficients of a multivariate OLS fit. The result
//! is a suggestion the caller can feed back into an analysis run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::{info, warn};

use crate::align::FillPolicy;
use crate::analysis::{fetch_price, prepare_indicator, SkipReason, SkippedIndicator};
use crate::api::SeriesProvider;
use crate::error::{AnalysisError, AnalysisResult, StatsError};
use crate::normalize::min_max;
use crate::stats::{independent_columns, ols, pearson};
use crate::types::{default_candidate_pool, CandidateIndicator, IndicatorConfig, TimeSeries};

pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_MIN_CORRELATION: f64 = 0.3;

// ============================================================================
// Types
// ============================================================================

/// How candidates are scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeStrategy {
    /// |Pearson correlation| with normalized price, filtered by a minimum
    #[default]
    Correlation,
    /// |coefficient| of an OLS fit of normalized price on all candidates
    Regression,
}

impl std::fmt::Display for OptimizeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizeStrategy::Correlation => write!(f, "Correlation"),
            OptimizeStrategy::Regression => write!(f, "Regression"),
        }
    }
}

impl std::str::FromStr for OptimizeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "correlation" | "corr" => Ok(OptimizeStrategy::Correlation),
            "regression" | "ols" => Ok(OptimizeStrategy::Regression),
            other => Err(format!("unknown optimize strategy '{}'", other)),
        }
    }
}

/// Request to search for an indicator mix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeRequest {
    pub ticker: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub lag: i32,
    #[serde(default)]
    pub strategy: OptimizeStrategy,
    /// Empty means the built-in pool
    #[serde(default)]
    pub candidates: Vec<CandidateIndicator>,
    #[serde(default)]
    pub fill_policy: FillPolicy,
    /// Number of indicators to keep (default 3)
    pub top_k: Option<usize>,
    /// Correlation strategy only (default 0.3)
    pub min_correlation: Option<f64>,
}

impl OptimizeRequest {
    pub fn top_k(&self) -> usize {
        self.top_k.unwrap_or(DEFAULT_TOP_K).max(1)
    }

    pub fn min_correlation(&self) -> f64 {
        self.min_correlation.unwrap_or(DEFAULT_MIN_CORRELATION)
    }

    pub fn candidate_pool(&self) -> Vec<CandidateIndicator> {
        if self.candidates.is_empty() {
            default_candidate_pool()
        } else {
            self.candidates.clone()
        }
    }
}

/// One selected indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixEntry {
    pub name: String,
    pub source_id: String,
    /// Share of 100 across the mix
    pub weight: f64,
    /// Negative score: the indicator moves against price
    pub inverse: bool,
    /// Correlation or regression coefficient it was ranked by
    pub score: f64,
}

/// A weighted selection of at most `top_k` indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedMix {
    pub strategy: OptimizeStrategy,
    pub lag: i32,
    pub entries: Vec<MixEntry>,
    /// Fit quality of the regression strategy, in [0, 1]
    pub r_squared: Option<f64>,
    pub skipped: Vec<SkippedIndicator>,
}

impl OptimizedMix {
    /// Indicator configs ready for an analysis request
    pub fn to_configs(&self) -> Vec<IndicatorConfig> {
        self.entries
            .iter()
            .map(|e| IndicatorConfig::new(e.name.clone(), e.source_id.clone(), e.weight, e.inverse))
            .collect()
    }
}

/// Either a usable mix or the explicit "nothing tracks this price" sentinel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OptimizeOutcome {
    Mix(OptimizedMix),
    NoCorrelation { skipped: Vec<SkippedIndicator> },
}

/// A candidate aligned, lag-shifted and normalized on the price calendar
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCandidate {
    pub name: String,
    pub source_id: String,
    pub normalized: Vec<Option<f64>>,
}

// ============================================================================
// Preparation
// ============================================================================

/// Prepare every fetched candidate, splitting off the ones that fail
pub fn prepare_candidates(
    dates: &[NaiveDate],
    fetched: Vec<(CandidateIndicator, Result<TimeSeries, String>)>,
    lag: i32,
    fill_policy: FillPolicy,
) -> (Vec<PreparedCandidate>, Vec<SkippedIndicator>) {
    let mut prepared = Vec::new();
    let mut skipped = Vec::new();

    for (candidate, series) in fetched {
        let result = series
            .map_err(|message| SkipReason::FetchFailed { message })
            .and_then(|s| prepare_indicator(&s, dates, lag, fill_policy, false));

        match result {
            Ok(p) => prepared.push(PreparedCandidate {
                name: candidate.name,
                source_id: candidate.source_id,
                normalized: p.normalized,
            }),
            Err(reason) => {
                warn!(name = %candidate.name, %reason, "Candidate skipped");
                skipped.push(SkippedIndicator {
                    name: candidate.name,
                    source_id: candidate.source_id,
                    reason,
                });
            }
        }
    }

    (prepared, skipped)
}

// ============================================================================
// Scoring
// ============================================================================

/// Correlation strategy: keep candidates with `|corr| >= min_correlation`,
/// best `top_k` by `|corr|`, weighted by `|corr|`.
pub fn rank_by_correlation(
    price_norm: &[Option<f64>],
    candidates: &[PreparedCandidate],
    top_k: usize,
    min_correlation: f64,
) -> Vec<MixEntry> {
    let scored: Vec<(&PreparedCandidate, f64)> = candidates
        .iter()
        .filter_map(|c| pearson(&c.normalized, price_norm).map(|r| (c, r)))
        .filter(|(_, r)| r.abs() >= min_correlation)
        .collect();

    finalize_entries(scored, top_k)
}

/// Output of [`fit_regression`]
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionFit {
    pub entries: Vec<MixEntry>,
    pub r_squared: f64,
    /// Candidates left out of the design matrix
    pub skipped: Vec<SkippedIndicator>,
}

/// Regression strategy: OLS of normalized price on the candidates (with
/// intercept); best `top_k` by `|coefficient|`, weighted by `|coefficient|`.
///
/// Candidates enter the design one at a time, widest coverage first. One is
/// skipped when it is a linear combination of those already in, or when the
/// rows complete for all of them would be too few to fit. Fails only when no
/// candidate can be fitted at all.
pub fn fit_regression(
    price_norm: &[Option<f64>],
    candidates: &[PreparedCandidate],
    top_k: usize,
) -> Result<RegressionFit, StatsError> {
    let price_rows: Vec<usize> = (0..price_norm.len())
        .filter(|&i| price_norm[i].is_some())
        .collect();

    let coverage: Vec<usize> = candidates
        .iter()
        .map(|c| present_rows(&c.normalized, &price_rows).len())
        .collect();
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by_key(|&j| Reverse(coverage[j]));

    let mut kept: Vec<usize> = Vec::new();
    let mut rows = price_rows;
    let mut skipped = Vec::new();

    for j in order {
        let trial_rows = present_rows(&candidates[j].normalized, &rows);
        // intercept, kept columns, this one, and one residual degree of freedom
        let required = kept.len() + 3;
        if trial_rows.len() < required {
            skipped.push(skip(
                &candidates[j],
                SkipReason::TooFewCompleteRows {
                    rows: trial_rows.len(),
                    required,
                },
            ));
            continue;
        }

        let trial_columns: Vec<Vec<f64>> = kept
            .iter()
            .chain(std::iter::once(&j))
            .map(|&k| dense(&candidates[k].normalized, &trial_rows))
            .collect();
        if independent_columns(&trial_columns).contains(&false) {
            skipped.push(skip(&candidates[j], SkipReason::LinearlyDependent));
            continue;
        }

        kept.push(j);
        rows = trial_rows;
    }

    if kept.is_empty() {
        return Err(StatsError::InsufficientData {
            required: 3,
            actual: coverage.iter().copied().max().unwrap_or(0),
        });
    }

    let y = dense(price_norm, &rows);
    let fit = loop {
        let columns: Vec<Vec<f64>> = kept
            .iter()
            .map(|&k| dense(&candidates[k].normalized, &rows))
            .collect();
        match ols(&columns, &y) {
            Ok(fit) => break fit,
            // nearly collinear: the normal equations can still collapse
            Err(StatsError::Singular) if kept.len() > 1 => {
                if let Some(k) = kept.pop() {
                    skipped.push(skip(&candidates[k], SkipReason::LinearlyDependent));
                }
            }
            Err(e) => return Err(e),
        }
    };

    for s in &skipped {
        warn!(name = %s.name, reason = %s.reason, "Candidate left out of regression");
    }

    let scored: Vec<(&PreparedCandidate, f64)> = kept
        .iter()
        .map(|&k| &candidates[k])
        .zip(fit.coefficients.iter().copied())
        .collect();

    Ok(RegressionFit {
        entries: finalize_entries(scored, top_k),
        r_squared: fit.r_squared,
        skipped,
    })
}

fn skip(candidate: &PreparedCandidate, reason: SkipReason) -> SkippedIndicator {
    SkippedIndicator {
        name: candidate.name.clone(),
        source_id: candidate.source_id.clone(),
        reason,
    }
}

/// The subset of `rows` where `values` is present
fn present_rows(values: &[Option<f64>], rows: &[usize]) -> Vec<usize> {
    rows.iter()
        .copied()
        .filter(|&i| values.get(i).copied().flatten().is_some())
        .collect()
}

fn dense(values: &[Option<f64>], rows: &[usize]) -> Vec<f64> {
    rows.iter()
        .filter_map(|&i| values.get(i).copied().flatten())
        .collect()
}

/// Sort by |score| descending, keep `top_k`, weight by share of |score|
fn finalize_entries(mut scored: Vec<(&PreparedCandidate, f64)>, top_k: usize) -> Vec<MixEntry> {
    scored.retain(|(_, s)| s.is_finite() && *s != 0.0);
    scored.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    scored.truncate(top_k);

    let total: f64 = scored.iter().map(|(_, s)| s.abs()).sum();
    if total <= 0.0 {
        return Vec::new();
    }

    scored
        .into_iter()
        .map(|(c, s)| MixEntry {
            name: c.name.clone(),
            source_id: c.source_id.clone(),
            weight: 100.0 * s.abs() / total,
            inverse: s < 0.0,
            score: s,
        })
        .collect()
}

// ============================================================================
// Runners
// ============================================================================

/// Score already-fetched data. Pure.
pub fn optimize_mix(
    ticker: &str,
    price: &TimeSeries,
    fetched: Vec<(CandidateIndicator, Result<TimeSeries, String>)>,
    request: &OptimizeRequest,
) -> AnalysisResult<OptimizeOutcome> {
    let dates = price.dates();
    let price_values: Vec<Option<f64>> = price.values().into_iter().map(Some).collect();
    let price_norm = min_max(&price_values, false).map_err(|_| AnalysisError::DegeneratePrice {
        ticker: ticker.to_string(),
    })?;

    let (candidates, mut skipped) = prepare_candidates(&dates, fetched, request.lag, request.fill_policy);
    if candidates.is_empty() {
        info!(ticker, "No usable candidates");
        return Ok(OptimizeOutcome::NoCorrelation { skipped });
    }

    let (entries, r_squared) = match request.strategy {
        OptimizeStrategy::Correlation => (
            rank_by_correlation(&price_norm, &candidates, request.top_k(), request.min_correlation()),
            None,
        ),
        OptimizeStrategy::Regression => {
            let fit = fit_regression(&price_norm, &candidates, request.top_k())?;
            skipped.extend(fit.skipped);
            (fit.entries, Some(fit.r_squared))
        }
    };

    if entries.is_empty() {
        info!(ticker, strategy = %request.strategy, "No candidate passed the threshold");
        return Ok(OptimizeOutcome::NoCorrelation { skipped });
    }

    if let Some(best) = entries.first() {
        info!(
            ticker,
            strategy = %request.strategy,
            best = %best.name,
            score = best.score,
            selected = entries.len(),
            r_squared = ?r_squared,
            "Best indicator mix found"
        );
    }

    Ok(OptimizeOutcome::Mix(OptimizedMix {
        strategy: request.strategy,
        lag: request.lag,
        entries,
        r_squared,
        skipped,
    }))
}

/// Fetch price and every candidate sequentially, then [`optimize_mix`].
pub async fn find_optimal_mix(
    provider: &dyn SeriesProvider,
    request: &OptimizeRequest,
) -> AnalysisResult<OptimizeOutcome> {
    let min_corr = request.min_correlation();
    if !min_corr.is_finite() || !(0.0..=1.0).contains(&min_corr) {
        return Err(AnalysisError::InvalidConfig(format!(
            "min correlation must be within [0, 1], got {}",
            min_corr
        )));
    }

    let pool = request.candidate_pool();
    info!(
        ticker = %request.ticker,
        strategy = %request.strategy,
        candidates = pool.len(),
        lag = request.lag,
        "Starting indicator mix search"
    );

    let price = fetch_price(provider, &request.ticker, request.start_date).await?;

    let mut fetched = Vec::with_capacity(pool.len());
    for candidate in pool {
        let series = provider
            .fetch_series(&candidate.source_id, request.start_date)
            .await
            .map_err(|e| format!("{:#}", e));
        fetched.push((candidate, series));
    }

    optimize_mix(&request.ticker, &price, fetched, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::*;

    fn request(strategy: OptimizeStrategy) -> OptimizeRequest {
        OptimizeRequest {
            ticker: "TEST".to_string(),
            start_date: day(0),
            lag: 0,
            strategy,
            candidates: vec![],
            fill_policy: FillPolicy::Interpolate,
            top_k: None,
            min_correlation: None,
        }
    }

    fn fetched(name: &str, values: &[f64]) -> (CandidateIndicator, Result<TimeSeries, String>) {
        (
            CandidateIndicator::new(name, format!("SRC:{}", name)),
            Ok(series(values)),
        )
    }

    fn trend(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn test_single_strong_candidate_gets_full_weight() {
        let price = series(&trend(40));
        let strong: Vec<f64> = (0..40).map(|i| 5.0 + 0.5 * i as f64).collect();
        let alternating: Vec<f64> = (0..40).map(|i| (i % 2) as f64).collect();
        let triple: Vec<f64> = (0..40).map(|i| (i % 3) as f64).collect();

        let outcome = optimize_mix(
            "TEST",
            &price,
            vec![
                fetched("noise_a", &alternating),
                fetched("strong", &strong),
                fetched("noise_b", &triple),
            ],
            &request(OptimizeStrategy::Correlation),
        )
        .unwrap();

        let OptimizeOutcome::Mix(mix) = outcome else {
            panic!("expected a mix");
        };
        assert_eq!(mix.entries.len(), 1);
        assert_eq!(mix.entries[0].name, "strong");
        assert!(!mix.entries[0].inverse);
        assert_close(mix.entries[0].weight, 100.0);
        assert_close(mix.entries[0].score, 1.0);
        assert_eq!(mix.r_squared, None);
    }

    #[test]
    fn test_negative_correlation_marks_inverse() {
        let price = series(&trend(30));
        let falling: Vec<f64> = (0..30).map(|i| 50.0 - i as f64).collect();
        let rising: Vec<f64> = (0..30).map(|i| (i * i) as f64).collect();

        let outcome = optimize_mix(
            "TEST",
            &price,
            vec![fetched("falling", &falling), fetched("rising", &rising)],
            &request(OptimizeStrategy::Correlation),
        )
        .unwrap();

        let OptimizeOutcome::Mix(mix) = outcome else {
            panic!("expected a mix");
        };
        assert_eq!(mix.entries[0].name, "falling");
        assert!(mix.entries[0].inverse);
        let total: f64 = mix.entries.iter().map(|e| e.weight).sum();
        assert_close(total, 100.0);
        assert!(mix.entries[0].weight > mix.entries[1].weight);
    }

    #[test]
    fn test_top_k_limits_selection() {
        let price = series(&trend(20));
        let pool: Vec<_> = (0..5)
            .map(|k| {
                let values: Vec<f64> = (0..20).map(|i| (i as f64) + ((i * (k + 2)) % 3) as f64).collect();
                fetched(&format!("c{}", k), &values)
            })
            .collect();

        let outcome = optimize_mix("TEST", &price, pool, &request(OptimizeStrategy::Correlation)).unwrap();
        let OptimizeOutcome::Mix(mix) = outcome else {
            panic!("expected a mix");
        };
        assert_eq!(mix.entries.len(), DEFAULT_TOP_K);
        for pair in mix.entries.windows(2) {
            assert!(pair[0].score.abs() >= pair[1].score.abs());
        }
    }

    #[test]
    fn test_no_candidate_above_threshold_is_sentinel() {
        let price = series(&trend(40));
        let alternating: Vec<f64> = (0..40).map(|i| (i % 2) as f64).collect();
        let outcome = optimize_mix(
            "TEST",
            &price,
            vec![fetched("noise", &alternating)],
            &request(OptimizeStrategy::Correlation),
        )
        .unwrap();
        assert!(matches!(outcome, OptimizeOutcome::NoCorrelation { .. }));
    }

    #[test]
    fn test_failing_candidates_are_skipped_not_fatal() {
        let price = series(&trend(10));
        let outcome = optimize_mix(
            "TEST",
            &price,
            vec![
                (CandidateIndicator::new("down", "SRC:down"), Err("404".to_string())),
                fetched("flat", &[3.0; 10]),
                fetched("good", &trend(10)),
            ],
            &request(OptimizeStrategy::Correlation),
        )
        .unwrap();

        let OptimizeOutcome::Mix(mix) = outcome else {
            panic!("expected a mix");
        };
        assert_eq!(mix.entries.len(), 1);
        assert_eq!(mix.skipped.len(), 2);
        assert_eq!(mix.skipped[1].reason, SkipReason::DegenerateRange);
    }

    #[test]
    fn test_empty_candidate_set_is_sentinel() {
        let price = series(&trend(10));
        let outcome = optimize_mix("TEST", &price, vec![], &request(OptimizeStrategy::Regression)).unwrap();
        assert_eq!(outcome, OptimizeOutcome::NoCorrelation { skipped: vec![] });
    }

    #[test]
    fn test_regression_recovers_signed_weights() {
        // price = 100 + 3a - 2b exactly, so the fit is perfect
        let a: Vec<f64> = (0..40).map(|i| (i % 7) as f64).collect();
        let b: Vec<f64> = (0..40).map(|i| (i % 5) as f64).collect();
        let prices: Vec<f64> = a.iter().zip(&b).map(|(x, y)| 100.0 + 3.0 * x - 2.0 * y).collect();

        let outcome = optimize_mix(
            "TEST",
            &series(&prices),
            vec![fetched("a", &a), fetched("b", &b)],
            &request(OptimizeStrategy::Regression),
        )
        .unwrap();

        let OptimizeOutcome::Mix(mix) = outcome else {
            panic!("expected a mix");
        };
        assert!(mix.r_squared.unwrap() > 0.999_999);
        assert_eq!(mix.entries[0].name, "a");
        assert!(!mix.entries[0].inverse);
        assert_eq!(mix.entries[1].name, "b");
        assert!(mix.entries[1].inverse);
        // |coef| is proportional to slope * raw range: 3*6 vs 2*4
        assert!((mix.entries[0].weight - 100.0 * 18.0 / 26.0).abs() < 1e-6);
        assert!((mix.entries[1].weight - 100.0 * 8.0 / 26.0).abs() < 1e-6);
    }

    #[test]
    fn test_regression_with_lag_uses_complete_rows() {
        let a: Vec<f64> = (0..30).map(|i| ((i * 3) % 11) as f64).collect();
        // price follows `a` two rows later
        let prices: Vec<f64> = (0..30)
            .map(|i| if i >= 2 { 50.0 + a[i - 2] } else { 50.0 })
            .collect();
        let mut req = request(OptimizeStrategy::Regression);
        req.lag = 2;

        let outcome = optimize_mix("TEST", &series(&prices), vec![fetched("a", &a)], &req).unwrap();
        let OptimizeOutcome::Mix(mix) = outcome else {
            panic!("expected a mix");
        };
        assert!(mix.r_squared.unwrap() > 0.999_999);
        assert_eq!(mix.entries.len(), 1);
        assert_close(mix.entries[0].weight, 100.0);
    }

    #[test]
    fn test_regression_skips_linear_combinations() {
        // the spread is 10y - 2y, like T10Y2Y against DGS10 and DGS2
        let ten: Vec<f64> = (0..40).map(|i| (i % 7) as f64).collect();
        let two: Vec<f64> = (0..40).map(|i| (i % 5) as f64).collect();
        let spread: Vec<f64> = ten.iter().zip(&two).map(|(a, b)| a - b).collect();
        let rescaled: Vec<f64> = ten.iter().map(|v| 2.0 * v + 1.0).collect();
        let prices: Vec<f64> = ten.iter().zip(&two).map(|(a, b)| 100.0 + 3.0 * a - 2.0 * b).collect();

        let outcome = optimize_mix(
            "TEST",
            &series(&prices),
            vec![
                fetched("10y", &ten),
                fetched("2y", &two),
                fetched("spread", &spread),
                fetched("10y_rescaled", &rescaled),
            ],
            &request(OptimizeStrategy::Regression),
        )
        .unwrap();

        let OptimizeOutcome::Mix(mix) = outcome else {
            panic!("expected a mix");
        };
        assert!(mix.r_squared.unwrap() > 0.999_999);
        let names: Vec<&str> = mix.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["10y", "2y"]);
        assert!((mix.entries[0].weight - 100.0 * 18.0 / 26.0).abs() < 1e-6);
        assert!(mix.entries[1].inverse);

        let skipped: Vec<(&str, &SkipReason)> = mix.skipped.iter().map(|s| (s.name.as_str(), &s.reason)).collect();
        assert_eq!(
            skipped,
            vec![
                ("spread", &SkipReason::LinearlyDependent),
                ("10y_rescaled", &SkipReason::LinearlyDependent),
            ]
        );
    }

    #[test]
    fn test_regression_drops_candidates_beyond_available_rows() {
        let prices = [10.0, 12.0, 11.0, 15.0];
        let outcome = optimize_mix(
            "TEST",
            &series(&prices),
            vec![
                fetched("a", &[0.0, 1.0, 0.0, 1.0]),
                fetched("b", &[0.0, 0.0, 1.0, 1.0]),
                fetched("c", &[1.0, 2.0, 3.0, 5.0]),
            ],
            &request(OptimizeStrategy::Regression),
        )
        .unwrap();

        let OptimizeOutcome::Mix(mix) = outcome else {
            panic!("expected a mix");
        };
        // y = -0.1 + 0.6a + 0.4b is the least-squares plane
        assert_eq!(mix.entries.len(), 2);
        assert_eq!(mix.entries[0].name, "a");
        assert!((mix.entries[0].weight - 60.0).abs() < 1e-6);
        assert!((mix.entries[1].weight - 40.0).abs() < 1e-6);
        assert_eq!(mix.skipped.len(), 1);
        assert_eq!(mix.skipped[0].name, "c");
        assert_eq!(
            mix.skipped[0].reason,
            SkipReason::TooFewCompleteRows { rows: 4, required: 5 }
        );
    }

    fn prepared(name: &str, values: Vec<Option<f64>>) -> PreparedCandidate {
        PreparedCandidate {
            name: name.to_string(),
            source_id: format!("SRC:{}", name),
            normalized: values,
        }
    }

    #[test]
    fn test_regression_late_series_does_not_starve_the_fit() {
        let price: Vec<Option<f64>> = (0..10).map(|i| Some(i as f64 / 9.0)).collect();
        let mut late = vec![None; 8];
        late.extend([Some(0.0), Some(1.0)]);
        let full: Vec<Option<f64>> = (0..10).map(|i| Some(((i * 3) % 10) as f64 / 9.0)).collect();

        let fit = fit_regression(&price, &[prepared("late", late), prepared("full", full)], 3).unwrap();

        assert_eq!(fit.entries.len(), 1);
        assert_eq!(fit.entries[0].name, "full");
        assert_eq!(fit.skipped.len(), 1);
        assert_eq!(fit.skipped[0].name, "late");
        assert_eq!(
            fit.skipped[0].reason,
            SkipReason::TooFewCompleteRows { rows: 2, required: 4 }
        );
    }

    #[test]
    fn test_regression_fails_only_when_nothing_fits() {
        let price: Vec<Option<f64>> = vec![Some(0.0), Some(0.5), Some(1.0)];
        let short = vec![None, Some(0.0), Some(1.0)];

        let err = fit_regression(&price, &[prepared("short", short)], 3).unwrap_err();
        assert_eq!(err, StatsError::InsufficientData { required: 3, actual: 2 });
    }

    #[test]
    fn test_to_configs_round_trips_into_analysis_input() {
        let mix = OptimizedMix {
            strategy: OptimizeStrategy::Correlation,
            lag: 0,
            entries: vec![MixEntry {
                name: "rates".to_string(),
                source_id: "FRED:DGS10".to_string(),
                weight: 100.0,
                inverse: true,
                score: -0.8,
            }],
            r_squared: None,
            skipped: vec![],
        };
        assert_eq!(
            mix.to_configs(),
            vec![IndicatorConfig::new("rates", "FRED:DGS10", 100.0, true)]
        );
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("ols".parse::<OptimizeStrategy>().unwrap(), OptimizeStrategy::Regression);
        assert!("grid".parse::<OptimizeStrategy>().is_err());
    }
}
