//! End-to-end runs through a `StaticProvider`

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use engine::{
    find_optimal_mix, run_analysis, AnalysisError, AnalysisParams, AnalysisRequest, AnalysisStatus,
    CachedProvider, CandidateIndicator, FillPolicy, IndicatorConfig, Observation, OptimizeOutcome,
    OptimizeRequest, OptimizeStrategy, SeriesProvider, SkipReason, StaticProvider, TimeSeries,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

/// Weekday calendar, like an equity price feed
fn trading_days(n: usize) -> Vec<NaiveDate> {
    start()
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(n)
        .collect()
}

fn to_series(dates: &[NaiveDate], values: &[f64]) -> TimeSeries {
    TimeSeries::from_pairs(dates, values).unwrap()
}

/// Random-walk price plus a rate series that leads it, a monthly series and
/// pure noise
fn market(seed: u64, n: usize) -> StaticProvider {
    let mut rng = StdRng::seed_from_u64(seed);
    let dates = trading_days(n);

    let mut price = Vec::with_capacity(n);
    let mut level = 100.0;
    for _ in 0..n {
        level *= 1.0 + rng.gen_range(-0.02..0.02);
        price.push(level);
    }

    let rates: Vec<f64> = price.iter().map(|p| 10.0 - p / 20.0 + rng.gen_range(-0.05..0.05)).collect();
    let noise: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..1.0)).collect();

    let monthly: Vec<Observation> = dates
        .iter()
        .zip(&price)
        .filter(|(d, _)| d.day() <= 3)
        .map(|(d, p)| Observation::new(*d, p * 2.0))
        .collect();

    StaticProvider::new()
        .with_series("BTCUSDT", to_series(&dates, &price))
        .with_series("FRED:DGS10", to_series(&dates, &rates))
        .with_series("FRED:NOISE", to_series(&dates, &noise))
        .with_series("FRED:M2", TimeSeries::from_observations(monthly))
}

fn analysis_request(indicators: Vec<IndicatorConfig>, lag: i32) -> AnalysisRequest {
    AnalysisRequest {
        ticker: "BTCUSDT".to_string(),
        start_date: start(),
        indicators,
        params: AnalysisParams {
            lag,
            ..AnalysisParams::default()
        },
    }
}

#[tokio::test]
async fn test_analysis_over_mixed_calendars() {
    let provider = market(7, 120);
    let request = analysis_request(
        vec![
            IndicatorConfig::new("rates", "FRED:DGS10", 60.0, true),
            IndicatorConfig::new("m2", "FRED:M2", 40.0, false),
        ],
        0,
    );

    let report = run_analysis(&provider, &request).await.unwrap();

    assert_eq!(report.status, AnalysisStatus::Complete);
    assert_eq!(report.frame.len(), 120);
    for row in &report.frame.rows {
        assert!(row.macro_index > -1e-12 && row.macro_index < 1.0 + 1e-12);
        assert!((0.0..=1.0).contains(&row.price_norm));
        assert!((row.gap - (row.price_norm - row.macro_index)).abs() < 1e-12);
    }
    // the monthly series is filled onto every trading day
    assert!(report.components[1].aligned.iter().all(Option::is_some));
    assert!(report.latest.is_some());
}

#[tokio::test]
async fn test_missing_indicator_is_skipped() {
    let provider = market(11, 60);
    let request = analysis_request(
        vec![
            IndicatorConfig::new("rates", "FRED:DGS10", 50.0, true),
            IndicatorConfig::new("ghost", "FRED:DOES_NOT_EXIST", 50.0, false),
        ],
        3,
    );

    let report = run_analysis(&provider, &request).await.unwrap();

    assert_eq!(report.status, AnalysisStatus::Partial);
    assert_eq!(report.components.len(), 1);
    assert_eq!(report.skipped[0].name, "ghost");
    assert!(matches!(report.skipped[0].reason, SkipReason::FetchFailed { .. }));
    assert_eq!(report.frame.len(), 57);
}

#[tokio::test]
async fn test_missing_price_is_fatal() {
    let provider = market(3, 30);
    let mut request = analysis_request(vec![IndicatorConfig::new("rates", "FRED:DGS10", 100.0, false)], 0);
    request.ticker = "DOGEUSDT".to_string();

    let err = run_analysis(&provider, &request).await.unwrap_err();
    assert!(matches!(err, AnalysisError::PriceUnavailable { .. }));
}

#[tokio::test]
async fn test_identical_inputs_give_identical_reports() {
    let indicators = vec![
        IndicatorConfig::new("rates", "FRED:DGS10", 70.0, true),
        IndicatorConfig::new("noise", "FRED:NOISE", 30.0, false),
    ];

    let first = run_analysis(&market(42, 200), &analysis_request(indicators.clone(), 5))
        .await
        .unwrap();
    let second = run_analysis(&market(42, 200), &analysis_request(indicators, 5))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_optimizer_prefers_leading_series() {
    let provider = market(5, 150);
    let request = OptimizeRequest {
        ticker: "BTCUSDT".to_string(),
        start_date: start(),
        lag: 0,
        strategy: OptimizeStrategy::Correlation,
        candidates: vec![
            CandidateIndicator::new("noise", "FRED:NOISE"),
            CandidateIndicator::new("rates", "FRED:DGS10"),
            CandidateIndicator::new("missing", "FRED:NOPE"),
        ],
        fill_policy: FillPolicy::Interpolate,
        top_k: Some(1),
        min_correlation: None,
    };

    let outcome = find_optimal_mix(&provider, &request).await.unwrap();
    let OptimizeOutcome::Mix(mix) = outcome else {
        panic!("expected a mix");
    };
    assert_eq!(mix.entries.len(), 1);
    assert_eq!(mix.entries[0].name, "rates");
    assert!(mix.entries[0].inverse);
    assert!((mix.entries[0].weight - 100.0).abs() < 1e-9);
    assert_eq!(mix.skipped.len(), 1);

    // the suggested mix is directly usable as analysis input
    let report = run_analysis(&provider, &analysis_request(mix.to_configs(), 0))
        .await
        .unwrap();
    assert_eq!(report.status, AnalysisStatus::Complete);
}

#[tokio::test]
async fn test_optimizer_rejects_out_of_range_threshold() {
    let request = OptimizeRequest {
        ticker: "BTCUSDT".to_string(),
        start_date: start(),
        lag: 0,
        strategy: OptimizeStrategy::Correlation,
        candidates: vec![],
        fill_policy: FillPolicy::Interpolate,
        top_k: None,
        min_correlation: Some(1.5),
    };
    let err = find_optimal_mix(&market(1, 20), &request).await.unwrap_err();
    assert!(matches!(err, AnalysisError::InvalidConfig(_)));
}

struct Unreachable;

#[async_trait]
impl SeriesProvider for Unreachable {
    async fn fetch_series(&self, source_id: &str, _start: NaiveDate) -> Result<TimeSeries> {
        anyhow::bail!("connection refused fetching {}", source_id)
    }
}

#[tokio::test]
async fn test_cached_fixture_serves_repeat_runs() {
    let cache = CachedProvider::new(Arc::new(market(9, 40)));
    let request = analysis_request(vec![IndicatorConfig::new("rates", "FRED:DGS10", 100.0, false)], 0);

    let first = run_analysis(&cache, &request).await.unwrap();
    assert_eq!(cache.len(), 2);
    let second = run_analysis(&cache, &request).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.invalidate(), 2);
}

#[tokio::test]
async fn test_unreachable_provider_reports_reason() {
    let request = analysis_request(vec![], 0);
    let err = run_analysis(&Unreachable, &request).await.unwrap_err();
    match err {
        AnalysisError::PriceUnavailable { ticker, reason } => {
            assert_eq!(ticker, "BTCUSDT");
            assert!(reason.contains("connection refused"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}
