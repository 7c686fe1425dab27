//! Macro-Gap: macro index vs price divergence analysis
//!
//! Usage:
//!   macro-gap serve --port 3001                                  — Launch HTTP API
//!   macro-gap analyze --ticker BTCUSDT --start 2023-01-01 \
//!       --indicator rates=FRED:DGS10:60:inverse --indicator vix=FRED:VIXCLS:40
//!   macro-gap optimize --ticker BTCUSDT --start 2023-01-01 --strategy regression

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use engine::{
    build_network_provider, find_optimal_mix, run_analysis, AnalysisError, AnalysisParams,
    AnalysisReport, AnalysisRequest, CachedProvider, CandidateIndicator, FillPolicy,
    IndicatorConfig, OptimizeOutcome, OptimizeRequest, OptimizeStrategy, ProviderSettings,
    SeriesProvider, StaticProvider, WeightingMode,
};
use engine::gap::{DEFAULT_FORWARD_HORIZON, DEFAULT_GAP_THRESHOLD};
use engine::optimizer::{DEFAULT_MIN_CORRELATION, DEFAULT_TOP_K};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "macro-gap")]
#[command(about = "Macro index construction and price-gap analysis", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Serve series from a JSON fixture instead of Binance/FRED
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the HTTP API
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
    },
    /// Build the macro index for a ticker and report the current gap
    Analyze {
        /// Price source id (Binance symbol)
        #[arg(long)]
        ticker: String,
        /// First date to fetch (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        /// Rows the indicators lead (positive) or trail (negative) price
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        lag: i32,
        /// JSON file with an array of indicator configs
        #[arg(long)]
        config: Option<PathBuf>,
        /// Indicator as name=source:weight[:inverse], repeatable
        #[arg(long = "indicator")]
        indicators: Vec<String>,
        /// Calendar fill policy: interpolate, ffill
        #[arg(long, default_value = "interpolate")]
        fill: FillPolicy,
        /// Weighting mode: present, configured
        #[arg(long, default_value = "present")]
        weighting: WeightingMode,
        /// |gap| beyond which the reading is overheated/undervalued
        #[arg(long, default_value_t = DEFAULT_GAP_THRESHOLD)]
        threshold: f64,
        /// Forward-return horizon (rows) for the gap backtest
        #[arg(long, default_value_t = DEFAULT_FORWARD_HORIZON)]
        horizon: usize,
        /// Optional JSON export path
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Search for an indicator mix that tracks the ticker's price
    Optimize {
        /// Price source id (Binance symbol)
        #[arg(long)]
        ticker: String,
        /// First date to fetch (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        lag: i32,
        /// Scoring strategy: correlation, regression
        #[arg(long, default_value = "correlation")]
        strategy: OptimizeStrategy,
        /// JSON file with an array of candidates (default: built-in FRED pool)
        #[arg(long)]
        candidates: Option<PathBuf>,
        /// Number of indicators to keep
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        /// Minimum |correlation| for the correlation strategy
        #[arg(long, default_value_t = DEFAULT_MIN_CORRELATION)]
        min_correlation: f64,
    },
}

#[derive(Clone)]
struct AppState {
    provider: Arc<CachedProvider>,
}

/// `--verbose` wins, then `RUST_LOG` (which `.env` may set), then info
fn log_directives(verbose: bool, rust_log: Option<String>) -> String {
    if verbose {
        return "debug,engine=debug,macro_gap=debug".to_string();
    }
    rust_log
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| "info,engine=info,macro_gap=info".to_string())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::new(log_directives(verbose, std::env::var("RUST_LOG").ok()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

/// Network providers, or the fixture file when one was given
fn build_provider(fixture: Option<&Path>) -> anyhow::Result<Arc<CachedProvider>> {
    match fixture {
        Some(path) => {
            let fixture = StaticProvider::from_json_file(path)?;
            info!(path = %path.display(), series = fixture.source_ids().len(), "Using fixture data");
            Ok(Arc::new(CachedProvider::new(Arc::new(fixture))))
        }
        None => {
            let settings = ProviderSettings::from_env()?;
            if settings.fred_api_key.is_none() {
                warn!("FRED_API_KEY not set, FRED indicators will be skipped");
            }
            Ok(Arc::new(build_network_provider(&settings)?))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let provider = build_provider(cli.fixture.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(provider, &host, port).await?;
        }
        Commands::Analyze {
            ticker,
            start,
            lag,
            config,
            indicators,
            fill,
            weighting,
            threshold,
            horizon,
            export,
        } => {
            let mut configs = match config {
                Some(path) => load_json_file::<Vec<IndicatorConfig>>(&path)?,
                None => Vec::new(),
            };
            for raw in &indicators {
                configs.push(parse_indicator_arg(raw)?);
            }
            let request = AnalysisRequest {
                ticker,
                start_date: start,
                indicators: configs,
                params: AnalysisParams {
                    lag,
                    fill_policy: fill,
                    weighting,
                    gap_threshold: threshold,
                    forward_horizon: horizon,
                },
            };
            cmd_analyze(provider.as_ref(), request, export).await?;
        }
        Commands::Optimize {
            ticker,
            start,
            lag,
            strategy,
            candidates,
            top_k,
            min_correlation,
        } => {
            let candidates = match candidates {
                Some(path) => load_json_file::<Vec<CandidateIndicator>>(&path)?,
                None => Vec::new(),
            };
            let request = OptimizeRequest {
                ticker,
                start_date: start,
                lag,
                strategy,
                candidates,
                fill_policy: FillPolicy::default(),
                top_k: Some(top_k),
                min_correlation: Some(min_correlation),
            };
            cmd_optimize(provider.as_ref(), request).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

async fn cmd_serve(provider: Arc<CachedProvider>, host: &str, port: u16) -> anyhow::Result<()> {
    info!("Macro-Gap v{} starting...", APP_VERSION);

    let state = AppState { provider };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/analyze", post(api_analyze))
        .route("/optimize", post(api_optimize))
        .route("/series", get(api_series))
        .route("/cache/invalidate", post(api_invalidate_cache))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Macro-Gap v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health              - Health check");
    println!("  POST /api/analyze             - Macro index + gap for a ticker");
    println!("  POST /api/optimize            - Auto-fit an indicator mix");
    println!("  GET  /api/series              - Fetch one raw series (source, start)");
    println!("  POST /api/cache/invalidate    - Drop cached series");
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Analyze command — CLI mode
// ============================================================================

async fn cmd_analyze(
    provider: &dyn SeriesProvider,
    request: AnalysisRequest,
    export: Option<PathBuf>,
) -> anyhow::Result<()> {
    println!("\n=== Macro-Gap v{} ===", APP_VERSION);
    println!(
        "Ticker: {} | Start: {} | Lag: {} | Fill: {} | Weighting: {}",
        request.ticker,
        request.start_date,
        request.params.lag,
        request.params.fill_policy,
        request.params.weighting
    );
    if request.indicators.is_empty() {
        warn!("No indicators configured, macro index will be flat");
    }

    let report = run_analysis(provider, &request).await?;
    print_report(&report);

    if let Some(export_path) = export {
        let export_data = serde_json::json!({
            "generated_at": Utc::now().to_rfc3339(),
            "version": APP_VERSION,
            "report": report,
        });
        std::fs::write(&export_path, serde_json::to_string_pretty(&export_data)?)?;
        println!("\nReport exported to {}", export_path.display());
    }

    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!("\nIndicators:");
    println!("  {:<24} {:<20} {:>8} {:>8}", "Name", "Source", "Weight", "Inverse");
    println!("  {}", "-".repeat(64));
    for c in &report.components {
        println!(
            "  {:<24} {:<20} {:>8.1} {:>8}",
            c.name,
            c.source_id,
            c.weight,
            if c.inverse { "yes" } else { "" }
        );
    }
    for s in &report.skipped {
        println!("  {:<24} {:<20} skipped: {}", s.name, s.source_id, s.reason);
    }

    println!("\nRows: {} | Status: {:?}", report.frame.len(), report.status);

    match &report.latest {
        Some(latest) => {
            println!(
                "\nLatest ({}): price {:.3} | macro {:.3} | gap {:+.3} → {}",
                latest.date, latest.price_norm, latest.macro_index, latest.gap, latest.signal
            );
        }
        None => println!("\nNo overlapping rows, gap unavailable."),
    }

    let bt = &report.backtest;
    match bt.correlation {
        Some(corr) => println!(
            "Gap vs {}-row forward return: corr {:+.3} over {} samples (confidence {}%)",
            bt.horizon,
            corr,
            bt.samples.len(),
            bt.confidence
        ),
        None => println!("Gap backtest: not enough samples for a {}-row horizon", bt.horizon),
    }
}

// ============================================================================
// Optimize command — CLI mode
// ============================================================================

async fn cmd_optimize(provider: &dyn SeriesProvider, request: OptimizeRequest) -> anyhow::Result<()> {
    println!("\n=== Macro-Gap v{} ===", APP_VERSION);
    let pool = request.candidate_pool();
    println!(
        "Ticker: {} | Strategy: {} | Lag: {} | Candidates: {} | Top K: {}",
        request.ticker,
        request.strategy,
        request.lag,
        pool.len(),
        request.top_k()
    );

    match find_optimal_mix(provider, &request).await? {
        OptimizeOutcome::Mix(mix) => {
            println!("\nBest mix:");
            println!("  {:>3}  {:<24} {:<20} {:>8} {:>8} {:>8}", "#", "Name", "Source", "Weight", "Score", "Inverse");
            println!("  {}", "-".repeat(78));
            for (i, e) in mix.entries.iter().enumerate() {
                println!(
                    "  {:>3}  {:<24} {:<20} {:>8.1} {:>+8.3} {:>8}",
                    i + 1,
                    e.name,
                    e.source_id,
                    e.weight,
                    e.score,
                    if e.inverse { "yes" } else { "" }
                );
            }
            if let Some(r2) = mix.r_squared {
                println!("\nR²: {:.3}", r2);
            }
            if !mix.skipped.is_empty() {
                println!("Skipped {} candidates", mix.skipped.len());
            }
            println!("\nConfig:\n{}", serde_json::to_string_pretty(&mix.to_configs())?);
        }
        OptimizeOutcome::NoCorrelation { skipped } => {
            println!(
                "\nNo indicator tracks {} well enough ({} candidates skipped).",
                request.ticker,
                skipped.len()
            );
        }
    }

    Ok(())
}

// ============================================================================
// API Handlers
// ============================================================================

type ApiError = (StatusCode, Json<serde_json::Value>);

fn analysis_error(e: AnalysisError) -> ApiError {
    let status = match &e {
        AnalysisError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        AnalysisError::PriceUnavailable { .. } => StatusCode::BAD_GATEWAY,
        AnalysisError::DegeneratePrice { .. } | AnalysisError::Regression(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    };
    error!(error = %e, "Request failed");
    (
        status,
        Json(serde_json::json!({
            "success": false,
            "error": e.to_string(),
        })),
    )
}

/// GET /api/health
async fn api_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "macro-gap",
        "version": APP_VERSION,
        "cached_series": state.provider.len(),
    }))
}

/// POST /api/analyze — run one analysis
async fn api_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let report = run_analysis(state.provider.as_ref(), &request)
        .await
        .map_err(analysis_error)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "report": report,
    })))
}

/// POST /api/optimize — auto-fit an indicator mix
async fn api_optimize(
    State(state): State<AppState>,
    Json(request): Json<OptimizeRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = find_optimal_mix(state.provider.as_ref(), &request)
        .await
        .map_err(analysis_error)?;
    Ok(Json(serde_json::json!({
        "success": true,
        "result": outcome,
    })))
}

#[derive(Deserialize)]
struct SeriesParams {
    source: String,
    start: NaiveDate,
}

/// GET /api/series — raw series passthrough
async fn api_series(
    State(state): State<AppState>,
    Query(params): Query<SeriesParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.provider.fetch_series(&params.source, params.start).await {
        Ok(series) => Ok(Json(serde_json::json!({
            "success": true,
            "source": params.source,
            "count": series.len(),
            "points": series,
        }))),
        Err(e) => {
            error!(source = %params.source, "Series fetch error: {:#}", e);
            Err((
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "success": false,
                    "error": format!("Failed to fetch series: {:#}", e),
                })),
            ))
        }
    }
}

/// POST /api/cache/invalidate — drop every cached series
async fn api_invalidate_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    let dropped = state.provider.invalidate();
    info!(dropped, "Series cache invalidated via API");
    Json(serde_json::json!({
        "success": true,
        "dropped": dropped,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("Invalid JSON in {}: {}", path.display(), e))
}

/// `name=source:weight[:inverse]`; the source may itself contain `:`
fn parse_indicator_arg(raw: &str) -> anyhow::Result<IndicatorConfig> {
    let (name, rest) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("indicator '{}' must look like name=source:weight", raw))?;

    let (rest, inverse) = match rest.strip_suffix(":inverse") {
        Some(stripped) => (stripped, true),
        None => (rest, false),
    };
    let (source, weight) = rest
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("indicator '{}' is missing a weight", raw))?;
    let weight: f64 = weight
        .parse()
        .map_err(|_| anyhow::anyhow!("indicator '{}' has an invalid weight '{}'", raw, weight))?;

    Ok(IndicatorConfig::new(name.trim(), source.trim(), weight, inverse))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_indicator_with_prefixed_source() {
        let cfg = parse_indicator_arg("rates=FRED:DGS10:60:inverse").unwrap();
        assert_eq!(cfg, IndicatorConfig::new("rates", "FRED:DGS10", 60.0, true));
    }

    #[test]
    fn test_parse_indicator_plain_symbol() {
        let cfg = parse_indicator_arg("eth=ETHUSDT:40").unwrap();
        assert_eq!(cfg, IndicatorConfig::new("eth", "ETHUSDT", 40.0, false));
    }

    #[test]
    fn test_log_directives_prefer_verbose_then_env() {
        assert_eq!(
            log_directives(true, Some("warn".to_string())),
            "debug,engine=debug,macro_gap=debug"
        );
        assert_eq!(log_directives(false, Some("engine=trace".to_string())), "engine=trace");
        assert_eq!(log_directives(false, Some("  ".to_string())), "info,engine=info,macro_gap=info");
        assert_eq!(log_directives(false, None), "info,engine=info,macro_gap=info");
    }

    #[test]
    fn test_parse_indicator_rejects_missing_weight() {
        assert!(parse_indicator_arg("rates=DGS10").is_err());
        assert!(parse_indicator_arg("FRED:DGS10:40").is_err());
        assert!(parse_indicator_arg("rates=FRED:DGS10:abc").is_err());
    }
}
