//! Macro Gap Engine: macro index construction and price-gap analysis
//!
//! Provides:
//! - Calendar alignment, lag shifting and min-max normalization of indicators
//! - Weighted composite macro index and price-vs-macro gap with backtest
//! - Indicator mix auto-fit (correlation ranking or OLS)
//! - FRED and Binance series providers with retry and caching

pub mod aggregate;
pub mod align;
pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod gap;
pub mod lag;
pub mod normalize;
pub mod optimizer;
pub mod stats;
pub mod types;

// Re-exports for convenience
pub use aggregate::{aggregate, WeightedComponent, WeightingMode};
pub use align::{align, FillPolicy};
pub use analysis::{
    build_analysis, run_analysis, AnalysisFrame, AnalysisParams, AnalysisReport, AnalysisRequest,
    AnalysisStatus, AnalysisWarning, ComponentSeries, FetchedIndicator, FrameRow, SkipReason,
    SkippedIndicator,
};
pub use api::{
    build_network_provider, BinanceClient, CachedProvider, FredClient, MarketDataRouter,
    RetryingProvider, SeriesProvider, StaticProvider,
};
pub use config::{ProviderSettings, RetryPolicy};
pub use error::{AnalysisError, AnalysisResult, NormalizeError, SeriesError, StatsError};
pub use gap::{classify_gap, compute_gap, GapBacktest, GapReading, GapSignal};
pub use optimizer::{
    find_optimal_mix, optimize_mix, MixEntry, OptimizeOutcome, OptimizeRequest, OptimizeStrategy,
    OptimizedMix, RegressionFit,
};
pub use types::*;
