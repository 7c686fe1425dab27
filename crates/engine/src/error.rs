//! Error types for the engine crate

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("duplicate observation date {date}")]
    DuplicateDate { date: NaiveDate },

    #[error("observation dated {date} follows {previous}")]
    Unordered { previous: NaiveDate, date: NaiveDate },

    #[error("non-finite value at {date}")]
    NonFinite { date: NaiveDate },

    #[error("{dates} dates but {values} values")]
    LengthMismatch { dates: usize, values: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum NormalizeError {
    #[error("series has no values to normalize")]
    Empty,

    #[error("series is constant at {value}, min-max range is zero")]
    DegenerateRange { value: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("need at least {required} complete rows, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("design matrix is singular")]
    Singular,

    #[error("{columns} design columns of unequal length")]
    RaggedDesign { columns: usize },
}

/// Failures that abort a whole analysis or optimization run.
///
/// Per-indicator problems never surface here; they are reported as
/// [`crate::analysis::SkippedIndicator`] entries instead.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("no price data for {ticker}: {reason}")]
    PriceUnavailable { ticker: String, reason: String },

    #[error("price of {ticker} is constant over the analysis window")]
    DegeneratePrice { ticker: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("regression failed: {0}")]
    Regression(#[from] StatsError),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
