//! Core data types shared by the macro-gap pipeline

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

/// A single dated value from a price or macro feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Ordered series of observations: strictly increasing dates, finite values.
///
/// Used for both the security's price series and every raw indicator series.
/// Once built it is never mutated within an analysis run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Observation>", into = "Vec<Observation>")]
pub struct TimeSeries {
    points: Vec<Observation>,
}

impl TimeSeries {
    /// Build a series, rejecting unordered, duplicated or non-finite input.
    pub fn new(points: Vec<Observation>) -> Result<Self, SeriesError> {
        for (i, p) in points.iter().enumerate() {
            if !p.value.is_finite() {
                return Err(SeriesError::NonFinite { date: p.date });
            }
            if i > 0 {
                let prev = points[i - 1].date;
                if p.date == prev {
                    return Err(SeriesError::DuplicateDate { date: p.date });
                }
                if p.date < prev {
                    return Err(SeriesError::Unordered {
                        previous: prev,
                        date: p.date,
                    });
                }
            }
        }
        Ok(Self { points })
    }

    /// Build a series from a provider payload.
    ///
    /// Sorts by date, drops non-finite values and keeps the last value seen
    /// for a repeated date. Never fails.
    pub fn from_observations(mut points: Vec<Observation>) -> Self {
        points.retain(|p| p.value.is_finite());
        // stable sort keeps payload order among equal dates
        points.sort_by_key(|p| p.date);

        let mut deduped: Vec<Observation> = Vec::with_capacity(points.len());
        for p in points {
            match deduped.last_mut() {
                Some(last) if last.date == p.date => *last = p,
                _ => deduped.push(p),
            }
        }
        Self { points: deduped }
    }

    /// Convenience constructor from parallel date/value slices
    pub fn from_pairs(dates: &[NaiveDate], values: &[f64]) -> Result<Self, SeriesError> {
        if dates.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }
        Self::new(
            dates
                .iter()
                .zip(values)
                .map(|(&date, &value)| Observation { date, value })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn first(&self) -> Option<&Observation> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.points.last()
    }

    /// Exact lookup by date
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].value)
    }

    /// Latest value dated on or before `date`
    pub fn value_as_of(&self, date: NaiveDate) -> Option<f64> {
        let idx = self.points.partition_point(|p| p.date <= date);
        if idx == 0 {
            None
        } else {
            Some(self.points[idx - 1].value)
        }
    }

    /// Observations dated on or after `start`
    pub fn since(&self, start: NaiveDate) -> Self {
        let idx = self.points.partition_point(|p| p.date < start);
        Self {
            points: self.points[idx..].to_vec(),
        }
    }
}

impl TryFrom<Vec<Observation>> for TimeSeries {
    type Error = SeriesError;

    fn try_from(points: Vec<Observation>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<TimeSeries> for Vec<Observation> {
    fn from(series: TimeSeries) -> Self {
        series.points
    }
}

/// One configured macro indicator within an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// Unique key within one analysis
    pub name: String,
    /// Opaque provider id, e.g. `FRED:DGS10` or `BTCUSDT`
    pub source_id: String,
    /// Non-negative weight; a consistent total of 100 is expected
    pub weight: f64,
    /// Flip the normalized score (`1 - x`) before aggregation
    #[serde(default)]
    pub inverse: bool,
}

impl IndicatorConfig {
    pub fn new(name: impl Into<String>, source_id: impl Into<String>, weight: f64, inverse: bool) -> Self {
        Self {
            name: name.into(),
            source_id: source_id.into(),
            weight,
            inverse,
        }
    }
}

/// A candidate indicator offered to the auto-fit optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateIndicator {
    pub name: String,
    pub source_id: String,
}

impl CandidateIndicator {
    pub fn new(name: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_id: source_id.into(),
        }
    }
}

/// Built-in pool of FRED macro series for the optimizer
pub fn default_candidate_pool() -> Vec<CandidateIndicator> {
    [
        ("US 10Y Treasury", "FRED:DGS10"),
        ("US 2Y Treasury", "FRED:DGS2"),
        ("10Y-2Y Spread", "FRED:T10Y2Y"),
        ("Fed Funds Rate", "FRED:DFF"),
        ("Dollar Index (Broad)", "FRED:DTWEXBGS"),
        ("WTI Crude", "FRED:DCOILWTICO"),
        ("VIX", "FRED:VIXCLS"),
        ("High Yield Spread", "FRED:BAMLH0A0HYM2"),
        ("10Y Breakeven Inflation", "FRED:T10YIE"),
        ("USD/KRW", "FRED:DEXKOUS"),
        ("USD/JPY", "FRED:DEXJPUS"),
        ("Fed Balance Sheet", "FRED:WALCL"),
    ]
    .into_iter()
    .map(|(name, source)| CandidateIndicator::new(name, source))
    .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    pub fn days(n: usize) -> Vec<NaiveDate> {
        (0..n as i64).map(day).collect()
    }

    pub fn series(values: &[f64]) -> TimeSeries {
        TimeSeries::from_pairs(&days(values.len()), values).unwrap()
    }

    pub fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {} ~= {}", a, b);
    }
}
