//! Weighted aggregation of normalized indicators into the macro index

use serde::{Deserialize, Serialize};

/// How each date's weighted sum is divided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingMode {
    /// Divide by the weight of indicators present at that date. A date where
    /// nothing is present is missing.
    #[default]
    PresentWeight,
    /// Divide by the total weight of every loaded indicator, counting a
    /// missing value as 0. Biases dates with partial data downward; kept to
    /// reproduce historical numbers.
    ConfiguredWeight,
}

impl std::fmt::Display for WeightingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightingMode::PresentWeight => write!(f, "present"),
            WeightingMode::ConfiguredWeight => write!(f, "configured"),
        }
    }
}

impl std::str::FromStr for WeightingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "present" | "present_weight" => Ok(WeightingMode::PresentWeight),
            "configured" | "configured_weight" | "legacy" => Ok(WeightingMode::ConfiguredWeight),
            other => Err(format!("unknown weighting mode '{}'", other)),
        }
    }
}

/// One loaded, normalized indicator and its configured weight
#[derive(Debug, Clone, Copy)]
pub struct WeightedComponent<'a> {
    pub values: &'a [Option<f64>],
    pub weight: f64,
}

/// Combine `components` (each `len` long) into one macro index series.
///
/// With no components, or a zero total weight, the index is a constant 0.
pub fn aggregate(components: &[WeightedComponent<'_>], len: usize, mode: WeightingMode) -> Vec<Option<f64>> {
    let total_weight: f64 = components.iter().map(|c| c.weight).sum();
    if components.is_empty() || total_weight <= 0.0 {
        return vec![Some(0.0); len];
    }

    (0..len)
        .map(|i| {
            let present = || {
                components
                    .iter()
                    .filter_map(move |c| c.values.get(i).copied().flatten().map(|v| (c.weight, v)))
            };

            let denominator = match mode {
                WeightingMode::PresentWeight => present().map(|(w, _)| w).sum::<f64>(),
                WeightingMode::ConfiguredWeight => total_weight,
            };
            if denominator <= 0.0 {
                return None;
            }

            // share-then-multiply keeps a lone component bit-exact
            Some(present().map(|(w, v)| (w / denominator) * v).sum())
        })
        .collect()
}
