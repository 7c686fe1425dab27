//! Min-max normalization against the series' own range

use crate::error::NormalizeError;

/// Min and max over the present values, `None` if nothing is present
pub fn value_range(values: &[Option<f64>]) -> Option<(f64, f64)> {
    values.iter().flatten().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Scale present values to [0, 1] using the series' own min and max,
/// flipping to `1 - x` when `invert` is set. Missing entries stay missing.
///
/// A constant series has no range; that is an error rather than a silent
/// zero-fill, and the caller drops the series.
pub fn min_max(values: &[Option<f64>], invert: bool) -> Result<Vec<Option<f64>>, NormalizeError> {
    let (lo, hi) = value_range(values).ok_or(NormalizeError::Empty)?;
    let span = hi - lo;
    if span <= 0.0 {
        return Err(NormalizeError::DegenerateRange { value: lo });
    }

    Ok(values
        .iter()
        .map(|v| {
            v.map(|x| {
                let scaled = ((x - lo) / span).clamp(0.0, 1.0);
                if invert {
                    1.0 - scaled
                } else {
                    scaled
                }
            })
        })
        .collect())
}

/// [`min_max`] for a dense slice with no missing values
pub fn min_max_dense(values: &[f64], invert: bool) -> Result<Vec<f64>, NormalizeError> {
    let wrapped: Vec<Option<f64>> = values.iter().map(|&v| Some(v)).collect();
    Ok(min_max(&wrapped, invert)?.into_iter().flatten().collect())
}
