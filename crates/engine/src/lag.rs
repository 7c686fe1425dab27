//! Lag shifting of aligned indicator series
//!
//! Sign convention: the indicator is moved, never the price. A positive lag
//! `k` moves every value `k` rows later, so the indicator observed at row
//! `t - k` is compared with the price at row `t` (the indicator leads price
//! by `k` periods). A negative lag moves values earlier. The rows that lose
//! their source value are explicitly missing.

/// Shift `values` by `lag` positions, leaving the vacated edge missing.
pub fn shift(values: &[Option<f64>], lag: i32) -> Vec<Option<f64>> {
    let n = values.len();
    let k = lag.unsigned_abs() as usize;
    if k >= n {
        return vec![None; n];
    }

    let mut shifted = vec![None; n];
    if lag >= 0 {
        shifted[k..].copy_from_slice(&values[..n - k]);
    } else {
        shifted[..n - k].copy_from_slice(&values[k..]);
    }
    null_edges(&mut shifted, lag);
    shifted
}

/// Mark the `|lag|` rows a shift vacates as missing: the head for a positive
/// lag, the tail for a negative one.
pub fn null_edges(values: &mut [Option<f64>], lag: i32) {
    let n = values.len();
    let k = (lag.unsigned_abs() as usize).min(n);
    if lag > 0 {
        values[..k].fill(None);
    } else if lag < 0 {
        values[n - k..].fill(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn present(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|&v| Some(v)).collect()
    }

    #[test]
    fn test_positive_lag_nulls_head() {
        let shifted = shift(&present(&[1.0, 2.0, 3.0, 4.0, 5.0]), 2);
        assert_eq!(shifted, vec![None, None, Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_negative_lag_nulls_tail() {
        let shifted = shift(&present(&[1.0, 2.0, 3.0, 4.0, 5.0]), -2);
        assert_eq!(shifted, vec![Some(3.0), Some(4.0), Some(5.0), None, None]);
    }

    #[test]
    fn test_zero_lag_is_identity() {
        let input = vec![Some(1.0), None, Some(3.0)];
        assert_eq!(shift(&input, 0), input);
    }

    #[test]
    fn test_lag_longer_than_series() {
        assert_eq!(shift(&present(&[1.0, 2.0]), 5), vec![None, None]);
        assert_eq!(shift(&present(&[1.0, 2.0]), -2), vec![None, None]);
    }

    #[test]
    fn test_edges_are_missing_not_zero_after_fill() {
        // a fully filled series still gets an explicit missing head
        let shifted = shift(&present(&[0.0, 0.0, 7.0]), 1);
        assert_eq!(shifted[0], None);
        assert_eq!(shifted[1], Some(0.0));
    }

    #[test]
    fn test_null_edges_clamps() {
        let mut values = present(&[1.0, 2.0]);
        null_edges(&mut values, -10);
        assert_eq!(values, vec![None, None]);
    }
}
