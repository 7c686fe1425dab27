//! Correlation and ordinary least squares helpers

use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// Pearson correlation over the rows where both sides are present.
///
/// `None` with fewer than two complete pairs or when either side has no
/// variance over those pairs.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    pearson_pairs(&pairs)
}

/// Pearson correlation over dense slices of equal length
pub fn pearson_dense(x: &[f64], y: &[f64]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x.iter().copied().zip(y.iter().copied()).collect();
    pearson_pairs(&pairs)
}

fn pearson_pairs(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for &(a, b) in pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= 1e-12 || var_y <= 1e-12 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

/// Result of a multivariate OLS fit with intercept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OlsFit {
    pub intercept: f64,
    /// One coefficient per design column, in column order
    pub coefficients: Vec<f64>,
    /// Coefficient of determination, clamped to [0, 1]
    pub r_squared: f64,
    pub observations: usize,
}

impl OlsFit {
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(b, x)| b * x)
                .sum::<f64>()
    }
}

/// Fit `y = b0 + sum(b_j * x_j)` by least squares.
///
/// `columns` holds one regressor per entry, each as long as `y`. Solved via
/// the normal equations with partially pivoted Gaussian elimination.
pub fn ols(columns: &[Vec<f64>], y: &[f64]) -> Result<OlsFit, StatsError> {
    let n = y.len();
    let p = columns.len() + 1;

    if columns.iter().any(|c| c.len() != n) {
        return Err(StatsError::RaggedDesign {
            columns: columns.len(),
        });
    }
    if n < p + 1 {
        return Err(StatsError::InsufficientData {
            required: p + 1,
            actual: n,
        });
    }

    let row = |i: usize| -> Vec<f64> {
        let mut r = Vec::with_capacity(p);
        r.push(1.0);
        r.extend(columns.iter().map(|c| c[i]));
        r
    };

    // X'X and X'y
    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    for (i, &yi) in y.iter().enumerate() {
        let r = row(i);
        for a in 0..p {
            xty[a] += r[a] * yi;
            for b in 0..p {
                xtx[a][b] += r[a] * r[b];
            }
        }
    }

    let beta = solve(xtx, xty)?;

    let mean_y = y.iter().sum::<f64>() / n as f64;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (i, &yi) in y.iter().enumerate() {
        let fitted: f64 = row(i).iter().zip(&beta).map(|(x, b)| x * b).sum();
        ss_res += (yi - fitted).powi(2);
        ss_tot += (yi - mean_y).powi(2);
    }
    let r_squared = if ss_tot > 1e-12 {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(OlsFit {
        intercept: beta[0],
        coefficients: beta[1..].to_vec(),
        r_squared,
        observations: n,
    })
}

/// Residual norm, relative to the column's own norm, below which a column
/// counts as already spanned
const INDEPENDENCE_TOLERANCE: f64 = 1e-6;

/// For each column in order, whether it adds a direction to the span of the
/// intercept and the columns flagged before it.
///
/// Constant columns are never independent (they lie on the intercept).
pub fn independent_columns(columns: &[Vec<f64>]) -> Vec<bool> {
    let n = columns.first().map_or(0, Vec::len);
    let mut basis: Vec<Vec<f64>> = Vec::new();
    if n > 0 {
        basis.push(vec![1.0 / (n as f64).sqrt(); n]);
    }

    columns
        .iter()
        .map(|column| {
            if column.len() != n {
                return false;
            }
            let norm = dot(column, column).sqrt();
            let mut residual = column.clone();
            // modified Gram-Schmidt
            for q in &basis {
                let projection = dot(&residual, q);
                for (r, qi) in residual.iter_mut().zip(q) {
                    *r -= projection * qi;
                }
            }
            let residual_norm = dot(&residual, &residual).sqrt();
            if norm > 0.0 && residual_norm > INDEPENDENCE_TOLERANCE * norm {
                basis.push(residual.iter().map(|r| r / residual_norm).collect());
                true
            } else {
                false
            }
        })
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Solve `a * x = b` in place
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, StatsError> {
    let n = b.len();
    let scale = a
        .iter()
        .flat_map(|r| r.iter())
        .fold(0.0f64, |m, v| m.max(v.abs()))
        .max(1.0);

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() <= 1e-10 * scale {
            return Err(StatsError::Singular);
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for r in (col + 1)..n {
            let factor = a[r][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..n {
                a[r][c] -= factor * a[col][c];
            }
            b[r] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for r in (0..n).rev() {
        let tail: f64 = ((r + 1)..n).map(|c| a[r][c] * x[c]).sum();
        x[r] = (b[r] - tail) / a[r][r];
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_pearson_perfect() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!(close(pearson_dense(&x, &y).unwrap(), 1.0, 1e-12));
        let neg: Vec<f64> = y.iter().map(|v| -v).collect();
        assert!(close(pearson_dense(&x, &neg).unwrap(), -1.0, 1e-12));
    }

    #[test]
    fn test_pearson_skips_incomplete_pairs() {
        let x = [Some(1.0), None, Some(2.0), Some(3.0)];
        let y = [Some(10.0), Some(-99.0), Some(20.0), Some(30.0)];
        assert!(close(pearson(&x, &y).unwrap(), 1.0, 1e-12));
    }

    #[test]
    fn test_pearson_zero_variance_is_none() {
        assert_eq!(pearson_dense(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), None);
        assert_eq!(pearson_dense(&[1.0], &[1.0]), None);
    }

    #[test]
    fn test_ols_recovers_exact_plane() {
        let x1: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let x2: Vec<f64> = (0..10).map(|i| ((i * 7) % 5) as f64).collect();
        let y: Vec<f64> = x1
            .iter()
            .zip(&x2)
            .map(|(a, b)| 1.5 + 2.0 * a - 0.5 * b)
            .collect();

        let fit = ols(&[x1, x2], &y).unwrap();
        assert!(close(fit.intercept, 1.5, 1e-8));
        assert!(close(fit.coefficients[0], 2.0, 1e-8));
        assert!(close(fit.coefficients[1], -0.5, 1e-8));
        assert!(close(fit.r_squared, 1.0, 1e-9));
        assert!(close(fit.predict(&[1.0, 1.0]), 3.0, 1e-8));
    }

    #[test]
    fn test_ols_r_squared_partial_fit() {
        let x: Vec<f64> = vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = vec![0.0, 2.0, 1.0, 3.0, 2.0, 4.0];
        let fit = ols(&[x], &y).unwrap();
        assert!(fit.r_squared > 0.0 && fit.r_squared < 1.0);
    }

    #[test]
    fn test_ols_collinear_is_singular() {
        let x1: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let x2: Vec<f64> = x1.iter().map(|v| v * 2.0).collect();
        let y: Vec<f64> = x1.iter().map(|v| v + 1.0).collect();
        assert_eq!(ols(&[x1, x2], &y), Err(StatsError::Singular));
    }

    #[test]
    fn test_independent_columns_flags_spanned_ones() {
        let a: Vec<f64> = (0..12).map(|i| (i % 7) as f64).collect();
        let b: Vec<f64> = (0..12).map(|i| (i % 5) as f64).collect();
        let spread: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x - y).collect();
        let shifted: Vec<f64> = a.iter().map(|v| 3.0 * v + 10.0).collect();
        let flat = vec![4.0; 12];

        assert_eq!(
            independent_columns(&[a, b, spread, shifted, flat]),
            vec![true, true, false, false, false]
        );
    }

    #[test]
    fn test_independent_columns_order_decides_which_is_kept() {
        let x: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let doubled: Vec<f64> = x.iter().map(|v| v * 2.0).collect();
        assert_eq!(independent_columns(&[doubled, x]), vec![true, false]);
    }

    #[test]
    fn test_ols_needs_enough_rows() {
        let x = vec![1.0, 2.0];
        let y = vec![1.0, 2.0];
        assert!(matches!(
            ols(&[x], &y),
            Err(StatsError::InsufficientData { required: 3, actual: 2 })
        ));
    }
}
