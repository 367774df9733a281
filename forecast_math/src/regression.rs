//! Least squares fitting
//!
//! Contains:
//! - Simple linear regression, used for the initial trend guess
//! - Ridge regression with per-coefficient penalties, used for the MAP fit of
//!   the decomposable model (Gaussian priors on the coefficients)

use crate::{MathError, Result};

/// Diagonal jitter keeping the normal equations positive definite when a
/// column is identically zero (e.g. an unobserved holiday offset).
const JITTER: f64 = 1e-10;

/// Slope and intercept of a fitted line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LineFit {
    /// Value of the line at `x`
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares line through `(x, y)`.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Result<LineFit> {
    if x.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "x has {} values but y has {}",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(MathError::InsufficientData(
            "Not enough data for a linear fit. Need at least 2 points.".to_string(),
        ));
    }

    let n = x.len() as f64;
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        numerator += (xi - x_mean) * (yi - y_mean);
        denominator += (xi - x_mean) * (xi - x_mean);
    }

    if denominator.abs() < 1e-12 {
        return Err(MathError::CalculationError(
            "Cannot calculate slope: x values are too similar".to_string(),
        ));
    }

    let slope = numerator / denominator;
    Ok(LineFit {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

/// Solve `min ||y - Xb||² + Σ penalties[j] * b[j]²`.
///
/// `rows` is the design matrix in row-major form. `penalties` must have one
/// entry per column; a zero penalty leaves that coefficient unregularised.
pub fn ridge_regression(rows: &[Vec<f64>], y: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    if rows.len() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "Design matrix has {} rows but target has {} values",
            rows.len(),
            y.len()
        )));
    }
    let p = penalties.len();
    if p == 0 {
        return Ok(Vec::new());
    }
    if let Some(bad) = rows.iter().position(|r| r.len() != p) {
        return Err(MathError::InvalidInput(format!(
            "Row {} has {} columns, expected {}",
            bad,
            rows[bad].len(),
            p
        )));
    }

    let mut xtx = vec![vec![0.0; p]; p];
    let mut xty = vec![0.0; p];
    for (row, &target) in rows.iter().zip(y) {
        for a in 0..p {
            let xa = row[a];
            if xa == 0.0 {
                continue;
            }
            xty[a] += xa * target;
            for b in a..p {
                xtx[a][b] += xa * row[b];
            }
        }
    }
    for a in 0..p {
        for b in 0..a {
            xtx[a][b] = xtx[b][a];
        }
        xtx[a][a] += penalties[a] + JITTER;
    }

    solve(xtx, xty)
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let p = b.len();
    for i in 0..p {
        let pivot_row = (i..p)
            .max_by(|&r, &s| a[r][i].abs().total_cmp(&a[s][i].abs()))
            .unwrap_or(i);
        if pivot_row != i {
            a.swap(i, pivot_row);
            b.swap(i, pivot_row);
        }

        let pivot = a[i][i];
        if pivot.abs() < 1e-300 || !pivot.is_finite() {
            return Err(MathError::CalculationError(format!(
                "Normal equations are singular at column {}",
                i
            )));
        }

        for r in (i + 1)..p {
            let factor = a[r][i] / pivot;
            if factor == 0.0 {
                continue;
            }
            for c in i..p {
                a[r][c] -= factor * a[i][c];
            }
            b[r] -= factor * b[i];
        }
    }

    let mut x = vec![0.0; p];
    for i in (0..p).rev() {
        let tail: f64 = ((i + 1)..p).map(|c| a[i][c] * x[c]).sum();
        x[i] = (b[i] - tail) / a[i][i];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Least squares solution is not finite".to_string(),
        ));
    }
    Ok(x)
}
