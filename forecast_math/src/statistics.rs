//! Error statistics and order statistics
//!
//! The error functions take `(actual, predicted)` slices of equal length and
//! fail on empty or mismatched input.

use crate::{MathError, Result};

fn check_pair(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.len() != predicted.len() {
        return Err(MathError::InvalidInput(format!(
            "Actual length ({}) doesn't match predicted length ({})",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot compute an error statistic over zero values".to_string(),
        ));
    }
    Ok(())
}

/// Arithmetic mean, `None` for empty input
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Mean squared error
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Root mean squared error
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    mean_squared_error(actual, predicted).map(f64::sqrt)
}

/// Mean absolute error
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    let sum: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).abs()).sum();
    Ok(sum / actual.len() as f64)
}

/// Mean absolute percentage error, as a fraction (0.05 = 5%).
///
/// Actual values of zero yield an infinite term, as in the usual definition.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pair(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| ((a - p) / a).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Fraction of actual values inside `[lower, upper]`
pub fn interval_coverage(actual: &[f64], lower: &[f64], upper: &[f64]) -> Result<f64> {
    check_pair(actual, lower)?;
    check_pair(actual, upper)?;
    let inside = actual
        .iter()
        .zip(lower.iter().zip(upper))
        .filter(|(a, (lo, hi))| *a >= *lo && *a <= *hi)
        .count();
    Ok(inside as f64 / actual.len() as f64)
}

/// Percentile of already sorted values with linear interpolation between
/// the closest ranks. `q` is in `[0, 1]`.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> Result<f64> {
    if sorted.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take a percentile of zero values".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&q) {
        return Err(MathError::InvalidInput(format!(
            "Percentile must be between 0 and 1, got {}",
            q
        )));
    }

    let rank = q * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight = rank - lo as f64;
    Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_regression_errors() {
        let actual = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        let predicted = vec![12.0, 18.0, 33.0, 37.0, 52.0];

        assert_abs_diff_eq!(mean_absolute_error(&actual, &predicted).unwrap(), 2.4, epsilon = 1e-9);
        assert_abs_diff_eq!(mean_squared_error(&actual, &predicted).unwrap(), 6.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            root_mean_squared_error(&actual, &predicted).unwrap(),
            6.0_f64.sqrt(),
            epsilon = 1e-9
        );

        let mape = mean_absolute_percentage_error(&actual, &predicted).unwrap();
        assert!(mape > 0.0 && mape < 0.15);
    }

    #[test]
    fn test_coverage() {
        let actual = vec![1.0, 5.0, 9.0, 3.0];
        let lower = vec![0.0, 0.0, 0.0, 3.5];
        let upper = vec![2.0, 6.0, 8.0, 4.0];
        assert_abs_diff_eq!(interval_coverage(&actual, &lower, &upper).unwrap(), 0.5);
    }

    #[test]
    fn test_percentile() {
        let sorted = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_abs_diff_eq!(percentile_sorted(&sorted, 0.0).unwrap(), 1.0);
        assert_abs_diff_eq!(percentile_sorted(&sorted, 0.5).unwrap(), 3.0);
        assert_abs_diff_eq!(percentile_sorted(&sorted, 0.1).unwrap(), 1.4, epsilon = 1e-12);
        assert_abs_diff_eq!(percentile_sorted(&sorted, 1.0).unwrap(), 5.0);
        assert!(percentile_sorted(&[], 0.5).is_err());
    }

    #[test]
    fn test_mismatch_and_empty() {
        assert!(mean_squared_error(&[1.0], &[1.0, 2.0]).is_err());
        assert!(mean_absolute_error(&[], &[]).is_err());
        assert_eq!(mean(&[]), None);
    }
}
