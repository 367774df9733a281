//! Logarithmic transform applied to KPI values before modelling
//!
//! KPIs tend to grow multiplicatively. Modelling `ln(y)` with an additive
//! model and exponentiating the predictions afterwards keeps the bands
//! proportional to the level of the series.

use crate::{MathError, Result};

/// Natural logarithm of every value.
///
/// Fails on the first value that is zero, negative or not finite, since the
/// logarithm is undefined there.
pub fn log_transform(values: &[f64]) -> Result<Vec<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if v.is_finite() && v > 0.0 {
                Ok(v.ln())
            } else {
                Err(MathError::InvalidInput(format!(
                    "Cannot take the logarithm of value {} at position {}",
                    v, i
                )))
            }
        })
        .collect()
}

/// Inverse of [`log_transform`] for one value, used when rescaling
/// predictions and table cells.
#[inline]
pub fn exp_value(value: f64) -> f64 {
    value.exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_trip() {
        let values = vec![1e-6, 0.5, 1.0, 42.0, 1.5e9];
        let restored: Vec<f64> = log_transform(&values).unwrap().into_iter().map(exp_value).collect();

        for (original, back) in values.iter().zip(restored.iter()) {
            assert_relative_eq!(original, back, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_rejects_non_positive() {
        assert!(log_transform(&[1.0, 0.0]).is_err());
        assert!(log_transform(&[-3.0]).is_err());
        assert!(log_transform(&[f64::NAN]).is_err());
    }

    #[test]
    fn test_empty_input() {
        assert!(log_transform(&[]).unwrap().is_empty());
    }
}
