//! Fourier terms for periodic components

use std::f64::consts::PI;

/// Fourier design rows for the given times.
///
/// `t_days` is measured in days since the Unix epoch so that phases are
/// comparable between fits. Each row holds `2 * order` values laid out as
/// `sin(2πt/p), cos(2πt/p), sin(4πt/p), cos(4πt/p), ...`.
pub fn fourier_features(t_days: &[f64], period: f64, order: usize) -> Vec<Vec<f64>> {
    t_days
        .iter()
        .map(|&t| {
            let mut row = Vec::with_capacity(2 * order);
            for i in 1..=order {
                let x = 2.0 * PI * i as f64 * t / period;
                row.push(x.sin());
                row.push(x.cos());
            }
            row
        })
        .collect()
}

/// Evaluate a Fourier series with the given coefficients at each time.
pub fn evaluate(t_days: &[f64], period: f64, coefficients: &[f64]) -> Vec<f64> {
    let order = coefficients.len() / 2;
    fourier_features(t_days, period, order)
        .iter()
        .map(|row| row.iter().zip(coefficients).map(|(x, b)| x * b).sum())
        .collect()
}
