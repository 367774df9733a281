//! Utility functions for the kpi_forecast crate

use chrono::{Duration, NaiveDate};

/// Daily dates following `last_date`
pub fn future_dates(last_date: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon as i64)
        .map(|i| last_date + Duration::days(i))
        .collect()
}

/// Smallest gap between consecutive sorted dates, in days
pub fn min_spacing_days(dates: &[NaiveDate]) -> Option<i64> {
    dates.windows(2).map(|w| (w[1] - w[0]).num_days()).min()
}

/// Evenly spaced, rounded indices over `0..=last`, like `linspace(0, last, count).round()`
pub fn linspace_indices(last: usize, count: usize) -> Vec<usize> {
    match count {
        0 => Vec::new(),
        1 => vec![0],
        _ => (0..count)
            .map(|i| (i as f64 * last as f64 / (count - 1) as f64).round() as usize)
            .collect(),
    }
}
