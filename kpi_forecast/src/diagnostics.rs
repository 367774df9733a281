//! Rolling-origin cross-validation and per-horizon error metrics
//!
//! Cutoffs are placed backwards from the end of the history. The model is
//! refitted on everything up to each cutoff and scored on the observations
//! that follow it within the horizon.

use crate::error::{ForecastError, Result};
use crate::models::prophet::TrainedProphet;
use crate::models::TrainedForecastModel;
use chrono::{Duration, NaiveDate};
use forecast_math::statistics::{
    interval_coverage, mean_absolute_error, mean_absolute_percentage_error, mean_squared_error,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One held-out observation with its out-of-sample prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationRow {
    /// Date of the observation
    pub ds: NaiveDate,
    /// Last date the model was trained on
    pub cutoff: NaiveDate,
    /// Observed value
    pub y: f64,
    /// Predicted value
    pub yhat: f64,
    /// Lower prediction bound
    pub yhat_lower: f64,
    /// Upper prediction bound
    pub yhat_upper: f64,
}

impl CrossValidationRow {
    /// Days between the cutoff and the observation
    pub fn horizon_days(&self) -> i64 {
        (self.ds - self.cutoff).num_days()
    }

    /// Apply `f` to the observed and predicted values
    pub fn map_values<F: Fn(f64) -> f64>(&mut self, f: F) {
        self.y = f(self.y);
        self.yhat = f(self.yhat);
        self.yhat_lower = f(self.yhat_lower);
        self.yhat_upper = f(self.yhat_upper);
    }
}

/// Error metrics for one horizon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRow {
    /// Days after the cutoff
    pub horizon_days: i64,
    /// Mean squared error
    pub mse: f64,
    /// Root mean squared error
    pub rmse: f64,
    /// Mean absolute error
    pub mae: f64,
    /// Mean absolute percentage error, as a fraction
    pub mape: f64,
    /// Fraction of observations inside the prediction interval
    pub coverage: f64,
}

/// Window sizes of a cross-validation, in days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossValidationWindows {
    /// Length of each evaluation window
    pub horizon: i64,
    /// Spacing between cutoffs
    pub period: i64,
    /// Minimum training span before the first cutoff
    pub initial: i64,
}

impl CrossValidationWindows {
    /// Resolve the windows, defaulting `initial` to three horizons and
    /// `period` to half a horizon (at least one day)
    pub fn new(horizon: i64, period: Option<i64>, initial: Option<i64>) -> Result<Self> {
        if horizon <= 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Horizon must be a positive number of days, got {}",
                horizon
            )));
        }
        let period = period.unwrap_or((horizon / 2).max(1));
        if period <= 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Period must be a positive number of days, got {}",
                period
            )));
        }
        let initial = initial.unwrap_or(3 * horizon);
        if initial < 0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Initial window must not be negative, got {}",
                initial
            )));
        }
        Ok(Self {
            horizon,
            period,
            initial,
        })
    }
}

/// Cutoff dates for a sorted history, oldest first.
///
/// The first cutoff sits one horizon before the last observation; further
/// cutoffs step back by `period` while at least `initial` days of history
/// remain before them. A cutoff whose horizon holds no observation is moved
/// back to one horizon before the closest earlier observation.
pub fn generate_cutoffs(dates: &[NaiveDate], windows: &CrossValidationWindows) -> Result<Vec<NaiveDate>> {
    let (first, last) = match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(ForecastError::DataError(
                "Cannot cross-validate an empty history".to_string(),
            ))
        }
    };
    let horizon = Duration::days(windows.horizon);
    let period = Duration::days(windows.period);
    let initial = Duration::days(windows.initial);

    let mut cutoff = last - horizon;
    if cutoff < first {
        return Err(ForecastError::DataError("Less data than horizon".to_string()));
    }

    let mut result = vec![cutoff];
    while result.last().map_or(false, |c| *c >= first + initial) {
        cutoff -= period;
        let covered = dates.iter().any(|d| *d > cutoff && *d <= cutoff + horizon);
        if !covered && cutoff > first {
            if let Some(closest) = dates.iter().filter(|d| **d <= cutoff).max() {
                cutoff = *closest - horizon;
            }
        }
        result.push(cutoff);
    }
    result.pop();

    if result.is_empty() {
        return Err(ForecastError::DataError(
            "Less data than horizon after initial window. Make horizon or initial shorter"
                .to_string(),
        ));
    }
    result.reverse();
    Ok(result)
}

/// Simulated historical forecasts.
///
/// For every cutoff the model is refitted on the history up to the cutoff,
/// keeping its seasonal components and the explicit changepoints before the
/// cutoff, and predicts the observed dates in
/// `(cutoff, cutoff + horizon]`. Values stay in the units the model was
/// fitted in.
pub fn cross_validation(
    model: &TrainedProphet,
    windows: &CrossValidationWindows,
) -> Result<Vec<CrossValidationRow>> {
    let history = model.history()?;
    let rows = history.rows()?;
    let dates = history.dates()?;
    let cutoffs = generate_cutoffs(&dates, windows)?;
    let horizon = Duration::days(windows.horizon);

    info!(
        cutoffs = cutoffs.len(),
        horizon_days = windows.horizon,
        period_days = windows.period,
        initial_days = windows.initial,
        "Making cross-validation forecasts"
    );

    let mut result = Vec::new();
    for cutoff in cutoffs {
        let train = history.until(cutoff)?;
        if train.len() < 2 {
            return Err(ForecastError::DataError(format!(
                "Less than two datapoints before cutoff {}. Increase initial window",
                cutoff
            )));
        }

        let held_out: Vec<(NaiveDate, f64)> = rows
            .iter()
            .filter(|(d, _)| *d > cutoff && *d <= cutoff + horizon)
            .copied()
            .collect();
        debug!(%cutoff, train = train.len(), held_out = held_out.len(), "Refitting at cutoff");

        let refitted = model.refit_until(cutoff, &train)?;
        let held_out_dates: Vec<NaiveDate> = held_out.iter().map(|(d, _)| *d).collect();
        let predicted = refitted.predict(&held_out_dates)?;

        result.extend(
            held_out
                .iter()
                .zip(predicted.rows())
                .map(|((ds, y), p)| CrossValidationRow {
                    ds: *ds,
                    cutoff,
                    y: *y,
                    yhat: p.yhat,
                    yhat_lower: p.yhat_lower,
                    yhat_upper: p.yhat_upper,
                }),
        );
    }

    Ok(result)
}

/// Error metrics for each horizon in whole days, ascending.
///
/// Every horizon is scored on its own rows only; no smoothing across
/// neighbouring horizons is applied.
pub fn performance_metrics(rows: &[CrossValidationRow]) -> Result<Vec<PerformanceRow>> {
    let mut buckets: BTreeMap<i64, Vec<&CrossValidationRow>> = BTreeMap::new();
    for row in rows {
        buckets.entry(row.horizon_days()).or_default().push(row);
    }

    buckets
        .into_iter()
        .map(|(horizon_days, bucket)| {
            let y: Vec<f64> = bucket.iter().map(|r| r.y).collect();
            let yhat: Vec<f64> = bucket.iter().map(|r| r.yhat).collect();
            let lower: Vec<f64> = bucket.iter().map(|r| r.yhat_lower).collect();
            let upper: Vec<f64> = bucket.iter().map(|r| r.yhat_upper).collect();

            let mse = mean_squared_error(&y, &yhat)?;
            Ok(PerformanceRow {
                horizon_days,
                mse,
                rmse: mse.sqrt(),
                mae: mean_absolute_error(&y, &yhat)?,
                mape: mean_absolute_percentage_error(&y, &yhat)?,
                coverage: interval_coverage(&y, &lower, &upper)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(n)
    }

    #[test]
    fn test_default_windows() {
        let w = CrossValidationWindows::new(30, None, None).unwrap();
        assert_eq!((w.horizon, w.period, w.initial), (30, 15, 90));
        assert_eq!(CrossValidationWindows::new(1, None, None).unwrap().period, 1);
        assert!(CrossValidationWindows::new(0, None, None).is_err());
    }

    #[test]
    fn test_cutoffs_contiguous_history() {
        let dates: Vec<NaiveDate> = (0..100).map(day).collect();
        let w = CrossValidationWindows::new(10, Some(10), Some(60)).unwrap();
        let cutoffs = generate_cutoffs(&dates, &w).unwrap();

        assert_eq!(cutoffs, vec![day(69), day(79), day(89)]);
    }

    #[test]
    fn test_cutoffs_require_enough_history() {
        let dates: Vec<NaiveDate> = (0..10).map(day).collect();
        let short = CrossValidationWindows::new(20, None, None).unwrap();
        assert!(generate_cutoffs(&dates, &short).is_err());

        let no_room = CrossValidationWindows::new(5, None, Some(30)).unwrap();
        assert!(generate_cutoffs(&dates, &no_room).is_err());
    }

    #[test]
    fn test_metrics_per_horizon() {
        let rows = vec![
            CrossValidationRow {
                ds: day(1),
                cutoff: day(0),
                y: 10.0,
                yhat: 12.0,
                yhat_lower: 9.0,
                yhat_upper: 13.0,
            },
            CrossValidationRow {
                ds: day(2),
                cutoff: day(0),
                y: 10.0,
                yhat: 6.0,
                yhat_lower: 5.0,
                yhat_upper: 7.0,
            },
            CrossValidationRow {
                ds: day(6),
                cutoff: day(5),
                y: 20.0,
                yhat: 18.0,
                yhat_lower: 15.0,
                yhat_upper: 19.0,
            },
        ];
        let metrics = performance_metrics(&rows).unwrap();

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].horizon_days, 1);
        assert_eq!(metrics[0].mse, 4.0);
        assert_eq!(metrics[0].mae, 2.0);
        assert_eq!(metrics[0].coverage, 0.5);
        assert_eq!(metrics[1].horizon_days, 2);
        assert_eq!(metrics[1].rmse, 4.0);
        assert_eq!(metrics[1].coverage, 0.0);
    }
}
