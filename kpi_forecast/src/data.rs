//! Time series data handling for forecasting
//!
//! A KPI series is a `polars` frame with a `ds` date column and a `y` value
//! column, kept in chronological order.

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use forecast_math::transform::log_transform;
use polars::prelude::*;

/// Name of the date column
pub const DATE_COLUMN: &str = "ds";
/// Name of the value column
pub const VALUE_COLUMN: &str = "y";

/// 1970-01-01
fn epoch() -> NaiveDate {
    NaiveDate::default()
}

/// Days since the Unix epoch, the physical representation of a polars `Date`
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

/// Inverse of [`days_since_epoch`]
pub fn date_from_days(days: i32) -> NaiveDate {
    epoch() + Duration::days(days as i64)
}

/// Time series data structure for forecasting
#[derive(Debug, Clone)]
pub struct TimeSeriesData {
    /// Data frame with `ds` (Date) and `y` (Float64) columns, ascending by `ds`
    df: DataFrame,
}

impl TimeSeriesData {
    /// Create a series from parallel date and value vectors.
    ///
    /// Rows are sorted chronologically; source queries usually return the
    /// most recent date first.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::DataError(format!(
                "Dates length ({}) doesn't match values length ({})",
                dates.len(),
                values.len()
            )));
        }
        Self::from_rows(dates.into_iter().zip(values).collect())
    }

    /// Create a series from `(date, value)` pairs in any order
    pub fn from_rows(mut rows: Vec<(NaiveDate, f64)>) -> Result<Self> {
        if let Some((date, value)) = rows.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ForecastError::DataError(format!(
                "Value {} on {} is not a finite number",
                value, date
            )));
        }
        rows.sort_by_key(|(date, _)| *date);

        let days: Vec<i32> = rows.iter().map(|(d, _)| days_since_epoch(*d)).collect();
        let values: Vec<f64> = rows.iter().map(|(_, v)| *v).collect();

        let ds = Series::new(DATE_COLUMN.into(), days).cast(&DataType::Date)?;
        let y = Series::new(VALUE_COLUMN.into(), values);
        let df = DataFrame::new(vec![ds.into(), y.into()])?;

        Ok(Self { df })
    }

    /// Dates in chronological order
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        let physical = self
            .df
            .column(DATE_COLUMN)?
            .as_materialized_series()
            .cast(&DataType::Int32)?;

        physical
            .i32()?
            .into_iter()
            .map(|day| {
                day.map(date_from_days).ok_or_else(|| {
                    ForecastError::DataError("Missing date in time series".to_string())
                })
            })
            .collect()
    }

    /// Values aligned with [`TimeSeriesData::dates`]
    pub fn values(&self) -> Result<Vec<f64>> {
        self.df
            .column(VALUE_COLUMN)?
            .as_materialized_series()
            .f64()?
            .into_iter()
            .map(|v| {
                v.ok_or_else(|| ForecastError::DataError("Missing value in time series".to_string()))
            })
            .collect()
    }

    /// `(date, value)` pairs in chronological order
    pub fn rows(&self) -> Result<Vec<(NaiveDate, f64)>> {
        Ok(self.dates()?.into_iter().zip(self.values()?).collect())
    }

    /// Get a slice of the data from start to end index
    pub fn slice(&self, start: usize, end: Option<usize>) -> Result<Self> {
        let end = end.unwrap_or(self.df.height()).min(self.df.height());
        if start > end {
            return Err(ForecastError::ValidationError(format!(
                "Slice start {} is after end {}",
                start, end
            )));
        }

        Ok(Self {
            df: self.df.slice(start as i64, end - start),
        })
    }

    /// Rows dated on or before `cutoff`
    pub fn until(&self, cutoff: NaiveDate) -> Result<Self> {
        let count = self.dates()?.iter().take_while(|d| **d <= cutoff).count();
        self.slice(0, Some(count))
    }

    /// Same dates with replacement values
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self> {
        Self::new(self.dates()?, values)
    }

    /// Natural logarithm of every value; fails on non-positive values
    pub fn log_transformed(&self) -> Result<Self> {
        let logged = log_transform(&self.values()?)?;
        self.with_values(logged)
    }

    /// Check if the time series is empty
    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Get the length of the time series
    pub fn len(&self) -> usize {
        self.df.height()
    }
}
