//! Forecasting models for time series data

use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// One predicted date with its decomposition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    /// Date being predicted
    pub ds: NaiveDate,
    /// Trend component
    pub trend: f64,
    /// Lower trend uncertainty bound
    pub trend_lower: f64,
    /// Upper trend uncertainty bound
    pub trend_upper: f64,
    /// Predicted value
    pub yhat: f64,
    /// Lower prediction bound
    pub yhat_lower: f64,
    /// Upper prediction bound
    pub yhat_upper: f64,
    /// Sum of the additive components
    pub additive_terms: f64,
    /// Sum of the multiplicative components, relative to the trend
    pub multiplicative_terms: f64,
    /// Combined holiday effect
    pub holidays: f64,
    /// Effect of each seasonality, keyed by name (`weekly`, `yearly`, ...)
    pub seasonal: BTreeMap<String, f64>,
}

/// Predictions for a sequence of dates, in the order they were requested
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastFrame {
    rows: Vec<ForecastRow>,
}

impl ForecastFrame {
    /// Create a frame from predicted rows
    pub fn new(rows: Vec<ForecastRow>) -> Self {
        Self { rows }
    }

    /// Get the predicted rows
    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    /// Number of predicted dates
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the frame holds no predictions
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows dated strictly after `date`
    pub fn after(&self, date: NaiveDate) -> impl Iterator<Item = &ForecastRow> {
        self.rows.iter().filter(move |r| r.ds > date)
    }

    /// Apply `f` to `yhat`, `yhat_lower` and `yhat_upper` of every row.
    ///
    /// Used to bring predictions made on log values back to the original scale.
    pub fn map_predictions<F: Fn(f64) -> f64>(&mut self, f: F) {
        for row in &mut self.rows {
            row.yhat = f(row.yhat);
            row.yhat_lower = f(row.yhat_lower);
            row.yhat_upper = f(row.yhat_upper);
        }
    }

    /// Check that every prediction is a finite number
    pub fn validate(&self) -> Result<()> {
        match self
            .rows
            .iter()
            .find(|r| !(r.yhat.is_finite() && r.yhat_lower.is_finite() && r.yhat_upper.is_finite()))
        {
            Some(row) => Err(ForecastError::ForecastingError(format!(
                "Prediction for {} is not finite",
                row.ds
            ))),
            None => Ok(()),
        }
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Predict every requested date
    fn predict(&self, dates: &[NaiveDate]) -> Result<ForecastFrame>;

    /// History dates followed by `periods` daily dates after the last observation
    fn make_future_dates(&self, periods: usize) -> Vec<NaiveDate>;

    /// Predict the history and `periods` days beyond it
    fn forecast(&self, periods: usize) -> Result<ForecastFrame> {
        let dates = self.make_future_dates(periods);
        self.predict(&dates)
    }

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on time series data
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on time series data
    fn train(&self, data: &TimeSeriesData) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

pub mod prophet;
pub mod settings;
