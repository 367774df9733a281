//! # KPI Forecast
//!
//! A Rust library for forecasting daily business KPIs with a decomposable
//! trend, seasonality and holiday model.
//!
//! ## Features
//!
//! - Time series data handling over `polars` frames
//! - Piecewise linear or logistic trend with automatic changepoints
//! - Yearly, weekly and daily Fourier seasonalities, additive or multiplicative
//! - Holiday effects with windows around each date
//! - Simulated uncertainty intervals
//! - Rolling-origin cross-validation with per-horizon error metrics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chrono::NaiveDate;
//! use kpi_forecast::models::prophet::Prophet;
//! use kpi_forecast::models::{ForecastModel, TrainedForecastModel};
//! use kpi_forecast::TimeSeriesData;
//!
//! # fn main() -> kpi_forecast::error::Result<()> {
//! let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! let rows = (0..100)
//!     .map(|i| (start + chrono::Duration::days(i), 100.0 + i as f64))
//!     .collect();
//! let data = TimeSeriesData::from_rows(rows)?.log_transformed()?;
//!
//! let model = Prophet::default().train(&data)?;
//! let mut forecast = model.forecast(30)?;
//! forecast.map_predictions(f64::exp);
//! assert_eq!(forecast.len(), 130);
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod diagnostics;
pub mod error;
pub mod models;
pub mod utils;

// Re-export commonly used types
pub use crate::data::TimeSeriesData;
pub use crate::diagnostics::{CrossValidationRow, CrossValidationWindows, PerformanceRow};
pub use crate::error::ForecastError;
pub use crate::models::prophet::{Prophet, TrainedProphet};
pub use crate::models::settings::{Growth, Holiday, ProphetSettings, SeasonalityMode, SeasonalityToggle};
pub use crate::models::{ForecastFrame, ForecastModel, ForecastRow, TrainedForecastModel};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
