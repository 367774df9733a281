//! # KPI Prophet workspace
//!
//! Umbrella crate re-exporting the workspace members:
//!
//! - [`forecast_math`]: transforms, Fourier terms, ridge regression and error statistics
//! - [`kpi_forecast`]: the trend, seasonality and holiday model with its diagnostics
//! - [`kpi_prophet`]: configured forecasts, persistence and the web view
//!
//! ## Example
//!
//! ```
//! use kpi_prophet_workspace::kpi_prophet::normalize_metric_name;
//!
//! assert_eq!(normalize_metric_name("Daily Signups"), "daily_signups");
//! ```

pub use forecast_math;
pub use kpi_forecast;
pub use kpi_prophet;
