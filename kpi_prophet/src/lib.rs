//! # KPI Prophet
//!
//! Configured KPI forecasts on top of [`kpi_forecast`]: source queries run
//! against a SQLite warehouse, fitted runs and cross-validations are stored
//! as versioned records, and a small web view charts the latest run of every
//! metric.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kpi_prophet::{run_forecast, ProphetConfig, Stores};
//!
//! # fn main() -> kpi_prophet::error::Result<()> {
//! let config = ProphetConfig::from_file("forecasts.toml")?;
//! let stores = Stores::open(&config.database)?;
//! if let Some(id) = run_forecast(&config, &stores, "Signups")? {
//!     println!("stored forecast {}", id);
//! }
//! # Ok(())
//! # }
//! ```

pub mod acl;
pub mod codec;
pub mod config;
pub mod error;
pub mod export;
pub mod html;
pub mod plot;
pub mod runner;
pub mod sql;
pub mod store;
pub mod validation;
pub mod views;

pub use crate::acl::{AllowAll, NavigationEntry, PermissionCheck};
pub use crate::config::{normalize_metric_name, ForecastDefinition, ProphetConfig};
pub use crate::error::ProphetError;
pub use crate::runner::{run_all_forecasts, run_forecast, SourceRow};
pub use crate::sql::{build_time_series_query, QueryBuilder};
pub use crate::store::{MetadataStore, SourceDatabase, Stores};
pub use crate::validation::run_forecast_cross_validation;
pub use crate::views::{router, AppState};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
