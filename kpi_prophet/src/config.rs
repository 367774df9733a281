//! Configuration of the forecasting module
//!
//! Everything is read once from a TOML file into an immutable
//! [`ProphetConfig`]:
//!
//! ```toml
//! [database]
//! source = "dwh.sqlite"
//! metadata = "forecasts.sqlite"
//! forecast_table_name = "forecast_etl"
//!
//! [[forecasts]]
//! metric_name = "Signups"
//! number_of_days = 30
//! time_series_query = "SELECT day AS ds, count(*) AS y FROM signups GROUP BY 1"
//! growth = "linear"
//!
//! [forecasts.seasonality]
//! mode = "multiplicative"
//! yearly = false
//! ```

use crate::error::{ProphetError, Result};
use crate::sql::QueryBuilder;
use chrono::NaiveDate;
use kpi_forecast::{Growth, Holiday, ProphetSettings, SeasonalityMode, SeasonalityToggle};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Lowercase, with spaces and hyphens turned into underscores
pub fn normalize_metric_name(name: &str) -> String {
    name.to_lowercase().replace([' ', '-'], "_")
}

/// Database locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database the source queries run against; also holds the ETL table
    pub source: PathBuf,
    /// Database holding forecast and cross-validation records
    pub metadata: PathBuf,
    /// ETL table receiving every predicted row; no ETL integration when absent
    #[serde(default)]
    pub forecast_table_name: Option<String>,
}

/// Address of the web view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Seasonality settings of one forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonalityConfig {
    pub mode: SeasonalityMode,
    pub prior_scale: f64,
    pub yearly: SeasonalityToggle,
    pub weekly: SeasonalityToggle,
    pub daily: SeasonalityToggle,
}

impl Default for SeasonalityConfig {
    fn default() -> Self {
        Self {
            mode: SeasonalityMode::Additive,
            prior_scale: 10.0,
            yearly: SeasonalityToggle::Auto,
            weekly: SeasonalityToggle::Auto,
            daily: SeasonalityToggle::Auto,
        }
    }
}

/// Trend flexibility settings of one forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangepointConfig {
    /// Explicit changepoint dates; placed automatically when absent
    pub dates: Option<Vec<NaiveDate>>,
    pub n_changepoints: usize,
    pub range: f64,
    pub prior_scale: f64,
}

impl Default for ChangepointConfig {
    fn default() -> Self {
        Self {
            dates: None,
            n_changepoints: 25,
            range: 0.8,
            prior_scale: 0.05,
        }
    }
}

/// One configured forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ForecastDefinitionFile")]
pub struct ForecastDefinition {
    /// Display name; stored normalized
    pub metric_name: String,
    /// Days to forecast beyond the last observation
    pub number_of_days: usize,
    /// Query returning `(date, value)` rows
    pub time_series_query: String,
    pub growth: Growth,
    /// Saturation level for logistic growth, in the units of the metric
    pub capacity: Option<f64>,
    pub holidays: Vec<Holiday>,
    pub seasonality: SeasonalityConfig,
    pub changepoint: ChangepointConfig,
    pub interval_width: f64,
    pub uncertainty_samples: usize,
}

/// A forecast as written in the file: the query is given either as text or
/// as the parts of a query builder
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ForecastDefinitionFile {
    metric_name: String,
    number_of_days: usize,
    time_series_query: Option<String>,
    source: Option<QueryBuilder>,
    #[serde(default)]
    growth: Growth,
    capacity: Option<f64>,
    #[serde(default)]
    holidays: Vec<Holiday>,
    #[serde(default)]
    seasonality: SeasonalityConfig,
    #[serde(default)]
    changepoint: ChangepointConfig,
    #[serde(default = "default_interval_width")]
    interval_width: f64,
    #[serde(default = "default_uncertainty_samples")]
    uncertainty_samples: usize,
}

fn default_interval_width() -> f64 {
    0.8
}

fn default_uncertainty_samples() -> usize {
    1000
}

impl TryFrom<ForecastDefinitionFile> for ForecastDefinition {
    type Error = String;

    fn try_from(file: ForecastDefinitionFile) -> std::result::Result<Self, Self::Error> {
        let time_series_query = match (file.time_series_query, file.source) {
            (Some(query), None) => query,
            (None, Some(builder)) => builder.build(),
            (Some(_), Some(_)) => {
                return Err(format!(
                    "forecast \"{}\" sets both time_series_query and source",
                    file.metric_name
                ))
            }
            (None, None) => {
                return Err(format!(
                    "forecast \"{}\" needs a time_series_query or a source",
                    file.metric_name
                ))
            }
        };

        Ok(ForecastDefinition {
            metric_name: file.metric_name,
            number_of_days: file.number_of_days,
            time_series_query,
            growth: file.growth,
            capacity: file.capacity,
            holidays: file.holidays,
            seasonality: file.seasonality,
            changepoint: file.changepoint,
            interval_width: file.interval_width,
            uncertainty_samples: file.uncertainty_samples,
        })
    }
}

impl ForecastDefinition {
    /// A linear-growth forecast with default settings
    pub fn new(
        metric_name: impl Into<String>,
        number_of_days: usize,
        time_series_query: impl Into<String>,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            number_of_days,
            time_series_query: time_series_query.into(),
            growth: Growth::Linear,
            capacity: None,
            holidays: Vec::new(),
            seasonality: SeasonalityConfig::default(),
            changepoint: ChangepointConfig::default(),
            interval_width: default_interval_width(),
            uncertainty_samples: default_uncertainty_samples(),
        }
    }

    /// Name under which runs are stored
    pub fn normalized_name(&self) -> String {
        normalize_metric_name(&self.metric_name)
    }

    /// Model settings for fitting the log of the metric.
    ///
    /// The capacity is given in metric units and is log-transformed like the
    /// values.
    pub fn model_settings(&self) -> ProphetSettings {
        ProphetSettings {
            growth: self.growth,
            capacity: self.capacity.map(f64::ln),
            holidays: self.holidays.clone(),
            seasonality_mode: self.seasonality.mode,
            seasonality_prior_scale: self.seasonality.prior_scale,
            yearly_seasonality: self.seasonality.yearly,
            weekly_seasonality: self.seasonality.weekly,
            daily_seasonality: self.seasonality.daily,
            changepoints: self.changepoint.dates.clone(),
            n_changepoints: self.changepoint.n_changepoints,
            changepoint_range: self.changepoint.range,
            changepoint_prior_scale: self.changepoint.prior_scale,
            interval_width: self.interval_width,
            uncertainty_samples: self.uncertainty_samples,
            ..ProphetSettings::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.metric_name.trim().is_empty() {
            return Err(ProphetError::Config("metric_name must not be empty".to_string()));
        }
        if self.number_of_days == 0 {
            return Err(ProphetError::Config(format!(
                "forecast \"{}\": number_of_days must be positive",
                self.metric_name
            )));
        }
        if self.growth == Growth::Logistic && !matches!(self.capacity, Some(c) if c > 0.0) {
            return Err(ProphetError::Config(format!(
                "forecast \"{}\": logistic growth needs a positive capacity",
                self.metric_name
            )));
        }
        self.model_settings()
            .validate()
            .map_err(|e| ProphetError::Config(format!("forecast \"{}\": {}", self.metric_name, e)))
    }
}

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProphetConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub forecasts: Vec<ForecastDefinition>,
}

impl ProphetConfig {
    /// Read and validate a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: ProphetConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every definition and that names stay unique once normalized
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for forecast in &self.forecasts {
            forecast.validate()?;
            if !seen.insert(forecast.normalized_name()) {
                return Err(ProphetError::Config(format!(
                    "duplicate forecast name \"{}\"",
                    forecast.metric_name
                )));
            }
        }
        if let Some(table) = &self.database.forecast_table_name {
            let valid = !table.is_empty()
                && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            if !valid {
                return Err(ProphetError::Config(format!(
                    "invalid forecast_table_name \"{}\"",
                    table
                )));
            }
        }
        Ok(())
    }

    /// Look up a forecast by its name as configured or normalized
    pub fn forecast(&self, name: &str) -> Option<&ForecastDefinition> {
        let normalized = normalize_metric_name(name);
        self.forecasts
            .iter()
            .find(|f| f.metric_name == name || f.normalized_name() == normalized)
    }
}
