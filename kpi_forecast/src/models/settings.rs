//! Model settings: growth, seasonality, holidays and changepoints

use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of the trend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Growth {
    /// Piecewise linear trend
    #[default]
    Linear,
    /// Piecewise logistic trend saturating at a capacity
    Logistic,
}

impl fmt::Display for Growth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Growth::Linear => write!(f, "linear"),
            Growth::Logistic => write!(f, "logistic"),
        }
    }
}

/// How seasonal and holiday effects combine with the trend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    /// Effects are added to the trend
    #[default]
    Additive,
    /// Effects scale the trend
    Multiplicative,
}

impl fmt::Display for SeasonalityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeasonalityMode::Additive => write!(f, "additive"),
            SeasonalityMode::Multiplicative => write!(f, "multiplicative"),
        }
    }
}

/// Whether a built-in seasonality is fitted.
///
/// Written as `"auto"`, `true`, `false` or a Fourier order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ToggleRepr", into = "ToggleRepr")]
pub enum SeasonalityToggle {
    /// Enabled when the history is long and dense enough
    #[default]
    Auto,
    /// Always fitted with the default order
    Enabled,
    /// Never fitted
    Disabled,
    /// Always fitted with this Fourier order
    FourierOrder(usize),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum ToggleRepr {
    Flag(bool),
    Order(usize),
    Keyword(String),
}

impl TryFrom<ToggleRepr> for SeasonalityToggle {
    type Error = String;

    fn try_from(repr: ToggleRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ToggleRepr::Flag(true) => Ok(SeasonalityToggle::Enabled),
            ToggleRepr::Flag(false) => Ok(SeasonalityToggle::Disabled),
            ToggleRepr::Order(0) => Ok(SeasonalityToggle::Disabled),
            ToggleRepr::Order(order) => Ok(SeasonalityToggle::FourierOrder(order)),
            ToggleRepr::Keyword(word) if word == "auto" => Ok(SeasonalityToggle::Auto),
            ToggleRepr::Keyword(word) => Err(format!(
                "seasonality must be \"auto\", a boolean or a Fourier order, got \"{}\"",
                word
            )),
        }
    }
}

impl From<SeasonalityToggle> for ToggleRepr {
    fn from(toggle: SeasonalityToggle) -> Self {
        match toggle {
            SeasonalityToggle::Auto => ToggleRepr::Keyword("auto".to_string()),
            SeasonalityToggle::Enabled => ToggleRepr::Flag(true),
            SeasonalityToggle::Disabled => ToggleRepr::Flag(false),
            SeasonalityToggle::FourierOrder(order) => ToggleRepr::Order(order),
        }
    }
}

impl SeasonalityToggle {
    /// Fourier order to fit, or `None` when the seasonality is off
    pub fn resolve(self, auto_enabled: bool, default_order: usize) -> Option<usize> {
        match self {
            SeasonalityToggle::Auto if auto_enabled => Some(default_order),
            SeasonalityToggle::Auto | SeasonalityToggle::Disabled => None,
            SeasonalityToggle::Enabled => Some(default_order),
            SeasonalityToggle::FourierOrder(order) => Some(order),
        }
    }
}

fn default_holiday_prior_scale() -> f64 {
    10.0
}

/// A named set of dates with an effect window around each date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holiday {
    /// Holiday name
    pub name: String,
    /// Dates on which the holiday falls
    pub dates: Vec<NaiveDate>,
    /// Days before each date that share the effect (zero or negative)
    #[serde(default)]
    pub lower_window: i32,
    /// Days after each date that share the effect (zero or positive)
    #[serde(default)]
    pub upper_window: i32,
    /// Regularisation scale of the holiday effect
    #[serde(default = "default_holiday_prior_scale")]
    pub prior_scale: f64,
}

impl Holiday {
    /// Create a single-day holiday with the default prior scale
    pub fn new(name: impl Into<String>, dates: Vec<NaiveDate>) -> Self {
        Self {
            name: name.into(),
            dates,
            lower_window: 0,
            upper_window: 0,
            prior_scale: default_holiday_prior_scale(),
        }
    }

    /// Set the effect window around each date
    pub fn with_window(mut self, lower_window: i32, upper_window: i32) -> Self {
        self.lower_window = lower_window;
        self.upper_window = upper_window;
        self
    }
}

/// Settings of the decomposable model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProphetSettings {
    /// Trend shape
    pub growth: Growth,
    /// Saturation level for logistic growth, in the units of the fitted values
    pub capacity: Option<f64>,
    /// Holiday calendar
    pub holidays: Vec<Holiday>,
    /// How seasonal and holiday effects combine with the trend
    pub seasonality_mode: SeasonalityMode,
    /// Regularisation scale of the seasonal effects
    pub seasonality_prior_scale: f64,
    /// Period 365.25 days
    pub yearly_seasonality: SeasonalityToggle,
    /// Period 7 days
    pub weekly_seasonality: SeasonalityToggle,
    /// Period 1 day
    pub daily_seasonality: SeasonalityToggle,
    /// Explicit changepoint dates; placed automatically when `None`
    pub changepoints: Option<Vec<NaiveDate>>,
    /// Number of automatic changepoints
    pub n_changepoints: usize,
    /// Leading fraction of the history that may hold automatic changepoints
    pub changepoint_range: f64,
    /// Flexibility of the trend
    pub changepoint_prior_scale: f64,
    /// Width of the uncertainty intervals
    pub interval_width: f64,
    /// Simulated paths used for the uncertainty intervals; zero disables them
    pub uncertainty_samples: usize,
    /// Seed of the simulation
    pub seed: u64,
}

impl Default for ProphetSettings {
    fn default() -> Self {
        Self {
            growth: Growth::Linear,
            capacity: None,
            holidays: Vec::new(),
            seasonality_mode: SeasonalityMode::Additive,
            seasonality_prior_scale: 10.0,
            yearly_seasonality: SeasonalityToggle::Auto,
            weekly_seasonality: SeasonalityToggle::Auto,
            daily_seasonality: SeasonalityToggle::Auto,
            changepoints: None,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            interval_width: 0.8,
            uncertainty_samples: 1000,
            seed: 0,
        }
    }
}

impl ProphetSettings {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if self.growth == Growth::Logistic {
            match self.capacity {
                Some(cap) if cap.is_finite() => {}
                _ => {
                    return Err(ForecastError::InvalidParameter(
                        "Logistic growth requires a finite capacity".to_string(),
                    ))
                }
            }
        }
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "changepoint_range must be in (0, 1], got {}",
                self.changepoint_range
            )));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "interval_width must be in (0, 1), got {}",
                self.interval_width
            )));
        }
        let scales = [
            ("changepoint_prior_scale", self.changepoint_prior_scale),
            ("seasonality_prior_scale", self.seasonality_prior_scale),
        ];
        for (name, value) in scales {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        for holiday in &self.holidays {
            if holiday.lower_window > 0 || holiday.upper_window < 0 {
                return Err(ForecastError::InvalidParameter(format!(
                    "Holiday {} needs lower_window <= 0 <= upper_window",
                    holiday.name
                )));
            }
            if !(holiday.prior_scale > 0.0) {
                return Err(ForecastError::InvalidParameter(format!(
                    "Holiday {} prior_scale must be positive",
                    holiday.name
                )));
            }
        }
        Ok(())
    }
}
