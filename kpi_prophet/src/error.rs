//! Error types for the kpi_prophet crate

use kpi_forecast::ForecastError;
use thiserror::Error;

/// Errors raised while running, storing or presenting forecasts
#[derive(Debug, Error)]
pub enum ProphetError {
    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Failure in the source or metadata database
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// A stored payload could not be decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// Fitting, predicting or cross-validating failed
    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<forecast_math::MathError> for ProphetError {
    fn from(err: forecast_math::MathError) -> Self {
        ProphetError::Forecast(ForecastError::from(err))
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ProphetError>;
