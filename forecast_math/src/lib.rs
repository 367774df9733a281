//! # Forecast Math
//!
//! Numerical building blocks for KPI forecasting.
//! This crate provides the log transform used to stabilise multiplicative
//! trends, Fourier seasonality terms, a regularised least squares solver and
//! the error statistics reported by cross-validation.

use thiserror::Error;

pub mod fourier;
pub mod regression;
pub mod statistics;
pub mod transform;

/// Errors that can occur in forecasting calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for forecasting math operations
pub type Result<T> = std::result::Result<T, MathError>;
