//! Fitting configured forecasts and recording the runs

use crate::codec::{self, PayloadKind};
use crate::config::{ForecastDefinition, ProphetConfig};
use crate::error::Result;
use crate::plot;
use crate::store::{NewForecast, Stores};
use chrono::{DateTime, NaiveDate, Utc};
use forecast_math::transform::exp_value;
use kpi_forecast::{ForecastModel, Prophet, TimeSeriesData, TrainedForecastModel, TrainedProphet};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// One observation of the source series, in metric units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    pub ds: NaiveDate,
    pub y: f64,
}

/// Run the forecast configured under `metric_name` and return the new record id.
///
/// An unknown name is logged and skipped.
pub fn run_forecast(config: &ProphetConfig, stores: &Stores, metric_name: &str) -> Result<Option<i64>> {
    match config.forecast(metric_name) {
        Some(definition) => forecast_metric(definition, config, stores, Utc::now()).map(Some),
        None => {
            warn!(metric_name, "No forecast configured for metric");
            Ok(None)
        }
    }
}

/// Run every configured forecast in order, stopping at the first failure
pub fn run_all_forecasts(config: &ProphetConfig, stores: &Stores) -> Result<Vec<i64>> {
    config
        .forecasts
        .iter()
        .map(|definition| forecast_metric(definition, config, stores, Utc::now()))
        .collect()
}

/// Fit, predict and store one forecast stamped with `now`.
///
/// The model is fitted on log values. A prediction that overflows to
/// infinity once exponentiated fails the run with a forecast error and
/// nothing is written, since the stored JSON tables have no representation
/// for non-finite numbers.
pub fn forecast_metric(
    definition: &ForecastDefinition,
    config: &ProphetConfig,
    stores: &Stores,
    now: DateTime<Utc>,
) -> Result<i64> {
    info!(
        metric_name = %definition.metric_name,
        number_of_days = definition.number_of_days,
        query = %definition.time_series_query,
        "Forecasting metric"
    );

    let series = TimeSeriesData::from_rows(stores.source.read_time_series(&definition.time_series_query)?)?;
    let log_series = series.log_transformed()?;

    let model = Prophet::new(definition.model_settings())?.train(&log_series)?;
    let log_forecast = model.forecast(definition.number_of_days)?;

    let mut forecast = log_forecast.clone();
    forecast.map_predictions(exp_value);
    forecast.validate()?;

    let source: Vec<SourceRow> = series
        .rows()?
        .into_iter()
        .map(|(ds, y)| SourceRow { ds, y })
        .collect();

    if let Some(table) = &config.database.forecast_table_name {
        let written = stores
            .source
            .write_forecast_rows(table, &definition.metric_name, forecast.rows())?;
        info!(table = %table, rows = written, "Wrote forecast to ETL table");
    }

    let components = plot::render_components(&model, log_forecast.rows());

    let record = NewForecast {
        metric_name: definition.normalized_name(),
        forecast_timestamp: now,
        model: codec::encode(PayloadKind::Model, &model)?,
        forecasts: codec::encode(PayloadKind::ForecastTable, &forecast.rows())?,
        source: codec::encode(PayloadKind::SourceTable, &source)?,
        hyper_parameters: hyper_parameters(definition, &model),
        components_figure: Some(plot::encode_svg(&components)),
    };
    let id = stores.metadata.insert_forecast(&record)?;

    info!(
        metric_name = %record.metric_name,
        id,
        rows = forecast.len(),
        "Stored forecast"
    );
    Ok(id)
}

/// Snapshot of the settings a run was fitted with
pub fn hyper_parameters(definition: &ForecastDefinition, model: &TrainedProphet) -> serde_json::Value {
    let format_dates = |dates: &[NaiveDate]| -> Vec<String> {
        dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect()
    };

    let holiday_dates: Vec<NaiveDate> = definition
        .holidays
        .iter()
        .flat_map(|h| h.dates.iter().copied())
        .collect();
    let holidays = if holiday_dates.is_empty() {
        serde_json::Value::Null
    } else {
        json!(format_dates(&holiday_dates))
    };
    let changepoints = if model.changepoints().is_empty() {
        serde_json::Value::Null
    } else {
        json!(format_dates(model.changepoints()))
    };

    json!({
        "growth": definition.growth.to_string(),
        "holidays": holidays,
        "changepoint_prior_scale": definition.changepoint.prior_scale,
        "changepoint_range": definition.changepoint.range,
        "changepoints": changepoints,
        "n_changepoints": definition.changepoint.n_changepoints,
        "seasonality_mode": definition.seasonality.mode.to_string(),
        "seasonality_prior_scale": definition.seasonality.prior_scale,
        "yearly_seasonality": definition.seasonality.yearly,
        "weekly_seasonality": definition.seasonality.weekly,
        "daily_seasonality": definition.seasonality.daily,
    })
}
