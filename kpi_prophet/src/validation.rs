//! Rolling-origin evaluation of stored forecasts

use crate::codec::{self, PayloadKind};
use crate::error::Result;
use crate::store::{NewCrossValidation, Stores};
use forecast_math::transform::exp_value;
use kpi_forecast::diagnostics::{cross_validation, performance_metrics};
use kpi_forecast::{CrossValidationWindows, TrainedProphet};
use tracing::info;

/// Cross-validate the model stored under `forecast_id` and record the run.
///
/// Windows are in days; `initial_days` defaults to three horizons and
/// `period_days` to half a horizon. Returns `Ok(None)` when no forecast has
/// that id.
pub fn run_forecast_cross_validation(
    stores: &Stores,
    forecast_id: i64,
    horizon_days: i64,
    initial_days: Option<i64>,
    period_days: Option<i64>,
) -> Result<Option<i64>> {
    let Some(record) = stores.metadata.forecast_by_id(forecast_id)? else {
        info!(forecast_id, "No forecast with this id, skipping cross-validation");
        return Ok(None);
    };

    let model: TrainedProphet = codec::decode(PayloadKind::Model, &record.model)?;
    let windows = CrossValidationWindows::new(horizon_days, period_days, initial_days)?;

    info!(
        forecast_id,
        metric_name = %record.metric_name,
        horizon_days,
        "Starting cross-validation"
    );
    let mut rows = cross_validation(&model, &windows)?;
    for row in &mut rows {
        row.map_values(exp_value);
    }

    info!(forecast_id, rows = rows.len(), "Computing performance metrics");
    let metrics = performance_metrics(&rows)?;

    let id = stores.metadata.insert_cross_validation(&NewCrossValidation {
        forecast_id,
        horizon_days,
        initial_days,
        period_days,
        cross_validation_table: codec::encode(PayloadKind::CrossValidationTable, &rows)?,
        metrics_table: codec::encode(PayloadKind::MetricsTable, &metrics)?,
    })?;
    info!(forecast_id, id, horizons = metrics.len(), "Stored cross-validation");
    Ok(Some(id))
}
