//! Web pages under `/forecasts`

use crate::acl::{AllowAll, PermissionCheck, ACL_RESOURCE};
use crate::codec::{self, PayloadKind};
use crate::config::{normalize_metric_name, ProphetConfig};
use crate::error::{ProphetError, Result};
use crate::export::{forecast_csv, latest_forecast_rows};
use crate::html;
use crate::plot::{self, MainPlotData};
use crate::runner::SourceRow;
use crate::store::{ForecastRecord, Stores};
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use kpi_forecast::{ForecastFrame, ForecastRow, TrainedForecastModel, TrainedProphet};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Mount point of every route
pub const PREFIX: &str = "/forecasts";

/// Body returned while a metric has no stored run
pub const NO_DATA: &str = "No data yet.";

const FORECAST_JS: &str = include_str!("../static/forecast.js");

/// Shared state of the handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProphetConfig>,
    pub stores: Stores,
    pub permissions: Arc<dyn PermissionCheck>,
}

impl AppState {
    /// State letting every request through
    pub fn new(config: ProphetConfig, stores: Stores) -> Self {
        Self {
            config: Arc::new(config),
            stores,
            permissions: Arc::new(AllowAll),
        }
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionCheck>) -> Self {
        self.permissions = permissions;
        self
    }
}

impl IntoResponse for ProphetError {
    fn into_response(self) -> Response {
        error!(error = %self, "Request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Router serving the forecast pages
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/forecasts", get(view_plots))
        .route("/forecasts/", get(view_plots))
        .route("/forecasts/_get_plot_image/:name/:components", get(get_plot_image))
        .route("/forecasts/_query_details/:name", get(query_details))
        .route("/forecasts/_download/:name", get(download))
        .route("/forecasts/static/forecast.js", get(forecast_js))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_permission))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_permission(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.permissions.has_permission(ACL_RESOURCE, request.headers()) {
        next.run(request).await
    } else {
        (StatusCode::FORBIDDEN, "Permission denied").into_response()
    }
}

async fn view_plots(State(state): State<AppState>) -> Html<String> {
    Html(html::listing_page(PREFIX, &state.config.forecasts))
}

async fn get_plot_image(
    State(state): State<AppState>,
    Path((name, components)): Path<(String, String)>,
) -> Result<Html<String>> {
    let Some(record) = state.stores.metadata.latest_forecast(&name)? else {
        return Ok(Html(NO_DATA.to_string()));
    };

    let encoded = if components == "True" {
        components_image(&record)?
    } else {
        let forecast = ForecastFrame::new(codec::decode(PayloadKind::ForecastTable, &record.forecasts)?);
        let source: Vec<SourceRow> = codec::decode(PayloadKind::SourceTable, &record.source)?;
        let svg = plot::render_main_plot(&name, &MainPlotData::new(&source, &forecast));
        plot::encode_svg(&svg)
    };
    Ok(Html(plot::img_tag(&encoded)))
}

/// Cached components image, or one rendered from the stored model
fn components_image(record: &ForecastRecord) -> Result<String> {
    if let Some(figure) = record.components_figure.as_deref().filter(|f| !f.is_empty()) {
        return Ok(figure.to_string());
    }

    let model: TrainedProphet = codec::decode(PayloadKind::Model, &record.model)?;
    let stored: Vec<ForecastRow> = codec::decode(PayloadKind::ForecastTable, &record.forecasts)?;
    let dates: Vec<_> = stored.iter().map(|r| r.ds).collect();
    let frame = model.predict(&dates)?;
    Ok(plot::encode_svg(&plot::render_components(&model, frame.rows())))
}

async fn query_details(State(state): State<AppState>, Path(name): Path<String>) -> Html<String> {
    let (query, days) = match state.config.forecast(&name) {
        Some(forecast) => (forecast.time_series_query.as_str(), Some(forecast.number_of_days)),
        None => ("", None),
    };
    Html(html::query_details_table(query, days))
}

async fn download(State(state): State<AppState>, Path(name): Path<String>) -> Result<Response> {
    let Some(rows) = latest_forecast_rows(&state.stores.metadata, &name)? else {
        return Ok((StatusCode::NOT_FOUND, NO_DATA).into_response());
    };

    let disposition = format!(
        "attachment; filename=\"{}_forecast.csv\"",
        normalize_metric_name(&name)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        forecast_csv(&rows)?,
    )
        .into_response())
}

async fn forecast_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], FORECAST_JS)
}
