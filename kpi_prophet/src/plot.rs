//! SVG charts of stored forecasts
//!
//! The main chart shows the actual series with the forecast beyond the last
//! observation; the components chart has one panel per model component.
//! Charts are handed to the browser as base64 `data:` URIs.

use crate::html::escape;
use crate::runner::SourceRow;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{Datelike, Duration, NaiveDate};
use kpi_forecast::data::{date_from_days, days_since_epoch};
use kpi_forecast::{ForecastFrame, ForecastRow, SeasonalityMode, TrainedProphet};
use std::fmt::Write;

const WIDTH: f64 = 1700.0;
const MAIN_HEIGHT: f64 = 400.0;
const PANEL_HEIGHT: f64 = 300.0;
const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 36.0;
const MARGIN_BOTTOM: f64 = 48.0;

const ACTUAL_COLOR: &str = "#1f77b4";
const FORECAST_COLOR: &str = "#000000";
const FORECAST_BAND: &str = "#a9a9a9";
const COMPONENT_COLOR: &str = "#0072b2";

/// Seasonal profiles are drawn from this Sunday on
fn profile_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 1, 1).unwrap_or_default()
}

/// One prediction shown beyond the actual series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedPoint {
    pub ds: NaiveDate,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// What the main chart draws
#[derive(Debug, Clone, PartialEq)]
pub struct MainPlotData {
    /// Observed series
    pub actual: Vec<(NaiveDate, f64)>,
    /// Predictions dated strictly after the last observation
    pub predicted: Vec<PredictedPoint>,
}

impl MainPlotData {
    pub fn new(source: &[SourceRow], forecast: &ForecastFrame) -> Self {
        let last_actual = source.iter().map(|r| r.ds).max().unwrap_or(NaiveDate::MIN);
        let predicted = forecast
            .after(last_actual)
            .map(|r| PredictedPoint {
                ds: r.ds,
                yhat: r.yhat,
                yhat_lower: r.yhat_lower,
                yhat_upper: r.yhat_upper,
            })
            .collect();

        Self {
            actual: source.iter().map(|r| (r.ds, r.y)).collect(),
            predicted,
        }
    }
}

/// Panels of the components chart, in drawing order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Trend,
    Holidays,
    Weekly,
    Yearly,
    /// Any other seasonality, by name
    Seasonality(String),
}

impl Component {
    /// Trend, holidays when the model has any, then every seasonality
    pub fn for_model(model: &TrainedProphet) -> Vec<Component> {
        let mut components = vec![Component::Trend];
        if model.has_holidays() {
            components.push(Component::Holidays);
        }
        components.extend(model.seasonalities().iter().map(|s| match s.name.as_str() {
            "weekly" => Component::Weekly,
            "yearly" => Component::Yearly,
            other => Component::Seasonality(other.to_string()),
        }));
        components
    }

    /// Column or seasonality name
    pub fn name(&self) -> &str {
        match self {
            Component::Trend => "trend",
            Component::Holidays => "holidays",
            Component::Weekly => "weekly",
            Component::Yearly => "yearly",
            Component::Seasonality(name) => name,
        }
    }

    fn panel(&self, model: &TrainedProphet, forecast: &[ForecastRow]) -> Panel {
        match self {
            Component::Trend => trend_panel(forecast),
            Component::Holidays => holidays_panel(model, forecast),
            Component::Weekly => weekly_panel(model),
            Component::Yearly => yearly_panel(model),
            Component::Seasonality(name) => seasonality_panel(model, name),
        }
    }
}

struct Series {
    points: Vec<(f64, f64)>,
    stroke: &'static str,
    dash: Option<&'static str>,
}

struct Band {
    /// `(x, lower, upper)`
    points: Vec<(f64, f64, f64)>,
    fill: &'static str,
    opacity: f64,
}

struct Panel {
    y_label: String,
    x_label: Option<String>,
    x_ticks: Vec<(f64, String)>,
    percent: bool,
    series: Vec<Series>,
    bands: Vec<Band>,
    legend: Vec<(&'static str, &'static str)>,
}

impl Panel {
    fn new(y_label: impl Into<String>) -> Self {
        Self {
            y_label: y_label.into(),
            x_label: None,
            x_ticks: Vec::new(),
            percent: false,
            series: Vec::new(),
            bands: Vec::new(),
            legend: Vec::new(),
        }
    }

    fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let xs = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.0))
            .chain(self.bands.iter().flat_map(|b| b.points.iter().map(|p| p.0)));
        let ys = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.1))
            .chain(self.bands.iter().flat_map(|b| b.points.iter().flat_map(|p| [p.1, p.2])));

        let (x_min, x_max) = min_max(xs)?;
        let (y_min, y_max) = min_max(ys)?;
        let (x_min, x_max) = widen(x_min, x_max);
        let (y_min, y_max) = widen(y_min, y_max);
        let pad = (y_max - y_min) * 0.05;
        Some((x_min, x_max, y_min - pad, y_max + pad))
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn widen(lo: f64, hi: f64) -> (f64, f64) {
    if hi > lo {
        (lo, hi)
    } else {
        let half = if lo == 0.0 { 1.0 } else { lo.abs() * 0.1 };
        (lo - half, hi + half)
    }
}

fn format_tick(value: f64, percent: bool) -> String {
    if percent {
        return format!("{:.1}%", value * 100.0);
    }
    match value.abs() {
        v if v >= 1000.0 => format!("{:.0}", value),
        v if v >= 1.0 => format!("{:.1}", value),
        _ => format!("{:.3}", value),
    }
}

/// Evenly spaced date ticks over a day-number range
fn date_ticks(x_min: f64, x_max: f64, count: usize) -> Vec<(f64, String)> {
    (0..count)
        .map(|i| {
            let x = (x_min + (x_max - x_min) * i as f64 / (count - 1) as f64).round();
            (x, date_from_days(x as i32).format("%Y-%m-%d").to_string())
        })
        .collect()
}

fn draw_panel(svg: &mut String, panel: &Panel, top: f64, height: f64) {
    let left = MARGIN_LEFT;
    let right = WIDTH - MARGIN_RIGHT;
    let plot_top = top + MARGIN_TOP;
    let bottom = top + height - MARGIN_BOTTOM;

    writeln!(
        svg,
        r##"  <rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="none" stroke="#cccccc" />"##,
        left,
        plot_top,
        right - left,
        bottom - plot_top
    )
    .ok();

    let Some((x_min, x_max, y_min, y_max)) = panel.bounds() else {
        writeln!(
            svg,
            r#"  <text class="label" x="{:.1}" y="{:.1}" text-anchor="middle">No data</text>"#,
            (left + right) / 2.0,
            (plot_top + bottom) / 2.0
        )
        .ok();
        return;
    };

    let sx = |x: f64| left + (x - x_min) / (x_max - x_min) * (right - left);
    let sy = |y: f64| bottom - (y - y_min) / (y_max - y_min) * (bottom - plot_top);

    // y grid and ticks
    for i in 0..5 {
        let value = y_min + (y_max - y_min) * i as f64 / 4.0;
        let y = sy(value);
        writeln!(
            svg,
            r##"  <line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="#eeeeee" />"##,
            left, y, right, y
        )
        .ok();
        writeln!(
            svg,
            r#"  <text class="tick" x="{:.1}" y="{:.1}" text-anchor="end">{}</text>"#,
            left - 6.0,
            y + 4.0,
            format_tick(value, panel.percent)
        )
        .ok();
    }

    let x_ticks = if panel.x_ticks.is_empty() {
        date_ticks(x_min, x_max, 6)
    } else {
        panel.x_ticks.clone()
    };
    for (value, label) in &x_ticks {
        writeln!(
            svg,
            r#"  <text class="tick" x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            sx(*value),
            bottom + 16.0,
            escape(label)
        )
        .ok();
    }

    for band in &panel.bands {
        if band.points.is_empty() {
            continue;
        }
        let upper = band.points.iter().map(|(x, _, hi)| format!("{:.1},{:.1}", sx(*x), sy(*hi)));
        let lower = band
            .points
            .iter()
            .rev()
            .map(|(x, lo, _)| format!("{:.1},{:.1}", sx(*x), sy(*lo)));
        let points: Vec<String> = upper.chain(lower).collect();
        writeln!(
            svg,
            r#"  <polygon points="{}" fill="{}" fill-opacity="{}" stroke="none" />"#,
            points.join(" "),
            band.fill,
            band.opacity
        )
        .ok();
    }

    for series in &panel.series {
        if series.points.is_empty() {
            continue;
        }
        let points: Vec<String> = series
            .points
            .iter()
            .map(|(x, y)| format!("{:.1},{:.1}", sx(*x), sy(*y)))
            .collect();
        let dash = series
            .dash
            .map(|d| format!(r#" stroke-dasharray="{}""#, d))
            .unwrap_or_default();
        writeln!(
            svg,
            r#"  <polyline points="{}" fill="none" stroke="{}" stroke-width="1.5"{} />"#,
            points.join(" "),
            series.stroke,
            dash
        )
        .ok();
    }

    writeln!(
        svg,
        r#"  <text class="label" x="{:.1}" y="{:.1}" text-anchor="middle" transform="rotate(-90 {:.1} {:.1})">{}</text>"#,
        left - 62.0,
        (plot_top + bottom) / 2.0,
        left - 62.0,
        (plot_top + bottom) / 2.0,
        escape(&panel.y_label)
    )
    .ok();
    if let Some(x_label) = &panel.x_label {
        writeln!(
            svg,
            r#"  <text class="label" x="{:.1}" y="{:.1}" text-anchor="middle">{}</text>"#,
            (left + right) / 2.0,
            bottom + 38.0,
            escape(x_label)
        )
        .ok();
    }

    for (i, (label, color)) in panel.legend.iter().enumerate() {
        let y = plot_top + 16.0 + i as f64 * 18.0;
        writeln!(
            svg,
            r#"  <line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{}" stroke-width="2" />"#,
            left + 12.0,
            y - 4.0,
            left + 36.0,
            y - 4.0,
            color
        )
        .ok();
        writeln!(
            svg,
            r#"  <text class="label" x="{:.1}" y="{:.1}">{}</text>"#,
            left + 42.0,
            y,
            label
        )
        .ok();
    }
}

fn svg_document(height: f64, body: impl FnOnce(&mut String)) -> String {
    let mut svg = String::new();
    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}" width="{w}" height="{h}">"#,
        w = WIDTH,
        h = height
    )
    .ok();
    writeln!(
        svg,
        r##"<style>
    .tick {{ font-family: 'Open Sans', sans-serif; font-size: 11px; fill: #555; }}
    .label {{ font-family: 'Open Sans', sans-serif; font-size: 13px; fill: #222; }}
</style>
<rect width="100%" height="100%" fill="#ffffff" />"##
    )
    .ok();
    body(&mut svg);
    writeln!(svg, "</svg>").ok();
    svg
}

/// `signups_per_day` becomes `Signups per day`
fn axis_label(metric_name: &str) -> String {
    let spaced = metric_name.replace('_', " ").to_lowercase();
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Actual series plus the dotted forecast and its band beyond the last observation
pub fn render_main_plot(metric_name: &str, data: &MainPlotData) -> String {
    let mut panel = Panel::new(axis_label(metric_name));
    panel.x_label = Some("Date".to_string());
    panel.bands.push(Band {
        points: data
            .predicted
            .iter()
            .map(|p| (days_since_epoch(p.ds) as f64, p.yhat_lower, p.yhat_upper))
            .collect(),
        fill: FORECAST_BAND,
        opacity: 0.6,
    });
    panel.series.push(Series {
        points: data
            .actual
            .iter()
            .map(|(ds, y)| (days_since_epoch(*ds) as f64, *y))
            .collect(),
        stroke: ACTUAL_COLOR,
        dash: None,
    });
    panel.series.push(Series {
        points: data
            .predicted
            .iter()
            .map(|p| (days_since_epoch(p.ds) as f64, p.yhat))
            .collect(),
        stroke: FORECAST_COLOR,
        dash: Some("2,4"),
    });
    panel.legend = vec![
        ("Actual metric", ACTUAL_COLOR),
        ("Predicted metric", FORECAST_COLOR),
    ];

    svg_document(MAIN_HEIGHT, |svg| draw_panel(svg, &panel, 0.0, MAIN_HEIGHT))
}

/// One panel per component of the model
pub fn render_components(model: &TrainedProphet, forecast: &[ForecastRow]) -> String {
    let components = Component::for_model(model);
    let height = PANEL_HEIGHT * components.len() as f64;

    svg_document(height, |svg| {
        for (i, component) in components.iter().enumerate() {
            let panel = component.panel(model, forecast);
            draw_panel(svg, &panel, i as f64 * PANEL_HEIGHT, PANEL_HEIGHT);
        }
    })
}

fn is_multiplicative(model: &TrainedProphet) -> bool {
    model.settings().seasonality_mode == SeasonalityMode::Multiplicative
}

fn trend_panel(forecast: &[ForecastRow]) -> Panel {
    let mut panel = Panel::new("trend");
    panel.x_label = Some("ds".to_string());
    panel.bands.push(Band {
        points: forecast
            .iter()
            .map(|r| (days_since_epoch(r.ds) as f64, r.trend_lower, r.trend_upper))
            .collect(),
        fill: COMPONENT_COLOR,
        opacity: 0.2,
    });
    panel.series.push(Series {
        points: forecast
            .iter()
            .map(|r| (days_since_epoch(r.ds) as f64, r.trend))
            .collect(),
        stroke: COMPONENT_COLOR,
        dash: None,
    });
    panel
}

fn holidays_panel(model: &TrainedProphet, forecast: &[ForecastRow]) -> Panel {
    let mut panel = Panel::new("holidays");
    panel.x_label = Some("ds".to_string());
    panel.percent = is_multiplicative(model);
    panel.series.push(Series {
        points: forecast
            .iter()
            .map(|r| (days_since_epoch(r.ds) as f64, r.holidays))
            .collect(),
        stroke: COMPONENT_COLOR,
        dash: None,
    });
    panel
}

fn profile_series(model: &TrainedProphet, name: &str, offsets: &[f64]) -> Series {
    let start = days_since_epoch(profile_start()) as f64;
    let t: Vec<f64> = offsets.iter().map(|o| start + o).collect();
    let values = model.seasonal_profile(name, &t).unwrap_or_default();
    Series {
        points: offsets.iter().copied().zip(values).collect(),
        stroke: COMPONENT_COLOR,
        dash: None,
    }
}

fn weekly_panel(model: &TrainedProphet) -> Panel {
    let offsets: Vec<f64> = (0..7).map(f64::from).collect();
    let mut panel = Panel::new("weekly");
    panel.x_label = Some("Day of week".to_string());
    panel.percent = is_multiplicative(model);
    panel.x_ticks = offsets
        .iter()
        .map(|o| {
            let day = profile_start() + Duration::days(*o as i64);
            (*o, day.format("%A").to_string())
        })
        .collect();
    panel.series.push(profile_series(model, "weekly", &offsets));
    panel
}

fn yearly_panel(model: &TrainedProphet) -> Panel {
    let offsets: Vec<f64> = (0..365).map(f64::from).collect();
    let mut panel = Panel::new("yearly");
    panel.x_label = Some("Day of year".to_string());
    panel.percent = is_multiplicative(model);
    panel.x_ticks = (0..365)
        .map(|o| profile_start() + Duration::days(o))
        .filter(|d| d.day() == 1 && d.month() % 2 == 1)
        .map(|d| ((d - profile_start()).num_days() as f64, d.format("%B %-d").to_string()))
        .collect();
    panel.series.push(profile_series(model, "yearly", &offsets));
    panel
}

fn seasonality_panel(model: &TrainedProphet, name: &str) -> Panel {
    let period = model
        .seasonalities()
        .iter()
        .find(|s| s.name == name)
        .map(|s| s.period)
        .unwrap_or(1.0);
    let offsets: Vec<f64> = (0..200).map(|i| period * i as f64 / 199.0).collect();

    let mut panel = Panel::new(name);
    panel.x_label = Some("Days into period".to_string());
    panel.percent = is_multiplicative(model);
    panel.x_ticks = (0..=4)
        .map(|i| {
            let x = period * i as f64 / 4.0;
            (x, format!("{:.2}", x))
        })
        .collect();
    panel.series.push(profile_series(model, name, &offsets));
    panel
}

/// Base64 of an SVG document
pub fn encode_svg(svg: &str) -> String {
    STANDARD.encode(svg.as_bytes())
}

/// `<img>` tag showing a base64-encoded SVG
pub fn img_tag(encoded_svg: &str) -> String {
    format!(r#"<img src="data:image/svg+xml;base64,{}">"#, encoded_svg)
}
