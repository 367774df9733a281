//! Decomposable trend, seasonality and holiday model
//!
//! The fitted value is
//!
//! ```text
//! y(t) = trend(t) * (1 + multiplicative(t)) + additive(t) + noise
//! ```
//!
//! where the trend is piecewise linear (or piecewise logistic) with slope
//! changes at changepoints, seasonalities are Fourier series and every
//! holiday day gets its own indicator. All coefficients are fitted jointly by
//! regularised least squares; uncertainty intervals come from simulating
//! future trend changes and observation noise.

use super::settings::{Growth, ProphetSettings, SeasonalityMode, SeasonalityToggle};
use super::{ForecastFrame, ForecastModel, ForecastRow, TrainedForecastModel};
use crate::data::{days_since_epoch, TimeSeriesData};
use crate::error::{ForecastError, Result};
use crate::utils::{future_dates, linspace_indices, min_spacing_days};
use chrono::{Duration, NaiveDate};
use forecast_math::fourier::{evaluate, fourier_features};
use forecast_math::regression::{linear_fit, ridge_regression};
use forecast_math::statistics::{mean, percentile_sorted};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Poisson;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Laplace, Normal};
use std::collections::BTreeMap;
use tracing::debug;

const YEARLY_PERIOD: f64 = 365.25;
const WEEKLY_PERIOD: f64 = 7.0;
const DAILY_PERIOD: f64 = 1.0;

const YEARLY_ORDER: usize = 10;
const WEEKLY_ORDER: usize = 3;
const DAILY_ORDER: usize = 4;

/// Floor for variances used as regularisation weights and noise levels
const MIN_VARIANCE: f64 = 1e-8;

/// Decomposable forecasting model (untrained)
#[derive(Debug, Clone)]
pub struct Prophet {
    /// Model settings
    settings: ProphetSettings,
    /// Model name
    name: String,
}

impl Prophet {
    /// Create a model with the given settings
    pub fn new(settings: ProphetSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            name: "Prophet".to_string(),
        })
    }

    /// Get the settings
    pub fn settings(&self) -> &ProphetSettings {
        &self.settings
    }
}

impl Default for Prophet {
    fn default() -> Self {
        Self {
            settings: ProphetSettings::default(),
            name: "Prophet".to_string(),
        }
    }
}

impl ForecastModel for Prophet {
    type Trained = TrainedProphet;

    fn train(&self, data: &TimeSeriesData) -> Result<Self::Trained> {
        fit(&self.settings, data, &self.name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A fitted seasonal component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seasonality {
    /// Component name (`yearly`, `weekly`, `daily`)
    pub name: String,
    /// Period in days
    pub period: f64,
    /// Number of Fourier harmonics
    pub fourier_order: usize,
    /// `sin, cos` coefficient pairs, one per harmonic
    pub coefficients: Vec<f64>,
}

/// Indicator of one holiday at one offset from its dates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayTerm {
    /// Holiday name
    pub holiday: String,
    /// Offset in days from the holiday date
    pub offset: i32,
    /// Dates on which the indicator is one
    pub dates: Vec<NaiveDate>,
    /// Regularisation scale
    pub prior_scale: f64,
    /// Fitted effect
    pub coefficient: f64,
}

/// Piecewise trend in scaled time: `m + k·t + Σ δⱼ·(t − sⱼ)₊`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendParams {
    /// Initial slope
    pub k: f64,
    /// Offset
    pub m: f64,
    /// Slope change at each changepoint
    pub deltas: Vec<f64>,
    /// Changepoints in scaled time
    pub changepoints_t: Vec<f64>,
}

impl TrendParams {
    fn piecewise(&self, t: f64) -> f64 {
        self.m
            + self.k * t
            + self
                .deltas
                .iter()
                .zip(&self.changepoints_t)
                .map(|(d, s)| d * (t - s).max(0.0))
                .sum::<f64>()
    }
}

/// Point estimates in model units for a list of dates
struct Decomposition {
    t: Vec<f64>,
    trend: Vec<f64>,
    seasonal: BTreeMap<String, Vec<f64>>,
    holidays: Vec<f64>,
    additive: Vec<f64>,
    multiplicative: Vec<f64>,
    yhat: Vec<f64>,
}

/// Lower and upper bounds in model units
struct Bounds {
    trend_lower: f64,
    trend_upper: f64,
    yhat_lower: f64,
    yhat_upper: f64,
}

/// A fitted decomposable model.
///
/// Holds its settings and training history so that it can be persisted,
/// reloaded and refitted on a prefix of the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedProphet {
    name: String,
    settings: ProphetSettings,
    history: Vec<(NaiveDate, f64)>,
    start: NaiveDate,
    t_span_days: f64,
    y_scale: f64,
    capacity_scaled: Option<f64>,
    changepoints: Vec<NaiveDate>,
    trend: TrendParams,
    seasonalities: Vec<Seasonality>,
    holiday_terms: Vec<HolidayTerm>,
    sigma_obs: f64,
}

fn fit(settings: &ProphetSettings, data: &TimeSeriesData, name: &str) -> Result<TrainedProphet> {
    settings.validate()?;

    let history = data.rows()?;
    if history.len() < 2 {
        return Err(ForecastError::DataError(
            "Dataframe has less than 2 non-NaN rows".to_string(),
        ));
    }

    let dates: Vec<NaiveDate> = history.iter().map(|(d, _)| *d).collect();
    let start = dates[0];
    let end = dates[dates.len() - 1];
    let span_days = (end - start).num_days();
    if span_days <= 0 {
        return Err(ForecastError::DataError(
            "History must cover at least two distinct dates".to_string(),
        ));
    }
    let t_span_days = span_days as f64;
    let t: Vec<f64> = dates
        .iter()
        .map(|d| (*d - start).num_days() as f64 / t_span_days)
        .collect();

    let y_scale = match history.iter().fold(0.0_f64, |acc, (_, v)| acc.max(v.abs())) {
        s if s > 0.0 => s,
        _ => 1.0,
    };
    let y: Vec<f64> = history.iter().map(|(_, v)| v / y_scale).collect();

    let capacity_scaled = match settings.growth {
        Growth::Linear => None,
        Growth::Logistic => settings.capacity.map(|cap| cap / y_scale),
    };

    let changepoints = place_changepoints(settings, &dates)?;
    let changepoints_t: Vec<f64> = changepoints
        .iter()
        .map(|d| (*d - start).num_days() as f64 / t_span_days)
        .collect();

    let min_spacing = min_spacing_days(&dates).unwrap_or(0);
    let mut seasonalities = seasonality_specs(settings, span_days, min_spacing);
    let mut holiday_terms = expand_holidays(settings);

    debug!(
        observations = dates.len(),
        changepoints = changepoints.len(),
        seasonalities = seasonalities.len(),
        holiday_terms = holiday_terms.len(),
        growth = %settings.growth,
        "Fitting model"
    );

    // Trend target: the values themselves, or their logits under a capacity
    let trend_target: Vec<f64> = match capacity_scaled {
        None => y.clone(),
        Some(cap) => y
            .iter()
            .map(|v| {
                let ratio = v / cap;
                if ratio > 0.0 && ratio < 1.0 {
                    Ok((ratio / (1.0 - ratio)).ln())
                } else {
                    Err(ForecastError::InvalidParameter(
                        "Logistic growth needs every observation strictly between 0 and the capacity"
                            .to_string(),
                    ))
                }
            })
            .collect::<Result<Vec<f64>>>()?,
    };

    let initial = linear_fit(&t, &trend_target)?;
    let initial_trend: Vec<f64> = t.iter().map(|x| initial.at(*x)).collect();
    let trend_var = residual_variance(&trend_target, &initial_trend);

    let trend_rows: Vec<Vec<f64>> = t
        .iter()
        .map(|&x| {
            let mut row = vec![1.0, x];
            row.extend(changepoints_t.iter().map(|s| (x - s).max(0.0)));
            row
        })
        .collect();
    let mut trend_penalties = vec![0.0, 0.0];
    trend_penalties.extend(
        changepoints_t
            .iter()
            .map(|_| trend_var / settings.changepoint_prior_scale.powi(2)),
    );

    let t_epoch: Vec<f64> = dates.iter().map(|d| days_since_epoch(*d) as f64).collect();
    let raw_features = feature_rows(&seasonalities, &holiday_terms, &dates, &t_epoch);
    let feature_penalty_scales = feature_prior_scales(settings, &seasonalities, &holiday_terms);

    let (trend, feature_coefficients) = match capacity_scaled {
        None => {
            // One joint fit; multiplicative features are scaled by a trend guess
            let features = scale_features(settings, raw_features, &initial_trend);
            let rows: Vec<Vec<f64>> = trend_rows
                .iter()
                .zip(&features)
                .map(|(tr, fr)| tr.iter().chain(fr).copied().collect())
                .collect();
            let mut penalties = trend_penalties.clone();
            penalties.extend(
                feature_penalty_scales
                    .iter()
                    .map(|scale| trend_var / scale.powi(2)),
            );

            let beta = ridge_regression(&rows, &y, &penalties)?;
            let n_trend = trend_penalties.len();
            (
                TrendParams {
                    m: beta[0],
                    k: beta[1],
                    deltas: beta[2..n_trend].to_vec(),
                    changepoints_t: changepoints_t.clone(),
                },
                beta[n_trend..].to_vec(),
            )
        }
        Some(cap) => {
            // Trend on the logit scale first, then effects on what it leaves
            let beta = ridge_regression(&trend_rows, &trend_target, &trend_penalties)?;
            let trend = TrendParams {
                m: beta[0],
                k: beta[1],
                deltas: beta[2..].to_vec(),
                changepoints_t: changepoints_t.clone(),
            };
            let fitted_trend: Vec<f64> = t
                .iter()
                .map(|x| logistic(cap, trend.piecewise(*x)))
                .collect();

            let coefficients = if feature_penalty_scales.is_empty() {
                Vec::new()
            } else {
                let residual: Vec<f64> =
                    y.iter().zip(&fitted_trend).map(|(v, tr)| v - tr).collect();
                let residual_var = residual_variance(&y, &fitted_trend);
                let features = scale_features(settings, raw_features, &fitted_trend);
                let penalties: Vec<f64> = feature_penalty_scales
                    .iter()
                    .map(|scale| residual_var / scale.powi(2))
                    .collect();
                ridge_regression(&features, &residual, &penalties)?
            };
            (trend, coefficients)
        }
    };

    let mut offset = 0;
    for seasonality in &mut seasonalities {
        let width = 2 * seasonality.fourier_order;
        seasonality.coefficients = feature_coefficients[offset..offset + width].to_vec();
        offset += width;
    }
    for term in &mut holiday_terms {
        term.coefficient = feature_coefficients[offset];
        offset += 1;
    }

    let mut model = TrainedProphet {
        name: name.to_string(),
        settings: settings.clone(),
        history,
        start,
        t_span_days,
        y_scale,
        capacity_scaled,
        changepoints,
        trend,
        seasonalities,
        holiday_terms,
        sigma_obs: 0.0,
    };

    let fitted = model.decompose(&dates);
    let mse = residual_variance(&y, &fitted.yhat);
    model.sigma_obs = mse.sqrt();
    debug!(sigma_obs = model.sigma_obs, "Model fitted");

    Ok(model)
}

/// Mean squared difference, floored at [`MIN_VARIANCE`]
fn residual_variance(actual: &[f64], fitted: &[f64]) -> f64 {
    let squares: Vec<f64> = actual
        .iter()
        .zip(fitted)
        .map(|(a, f)| (a - f).powi(2))
        .collect();
    mean(&squares).unwrap_or(0.0).max(MIN_VARIANCE)
}

fn logistic(capacity: f64, x: f64) -> f64 {
    capacity / (1.0 + (-x).exp())
}

fn place_changepoints(settings: &ProphetSettings, dates: &[NaiveDate]) -> Result<Vec<NaiveDate>> {
    let first = dates[0];
    let last = dates[dates.len() - 1];

    if let Some(explicit) = &settings.changepoints {
        if let Some(outside) = explicit.iter().find(|d| **d < first || **d > last) {
            return Err(ForecastError::InvalidParameter(format!(
                "Changepoint {} is outside the training data ({} to {})",
                outside, first, last
            )));
        }
        let mut sorted = explicit.clone();
        sorted.sort();
        sorted.dedup();
        return Ok(sorted);
    }

    let hist_size = (dates.len() as f64 * settings.changepoint_range).floor() as usize;
    let count = settings.n_changepoints.min(hist_size.saturating_sub(1));
    if count == 0 {
        return Ok(Vec::new());
    }

    Ok(linspace_indices(hist_size - 1, count + 1)
        .into_iter()
        .skip(1)
        .map(|i| dates[i])
        .collect())
}

fn seasonality_specs(settings: &ProphetSettings, span_days: i64, min_spacing: i64) -> Vec<Seasonality> {
    let candidates = [
        (
            "yearly",
            YEARLY_PERIOD,
            settings.yearly_seasonality,
            YEARLY_ORDER,
            span_days >= 730,
        ),
        (
            "weekly",
            WEEKLY_PERIOD,
            settings.weekly_seasonality,
            WEEKLY_ORDER,
            span_days >= 14 && min_spacing < 7,
        ),
        (
            "daily",
            DAILY_PERIOD,
            settings.daily_seasonality,
            DAILY_ORDER,
            span_days >= 2 && min_spacing < 1,
        ),
    ];

    candidates
        .into_iter()
        .filter_map(|(name, period, toggle, default_order, auto)| {
            toggle.resolve(auto, default_order).map(|order| Seasonality {
                name: name.to_string(),
                period,
                fourier_order: order,
                coefficients: vec![0.0; 2 * order],
            })
        })
        .collect()
}

fn expand_holidays(settings: &ProphetSettings) -> Vec<HolidayTerm> {
    settings
        .holidays
        .iter()
        .flat_map(|holiday| {
            (holiday.lower_window..=holiday.upper_window).map(move |offset| HolidayTerm {
                holiday: holiday.name.clone(),
                offset,
                dates: holiday
                    .dates
                    .iter()
                    .map(|d| *d + Duration::days(offset as i64))
                    .collect(),
                prior_scale: holiday.prior_scale,
                coefficient: 0.0,
            })
        })
        .collect()
}

/// Seasonal Fourier terms followed by holiday indicators, one row per date
fn feature_rows(
    seasonalities: &[Seasonality],
    holiday_terms: &[HolidayTerm],
    dates: &[NaiveDate],
    t_epoch: &[f64],
) -> Vec<Vec<f64>> {
    let fourier: Vec<Vec<Vec<f64>>> = seasonalities
        .iter()
        .map(|s| fourier_features(t_epoch, s.period, s.fourier_order))
        .collect();

    dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let mut row: Vec<f64> = fourier.iter().flat_map(|f| f[i].iter().copied()).collect();
            row.extend(
                holiday_terms
                    .iter()
                    .map(|term| if term.dates.contains(date) { 1.0 } else { 0.0 }),
            );
            row
        })
        .collect()
}

fn feature_prior_scales(
    settings: &ProphetSettings,
    seasonalities: &[Seasonality],
    holiday_terms: &[HolidayTerm],
) -> Vec<f64> {
    let seasonal = seasonalities
        .iter()
        .flat_map(|s| std::iter::repeat(settings.seasonality_prior_scale).take(2 * s.fourier_order));
    seasonal
        .chain(holiday_terms.iter().map(|term| term.prior_scale))
        .collect()
}

fn scale_features(settings: &ProphetSettings, rows: Vec<Vec<f64>>, trend: &[f64]) -> Vec<Vec<f64>> {
    match settings.seasonality_mode {
        SeasonalityMode::Additive => rows,
        SeasonalityMode::Multiplicative => rows
            .into_iter()
            .zip(trend)
            .map(|(row, tr)| row.into_iter().map(|x| x * tr).collect())
            .collect(),
    }
}

impl TrainedProphet {
    /// Get the settings the model was fitted with
    pub fn settings(&self) -> &ProphetSettings {
        &self.settings
    }

    /// Training history, in model units
    pub fn history(&self) -> Result<TimeSeriesData> {
        TimeSeriesData::from_rows(self.history.clone())
    }

    /// Dates of the training history
    pub fn history_dates(&self) -> Vec<NaiveDate> {
        self.history.iter().map(|(d, _)| *d).collect()
    }

    /// Changepoints used by the trend
    pub fn changepoints(&self) -> &[NaiveDate] {
        &self.changepoints
    }

    /// Fitted seasonal components
    pub fn seasonalities(&self) -> &[Seasonality] {
        &self.seasonalities
    }

    /// Fitted holiday indicators
    pub fn holiday_terms(&self) -> &[HolidayTerm] {
        &self.holiday_terms
    }

    /// Whether the model carries any holiday effect
    pub fn has_holidays(&self) -> bool {
        !self.holiday_terms.is_empty()
    }

    /// Residual noise level, in the units of the fitted values
    pub fn sigma_obs(&self) -> f64 {
        self.sigma_obs * self.y_scale
    }

    /// Fit a fresh model on the history up to `cutoff`.
    ///
    /// Explicit changepoints on or after the cutoff are dropped, and the
    /// seasonal components are pinned to the ones this model resolved so
    /// that a short prefix does not switch any of them off.
    pub fn refit_until(&self, cutoff: NaiveDate, data: &TimeSeriesData) -> Result<TrainedProphet> {
        let pinned = |name: &str| {
            self.seasonalities
                .iter()
                .find(|s| s.name == name)
                .map_or(SeasonalityToggle::Disabled, |s| {
                    SeasonalityToggle::FourierOrder(s.fourier_order)
                })
        };
        let settings = ProphetSettings {
            changepoints: self.settings.changepoints.as_ref().map(|explicit| {
                explicit.iter().filter(|d| **d < cutoff).copied().collect()
            }),
            yearly_seasonality: pinned("yearly"),
            weekly_seasonality: pinned("weekly"),
            daily_seasonality: pinned("daily"),
            ..self.settings.clone()
        };
        fit(&settings, data, &self.name)
    }

    /// Value of one seasonal component at the given times (days since the
    /// Unix epoch). Additive components are in the units of the fitted
    /// values, multiplicative ones are relative to the trend.
    pub fn seasonal_profile(&self, name: &str, t_days: &[f64]) -> Option<Vec<f64>> {
        let seasonality = self.seasonalities.iter().find(|s| s.name == name)?;
        let values = evaluate(t_days, seasonality.period, &seasonality.coefficients);
        Some(values.into_iter().map(|v| self.unscale_effect(v)).collect())
    }

    fn unscale_effect(&self, value: f64) -> f64 {
        match self.settings.seasonality_mode {
            SeasonalityMode::Additive => value * self.y_scale,
            SeasonalityMode::Multiplicative => value,
        }
    }

    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.t_span_days
    }

    fn trend_at(&self, t: f64, shift: f64) -> f64 {
        let x = self.trend.piecewise(t) + shift;
        match self.capacity_scaled {
            None => x,
            Some(cap) => logistic(cap, x),
        }
    }

    fn decompose(&self, dates: &[NaiveDate]) -> Decomposition {
        let t: Vec<f64> = dates.iter().map(|d| self.scaled_time(*d)).collect();
        let t_epoch: Vec<f64> = dates.iter().map(|d| days_since_epoch(*d) as f64).collect();
        let trend: Vec<f64> = t.iter().map(|x| self.trend_at(*x, 0.0)).collect();

        let seasonal: BTreeMap<String, Vec<f64>> = self
            .seasonalities
            .iter()
            .map(|s| (s.name.clone(), evaluate(&t_epoch, s.period, &s.coefficients)))
            .collect();
        let holidays: Vec<f64> = dates
            .iter()
            .map(|date| {
                self.holiday_terms
                    .iter()
                    .filter(|term| term.dates.contains(date))
                    .map(|term| term.coefficient)
                    .sum()
            })
            .collect();

        let effects: Vec<f64> = (0..dates.len())
            .map(|i| holidays[i] + seasonal.values().map(|v| v[i]).sum::<f64>())
            .collect();
        let (additive, multiplicative) = match self.settings.seasonality_mode {
            SeasonalityMode::Additive => (effects, vec![0.0; dates.len()]),
            SeasonalityMode::Multiplicative => (vec![0.0; dates.len()], effects),
        };
        let yhat = (0..dates.len())
            .map(|i| trend[i] * (1.0 + multiplicative[i]) + additive[i])
            .collect();

        Decomposition {
            t,
            trend,
            seasonal,
            holidays,
            additive,
            multiplicative,
            yhat,
        }
    }

    /// Percentile bounds of simulated trend and observation paths.
    ///
    /// Beyond the history, each path draws a Poisson number of new
    /// changepoints at the historical rate with Laplace slope changes whose
    /// scale is the mean absolute fitted change. Within the history the trend
    /// bounds collapse onto the trend.
    fn sample_bounds(&self, dec: &Decomposition) -> Result<Vec<Bounds>> {
        let n = dec.t.len();
        let samples = self.settings.uncertainty_samples;
        if samples == 0 {
            return Ok((0..n)
                .map(|i| Bounds {
                    trend_lower: dec.trend[i],
                    trend_upper: dec.trend[i],
                    yhat_lower: dec.yhat[i],
                    yhat_upper: dec.yhat[i],
                })
                .collect());
        }

        let t_max = dec.t.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let rate = self.trend.changepoints_t.len() as f64;
        let abs_deltas: Vec<f64> = self.trend.deltas.iter().map(|d| d.abs()).collect();
        let delta_scale = mean(&abs_deltas).unwrap_or(0.0) + 1e-8;

        let laplace = Laplace::new(0.0, delta_scale)
            .map_err(|e| ForecastError::ForecastingError(e.to_string()))?;
        let noise = Normal::new(0.0, self.sigma_obs.max(MIN_VARIANCE))
            .map_err(|e| ForecastError::ForecastingError(e.to_string()))?;
        let poisson = if t_max > 1.0 && rate > 0.0 {
            Some(
                Poisson::new(rate * (t_max - 1.0))
                    .map_err(|e| ForecastError::ForecastingError(e.to_string()))?,
            )
        } else {
            None
        };

        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let mut trend_paths = vec![Vec::with_capacity(samples); n];
        let mut yhat_paths = vec![Vec::with_capacity(samples); n];

        for _ in 0..samples {
            let new_changes: Vec<(f64, f64)> = match &poisson {
                Some(p) => {
                    let count = p.sample(&mut rng) as usize;
                    (0..count)
                        .map(|_| (rng.gen_range(1.0..t_max), laplace.sample(&mut rng)))
                        .collect()
                }
                None => Vec::new(),
            };

            for i in 0..n {
                let t = dec.t[i];
                let shift: f64 = new_changes
                    .iter()
                    .map(|(s, delta)| delta * (t - s).max(0.0))
                    .sum();
                let trend = if shift == 0.0 {
                    dec.trend[i]
                } else {
                    self.trend_at(t, shift)
                };
                let yhat = trend * (1.0 + dec.multiplicative[i])
                    + dec.additive[i]
                    + noise.sample(&mut rng);
                trend_paths[i].push(trend);
                yhat_paths[i].push(yhat);
            }
        }

        let lower_q = (1.0 - self.settings.interval_width) / 2.0;
        let upper_q = 1.0 - lower_q;
        trend_paths
            .into_iter()
            .zip(yhat_paths)
            .map(|(mut trend, mut yhat)| {
                trend.sort_by(f64::total_cmp);
                yhat.sort_by(f64::total_cmp);
                Ok(Bounds {
                    trend_lower: percentile_sorted(&trend, lower_q)?,
                    trend_upper: percentile_sorted(&trend, upper_q)?,
                    yhat_lower: percentile_sorted(&yhat, lower_q)?,
                    yhat_upper: percentile_sorted(&yhat, upper_q)?,
                })
            })
            .collect()
    }
}

impl TrainedForecastModel for TrainedProphet {
    fn predict(&self, dates: &[NaiveDate]) -> Result<ForecastFrame> {
        let dec = self.decompose(dates);
        let bounds = self.sample_bounds(&dec)?;
        let s = self.y_scale;

        let rows = dates
            .iter()
            .enumerate()
            .zip(bounds)
            .map(|((i, ds), b)| ForecastRow {
                ds: *ds,
                trend: dec.trend[i] * s,
                trend_lower: b.trend_lower * s,
                trend_upper: b.trend_upper * s,
                yhat: dec.yhat[i] * s,
                yhat_lower: b.yhat_lower * s,
                yhat_upper: b.yhat_upper * s,
                additive_terms: dec.additive[i] * s,
                multiplicative_terms: dec.multiplicative[i],
                holidays: self.unscale_effect(dec.holidays[i]),
                seasonal: dec
                    .seasonal
                    .iter()
                    .map(|(name, values)| (name.clone(), self.unscale_effect(values[i])))
                    .collect(),
            })
            .collect();

        let frame = ForecastFrame::new(rows);
        frame.validate()?;
        Ok(frame)
    }

    fn make_future_dates(&self, periods: usize) -> Vec<NaiveDate> {
        let mut dates = self.history_dates();
        if let Some(last) = dates.last().copied() {
            dates.extend(future_dates(last, periods));
        }
        dates
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::{Holiday, SeasonalityToggle};

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + Duration::days(n)
    }

    #[test]
    fn test_changepoints_spread_over_leading_range() {
        let dates: Vec<NaiveDate> = (0..100).map(day).collect();
        let cps = place_changepoints(&ProphetSettings::default(), &dates).unwrap();

        assert_eq!(cps.len(), 25);
        assert!(cps[0] > dates[0]);
        assert_eq!(*cps.last().unwrap(), dates[79]);
    }

    #[test]
    fn test_changepoints_limited_by_history() {
        let dates: Vec<NaiveDate> = (0..5).map(day).collect();
        let cps = place_changepoints(&ProphetSettings::default(), &dates).unwrap();
        assert_eq!(cps.len(), 3);
    }

    #[test]
    fn test_seasonality_auto_rules() {
        let settings = ProphetSettings::default();
        let names = |span, spacing| -> Vec<String> {
            seasonality_specs(&settings, span, spacing)
                .into_iter()
                .map(|s| s.name)
                .collect()
        };

        assert_eq!(names(99, 1), vec!["weekly"]);
        assert_eq!(names(800, 1), vec!["yearly", "weekly"]);
        assert_eq!(names(800, 7), vec!["yearly"]);
        assert!(names(10, 1).is_empty());
    }

    #[test]
    fn test_explicit_order() {
        let settings = ProphetSettings {
            weekly_seasonality: SeasonalityToggle::FourierOrder(2),
            ..Default::default()
        };
        let specs = seasonality_specs(&settings, 5, 1);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].coefficients.len(), 4);
    }

    #[test]
    fn test_holiday_window_expansion() {
        let settings = ProphetSettings {
            holidays: vec![Holiday::new("launch", vec![day(10)]).with_window(-1, 2)],
            ..Default::default()
        };
        let terms = expand_holidays(&settings);

        assert_eq!(terms.len(), 4);
        assert_eq!(terms[0].offset, -1);
        assert_eq!(terms[0].dates, vec![day(9)]);
        assert_eq!(terms[3].dates, vec![day(12)]);
    }
}
