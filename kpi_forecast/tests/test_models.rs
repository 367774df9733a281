use approx::assert_relative_eq;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use kpi_forecast::models::prophet::Prophet;
use kpi_forecast::models::{ForecastModel, TrainedForecastModel};
use kpi_forecast::{
    ForecastError, Growth, Holiday, ProphetSettings, SeasonalityMode, SeasonalityToggle,
    TimeSeriesData, TrainedProphet,
};
use rstest::{fixture, rstest};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 2).unwrap()
}

fn series(days: i64, f: impl Fn(i64, NaiveDate) -> f64) -> TimeSeriesData {
    let rows = (0..days)
        .map(|i| {
            let ds = start() + Duration::days(i);
            (ds, f(i, ds))
        })
        .collect();
    TimeSeriesData::from_rows(rows).unwrap()
}

fn is_weekend(ds: NaiveDate) -> bool {
    matches!(ds.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Trend, weekend bump and a deterministic wiggle
#[fixture]
fn kpi_series() -> TimeSeriesData {
    series(100, |i, ds| {
        let weekend = if is_weekend(ds) { 15.0 } else { 0.0 };
        200.0 + 0.8 * i as f64 + weekend + 3.0 * (i as f64 * 1.7).sin()
    })
}

fn settings() -> ProphetSettings {
    ProphetSettings {
        uncertainty_samples: 300,
        ..Default::default()
    }
}

fn train(settings: ProphetSettings, data: &TimeSeriesData) -> TrainedProphet {
    Prophet::new(settings).unwrap().train(data).unwrap()
}

#[test]
fn test_linear_trend_is_extrapolated() {
    let data = series(100, |i, _| 10.0 + 0.5 * i as f64);
    let model = train(
        ProphetSettings {
            weekly_seasonality: SeasonalityToggle::Disabled,
            ..settings()
        },
        &data,
    );

    let forecast = model.forecast(10).unwrap();
    let last = forecast.rows().last().unwrap();

    assert_eq!(last.ds, start() + Duration::days(109));
    assert_relative_eq!(last.yhat, 10.0 + 0.5 * 109.0, max_relative = 1e-3);
    assert_relative_eq!(last.trend, last.yhat, max_relative = 1e-9);
}

#[rstest]
fn test_forecast_covers_history_and_horizon(kpi_series: TimeSeriesData) {
    let model = train(settings(), &kpi_series);
    let forecast = model.forecast(30).unwrap();

    assert_eq!(forecast.len(), 130);
    assert_eq!(forecast.rows()[0].ds, start());
    assert_eq!(forecast.rows()[100].ds, start() + Duration::days(100));
    assert_eq!(forecast.rows()[129].ds, start() + Duration::days(129));
    assert_eq!(model.name(), "Prophet");
}

#[rstest]
fn test_weekly_seasonality_is_recovered(kpi_series: TimeSeriesData) {
    let model = train(settings(), &kpi_series);
    let forecast = model.forecast(14).unwrap();

    let names: Vec<&String> = forecast.rows()[0].seasonal.keys().collect();
    assert_eq!(names, vec!["weekly"]);
    assert_eq!(model.changepoints().len(), 25);

    let mean_effect = |weekend: bool| {
        let values: Vec<f64> = forecast
            .rows()
            .iter()
            .filter(|r| is_weekend(r.ds) == weekend)
            .map(|r| r.seasonal["weekly"])
            .collect();
        values.iter().sum::<f64>() / values.len() as f64
    };
    assert!(mean_effect(true) - mean_effect(false) > 10.0);

    for row in forecast.rows() {
        assert_relative_eq!(
            row.yhat,
            row.trend + row.additive_terms,
            max_relative = 1e-9,
            epsilon = 1e-9
        );
        assert_eq!(row.multiplicative_terms, 0.0);
    }
}

#[rstest]
fn test_uncertainty_intervals(kpi_series: TimeSeriesData) {
    let model = train(settings(), &kpi_series);
    let forecast = model.forecast(30).unwrap();

    for row in forecast.rows() {
        assert!(row.yhat_lower <= row.yhat && row.yhat <= row.yhat_upper, "{:?}", row);
        assert!(row.trend_lower <= row.trend_upper);
    }
    for row in &forecast.rows()[..100] {
        assert_eq!(row.trend_lower, row.trend);
        assert_eq!(row.trend_upper, row.trend);
    }

    let rows = forecast.rows();
    let first_width = rows[100].yhat_upper - rows[100].yhat_lower;
    let last_width = rows[129].yhat_upper - rows[129].yhat_lower;
    assert!(last_width >= first_width);
}

#[rstest]
fn test_same_seed_same_forecast(kpi_series: TimeSeriesData) {
    let a = train(settings(), &kpi_series).forecast(7).unwrap();
    let b = train(settings(), &kpi_series).forecast(7).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_no_uncertainty_samples_collapses_bounds() {
    let data = series(30, |i, _| 50.0 + i as f64);
    let model = train(
        ProphetSettings {
            uncertainty_samples: 0,
            ..Default::default()
        },
        &data,
    );
    for row in model.forecast(5).unwrap().rows() {
        assert_eq!(row.yhat_lower, row.yhat);
        assert_eq!(row.yhat_upper, row.yhat);
    }
}

#[test]
fn test_holiday_effect() {
    let promo_days = vec![start() + Duration::days(20), start() + Duration::days(55)];
    let data = series(90, |i, ds| {
        let bump = if promo_days.contains(&ds) { 60.0 } else { 0.0 };
        100.0 + 0.2 * i as f64 + bump
    });
    let model = train(
        ProphetSettings {
            holidays: vec![Holiday::new("promo", promo_days.clone())],
            weekly_seasonality: SeasonalityToggle::Disabled,
            ..settings()
        },
        &data,
    );

    assert!(model.has_holidays());
    let forecast = model.forecast(0).unwrap();
    let row = |ds: NaiveDate| forecast.rows().iter().find(|r| r.ds == ds).unwrap();
    let on_promo = row(promo_days[0]);
    let ordinary = row(start() + Duration::days(30));

    assert!(on_promo.holidays > 40.0, "{}", on_promo.holidays);
    assert_eq!(ordinary.holidays, 0.0);
}

#[test]
fn test_multiplicative_mode() {
    let data = series(100, |i, ds| {
        let level = 100.0 + 2.0 * i as f64;
        if is_weekend(ds) {
            level * 1.3
        } else {
            level
        }
    });
    let model = train(
        ProphetSettings {
            seasonality_mode: SeasonalityMode::Multiplicative,
            ..settings()
        },
        &data,
    );
    let forecast = model.forecast(7).unwrap();

    for row in forecast.rows() {
        assert_eq!(row.additive_terms, 0.0);
        assert_relative_eq!(
            row.yhat,
            row.trend * (1.0 + row.multiplicative_terms),
            max_relative = 1e-9
        );
    }
    let saturday = forecast
        .rows()
        .iter()
        .find(|r| r.ds.weekday() == Weekday::Sat)
        .unwrap();
    assert!(saturday.multiplicative_terms > 0.1);
}

#[test]
fn test_logistic_growth_stays_below_capacity() {
    let data = series(120, |i, _| 1000.0 / (1.0 + (-(i as f64 - 60.0) / 15.0).exp()) + 10.0);
    let model = train(
        ProphetSettings {
            growth: Growth::Logistic,
            capacity: Some(1100.0),
            weekly_seasonality: SeasonalityToggle::Disabled,
            ..settings()
        },
        &data,
    );
    let forecast = model.forecast(60).unwrap();

    for row in forecast.rows() {
        assert!(row.trend < 1100.0 && row.trend > 0.0);
        assert!(row.trend_upper < 1100.0);
    }
}

#[test]
fn test_logistic_growth_rejects_values_above_capacity() {
    let data = series(30, |i, _| 100.0 + i as f64);
    let result = Prophet::new(ProphetSettings {
        growth: Growth::Logistic,
        capacity: Some(110.0),
        ..Default::default()
    })
    .unwrap()
    .train(&data);

    assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
}

#[test]
fn test_explicit_changepoints() {
    let data = series(60, |i, _| if i < 30 { 100.0 } else { 100.0 + 3.0 * (i - 30) as f64 });
    let inside = start() + Duration::days(30);
    let model = train(
        ProphetSettings {
            changepoints: Some(vec![inside]),
            weekly_seasonality: SeasonalityToggle::Disabled,
            ..settings()
        },
        &data,
    );
    assert_eq!(model.changepoints(), &[inside]);

    let outside = start() + Duration::days(200);
    let result = Prophet::new(ProphetSettings {
        changepoints: Some(vec![outside]),
        ..Default::default()
    })
    .unwrap()
    .train(&data);
    assert!(matches!(result, Err(ForecastError::InvalidParameter(_))));
}

#[test]
fn test_too_little_history() {
    let data = series(1, |_, _| 5.0);
    let result = Prophet::default().train(&data);
    assert!(matches!(result, Err(ForecastError::DataError(_))));
}

#[rstest]
fn test_model_survives_serialization(kpi_series: TimeSeriesData) {
    let model = train(settings(), &kpi_series);
    let json = serde_json::to_string(&model).unwrap();
    let restored: TrainedProphet = serde_json::from_str(&json).unwrap();

    let before = model.forecast(10).unwrap();
    let after = restored.forecast(10).unwrap();
    assert_eq!(before.len(), after.len());
    for (a, b) in before.rows().iter().zip(after.rows()) {
        assert_eq!(a.ds, b.ds);
        assert_relative_eq!(a.yhat, b.yhat, max_relative = 1e-9);
        assert_relative_eq!(a.yhat_upper, b.yhat_upper, max_relative = 1e-6);
    }
    assert_eq!(restored.history().unwrap().len(), 100);
}

#[rstest]
fn test_weekly_profile_matches_components(kpi_series: TimeSeriesData) {
    let model = train(settings(), &kpi_series);
    let forecast = model.forecast(0).unwrap();
    let row = &forecast.rows()[10];
    let t = kpi_forecast::data::days_since_epoch(row.ds) as f64;

    let profile = model.seasonal_profile("weekly", &[t]).unwrap();
    assert_relative_eq!(profile[0], row.seasonal["weekly"], max_relative = 1e-9, epsilon = 1e-9);
    assert!(model.seasonal_profile("yearly", &[t]).is_none());
}
