use chrono::{Duration, NaiveDate};
use kpi_forecast::diagnostics::{
    cross_validation, generate_cutoffs, performance_metrics, CrossValidationWindows,
};
use kpi_forecast::models::prophet::{Prophet, TrainedProphet};
use kpi_forecast::models::ForecastModel;
use kpi_forecast::{ProphetSettings, TimeSeriesData};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 3, 1).unwrap() + Duration::days(n)
}

#[rstest]
#[case::contiguous((0..120).collect(), 10, 10, 60, vec![69, 79, 89, 99, 109])]
#[case::gap_moves_cutoff_back(
    (0..=50).chain(80..120).collect(),
    10,
    10,
    20,
    vec![20, 30, 40, 79, 89, 99, 109]
)]
fn test_generate_cutoffs(
    #[case] days: Vec<i64>,
    #[case] horizon: i64,
    #[case] period: i64,
    #[case] initial: i64,
    #[case] expected: Vec<i64>,
) {
    let dates: Vec<NaiveDate> = days.into_iter().map(day).collect();
    let windows = CrossValidationWindows::new(horizon, Some(period), Some(initial)).unwrap();

    let cutoffs = generate_cutoffs(&dates, &windows).unwrap();
    assert_eq!(cutoffs, expected.into_iter().map(day).collect::<Vec<_>>());
}

#[test]
fn test_cross_validation_and_metrics() {
    let rows = (0..120)
        .map(|i| (day(i), 50.0 + 0.5 * i as f64 + 2.0 * (i as f64 * 0.9).sin()))
        .collect();
    let data = TimeSeriesData::from_rows(rows).unwrap();
    let model = Prophet::new(ProphetSettings {
        uncertainty_samples: 100,
        ..Default::default()
    })
    .unwrap()
    .train(&data)
    .unwrap();

    let windows = CrossValidationWindows::new(10, Some(10), Some(60)).unwrap();
    let cv = cross_validation(&model, &windows).unwrap();

    assert_eq!(cv.len(), 50);
    assert_eq!(cv[0].cutoff, day(69));
    assert_eq!(cv[0].ds, day(70));
    assert!(cv.iter().all(|r| r.ds > r.cutoff && r.horizon_days() <= 10));
    assert!(cv.iter().all(|r| r.yhat_lower <= r.yhat_upper));

    let metrics = performance_metrics(&cv).unwrap();
    let horizons: Vec<i64> = metrics.iter().map(|m| m.horizon_days).collect();
    assert_eq!(horizons, (1..=10).collect::<Vec<_>>());
    for m in &metrics {
        assert!(m.mse >= 0.0);
        assert!((m.rmse - m.mse.sqrt()).abs() < 1e-12);
        assert!(m.mape < 0.2);
        assert!((0.0..=1.0).contains(&m.coverage));
    }
}

#[test]
fn test_cross_validation_needs_history() {
    let rows = (0..20).map(|i| (day(i), 10.0 + i as f64)).collect();
    let data = TimeSeriesData::from_rows(rows).unwrap();
    let model = Prophet::default().train(&data).unwrap();

    let windows = CrossValidationWindows::new(30, None, None).unwrap();
    assert!(cross_validation(&model, &windows).is_err());
}

#[test]
fn test_folds_keep_resolved_seasonalities() {
    let rows = (0..800)
        .map(|i| {
            let t = i as f64;
            (
                day(i),
                100.0 + 0.05 * t + 8.0 * (2.0 * std::f64::consts::PI * t / 365.25).sin(),
            )
        })
        .collect();
    let data = TimeSeriesData::from_rows(rows).unwrap();
    let model = Prophet::new(ProphetSettings {
        uncertainty_samples: 20,
        ..Default::default()
    })
    .unwrap()
    .train(&data)
    .unwrap();
    let names = |m: &TrainedProphet| -> Vec<String> {
        m.seasonalities().iter().map(|s| s.name.clone()).collect()
    };
    assert_eq!(names(&model), vec!["yearly", "weekly"]);

    let first_fold = model.refit_until(day(169), &data.until(day(169)).unwrap()).unwrap();
    assert_eq!(names(&first_fold), vec!["yearly", "weekly"]);
    assert_eq!(
        first_fold.seasonalities()[0].fourier_order,
        model.seasonalities()[0].fourier_order
    );

    let windows = CrossValidationWindows::new(30, Some(300), Some(100)).unwrap();
    let cv = cross_validation(&model, &windows).unwrap();
    let cutoffs: Vec<NaiveDate> = cv.iter().map(|r| r.cutoff).collect();
    assert_eq!(cutoffs[0], day(169));
    assert_eq!(cv.len(), 90);
}

#[test]
fn test_folds_drop_changepoints_after_cutoff() {
    let rows = (0..120)
        .map(|i| (day(i), if i < 30 { 10.0 + i as f64 } else { 40.0 + 0.2 * i as f64 }))
        .collect();
    let data = TimeSeriesData::from_rows(rows).unwrap();
    let model = Prophet::new(ProphetSettings {
        changepoints: Some(vec![day(30), day(100)]),
        uncertainty_samples: 20,
        ..Default::default()
    })
    .unwrap()
    .train(&data)
    .unwrap();

    let early = model.refit_until(day(20), &data.until(day(20)).unwrap()).unwrap();
    assert!(early.changepoints().is_empty());
    let later = model.refit_until(day(69), &data.until(day(69)).unwrap()).unwrap();
    assert_eq!(later.changepoints(), &[day(30)]);

    let windows = CrossValidationWindows::new(10, Some(10), Some(60)).unwrap();
    assert_eq!(cross_validation(&model, &windows).unwrap().len(), 50);
}
