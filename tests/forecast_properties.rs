use approx::assert_abs_diff_eq;
use ghicast::config::ForecastConfig;
use ghicast::data::load_table;
use ghicast::model::TrainedModel;
use ghicast::normalize::{LongRecord, normalize};
use ghicast::pipeline::{
    PipelineError, fit_from_table, forecast_table, forecast_with_model, write_outputs,
};
use ghicast::predict::{ClipBounds, predict_grid};
use ghicast::query::{PredictionQuery, load_country_predictions, load_global_predictions};
use ghicast::select::SelectionError;
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use tempfile::tempdir;

fn long_frame(rows: &[(&str, i32, f64)]) -> DataFrame {
    DataFrame::new(vec![
        Series::new(
            "Country".into(),
            rows.iter().map(|r| r.0).collect::<Vec<_>>(),
        )
        .into(),
        Series::new("year".into(), rows.iter().map(|r| r.1).collect::<Vec<_>>()).into(),
        Series::new("GHI".into(), rows.iter().map(|r| r.2).collect::<Vec<_>>()).into(),
    ])
    .expect("long frame")
}

fn two_country_frame() -> DataFrame {
    long_frame(&[
        ("A", 2000, 10.0),
        ("A", 2024, 30.0),
        ("B", 2000, 50.0),
        ("B", 2024, 50.0),
    ])
}

/// A small wide table with uneven coverage and a few unusable cells.
const WIDE_TABLE: &str = "\
Country,2000,2008,2016,2024\n\
Chad,50.6,41.2,34.5,26.2\n\
Peru,20.7,14.9,8.4,7.0\n\
Yemen,41.3,,38.8,41.2\n\
Iceland,<5,<5,<5,<5\n\
Haiti,n/a,42.6,,31.8\n";

#[test]
fn centered_fit_matches_hand_checked_values() {
    let config = ForecastConfig {
        target_years: vec![2012],
        ..ForecastConfig::default()
    };
    let outputs = forecast_table(&two_country_frame(), &config).unwrap();

    let by_country: BTreeMap<&str, f64> = outputs
        .countries
        .rows
        .iter()
        .map(|row| (row.country.as_str(), row.ghi_pred))
        .collect();
    assert!(by_country["A"] > 10.0 && by_country["A"] < 30.0);
    assert_abs_diff_eq!(by_country["A"], 20.0, epsilon = 1e-6);
    assert_abs_diff_eq!(by_country["B"], 50.0, epsilon = 1e-6);
    assert_abs_diff_eq!(outputs.global.rows[0].global_ghi_mean, 35.0, epsilon = 1e-6);
}

#[test]
fn wide_file_forecasts_every_country_within_bounds() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("ghi.csv");
    fs::write(&input, WIDE_TABLE).unwrap();

    let df = load_table(input.to_str().unwrap()).unwrap();
    let table = normalize(&df).unwrap();
    // 4 + 4 + 3 + 0 + 2 usable cells.
    assert_eq!(table.len(), 13);

    let config = ForecastConfig::default();
    let outputs = forecast_table(&df, &config).unwrap();
    assert_eq!(
        outputs.model.vocabulary.countries(),
        &["Chad", "Haiti", "Peru", "Yemen"]
    );
    assert_eq!(outputs.countries.rows.len(), 4 * 6);
    for row in &outputs.countries.rows {
        assert!(
            (0.0..=100.0).contains(&row.ghi_pred),
            "{} {} out of range: {}",
            row.country,
            row.year,
            row.ghi_pred
        );
    }

    // Country-major, years in configured order.
    let first: Vec<(&str, i32)> = outputs.countries.rows[..7]
        .iter()
        .map(|row| (row.country.as_str(), row.year))
        .collect();
    assert_eq!(
        first,
        vec![
            ("Chad", 2025),
            ("Chad", 2026),
            ("Chad", 2027),
            ("Chad", 2028),
            ("Chad", 2029),
            ("Chad", 2030),
            ("Haiti", 2025),
        ]
    );
}

#[test]
fn predictions_are_clipped_into_the_configured_range() {
    // A steep decline that extrapolates below zero, and a steep rise above 100.
    let df = long_frame(&[
        ("Falling", 2000, 60.0),
        ("Falling", 2008, 40.0),
        ("Falling", 2016, 20.0),
        ("Falling", 2024, 2.0),
        ("Rising", 2000, 40.0),
        ("Rising", 2008, 60.0),
        ("Rising", 2016, 80.0),
        ("Rising", 2024, 98.0),
    ]);
    let config = ForecastConfig {
        ridge_alpha: 1e-3,
        target_years: vec![2030, 2060],
        ..ForecastConfig::default()
    };
    let model = fit_from_table(&df, &config).unwrap();
    let raw = model.predict(&["Falling", "Rising"], &[2060, 2060]).unwrap();
    assert!(raw[0] < 0.0, "raw falling prediction {}", raw[0]);
    assert!(raw[1] > 100.0, "raw rising prediction {}", raw[1]);

    let (grid, _) = forecast_with_model(&model, &config).unwrap();
    for row in grid.rows.iter().filter(|row| row.year == 2060) {
        let expected = if row.country == "Falling" { 0.0 } else { 100.0 };
        assert_eq!(row.ghi_pred, expected);
    }
}

#[test]
fn unseen_country_gets_the_shared_trend() {
    let config = ForecastConfig::default();
    let model = fit_from_table(&two_country_frame(), &config).unwrap();

    let countries = vec!["Atlantis".to_string()];
    let grid = predict_grid(&model, &countries, &[2012, 2030], ClipBounds::default()).unwrap();
    let coefficients = &model.coefficients;
    for row in &grid.rows {
        let t = row.year as f64 - model.year_center;
        let expected = coefficients.intercept
            + coefficients.shared_trend[0] * t
            + coefficients.shared_trend[1] * t * t;
        assert_abs_diff_eq!(row.ghi_pred, expected.clamp(0.0, 100.0), epsilon = 1e-9);
    }
}

#[test]
fn shifting_every_year_leaves_predictions_unchanged() {
    let rows = [
        ("Chad", 2000, 50.6),
        ("Chad", 2008, 41.2),
        ("Chad", 2016, 34.5),
        ("Peru", 2000, 20.7),
        ("Peru", 2016, 8.4),
        ("Peru", 2024, 7.0),
    ];
    let shift = 37;
    let shifted: Vec<(&str, i32, f64)> = rows
        .iter()
        .map(|&(country, year, value)| (country, year + shift, value))
        .collect();

    let base = ForecastConfig::default();
    let moved = ForecastConfig {
        anchor_years: base.anchor_years.iter().map(|year| year + shift).collect(),
        target_years: base.target_years.iter().map(|year| year + shift).collect(),
        ..ForecastConfig::default()
    };

    let a = forecast_table(&long_frame(&rows), &base).unwrap();
    let b = forecast_table(&long_frame(&shifted), &moved).unwrap();

    assert_abs_diff_eq!(b.model.year_center - a.model.year_center, shift as f64, epsilon = 1e-9);
    assert_eq!(a.countries.rows.len(), b.countries.rows.len());
    for (left, right) in a.countries.rows.iter().zip(&b.countries.rows) {
        assert_eq!(left.country, right.country);
        assert_eq!(left.year + shift, right.year);
        assert_abs_diff_eq!(left.ghi_pred, right.ghi_pred, epsilon = 1e-9);
    }
}

#[test]
fn global_series_is_the_unweighted_country_mean() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("ghi.csv");
    fs::write(&input, WIDE_TABLE).unwrap();
    let df = load_table(input.to_str().unwrap()).unwrap();
    let outputs = forecast_table(&df, &ForecastConfig::default()).unwrap();

    for global in &outputs.global.rows {
        let values: Vec<f64> = outputs
            .countries
            .rows
            .iter()
            .filter(|row| row.year == global.year)
            .map(|row| row.ghi_pred)
            .collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert_abs_diff_eq!(global.global_ghi_mean, mean, epsilon = 1e-12);
    }
    let years: Vec<i32> = outputs.global.rows.iter().map(|row| row.year).collect();
    assert_eq!(years, vec![2025, 2026, 2027, 2028, 2029, 2030]);
}

#[test]
fn no_anchor_year_rows_is_a_selection_error() {
    let df = long_frame(&[("Chad", 1990, 60.0), ("Chad", 1995, 55.0)]);
    match fit_from_table(&df, &ForecastConfig::default()) {
        Err(PipelineError::Selection(SelectionError::EmptyTrainingSet {
            available_years, ..
        })) => assert_eq!(available_years, vec![1990, 1995]),
        other => panic!("Expected an empty training set, got {other:?}"),
    }
}

#[test]
fn published_tables_round_trip_through_query() {
    let dir = tempdir().unwrap();
    let outputs = forecast_table(&two_country_frame(), &ForecastConfig::default()).unwrap();
    write_outputs(dir.path(), &outputs.countries, &outputs.global).unwrap();

    let country_rows = load_country_predictions(dir.path()).unwrap();
    assert_eq!(country_rows.len(), outputs.countries.rows.len());
    for (read, written) in country_rows.iter().zip(&outputs.countries.rows) {
        assert_eq!(read.country, written.country);
        assert_eq!(read.year, written.year);
        assert_abs_diff_eq!(read.ghi_pred, written.ghi_pred, epsilon = 1e-9);
    }

    let query = PredictionQuery {
        countries: vec!["b".to_string()],
        start_year: Some(2026),
        end_year: Some(2027),
        ..PredictionQuery::default()
    };
    let hits = query.filter_countries(&country_rows);
    assert_eq!(
        hits.iter().map(|row| row.year).collect::<Vec<_>>(),
        vec![2026, 2027]
    );

    let global_rows = load_global_predictions(dir.path()).unwrap();
    assert_eq!(global_rows.len(), 6);
}

#[test]
fn saved_model_predicts_like_the_fitted_one() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("model.toml");
    let config = ForecastConfig::default();
    let model = fit_from_table(&two_country_frame(), &config).unwrap();
    model.save(path.to_str().unwrap()).unwrap();

    let loaded = TrainedModel::load(path.to_str().unwrap()).unwrap();
    let (before, _) = forecast_with_model(&model, &config).unwrap();
    let (after, _) = forecast_with_model(&loaded, &config).unwrap();
    for (a, b) in before.rows.iter().zip(&after.rows) {
        assert_eq!(a.country, b.country);
        assert_abs_diff_eq!(a.ghi_pred, b.ghi_pred, epsilon = 1e-9);
    }
}

#[test]
fn long_records_expose_canonical_fields() {
    let table = normalize(&two_country_frame()).unwrap();
    assert_eq!(
        table.records()[0],
        LongRecord {
            country: "A".to_string(),
            year: 2000,
            value: 10.0,
        }
    );
}
