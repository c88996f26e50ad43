//! Forecast generation: the country-by-year prediction grid and its per-year global mean.

use crate::model::{ModelError, TrainedModel};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Invalid clip bounds: min {min} must be finite and not greater than max {max}.")]
    InvalidClipBounds { min: f64, max: f64 },
    #[error("Model prediction failed: {0}")]
    ModelError(#[from] ModelError),
}

/// Closed interval every published prediction is clamped into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipBounds {
    min: f64,
    max: f64,
}

impl ClipBounds {
    pub fn new(min: f64, max: f64) -> Result<Self, PredictionError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(PredictionError::InvalidClipBounds { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn apply(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

impl Default for ClipBounds {
    fn default() -> Self {
        Self { min: 0.0, max: 100.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryYearPrediction {
    pub country: String,
    pub year: i32,
    pub ghi_pred: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalYearPrediction {
    pub year: i32,
    pub global_ghi_mean: f64,
}

/// Clipped predictions for every `(country, year)` pair, country-major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionGrid {
    pub rows: Vec<CountryYearPrediction>,
}

/// Mean clipped prediction per year, ascending by year.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlobalSeries {
    pub rows: Vec<GlobalYearPrediction>,
}

/// Predicts every country in `countries` for every year in `target_years`.
///
/// Rows are ordered by country (in the given order), then by year (in the given order).
/// Countries the model has not seen are predicted from the shared trend, with one warning each.
pub fn predict_grid(
    model: &TrainedModel,
    countries: &[String],
    target_years: &[i32],
    clip: ClipBounds,
) -> Result<PredictionGrid, PredictionError> {
    for country in countries
        .iter()
        .filter(|country| !model.vocabulary.contains(country))
        .unique()
    {
        log::warn!(
            "Country '{country}' was not in the training data; predicting from the shared trend only."
        );
    }

    let (grid_countries, grid_years): (Vec<&str>, Vec<i32>) = countries
        .iter()
        .cartesian_product(target_years.iter())
        .map(|(country, &year)| (country.as_str(), year))
        .unzip();

    let raw = model.predict(&grid_countries, &grid_years)?;
    let rows: Vec<CountryYearPrediction> = grid_countries
        .iter()
        .zip(&grid_years)
        .zip(raw.iter())
        .map(|((country, &year), &eta)| CountryYearPrediction {
            country: country.to_string(),
            year,
            ghi_pred: clip.apply(eta),
        })
        .collect();

    log::info!(
        "Predicted {} rows for {} countries and {} years",
        rows.len(),
        countries.len(),
        target_years.len()
    );
    Ok(PredictionGrid { rows })
}

/// Averages the grid per year. Every country contributes equally.
pub fn global_series(grid: &PredictionGrid) -> GlobalSeries {
    let mut sums: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for row in &grid.rows {
        let entry = sums.entry(row.year).or_insert((0.0, 0));
        entry.0 += row.ghi_pred;
        entry.1 += 1;
    }

    GlobalSeries {
        rows: sums
            .into_iter()
            .map(|(year, (sum, count))| GlobalYearPrediction {
                year,
                global_ghi_mean: sum / count as f64,
            })
            .collect(),
    }
}
