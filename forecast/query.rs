//! Read-side access to published forecast files: filter by country, exact year or year range.

use crate::output::{COUNTRY_PREDICTIONS_FILE, GLOBAL_PREDICTIONS_FILE};
use crate::predict::{CountryYearPrediction, GlobalYearPrediction};
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Failed to read predictions file: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Predictions file '{file}' has no '{column}' column.")]
    MissingColumn { file: String, column: String },
}

/// Filters applied to published predictions. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionQuery {
    /// Matched case-insensitively after trimming.
    pub countries: Vec<String>,
    pub year: Option<i32>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

impl PredictionQuery {
    fn matches_year(&self, year: i32) -> bool {
        self.year.is_none_or(|wanted| wanted == year)
            && self.start_year.is_none_or(|start| year >= start)
            && self.end_year.is_none_or(|end| year <= end)
    }

    fn matches_country(&self, country: &str) -> bool {
        if self.countries.is_empty() {
            return true;
        }
        let needle = country.trim().to_lowercase();
        self.countries
            .iter()
            .any(|wanted| wanted.trim().to_lowercase() == needle)
    }

    pub fn filter_countries<'a>(
        &self,
        rows: &'a [CountryYearPrediction],
    ) -> Vec<&'a CountryYearPrediction> {
        rows.iter()
            .filter(|row| self.matches_country(&row.country) && self.matches_year(row.year))
            .collect()
    }

    /// Country filters do not apply to the global series.
    pub fn filter_global<'a>(
        &self,
        rows: &'a [GlobalYearPrediction],
    ) -> Vec<&'a GlobalYearPrediction> {
        rows.iter().filter(|row| self.matches_year(row.year)).collect()
    }
}

pub fn load_country_predictions(dir: &Path) -> Result<Vec<CountryYearPrediction>, QueryError> {
    read_rows(&dir.join(COUNTRY_PREDICTIONS_FILE), &["country", "year", "ghi_pred"])
}

pub fn load_global_predictions(dir: &Path) -> Result<Vec<GlobalYearPrediction>, QueryError> {
    read_rows(&dir.join(GLOBAL_PREDICTIONS_FILE), &["year", "global_ghi_mean"])
}

fn read_rows<T: DeserializeOwned>(path: &Path, required: &[&str]) -> Result<Vec<T>, QueryError> {
    let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let headers = reader.headers()?.clone();
    for column in required {
        if !headers.iter().any(|header| header == *column) {
            return Err(QueryError::MissingColumn {
                file: path.display().to_string(),
                column: column.to_string(),
            });
        }
    }

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    log::debug!("Read {} rows from '{}'", rows.len(), path.display());
    Ok(rows)
}
