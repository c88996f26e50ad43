//! Writes the two forecast tables as CSV.

use crate::predict::{GlobalSeries, PredictionGrid};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;
use thiserror::Error;

pub const COUNTRY_PREDICTIONS_FILE: &str = "country_year_predictions.csv";
pub const GLOBAL_PREDICTIONS_FILE: &str = "global_year_predictions.csv";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Writes `country,year,ghi_pred`, one row per grid entry, in grid order.
pub fn write_country_predictions(path: &Path, grid: &PredictionGrid) -> Result<(), OutputError> {
    let mut df = DataFrame::new(vec![
        Series::new(
            "country".into(),
            grid.rows.iter().map(|row| row.country.as_str()).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "year".into(),
            grid.rows.iter().map(|row| row.year).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "ghi_pred".into(),
            grid.rows.iter().map(|row| row.ghi_pred).collect::<Vec<_>>(),
        )
        .into(),
    ])?;
    write_frame(path, &mut df)
}

/// Writes `year,global_ghi_mean`, ascending by year.
pub fn write_global_predictions(path: &Path, series: &GlobalSeries) -> Result<(), OutputError> {
    let mut df = DataFrame::new(vec![
        Series::new(
            "year".into(),
            series.rows.iter().map(|row| row.year).collect::<Vec<_>>(),
        )
        .into(),
        Series::new(
            "global_ghi_mean".into(),
            series
                .rows
                .iter()
                .map(|row| row.global_ghi_mean)
                .collect::<Vec<_>>(),
        )
        .into(),
    ])?;
    write_frame(path, &mut df)
}

fn write_frame(path: &Path, df: &mut DataFrame) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    log::info!("Wrote {} rows to '{}'", df.height(), path.display());
    Ok(())
}
