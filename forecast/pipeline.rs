//! End-to-end orchestration: raw table to trained model to forecast tables.

use crate::config::{ConfigError, ForecastConfig};
use crate::estimate::{EstimationError, train_model};
use crate::model::{ModelError, TrainedModel};
use crate::normalize::{SchemaError, normalize};
use crate::output::{
    COUNTRY_PREDICTIONS_FILE, GLOBAL_PREDICTIONS_FILE, OutputError, write_country_predictions,
    write_global_predictions,
};
use crate::predict::{GlobalSeries, PredictionError, PredictionGrid, global_series, predict_grid};
use crate::select::{SelectionError, select_training_set};
use polars::prelude::DataFrame;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Estimation(#[from] EstimationError),
    #[error(transparent)]
    Prediction(#[from] PredictionError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// A trained model with the forecast tables it produced.
#[derive(Debug, Clone)]
pub struct ForecastOutputs {
    pub model: TrainedModel,
    pub countries: PredictionGrid,
    pub global: GlobalSeries,
}

/// Normalizes `df`, selects the anchor-year rows and fits the model.
pub fn fit_from_table(
    df: &DataFrame,
    config: &ForecastConfig,
) -> Result<TrainedModel, PipelineError> {
    config.validate()?;
    let table = normalize(df)?;
    let training = select_training_set(&table, &config.anchor_years)?;
    Ok(train_model(&training, &config.model_config())?)
}

/// Forecasts every training country for every configured target year.
pub fn forecast_with_model(
    model: &TrainedModel,
    config: &ForecastConfig,
) -> Result<(PredictionGrid, GlobalSeries), PipelineError> {
    let clip = config
        .clip_bounds()
        .map_err(PipelineError::Config)?;
    let countries = model.vocabulary.countries().to_vec();
    let grid = predict_grid(model, &countries, &config.target_years, clip)?;
    let global = global_series(&grid);
    Ok((grid, global))
}

/// Runs the whole pipeline on an in-memory table.
pub fn forecast_table(
    df: &DataFrame,
    config: &ForecastConfig,
) -> Result<ForecastOutputs, PipelineError> {
    let model = fit_from_table(df, config)?;
    let (countries, global) = forecast_with_model(&model, config)?;
    Ok(ForecastOutputs {
        model,
        countries,
        global,
    })
}

/// Writes both forecast tables into `dir` under their standard file names.
pub fn write_outputs(
    dir: &Path,
    countries: &PredictionGrid,
    global: &GlobalSeries,
) -> Result<(), PipelineError> {
    write_country_predictions(&dir.join(COUNTRY_PREDICTIONS_FILE), countries)?;
    write_global_predictions(&dir.join(GLOBAL_PREDICTIONS_FILE), global)?;
    Ok(())
}
