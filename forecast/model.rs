use crate::construction::{
    ConstructionError, CountryVocabulary, ModelLayout, POLYNOMIAL_DEGREE, build_design_matrix,
    center_years, encode_countries,
};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the human-readable format of a trained model when serialized to TOML.

/// Hyperparameters of the shared-trend ridge model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Ridge strength applied to the trend and country-trend blocks. Must be finite and positive.
    pub ridge_alpha: f64,
    pub polynomial_degree: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            ridge_alpha: 10.0,
            polynomial_degree: POLYNOMIAL_DEGREE,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.ridge_alpha.is_finite() || self.ridge_alpha <= 0.0 {
            return Err(format!(
                "ridge_alpha must be finite and greater than zero, got {}",
                self.ridge_alpha
            ));
        }
        if self.polynomial_degree == 0 {
            return Err("polynomial_degree must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Fitted coefficients, keyed by what they multiply rather than by column position.
///
/// Country effects sum to zero when weighted by each country's training row count, and the
/// weighted mean is carried in `intercept`. A country absent from the vocabulary therefore
/// predicts `intercept` plus the shared trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedCoefficients {
    pub intercept: f64,
    /// Coefficients of `[year_c, year_c^2, ..]`.
    pub shared_trend: Vec<f64>,
    pub country_effects: BTreeMap<String, f64>,
    /// Per-country deviation from the shared trend, one coefficient per basis term.
    pub country_trends: BTreeMap<String, Vec<f64>>,
}

/// In-sample fit diagnostics recorded at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub n_rows: usize,
    pub n_features: usize,
    pub rmse: f64,
    pub r_squared: f64,
}

/// A trained model: everything needed to predict without the training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    /// Mean training year. Prediction centers years on this value.
    pub year_center: f64,
    pub vocabulary: CountryVocabulary,
    pub config: ModelConfig,
    pub coefficients: MappedCoefficients,
    pub fit: FitSummary,
}

/// Custom error type for model loading, saving, and prediction.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("The model has no usable year center (found {0}). It cannot be used for prediction.")]
    NotCentered(f64),
    #[error("Coefficient missing for country '{0}'. This usually indicates a model format mismatch.")]
    CoefficientMissing(String),
    #[error("Coefficient block '{block}' has {found} entries, but the model degree requires {expected}.")]
    DimensionMismatch {
        block: String,
        expected: usize,
        found: usize,
    },
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to build prediction features: {0}")]
    ConstructionError(#[from] ConstructionError),
}

impl TrainedModel {
    pub fn layout(&self) -> Result<ModelLayout, ModelError> {
        Ok(ModelLayout::new(
            self.vocabulary.len(),
            self.config.polynomial_degree,
        )?)
    }

    /// Fails unless the model carries a finite year center.
    pub fn ensure_centered(&self) -> Result<(), ModelError> {
        if self.year_center.is_finite() {
            Ok(())
        } else {
            Err(ModelError::NotCentered(self.year_center))
        }
    }

    /// Checks that the model is internally consistent and usable for prediction.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.config.validate().map_err(ModelError::InvalidConfig)?;
        self.ensure_centered()?;
        self.flatten_coefficients().map(|_| ())
    }

    /// Predicts the raw linear predictor for paired `(country, year)` queries.
    ///
    /// Countries are matched exactly. Unknown countries are not an error: they get the
    /// intercept plus the shared trend. No clipping happens here.
    pub fn predict<S: AsRef<str>>(
        &self,
        countries: &[S],
        years: &[i32],
    ) -> Result<Array1<f64>, ModelError> {
        self.ensure_centered()?;
        let layout = self.layout()?;
        let beta = self.flatten_coefficients()?;

        let codes = encode_countries(&self.vocabulary, countries);
        let year_c = center_years(years, self.year_center);
        let x = build_design_matrix(&codes, year_c.view(), &layout)?;

        Ok(x.dot(&beta) + self.coefficients.intercept)
    }

    /// Saves the model to a TOML file.
    pub fn save(&self, path: &str) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads and validates a model from a TOML file.
    pub fn load(path: &str) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let model: TrainedModel = toml::from_str(&toml_string)?;
        model.validate()?;
        Ok(model)
    }

    /// Flattens the structured `MappedCoefficients` into the column order of the design matrix.
    pub fn flatten_coefficients(&self) -> Result<Array1<f64>, ModelError> {
        let layout = self.layout()?;
        let degree = layout.degree;
        let mut beta = Array1::zeros(layout.total_coeffs);

        check_block_len("shared_trend", &self.coefficients.shared_trend, degree)?;
        for (k, &value) in self.coefficients.shared_trend.iter().enumerate() {
            beta[layout.basis_cols.start + k] = value;
        }

        for (c, country) in self.vocabulary.countries().iter().enumerate() {
            let effect = self
                .coefficients
                .country_effects
                .get(country)
                .ok_or_else(|| ModelError::CoefficientMissing(country.clone()))?;
            beta[layout.country_cols.start + c] = *effect;

            let trend = self
                .coefficients
                .country_trends
                .get(country)
                .ok_or_else(|| ModelError::CoefficientMissing(country.clone()))?;
            check_block_len(country, trend, degree)?;
            for (k, &value) in trend.iter().enumerate() {
                beta[layout.interaction_col(c, k)] = value;
            }
        }

        Ok(beta)
    }
}

fn check_block_len(block: &str, values: &[f64], expected: usize) -> Result<(), ModelError> {
    if values.len() != expected {
        return Err(ModelError::DimensionMismatch {
            block: block.to_string(),
            expected,
            found: values.len(),
        });
    }
    Ok(())
}
