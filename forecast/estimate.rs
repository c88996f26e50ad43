//! # Model Estimation via Block-Penalized Least Squares
//!
//! Fits the shared-trend model in closed form. The design matrix (see `construction`) has no
//! intercept column. Instead the one-hot country block is left unpenalized, so every country
//! keeps its own level, while the shared trend and the per-country trend deviations are
//! ridge-penalized with strength `ridge_alpha`. The penalized normal equations
//!
//! ```text
//! (XᵀX + diag(P)) β = Xᵀy
//! ```
//!
//! are positive definite whenever `ridge_alpha > 0` and every vocabulary country has at
//! least one training row, which selection guarantees.
//!
//! After solving, the country levels are re-expressed as a common intercept (their
//! row-count-weighted mean) plus effects that sum to zero under the same weights. Fitted
//! values for known countries are unchanged by this step. Unknown countries then land on
//! the "typical" country: intercept plus shared trend.

use crate::construction::{
    ConstructionError, CountryVocabulary, ModelLayout, build_design_matrix, center_years,
    encode_countries,
};
use crate::model::{FitSummary, MappedCoefficients, ModelConfig, TrainedModel};
use crate::select::TrainingSet;
use ndarray::{Array1, ArrayView1};
use ndarray_linalg::Solve;
use thiserror::Error;

/// A comprehensive error type for the model estimation process.
#[derive(Error, Debug)]
pub enum EstimationError {
    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("A linear system solve failed. The penalized Gram matrix may be singular. Error: {0}")]
    LinearSystemSolveFailed(ndarray_linalg::error::LinalgError),

    #[error("The solver produced non-finite coefficients. Check the input for extreme values.")]
    NonFiniteCoefficients,

    #[error("Failed to build the design matrix: {0}")]
    ConstructionError(#[from] ConstructionError),
}

/// The main entry point for model training.
pub fn train_model(
    data: &TrainingSet,
    config: &ModelConfig,
) -> Result<TrainedModel, EstimationError> {
    config.validate().map_err(EstimationError::InvalidConfig)?;
    log::info!(
        "Starting model training. {} total samples, ridge_alpha = {}.",
        data.len(),
        config.ridge_alpha
    );

    let records = data.records();
    let countries: Vec<&str> = records.iter().map(|r| r.country.as_str()).collect();
    let years: Vec<i32> = records.iter().map(|r| r.year).collect();
    let y: Array1<f64> = records.iter().map(|r| r.value).collect();

    let year_center = data.mean_year();
    let vocabulary = CountryVocabulary::new(countries.iter().copied());
    let layout = ModelLayout::new(vocabulary.len(), config.polynomial_degree)?;
    log_layout_info(&layout, year_center);

    let codes = encode_countries(&vocabulary, &countries);
    let year_c = center_years(&years, year_center);
    let x = build_design_matrix(&codes, year_c.view(), &layout)?;

    let penalty = layout.penalty_diagonal(config.ridge_alpha);
    let mut gram = x.t().dot(&x);
    gram.diag_mut().zip_mut_with(&penalty, |d, &p| *d += p);
    let rhs = x.t().dot(&y);

    let beta = gram
        .solve_into(rhs)
        .map_err(EstimationError::LinearSystemSolveFailed)?;
    if beta.iter().any(|b| !b.is_finite()) {
        return Err(EstimationError::NonFiniteCoefficients);
    }

    let fitted = x.dot(&beta);
    let fit = internal::fit_summary(y.view(), fitted.view(), layout.total_coeffs);
    log::info!(
        "Model fitted: RMSE = {:.4}, R² = {:.4} over {} rows and {} coefficients.",
        fit.rmse,
        fit.r_squared,
        fit.n_rows,
        fit.n_features
    );

    let coefficients = internal::map_coefficients(&beta, &layout, &vocabulary, &codes);
    Ok(TrainedModel {
        year_center,
        vocabulary,
        config: config.clone(),
        coefficients,
        fit,
    })
}

fn log_layout_info(layout: &ModelLayout, year_center: f64) {
    log::info!(
        "Model layout: {} countries, degree {}, {} total coefficients, year center {:.3}.",
        layout.num_countries,
        layout.degree,
        layout.total_coeffs,
        year_center
    );
    for block in &layout.penalty_map {
        log::debug!(
            "  penalized block '{}': columns {:?}",
            block.term_name,
            block.col_range
        );
    }
}

mod internal {
    use super::*;
    use std::collections::BTreeMap;

    /// Splits `beta` into named blocks and applies the weighted sum-to-zero re-expression.
    pub(super) fn map_coefficients(
        beta: &Array1<f64>,
        layout: &ModelLayout,
        vocabulary: &CountryVocabulary,
        codes: &[Option<usize>],
    ) -> MappedCoefficients {
        let mut counts = vec![0usize; layout.num_countries];
        for &c in codes.iter().flatten() {
            counts[c] += 1;
        }
        let total: usize = counts.iter().sum();

        let levels = beta.slice(ndarray::s![layout.country_cols.clone()]);
        let intercept = if total == 0 {
            0.0
        } else {
            levels
                .iter()
                .zip(&counts)
                .map(|(level, &n)| level * n as f64)
                .sum::<f64>()
                / total as f64
        };

        let mut country_effects = BTreeMap::new();
        let mut country_trends = BTreeMap::new();
        for (c, country) in vocabulary.countries().iter().enumerate() {
            country_effects.insert(country.clone(), levels[c] - intercept);
            let trend: Vec<f64> = (0..layout.degree)
                .map(|k| beta[layout.interaction_col(c, k)])
                .collect();
            country_trends.insert(country.clone(), trend);
        }

        MappedCoefficients {
            intercept,
            shared_trend: beta
                .slice(ndarray::s![layout.basis_cols.clone()])
                .to_vec(),
            country_effects,
            country_trends,
        }
    }

    pub(super) fn fit_summary(
        y: ArrayView1<f64>,
        fitted: ArrayView1<f64>,
        n_features: usize,
    ) -> FitSummary {
        let n = y.len();
        let mean = y.mean().unwrap_or(0.0);
        let ss_res: f64 = y
            .iter()
            .zip(fitted.iter())
            .map(|(obs, fit)| (obs - fit).powi(2))
            .sum();
        let ss_tot: f64 = y.iter().map(|obs| (obs - mean).powi(2)).sum();

        let rmse = if n == 0 { 0.0 } else { (ss_res / n as f64).sqrt() };
        let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        FitSummary {
            n_rows: n,
            n_features,
            rmse,
            r_squared,
        }
    }
}
