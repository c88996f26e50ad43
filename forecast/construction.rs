//! Feature construction for the shared-trend model.
//!
//! The design matrix has three blocks, laid out left to right:
//!
//! - one-hot country indicators, one column per vocabulary entry;
//! - the polynomial basis `[year_c, year_c^2, ..]` of the centered year;
//! - every pairwise product of a country indicator with a basis term, ordered country-major
//!   (`column = start + country * degree + k`).
//!
//! A country that is not in the vocabulary encodes to an all-zero indicator row, which also
//! zeroes its interaction block. Its features then reduce to the shared basis alone.

use ndarray::{Array1, Array2, ArrayView1, Zip, s};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

/// Degree of the shared year polynomial.
pub const POLYNOMIAL_DEGREE: usize = 2;

#[derive(Error, Debug)]
pub enum ConstructionError {
    #[error("Country codes and years differ in length: {countries} codes, {years} years.")]
    LengthMismatch { countries: usize, years: usize },
    #[error("Country code {code} is out of range for a vocabulary of {size} countries.")]
    CodeOutOfRange { code: usize, size: usize },
    #[error("Polynomial degree must be at least 1, got {0}.")]
    InvalidDegree(usize),
}

/// The sorted set of countries seen during training. Its order fixes the one-hot layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryVocabulary {
    countries: Vec<String>,
}

impl CountryVocabulary {
    pub fn new<I, S>(countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut countries: Vec<String> = countries.into_iter().map(Into::into).collect();
        countries.sort();
        countries.dedup();
        Self { countries }
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    /// Exact, case-sensitive lookup.
    pub fn index_of(&self, country: &str) -> Option<usize> {
        self.countries
            .binary_search_by(|entry| entry.as_str().cmp(country))
            .ok()
    }

    pub fn contains(&self, country: &str) -> bool {
        self.index_of(country).is_some()
    }
}

/// A contiguous block of penalized coefficients.
#[derive(Clone, Debug, PartialEq)]
pub struct PenalizedBlock {
    pub term_name: String,
    pub col_range: Range<usize>,
}

/// Column layout of the design matrix and its penalty map.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelLayout {
    pub num_countries: usize,
    pub degree: usize,
    pub country_cols: Range<usize>,
    pub basis_cols: Range<usize>,
    pub interaction_cols: Range<usize>,
    pub penalty_map: Vec<PenalizedBlock>,
    pub total_coeffs: usize,
}

impl ModelLayout {
    pub fn new(num_countries: usize, degree: usize) -> Result<Self, ConstructionError> {
        if degree == 0 {
            return Err(ConstructionError::InvalidDegree(degree));
        }

        // The country block is intentionally left unpenalized.
        let country_cols = 0..num_countries;
        let basis_cols = country_cols.end..country_cols.end + degree;
        let interaction_cols = basis_cols.end..basis_cols.end + num_countries * degree;
        let total_coeffs = interaction_cols.end;

        let mut penalty_map = vec![PenalizedBlock {
            term_name: "trend(year)".to_string(),
            col_range: basis_cols.clone(),
        }];
        if num_countries > 0 {
            penalty_map.push(PenalizedBlock {
                term_name: "trend(year, country)".to_string(),
                col_range: interaction_cols.clone(),
            });
        }

        Ok(Self {
            num_countries,
            degree,
            country_cols,
            basis_cols,
            interaction_cols,
            penalty_map,
            total_coeffs,
        })
    }

    /// Column of the product of country `country` with basis term `k` (0-based).
    pub fn interaction_col(&self, country: usize, k: usize) -> usize {
        self.interaction_cols.start + country * self.degree + k
    }

    /// Diagonal ridge penalty: `alpha` on every penalized block, zero elsewhere.
    pub fn penalty_diagonal(&self, alpha: f64) -> Array1<f64> {
        let mut diagonal = Array1::zeros(self.total_coeffs);
        for block in &self.penalty_map {
            diagonal
                .slice_mut(s![block.col_range.clone()])
                .fill(alpha);
        }
        diagonal
    }
}

/// Maps each country to its vocabulary index, `None` for unseen countries.
pub fn encode_countries<S: AsRef<str>>(
    vocabulary: &CountryVocabulary,
    countries: &[S],
) -> Vec<Option<usize>> {
    countries
        .iter()
        .map(|country| vocabulary.index_of(country.as_ref()))
        .collect()
}

/// `year - year_center` for every year.
pub fn center_years(years: &[i32], year_center: f64) -> Array1<f64> {
    years
        .iter()
        .map(|&year| year as f64 - year_center)
        .collect()
}

/// Polynomial basis without a bias column: row `i` is `[t_i, t_i^2, .., t_i^degree]`.
pub fn polynomial_basis(year_c: ArrayView1<f64>, degree: usize) -> Array2<f64> {
    let mut basis = Array2::zeros((year_c.len(), degree));
    Zip::from(basis.rows_mut()).and(year_c).for_each(|mut row, &t| {
        let mut power = 1.0;
        for entry in row.iter_mut() {
            power *= t;
            *entry = power;
        }
    });
    basis
}

/// Builds the full design matrix for already-encoded countries and centered years.
pub fn build_design_matrix(
    codes: &[Option<usize>],
    year_c: ArrayView1<f64>,
    layout: &ModelLayout,
) -> Result<Array2<f64>, ConstructionError> {
    if codes.len() != year_c.len() {
        return Err(ConstructionError::LengthMismatch {
            countries: codes.len(),
            years: year_c.len(),
        });
    }
    if let Some(&code) = codes
        .iter()
        .flatten()
        .find(|&&code| code >= layout.num_countries)
    {
        return Err(ConstructionError::CodeOutOfRange {
            code,
            size: layout.num_countries,
        });
    }

    let basis = polynomial_basis(year_c, layout.degree);
    let mut x = Array2::zeros((codes.len(), layout.total_coeffs));
    let codes = ArrayView1::from(codes);

    Zip::from(x.rows_mut())
        .and(&codes)
        .and(basis.rows())
        .par_for_each(|mut row, code, powers| {
            row.slice_mut(s![layout.basis_cols.clone()]).assign(&powers);
            if let Some(c) = *code {
                row[layout.country_cols.start + c] = 1.0;
                for (k, &power) in powers.iter().enumerate() {
                    row[layout.interaction_col(c, k)] = power;
                }
            }
        });

    Ok(x)
}
