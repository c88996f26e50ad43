//! # Table Normalizer
//!
//! Converts an arbitrary wide-or-long indicator table into the canonical long relation
//! `(country, year, value)` that the rest of the crate works with.
//!
//! Detection is a fixed, priority-ordered rule list rather than free-form guessing, so the
//! same table always normalizes the same way:
//!
//! 1. Country column: the first label (trimmed, case-insensitive) found in
//!    [`COUNTRY_CANDIDATES`], in candidate order. Otherwise the first text-typed column that is
//!    neither a year column nor `year`.
//! 2. Shape: any year-labelled column makes the table wide. Otherwise a column labelled exactly
//!    `year` makes it long. Otherwise the table is rejected.
//! 3. Long value column: the first label found in [`VALUE_CANDIDATES`], otherwise the last
//!    numeric-typed column that is not `year` and not the country column.
//!
//! Cells are coerced to numbers here and nowhere else. Anything that does not parse as a
//! finite `f64` after trimming becomes missing, and records with a missing value, year or
//! country are dropped.

use polars::prelude::*;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// Country column labels recognised by name, in priority order.
pub const COUNTRY_CANDIDATES: [&str; 6] =
    ["country", "country name", "nation", "state", "location", "area"];

/// Value column labels recognised by name in long tables, in priority order.
pub const VALUE_CANDIDATES: [&str; 4] = ["ghi", "value", "score", "index"];

/// The label that marks a long table.
pub const LONG_YEAR_COLUMN: &str = "year";

/// One observation of the indicator for one country in one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongRecord {
    pub country: String,
    pub year: i32,
    pub value: f64,
}

/// The canonical long relation. Records keep source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalTable {
    records: Vec<LongRecord>,
}

impl CanonicalTable {
    pub fn from_records(records: Vec<LongRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[LongRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct years present, ascending.
    pub fn years(&self) -> Vec<i32> {
        self.records
            .iter()
            .map(|record| record.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// The table cannot be interpreted as a country-by-year indicator table.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error(
        "Could not detect a country column. Name it one of 'country', 'country name', 'nation', 'state', 'location' or 'area', or provide at least one text column."
    )]
    NoCountryColumn,
    #[error(
        "Could not determine the table shape. Provide either year columns (e.g. 2000, 2008, 2016) or a 'year' column."
    )]
    NoYearStructure,
    #[error(
        "Could not detect a value column in the long table. Name it one of 'ghi', 'value', 'score' or 'index', or provide a numeric column other than 'year'."
    )]
    NoValueColumn,
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Normalizes a raw table into canonical long form.
pub fn normalize(df: &DataFrame) -> Result<CanonicalTable, SchemaError> {
    let profiles = internal::profile_columns(df)?;
    let country = internal::find_country_column(&profiles)?;
    let layout = internal::detect_layout(&profiles, country)?;
    let columns = df.get_columns();

    let countries = internal::text_cells(&columns[profiles[country].index])?;
    let mut records = Vec::new();
    let mut dropped = 0usize;

    match &layout {
        internal::Layout::Wide { year_columns } => {
            log::info!(
                "Detected wide table: country column '{}', {} year columns {:?}",
                profiles[country].label,
                year_columns.len(),
                year_columns.iter().map(|(year, _)| *year).collect::<Vec<_>>()
            );
            let year_values = year_columns
                .par_iter()
                .map(|&(year, profile_idx)| {
                    internal::numeric_cells(&columns[profiles[profile_idx].index])
                        .map(|values| (year, values))
                })
                .collect::<Result<Vec<_>, SchemaError>>()?;

            for (row, country_cell) in countries.iter().enumerate() {
                let Some(country_name) = country_cell else {
                    dropped += year_values.len();
                    continue;
                };
                for (year, values) in &year_values {
                    match values[row] {
                        Some(value) => records.push(LongRecord {
                            country: country_name.clone(),
                            year: *year,
                            value,
                        }),
                        None => dropped += 1,
                    }
                }
            }
        }
        internal::Layout::Long { year_column, value_column } => {
            log::info!(
                "Detected long table: country column '{}', value column '{}'",
                profiles[country].label,
                profiles[*value_column].label
            );
            let years = internal::numeric_cells(&columns[profiles[*year_column].index])?;
            let values = internal::numeric_cells(&columns[profiles[*value_column].index])?;

            for (row, country_cell) in countries.iter().enumerate() {
                let year = years[row].and_then(internal::integral_year);
                match (country_cell, year, values[row]) {
                    (Some(country_name), Some(year), Some(value)) => records.push(LongRecord {
                        country: country_name.clone(),
                        year,
                        value,
                    }),
                    _ => dropped += 1,
                }
            }
        }
    }

    if dropped > 0 {
        log::warn!("Dropped {dropped} cells with a missing country, year or value");
    }
    log::info!("Normalized table into {} records", records.len());

    Ok(CanonicalTable { records })
}

/// Maps a column label to the year it holds, if it is a year column.
///
/// A trimmed label that is all ASCII digits is a year. So is a label that starts with a
/// `19xx`/`20xx` token followed by something other than a digit, which is how spreadsheet
/// exports render headers such as `"2024\n'19-'23"`.
pub fn canonical_year(label: &str) -> Option<i32> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed.parse().ok();
    }

    let bytes = trimmed.as_bytes();
    let century = bytes.starts_with(b"19") || bytes.starts_with(b"20");
    if bytes.len() > 4
        && century
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && !bytes[4].is_ascii_digit()
    {
        return trimmed[..4].parse().ok();
    }
    None
}

mod internal {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) enum ColumnKind {
        Text,
        Numeric,
        Empty,
    }

    #[derive(Debug)]
    pub(super) struct ColumnProfile {
        /// Position in the source frame.
        pub index: usize,
        /// Trimmed label.
        pub label: String,
        pub kind: ColumnKind,
        pub year: Option<i32>,
    }

    #[derive(Debug)]
    pub(super) enum Layout {
        /// `(year, profile index)` in order of first appearance.
        Wide { year_columns: Vec<(i32, usize)> },
        Long { year_column: usize, value_column: usize },
    }

    pub(super) fn profile_columns(df: &DataFrame) -> Result<Vec<ColumnProfile>, SchemaError> {
        let mut profiles = Vec::with_capacity(df.width());
        for (index, column) in df.get_columns().iter().enumerate() {
            let label = column.name().as_str().trim().to_string();
            let kind = column_kind(column)?;
            let year = canonical_year(&label);
            log::debug!("Column '{label}': {kind:?}, year {year:?}");
            profiles.push(ColumnProfile {
                index,
                label,
                kind,
                year,
            });
        }
        Ok(profiles)
    }

    pub(super) fn find_country_column(profiles: &[ColumnProfile]) -> Result<usize, SchemaError> {
        for candidate in COUNTRY_CANDIDATES {
            if let Some(pos) = profiles
                .iter()
                .position(|profile| profile.label.to_lowercase() == candidate)
            {
                return Ok(pos);
            }
        }

        profiles
            .iter()
            .position(|profile| {
                profile.kind == ColumnKind::Text
                    && profile.year.is_none()
                    && profile.label != LONG_YEAR_COLUMN
            })
            .ok_or(SchemaError::NoCountryColumn)
    }

    pub(super) fn detect_layout(
        profiles: &[ColumnProfile],
        country: usize,
    ) -> Result<Layout, SchemaError> {
        let mut seen = HashSet::new();
        let mut year_columns = Vec::new();
        for (pos, profile) in profiles.iter().enumerate() {
            if pos == country {
                continue;
            }
            if let Some(year) = profile.year {
                if seen.insert(year) {
                    year_columns.push((year, pos));
                } else {
                    log::warn!(
                        "Ignoring column '{}': year {year} already read from an earlier column",
                        profile.label
                    );
                }
            }
        }
        if !year_columns.is_empty() {
            return Ok(Layout::Wide { year_columns });
        }

        let Some(year_column) = profiles
            .iter()
            .position(|profile| profile.label == LONG_YEAR_COLUMN)
        else {
            return Err(SchemaError::NoYearStructure);
        };

        let is_value_candidate =
            |pos: usize| pos != country && pos != year_column;

        for candidate in VALUE_CANDIDATES {
            if let Some(pos) = profiles.iter().enumerate().position(|(pos, profile)| {
                is_value_candidate(pos) && profile.label.to_lowercase() == candidate
            }) {
                return Ok(Layout::Long {
                    year_column,
                    value_column: pos,
                });
            }
        }

        profiles
            .iter()
            .enumerate()
            .rev()
            .find(|(pos, profile)| is_value_candidate(*pos) && profile.kind == ColumnKind::Numeric)
            .map(|(value_column, _)| Layout::Long {
                year_column,
                value_column,
            })
            .ok_or(SchemaError::NoValueColumn)
    }

    fn is_numeric_dtype(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64
        )
    }

    /// A text column is numeric-typed when every non-empty cell parses and at least one does.
    fn column_kind(column: &Column) -> Result<ColumnKind, SchemaError> {
        if is_numeric_dtype(column.dtype()) {
            return Ok(if column.null_count() == column.len() {
                ColumnKind::Empty
            } else {
                ColumnKind::Numeric
            });
        }
        if column.dtype() != &DataType::String {
            return Ok(ColumnKind::Text);
        }

        let mut parsed = 0usize;
        for cell in column.str()?.into_iter().flatten() {
            let trimmed = cell.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.parse::<f64>().is_err() {
                return Ok(ColumnKind::Text);
            }
            parsed += 1;
        }
        Ok(if parsed == 0 {
            ColumnKind::Empty
        } else {
            ColumnKind::Numeric
        })
    }

    fn parse_numeric_cell(cell: &str) -> Option<f64> {
        cell.trim().parse::<f64>().ok().filter(|value| value.is_finite())
    }

    /// Coerces a column to numbers; unparsable or non-finite cells become `None`.
    pub(super) fn numeric_cells(column: &Column) -> Result<Vec<Option<f64>>, SchemaError> {
        if column.dtype() == &DataType::String {
            let values = column.str()?;
            return Ok(values
                .into_iter()
                .map(|cell| cell.and_then(parse_numeric_cell))
                .collect());
        }
        if is_numeric_dtype(column.dtype()) {
            let casted = column.cast(&DataType::Float64)?;
            let values = casted.f64()?;
            return Ok(values
                .into_iter()
                .map(|cell| cell.filter(|value| value.is_finite()))
                .collect());
        }
        Ok(vec![None; column.len()])
    }

    /// Coerces a column to trimmed text; empty cells become `None`.
    pub(super) fn text_cells(column: &Column) -> Result<Vec<Option<String>>, SchemaError> {
        let casted = column.cast(&DataType::String)?;
        let values = casted.str()?;
        Ok(values
            .into_iter()
            .map(|cell| {
                cell.map(str::trim)
                    .filter(|trimmed| !trimmed.is_empty())
                    .map(str::to_string)
            })
            .collect())
    }

    pub(super) fn integral_year(value: f64) -> Option<i32> {
        if value.fract() != 0.0 || value < i32::MIN as f64 || value > i32::MAX as f64 {
            return None;
        }
        Some(value as i32)
    }
}
