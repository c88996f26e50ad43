//! Training-set selection: restricts the canonical table to the configured anchor years.

use crate::normalize::{CanonicalTable, LongRecord};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised while selecting training records.
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error(
        "No observations fall in the anchor years {anchor_years:?}. Years present in the table: {available_years:?}"
    )]
    EmptyTrainingSet {
        anchor_years: Vec<i32>,
        available_years: Vec<i32>,
    },
}

/// The non-empty subset of canonical records used to fit the model.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    records: Vec<LongRecord>,
}

impl TrainingSet {
    /// Wraps records directly, rejecting an empty set.
    pub fn from_records(records: Vec<LongRecord>) -> Result<Self, SelectionError> {
        if records.is_empty() {
            return Err(SelectionError::EmptyTrainingSet {
                anchor_years: Vec::new(),
                available_years: Vec::new(),
            });
        }
        Ok(Self { records })
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

    /// Distinct countries, sorted.
    pub fn countries(&self) -> BTreeSet<&str> {
        self.records
            .iter()
            .map(|record| record.country.as_str())
            .collect()
    }

    /// Arithmetic mean of the year over all records (not over distinct years).
    pub fn mean_year(&self) -> f64 {
        let total: f64 = self.records.iter().map(|record| record.year as f64).sum();
        total / self.records.len() as f64
    }
}

/// Keeps exactly the records whose year is an anchor year, preserving order.
pub fn select_training_set(
    table: &CanonicalTable,
    anchor_years: &BTreeSet<i32>,
) -> Result<TrainingSet, SelectionError> {
    let records: Vec<LongRecord> = table
        .records()
        .iter()
        .filter(|record| anchor_years.contains(&record.year))
        .cloned()
        .collect();

    if records.is_empty() {
        return Err(SelectionError::EmptyTrainingSet {
            anchor_years: anchor_years.iter().copied().collect(),
            available_years: table.years(),
        });
    }

    log::info!(
        "Selected {} of {} records in {} anchor years",
        records.len(),
        table.len(),
        anchor_years.len()
    );
    Ok(TrainingSet { records })
}
