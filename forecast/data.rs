//! # Input Table Loading
//!
//! This module is the entry point for user-provided indicator tables. It reads a
//! delimited file into a polars `DataFrame` and deliberately does no interpretation:
//! every column is read as text so that shape detection and numeric coercion happen
//! in one place, the normalizer, regardless of how messy the source spreadsheet was.
//!
//! - Separator: chosen from the file extension (`.tsv`/`.tab` use tabs, anything else commas).
//! - No schema inference: a year column holding `"<5"` in row 500 must not abort the read,
//!   it must become a missing value later.

use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading an input table from disk.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("The input file '{0}' has a header but no data rows.")]
    EmptyTable(String),
}

/// Reads a CSV or TSV file into a `DataFrame` whose columns are all text.
pub fn load_table(path: &str) -> Result<DataFrame, DataError> {
    let path_ref = Path::new(path);
    let separator = separator_for(path_ref);
    log::info!("Loading indicator table from '{path}'");

    let file = File::open(path_ref)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|options| options.with_separator(separator))
        .into_reader_with_file_handle(file)
        .finish()?;

    if df.height() == 0 {
        return Err(DataError::EmptyTable(path.to_string()));
    }

    log::info!(
        "Loaded {} rows and {} columns: {:?}",
        df.height(),
        df.width(),
        df.get_column_names()
    );
    Ok(df)
}

fn separator_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("tsv") | Some("tab") => b'\t',
        _ => b',',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn write_table(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().expect("tempfile");
        write!(file, "{content}").expect("write table");
        file.flush().expect("flush table");
        file
    }

    #[test]
    fn reads_every_column_as_text() {
        let file = write_table(".csv", "Country,2000,2008\nChad,40.1,<5\nPeru,12.0,9.5\n");
        let df = load_table(file.path().to_str().unwrap()).unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
        for column in df.get_columns() {
            assert_eq!(column.dtype(), &DataType::String);
        }
        let cells: Vec<Option<&str>> = df.column("2008").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(cells, vec![Some("<5"), Some("9.5")]);
    }

    #[test]
    fn tsv_extension_switches_separator() {
        let file = write_table(".tsv", "country\tyear\tvalue\nChad\t2000\t40.1\n");
        let df = load_table(file.path().to_str().unwrap()).unwrap();

        let names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        assert_eq!(names, vec!["country", "year", "value"]);
    }

    #[test]
    fn header_only_file_is_rejected() {
        let file = write_table(".csv", "country,2000\n");
        match load_table(file.path().to_str().unwrap()) {
            Err(DataError::EmptyTable(path)) => assert!(path.ends_with(".csv")),
            other => panic!("Expected EmptyTable, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_table("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, DataError::IoError(_)));
    }
}
