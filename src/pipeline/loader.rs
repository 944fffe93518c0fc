//! Dataset loader for CSV and Parquet files

use std::path::Path;

use polars::prelude::*;
use serde::Serialize;
use tracing::debug;

use super::error::{BenchError, Result};
use crate::utils::{create_spinner, finish_with_success};

/// How CSV files are read. Parquet files carry their own schema and nulls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadOptions {
    /// Rows scanned for type inference; 0 scans the whole file
    pub infer_schema_length: usize,
    pub delimiter: u8,
    /// Cell texts read as missing. Empty fields are always missing.
    pub null_values: Vec<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            infer_schema_length: 10000,
            delimiter: b',',
            null_values: vec!["NA".to_string()],
        }
    }
}

impl LoadOptions {
    pub fn with_infer_schema_length(infer_schema_length: usize) -> Self {
        Self {
            infer_schema_length,
            ..Self::default()
        }
    }

    fn csv_reader(&self, path: &Path) -> LazyCsvReader {
        let schema_length = if self.infer_schema_length == 0 {
            None
        } else {
            Some(self.infer_schema_length)
        };
        let null_values = (!self.null_values.is_empty()).then(|| {
            NullValues::AllColumns(self.null_values.iter().map(|v| v.as_str().into()).collect())
        });

        LazyCsvReader::new(path)
            .with_has_header(true)
            .with_separator(self.delimiter)
            .with_infer_schema_length(schema_length)
            .with_null_values(null_values)
    }
}

/// Load a dataset from a file (CSV or Parquet based on extension) with the
/// default [`LoadOptions`] and the given schema inference length.
pub fn load_dataset(path: &Path, infer_schema_length: usize) -> Result<DataFrame> {
    load_dataset_with_options(path, &LoadOptions::with_infer_schema_length(infer_schema_length))
}

/// Load a dataset from a file (CSV or Parquet based on extension).
///
/// CSV files are checked for ragged records before parsing: every record
/// must have as many fields as the header.
pub fn load_dataset_with_options(path: &Path, options: &LoadOptions) -> Result<DataFrame> {
    if !path.exists() {
        return Err(BenchError::load(path, "file not found"));
    }

    let extension = file_extension(path);
    let df = match extension.as_str() {
        "csv" => {
            validate_field_counts(path, options.delimiter)?;
            options
                .csv_reader(path)
                .finish()
                .and_then(|lf| lf.collect())
                .map_err(|e| BenchError::load(path, e.to_string()))?
        }
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .and_then(|lf| lf.collect())
            .map_err(|e| BenchError::load(path, e.to_string()))?,
        _ => {
            return Err(BenchError::load(
                path,
                format!(
                    "Unsupported file format: '{}'. Supported formats: csv, parquet",
                    extension
                ),
            ))
        }
    };

    if df.width() == 0 {
        return Err(BenchError::load(path, "file has no columns"));
    }

    debug!(path = %path.display(), rows = df.height(), cols = df.width(), "loaded dataset");
    Ok(df)
}

/// Load a dataset behind a spinner and return it with its shape and
/// estimated memory footprint in MB.
pub fn load_dataset_with_progress(
    path: &Path,
    options: &LoadOptions,
) -> Result<(DataFrame, usize, usize, f64)> {
    let spinner = create_spinner(&format!("Loading {}...", path.display()));
    let df = match load_dataset_with_options(path, options) {
        Ok(df) => df,
        Err(e) => {
            spinner.finish_and_clear();
            return Err(e);
        }
    };
    finish_with_success(&spinner, "Dataset loaded");

    let (rows, cols, memory_mb) = dataset_stats(&df);
    Ok((df, rows, cols, memory_mb))
}

/// Rows, columns and estimated memory usage (MB) of a loaded frame
pub fn dataset_stats(df: &DataFrame) -> (usize, usize, f64) {
    let (rows, cols) = df.shape();
    let memory_mb = df.estimated_size() as f64 / (1024.0 * 1024.0);
    (rows, cols, memory_mb)
}

/// Read only the header of a dataset
pub fn get_column_names(path: &Path, options: &LoadOptions) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(BenchError::load(path, "file not found"));
    }

    let schema = match file_extension(path).as_str() {
        "csv" => options
            .csv_reader(path)
            .finish()
            .and_then(|mut lf| lf.collect_schema())
            .map_err(|e| BenchError::load(path, e.to_string()))?,
        "parquet" => LazyFrame::scan_parquet(path, Default::default())
            .and_then(|mut lf| lf.collect_schema())
            .map_err(|e| BenchError::load(path, e.to_string()))?,
        other => {
            return Err(BenchError::load(
                path,
                format!("Unsupported file format: '{}'", other),
            ))
        }
    };

    Ok(schema.iter_names().map(|name| name.to_string()).collect())
}

/// Verify that every CSV record has the same number of fields as the header.
///
/// A field is quoted only when it starts with a quote. Quoted fields may
/// contain delimiters and newlines, and a doubled quote inside one is an
/// escaped quote. A quote in the middle of an unquoted field is literal.
pub fn validate_field_counts(path: &Path, delimiter: u8) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| BenchError::load(path, format!("unreadable: {}", e)))?;

    let counts = count_record_fields(&content, char::from(delimiter));
    let Some(&(_, header_fields)) = counts.first() else {
        return Err(BenchError::load(path, "file is empty"));
    };

    for &(line, fields) in counts.iter().skip(1) {
        if fields != header_fields {
            return Err(BenchError::load(
                path,
                format!(
                    "inconsistent column count on line {}: expected {} fields, found {}",
                    line, header_fields, fields
                ),
            ));
        }
    }

    Ok(())
}

/// Count the fields of each non-empty record as `(line_number, fields)`.
/// Line numbers are 1-based and refer to the line the record starts on.
fn count_record_fields(content: &str, delimiter: char) -> Vec<(usize, usize)> {
    let mut records = Vec::new();
    let mut in_quotes = false;
    let mut field_start = true;
    let mut fields = 1usize;
    let mut record_has_content = false;
    let mut line = 1usize;
    let mut record_start = 1usize;

    let mut chars = content.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_quotes {
            match ch {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                }
                '"' => in_quotes = false,
                '\n' => line += 1,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' if field_start => {
                in_quotes = true;
                field_start = false;
                record_has_content = true;
            }
            '\n' => {
                line += 1;
                if record_has_content {
                    records.push((record_start, fields));
                }
                fields = 1;
                field_start = true;
                record_has_content = false;
                record_start = line;
            }
            '\r' => {}
            c if c == delimiter => {
                fields += 1;
                field_start = true;
                record_has_content = true;
            }
            _ => {
                field_start = false;
                record_has_content = true;
            }
        }
    }

    if record_has_content {
        records.push((record_start, fields));
    }

    records
}

fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}
