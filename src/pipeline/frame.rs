//! Small helpers for pulling typed values out of polars frames

use polars::prelude::*;

use super::error::{BenchError, Result};

/// Look up a column, turning a missing name into a data error
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|_| {
        BenchError::value(format!(
            "column '{}' not found. Available columns: {:?}",
            name,
            column_names(df)
        ))
    })
}

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

/// Whether a column holds numbers (booleans count as 0/1)
pub fn is_numeric(col: &Column) -> bool {
    col.dtype().is_primitive_numeric() || matches!(col.dtype(), DataType::Boolean)
}

/// Column values as `f64`, nulls preserved
pub fn column_as_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = require_column(df, name)?;
    if !is_numeric(col) {
        return Err(BenchError::value(format!(
            "column '{}' is not numeric (dtype {})",
            name,
            col.dtype()
        )));
    }
    let float_col = col.cast(&DataType::Float64)?;
    Ok(float_col.f64()?.into_iter().collect())
}

/// Column values rendered as strings, nulls preserved.
///
/// Integral floats render without a fractional part so that `1` and `1.0`
/// name the same category.
pub fn column_as_strings(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = require_column(df, name)?;
    let values = match col.dtype() {
        DataType::String => col
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
        DataType::Float32 | DataType::Float64 => col
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.map(format_number))
            .collect(),
        DataType::Boolean => col
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()))
            .collect(),
        _ => col
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
    };
    Ok(values)
}

/// Return a copy of `df` with `column` replacing the same-named column in
/// place, or appended when the name is new.
pub fn with_column(df: &DataFrame, column: Column) -> Result<DataFrame> {
    let mut out = df.clone();
    out.with_column(column)?;
    Ok(out)
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}
