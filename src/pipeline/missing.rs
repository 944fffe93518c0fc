//! Missing value analysis and mode imputation

use std::collections::BTreeMap;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::{BenchError, Result};
use super::frame::{column_as_f64, column_as_strings, is_numeric, require_column, with_column};

/// Share of null values per column, sorted descending
pub fn analyze_missing_values(df: &DataFrame) -> Vec<(String, f64)> {
    if df.height() == 0 {
        return Vec::new();
    }

    let rows = df.height() as f64;
    let mut ratios: Vec<(String, f64)> = df
        .get_columns()
        .iter()
        .map(|col| (col.name().to_string(), col.null_count() as f64 / rows))
        .collect();

    ratios.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ratios
}

/// Columns (other than `exclude`) that still contain nulls
pub fn columns_with_missing(df: &DataFrame, exclude: &[&str]) -> Vec<(String, usize)> {
    df.get_columns()
        .iter()
        .filter(|col| col.null_count() > 0 && !exclude.contains(&col.name().as_str()))
        .map(|col| (col.name().to_string(), col.null_count()))
        .collect()
}

/// Value used to fill nulls in one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

impl std::fmt::Display for FillValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillValue::Number(v) => write!(f, "{}", v),
            FillValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Most frequent non-null value of a column.
///
/// Ties go to the smallest value (numeric order for numeric columns,
/// lexicographic otherwise). Fails when the column has no values at all.
pub fn column_mode(df: &DataFrame, name: &str) -> Result<FillValue> {
    let col = require_column(df, name)?;

    let mode = if is_numeric(col) {
        let mut counts: Vec<(f64, usize)> = Vec::new();
        for v in column_as_f64(df, name)?.into_iter().flatten() {
            match counts.iter_mut().find(|(value, _)| *value == v) {
                Some(entry) => entry.1 += 1,
                None => counts.push((v, 1)),
            }
        }
        counts.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then(a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        });
        counts.first().map(|(v, _)| FillValue::Number(*v))
    } else {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for v in column_as_strings(df, name)?.into_iter().flatten() {
            *counts.entry(v).or_insert(0) += 1;
        }
        // BTreeMap iterates in key order, so max_by_key keeps the last max;
        // reverse to keep the smallest key among ties.
        counts
            .into_iter()
            .rev()
            .max_by_key(|(_, count)| *count)
            .map(|(v, _)| FillValue::Text(v))
    };

    mode.ok_or_else(|| {
        BenchError::value(format!(
            "cannot impute column '{}': it has no non-null values",
            name
        ))
    })
}

/// Return a copy of `df` with nulls in `name` replaced by `fill`.
pub fn fill_missing(df: &DataFrame, name: &str, fill: &FillValue) -> Result<DataFrame> {
    let col = require_column(df, name)?;
    if col.null_count() == 0 {
        return Ok(df.clone());
    }

    let filled = match fill {
        FillValue::Number(v) => {
            let values: Vec<f64> = column_as_f64(df, name)?
                .into_iter()
                .map(|x| x.unwrap_or(*v))
                .collect();
            Column::new(name.into(), values)
        }
        FillValue::Text(s) => {
            let values: Vec<String> = column_as_strings(df, name)?
                .into_iter()
                .map(|x| x.unwrap_or_else(|| s.clone()))
                .collect();
            Column::new(name.into(), values)
        }
    };

    with_column(df, filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_of_string_column() {
        let df = df! {
            "gender" => [Some("M"), Some("F"), None, Some("F"), Some("M"), Some("F")],
        }
        .unwrap();
        assert_eq!(
            column_mode(&df, "gender").unwrap(),
            FillValue::Text("F".to_string())
        );
    }

    #[test]
    fn test_mode_tie_picks_smallest() {
        let df = df! { "gender" => ["M", "F", "M", "F"] }.unwrap();
        assert_eq!(
            column_mode(&df, "gender").unwrap(),
            FillValue::Text("F".to_string())
        );

        let df = df! { "n" => [3.0f64, 1.0, 3.0, 1.0] }.unwrap();
        assert_eq!(column_mode(&df, "n").unwrap(), FillValue::Number(1.0));
    }

    #[test]
    fn test_mode_of_all_null_column_fails() {
        let df = df! { "gender" => [None::<&str>, None] }.unwrap();
        assert!(column_mode(&df, "gender").is_err());
    }

    #[test]
    fn test_fill_missing_preserves_rows_and_position() {
        let df = df! {
            "age" => [30.0f64, 40.0, 50.0],
            "gender" => [Some("F"), None, Some("M")],
            "outcome" => [0i32, 1, 0],
        }
        .unwrap();

        let filled = fill_missing(&df, "gender", &FillValue::Text("F".into())).unwrap();
        assert_eq!(filled.height(), 3);
        assert_eq!(filled.get_column_names(), df.get_column_names());
        assert_eq!(
            column_as_strings(&filled, "gender").unwrap(),
            vec![Some("F".into()), Some("F".into()), Some("M".into())]
        );
        // input untouched
        assert_eq!(df.column("gender").unwrap().null_count(), 1);
    }

    #[test]
    fn test_analyze_missing_sorted_descending() {
        let df = df! {
            "a" => [Some(1.0f64), None, None, Some(4.0)],
            "b" => [Some(1.0f64), Some(2.0), None, Some(4.0)],
            "c" => [1.0f64, 2.0, 3.0, 4.0],
        }
        .unwrap();
        let ratios = analyze_missing_values(&df);
        assert_eq!(ratios[0], ("a".to_string(), 0.5));
        assert_eq!(ratios[1], ("b".to_string(), 0.25));
        assert_eq!(ratios[2], ("c".to_string(), 0.0));
    }

    #[test]
    fn test_columns_with_missing_excludes() {
        let df = df! {
            "gender" => [Some("F"), None],
            "age" => [Some(1.0f64), None],
        }
        .unwrap();
        let missing = columns_with_missing(&df, &["gender"]);
        assert_eq!(missing, vec![("age".to_string(), 1)]);
    }
}
