//! Categorical encoders fitted on one table and applied to others

use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::{BenchError, Result};
use super::frame::{column_as_strings, require_column};

/// How categorical columns become numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// One indicator column per level
    #[default]
    OneHot,
    /// One integer code per level, in place
    Ordinal,
}

impl fmt::Display for EncodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodingMode::OneHot => write!(f, "onehot"),
            EncodingMode::Ordinal => write!(f, "ordinal"),
        }
    }
}

impl FromStr for EncodingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "onehot" => Ok(EncodingMode::OneHot),
            "ordinal" | "label" => Ok(EncodingMode::Ordinal),
            _ => Err(format!(
                "Invalid encoding: '{}'. Use 'onehot' or 'ordinal'",
                s
            )),
        }
    }
}

/// Sorted levels of one categorical column, learned from the fitting rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryEncoder {
    column: String,
    levels: Vec<String>,
}

impl CategoryEncoder {
    /// Collect the distinct non-null levels of `column`.
    ///
    /// Levels sort numerically when every level parses as a number, so that
    /// `2` comes before `10`; otherwise they sort lexicographically.
    pub fn fit(df: &DataFrame, column: &str) -> Result<Self> {
        let mut levels: Vec<String> = column_as_strings(df, column)?
            .into_iter()
            .flatten()
            .collect();
        levels.sort();
        levels.dedup();

        if levels.is_empty() {
            return Err(BenchError::value(format!(
                "categorical column '{}' has no non-null values to learn levels from",
                column
            )));
        }

        sort_levels(&mut levels);

        Ok(Self {
            column: column.to_string(),
            levels,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Names of the indicator columns, `<column>_onehot<k>` with k from 1
    pub fn one_hot_names(&self) -> Vec<String> {
        (1..=self.levels.len())
            .map(|k| format!("{}_onehot{}", self.column, k))
            .collect()
    }

    fn level_index(&self, value: &str) -> Option<usize> {
        self.levels.iter().position(|l| l == value)
    }

    /// Indicator columns for `df`. Rows whose value was not seen at fit
    /// time (or is null) get all zeros.
    pub fn one_hot(&self, df: &DataFrame) -> Result<Vec<Column>> {
        let values = column_as_strings(df, &self.column)?;
        let mut indicators = vec![vec![0i32; values.len()]; self.levels.len()];

        for (row, value) in values.iter().enumerate() {
            if let Some(k) = value.as_deref().and_then(|v| self.level_index(v)) {
                indicators[k][row] = 1;
            }
        }

        Ok(self
            .one_hot_names()
            .into_iter()
            .zip(indicators)
            .map(|(name, data)| Column::new(name.into(), data))
            .collect())
    }

    /// Integer codes `0..levels` for `df`. Unseen or null values are errors.
    pub fn ordinal(&self, df: &DataFrame) -> Result<Column> {
        let values = column_as_strings(df, &self.column)?;
        let codes = values
            .iter()
            .enumerate()
            .map(|(row, value)| match value {
                Some(v) => self.level_index(v).map(|k| k as i32).ok_or_else(|| {
                    BenchError::value(format!(
                        "column '{}' row {}: level '{}' was not seen when the encoder was fitted",
                        self.column, row, v
                    ))
                }),
                None => Err(BenchError::value(format!(
                    "column '{}' row {}: null value cannot be ordinal-encoded",
                    self.column, row
                ))),
            })
            .collect::<Result<Vec<i32>>>()?;

        Ok(Column::new(self.column.as_str().into(), codes))
    }
}

fn sort_levels(levels: &mut [String]) {
    let numeric: Option<Vec<f64>> = levels.iter().map(|l| l.parse::<f64>().ok()).collect();
    if numeric.is_some() {
        levels.sort_by(|a, b| {
            let x = a.parse::<f64>().unwrap_or(f64::NAN);
            let y = b.parse::<f64>().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

/// Encode every column of `encoders` in `df`.
///
/// One-hot drops the source columns and appends the indicators after the
/// remaining columns, in encoder order. Ordinal replaces values in place.
pub fn apply_encoders(
    df: &DataFrame,
    encoders: &[CategoryEncoder],
    mode: EncodingMode,
) -> Result<DataFrame> {
    match mode {
        EncodingMode::OneHot => {
            let mut indicator_columns = Vec::new();
            for encoder in encoders {
                indicator_columns.extend(encoder.one_hot(df)?);
            }

            let encoded_names: Vec<&str> = encoders.iter().map(|e| e.column()).collect();
            let kept: Vec<Column> = df
                .get_columns()
                .iter()
                .filter(|c| !encoded_names.contains(&c.name().as_str()))
                .cloned()
                .collect();

            let mut columns = kept;
            columns.extend(indicator_columns);
            Ok(DataFrame::new(columns)?)
        }
        EncodingMode::Ordinal => {
            let mut out = df.clone();
            for encoder in encoders {
                require_column(df, encoder.column())?;
                out.with_column(encoder.ordinal(df)?)?;
            }
            Ok(out)
        }
    }
}
