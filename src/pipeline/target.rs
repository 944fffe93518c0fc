//! Binary target validation and class balance

use polars::prelude::*;
use serde::Serialize;

use super::error::{BenchError, Result};
use super::frame::{column_as_f64, require_column};

/// Tolerance for floating point comparison when checking binary 0/1 values
const TOLERANCE: f64 = 1e-9;

/// Class counts of a binary target
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassBalance {
    pub negatives: usize,
    pub positives: usize,
    /// Share of rows with target = 1
    pub positive_rate: f64,
}

impl ClassBalance {
    pub fn from_labels(labels: &[f64]) -> Self {
        let positives = labels.iter().filter(|&&y| y >= 0.5).count();
        let negatives = labels.len() - positives;
        let positive_rate = if labels.is_empty() {
            0.0
        } else {
            positives as f64 / labels.len() as f64
        };
        Self {
            negatives,
            positives,
            positive_rate,
        }
    }

    pub fn total(&self) -> usize {
        self.negatives + self.positives
    }

    /// Smallest class size
    pub fn minority(&self) -> usize {
        self.negatives.min(self.positives)
    }

    pub fn has_both_classes(&self) -> bool {
        self.negatives > 0 && self.positives > 0
    }
}

/// Validate that the target column exists, has no nulls and holds only
/// 0 and 1 (integer, float or boolean encodings).
pub fn validate_binary_target(df: &DataFrame, target: &str) -> Result<()> {
    let col = require_column(df, target)?;

    if col.len() == 0 {
        return Err(BenchError::value(format!(
            "target column '{}' is empty",
            target
        )));
    }

    if col.null_count() > 0 {
        return Err(BenchError::value(format!(
            "target column '{}' contains {} null value(s)",
            target,
            col.null_count()
        )));
    }

    let values = column_as_f64(df, target).map_err(|_| {
        BenchError::value(format!(
            "target column '{}' must be binary 0/1, found dtype {}",
            target,
            col.dtype()
        ))
    })?;

    let mut unique: Vec<f64> = Vec::new();
    for v in values.into_iter().flatten() {
        if !unique.iter().any(|u| (u - v).abs() < TOLERANCE) {
            unique.push(v);
        }
    }

    let is_binary = unique
        .iter()
        .all(|&v| v.abs() < TOLERANCE || (v - 1.0).abs() < TOLERANCE);

    if !is_binary {
        unique.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        return Err(BenchError::value(format!(
            "target column '{}' must be binary (0/1). Found {} unique values: {:?}",
            target,
            unique.len(),
            unique
        )));
    }

    Ok(())
}

/// Target values as 0.0/1.0 after validation
pub fn target_labels(df: &DataFrame, target: &str) -> Result<Vec<f64>> {
    validate_binary_target(df, target)?;
    Ok(column_as_f64(df, target)?
        .into_iter()
        .map(|v| if v.unwrap_or(0.0) >= 0.5 { 1.0 } else { 0.0 })
        .collect())
}

/// Class balance of the target column
pub fn class_balance(df: &DataFrame, target: &str) -> Result<ClassBalance> {
    Ok(ClassBalance::from_labels(&target_labels(df, target)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_binary_int_target() {
        let df = df! {
            "outcome" => [0i32, 1, 0, 1, 0, 1],
            "age" => [20.0f64, 30.0, 40.0, 50.0, 60.0, 70.0],
        }
        .unwrap();
        assert!(validate_binary_target(&df, "outcome").is_ok());
    }

    #[test]
    fn test_validate_binary_float_and_bool_target() {
        let df = df! {
            "f" => [0.0f64, 1.0, 0.0],
            "b" => [true, false, true],
        }
        .unwrap();
        assert!(validate_binary_target(&df, "f").is_ok());
        assert!(validate_binary_target(&df, "b").is_ok());
    }

    #[test]
    fn test_single_class_target_is_still_binary() {
        let df = df! { "outcome" => [0i32, 0, 0] }.unwrap();
        assert!(validate_binary_target(&df, "outcome").is_ok());
        let balance = class_balance(&df, "outcome").unwrap();
        assert!(!balance.has_both_classes());
    }

    #[test]
    fn test_non_binary_target_rejected() {
        let df = df! { "outcome" => [0i32, 1, 2] }.unwrap();
        let err = validate_binary_target(&df, "outcome").unwrap_err();
        assert!(matches!(err, BenchError::Value(_)));
        assert!(err.to_string().contains("3 unique values"));
    }

    #[test]
    fn test_string_target_rejected() {
        let df = df! { "outcome" => ["yes", "no"] }.unwrap();
        assert!(validate_binary_target(&df, "outcome").is_err());
    }

    #[test]
    fn test_null_target_rejected() {
        let df = df! { "outcome" => [Some(0i32), None, Some(1)] }.unwrap();
        let err = validate_binary_target(&df, "outcome").unwrap_err();
        assert!(err.to_string().contains("null"));
    }

    #[test]
    fn test_missing_target_column() {
        let df = df! { "age" => [1.0f64] }.unwrap();
        assert!(validate_binary_target(&df, "outcome").is_err());
    }

    #[test]
    fn test_class_balance_counts() {
        let balance = ClassBalance::from_labels(&[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(balance.negatives, 3);
        assert_eq!(balance.positives, 1);
        assert_eq!(balance.minority(), 1);
        assert!((balance.positive_rate - 0.25).abs() < 1e-12);
    }
}
