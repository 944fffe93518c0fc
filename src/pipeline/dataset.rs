//! Dense numeric view of an encoded table, consumed by the classifiers

use polars::prelude::*;

use super::error::{BenchError, Result};
use super::frame::column_as_f64;
use super::target::{target_labels, ClassBalance};

/// Row-major features plus 0/1 labels
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
}

impl Dataset {
    pub fn new(feature_names: Vec<String>, features: Vec<Vec<f64>>, labels: Vec<f64>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(BenchError::value(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if let Some((row, values)) = features
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != feature_names.len())
        {
            return Err(BenchError::value(format!(
                "row {} has {} features, expected {}",
                row,
                values.len(),
                feature_names.len()
            )));
        }
        Ok(Self {
            feature_names,
            features,
            labels,
        })
    }

    /// Every non-target column becomes a feature; all must be numeric and
    /// null-free.
    pub fn from_frame(df: &DataFrame, target: &str) -> Result<Self> {
        let labels = target_labels(df, target)?;
        let feature_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|s| s != target)
            .collect();
        let features = feature_matrix(df, &feature_names)?;
        Self::new(feature_names, features, labels)
    }

    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Rows at `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    pub fn class_balance(&self) -> ClassBalance {
        ClassBalance::from_labels(&self.labels)
    }

    /// Single feature column
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.features.iter().map(|row| row[j]).collect()
    }
}

/// Row-major matrix of the named columns. Nulls and non-numeric columns
/// are errors.
pub fn feature_matrix(df: &DataFrame, names: &[String]) -> Result<Vec<Vec<f64>>> {
    let mut rows = vec![Vec::with_capacity(names.len()); df.height()];
    for name in names {
        let values = column_as_f64(df, name)?;
        for (i, value) in values.into_iter().enumerate() {
            match value {
                Some(v) => rows[i].push(v),
                None => {
                    return Err(BenchError::value(format!(
                        "column '{}' has a missing value at row {}; impute it before modelling",
                        name, i
                    )))
                }
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_frame_excludes_target() {
        let df = df! {
            "age" => [0.1f64, 0.2, 0.3],
            "outcome" => [0i32, 1, 0],
            "flag" => [1i32, 0, 1],
        }
        .unwrap();
        let data = Dataset::from_frame(&df, "outcome").unwrap();
        assert_eq!(data.feature_names, vec!["age", "flag"]);
        assert_eq!(data.features[1], vec![0.2, 0.0]);
        assert_eq!(data.labels, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_null_feature_is_value_error() {
        let df = df! {
            "age" => [Some(0.1f64), None],
            "outcome" => [0i32, 1],
        }
        .unwrap();
        let err = Dataset::from_frame(&df, "outcome").unwrap_err();
        assert!(matches!(err, BenchError::Value(_)));
    }

    #[test]
    fn test_string_feature_is_value_error() {
        let df = df! {
            "device_type" => ["ios", "android"],
            "outcome" => [0i32, 1],
        }
        .unwrap();
        assert!(Dataset::from_frame(&df, "outcome").is_err());
    }

    #[test]
    fn test_subset() {
        let data = Dataset::new(
            vec!["x".into()],
            vec![vec![1.0], vec![2.0], vec![3.0]],
            vec![0.0, 1.0, 1.0],
        )
        .unwrap();
        let sub = data.subset(&[2, 0]);
        assert_eq!(sub.features, vec![vec![3.0], vec![1.0]]);
        assert_eq!(sub.labels, vec![1.0, 0.0]);
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        assert!(Dataset::new(vec!["a".into()], vec![vec![1.0, 2.0]], vec![0.0]).is_err());
        assert!(Dataset::new(vec!["a".into()], vec![vec![1.0]], vec![]).is_err());
    }
}
