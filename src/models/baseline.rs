//! Constant "always negative" baseline

use super::{check_width, not_fitted, Classifier};
use crate::pipeline::error::{BenchError, Result};
use crate::pipeline::Dataset;

/// Predicts probability 0 for every row. Any ranking metric on it is the
/// chance level, which is what the other models are measured against.
#[derive(Debug, Clone, Default)]
pub struct ZeroClassifier {
    n_features: Option<usize>,
}

impl ZeroClassifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for ZeroClassifier {
    fn name(&self) -> &str {
        "Zero baseline"
    }

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        if data.n_samples() == 0 {
            return Err(BenchError::value("Zero baseline: no training rows"));
        }
        self.n_features = Some(data.n_features());
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let n_features = self.n_features.ok_or_else(|| not_fitted(self.name()))?;
        check_width(features, n_features, self.name())?;
        Ok(vec![0.0; features.len()])
    }
}
