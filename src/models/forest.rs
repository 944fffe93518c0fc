//! Random forest of bootstrapped CART trees

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{parse_max_depth, DecisionTree, MaxFeatures, TreeParams};
use super::{check_width, not_fitted, unknown_param, Classifier, ParamValue};
use crate::pipeline::error::{BenchError, Result};
use crate::pipeline::Dataset;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    /// Tree `i` uses `seed + i` for both its bootstrap draw and its
    /// feature sampling
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn set(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => {
                let n = value.as_usize(name)?;
                if n == 0 {
                    return Err(BenchError::config("n_estimators must be at least 1"));
                }
                self.n_estimators = n;
            }
            "max_depth" => self.max_depth = parse_max_depth(name, value)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?.max(2),
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?.max(1),
            "max_features" => self.max_features = MaxFeatures::from_param(name, value)?,
            "bootstrap" => {
                self.bootstrap = match value {
                    ParamValue::Int(i) => *i != 0,
                    ParamValue::Text(t) => t.eq_ignore_ascii_case("true"),
                    ParamValue::Float(_) => {
                        return Err(BenchError::config("bootstrap expects true/false"))
                    }
                }
            }
            "seed" | "random_state" => self.seed = value.as_usize(name)? as u64,
            _ => return Err(unknown_param("Random forest", name)),
        }
        Ok(())
    }

    fn tree_params(&self, index: usize) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
            seed: self.seed.wrapping_add(index as u64),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
    importances: Vec<f64>,
    n_features: usize,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            importances: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "Random forest"
    }

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        let n = data.n_samples();
        if n == 0 {
            return Err(BenchError::value("Random forest: no training rows"));
        }
        self.n_features = data.n_features();

        // Trees are built in parallel on whatever rayon pool is active;
        // each has its own seed so the result is the same for any pool size.
        let trees: Vec<DecisionTree> = (0..self.params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let tree_params = self.params.tree_params(i);
                let indices: Vec<usize> = if self.params.bootstrap {
                    let mut rng = ChaCha8Rng::seed_from_u64(tree_params.seed);
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                let mut tree = DecisionTree::new(tree_params);
                tree.fit_indices(data, &indices)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut importances = vec![0.0; self.n_features];
        for tree in &trees {
            if let Some(tree_importances) = tree.feature_importances() {
                for (total, imp) in importances.iter_mut().zip(tree_importances) {
                    *total += imp;
                }
            }
        }
        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut importances {
                *imp /= sum;
            }
        }

        tracing::debug!(trees = trees.len(), "random forest fitted");
        self.trees = trees;
        self.importances = importances;
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        if self.trees.is_empty() {
            return Err(not_fitted(self.name()));
        }
        check_width(features, self.n_features, self.name())?;

        let mut totals = vec![0.0; features.len()];
        for tree in &self.trees {
            for (total, p) in totals.iter_mut().zip(tree.predict_proba(features)?) {
                *total += p;
            }
        }
        let n_trees = self.trees.len() as f64;
        Ok(totals.into_iter().map(|t| t / n_trees).collect())
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        if self.trees.is_empty() {
            None
        } else {
            Some(self.importances.clone())
        }
    }
}
