//! CART classification tree (Gini impurity)

use std::cmp::Ordering;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::{check_width, not_fitted, unknown_param, Classifier, ParamValue};
use crate::pipeline::error::{BenchError, Result};
use crate::pipeline::Dataset;

/// How many features each split may look at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaxFeatures {
    All,
    Sqrt,
    Log2,
    Count(usize),
}

impl MaxFeatures {
    /// Number of candidate features out of `n_features`, at least 1
    pub fn resolve(&self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Count(k) => *k,
        };
        k.clamp(1, n_features.max(1))
    }

    pub fn from_param(name: &str, value: &ParamValue) -> Result<Self> {
        match value {
            ParamValue::Int(_) => {
                let k = value.as_usize(name)?;
                if k == 0 {
                    return Err(BenchError::config(format!("parameter '{}' must be >= 1", name)));
                }
                Ok(MaxFeatures::Count(k))
            }
            ParamValue::Text(t) => match t.to_lowercase().as_str() {
                "all" | "none" => Ok(MaxFeatures::All),
                "sqrt" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                _ => Err(BenchError::config(format!(
                    "parameter '{}' expects an integer, 'sqrt', 'log2' or 'all', got '{}'",
                    name, t
                ))),
            },
            ParamValue::Float(f) => Err(BenchError::config(format!(
                "parameter '{}' expects an integer count, got {}",
                name, f
            ))),
        }
    }
}

impl std::fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxFeatures::All => write!(f, "all"),
            MaxFeatures::Sqrt => write!(f, "sqrt"),
            MaxFeatures::Log2 => write!(f, "log2"),
            MaxFeatures::Count(k) => write!(f, "{}", k),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            seed: 42,
        }
    }
}

impl TreeParams {
    pub fn set(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "max_depth" => self.max_depth = parse_max_depth(name, value)?,
            "min_samples_split" => self.min_samples_split = value.as_usize(name)?.max(2),
            "min_samples_leaf" => self.min_samples_leaf = value.as_usize(name)?.max(1),
            "max_features" => self.max_features = MaxFeatures::from_param(name, value)?,
            "seed" | "random_state" => self.seed = value.as_usize(name)? as u64,
            _ => return Err(unknown_param("Decision tree", name)),
        }
        Ok(())
    }
}

/// `0` or `none` mean unlimited depth
pub(crate) fn parse_max_depth(name: &str, value: &ParamValue) -> Result<Option<usize>> {
    match value {
        ParamValue::Text(t) if t.eq_ignore_ascii_case("none") => Ok(None),
        other => {
            let depth = other.as_usize(name)?;
            Ok(if depth == 0 { None } else { Some(depth) })
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        proba: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, x: &[f64]) -> f64 {
        match self {
            Node::Leaf { proba } => *proba,
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if x[*feature] <= *threshold {
                    left.predict(x)
                } else {
                    right.predict(x)
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn n_leaves(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
    /// n * impurity decrease
    importance: f64,
}

#[inline]
fn gini(positives: f64, n: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    let p = positives / n;
    2.0 * p * (1.0 - p)
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    params: TreeParams,
    root: Option<Node>,
    importances: Vec<f64>,
    n_features: usize,
}

impl DecisionTree {
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            root: None,
            importances: Vec::new(),
            n_features: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, Node::depth)
    }

    pub fn n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, Node::n_leaves)
    }

    /// Fit on the rows at `indices` (repeats allowed, as in a bootstrap
    /// sample)
    pub(crate) fn fit_indices(&mut self, data: &Dataset, indices: &[usize]) -> Result<()> {
        if indices.is_empty() {
            return Err(BenchError::value("Decision tree: no training rows"));
        }
        self.n_features = data.n_features();
        let mut importances = vec![0.0; self.n_features];
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);

        let root = self.build(data, indices, 0, &mut rng, &mut importances);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.importances = importances;
        self.root = Some(root);
        Ok(())
    }

    fn build(
        &self,
        data: &Dataset,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
        importances: &mut [f64],
    ) -> Node {
        let n = indices.len();
        let positives = indices.iter().filter(|&&i| data.labels[i] > 0.5).count();
        let proba = positives as f64 / n as f64;

        let depth_reached = self.params.max_depth.is_some_and(|d| depth >= d);
        if depth_reached
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || positives == 0
            || positives == n
        {
            return Node::Leaf { proba };
        }

        match self.find_best_split(data, indices, positives, rng) {
            Some(split) => {
                importances[split.feature] += split.importance;
                let left = self.build(data, &split.left, depth + 1, rng, importances);
                let right = self.build(data, &split.right, depth + 1, rng, importances);
                Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            None => Node::Leaf { proba },
        }
    }

    fn find_best_split(
        &self,
        data: &Dataset,
        indices: &[usize],
        positives: usize,
        rng: &mut ChaCha8Rng,
    ) -> Option<BestSplit> {
        let n = indices.len();
        let n_f = n as f64;
        let parent = gini(positives as f64, n_f);
        let min_leaf = self.params.min_samples_leaf;

        let mut candidates: Vec<usize> = (0..self.n_features).collect();
        candidates.shuffle(rng);
        candidates.truncate(self.params.max_features.resolve(self.n_features));

        let mut best_gain = 0.0;
        let mut best: Option<(usize, f64)> = None;
        let mut sorted = indices.to_vec();

        for &feature in &candidates {
            sorted.sort_by(|&a, &b| {
                data.features[a][feature]
                    .partial_cmp(&data.features[b][feature])
                    .unwrap_or(Ordering::Equal)
            });

            let mut left_pos = 0usize;
            for k in 1..n {
                if data.labels[sorted[k - 1]] > 0.5 {
                    left_pos += 1;
                }
                let lo = data.features[sorted[k - 1]][feature];
                let hi = data.features[sorted[k]][feature];
                if lo >= hi || k < min_leaf || n - k < min_leaf {
                    continue;
                }

                let n_left = k as f64;
                let n_right = n_f - n_left;
                let weighted = (n_left * gini(left_pos as f64, n_left)
                    + n_right * gini((positives - left_pos) as f64, n_right))
                    / n_f;
                let gain = parent - weighted;
                if gain > best_gain {
                    best_gain = gain;
                    let mid = lo + (hi - lo) / 2.0;
                    let threshold = if mid >= hi { lo } else { mid };
                    best = Some((feature, threshold));
                }
            }
        }

        let (feature, threshold) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| data.features[i][feature] <= threshold);
        Some(BestSplit {
            feature,
            threshold,
            left,
            right,
            importance: best_gain * n_f,
        })
    }
}

impl Classifier for DecisionTree {
    fn name(&self) -> &str {
        "Decision tree"
    }

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        let indices: Vec<usize> = (0..data.n_samples()).collect();
        self.fit_indices(data, &indices)?;
        tracing::trace!(depth = self.depth(), leaves = self.n_leaves(), "tree grown");
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let root = self.root.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        check_width(features, self.n_features, self.name())?;
        Ok(features.iter().map(|x| root.predict(x)).collect())
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        self.root.as_ref().map(|_| self.importances.clone())
    }
}
