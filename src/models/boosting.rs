//! Gradient-boosted trees on the logistic loss
//!
//! Second-order boosting in the XGBoost style: each round fits a
//! regression tree to the gradients and hessians of the log-loss, with L2
//! regularisation on leaf weights and a minimum child hessian. An optional
//! evaluation set drives early stopping.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::tree::parse_max_depth;
use super::{check_width, not_fitted, require_both_classes, sigmoid, unknown_param, Classifier, ParamValue};
use crate::pipeline::error::{BenchError, Result};
use crate::pipeline::Dataset;

/// Smallest loss reduction treated as a real split
const MIN_SPLIT_GAIN: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: Option<usize>,
    /// L2 penalty on leaf weights
    pub lambda: f64,
    /// Minimum loss reduction to split
    pub gamma: f64,
    /// Minimum hessian sum in a child
    pub min_child_weight: f64,
    /// Initial probability for every row
    pub base_score: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: Some(6),
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
            base_score: 0.5,
        }
    }
}

impl BoostingParams {
    pub fn set(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "n_estimators" => {
                let n = value.as_usize(name)?;
                if n == 0 {
                    return Err(BenchError::config("n_estimators must be at least 1"));
                }
                self.n_estimators = n;
            }
            "learning_rate" | "eta" => self.learning_rate = value.as_positive_f64(name)?,
            "max_depth" => self.max_depth = parse_max_depth(name, value)?,
            "lambda" | "reg_lambda" => self.lambda = non_negative(name, value)?,
            "gamma" => self.gamma = non_negative(name, value)?,
            "min_child_weight" => self.min_child_weight = non_negative(name, value)?,
            "base_score" => {
                let v = value.as_f64(name)?;
                if !(v > 0.0 && v < 1.0) {
                    return Err(BenchError::config("base_score must be in (0, 1)"));
                }
                self.base_score = v;
            }
            _ => return Err(unknown_param("Gradient boosting", name)),
        }
        Ok(())
    }
}

fn non_negative(name: &str, value: &ParamValue) -> Result<f64> {
    let v = value.as_f64(name)?;
    if v < 0.0 {
        return Err(BenchError::config(format!(
            "parameter '{}' must be >= 0, got {}",
            name, v
        )));
    }
    Ok(v)
}

/// Outcome of an early-stopped fit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EarlyStopping {
    /// Patience: rounds without improvement before stopping
    pub rounds: usize,
    /// 0-based round with the lowest evaluation log-loss; the model keeps
    /// trees `0..=best_iteration`
    pub best_iteration: usize,
    pub best_score: f64,
    /// Rounds actually trained before stopping
    pub stopped_at: usize,
    /// Evaluation log-loss after each trained round
    pub history: Vec<f64>,
}

#[derive(Debug, Clone)]
enum RegNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<RegNode>,
        right: Box<RegNode>,
    },
}

impl RegNode {
    fn predict(&self, x: &[f64]) -> f64 {
        match self {
            RegNode::Leaf { value } => *value,
            RegNode::Split {
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
}

/// Per-feature split statistics accumulated over all rounds
#[derive(Debug, Clone, Default)]
struct GainStats {
    total_gain: Vec<f64>,
    splits: Vec<usize>,
}

struct TreeBuilder<'a> {
    data: &'a Dataset,
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a BoostingParams,
}

impl TreeBuilder<'_> {
    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.lambda) * self.params.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.lambda)
    }

    fn build(&self, indices: &[usize], depth: usize, stats: &mut GainStats) -> RegNode {
        let g: f64 = indices.iter().map(|&i| self.grad[i]).sum();
        let h: f64 = indices.iter().map(|&i| self.hess[i]).sum();
        let leaf = RegNode::Leaf {
            value: self.leaf_weight(g, h),
        };

        if self.params.max_depth.is_some_and(|d| depth >= d)
            || indices.len() < 2
            || h < 2.0 * self.params.min_child_weight
        {
            return leaf;
        }

        let parent_score = self.score(g, h);
        let mut best: Option<(f64, usize, f64)> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..self.data.n_features() {
            let x = |i: usize| self.data.features[i][feature];
            sorted.sort_by(|&a, &b| x(a).partial_cmp(&x(b)).unwrap_or(Ordering::Equal));

            let mut gl = 0.0;
            let mut hl = 0.0;
            for k in 1..sorted.len() {
                gl += self.grad[sorted[k - 1]];
                hl += self.hess[sorted[k - 1]];
                let lo = x(sorted[k - 1]);
                let hi = x(sorted[k]);
                if lo >= hi {
                    continue;
                }
                let hr = h - hl;
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }
                let gr = g - gl;
                let gain = 0.5 * (self.score(gl, hl) + self.score(gr, hr) - parent_score)
                    - self.params.gamma;
                if gain > MIN_SPLIT_GAIN && best.map_or(true, |(b, _, _)| gain > b) {
                    let mid = lo + (hi - lo) / 2.0;
                    let threshold = if mid >= hi { lo } else { mid };
                    best = Some((gain, feature, threshold));
                }
            }
        }

        let Some((gain, feature, threshold)) = best else {
            return leaf;
        };
        stats.total_gain[feature] += gain;
        stats.splits[feature] += 1;

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.data.features[i][feature] <= threshold);
        RegNode::Split {
            feature,
            threshold,
            left: Box::new(self.build(&left, depth + 1, stats)),
            right: Box::new(self.build(&right, depth + 1, stats)),
        }
    }
}

fn log_loss(labels: &[f64], margins: &[f64]) -> f64 {
    let eps = 1e-15;
    let total: f64 = labels
        .iter()
        .zip(margins)
        .map(|(&y, &m)| {
            let p = sigmoid(m).clamp(eps, 1.0 - eps);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / labels.len().max(1) as f64
}

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    params: BoostingParams,
    trees: Vec<RegNode>,
    base_margin: f64,
    n_features: usize,
    importances: Vec<f64>,
    fitted: bool,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            base_margin: 0.0,
            n_features: 0,
            importances: Vec::new(),
            fitted: false,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fit while tracking log-loss on `eval`; stop once it has not improved
    /// for `rounds` consecutive rounds and keep only the trees up to the
    /// best round.
    pub fn fit_with_eval(&mut self, train: &Dataset, eval: &Dataset, rounds: usize) -> Result<EarlyStopping> {
        if rounds == 0 {
            return Err(BenchError::config("early stopping rounds must be at least 1"));
        }
        if eval.n_samples() == 0 {
            return Err(BenchError::value("Gradient boosting: evaluation set is empty"));
        }
        check_width(&eval.features, train.n_features(), self.name())?;

        let mut report = EarlyStopping {
            rounds,
            best_iteration: 0,
            best_score: f64::INFINITY,
            stopped_at: 0,
            history: Vec::new(),
        };
        self.boost(train, Some((eval, &mut report)))?;
        self.trees.truncate(report.best_iteration + 1);

        tracing::debug!(
            best_iteration = report.best_iteration,
            best_score = report.best_score,
            stopped_at = report.stopped_at,
            "early stopping finished"
        );
        Ok(report)
    }

    fn boost(&mut self, train: &Dataset, mut eval: Option<(&Dataset, &mut EarlyStopping)>) -> Result<()> {
        require_both_classes(train, self.name())?;

        let n = train.n_samples();
        let p = self.params.base_score;
        self.base_margin = (p / (1.0 - p)).ln();
        self.n_features = train.n_features();
        self.trees.clear();

        let mut margins = vec![self.base_margin; n];
        let mut eval_margins = eval
            .as_ref()
            .map(|(data, _)| vec![self.base_margin; data.n_samples()]);
        let mut stats = GainStats {
            total_gain: vec![0.0; self.n_features],
            splits: vec![0; self.n_features],
        };
        let patience = eval.as_ref().map(|(_, report)| report.rounds);
        let mut rounds_since_best = 0usize;
        let indices: Vec<usize> = (0..n).collect();

        for round in 0..self.params.n_estimators {
            let mut grad = vec![0.0; n];
            let mut hess = vec![0.0; n];
            for i in 0..n {
                let prob = sigmoid(margins[i]);
                grad[i] = prob - train.labels[i];
                hess[i] = (prob * (1.0 - prob)).max(1e-16);
            }

            let builder = TreeBuilder {
                data: train,
                grad: &grad,
                hess: &hess,
                params: &self.params,
            };
            let tree = builder.build(&indices, 0, &mut stats);
            for (m, x) in margins.iter_mut().zip(&train.features) {
                *m += tree.predict(x);
            }

            if let (Some((data, report)), Some(em)) = (eval.as_mut(), eval_margins.as_mut()) {
                for (m, x) in em.iter_mut().zip(&data.features) {
                    *m += tree.predict(x);
                }
                let loss = log_loss(&data.labels, em);
                report.history.push(loss);
                report.stopped_at = round + 1;
                tracing::trace!(round, loss, "boosting round");

                if loss < report.best_score {
                    report.best_score = loss;
                    report.best_iteration = round;
                    rounds_since_best = 0;
                } else {
                    rounds_since_best += 1;
                }
            }

            self.trees.push(tree);

            if patience.is_some_and(|p| rounds_since_best >= p) {
                break;
            }
        }

        // average gain per split, normalised
        let mut importances: Vec<f64> = stats
            .total_gain
            .iter()
            .zip(&stats.splits)
            .map(|(&gain, &count)| if count > 0 { gain / count as f64 } else { 0.0 })
            .collect();
        let sum: f64 = importances.iter().sum();
        if sum > 0.0 {
            for imp in &mut importances {
                *imp /= sum;
            }
        }
        self.importances = importances;
        self.fitted = true;
        Ok(())
    }
}

impl Classifier for GradientBoosting {
    fn name(&self) -> &str {
        "Gradient boosting"
    }

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.boost(data, None)
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        if !self.fitted {
            return Err(not_fitted(self.name()));
        }
        check_width(features, self.n_features, self.name())?;
        Ok(features
            .iter()
            .map(|x| {
                let margin = self.base_margin + self.trees.iter().map(|t| t.predict(x)).sum::<f64>();
                sigmoid(margin)
            })
            .collect())
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        self.fitted.then(|| self.importances.clone())
    }
}
