//! L2-regularised logistic regression fitted by Newton's method

use faer::Mat;
use serde::{Deserialize, Serialize};

use super::linalg::{add_ridge, solve_spd};
use super::{check_width, not_fitted, require_both_classes, sigmoid, unknown_param, Classifier, ParamValue};
use crate::pipeline::error::{BenchError, Result};
use crate::pipeline::Dataset;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Inverse regularisation strength; the intercept is not penalised
    pub c: f64,
    pub max_iter: usize,
    /// Stop when the largest Newton step component falls below this
    pub tol: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 100,
            tol: 1e-8,
        }
    }
}

impl LogisticParams {
    pub fn set(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name.to_lowercase().as_str() {
            "c" => self.c = value.as_positive_f64(name)?,
            "max_iter" => self.max_iter = value.as_usize(name)?,
            "tol" => self.tol = value.as_positive_f64(name)?,
            _ => return Err(unknown_param("Logistic regression", name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    params: LogisticParams,
    weights: Option<Vec<f64>>,
    intercept: f64,
    n_iter: usize,
}

impl LogisticRegression {
    pub fn new(params: LogisticParams) -> Self {
        Self {
            params,
            weights: None,
            intercept: 0.0,
            n_iter: 0,
        }
    }

    pub fn weights(&self) -> Option<&[f64]> {
        self.weights.as_deref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Newton iterations used by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Penalised negative log-likelihood of `theta = [w..., b]`
    fn objective(&self, data: &Dataset, theta: &[f64]) -> f64 {
        let p = data.n_features();
        let mut loss = 0.0;
        for (x, &y) in data.features.iter().zip(&data.labels) {
            let z = linear(x, &theta[..p], theta[p]);
            // log(1 + e^z) - y z, computed without overflow
            loss += if z > 0.0 {
                z + (-z).exp().ln_1p()
            } else {
                z.exp().ln_1p()
            } - y * z;
        }
        let penalty: f64 = theta[..p].iter().map(|w| w * w).sum::<f64>() / (2.0 * self.params.c);
        loss + penalty
    }
}

#[inline]
fn linear(x: &[f64], w: &[f64], b: f64) -> f64 {
    x.iter().zip(w).map(|(xi, wi)| xi * wi).sum::<f64>() + b
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &str {
        "Logistic regression"
    }

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        require_both_classes(data, self.name())?;

        let p = data.n_features();
        let dim = p + 1;
        let mut theta = vec![0.0; dim];
        let mut objective = self.objective(data, &theta);
        let reg = 1.0 / self.params.c;

        self.n_iter = 0;
        for iter in 0..self.params.max_iter {
            self.n_iter = iter + 1;

            let mut grad = vec![0.0; dim];
            let mut hess = Mat::<f64>::zeros(dim, dim);
            for (x, &y) in data.features.iter().zip(&data.labels) {
                let prob = sigmoid(linear(x, &theta[..p], theta[p]));
                let residual = prob - y;
                let w = (prob * (1.0 - prob)).max(1e-12);
                for a in 0..dim {
                    let xa = if a < p { x[a] } else { 1.0 };
                    grad[a] += residual * xa;
                    for b in 0..=a {
                        let xb = if b < p { x[b] } else { 1.0 };
                        hess[(a, b)] += w * xa * xb;
                    }
                }
            }
            for a in 0..dim {
                for b in 0..a {
                    hess[(b, a)] = hess[(a, b)];
                }
            }
            for j in 0..p {
                grad[j] += reg * theta[j];
            }
            add_ridge(&mut hess, 1e-10);
            for j in 0..p {
                hess[(j, j)] += reg;
            }

            let step = solve_spd(&hess, &grad).ok_or_else(|| {
                BenchError::value("Logistic regression: Hessian is not positive definite")
            })?;

            // backtracking keeps the penalised objective non-increasing
            let mut t = 1.0;
            let mut candidate: Vec<f64>;
            let mut candidate_objective;
            loop {
                candidate = theta.iter().zip(&step).map(|(th, s)| th - t * s).collect();
                candidate_objective = self.objective(data, &candidate);
                if candidate_objective <= objective || t < 1e-8 {
                    break;
                }
                t *= 0.5;
            }

            let max_step = step.iter().fold(0.0f64, |m, s| m.max((t * s).abs()));
            theta = candidate;
            objective = candidate_objective;

            if max_step < self.params.tol {
                break;
            }
        }

        tracing::trace!(iterations = self.n_iter, objective, "logistic regression converged");
        self.intercept = theta[p];
        theta.truncate(p);
        self.weights = Some(theta);
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let weights = self.weights.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        check_width(features, weights.len(), self.name())?;
        Ok(features
            .iter()
            .map(|x| sigmoid(linear(x, weights, self.intercept)))
            .collect())
    }
}
