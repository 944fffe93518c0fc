//! Two-class linear discriminant analysis with a shared covariance

use faer::Mat;
use serde::{Deserialize, Serialize};

use super::linalg::{add_ridge, solve_spd};
use super::{check_width, not_fitted, require_both_classes, sigmoid, unknown_param, Classifier, ParamValue};
use crate::pipeline::error::{BenchError, Result};
use crate::pipeline::Dataset;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LdaParams {
    /// Ridge added to the pooled covariance, relative to its mean variance.
    /// One-hot blocks make the covariance singular without it.
    pub reg: f64,
}

impl Default for LdaParams {
    fn default() -> Self {
        Self { reg: 1e-4 }
    }
}

impl LdaParams {
    pub fn set(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name {
            "reg" | "shrinkage" => {
                let v = value.as_f64(name)?;
                if !(0.0..=1.0).contains(&v) {
                    return Err(BenchError::config(format!(
                        "parameter '{}' must be in [0, 1], got {}",
                        name, v
                    )));
                }
                self.reg = v;
            }
            _ => return Err(unknown_param("Linear discriminant", name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LinearDiscriminant {
    params: LdaParams,
    coef: Option<Vec<f64>>,
    intercept: f64,
}

impl LinearDiscriminant {
    pub fn new(params: LdaParams) -> Self {
        Self {
            params,
            coef: None,
            intercept: 0.0,
        }
    }

    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coef.as_deref()
    }
}

fn class_mean(data: &Dataset, positive: bool) -> (Vec<f64>, usize) {
    let p = data.n_features();
    let mut mean = vec![0.0; p];
    let mut count = 0usize;
    for (x, &y) in data.features.iter().zip(&data.labels) {
        if (y > 0.5) == positive {
            count += 1;
            for (m, v) in mean.iter_mut().zip(x) {
                *m += v;
            }
        }
    }
    for m in &mut mean {
        *m /= count.max(1) as f64;
    }
    (mean, count)
}

impl Classifier for LinearDiscriminant {
    fn name(&self) -> &str {
        "Linear discriminant"
    }

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        require_both_classes(data, self.name())?;

        let n = data.n_samples();
        let p = data.n_features();
        let (mu0, n0) = class_mean(data, false);
        let (mu1, n1) = class_mean(data, true);

        // rows centred on their own class mean
        let mut z = Mat::<f64>::zeros(n, p);
        for (row, (x, &y)) in data.features.iter().zip(&data.labels).enumerate() {
            let mu = if y > 0.5 { &mu1 } else { &mu0 };
            for col in 0..p {
                z[(row, col)] = x[col] - mu[col];
            }
        }

        // pooled within-class covariance: Z^T Z / (n - 2)
        let scatter = z.transpose() * &z;
        let dof = (n.saturating_sub(2)).max(1) as f64;
        let mut cov = Mat::<f64>::zeros(p, p);
        for i in 0..p {
            for j in 0..p {
                cov[(i, j)] = scatter[(i, j)] / dof;
            }
        }

        let mean_var = (0..p).map(|i| cov[(i, i)]).sum::<f64>() / p.max(1) as f64;
        add_ridge(&mut cov, self.params.reg * mean_var.max(1e-12) + 1e-12);

        let diff: Vec<f64> = mu1.iter().zip(&mu0).map(|(a, b)| a - b).collect();
        let coef = solve_spd(&cov, &diff).ok_or_else(|| {
            BenchError::value("Linear discriminant: covariance is not positive definite")
        })?;

        let midpoint: f64 = coef
            .iter()
            .zip(mu0.iter().zip(&mu1))
            .map(|(w, (a, b))| w * (a + b) / 2.0)
            .sum();
        let log_prior = (n1 as f64 / n0 as f64).ln();

        self.intercept = log_prior - midpoint;
        self.coef = Some(coef);
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let coef = self.coef.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        check_width(features, coef.len(), self.name())?;
        Ok(features
            .iter()
            .map(|x| {
                let score: f64 = x.iter().zip(coef).map(|(v, w)| v * w).sum();
                sigmoid(score + self.intercept)
            })
            .collect())
    }
}
