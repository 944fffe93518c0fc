//! RBF-kernel support vector classifier with Platt-scaled probabilities
//!
//! The dual problem is solved by SMO with second-order working set
//! selection. Kernel rows are computed on demand and kept in a bounded
//! LRU cache. Probabilities come from a sigmoid fitted to the decision
//! values of the training rows, which preserves the ranking of the raw
//! decision function.

use std::num::NonZeroUsize;
use std::rc::Rc;

use lru::LruCache;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{check_width, not_fitted, require_both_classes, unknown_param, Classifier, ParamValue};
use crate::pipeline::error::Result;
use crate::pipeline::Dataset;

const TAU: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmParams {
    pub c: f64,
    /// Kernel width; `None` uses `1 / (n_features * var(X))`
    pub gamma: Option<f64>,
    /// Stopping tolerance on the KKT gap
    pub tol: f64,
    pub max_iter: usize,
    /// Memory budget of the kernel row cache in MB; at least two rows are
    /// always kept
    pub cache_mb: usize,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: None,
            tol: 1e-3,
            max_iter: 1_000_000,
            cache_mb: 200,
        }
    }
}

impl SvmParams {
    pub fn set(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        match name.to_lowercase().as_str() {
            "c" => self.c = value.as_positive_f64(name)?,
            "gamma" => {
                self.gamma = match value {
                    ParamValue::Text(t) if t == "scale" => None,
                    other => Some(other.as_positive_f64(name)?),
                }
            }
            "tol" => self.tol = value.as_positive_f64(name)?,
            "max_iter" => self.max_iter = value.as_usize(name)?,
            "cache_mb" => self.cache_mb = value.as_usize(name)?,
            _ => return Err(unknown_param("Support vector machine", name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct FittedSvm {
    support_vectors: Vec<Vec<f64>>,
    /// alpha_i * y_i for each support vector
    coefficients: Vec<f64>,
    rho: f64,
    gamma: f64,
    /// Platt sigmoid `1 / (1 + exp(a f + b))`
    platt_a: f64,
    platt_b: f64,
    n_features: usize,
}

impl FittedSvm {
    fn decision(&self, x: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.coefficients)
            .map(|(sv, coef)| coef * rbf(sv, x, self.gamma))
            .sum::<f64>()
            - self.rho
    }
}

#[derive(Debug, Clone)]
pub struct SupportVectorMachine {
    params: SvmParams,
    fitted: Option<FittedSvm>,
}

impl SupportVectorMachine {
    pub fn new(params: SvmParams) -> Self {
        Self {
            params,
            fitted: None,
        }
    }

    /// Raw decision values; positive means class 1
    pub fn decision_function(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        check_width(features, fitted.n_features, self.name())?;
        Ok(features.par_iter().map(|x| fitted.decision(x)).collect())
    }

    pub fn n_support(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.support_vectors.len())
    }
}

#[inline]
fn rbf(a: &[f64], b: &[f64], gamma: f64) -> f64 {
    let d2: f64 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    (-gamma * d2).exp()
}

/// `1 / (n_features * var(X))` over all entries, 1.0 for constant data
fn scale_gamma(data: &Dataset) -> f64 {
    let values: Vec<f64> = data.features.iter().flatten().copied().collect();
    if values.is_empty() {
        return 1.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    if var > 0.0 {
        1.0 / (data.n_features() as f64 * var)
    } else {
        1.0
    }
}

/// Rows of the training kernel matrix, computed when first needed
struct KernelCache<'a> {
    features: &'a [Vec<f64>],
    gamma: f64,
    diag: Vec<f64>,
    rows: LruCache<usize, Rc<[f64]>>,
}

impl<'a> KernelCache<'a> {
    fn new(features: &'a [Vec<f64>], gamma: f64, cache_mb: usize) -> Self {
        let row_bytes = features.len().max(1) * std::mem::size_of::<f64>();
        let capacity = (cache_mb.saturating_mul(1024 * 1024) / row_bytes).max(2);
        Self {
            features,
            gamma,
            diag: features.iter().map(|x| rbf(x, x, gamma)).collect(),
            rows: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    fn capacity(&self) -> usize {
        self.rows.cap().get()
    }

    fn diag(&self, i: usize) -> f64 {
        self.diag[i]
    }

    fn row(&mut self, i: usize) -> Rc<[f64]> {
        if let Some(row) = self.rows.get(&i) {
            return Rc::clone(row);
        }
        let (features, gamma) = (self.features, self.gamma);
        let x = &features[i];
        let row: Rc<[f64]> = features
            .par_iter()
            .map(|z| rbf(x, z, gamma))
            .collect::<Vec<f64>>()
            .into();
        self.rows.put(i, Rc::clone(&row));
        row
    }
}

struct SmoSolution {
    alpha: Vec<f64>,
    /// `Q alpha - e` at the solution
    grad: Vec<f64>,
    rho: f64,
    iterations: usize,
}

/// Solve `min 1/2 a'Qa - e'a` s.t. `0 <= a <= c`, `y'a = 0`, with
/// `Q_ij = y_i y_j K_ij`.
fn solve_smo(kernel: &mut KernelCache<'_>, y: &[f64], c: f64, tol: f64, max_iter: usize) -> SmoSolution {
    let n = y.len();
    let mut alpha = vec![0.0; n];
    let mut grad = vec![-1.0; n];

    let is_upper = |a: f64| a >= c;
    let is_lower = |a: f64| a <= 0.0;

    let mut iterations = 0;
    while iterations < max_iter {
        // i: maximal violating index from I_up
        let mut g_max = f64::NEG_INFINITY;
        let mut i_sel = None;
        for t in 0..n {
            let in_up = if y[t] > 0.0 { !is_upper(alpha[t]) } else { !is_lower(alpha[t]) };
            if in_up && -y[t] * grad[t] >= g_max {
                g_max = -y[t] * grad[t];
                i_sel = Some(t);
            }
        }
        let Some(i) = i_sel else { break };
        let row_i = kernel.row(i);

        // j: second-order selection from I_low
        let mut g_min = f64::INFINITY;
        let mut best_obj = f64::INFINITY;
        let mut j_sel = None;
        for t in 0..n {
            let in_low = if y[t] > 0.0 { !is_lower(alpha[t]) } else { !is_upper(alpha[t]) };
            if !in_low {
                continue;
            }
            let yg = -y[t] * grad[t];
            if yg <= g_min {
                g_min = yg;
            }
            let b = g_max - yg;
            if b > 0.0 {
                let mut a = kernel.diag(i) + kernel.diag(t) - 2.0 * row_i[t];
                if a <= 0.0 {
                    a = TAU;
                }
                let obj = -(b * b) / a;
                if obj <= best_obj {
                    best_obj = obj;
                    j_sel = Some(t);
                }
            }
        }

        if g_max - g_min < tol {
            break;
        }
        let Some(j) = j_sel else { break };
        iterations += 1;
        let row_j = kernel.row(j);

        let old_i = alpha[i];
        let old_j = alpha[j];
        let mut quad = kernel.diag(i) + kernel.diag(j) - 2.0 * row_i[j];
        if quad <= 0.0 {
            quad = TAU;
        }

        if y[i] != y[j] {
            let delta = (-grad[i] - grad[j]) / quad;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;
            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > 0.0 {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = c - diff;
                }
            } else if alpha[j] > c {
                alpha[j] = c;
                alpha[i] = c + diff;
            }
        } else {
            let delta = (grad[i] - grad[j]) / quad;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;
            if sum > c {
                if alpha[i] > c {
                    alpha[i] = c;
                    alpha[j] = sum - c;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c {
                if alpha[j] > c {
                    alpha[j] = c;
                    alpha[i] = sum - c;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let d_i = alpha[i] - old_i;
        let d_j = alpha[j] - old_j;
        for t in 0..n {
            grad[t] += y[t] * (y[i] * row_i[t] * d_i + y[j] * row_j[t] * d_j);
        }
    }

    if iterations >= max_iter {
        tracing::warn!(max_iter, "SMO reached the iteration limit before converging");
    }

    // rho from free variables, or the midpoint of the feasible interval
    let mut upper = f64::INFINITY;
    let mut lower = f64::NEG_INFINITY;
    let mut free_sum = 0.0;
    let mut n_free = 0usize;
    for t in 0..n {
        let yg = y[t] * grad[t];
        if is_upper(alpha[t]) {
            if y[t] < 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else if is_lower(alpha[t]) {
            if y[t] > 0.0 {
                upper = upper.min(yg);
            } else {
                lower = lower.max(yg);
            }
        } else {
            n_free += 1;
            free_sum += yg;
        }
    }
    let rho = if n_free > 0 {
        free_sum / n_free as f64
    } else {
        (upper + lower) / 2.0
    };

    SmoSolution {
        alpha,
        grad,
        rho,
        iterations,
    }
}

/// Fit `P(y=1|f) = 1 / (1 + exp(a f + b))` by Newton's method with
/// backtracking on regularised targets.
fn fit_platt(decisions: &[f64], labels: &[f64]) -> (f64, f64) {
    let n_pos = labels.iter().filter(|&&y| y > 0.5).count() as f64;
    let n_neg = labels.len() as f64 - n_pos;
    let hi = (n_pos + 1.0) / (n_pos + 2.0);
    let lo = 1.0 / (n_neg + 2.0);
    let targets: Vec<f64> = labels.iter().map(|&y| if y > 0.5 { hi } else { lo }).collect();

    let objective = |a: f64, b: f64| -> f64 {
        decisions
            .iter()
            .zip(&targets)
            .map(|(&f, &t)| {
                let z = f * a + b;
                if z >= 0.0 {
                    t * z + (-z).exp().ln_1p()
                } else {
                    (t - 1.0) * z + z.exp().ln_1p()
                }
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((n_neg + 1.0) / (n_pos + 1.0)).ln();
    let mut fval = objective(a, b);
    let sigma = 1e-12;

    for _ in 0..100 {
        let (mut h11, mut h22, mut h21, mut g1, mut g2) = (sigma, sigma, 0.0, 0.0, 0.0);
        for (&f, &t) in decisions.iter().zip(&targets) {
            let z = f * a + b;
            let (p, q) = if z >= 0.0 {
                let e = (-z).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = z.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }

        if g1.abs() < 1e-5 && g2.abs() < 1e-5 {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        let mut improved = false;
        while step >= 1e-10 {
            let new_a = a + step * da;
            let new_b = b + step * db;
            let new_f = objective(new_a, new_b);
            if new_f < fval + 1e-4 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                improved = true;
                break;
            }
            step /= 2.0;
        }
        if !improved {
            break;
        }
    }

    (a, b)
}

impl Classifier for SupportVectorMachine {
    fn name(&self) -> &str {
        "Support vector machine"
    }

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        require_both_classes(data, self.name())?;

        let n = data.n_samples();
        let gamma = self.params.gamma.unwrap_or_else(|| scale_gamma(data));
        let y: Vec<f64> = data
            .labels
            .iter()
            .map(|&l| if l > 0.5 { 1.0 } else { -1.0 })
            .collect();

        let mut kernel = KernelCache::new(&data.features, gamma, self.params.cache_mb);
        let solution = solve_smo(&mut kernel, &y, self.params.c, self.params.tol, self.params.max_iter);

        let mut support_vectors = Vec::new();
        let mut coefficients = Vec::new();
        for (t, &a) in solution.alpha.iter().enumerate() {
            if a > 0.0 {
                support_vectors.push(data.features[t].clone());
                coefficients.push(a * y[t]);
            }
        }

        tracing::debug!(
            iterations = solution.iterations,
            support_vectors = support_vectors.len(),
            gamma,
            cached_rows = kernel.capacity(),
            "SVM fitted"
        );

        let mut fitted = FittedSvm {
            support_vectors,
            coefficients,
            rho: solution.rho,
            gamma,
            platt_a: 0.0,
            platt_b: 0.0,
            n_features: data.n_features(),
        };

        // y_i (grad_i + 1) = sum_t alpha_t y_t K_it
        let decisions: Vec<f64> = (0..n)
            .map(|i| y[i] * (solution.grad[i] + 1.0) - solution.rho)
            .collect();
        let (platt_a, platt_b) = fit_platt(&decisions, &data.labels);
        fitted.platt_a = platt_a;
        fitted.platt_b = platt_b;

        self.fitted = Some(fitted);
        Ok(())
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        let fitted = self.fitted.as_ref().ok_or_else(|| not_fitted(self.name()))?;
        let decisions = self.decision_function(features)?;
        Ok(decisions
            .into_iter()
            .map(|f| super::sigmoid(-(fitted.platt_a * f + fitted.platt_b)))
            .collect())
    }
}
