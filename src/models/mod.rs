//! Binary classifiers behind one capability trait
//!
//! Every family compared by the bench lives here. `ModelKind` is the short
//! key used on the command line, `ModelSpec` carries the family's
//! hyperparameters and `ModelSpec::build` produces a fresh, unfitted
//! classifier.

pub mod baseline;
pub mod boosting;
pub mod forest;
pub mod lda;
mod linalg;
pub mod logistic;
pub mod svm;
pub mod tree;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pipeline::error::{BenchError, Result};
use crate::pipeline::Dataset;

pub use baseline::ZeroClassifier;
pub use boosting::{BoostingParams, EarlyStopping, GradientBoosting};
pub use forest::{ForestParams, RandomForest};
pub use lda::{LdaParams, LinearDiscriminant};
pub use logistic::{LogisticParams, LogisticRegression};
pub use svm::{SvmParams, SupportVectorMachine};
pub use tree::{DecisionTree, MaxFeatures, TreeParams};

/// Capabilities shared by every classifier in the bench
pub trait Classifier: Send + Sync {
    /// Display name, e.g. "Random forest"
    fn name(&self) -> &str;

    fn fit(&mut self, data: &Dataset) -> Result<()>;

    /// Probability of the positive class for each row
    fn predict_proba(&self, features: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Hard 0/1 predictions at threshold 0.5
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        Ok(self
            .predict_proba(features)?
            .into_iter()
            .map(|p| if p >= 0.5 { 1.0 } else { 0.0 })
            .collect())
    }

    /// Non-negative importances summing to 1, one per feature, for models
    /// that expose them
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }
}

/// Short key of a classifier family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Zero,
    Lr,
    Svm,
    Cart,
    Rf,
    Lda,
    Xgb,
}

impl ModelKind {
    /// Every family, in report order
    pub const ALL: [ModelKind; 7] = [
        ModelKind::Zero,
        ModelKind::Lr,
        ModelKind::Svm,
        ModelKind::Cart,
        ModelKind::Rf,
        ModelKind::Lda,
        ModelKind::Xgb,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ModelKind::Zero => "zero",
            ModelKind::Lr => "lr",
            ModelKind::Svm => "svm",
            ModelKind::Cart => "cart",
            ModelKind::Rf => "rf",
            ModelKind::Lda => "lda",
            ModelKind::Xgb => "xgb",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Zero => "Zero baseline",
            ModelKind::Lr => "Logistic regression",
            ModelKind::Svm => "Support vector machine",
            ModelKind::Cart => "Decision tree",
            ModelKind::Rf => "Random forest",
            ModelKind::Lda => "Linear discriminant",
            ModelKind::Xgb => "Gradient boosting",
        }
    }

    /// Default hyperparameters for this family
    pub fn default_spec(&self) -> ModelSpec {
        match self {
            ModelKind::Zero => ModelSpec::Zero,
            ModelKind::Lr => ModelSpec::Logistic(LogisticParams::default()),
            ModelKind::Svm => ModelSpec::Svm(SvmParams::default()),
            ModelKind::Cart => ModelSpec::Cart(TreeParams::default()),
            ModelKind::Rf => ModelSpec::Forest(ForestParams::default()),
            ModelKind::Lda => ModelSpec::Lda(LdaParams::default()),
            ModelKind::Xgb => ModelSpec::Boosting(BoostingParams::default()),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zero" | "baseline" => Ok(ModelKind::Zero),
            "lr" | "logistic" => Ok(ModelKind::Lr),
            "svm" | "svc" => Ok(ModelKind::Svm),
            "cart" | "tree" => Ok(ModelKind::Cart),
            "rf" | "forest" => Ok(ModelKind::Rf),
            "lda" => Ok(ModelKind::Lda),
            "xgb" | "gbm" | "boosting" => Ok(ModelKind::Xgb),
            _ => Err(format!(
                "Invalid model: '{}'. Use one of: zero, lr, svm, cart, rf, lda, xgb",
                s
            )),
        }
    }
}

/// A hyperparameter value as given on the command line or in a grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Integers first, then floats, otherwise text
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Ok(i) = s.parse::<i64>() {
            ParamValue::Int(i)
        } else if let Ok(f) = s.parse::<f64>() {
            ParamValue::Float(f)
        } else {
            ParamValue::Text(s.to_string())
        }
    }

    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Int(i) => Ok(*i as f64),
            ParamValue::Float(f) => Ok(*f),
            ParamValue::Text(t) => Err(BenchError::config(format!(
                "parameter '{}' expects a number, got '{}'",
                name, t
            ))),
        }
    }

    pub fn as_positive_f64(&self, name: &str) -> Result<f64> {
        let v = self.as_f64(name)?;
        if v > 0.0 && v.is_finite() {
            Ok(v)
        } else {
            Err(BenchError::config(format!(
                "parameter '{}' must be positive, got {}",
                name, v
            )))
        }
    }

    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(i) if *i >= 0 => Ok(*i as usize),
            other => Err(BenchError::config(format!(
                "parameter '{}' expects a non-negative integer, got '{}'",
                name, other
            ))),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(t) => write!(f, "{}", t),
        }
    }
}

/// A classifier family together with its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "model", content = "params", rename_all = "lowercase")]
pub enum ModelSpec {
    Zero,
    #[serde(rename = "lr")]
    Logistic(LogisticParams),
    Svm(SvmParams),
    Cart(TreeParams),
    #[serde(rename = "rf")]
    Forest(ForestParams),
    Lda(LdaParams),
    #[serde(rename = "xgb")]
    Boosting(BoostingParams),
}

impl ModelSpec {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::Zero => ModelKind::Zero,
            ModelSpec::Logistic(_) => ModelKind::Lr,
            ModelSpec::Svm(_) => ModelKind::Svm,
            ModelSpec::Cart(_) => ModelKind::Cart,
            ModelSpec::Forest(_) => ModelKind::Rf,
            ModelSpec::Lda(_) => ModelKind::Lda,
            ModelSpec::Boosting(_) => ModelKind::Xgb,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().display_name()
    }

    /// A fresh, unfitted classifier for this family
    pub fn build(&self) -> Box<dyn Classifier> {
        match self {
            ModelSpec::Zero => Box::new(ZeroClassifier::new()),
            ModelSpec::Logistic(p) => Box::new(LogisticRegression::new(p.clone())),
            ModelSpec::Svm(p) => Box::new(SupportVectorMachine::new(p.clone())),
            ModelSpec::Cart(p) => Box::new(DecisionTree::new(p.clone())),
            ModelSpec::Forest(p) => Box::new(RandomForest::new(p.clone())),
            ModelSpec::Lda(p) => Box::new(LinearDiscriminant::new(p.clone())),
            ModelSpec::Boosting(p) => Box::new(GradientBoosting::new(p.clone())),
        }
    }

    /// Copy of this spec with one named hyperparameter replaced
    pub fn with_param(&self, name: &str, value: &ParamValue) -> Result<ModelSpec> {
        let mut spec = self.clone();
        match &mut spec {
            ModelSpec::Zero => {
                return Err(BenchError::config(format!(
                    "the zero baseline has no parameter '{}'",
                    name
                )))
            }
            ModelSpec::Logistic(p) => p.set(name, value)?,
            ModelSpec::Svm(p) => p.set(name, value)?,
            ModelSpec::Cart(p) => p.set(name, value)?,
            ModelSpec::Forest(p) => p.set(name, value)?,
            ModelSpec::Lda(p) => p.set(name, value)?,
            ModelSpec::Boosting(p) => p.set(name, value)?,
        }
        Ok(spec)
    }

    /// Copy of this spec with the random seed set, for families that use one
    pub fn with_seed(&self, seed: u64) -> ModelSpec {
        let mut spec = self.clone();
        match &mut spec {
            ModelSpec::Cart(p) => p.seed = seed,
            ModelSpec::Forest(p) => p.seed = seed,
            ModelSpec::Svm(_)
            | ModelSpec::Zero
            | ModelSpec::Logistic(_)
            | ModelSpec::Lda(_)
            | ModelSpec::Boosting(_) => {}
        }
        spec
    }
}

fn unknown_param(model: &str, name: &str) -> BenchError {
    BenchError::config(format!("{} has no parameter '{}'", model, name))
}

/// Both classes must be present for a discriminative fit
fn require_both_classes(data: &Dataset, model: &str) -> Result<()> {
    let balance = data.class_balance();
    if data.n_samples() == 0 {
        return Err(BenchError::value(format!("{}: no training rows", model)));
    }
    if !balance.has_both_classes() {
        return Err(BenchError::value(format!(
            "{}: training rows contain a single class ({} negatives, {} positives)",
            model, balance.negatives, balance.positives
        )));
    }
    Ok(())
}

fn not_fitted(model: &str) -> BenchError {
    BenchError::value(format!("{} has not been fitted", model))
}

fn check_width(features: &[Vec<f64>], expected: usize, model: &str) -> Result<()> {
    if let Some(row) = features.iter().find(|r| r.len() != expected) {
        return Err(BenchError::value(format!(
            "{}: expected {} features per row, got {}",
            model,
            expected,
            row.len()
        )));
    }
    Ok(())
}

#[inline]
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
