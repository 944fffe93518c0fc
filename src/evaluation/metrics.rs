//! Classification metrics: ROC-AUC, ROC curve points and accuracy

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::pipeline::error::{BenchError, Result};

/// Score used to compare models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    RocAuc,
    Accuracy,
}

impl Metric {
    /// Score probabilities against 0/1 labels
    pub fn score(&self, labels: &[f64], proba: &[f64]) -> Result<f64> {
        match self {
            Metric::RocAuc => roc_auc(labels, proba),
            Metric::Accuracy => {
                let predictions: Vec<f64> = proba
                    .iter()
                    .map(|&p| if p >= 0.5 { 1.0 } else { 0.0 })
                    .collect();
                accuracy(labels, &predictions)
            }
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::RocAuc => write!(f, "roc_auc"),
            Metric::Accuracy => write!(f, "accuracy"),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "roc_auc" | "auc" => Ok(Metric::RocAuc),
            "accuracy" | "acc" => Ok(Metric::Accuracy),
            _ => Err(format!(
                "Invalid metric: '{}'. Use 'roc_auc' or 'accuracy'",
                s
            )),
        }
    }
}

fn check_lengths(labels: &[f64], scores: &[f64]) -> Result<()> {
    if labels.len() != scores.len() {
        return Err(BenchError::value(format!(
            "{} labels but {} scores",
            labels.len(),
            scores.len()
        )));
    }
    if labels.is_empty() {
        return Err(BenchError::value("cannot score an empty set"));
    }
    Ok(())
}

fn class_counts(labels: &[f64]) -> Result<(f64, f64)> {
    let positives = labels.iter().filter(|&&y| y > 0.5).count() as f64;
    let negatives = labels.len() as f64 - positives;
    if positives == 0.0 || negatives == 0.0 {
        return Err(BenchError::value(
            "ROC-AUC is undefined when only one class is present",
        ));
    }
    Ok((positives, negatives))
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Tied scores receive their average rank, so a constant score gives
/// exactly 0.5.
pub fn roc_auc(labels: &[f64], scores: &[f64]) -> Result<f64> {
    check_lengths(labels, scores)?;
    let (total_pos, total_neg) = class_counts(labels)?;

    let mut pairs: Vec<(f64, bool)> = scores
        .iter()
        .zip(labels)
        .map(|(&s, &y)| (s, y > 0.5))
        .collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let n = pairs.len();
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j < n && pairs[j].0 == pairs[i].0 {
            j += 1;
        }

        // ranks i+1 ..= j share their mean
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        let group_pos = pairs[i..j].iter().filter(|(_, pos)| *pos).count() as f64;
        rank_sum_pos += avg_rank * group_pos;
        i = j;
    }

    let u = rank_sum_pos - total_pos * (total_pos + 1.0) / 2.0;
    Ok(u / (total_pos * total_neg))
}

/// Points of a ROC curve, one per distinct score threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Score at or above which rows are called positive; the first entry is
    /// +inf (nothing called positive)
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// Trapezoidal area under the curve
    pub fn area(&self) -> f64 {
        self.fpr
            .windows(2)
            .zip(self.tpr.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
            .sum()
    }
}

/// ROC curve over distinct thresholds, from `(0, 0)` to `(1, 1)`
pub fn roc_curve(labels: &[f64], scores: &[f64]) -> Result<RocCurve> {
    check_lengths(labels, scores)?;
    let (total_pos, total_neg) = class_counts(labels)?;

    let mut pairs: Vec<(f64, bool)> = scores
        .iter()
        .zip(labels)
        .map(|(&s, &y)| (s, y > 0.5))
        .collect();
    pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];
    let (mut tp, mut fp) = (0.0, 0.0);

    let mut i = 0;
    while i < pairs.len() {
        let threshold = pairs[i].0;
        while i < pairs.len() && pairs[i].0 == threshold {
            if pairs[i].1 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            i += 1;
        }
        fpr.push(fp / total_neg);
        tpr.push(tp / total_pos);
        thresholds.push(threshold);
    }

    Ok(RocCurve {
        fpr,
        tpr,
        thresholds,
    })
}

/// Share of predictions equal to the labels
pub fn accuracy(labels: &[f64], predictions: &[f64]) -> Result<f64> {
    check_lengths(labels, predictions)?;
    let correct = labels
        .iter()
        .zip(predictions)
        .filter(|&(&y, &p)| (y > 0.5) == (p > 0.5))
        .count();
    Ok(correct as f64 / labels.len() as f64)
}
