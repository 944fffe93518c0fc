//! K-fold cross-validation over precomputed stratified folds

use polars::prelude::DataFrame;
use serde::Serialize;

use super::metrics::Metric;
use crate::models::ModelSpec;
use crate::pipeline::error::{BenchError, Result};
use crate::pipeline::{
    feature_matrix, take_rows, target_labels, Dataset, Fold, PreprocessConfig, Preprocessor,
};

/// Per-fold scores with summary statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CvScores {
    pub scores: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation of the fold scores
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl CvScores {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let min = scores.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Self {
            scores,
            mean,
            std: variance.sqrt(),
            min,
            max,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "mean={:.4} (+/- {:.4}), min={:.4}, max={:.4}",
            self.mean,
            self.std * 2.0,
            self.min,
            self.max
        )
    }
}

/// Where a fold's train/test data comes from
#[derive(Debug, Clone, Copy)]
pub enum FoldSource<'a> {
    /// Rows that are already preprocessed; a fold is a row subset
    Prepared(&'a Dataset),
    /// A raw table; preprocessing is refit on each fold's training rows
    Frame {
        df: &'a DataFrame,
        config: &'a PreprocessConfig,
    },
}

impl<'a> From<&'a Dataset> for FoldSource<'a> {
    fn from(data: &'a Dataset) -> Self {
        FoldSource::Prepared(data)
    }
}

impl<'a> FoldSource<'a> {
    pub fn frame(df: &'a DataFrame, config: &'a PreprocessConfig) -> Self {
        FoldSource::Frame { df, config }
    }

    pub fn labels(&self) -> Result<Vec<f64>> {
        match self {
            FoldSource::Prepared(data) => Ok(data.labels.clone()),
            FoldSource::Frame { df, config } => target_labels(df, &config.target),
        }
    }

    pub fn n_rows(&self) -> usize {
        match self {
            FoldSource::Prepared(data) => data.n_samples(),
            FoldSource::Frame { df, .. } => df.height(),
        }
    }

    pub fn split(&self, fold: &Fold) -> Result<(Dataset, Dataset)> {
        match self {
            FoldSource::Prepared(data) => Ok((
                data.subset(&fold.train_indices),
                data.subset(&fold.test_indices),
            )),
            FoldSource::Frame { df, config } => fold_datasets(df, config, fold),
        }
    }

    /// Train/test data for every fold, built once so many models can share it
    pub fn prepare(&self, folds: &[Fold]) -> Result<Vec<(Dataset, Dataset)>> {
        folds.iter().map(|fold| self.split(fold)).collect()
    }
}

fn score_fold(
    spec: &ModelSpec,
    k: usize,
    train: &Dataset,
    test: &Dataset,
    metric: Metric,
) -> Result<f64> {
    let mut model = spec.build();
    model.fit(train)?;
    let proba = model.predict_proba(&test.features)?;
    let score = metric
        .score(&test.labels, &proba)
        .map_err(|e| BenchError::value(format!("fold {}: {}", k + 1, e)))?;
    tracing::debug!(model = spec.name(), fold = k + 1, score, "fold scored");
    Ok(score)
}

fn score_source(
    spec: &ModelSpec,
    source: FoldSource<'_>,
    folds: &[Fold],
    metric: Metric,
) -> Result<CvScores> {
    let mut scores = Vec::with_capacity(folds.len());
    for (k, fold) in folds.iter().enumerate() {
        let (train, test) = source.split(fold)?;
        scores.push(score_fold(spec, k, &train, &test, metric)?);
    }
    Ok(CvScores::from_scores(scores))
}

/// Fit on each fold's training rows and score its held-out rows
pub fn cross_val_score(
    spec: &ModelSpec,
    data: &Dataset,
    folds: &[Fold],
    metric: Metric,
) -> Result<CvScores> {
    score_source(spec, FoldSource::Prepared(data), folds, metric)
}

/// Score `spec` on folds built by [`FoldSource::prepare`]
pub fn cross_val_score_prepared(
    spec: &ModelSpec,
    prepared: &[(Dataset, Dataset)],
    metric: Metric,
) -> Result<CvScores> {
    let scores = prepared
        .iter()
        .enumerate()
        .map(|(k, (train, test))| score_fold(spec, k, train, test, metric))
        .collect::<Result<Vec<_>>>()?;
    Ok(CvScores::from_scores(scores))
}

/// Train/test datasets for one fold of a raw table, with the preprocessor
/// fitted on the training rows only
pub fn fold_datasets(
    df: &DataFrame,
    config: &PreprocessConfig,
    fold: &Fold,
) -> Result<(Dataset, Dataset)> {
    let train_frame = take_rows(df, &fold.train_indices)?;
    let test_frame = take_rows(df, &fold.test_indices)?;

    let preprocessor = Preprocessor::fit(&train_frame, config)?;
    let train = Dataset::from_frame(&preprocessor.transform(&train_frame)?, &config.target)?;
    let test_encoded = preprocessor.transform(&test_frame)?;
    let test = Dataset::new(
        train.feature_names.clone(),
        feature_matrix(&test_encoded, &train.feature_names)?,
        target_labels(&test_encoded, &config.target)?,
    )?;
    Ok((train, test))
}

/// Cross-validate a model on a raw table, refitting preprocessing per fold
pub fn cross_val_score_frame(
    spec: &ModelSpec,
    df: &DataFrame,
    config: &PreprocessConfig,
    folds: &[Fold],
    metric: Metric,
) -> Result<CvScores> {
    score_source(spec, FoldSource::frame(df, config), folds, metric)
}

/// Out-of-fold positive-class probabilities, in row order
pub fn cross_val_predict<'a>(
    spec: &ModelSpec,
    source: impl Into<FoldSource<'a>>,
    folds: &[Fold],
) -> Result<Vec<f64>> {
    let source = source.into();
    let prepared = source.prepare(folds)?;
    cross_val_predict_prepared(spec, folds, &prepared, source.n_rows())
}

/// Out-of-fold probabilities from folds built by [`FoldSource::prepare`]
pub fn cross_val_predict_prepared(
    spec: &ModelSpec,
    folds: &[Fold],
    prepared: &[(Dataset, Dataset)],
    n_rows: usize,
) -> Result<Vec<f64>> {
    let mut predictions = vec![None; n_rows];
    for (fold, (train, test)) in folds.iter().zip(prepared) {
        let mut model = spec.build();
        model.fit(train)?;
        let proba = model.predict_proba(&test.features)?;
        for (&row, p) in fold.test_indices.iter().zip(proba) {
            let slot = predictions.get_mut(row).ok_or_else(|| {
                BenchError::value(format!("fold row {} is out of range ({} rows)", row, n_rows))
            })?;
            *slot = Some(p);
        }
    }

    predictions
        .into_iter()
        .enumerate()
        .map(|(row, p)| {
            p.ok_or_else(|| BenchError::value(format!("row {} is not in any held-out fold", row)))
        })
        .collect()
}
