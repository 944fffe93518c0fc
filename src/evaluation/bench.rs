//! Model comparison: cross-validated scores, a single train/evaluate pass,
//! out-of-fold ROC curves and the early-stopping experiment

use indicatif::ProgressBar;
use polars::prelude::DataFrame;
use serde::Serialize;

use super::cross_validation::{
    cross_val_predict_prepared, cross_val_score, cross_val_score_frame, CvScores, FoldSource,
};
use super::metrics::{roc_auc, roc_curve, Metric, RocCurve};
use crate::models::{BoostingParams, EarlyStopping, GradientBoosting, ModelKind, ModelSpec, Classifier};
use crate::pipeline::error::Result;
use crate::pipeline::{stratified_k_fold, target_labels, Dataset};
use crate::utils::hidden_progress_bar;

/// Cross-validated scores of one model
#[derive(Debug, Clone, Serialize)]
pub struct ModelScores {
    pub kind: ModelKind,
    pub name: String,
    pub spec: ModelSpec,
    pub metric: Metric,
    pub cv: CvScores,
}

/// Cross-validate every spec on the same stratified folds
pub fn evaluate(
    specs: &[ModelSpec],
    data: &Dataset,
    folds: usize,
    metric: Metric,
    seed: u64,
) -> Result<Vec<ModelScores>> {
    evaluate_with_progress(specs, data, folds, metric, seed, &hidden_progress_bar())
}

/// [`evaluate`], advancing `pb` once per model
pub fn evaluate_with_progress(
    specs: &[ModelSpec],
    data: &Dataset,
    folds: usize,
    metric: Metric,
    seed: u64,
    pb: &ProgressBar,
) -> Result<Vec<ModelScores>> {
    let folds = stratified_k_fold(&data.labels, folds, Some(seed))?;
    specs
        .iter()
        .map(|spec| {
            pb.set_message(spec.name().to_string());
            let cv = cross_val_score(spec, data, &folds, metric)?;
            tracing::debug!(model = spec.name(), mean = cv.mean, std = cv.std, "model evaluated");
            pb.inc(1);
            Ok(ModelScores {
                kind: spec.kind(),
                name: spec.name().to_string(),
                spec: spec.clone(),
                metric,
                cv,
            })
        })
        .collect()
}

/// Cross-validate on a raw table; the preprocessor is fitted on each
/// fold's training rows only
pub fn evaluate_frame(
    specs: &[ModelSpec],
    df: &DataFrame,
    config: &crate::pipeline::PreprocessConfig,
    folds: usize,
    metric: Metric,
    seed: u64,
    pb: &ProgressBar,
) -> Result<Vec<ModelScores>> {
    let labels = target_labels(df, &config.target)?;
    let folds = stratified_k_fold(&labels, folds, Some(seed))?;
    specs
        .iter()
        .map(|spec| {
            pb.set_message(spec.name().to_string());
            let cv = cross_val_score_frame(spec, df, config, &folds, metric)?;
            tracing::debug!(model = spec.name(), mean = cv.mean, std = cv.std, "model evaluated");
            pb.inc(1);
            Ok(ModelScores {
                kind: spec.kind(),
                name: spec.name().to_string(),
                spec: spec.clone(),
                metric,
                cv,
            })
        })
        .collect()
}

/// Index of the highest mean score; the first wins ties
pub fn best_model(scores: &[ModelScores]) -> Option<&ModelScores> {
    let mut best: Option<&ModelScores> = None;
    for s in scores {
        if best.map_or(true, |b| s.cv.mean > b.cv.mean) {
            best = Some(s);
        }
    }
    best
}

/// Result of fitting on the training split and scoring the test split
#[derive(Debug, Clone, Serialize)]
pub struct SinglePassResult {
    pub kind: ModelKind,
    pub name: String,
    pub auc: f64,
    /// `(feature, importance)` sorted descending, for models that expose
    /// importances
    pub importances: Option<Vec<(String, f64)>>,
}

pub fn train_evaluate(spec: &ModelSpec, train: &Dataset, test: &Dataset) -> Result<SinglePassResult> {
    let mut model = spec.build();
    model.fit(train)?;
    let proba = model.predict_proba(&test.features)?;
    let auc = roc_auc(&test.labels, &proba)?;

    let importances = model.feature_importances().map(|values| {
        let mut ranked: Vec<(String, f64)> = train
            .feature_names
            .iter()
            .cloned()
            .zip(values)
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    });

    Ok(SinglePassResult {
        kind: spec.kind(),
        name: spec.name().to_string(),
        auc,
        importances,
    })
}

/// Out-of-fold ROC curve of one model
#[derive(Debug, Clone, Serialize)]
pub struct RocSeries {
    pub kind: ModelKind,
    pub name: String,
    pub auc: f64,
    pub curve: RocCurve,
}

/// ROC curves from out-of-fold probabilities, one series per spec. Every
/// spec shares the same prepared folds.
pub fn roc_curves<'a>(
    specs: &[ModelSpec],
    source: impl Into<FoldSource<'a>>,
    folds: usize,
    seed: u64,
) -> Result<Vec<RocSeries>> {
    let source = source.into();
    let labels = source.labels()?;
    let folds = stratified_k_fold(&labels, folds, Some(seed))?;
    let prepared = source.prepare(&folds)?;
    specs
        .iter()
        .map(|spec| {
            let oof = cross_val_predict_prepared(spec, &folds, &prepared, labels.len())?;
            Ok(RocSeries {
                kind: spec.kind(),
                name: spec.name().to_string(),
                auc: roc_auc(&labels, &oof)?,
                curve: roc_curve(&labels, &oof)?,
            })
        })
        .collect()
}

/// Early-stopped boosting fit and its score on the evaluation rows
#[derive(Debug, Clone, Serialize)]
pub struct EarlyStoppingRun {
    #[serde(flatten)]
    pub stopping: EarlyStopping,
    pub eval_auc: f64,
}

pub fn early_stopping_run(
    params: &BoostingParams,
    train: &Dataset,
    eval: &Dataset,
    rounds: usize,
) -> Result<EarlyStoppingRun> {
    let mut model = GradientBoosting::new(params.clone());
    let stopping = model.fit_with_eval(train, eval, rounds)?;
    let proba = model.predict_proba(&eval.features)?;
    Ok(EarlyStoppingRun {
        stopping,
        eval_auc: roc_auc(&eval.labels, &proba)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Dataset {
        let features: Vec<Vec<f64>> = (0..80)
            .map(|i| vec![i as f64 / 80.0, ((i * 17) % 13) as f64 / 13.0])
            .collect();
        let labels = (0..80).map(|i| if i % 5 == 0 || i > 64 { 1.0 } else { 0.0 }).collect();
        Dataset::new(vec!["signal".into(), "noise".into()], features, labels).unwrap()
    }

    #[test]
    fn test_evaluate_returns_one_row_per_spec() {
        let data = data();
        let specs = vec![ModelSpec::Zero, ModelKind::Lr.default_spec()];
        let scores = evaluate(&specs, &data, 5, Metric::RocAuc, 42).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].cv.scores.len(), 5);
        assert_eq!(scores[0].cv.mean, 0.5);
        assert_eq!(best_model(&scores).unwrap().kind, ModelKind::Lr);
    }

    #[test]
    fn test_best_model_prefers_first_on_ties() {
        let data = data();
        let specs = vec![ModelSpec::Zero, ModelSpec::Zero];
        let scores = evaluate(&specs, &data, 3, Metric::RocAuc, 1).unwrap();
        assert!(std::ptr::eq(best_model(&scores).unwrap(), &scores[0]));
    }

    #[test]
    fn test_train_evaluate_sorts_importances() {
        let data = data();
        let train = data.subset(&(0..80).filter(|i| i % 3 != 0).collect::<Vec<_>>());
        let test = data.subset(&(0..80).filter(|i| i % 3 == 0).collect::<Vec<_>>());
        let result = train_evaluate(&ModelKind::Cart.default_spec(), &train, &test).unwrap();
        let importances = result.importances.unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0].1 >= importances[1].1);

        let lr = train_evaluate(&ModelKind::Lr.default_spec(), &train, &test).unwrap();
        assert!(lr.importances.is_none());
    }

    #[test]
    fn test_roc_curves_start_and_end() {
        let data = data();
        let series = roc_curves(&[ModelKind::Lr.default_spec()], &data, 3, 42).unwrap();
        let curve = &series[0].curve;
        assert_eq!((curve.fpr[0], curve.tpr[0]), (0.0, 0.0));
        assert_eq!(
            (*curve.fpr.last().unwrap(), *curve.tpr.last().unwrap()),
            (1.0, 1.0)
        );
        assert!((curve.area() - series[0].auc).abs() < 1e-9);
    }
}
