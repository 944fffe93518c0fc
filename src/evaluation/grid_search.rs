//! Exhaustive hyperparameter search for one model family

use rayon::prelude::*;
use serde::Serialize;

use super::cross_validation::{cross_val_score_prepared, CvScores, FoldSource};
use super::metrics::Metric;
use crate::models::{ModelKind, ModelSpec, ParamValue};
use crate::pipeline::error::{BenchError, Result};
use crate::pipeline::stratified_k_fold;

/// Named parameter axes; combinations vary the last axis fastest
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamGrid {
    axes: Vec<(String, Vec<ParamValue>)>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an axis, replacing any earlier axis of the same name
    pub fn axis(mut self, name: &str, values: Vec<ParamValue>) -> Self {
        self.axes.retain(|(n, _)| n != name);
        self.axes.push((name.to_string(), values));
        self
    }

    /// Parse `name=v1,v2,...`
    pub fn parse_axis(spec: &str) -> Result<(String, Vec<ParamValue>)> {
        let (name, values) = spec.split_once('=').ok_or_else(|| {
            BenchError::config(format!(
                "grid axis '{}' must look like name=v1,v2,...",
                spec
            ))
        })?;
        let name = name.trim();
        let values: Vec<ParamValue> = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ParamValue::parse)
            .collect();
        if name.is_empty() || values.is_empty() {
            return Err(BenchError::config(format!(
                "grid axis '{}' needs a name and at least one value",
                spec
            )));
        }
        Ok((name.to_string(), values))
    }

    pub fn from_axes(specs: &[String]) -> Result<Self> {
        let mut grid = Self::new();
        for spec in specs {
            let (name, values) = Self::parse_axis(spec)?;
            grid = grid.axis(&name, values);
        }
        Ok(grid)
    }

    /// Grid searched when none is given on the command line
    pub fn default_for(kind: ModelKind) -> Option<Self> {
        let ints = |v: &[i64]| v.iter().map(|&i| ParamValue::Int(i)).collect::<Vec<_>>();
        let floats = |v: &[f64]| v.iter().map(|&f| ParamValue::Float(f)).collect::<Vec<_>>();
        let grid = match kind {
            ModelKind::Zero => return None,
            ModelKind::Rf => Self::new()
                .axis("n_estimators", ints(&[50, 100, 200]))
                .axis("max_features", ints(&[3, 6, 9, 12, 15])),
            ModelKind::Lr => Self::new().axis("c", floats(&[0.01, 0.1, 1.0, 10.0])),
            ModelKind::Svm => Self::new()
                .axis("c", floats(&[0.1, 1.0, 10.0]))
                .axis("gamma", floats(&[0.01, 0.1, 1.0])),
            ModelKind::Cart => Self::new()
                .axis("max_depth", ints(&[3, 5, 7, 10]))
                .axis("min_samples_leaf", ints(&[1, 5, 20])),
            ModelKind::Lda => Self::new().axis("reg", floats(&[1e-6, 1e-4, 1e-2, 1e-1])),
            ModelKind::Xgb => Self::new()
                .axis("n_estimators", ints(&[50, 100, 200]))
                .axis("max_depth", ints(&[3, 6])),
        };
        Some(grid)
    }

    pub fn axes(&self) -> &[(String, Vec<ParamValue>)] {
        &self.axes
    }

    pub fn len(&self) -> usize {
        if self.axes.is_empty() {
            0
        } else {
            self.axes.iter().map(|(_, v)| v.len()).product()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, first axis outermost
    pub fn combinations(&self) -> Vec<Vec<(String, ParamValue)>> {
        let mut combos: Vec<Vec<(String, ParamValue)>> = vec![Vec::new()];
        for (name, values) in &self.axes {
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    values.iter().map(move |v| {
                        let mut combo = prefix.clone();
                        combo.push((name.clone(), v.clone()));
                        combo
                    })
                })
                .collect();
        }
        if self.axes.is_empty() {
            Vec::new()
        } else {
            combos
        }
    }
}

/// One evaluated combination
#[derive(Debug, Clone, Serialize)]
pub struct GridPoint {
    pub params: Vec<(String, ParamValue)>,
    pub cv: CvScores,
}

impl GridPoint {
    pub fn describe(&self) -> String {
        self.params
            .iter()
            .map(|(n, v)| format!("{}={}", n, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GridSearchResult {
    pub model: ModelKind,
    pub metric: Metric,
    pub folds: usize,
    pub points: Vec<GridPoint>,
    pub best_index: usize,
    pub best_spec: ModelSpec,
}

impl GridSearchResult {
    pub fn best(&self) -> &GridPoint {
        &self.points[self.best_index]
    }
}

/// Cross-validate every grid combination of `base` on `n_jobs` worker
/// threads. All combinations share the same folds, so the result does not
/// depend on the worker count; ties go to the earliest combination. A frame
/// source is preprocessed once per fold, fitted on that fold's training rows.
pub fn grid_search<'a>(
    base: &ModelSpec,
    grid: &ParamGrid,
    data: impl Into<FoldSource<'a>>,
    folds: usize,
    metric: Metric,
    seed: u64,
    n_jobs: usize,
) -> Result<GridSearchResult> {
    if n_jobs == 0 {
        return Err(BenchError::config("grid search needs at least one worker"));
    }
    let combos = grid.combinations();
    if combos.is_empty() {
        return Err(BenchError::config(format!(
            "empty parameter grid for {}",
            base.name()
        )));
    }

    let specs = combos
        .iter()
        .map(|combo| {
            combo
                .iter()
                .try_fold(base.clone(), |spec, (name, value)| spec.with_param(name, value))
        })
        .collect::<Result<Vec<_>>>()?;

    let source = data.into();
    let fold_sets = stratified_k_fold(&source.labels()?, folds, Some(seed))?;
    let prepared = source.prepare(&fold_sets)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_jobs)
        .build()
        .map_err(|e| BenchError::config(format!("cannot start {} workers: {}", n_jobs, e)))?;

    tracing::debug!(model = base.name(), combinations = specs.len(), n_jobs, "grid search");
    let results: Vec<CvScores> = pool.install(|| {
        specs
            .par_iter()
            .map(|spec| cross_val_score_prepared(spec, &prepared, metric))
            .collect::<Result<Vec<_>>>()
    })?;

    let mut best_index = 0;
    for (i, cv) in results.iter().enumerate() {
        if cv.mean > results[best_index].mean {
            best_index = i;
        }
    }

    let points: Vec<GridPoint> = combos
        .into_iter()
        .zip(results)
        .map(|(params, cv)| GridPoint { params, cv })
        .collect();
    for point in &points {
        tracing::debug!(params = %point.describe(), mean = point.cv.mean, "grid point");
    }

    Ok(GridSearchResult {
        model: base.kind(),
        metric,
        folds,
        best_spec: specs[best_index].clone(),
        points,
        best_index,
    })
}
