//! Resolved run configuration

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::Serialize;

use super::args::Cli;
use crate::evaluation::Metric;
use crate::models::ModelKind;
use crate::pipeline::{LoadOptions, PreprocessConfig};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridConfig {
    pub model: ModelKind,
    /// `name=v1,v2,...` axes; empty means the family's default grid
    pub axes: Vec<String>,
}

/// Everything a bench run needs, resolved from the command line. Embedded
/// in the JSON report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchConfig {
    pub input: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<PathBuf>,
    pub preprocess: PreprocessConfig,
    pub models: Vec<ModelKind>,
    pub folds: usize,
    pub metric: Metric,
    pub roc_folds: usize,
    pub test_fraction: f64,
    pub seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid: Option<GridConfig>,
    /// 0 disables the early-stopping experiment
    pub early_stopping_rounds: usize,
    pub jobs: usize,
    pub report: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictions: Option<PathBuf>,
    pub load: LoadOptions,
}

impl BenchConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let Some(input) = cli.input().cloned() else {
            bail!("Input file is required. Use -i/--input to specify a file.");
        };
        if cli.predictions.is_some() && cli.test.is_none() {
            bail!("--predictions needs a table to score. Use --test to specify one.");
        }

        let mut preprocess = PreprocessConfig {
            target: cli.target.clone(),
            encoding: cli.encoding,
            scale: !cli.no_scale,
            scaler: Some(cli.scaler),
            derive_ratios: cli.derive_ratios,
            ..PreprocessConfig::default()
        };
        if !cli.categorical.is_empty() {
            preprocess.categorical_columns = cli.categorical.clone();
        }
        if !cli.impute.is_empty() {
            preprocess.impute_columns = cli.impute.clone();
        }
        preprocess.validate()?;

        let grid = (!cli.no_grid).then(|| GridConfig {
            model: cli.grid_model,
            axes: cli.grid.clone(),
        });
        if let Some(grid) = &grid {
            if grid.model == ModelKind::Zero {
                bail!("The zero baseline has no hyperparameters to search. Pick another --grid-model or pass --no-grid.");
            }
        }

        let report = cli
            .report_path()
            .unwrap_or_else(|| PathBuf::from("bench_report.json"));

        Ok(Self {
            input,
            test: cli.test.clone(),
            preprocess,
            models: cli.model_kinds(),
            folds: cli.folds,
            metric: cli.metric,
            roc_folds: cli.roc_folds,
            test_fraction: cli.test_fraction,
            seed: cli.seed,
            grid,
            early_stopping_rounds: cli.early_stopping_rounds,
            jobs: cli.jobs,
            report,
            predictions: cli.predictions.clone(),
            load: cli.load_options(),
        })
    }
}
