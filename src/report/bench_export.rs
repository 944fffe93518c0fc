//! JSON export of a bench run

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::cli::BenchConfig;
use crate::evaluation::{
    best_model, EarlyStoppingRun, GridSearchResult, ModelScores, RocSeries, SinglePassResult,
};
use crate::pipeline::ClassBalance;

/// Metadata about the run
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,
    pub respbench_version: String,
    pub input_file: String,
    pub rows: usize,
    /// Model features after preprocessing
    pub features: usize,
}

/// Everything a bench run produces. Optional stages that were skipped are
/// left out of the JSON.
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub metadata: ReportMetadata,
    pub config: BenchConfig,
    pub class_balance: ClassBalance,
    pub feature_names: Vec<String>,
    pub cv_scores: Vec<ModelScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engineered_scores: Option<Vec<ModelScores>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_model: Option<String>,
    pub single_pass: Vec<SinglePassResult>,
    /// Labelled out-of-fold ROC points for plotting
    pub roc_curves: Vec<RocSeries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grid_search: Option<GridSearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_stopping: Option<EarlyStoppingRun>,
}

impl BenchReport {
    pub fn new(
        config: BenchConfig,
        class_balance: ClassBalance,
        feature_names: Vec<String>,
        cv_scores: Vec<ModelScores>,
    ) -> Self {
        let metadata = ReportMetadata {
            timestamp: Utc::now().to_rfc3339(),
            respbench_version: env!("CARGO_PKG_VERSION").to_string(),
            input_file: config.input.display().to_string(),
            rows: class_balance.total(),
            features: feature_names.len(),
        };
        let best_model = best_model(&cv_scores).map(|s| s.kind.key().to_string());
        Self {
            metadata,
            config,
            class_balance,
            feature_names,
            cv_scores,
            engineered_scores: None,
            best_model,
            single_pass: Vec::new(),
            roc_curves: Vec::new(),
            grid_search: None,
            early_stopping: None,
        }
    }
}

/// Write the report as pretty-printed JSON. Infinite ROC thresholds are
/// written as `null`.
pub fn export_bench_report(report: &BenchReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize bench report to JSON")?;

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write bench report to {}", output_path.display()))?;

    Ok(())
}
