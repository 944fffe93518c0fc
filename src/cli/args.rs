//! Command-line argument definitions using clap

use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::evaluation::Metric;
use crate::models::ModelKind;
use crate::pipeline::{EncodingMode, LoadOptions, ScalerKind};

/// respbench - Benchmark binary classifiers on marketing-response data
#[derive(Parser, Debug)]
#[command(name = "respbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Labelled training table (CSV or Parquet)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Unlabelled table to score with the best model (same header minus the target)
    #[arg(long)]
    pub test: Option<PathBuf>,

    /// Binary 0/1 target column
    #[arg(short, long, default_value = "outcome")]
    pub target: String,

    /// Categorical encoding: "onehot" (indicator columns) or "ordinal" (codes in place)
    #[arg(long, default_value = "onehot")]
    pub encoding: EncodingMode,

    /// Skip rescaling of numeric columns
    #[arg(long, default_value = "false")]
    pub no_scale: bool,

    /// Scaler for numeric columns: "minmax" or "standard"
    #[arg(long, default_value = "minmax")]
    pub scaler: ScalerKind,

    /// Add cost/income per driver and vehicle ratio features, and compare
    /// CV scores with and without them
    #[arg(long, default_value = "false")]
    pub derive_ratios: bool,

    /// Columns treated as categorical (comma-separated).
    /// Defaults to in_initial_launch_location, device_type and gender.
    #[arg(long, value_delimiter = ',')]
    pub categorical: Vec<String>,

    /// Columns whose missing values are filled with the most frequent level
    /// (comma-separated). Defaults to gender.
    #[arg(long, value_delimiter = ',')]
    pub impute: Vec<String>,

    /// Number of stratified cross-validation folds
    #[arg(long, default_value = "5", value_parser = validate_folds)]
    pub folds: usize,

    /// Score used to compare models: "roc_auc" or "accuracy"
    #[arg(long, default_value = "roc_auc")]
    pub metric: Metric,

    /// Folds used for the out-of-fold ROC curves
    #[arg(long, default_value = "3", value_parser = validate_folds)]
    pub roc_folds: usize,

    /// Share of rows held out for the single train/evaluate pass, in (0, 1)
    #[arg(long, default_value = "0.3", value_parser = validate_test_fraction)]
    pub test_fraction: f64,

    /// Seed for splits, fold shuffling and randomized models
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Models to compare (comma-separated): zero, lr, svm, cart, rf, lda, xgb.
    /// Defaults to all of them.
    #[arg(long, value_delimiter = ',')]
    pub models: Vec<ModelKind>,

    /// Model family for the hyperparameter grid search
    #[arg(long, default_value = "rf")]
    pub grid_model: ModelKind,

    /// Grid axis as name=v1,v2,... (repeatable). Without any axis the
    /// family's default grid is searched.
    #[arg(long = "grid", value_name = "NAME=VALUES")]
    pub grid: Vec<String>,

    /// Skip the grid search
    #[arg(long, default_value = "false")]
    pub no_grid: bool,

    /// Rounds without improvement before boosting stops; 0 skips the experiment
    #[arg(long, default_value = "5")]
    pub early_stopping_rounds: usize,

    /// Worker threads for forest building and grid search
    #[arg(short, long, default_value = "1", value_parser = validate_jobs)]
    pub jobs: usize,

    /// JSON report path. Defaults to the input directory with a
    /// '_bench_report.json' suffix.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Write test-table probabilities here (CSV or Parquet, by extension).
    /// Requires --test.
    #[arg(long)]
    pub predictions: Option<PathBuf>,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan.
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,

    /// CSV field delimiter: one ASCII character, or "tab"
    #[arg(long, default_value = ",", value_parser = validate_delimiter)]
    pub delimiter: u8,

    /// Cell text read as missing in CSV input (repeatable; empty fields are always missing)
    #[arg(long = "na-value", default_value = "NA")]
    pub na_values: Vec<String>,

    /// Increase diagnostic logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print exploratory summaries of a table
    Describe {
        /// Input file path (CSV or Parquet)
        input: PathBuf,

        /// Target column whose class balance is reported
        #[arg(short, long, default_value = "outcome")]
        target: String,

        /// Number of equal-width histogram bins per numeric column
        #[arg(long, default_value = "10", value_parser = validate_bins)]
        bins: usize,

        /// Write histogram bins of every numeric column to this JSON file
        #[arg(long)]
        histograms: Option<PathBuf>,

        /// Number of rows to use for schema inference (CSV only)
        #[arg(long, default_value = "10000")]
        infer_schema_length: usize,

        /// CSV field delimiter: one ASCII character, or "tab"
        #[arg(long, default_value = ",", value_parser = validate_delimiter)]
        delimiter: u8,
    },
}

impl Cli {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            infer_schema_length: self.infer_schema_length,
            delimiter: self.delimiter,
            null_values: self.na_values.clone(),
        }
    }

    pub fn input(&self) -> Option<&PathBuf> {
        self.input.as_ref()
    }

    /// Report path, derived from the input when not given explicitly
    pub fn report_path(&self) -> Option<PathBuf> {
        let input = self.input.as_ref()?;
        Some(
            self.report
                .clone()
                .unwrap_or_else(|| derived_path(input, "_bench_report.json")),
        )
    }

    /// Models to compare, in report order, without duplicates
    pub fn model_kinds(&self) -> Vec<ModelKind> {
        if self.models.is_empty() {
            return ModelKind::ALL.to_vec();
        }
        ModelKind::ALL
            .into_iter()
            .filter(|kind| self.models.contains(kind))
            .collect()
    }
}

fn derived_path(input: &Path, suffix: &str) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    parent.join(format!("{}{}", stem, suffix))
}

fn parse_number<T: std::str::FromStr>(s: &str) -> Result<T, String> {
    s.parse()
        .map_err(|_| format!("'{}' is not a valid number", s))
}

/// Validator for test_fraction parameter
fn validate_test_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = parse_number(s)?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!(
            "test_fraction must be strictly between 0.0 and 1.0, got {}",
            value
        ))
    }
}

/// Validator for fold counts
fn validate_folds(s: &str) -> Result<usize, String> {
    let value: usize = parse_number(s)?;
    if value < 2 {
        Err(format!("at least 2 folds are needed, got {}", value))
    } else {
        Ok(value)
    }
}

fn validate_jobs(s: &str) -> Result<usize, String> {
    let value: usize = parse_number(s)?;
    if value == 0 {
        Err("jobs must be at least 1".to_string())
    } else {
        Ok(value)
    }
}

fn validate_delimiter(s: &str) -> Result<u8, String> {
    if s.eq_ignore_ascii_case("tab") || s == "\\t" {
        return Ok(b'\t');
    }
    match s.as_bytes() {
        [b'"' | b'\n' | b'\r'] => Err(format!("{:?} cannot be a field delimiter", s)),
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(format!("delimiter must be one ASCII character, got '{}'", s)),
    }
}

fn validate_bins(s: &str) -> Result<usize, String> {
    let value: usize = parse_number(s)?;
    if value == 0 {
        Err("bins must be at least 1".to_string())
    } else {
        Ok(value)
    }
}
