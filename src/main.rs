//! respbench: classifier bench CLI
//!
//! Loads a labelled marketing-response table, preprocesses it and compares
//! a roster of binary classifiers.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;
use polars::prelude::*;

use respbench::cli::{BenchConfig, Cli, Commands};
use respbench::evaluation::{
    best_model, early_stopping_run, evaluate_frame, fold_datasets, grid_search, roc_curves,
    train_evaluate, FoldSource, ModelScores, ParamGrid,
};
use respbench::models::{BoostingParams, ModelKind, ModelSpec};
use respbench::pipeline::{
    class_balance, feature_matrix, load_dataset_with_progress, stratified_split_indices,
    take_rows, target_labels, validate_binary_target, Dataset, Fold, LoadOptions,
    PreprocessConfig, Preprocessor, DEFAULT_CATEGORICAL_COLUMNS,
};
use respbench::report::{
    describe_frame, display_class_balance, display_description, display_early_stopping,
    display_grid, display_importances, display_scores, display_single_pass,
    display_stage_comparison, export_bench_report, export_histograms, histograms, BenchReport,
};
use respbench::utils::{
    create_progress_bar, create_spinner, finish_with_success, init_tracing, print_banner,
    print_completion, print_config, print_info, print_stat, print_step_header, print_step_time,
    print_success, print_warning,
};

/// Importance tables show at most this many features
const IMPORTANCE_ROWS: usize = 15;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(command) = &cli.command {
        return match command {
            Commands::Describe {
                input,
                target,
                bins,
                histograms,
                infer_schema_length,
                delimiter,
            } => {
                let options = LoadOptions {
                    infer_schema_length: *infer_schema_length,
                    delimiter: *delimiter,
                    ..LoadOptions::default()
                };
                run_describe(input, target, *bins, histograms.as_deref(), &options)
            }
        };
    }

    let config = BenchConfig::from_cli(&cli)?;

    rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build_global()
        .context("Failed to configure the worker pool")?;

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&config);

    run_bench(&config)
}

fn run_bench(config: &BenchConfig) -> Result<()> {
    let target = &config.preprocess.target;
    let specs: Vec<ModelSpec> = config
        .models
        .iter()
        .map(|kind| kind.default_spec().with_seed(config.seed))
        .collect();

    // Step 1: Load dataset
    print_step_header(1, "Load Dataset");
    let step_start = Instant::now();
    let (df, rows, cols, memory_mb) =
        load_dataset_with_progress(&config.input, &config.load)?;
    print_stat("Rows", rows);
    print_stat("Columns", cols);
    print_stat("Estimated memory", format!("{:.2} MB", memory_mb));

    validate_binary_target(&df, target)?;
    let balance = class_balance(&df, target)?;
    display_class_balance(&balance);
    print_step_time(step_start.elapsed());

    // Step 2: Stratified hold-out split, preprocessing fit on training rows
    print_step_header(2, "Split & Preprocess");
    let step_start = Instant::now();
    let labels = target_labels(&df, target)?;
    let (train_indices, test_indices) =
        stratified_split_indices(&labels, config.test_fraction, config.seed)?;
    let holdout = Fold {
        train_indices,
        test_indices,
    };
    let (train_data, test_data) = fold_datasets(&df, &config.preprocess, &holdout)?;
    // raw training rows; inner folds refit preprocessing on their own rows
    let train_frame = take_rows(&df, &holdout.train_indices)?;
    let train_source = FoldSource::frame(&train_frame, &config.preprocess);
    print_stat("Training rows", train_data.n_samples());
    print_stat("Hold-out rows", test_data.n_samples());
    print_stat("Features", train_data.n_features());
    print_success("Preprocessor fitted on training rows");
    print_step_time(step_start.elapsed());

    // Step 3: Cross-validated comparison
    print_step_header(3, "Cross-Validated Comparison");
    let step_start = Instant::now();
    let base_config = PreprocessConfig {
        derive_ratios: false,
        ..config.preprocess.clone()
    };
    let base_scores = run_cv_stage(config, &df, &base_config, &specs, "base features")?;
    display_scores(
        &format!("CV {} (BASE FEATURES)", config.metric.to_string().to_uppercase()),
        &base_scores,
    );

    let engineered_scores = if config.preprocess.derive_ratios {
        let scores = run_cv_stage(config, &df, &config.preprocess, &specs, "engineered features")?;
        display_scores(
            &format!("CV {} (ENGINEERED FEATURES)", config.metric.to_string().to_uppercase()),
            &scores,
        );
        display_stage_comparison(&base_scores, &scores);
        Some(scores)
    } else {
        None
    };
    print_step_time(step_start.elapsed());

    let final_scores = engineered_scores.as_ref().unwrap_or(&base_scores);
    let best_spec = best_model(final_scores).map(|s| s.spec.clone());
    if let Some(best) = best_model(final_scores) {
        print_success(&format!(
            "Best model: {} ({})",
            best.name,
            best.cv.summary()
        ));
    }

    let mut report = BenchReport::new(
        config.clone(),
        balance,
        train_data.feature_names.clone(),
        base_scores,
    );
    report.engineered_scores = engineered_scores;
    if let Some(spec) = &best_spec {
        report.best_model = Some(spec.kind().key().to_string());
    }

    // Step 4: Single train/evaluate pass
    print_step_header(4, "Hold-Out Evaluation");
    let step_start = Instant::now();
    let pb = create_progress_bar(specs.len() as u64, "models");
    for spec in &specs {
        pb.set_message(spec.name());
        report.single_pass.push(train_evaluate(spec, &train_data, &test_data)?);
        pb.inc(1);
    }
    finish_with_success(&pb, "Hold-out evaluation complete");
    display_single_pass(&report.single_pass);
    for result in &report.single_pass {
        if matches!(result.kind, ModelKind::Rf | ModelKind::Xgb) {
            display_importances(result, IMPORTANCE_ROWS);
        }
    }
    print_step_time(step_start.elapsed());

    // Step 5: Out-of-fold ROC curves
    print_step_header(5, "ROC Curves");
    let step_start = Instant::now();
    let spinner = create_spinner("Collecting out-of-fold probabilities...");
    report.roc_curves = roc_curves(&specs, train_source, config.roc_folds, config.seed)?;
    finish_with_success(
        &spinner,
        &format!("{} ROC series from {} folds", report.roc_curves.len(), config.roc_folds),
    );
    print_step_time(step_start.elapsed());

    // Step 6: Grid search
    if let Some(grid_config) = &config.grid {
        print_step_header(6, "Grid Search");
        let step_start = Instant::now();
        let grid = if grid_config.axes.is_empty() {
            ParamGrid::default_for(grid_config.model).unwrap_or_default()
        } else {
            ParamGrid::from_axes(&grid_config.axes)?
        };
        let base = grid_config.model.default_spec().with_seed(config.seed);

        let spinner = create_spinner(&format!(
            "Searching {} combinations for {}...",
            grid.len(),
            base.name()
        ));
        let result = grid_search(
            &base,
            &grid,
            train_source,
            config.folds,
            config.metric,
            config.seed,
            config.jobs,
        )?;
        finish_with_success(
            &spinner,
            &format!("Best: {} ({:.4})", result.best().describe(), result.best().cv.mean),
        );
        display_grid(&result);
        report.grid_search = Some(result);
        print_step_time(step_start.elapsed());
    }

    // Step 7: Early stopping
    if config.early_stopping_rounds > 0 {
        print_step_header(7, "Early Stopping");
        let step_start = Instant::now();
        let run = early_stopping_run(
            &BoostingParams::default(),
            &train_data,
            &test_data,
            config.early_stopping_rounds,
        )?;
        display_early_stopping(&run);
        report.early_stopping = Some(run);
        print_step_time(step_start.elapsed());
    }

    // Step 8: Score the unlabelled table
    if let (Some(test_path), Some(spec)) = (&config.test, &best_spec) {
        print_step_header(8, "Score Test Table");
        let step_start = Instant::now();
        score_test_table(config, &df, test_path, spec)?;
        print_step_time(step_start.elapsed());
    }

    let spinner = create_spinner("Writing bench report...");
    export_bench_report(&report, &config.report)?;
    finish_with_success(
        &spinner,
        &format!("Report saved to {}", config.report.display()),
    );

    print_completion();
    Ok(())
}

fn run_cv_stage(
    config: &BenchConfig,
    df: &DataFrame,
    preprocess: &PreprocessConfig,
    specs: &[ModelSpec],
    label: &str,
) -> Result<Vec<ModelScores>> {
    let pb = create_progress_bar(specs.len() as u64, "models");
    let scores = evaluate_frame(
        specs,
        df,
        preprocess,
        config.folds,
        config.metric,
        config.seed,
        &pb,
    )
    .with_context(|| format!("Cross-validation on {} failed", label))?;
    finish_with_success(&pb, &format!("{} models scored on {}", scores.len(), label));
    Ok(scores)
}

/// Refit preprocessing and `spec` on the whole training table, then append
/// `<target>_proba` to the test table
fn score_test_table(
    config: &BenchConfig,
    train_df: &DataFrame,
    test_path: &Path,
    spec: &ModelSpec,
) -> Result<()> {
    let target = &config.preprocess.target;
    let (test_df, rows, _, _) = load_dataset_with_progress(test_path, &config.load)?;
    if test_df.column(target).is_ok() {
        print_warning(&format!(
            "Test table has a '{}' column; it is carried through unchanged",
            target
        ));
    }

    let preprocessor = Preprocessor::fit(train_df, &config.preprocess)?;
    let train = Dataset::from_frame(&preprocessor.transform(train_df)?, target)?;
    let mut model = spec.build();
    model.fit(&train)?;

    let encoded = preprocessor.transform(&test_df)?;
    let features = feature_matrix(&encoded, &train.feature_names)
        .context("Test table could not be encoded like the training table")?;
    let proba = model.predict_proba(&features)?;

    let column_name = format!("{}_proba", target);
    let mut scored = test_df.clone();
    scored
        .with_column(Column::new(column_name.as_str().into(), proba.clone()))
        .context("Failed to append probabilities")?;

    let mean = proba.iter().sum::<f64>() / proba.len().max(1) as f64;
    print_success(&format!("Scored {} rows with {}", rows, spec.name()));
    print_stat("Mean predicted probability", format!("{:.4}", mean));

    match &config.predictions {
        Some(path) => {
            save_dataset(&mut scored, path)?;
            print_success(&format!("Predictions saved to {}", path.display()));
        }
        None => print_info("Pass --predictions to write the scored table"),
    }
    Ok(())
}

fn run_describe(
    input: &Path,
    target: &str,
    bins: usize,
    histogram_path: Option<&Path>,
    options: &LoadOptions,
) -> Result<()> {
    print_banner(env!("CARGO_PKG_VERSION"));

    let (df, rows, cols, memory_mb) = load_dataset_with_progress(input, options)?;
    println!("\n    {} Dataset Statistics:", style("✧").cyan());
    print_stat("Rows", rows);
    print_stat("Columns", cols);
    print_stat("Estimated memory", format!("{:.2} MB", memory_mb));

    let categorical: Vec<String> = DEFAULT_CATEGORICAL_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(target.to_string()))
        .collect();
    display_description(&describe_frame(&df, &categorical)?);

    match class_balance(&df, target) {
        Ok(balance) => {
            println!();
            print_info(&format!("Target '{}'", target));
            display_class_balance(&balance);
        }
        Err(e) => print_warning(&format!("No class balance for '{}': {}", target, e)),
    }

    if let Some(path) = histogram_path {
        let hists = histograms(&df, bins, &[target.to_string()])?;
        export_histograms(&hists, path)?;
        print_success(&format!(
            "{} histograms saved to {}",
            hists.len(),
            path.display()
        ));
    }

    print_completion();
    Ok(())
}

/// Save dataset to file (CSV or Parquet based on extension)
fn save_dataset(df: &mut DataFrame, path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "csv" => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            CsvWriter::new(&mut file)
                .finish(df)
                .with_context(|| format!("Failed to write CSV file: {}", path.display()))?;
        }
        "parquet" => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            ParquetWriter::new(file)
                .finish(df)
                .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;
        }
        _ => anyhow::bail!(
            "Unsupported output format: {}. Supported formats: csv, parquet",
            extension
        ),
    }

    Ok(())
}
