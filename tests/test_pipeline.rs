//! Integration tests for the full load, preprocess, split and fit flow

use respbench::evaluation::*;
use respbench::models::*;
use respbench::pipeline::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_full_pipeline_beats_baseline() {
    let mut df = create_default_marketing_dataframe();
    let (_temp_dir, csv_path) = create_temp_csv(&mut df);

    // Load
    let options = LoadOptions::with_infer_schema_length(100);
    let (df, rows, cols, _mem) = load_dataset_with_progress(&csv_path, &options).unwrap();
    assert_eq!((rows, cols), (1000, 10));
    let balance = class_balance(&df, "outcome").unwrap();
    assert_eq!(balance.positives, 100);

    // Split before fitting anything
    let (train_df, test_df) = stratified_split(&df, "outcome", 0.3, 42).unwrap();

    // One-hot + min-max, fitted on the training rows
    let pre = Preprocessor::fit(&train_df, &PreprocessConfig::default()).unwrap();
    let train = Dataset::from_frame(&pre.transform(&train_df).unwrap(), "outcome").unwrap();
    let test = Dataset::from_frame(&pre.transform(&test_df).unwrap(), "outcome").unwrap();
    assert_eq!(train.feature_names, test.feature_names);
    assert_eq!(train.n_features(), 15);
    assert!(
        !train.feature_names.contains(&"outcome".to_string()),
        "Target must not leak into the features"
    );

    let mut baseline = ModelSpec::Zero.build();
    baseline.fit(&train).unwrap();
    let baseline_auc =
        roc_auc(&test.labels, &baseline.predict_proba(&test.features).unwrap()).unwrap();

    let mut lr = ModelKind::Lr.default_spec().build();
    lr.fit(&train).unwrap();
    let auc = roc_auc(&test.labels, &lr.predict_proba(&test.features).unwrap()).unwrap();

    assert_eq!(baseline_auc, 0.5);
    assert!((0.0..=1.0).contains(&auc));
    assert!(auc > baseline_auc, "LR AUC {} should beat the baseline", auc);
}

#[test]
fn test_engineered_stage_adds_ratio_features() {
    let df = create_default_marketing_dataframe();
    let base = PreprocessConfig::default();
    let engineered = PreprocessConfig {
        derive_ratios: true,
        ..PreprocessConfig::default()
    };

    let base_data = Dataset::from_frame(&preprocess(&df, &base).unwrap(), "outcome").unwrap();
    let eng_data = Dataset::from_frame(&preprocess(&df, &engineered).unwrap(), "outcome").unwrap();
    assert_eq!(eng_data.n_features(), base_data.n_features() + 5);
    assert!(eng_data.feature_names.contains(&"income/vehicle".to_string()));

    // ratios are scaled with the other numeric columns
    let j = eng_data
        .feature_names
        .iter()
        .position(|n| n == "cost/driver")
        .unwrap();
    let ratio = eng_data.column(j);
    assert!(ratio.iter().all(|&v| (0.0..=1.0 + 1e-12).contains(&v)));
}

#[test]
fn test_scored_table_gets_probability_column() {
    let df = create_marketing_dataframe(300, 0.1, 5);
    let config = PreprocessConfig::default();
    let pre = Preprocessor::fit(&df, &config).unwrap();
    let train = Dataset::from_frame(&pre.transform(&df).unwrap(), "outcome").unwrap();

    let mut model = ModelKind::Lda.default_spec().build();
    model.fit(&train).unwrap();

    let unlabelled = df.drop("outcome").unwrap().slice(10, 25);
    let features = feature_matrix(&pre.transform(&unlabelled).unwrap(), &train.feature_names).unwrap();
    let proba = model.predict_proba(&features).unwrap();
    assert_eq!(proba.len(), 25);
    assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn test_inner_folds_scale_with_their_own_training_rows() {
    let df = create_marketing_dataframe(300, 0.1, 9);
    let config = PreprocessConfig {
        scaler: Some(ScalerKind::Standard),
        ..PreprocessConfig::default()
    };
    let labels = target_labels(&df, "outcome").unwrap();
    let folds = stratified_k_fold(&labels, 3, Some(42)).unwrap();
    let prepared = FoldSource::frame(&df, &config).prepare(&folds).unwrap();
    assert_eq!(prepared.len(), 3);

    let income = f64_values(&df, "income");
    let table_mean = income.iter().sum::<f64>() / income.len() as f64;

    for (fold, (train, test)) in folds.iter().zip(&prepared) {
        let j = train.feature_names.iter().position(|n| n == "income").unwrap();
        let fold_income: Vec<f64> = fold.train_indices.iter().map(|&i| income[i]).collect();
        let n = fold_income.len() as f64;
        let mean = fold_income.iter().sum::<f64>() / n;
        let std = (fold_income.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        assert!((mean - table_mean).abs() > 1e-6, "fold mean should differ from the table mean");

        // centred on the fold's training rows, not the whole table
        let scaled_mean = train.column(j).iter().sum::<f64>() / n;
        assert!(scaled_mean.abs() < 1e-9);

        for (&row, v) in fold.test_indices.iter().zip(test.column(j)) {
            assert!((v - (income[row] - mean) / std).abs() < 1e-9);
        }
    }
}
