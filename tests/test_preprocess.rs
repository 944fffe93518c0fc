//! Integration tests for preprocessing on the synthetic marketing table

use polars::prelude::*;
use respbench::pipeline::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn unscaled(encoding: EncodingMode, derive_ratios: bool) -> PreprocessConfig {
    PreprocessConfig {
        encoding,
        scale: false,
        derive_ratios,
        ..PreprocessConfig::default()
    }
}

#[test]
fn test_one_hot_preserves_rows_and_sets_one_indicator() {
    let df = create_default_marketing_dataframe();
    let out = preprocess(&df, &PreprocessConfig::default()).unwrap();

    // 10 columns - 3 categorical + 2 location + 5 device + 2 gender indicators
    assert_shape(&out, 1000, 16);
    assert_missing_columns(&out, &["device_type", "gender", "in_initial_launch_location"]);

    for (column, levels) in [
        ("in_initial_launch_location", 2),
        ("device_type", DEVICE_TYPES.len()),
        ("gender", 2),
    ] {
        let names: Vec<String> = (1..=levels).map(|k| format!("{}_onehot{}", column, k)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        assert_has_columns(&out, &refs);

        let indicators: Vec<Vec<f64>> = names.iter().map(|n| f64_values(&out, n)).collect();
        for row in 0..out.height() {
            let sum: f64 = indicators.iter().map(|col| col[row]).sum();
            assert_eq!(sum, 1.0, "row {} of {} has {} indicators set", row, column, sum);
        }
    }
}

#[test]
fn test_one_hot_levels_follow_sorted_order() {
    let df = create_small_marketing_dataframe();
    let pre = Preprocessor::fit(&df, &unscaled(EncodingMode::OneHot, false)).unwrap();
    let device = pre
        .encoders()
        .iter()
        .find(|e| e.column() == "device_type")
        .unwrap();
    assert_eq!(device.levels(), &["android", "desktop", "ios", "laptop", "other"]);

    let out = pre.transform(&df).unwrap();
    // row 2 is "ios", the third level
    assert_eq!(f64_values(&out, "device_type_onehot3")[2], 1.0);
}

#[test]
fn test_missing_gender_imputed_with_mode() {
    let df = create_small_marketing_dataframe();
    let pre = Preprocessor::fit(&df, &unscaled(EncodingMode::Ordinal, false)).unwrap();
    assert_eq!(
        pre.fills(),
        &[("gender".to_string(), FillValue::Text("F".to_string()))]
    );
    let out = pre.transform(&df).unwrap();
    // F -> 0, M -> 1; the null in row 2 becomes F
    assert_eq!(f64_values(&out, "gender"), vec![0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
}

#[test]
fn test_ordinal_codes_written_in_place() {
    let df = create_default_marketing_dataframe();
    let out = preprocess(&df, &unscaled(EncodingMode::Ordinal, false)).unwrap();

    assert_eq!(out.get_column_names(), df.get_column_names());
    let codes = f64_values(&out, "device_type");
    assert!(codes.iter().all(|&c| c >= 0.0 && c < DEVICE_TYPES.len() as f64));
    assert!(codes.iter().all(|c| c.fract() == 0.0));
}

#[test]
fn test_ratio_columns_match_raw_division() {
    let df = create_default_marketing_dataframe();
    let out = preprocess(&df, &unscaled(EncodingMode::OneHot, true)).unwrap();

    let cost = f64_values(&df, "cost_of_ad");
    let income = f64_values(&df, "income");
    let drivers = f64_values(&df, "n_drivers");
    let vehicles = f64_values(&df, "n_vehicles");

    let checks: [(&str, &Vec<f64>, &Vec<f64>); 5] = [
        ("cost/driver", &cost, &drivers),
        ("cost/vehicle", &cost, &vehicles),
        ("income/driver", &income, &drivers),
        ("income/vehicle", &income, &vehicles),
        ("vehicle/driver", &vehicles, &drivers),
    ];
    for (name, num, den) in checks {
        let ratio = f64_values(&out, name);
        for i in 0..ratio.len() {
            assert!(
                (ratio[i] - num[i] / den[i]).abs() < 1e-12,
                "{} row {}: {} != {}",
                name,
                i,
                ratio[i],
                num[i] / den[i]
            );
        }
    }
}

#[test]
fn test_zero_denominator_is_value_error() {
    let mut df = create_small_marketing_dataframe();
    df.with_column(Column::new("n_drivers".into(), [1i64, 0, 1, 2, 1, 2]))
        .unwrap();
    let err = preprocess(&df, &unscaled(EncodingMode::OneHot, true)).unwrap_err();
    assert!(matches!(err, BenchError::Value(_)));
}

#[test]
fn test_min_max_fit_on_training_rows_only() {
    let df = create_default_marketing_dataframe();
    let (train, test) = stratified_split(&df, "outcome", 0.3, 42).unwrap();

    let pre = Preprocessor::fit(&train, &PreprocessConfig::default()).unwrap();
    let train_out = pre.transform(&train).unwrap();
    let test_out = pre.transform(&test).unwrap();

    let age = f64_values(&train_out, "age");
    let min = age.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = age.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(min, 0.0);
    assert!((max - 1.0).abs() < 1e-12);

    // no clamping: unseen extremes map outside [0, 1]
    let mut extreme = test.slice(0, 2);
    extreme
        .with_column(Column::new("age".into(), [0i64, 200]))
        .unwrap();
    let extreme_out = pre.transform(&extreme).unwrap();
    let ages = f64_values(&extreme_out, "age");
    assert!(ages[0] < 0.0);
    assert!(ages[1] > 1.0);

    // indicators are never rescaled
    let indicator = f64_values(&test_out, "device_type_onehot1");
    assert!(indicator.iter().all(|&v| v == 0.0 || v == 1.0));
}

#[test]
fn test_standard_scaler_centers_training_rows() {
    let df = create_default_marketing_dataframe();
    let config = PreprocessConfig {
        scaler: Some(ScalerKind::Standard),
        ..PreprocessConfig::default()
    };
    let out = preprocess(&df, &config).unwrap();
    let income = f64_values(&out, "income");
    let n = income.len() as f64;
    let mean = income.iter().sum::<f64>() / n;
    let var = income.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    assert!(mean.abs() < 1e-9);
    assert!((var - 1.0).abs() < 1e-9);
}

#[test]
fn test_unseen_level_handling() {
    let df = create_small_marketing_dataframe();
    let mut unseen = df.slice(0, 1);
    unseen
        .with_column(Column::new("device_type".into(), ["smart_tv"]))
        .unwrap();

    let one_hot = Preprocessor::fit(&df, &unscaled(EncodingMode::OneHot, false)).unwrap();
    let out = one_hot.transform(&unseen).unwrap();
    for k in 1..=5 {
        assert_eq!(f64_values(&out, &format!("device_type_onehot{}", k)), vec![0.0]);
    }

    let ordinal = Preprocessor::fit(&df, &unscaled(EncodingMode::Ordinal, false)).unwrap();
    let err = ordinal.transform(&unseen).unwrap_err();
    assert!(matches!(err, BenchError::Value(_)));
}

#[test]
fn test_unlabelled_table_matches_training_features() {
    let df = create_default_marketing_dataframe();
    let pre = Preprocessor::fit(&df, &PreprocessConfig::default()).unwrap();
    let train = Dataset::from_frame(&pre.transform(&df).unwrap(), "outcome").unwrap();

    let unlabelled = df.drop("outcome").unwrap().slice(0, 10);
    let encoded = pre.transform(&unlabelled).unwrap();
    let features = feature_matrix(&encoded, &train.feature_names).unwrap();
    assert_eq!(features.len(), 10);
    assert_eq!(features[0].len(), train.n_features());
    assert_eq!(features[3], train.features[3]);
}

#[test]
fn test_input_table_is_not_mutated() {
    let df = create_small_marketing_dataframe();
    let before = df.clone();
    let _ = preprocess(&df, &PreprocessConfig::default()).unwrap();
    assert!(df.equals_missing(&before));
}
