//! Unit tests for missing value analysis and imputation

use polars::prelude::*;
use respbench::pipeline::{
    analyze_missing_values, column_mode, columns_with_missing, fill_missing, BenchError, FillValue,
};

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_analyze_missing_values_basic() {
    let df = df! {
        "col_complete" => [1.0f64, 2.0, 3.0, 4.0, 5.0],
        "col_partial_missing" => [Some(1.0f64), Some(2.0), None, None, Some(5.0)],
        "col_all_missing" => [None::<f64>, None, None, None, None],
    }
    .unwrap();

    let ratios = analyze_missing_values(&df);

    // sorted by descending ratio
    let names: Vec<&str> = ratios.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["col_all_missing", "col_partial_missing", "col_complete"]);

    let ratio_map: std::collections::HashMap<_, _> = ratios.into_iter().collect();
    assert!((ratio_map["col_complete"] - 0.0).abs() < 0.001);
    assert!((ratio_map["col_partial_missing"] - 0.4).abs() < 0.001);
    assert!((ratio_map["col_all_missing"] - 1.0).abs() < 0.001);
}

#[test]
fn test_analyze_missing_values_empty_frame() {
    let df = DataFrame::empty();
    assert!(analyze_missing_values(&df).is_empty());
}

#[test]
fn test_only_gender_has_missing_values() {
    let df = create_default_marketing_dataframe();
    let missing = columns_with_missing(&df, &["outcome"]);
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].0, "gender");
    assert!(missing[0].1 > 0);

    assert!(columns_with_missing(&df, &["gender"]).is_empty());
}

#[test]
fn test_numeric_mode_and_fill() {
    let df = df! {
        "n_drivers" => [Some(2i64), None, Some(1), Some(2), None],
    }
    .unwrap();

    let mode = column_mode(&df, "n_drivers").unwrap();
    assert_eq!(mode, FillValue::Number(2.0));

    let filled = fill_missing(&df, "n_drivers", &mode).unwrap();
    assert_eq!(filled.column("n_drivers").unwrap().null_count(), 0);
    assert_eq!(
        f64_values(&filled, "n_drivers"),
        vec![2.0, 2.0, 1.0, 2.0, 2.0]
    );
}

#[test]
fn test_text_fill_keeps_other_values() {
    let df = create_small_marketing_dataframe();
    let filled = fill_missing(&df, "gender", &FillValue::Text("F".into())).unwrap();

    let gender: Vec<Option<String>> = filled
        .column("gender")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    assert!(gender.iter().all(Option::is_some));
    assert_eq!(gender[2].as_deref(), Some("F"));
    assert_eq!(filled.height(), df.height());
}

#[test]
fn test_mode_of_all_missing_column_fails() {
    let df = df! {
        "gender" => [None::<&str>, None, None],
    }
    .unwrap();
    let err = column_mode(&df, "gender").unwrap_err();
    assert!(matches!(err, BenchError::Value(_)));
}
