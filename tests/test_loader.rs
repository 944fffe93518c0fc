//! Unit tests for loading marketing tables from CSV and Parquet

use polars::prelude::*;
use respbench::pipeline::{
    dataset_stats, get_column_names, load_dataset, load_dataset_with_options,
    load_dataset_with_progress, target_labels, validate_field_counts, BenchError, LoadOptions,
};
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

use common::*;

const MARKETING_COLUMNS: [&str; 10] = [
    "age",
    "cost_of_ad",
    "in_initial_launch_location",
    "income",
    "n_drivers",
    "n_vehicles",
    "device_type",
    "gender",
    "prior_tenure",
    "outcome",
];

/// Write raw CSV lines to `name` inside a fresh temporary directory
fn write_raw(name: &str, lines: &[&str]) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    (temp_dir, path)
}

fn null_count(df: &DataFrame, name: &str) -> usize {
    df.column(name).unwrap().null_count()
}

#[test]
fn test_marketing_csv_keeps_target_and_categoricals() {
    let mut df = create_small_marketing_dataframe();
    let (_temp_dir, csv_path) = create_temp_csv(&mut df);

    let (loaded, rows, cols, mem_mb) =
        load_dataset_with_progress(&csv_path, &LoadOptions::default()).unwrap();
    assert_eq!((rows, cols), (6, 10));
    assert!(mem_mb > 0.0);

    let schema = loaded.schema();
    assert_eq!(schema.get("device_type"), Some(&DataType::String));
    assert_eq!(schema.get("gender"), Some(&DataType::String));
    assert!(schema.get("income").unwrap().is_primitive_numeric());
    assert!(schema.get("cost_of_ad").unwrap().is_float());

    assert_eq!(
        target_labels(&loaded, "outcome").unwrap(),
        vec![0.0, 1.0, 0.0, 0.0, 1.0, 0.0]
    );
    // the empty gender cell comes back missing
    assert_eq!(null_count(&loaded, "gender"), 1);
}

#[test]
fn test_marketing_table_round_trips_through_parquet() {
    let mut df = create_default_marketing_dataframe();
    let (_temp_dir, parquet_path) = create_temp_parquet(&mut df);

    let (loaded, rows, cols, _) =
        load_dataset_with_progress(&parquet_path, &LoadOptions::default()).unwrap();
    assert_eq!((rows, cols), (1000, 10));
    assert_eq!(null_count(&loaded, "gender"), null_count(&df, "gender"));
    assert_eq!(
        target_labels(&loaded, "outcome").unwrap(),
        target_labels(&df, "outcome").unwrap()
    );
}

#[test]
fn test_header_names_follow_file_order() {
    let mut df = create_small_marketing_dataframe();
    let (_csv_dir, csv_path) = create_temp_csv(&mut df);
    let (_parquet_dir, parquet_path) = create_temp_parquet(&mut df);
    let options = LoadOptions::default();

    assert_eq!(get_column_names(&csv_path, &options).unwrap(), MARKETING_COLUMNS);
    assert_eq!(get_column_names(&parquet_path, &options).unwrap(), MARKETING_COLUMNS);
}

#[test]
fn test_na_and_empty_cells_are_missing() {
    let (_temp_dir, path) = write_raw(
        "train.csv",
        &[
            "age,income,device_type,gender,outcome",
            "31,52000,ios,F,0",
            "44,NA,android,NA,1",
            "27,,desktop,,0",
            "52,61000,laptop,M,0",
        ],
    );

    let df = load_dataset(&path, 100).unwrap();
    assert_eq!(df.height(), 4);
    assert!(df.column("income").unwrap().dtype().is_primitive_numeric());
    assert_eq!(null_count(&df, "income"), 2);
    assert_eq!(null_count(&df, "gender"), 2);
    assert_eq!(null_count(&df, "outcome"), 0);

    // without null markers "NA" is ordinary text
    let literal = LoadOptions {
        null_values: Vec::new(),
        ..LoadOptions::default()
    };
    let df = load_dataset_with_options(&path, &literal).unwrap();
    assert_eq!(df.column("income").unwrap().dtype(), &DataType::String);
    assert_eq!(null_count(&df, "gender"), 1);
}

#[test]
fn test_semicolon_delimited_marketing_file() {
    let mut df = create_small_marketing_dataframe();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("train.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut file)
        .with_separator(b';')
        .finish(&mut df)
        .unwrap();
    drop(file);

    let options = LoadOptions {
        delimiter: b';',
        ..LoadOptions::default()
    };
    let loaded = load_dataset_with_options(&path, &options).unwrap();
    assert_eq!(dataset_stats(&loaded).0, 6);
    assert_eq!(get_column_names(&path, &options).unwrap(), MARKETING_COLUMNS);

    // read with commas, each record is a single field
    let flat = load_dataset(&path, 100).unwrap();
    assert_eq!(flat.width(), 1);
}

#[test]
fn test_ragged_csv_is_load_error() {
    let (_temp_dir, path) = write_raw(
        "ragged.csv",
        &["age,income,outcome", "31,52000,0", "44,1"],
    );

    let err = load_dataset(&path, 100).unwrap_err();
    match err {
        BenchError::Load { reason, .. } => {
            assert!(reason.contains("line 3"), "unexpected reason: {}", reason)
        }
        other => panic!("expected a load error, got {:?}", other),
    }
}

#[test]
fn test_quoted_delimiters_do_not_count_as_fields() {
    let (_temp_dir, path) = write_raw(
        "quoted.csv",
        &["device_type,income,outcome", "\"tablet, 10in\",52000,1"],
    );

    let df = load_dataset(&path, 100).unwrap();
    assert_eq!(df.shape(), (1, 3));
    let device = df.column("device_type").unwrap().str().unwrap().get(0);
    assert_eq!(device, Some("tablet, 10in"));
}

#[test]
fn test_quote_inside_unquoted_field_is_literal() {
    let (_temp_dir, path) = write_raw(
        "quote.csv",
        &["device_type,income,outcome", "5\"tablet,52000,1", "ios,61000,0"],
    );
    validate_field_counts(&path, b',').unwrap();

    let (_temp_dir, ragged) = write_raw(
        "quote_ragged.csv",
        &["device_type,income,outcome", "5\"tablet,52000", "ios,61000,0"],
    );
    let err = validate_field_counts(&ragged, b',').unwrap_err();
    assert!(matches!(err, BenchError::Load { .. }));
}

#[test]
fn test_full_scan_schema_inference() {
    let mut lines = vec!["income,outcome".to_string()];
    lines.extend((0..50).map(|i| format!("{},0", 40_000 + i)));
    lines.push("52000.5,1".to_string());
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let (_temp_dir, path) = write_raw("late_float.csv", &refs);

    // a late float is only seen when the whole file is scanned
    let df = load_dataset(&path, 0).unwrap();
    assert_eq!(df.column("income").unwrap().dtype(), &DataType::Float64);
    assert_eq!(df.height(), 51);
    assert!(load_dataset(&path, 10).is_err());
}

#[test]
fn test_unsupported_format_is_load_error() {
    let (_temp_dir, path) = write_raw("train.xlsx", &["age,outcome", "31,0"]);

    match load_dataset(&path, 100).unwrap_err() {
        BenchError::Load { reason, .. } => assert!(reason.contains("Unsupported"), "{}", reason),
        other => panic!("expected a load error, got {:?}", other),
    }
    assert!(get_column_names(&path, &LoadOptions::default()).is_err());
}

#[test]
fn test_missing_file_is_load_error() {
    let path = std::path::Path::new("/nonexistent/train.csv");
    assert!(matches!(load_dataset(path, 100).unwrap_err(), BenchError::Load { .. }));
    assert!(get_column_names(path, &LoadOptions::default()).is_err());
}
