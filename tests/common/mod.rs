//! Shared test utilities and fixture generators

#![allow(dead_code)]

use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use tempfile::TempDir;

pub const DEVICE_TYPES: [&str; 5] = ["android", "desktop", "ios", "laptop", "other"];

/// Synthetic marketing-response table with the full column set.
///
/// Exactly `round(rows * positive_rate)` rows have `outcome = 1`: the rows
/// with the highest latent score, which rises with launch location, income
/// and ad cost. About 5% of `gender` values are missing.
pub fn create_marketing_dataframe(rows: usize, positive_rate: f64, seed: u64) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let mut age = Vec::with_capacity(rows);
    let mut cost_of_ad = Vec::with_capacity(rows);
    let mut location = Vec::with_capacity(rows);
    let mut income = Vec::with_capacity(rows);
    let mut n_drivers = Vec::with_capacity(rows);
    let mut n_vehicles = Vec::with_capacity(rows);
    let mut device_type = Vec::with_capacity(rows);
    let mut gender: Vec<Option<&str>> = Vec::with_capacity(rows);
    let mut prior_tenure = Vec::with_capacity(rows);
    let mut latent = Vec::with_capacity(rows);

    for _ in 0..rows {
        let a = rng.gen_range(18i64..80);
        let cost = rng.gen_range(0.003..0.009);
        let loc = rng.gen_range(0i64..2);
        let inc = rng.gen_range(20_000i64..150_000);
        let drivers = rng.gen_range(1i64..3);
        let vehicles = rng.gen_range(1i64..4);
        let device = DEVICE_TYPES[rng.gen_range(0..DEVICE_TYPES.len())];
        let g = match rng.gen_range(0..20) {
            0 => None,
            k if k % 2 == 0 => Some("F"),
            _ => Some("M"),
        };
        let tenure = rng.gen_range(0i64..20);

        let score = 1.5 * loc as f64
            + inc as f64 / 50_000.0
            + cost * 200.0
            + if device == "ios" { 0.5 } else { 0.0 }
            + rng.gen_range(-1.0..1.0);

        age.push(a);
        cost_of_ad.push(cost);
        location.push(loc);
        income.push(inc);
        n_drivers.push(drivers);
        n_vehicles.push(vehicles);
        device_type.push(device);
        gender.push(g);
        prior_tenure.push(tenure);
        latent.push(score);
    }

    let n_pos = (rows as f64 * positive_rate).round() as usize;
    let mut order: Vec<usize> = (0..rows).collect();
    order.sort_by(|&i, &j| latent[j].partial_cmp(&latent[i]).unwrap());
    let mut outcome = vec![0i64; rows];
    for &i in order.iter().take(n_pos) {
        outcome[i] = 1;
    }

    df! {
        "age" => age,
        "cost_of_ad" => cost_of_ad,
        "in_initial_launch_location" => location,
        "income" => income,
        "n_drivers" => n_drivers,
        "n_vehicles" => n_vehicles,
        "device_type" => device_type,
        "gender" => gender,
        "prior_tenure" => prior_tenure,
        "outcome" => outcome,
    }
    .unwrap()
}

/// The standard fixture: 1000 rows at a 10% positive rate
pub fn create_default_marketing_dataframe() -> DataFrame {
    create_marketing_dataframe(1000, 0.1, 7)
}

/// Small hand-written table with one row per device level
pub fn create_small_marketing_dataframe() -> DataFrame {
    df! {
        "age" => [25i64, 35, 45, 55, 65, 30],
        "cost_of_ad" => [0.004f64, 0.005, 0.006, 0.007, 0.008, 0.0045],
        "in_initial_launch_location" => [0i64, 1, 0, 1, 0, 1],
        "income" => [40_000i64, 50_000, 60_000, 70_000, 80_000, 90_000],
        "n_drivers" => [1i64, 2, 1, 2, 1, 2],
        "n_vehicles" => [1i64, 2, 3, 1, 2, 3],
        "device_type" => ["android", "desktop", "ios", "laptop", "other", "ios"],
        "gender" => [Some("F"), Some("M"), None, Some("F"), Some("M"), Some("F")],
        "prior_tenure" => [1i64, 3, 5, 7, 9, 11],
        "outcome" => [0i64, 1, 0, 0, 1, 0],
    }
    .unwrap()
}

/// Write `df` to a CSV file inside a fresh temporary directory
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Write `df` to a Parquet file inside a fresh temporary directory
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("test_data.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert that a DataFrame has expected shape
pub fn assert_shape(df: &DataFrame, expected_rows: usize, expected_cols: usize) {
    let (rows, cols) = df.shape();
    assert_eq!(rows, expected_rows, "Row count mismatch: expected {}, got {}", expected_rows, rows);
    assert_eq!(cols, expected_cols, "Column count mismatch: expected {}, got {}", expected_cols, cols);
}

/// Assert that a DataFrame contains specific columns
pub fn assert_has_columns(df: &DataFrame, expected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected_cols {
        assert!(
            actual_cols.contains(&col.to_string()),
            "Missing expected column: '{}'. Actual columns: {:?}",
            col,
            actual_cols
        );
    }
}

/// Assert that a DataFrame does NOT contain specific columns
pub fn assert_missing_columns(df: &DataFrame, unexpected_cols: &[&str]) {
    let actual_cols: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in unexpected_cols {
        assert!(
            !actual_cols.contains(&col.to_string()),
            "Unexpected column still present: '{}'",
            col
        );
    }
}

/// Column values as f64 (panics on nulls)
pub fn f64_values(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect()
}
