//! Ratio features derived from the raw marketing columns

use polars::prelude::*;

use super::error::{BenchError, Result};
use super::frame::{column_as_f64, with_column};

/// A derived `numerator / denominator` column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatioFeature {
    pub name: &'static str,
    pub numerator: &'static str,
    pub denominator: &'static str,
}

pub const RATIO_FEATURES: [RatioFeature; 5] = [
    RatioFeature {
        name: "cost/driver",
        numerator: "cost_of_ad",
        denominator: "n_drivers",
    },
    RatioFeature {
        name: "cost/vehicle",
        numerator: "cost_of_ad",
        denominator: "n_vehicles",
    },
    RatioFeature {
        name: "income/driver",
        numerator: "income",
        denominator: "n_drivers",
    },
    RatioFeature {
        name: "income/vehicle",
        numerator: "income",
        denominator: "n_vehicles",
    },
    RatioFeature {
        name: "vehicle/driver",
        numerator: "n_vehicles",
        denominator: "n_drivers",
    },
];

pub fn ratio_feature_names() -> Vec<String> {
    RATIO_FEATURES.iter().map(|r| r.name.to_string()).collect()
}

impl RatioFeature {
    /// Compute the ratio for every row of `df`
    pub fn compute(&self, df: &DataFrame) -> Result<Vec<f64>> {
        let num = column_as_f64(df, self.numerator)?;
        let den = column_as_f64(df, self.denominator)?;

        num.into_iter()
            .zip(den)
            .enumerate()
            .map(|(row, (n, d))| match (n, d) {
                (Some(_), Some(d)) if d == 0.0 => Err(BenchError::value(format!(
                    "cannot derive '{}': '{}' is zero at row {}",
                    self.name, self.denominator, row
                ))),
                (Some(n), Some(d)) => Ok(n / d),
                _ => Err(BenchError::value(format!(
                    "cannot derive '{}': missing '{}' or '{}' at row {}",
                    self.name, self.numerator, self.denominator, row
                ))),
            })
            .collect()
    }
}

/// Append all ratio columns to a copy of `df`
pub fn derive_ratios(df: &DataFrame) -> Result<DataFrame> {
    let mut out = df.clone();
    for ratio in &RATIO_FEATURES {
        let values = ratio.compute(df)?;
        out = with_column(&out, Column::new(ratio.name.into(), values))?;
    }
    Ok(out)
}
