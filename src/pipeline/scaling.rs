//! Min-max and standard scaling of numeric feature columns

use std::fmt;
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::{BenchError, Result};
use super::frame::{column_as_f64, with_column};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalerKind {
    /// Map the fitting range onto [0, 1]
    #[default]
    MinMax,
    /// Zero mean, unit (population) variance
    Standard,
}

impl fmt::Display for ScalerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalerKind::MinMax => write!(f, "minmax"),
            ScalerKind::Standard => write!(f, "standard"),
        }
    }
}

impl FromStr for ScalerKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "minmax" => Ok(ScalerKind::MinMax),
            "standard" | "zscore" => Ok(ScalerKind::Standard),
            _ => Err(format!(
                "Invalid scaler: '{}'. Use 'minmax' or 'standard'",
                s
            )),
        }
    }
}

/// `(x - offset) / scale` for one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnScale {
    pub column: String,
    pub offset: f64,
    pub scale: f64,
}

impl ColumnScale {
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        (x - self.offset) / self.scale
    }
}

/// Scaling parameters learned from the fitting rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scaler {
    kind: ScalerKind,
    columns: Vec<ColumnScale>,
}

impl Scaler {
    /// Learn per-column parameters from the non-null values of `columns`.
    /// A constant column gets scale 1 so it maps to 0 instead of NaN.
    pub fn fit(df: &DataFrame, columns: &[String], kind: ScalerKind) -> Result<Self> {
        let mut params = Vec::with_capacity(columns.len());

        for name in columns {
            let values: Vec<f64> = column_as_f64(df, name)?.into_iter().flatten().collect();
            if values.is_empty() {
                return Err(BenchError::value(format!(
                    "cannot fit scaler on column '{}': no non-null values",
                    name
                )));
            }

            let (offset, spread) = match kind {
                ScalerKind::MinMax => {
                    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    (min, max - min)
                }
                ScalerKind::Standard => {
                    let n = values.len() as f64;
                    let mean = values.iter().sum::<f64>() / n;
                    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                    (mean, var.sqrt())
                }
            };

            let scale = if spread > f64::EPSILON { spread } else { 1.0 };
            tracing::trace!(column = %name, offset, scale, "fitted scaler column");
            params.push(ColumnScale {
                column: name.clone(),
                offset,
                scale,
            });
        }

        Ok(Self {
            kind,
            columns: params,
        })
    }

    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    pub fn columns(&self) -> &[ColumnScale] {
        &self.columns
    }

    /// Apply the fitted parameters unchanged. Values outside the fitting
    /// range are not clamped; nulls stay null.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for param in &self.columns {
            let scaled: Vec<Option<f64>> = column_as_f64(df, &param.column)?
                .into_iter()
                .map(|v| v.map(|x| param.apply(x)))
                .collect();
            out = with_column(&out, Column::new(param.column.as_str().into(), scaled))?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        df! {
            "age" => [20.0f64, 30.0, 40.0],
            "income" => [1000i64, 3000, 5000],
        }
        .unwrap()
    }

    fn names() -> Vec<String> {
        vec!["age".to_string(), "income".to_string()]
    }

    #[test]
    fn test_minmax_maps_range_to_unit_interval() {
        let df = frame();
        let scaler = Scaler::fit(&df, &names(), ScalerKind::MinMax).unwrap();
        let out = scaler.transform(&df).unwrap();
        assert_eq!(
            column_as_f64(&out, "age").unwrap(),
            vec![Some(0.0), Some(0.5), Some(1.0)]
        );
        assert_eq!(
            column_as_f64(&out, "income").unwrap(),
            vec![Some(0.0), Some(0.5), Some(1.0)]
        );
    }

    #[test]
    fn test_minmax_does_not_clamp_new_data() {
        let scaler = Scaler::fit(&frame(), &names(), ScalerKind::MinMax).unwrap();
        let new = df! {
            "age" => [10.0f64, 60.0],
            "income" => [3000i64, 3000],
        }
        .unwrap();
        let out = scaler.transform(&new).unwrap();
        let age = column_as_f64(&out, "age").unwrap();
        assert!((age[0].unwrap() + 0.5).abs() < 1e-12);
        assert!((age[1].unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_standard_scaler_zero_mean_unit_variance() {
        let df = frame();
        let scaler = Scaler::fit(&df, &names(), ScalerKind::Standard).unwrap();
        let out = scaler.transform(&df).unwrap();
        let age: Vec<f64> = column_as_f64(&out, "age").unwrap().into_iter().flatten().collect();
        let mean = age.iter().sum::<f64>() / 3.0;
        let var = age.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let df = df! { "c" => [5.0f64, 5.0, 5.0] }.unwrap();
        let scaler = Scaler::fit(&df, &["c".to_string()], ScalerKind::MinMax).unwrap();
        let out = scaler.transform(&df).unwrap();
        assert_eq!(
            column_as_f64(&out, "c").unwrap(),
            vec![Some(0.0), Some(0.0), Some(0.0)]
        );
    }

    #[test]
    fn test_scaler_kind_parsing() {
        assert_eq!("minmax".parse::<ScalerKind>().unwrap(), ScalerKind::MinMax);
        assert_eq!("min-max".parse::<ScalerKind>().unwrap(), ScalerKind::MinMax);
        assert_eq!("standard".parse::<ScalerKind>().unwrap(), ScalerKind::Standard);
        assert!("robust".parse::<ScalerKind>().is_err());
    }
}
