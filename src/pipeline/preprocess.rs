//! Fitted preprocessing: impute, derive ratios, encode and scale
//!
//! `Preprocessor::fit` learns everything it needs from one table and the
//! resulting value is immutable; `transform` can then be applied to the
//! training rows, held-out rows or an unlabeled test table alike.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::encoding::{apply_encoders, CategoryEncoder, EncodingMode};
use super::error::{BenchError, Result};
use super::features::derive_ratios;
use super::frame::is_numeric;
use super::missing::{column_mode, fill_missing, FillValue};
use super::scaling::{Scaler, ScalerKind};

pub const DEFAULT_CATEGORICAL_COLUMNS: [&str; 3] =
    ["in_initial_launch_location", "device_type", "gender"];
pub const DEFAULT_IMPUTE_COLUMNS: [&str; 1] = ["gender"];

/// Preprocessing options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub target: String,
    pub encoding: EncodingMode,
    pub scale: bool,
    pub scaler: Option<ScalerKind>,
    pub derive_ratios: bool,
    pub categorical_columns: Vec<String>,
    pub impute_columns: Vec<String>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            target: "outcome".to_string(),
            encoding: EncodingMode::OneHot,
            scale: true,
            scaler: Some(ScalerKind::MinMax),
            derive_ratios: false,
            categorical_columns: DEFAULT_CATEGORICAL_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            impute_columns: DEFAULT_IMPUTE_COLUMNS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PreprocessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(BenchError::config("target column name is empty"));
        }
        if self.scale && self.scaler.is_none() {
            return Err(BenchError::config(
                "scaling is enabled but no scaler was given",
            ));
        }
        if self.categorical_columns.iter().any(|c| c == &self.target) {
            return Err(BenchError::config(format!(
                "target '{}' cannot also be a categorical feature",
                self.target
            )));
        }
        Ok(())
    }
}

/// Everything learned from the fitting rows
#[derive(Debug, Clone, Serialize)]
pub struct Preprocessor {
    config: PreprocessConfig,
    fills: Vec<(String, FillValue)>,
    encoders: Vec<CategoryEncoder>,
    scaler: Option<Scaler>,
}

impl Preprocessor {
    pub fn fit(df: &DataFrame, config: &PreprocessConfig) -> Result<Self> {
        config.validate()?;

        let mut fills = Vec::with_capacity(config.impute_columns.len());
        let mut working = df.clone();
        for name in &config.impute_columns {
            let mode = column_mode(&working, name)?;
            tracing::debug!(column = %name, fill = %mode, "imputing with mode");
            working = fill_missing(&working, name, &mode)?;
            fills.push((name.clone(), mode));
        }

        if config.derive_ratios {
            working = derive_ratios(&working)?;
        }

        let encoders = config
            .categorical_columns
            .iter()
            .map(|name| CategoryEncoder::fit(&working, name))
            .collect::<Result<Vec<_>>>()?;

        let scaler = match (config.scale, config.scaler) {
            (true, Some(kind)) => {
                let columns = scalable_columns(&working, config);
                Some(Scaler::fit(&working, &columns, kind)?)
            }
            _ => None,
        };

        Ok(Self {
            config: config.clone(),
            fills,
            encoders,
            scaler,
        })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    pub fn encoders(&self) -> &[CategoryEncoder] {
        &self.encoders
    }

    pub fn scaler(&self) -> Option<&Scaler> {
        self.scaler.as_ref()
    }

    pub fn fills(&self) -> &[(String, FillValue)] {
        &self.fills
    }

    /// Apply the fitted steps in order. The target column may be absent
    /// (unlabeled tables); when present it is carried through untouched.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();

        for (name, fill) in &self.fills {
            out = fill_missing(&out, name, fill)?;
        }

        if self.config.derive_ratios {
            out = derive_ratios(&out)?;
        }

        out = apply_encoders(&out, &self.encoders, self.config.encoding)?;

        if let Some(scaler) = &self.scaler {
            out = scaler.transform(&out)?;
        }

        Ok(out)
    }

    /// Output feature columns of a transformed table (everything but the
    /// target)
    pub fn feature_names(&self, transformed: &DataFrame) -> Vec<String> {
        transformed
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|s| s != &self.config.target)
            .collect()
    }
}

/// Numeric, non-categorical, non-target columns: the raw numeric features
/// plus any derived ratios.
pub fn scalable_columns(df: &DataFrame, config: &PreprocessConfig) -> Vec<String> {
    let mut columns = Vec::new();
    for col in df.get_columns() {
        let name = col.name().as_str();
        if name == config.target || config.categorical_columns.iter().any(|c| c == name) {
            continue;
        }
        if is_numeric(col) {
            columns.push(name.to_string());
        }
    }
    columns
}

/// Fit on `df` and transform it in one go
pub fn preprocess(df: &DataFrame, config: &PreprocessConfig) -> Result<DataFrame> {
    Preprocessor::fit(df, config)?.transform(df)
}
