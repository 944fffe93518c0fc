//! Exploratory summaries: per-column statistics, level counts and
//! histogram bins for an external plotting tool

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use polars::prelude::DataFrame;
use serde::Serialize;

use crate::pipeline::error::{BenchError, Result};
use crate::pipeline::frame::{column_as_f64, column_as_strings, column_names, is_numeric, require_column};

/// Statistics of one numeric column; all `None` when every value is missing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub name: String,
    pub count: usize,
    pub missing: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1)
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub median: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSummary {
    pub name: String,
    pub count: usize,
    pub missing: usize,
    /// `(level, rows)` by descending count, then level
    pub levels: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ColumnSummary {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
}

impl ColumnSummary {
    pub fn name(&self) -> &str {
        match self {
            ColumnSummary::Numeric(s) => &s.name,
            ColumnSummary::Categorical(s) => &s.name,
        }
    }
}

/// Linear-interpolation quantile of sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn numeric_summary(name: &str, values: &[Option<f64>]) -> NumericSummary {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    let missing = values.len() - present.len();
    present.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let n = present.len();
    let stats = (n > 0).then(|| {
        let mean = present.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            (present.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            f64::NAN
        };
        (mean, std)
    });

    NumericSummary {
        name: name.to_string(),
        count: n,
        missing,
        mean: stats.map(|s| s.0),
        std: stats.map(|s| s.1).filter(|s| !s.is_nan()),
        min: present.first().copied(),
        q25: (n > 0).then(|| quantile(&present, 0.25)),
        median: (n > 0).then(|| quantile(&present, 0.5)),
        q75: (n > 0).then(|| quantile(&present, 0.75)),
        max: present.last().copied(),
    }
}

/// Rows per level, by descending count then level; nulls are not counted
pub fn value_counts(df: &DataFrame, column: &str) -> Result<Vec<(String, usize)>> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in column_as_strings(df, column)?.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    Ok(counts)
}

/// Summarize every column. Columns listed in `categorical`, and every
/// non-numeric column, get level counts instead of statistics.
pub fn describe_frame(df: &DataFrame, categorical: &[String]) -> Result<Vec<ColumnSummary>> {
    column_names(df)
        .into_iter()
        .map(|name| {
            let col = require_column(df, &name)?;
            if is_numeric(col) && !categorical.contains(&name) {
                let values = column_as_f64(df, &name)?;
                Ok(ColumnSummary::Numeric(numeric_summary(&name, &values)))
            } else {
                let levels = value_counts(df, &name)?;
                let count: usize = levels.iter().map(|(_, c)| c).sum();
                Ok(ColumnSummary::Categorical(CategoricalSummary {
                    missing: df.height() - count,
                    name,
                    count,
                    levels,
                }))
            }
        })
        .collect()
}

/// Equal-width histogram of one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub column: String,
    /// `bins + 1` ascending edges; the last bin includes its right edge
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Bin non-missing values into `bins` equal-width bins spanning their
/// range. A constant column spans `value ± 0.5`.
pub fn histogram(column: &str, values: &[Option<f64>], bins: usize) -> Result<Histogram> {
    if bins == 0 {
        return Err(BenchError::config("histogram needs at least one bin"));
    }
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return Err(BenchError::value(format!(
            "column '{}' has no values to bin",
            column
        )));
    }

    let mut lo = present.iter().cloned().fold(f64::INFINITY, f64::min);
    let mut hi = present.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|k| lo + width * k as f64).collect();

    let mut counts = vec![0usize; bins];
    for x in present {
        let k = (((x - lo) / width).floor() as usize).min(bins - 1);
        counts[k] += 1;
    }

    Ok(Histogram {
        column: column.to_string(),
        edges,
        counts,
    })
}

/// Histograms of every numeric column not listed in `exclude`
pub fn histograms(df: &DataFrame, bins: usize, exclude: &[String]) -> Result<Vec<Histogram>> {
    let mut out = Vec::new();
    for name in column_names(df) {
        if exclude.contains(&name) || !is_numeric(require_column(df, &name)?) {
            continue;
        }
        let values = column_as_f64(df, &name)?;
        if values.iter().all(Option::is_none) {
            tracing::warn!(column = %name, "skipping histogram of all-missing column");
            continue;
        }
        out.push(histogram(&name, &values, bins)?);
    }
    Ok(out)
}

pub fn export_histograms(histograms: &[Histogram], path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(histograms)
        .context("Failed to serialize histograms to JSON")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write histograms to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_numeric_summary_quartiles() {
        let values: Vec<Option<f64>> = vec![Some(1.0), Some(2.0), None, Some(3.0), Some(4.0)];
        let s = numeric_summary("x", &values);
        assert_eq!(s.count, 4);
        assert_eq!(s.missing, 1);
        assert_eq!(s.mean, Some(2.5));
        assert_eq!(s.q25, Some(1.75));
        assert_eq!(s.median, Some(2.5));
        assert_eq!(s.q75, Some(3.25));
        assert!((s.std.unwrap() - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_single_value_has_no_std() {
        let s = numeric_summary("x", &[Some(7.0)]);
        assert_eq!(s.std, None);
        assert_eq!(s.median, Some(7.0));
    }

    #[test]
    fn test_histogram_edges_and_last_bin_inclusive() {
        let values: Vec<Option<f64>> = (0..=10).map(|i| Some(i as f64)).collect();
        let h = histogram("x", &values, 5).unwrap();
        assert_eq!(h.edges, vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(h.counts, vec![2, 2, 2, 2, 3]);
        assert_eq!(h.counts.iter().sum::<usize>(), 11);
    }

    #[test]
    fn test_histogram_constant_column() {
        let h = histogram("x", &[Some(3.0), Some(3.0)], 2).unwrap();
        assert_eq!(h.edges, vec![2.5, 3.0, 3.5]);
        assert_eq!(h.counts, vec![0, 2]);
        assert!(histogram("x", &[Some(1.0)], 0).is_err());
    }

    #[test]
    fn test_describe_frame_splits_kinds() {
        let df = df![
            "age" => [30i64, 40, 50],
            "gender" => [Some("F"), None, Some("F")],
            "device_type" => [1i64, 2, 1],
        ]
        .unwrap();
        let summaries = describe_frame(&df, &["device_type".to_string()]).unwrap();
        assert!(matches!(summaries[0], ColumnSummary::Numeric(_)));
        match &summaries[1] {
            ColumnSummary::Categorical(c) => {
                assert_eq!(c.missing, 1);
                assert_eq!(c.levels, vec![("F".to_string(), 2)]);
            }
            other => panic!("unexpected summary {:?}", other),
        }
        match &summaries[2] {
            ColumnSummary::Categorical(c) => {
                assert_eq!(c.levels, vec![("1".to_string(), 2), ("2".to_string(), 1)]);
            }
            other => panic!("unexpected summary {:?}", other),
        }
    }
}
