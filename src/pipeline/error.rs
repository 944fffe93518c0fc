//! Error types for the bench pipeline.
//!
//! Every stage returns `BenchError`. Each variant maps to one failure class:
//! input files that cannot be read, invalid configuration, and data that a
//! stage cannot work with (unexpected missing values, bad split fractions,
//! degenerate class distributions).

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by the loader, preprocessor, splitter and model bench.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Input file is missing, unreadable or malformed.
    #[error("Failed to load '{}': {reason}", path.display())]
    Load {
        /// File that failed to load
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data that a stage cannot process.
    #[error("Invalid data: {0}")]
    Value(String),

    /// Error bubbled up from polars.
    #[error(transparent)]
    Polars(#[from] PolarsError),

    /// I/O error while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        BenchError::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        BenchError::Config(msg.into())
    }

    pub fn value(msg: impl Into<String>) -> Self {
        BenchError::Value(msg.into())
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, BenchError>;
