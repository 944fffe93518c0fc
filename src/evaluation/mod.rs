//! Scoring and comparison of classifiers

pub mod bench;
pub mod cross_validation;
pub mod grid_search;
pub mod metrics;

pub use bench::*;
pub use cross_validation::*;
pub use grid_search::*;
pub use metrics::*;
