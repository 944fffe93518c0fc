//! Report module - console tables, JSON export and exploratory summaries

pub mod bench_export;
pub mod describe;
pub mod summary;

pub use bench_export::*;
pub use describe::*;
pub use summary::*;
