//! CLI module - argument parsing and run configuration

pub mod args;
mod config;

pub use args::{Cli, Commands};
pub use config::{BenchConfig, GridConfig};
