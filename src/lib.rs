//! respbench: classifier bench for marketing-response data
//!
//! Loads a labelled table, imputes, encodes and rescales it, then compares
//! a roster of binary classifiers by stratified cross-validated ROC-AUC.

pub mod cli;
pub mod evaluation;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod utils;
