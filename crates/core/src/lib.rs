//! Core library: neighbor voting, model disambiguation, scanning, evaluation.

pub mod classifier;
pub mod config;
pub mod consensus;
pub mod disambiguator;
pub mod error;
pub mod evaluator;
pub mod pipeline;
pub mod retrieval;
pub mod scanner;
pub mod taxonomy;
pub mod vote;
pub mod vulns;
