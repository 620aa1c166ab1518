use providers::ProviderError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("retrieval returned no neighbors")]
    EmptyResult,

    #[error("retrieval arrays differ in length: {ids} ids, {categories} categories, {distances} distances")]
    LengthMismatch {
        ids: usize,
        categories: usize,
        distances: usize,
    },

    #[error("invalid distance {distance} for neighbor {id}")]
    NegativeDistance { id: String, distance: f64 },

    #[error("could not find document with category {0}")]
    NotFound(String),

    #[error("model called unknown tool {0}")]
    UnknownTool(String),

    #[error("malformed tool call: {0}")]
    MalformedToolCall(String),

    #[error("no ground truth for {0:?}")]
    NoGroundTruth(PathBuf),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
