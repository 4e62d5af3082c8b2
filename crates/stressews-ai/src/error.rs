use std::path::PathBuf;

use stressews_core::{SchemaError, ValidationError};
use thiserror::Error;

/// The pipeline artifact or feature names file could not be loaded.
///
/// Fatal at startup: the process must not serve predictions without a
/// valid pipeline.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("reading model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing model artifact {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported artifact format version {0}")]
    UnsupportedVersion(u32),

    #[error("invalid model artifact: {0}")]
    Invalid(String),

    #[error("feature schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("pipeline does not match feature schema: {0}")]
    SchemaMismatch(String),
}

/// A row reached the pipeline in a shape it cannot transform.
///
/// Rows built from validated features never trigger these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("expected {expected} input columns, got {found}")]
    Width { expected: usize, found: usize },

    #[error("column {column}: expected a number")]
    ExpectedNumber { column: String },

    #[error("column {column}: expected a category")]
    ExpectedCategory { column: String },

    #[error("column {column}: unknown category {value:?}")]
    UnknownCategory { column: String, value: String },
}

/// Why a single prediction failed.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    #[error("inference failed: {0}")]
    Inference(#[from] PipelineError),
}
