use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("dataset file not found: {0}")]
    NotFound(PathBuf),

    #[error("reading dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset is empty")]
    Empty,

    #[error("dataset column {0:?} is not a known feature")]
    UnknownColumn(String),

    #[error("dataset is missing feature column {0:?}")]
    MissingColumn(String),

    #[error("row {row}: unknown risk label {value:?}")]
    Label { row: usize, value: String },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{0}")]
    Other(String),
}
