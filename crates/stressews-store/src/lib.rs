//! Storage layer: the labelled sample dataset, read through Arrow's CSV reader.

mod dataset;
mod error;

pub use dataset::{ColumnProfile, LABEL_COLUMN, Observed, SampleDataset};
pub use error::StoreError;
