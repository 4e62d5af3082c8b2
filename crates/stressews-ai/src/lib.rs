//! Inference layer: the serialized preprocessing + logistic-regression
//! pipeline and the prediction service built on top of it.

mod error;
mod math;
pub mod pipeline;
pub mod service;

pub use error::{ModelLoadError, PipelineError, PredictError};
pub use pipeline::{InferencePipeline, LogisticRegression, Pipeline, PipelineArtifact, TransformStep};
pub use service::Predictor;
