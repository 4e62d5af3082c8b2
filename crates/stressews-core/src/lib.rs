pub mod config;
pub mod error;
pub mod features;
pub mod risk;
pub mod schema;

pub use config::ArtifactPaths;
pub use error::{FieldIssue, Problem, SchemaError, ValidationError};
pub use features::{FeatureValue, FeatureVector, StudentProfile, ValidatedFeatures};
pub use risk::{ClassProbability, PredictionResult, RiskLabel};
pub use schema::{FEATURE_COUNT, FeatureKind, FeatureSchema, FeatureSpec};
