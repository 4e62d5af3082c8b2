//! Prediction service: validate a feature vector, run the pipeline, map the
//! argmax class index onto a risk label.
//!
//! A `Predictor` is built once at startup and shared read-only by every
//! request; loading fails fast when the artifacts disagree with each other.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use stressews_core::{
    ArtifactPaths, FeatureSchema, FeatureValue, FeatureVector, PredictionResult, RiskLabel,
    ValidatedFeatures,
};
use tracing::debug;

use crate::error::{ModelLoadError, PipelineError, PredictError};
use crate::pipeline::{InferencePipeline, Pipeline};

pub struct Predictor<P: InferencePipeline = Pipeline> {
    schema: FeatureSchema,
    pipeline: Arc<P>,
    /// For each pipeline input column, the schema index feeding it.
    column_map: Vec<usize>,
}

impl<P: InferencePipeline> Clone for Predictor<P> {
    fn clone(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            pipeline: Arc::clone(&self.pipeline),
            column_map: self.column_map.clone(),
        }
    }
}

impl<P: InferencePipeline> fmt::Debug for Predictor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predictor")
            .field("model_id", &self.pipeline.model_id())
            .field("features", &self.schema.len())
            .field("classes", &self.pipeline.n_classes())
            .finish()
    }
}

impl Predictor<Pipeline> {
    /// Load the feature names file and pipeline artifact and cross-check them.
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ModelLoadError> {
        let schema = FeatureSchema::load(&paths.features)?;
        let pipeline = Pipeline::load(&paths.model)?;
        Self::new(schema, Arc::new(pipeline))
    }
}

impl<P: InferencePipeline> Predictor<P> {
    /// Pair a schema with a pipeline.
    ///
    /// The pipeline must consume exactly the schema's features, one-hot encode
    /// exactly its categorical ones with the same category set, and have a
    /// class count with a label table.
    pub fn new(schema: FeatureSchema, pipeline: Arc<P>) -> Result<Self, ModelLoadError> {
        let inputs = pipeline.input_columns();
        if inputs.len() != schema.len() {
            return Err(ModelLoadError::SchemaMismatch(format!(
                "pipeline takes {} columns, schema has {} features",
                inputs.len(),
                schema.len()
            )));
        }

        let mut column_map = Vec::with_capacity(inputs.len());
        for column in inputs {
            let idx = schema.index_of(column).ok_or_else(|| {
                ModelLoadError::SchemaMismatch(format!("pipeline column {column} is not in the schema"))
            })?;
            column_map.push(idx);

            let spec = schema.iter().nth(idx).copied().ok_or_else(|| {
                ModelLoadError::SchemaMismatch(format!("schema index {idx} out of range"))
            })?;
            match (spec.kind.category_values(), pipeline.categories(column)) {
                (Some(expected), Some(found)) => {
                    let expected: HashSet<&str> = expected.into_iter().collect();
                    let found: HashSet<&str> = found.iter().map(String::as_str).collect();
                    if expected != found {
                        let mut expected: Vec<_> = expected.into_iter().collect();
                        let mut found: Vec<_> = found.into_iter().collect();
                        expected.sort_unstable();
                        found.sort_unstable();
                        return Err(ModelLoadError::SchemaMismatch(format!(
                            "column {column}: schema categories {expected:?}, pipeline categories {found:?}"
                        )));
                    }
                }
                (None, None) => {}
                (Some(_), None) => {
                    return Err(ModelLoadError::SchemaMismatch(format!(
                        "column {column} is categorical but the pipeline treats it as numeric"
                    )));
                }
                (None, Some(_)) => {
                    return Err(ModelLoadError::SchemaMismatch(format!(
                        "column {column} is numeric but the pipeline one-hot encodes it"
                    )));
                }
            }
        }

        if RiskLabel::table(pipeline.n_classes()).is_none() {
            return Err(ModelLoadError::SchemaMismatch(format!(
                "no risk label table for {} classes",
                pipeline.n_classes()
            )));
        }

        Ok(Self {
            schema,
            pipeline,
            column_map,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn model_id(&self) -> &str {
        self.pipeline.model_id()
    }

    pub fn n_classes(&self) -> usize {
        self.pipeline.n_classes()
    }

    /// Predict the risk label for one student.
    ///
    /// Invalid input is rejected before the pipeline runs.
    pub fn predict(&self, input: &FeatureVector) -> Result<PredictionResult, PredictError> {
        let validated = self.schema.validate(input)?;
        self.predict_validated(&validated)
    }

    /// Predict from values already validated against [`Self::schema`].
    pub fn predict_validated(&self, validated: &ValidatedFeatures) -> Result<PredictionResult, PredictError> {
        let values = validated.values();
        if values.len() != self.schema.len() {
            return Err(PipelineError::Width {
                expected: self.schema.len(),
                found: values.len(),
            }
            .into());
        }
        let row: Vec<FeatureValue> = self
            .column_map
            .iter()
            .map(|&idx| values[idx].clone())
            .collect();

        let proba = self.pipeline.predict_proba(&row)?;
        let result = PredictionResult::from_probabilities(&proba).ok_or(PipelineError::Width {
            expected: self.pipeline.n_classes(),
            found: proba.len(),
        })?;
        debug!(
            model_id = self.pipeline.model_id(),
            label = %result.label,
            confidence = result.confidence,
            "prediction"
        );
        Ok(result)
    }

    /// Predict each input independently.
    pub fn predict_batch<'a, I>(&self, inputs: I) -> Vec<Result<PredictionResult, PredictError>>
    where
        I: IntoIterator<Item = &'a FeatureVector>,
    {
        inputs.into_iter().map(|input| self.predict(input)).collect()
    }
}
