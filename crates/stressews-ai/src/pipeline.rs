//! Serialized preprocessing + logistic-regression pipeline.
//!
//! The artifact is a JSON export of a fitted column transformer followed by a
//! logistic-regression classifier:
//!
//! ```text
//! input row ─┬─ standard_scaler  (x - mean) / scale ─┐
//!            ├─ one_hot_encoder  one 0/1 per category ┼─→ x ─→ W·x + b ─→ sigmoid | softmax
//!            └─ passthrough      x                    ┘
//! ```
//!
//! Transformer outputs are concatenated in step order, columns within a step
//! in the order the step lists them. Unknown categories are an error, never
//! silently encoded as all zeros.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use stressews_core::{FeatureValue, RiskLabel};
use tracing::info;

use crate::error::{ModelLoadError, PipelineError};
use crate::math::{dot, sigmoid, softmax};

/// Artifact format understood by this build.
pub const FORMAT_VERSION: u32 = 1;

/// The inference pipeline as seen by the prediction service.
pub trait InferencePipeline: Send + Sync {
    fn model_id(&self) -> &str;

    /// Input column names, in the order `predict_proba` expects them.
    fn input_columns(&self) -> &[String];

    /// Known categories of a one-hot encoded column; `None` for numeric columns.
    fn categories(&self, column: &str) -> Option<&[String]>;

    fn n_classes(&self) -> usize;

    /// Per-class probabilities for one row, in class index order.
    fn predict_proba(&self, row: &[FeatureValue]) -> Result<Vec<f64>, PipelineError>;
}

/// On-disk pipeline artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    pub format_version: u32,
    pub model_id: String,
    pub input_columns: Vec<String>,
    pub preprocessor: Vec<TransformStep>,
    #[serde(rename = "logistic_regression")]
    pub classifier: LogisticRegression,
}

impl PipelineArtifact {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// One column-transformer step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TransformStep {
    StandardScaler {
        columns: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    },
    OneHotEncoder {
        columns: Vec<String>,
        categories: Vec<Vec<String>>,
    },
    Passthrough {
        columns: Vec<String>,
    },
}

impl TransformStep {
    fn columns(&self) -> &[String] {
        match self {
            Self::StandardScaler { columns, .. }
            | Self::OneHotEncoder { columns, .. }
            | Self::Passthrough { columns } => columns,
        }
    }
}

/// Fitted logistic-regression parameters.
///
/// Binary models carry one coefficient row (the positive class); multinomial
/// models carry one row per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub classes: Vec<i64>,
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LogisticRegression {
    fn is_binary(&self) -> bool {
        self.classes.len() == 2 && self.coef.len() == 1
    }
}

/// A compiled per-column operation, indexed into the input row.
#[derive(Debug, Clone)]
enum ColumnOp {
    Scale { input: usize, mean: f64, scale: f64 },
    OneHot { input: usize, categories: Vec<String> },
    Pass { input: usize },
}

/// Validated, ready-to-run pipeline. Immutable after load.
#[derive(Debug, Clone)]
pub struct Pipeline {
    artifact: PipelineArtifact,
    ops: Vec<ColumnOp>,
    width: usize,
}

impl Pipeline {
    /// Load and validate a pipeline artifact from disk.
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        if !path.exists() {
            return Err(ModelLoadError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: PipelineArtifact =
            serde_json::from_str(&text).map_err(|source| ModelLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let pipeline = Self::from_artifact(artifact)?;
        info!(
            model_id = %pipeline.artifact.model_id,
            inputs = pipeline.artifact.input_columns.len(),
            width = pipeline.width,
            classes = pipeline.n_classes(),
            path = %path.display(),
            "loaded inference pipeline"
        );
        Ok(pipeline)
    }

    /// Validate an artifact and compile its column operations.
    pub fn from_artifact(artifact: PipelineArtifact) -> Result<Self, ModelLoadError> {
        if artifact.format_version != FORMAT_VERSION {
            return Err(ModelLoadError::UnsupportedVersion(artifact.format_version));
        }
        if artifact.input_columns.is_empty() {
            return Err(invalid("no input columns"));
        }

        let mut unique = HashSet::new();
        for col in &artifact.input_columns {
            if !unique.insert(col.as_str()) {
                return Err(invalid(format!("input column {col} listed twice")));
            }
        }

        let ops = compile_steps(&artifact)?;
        let width = ops
            .iter()
            .map(|op| match op {
                ColumnOp::OneHot { categories, .. } => categories.len(),
                _ => 1,
            })
            .sum();

        check_classifier(&artifact.classifier, width)?;

        Ok(Self {
            artifact,
            ops,
            width,
        })
    }

    pub fn artifact(&self) -> &PipelineArtifact {
        &self.artifact
    }

    /// Number of transformed features the classifier consumes.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Apply the column transformer to one row in input column order.
    pub fn transform(&self, row: &[FeatureValue]) -> Result<Vec<f64>, PipelineError> {
        let expected = self.artifact.input_columns.len();
        if row.len() != expected {
            return Err(PipelineError::Width {
                expected,
                found: row.len(),
            });
        }

        let mut x = Vec::with_capacity(self.width);
        for op in &self.ops {
            match op {
                ColumnOp::Scale { input, mean, scale } => {
                    x.push((self.number(row, *input)? - mean) / scale);
                }
                ColumnOp::Pass { input } => x.push(self.number(row, *input)?),
                ColumnOp::OneHot { input, categories } => {
                    let column = &self.artifact.input_columns[*input];
                    let value = row[*input].as_category().ok_or_else(|| {
                        PipelineError::ExpectedCategory {
                            column: column.clone(),
                        }
                    })?;
                    let hot = categories.iter().position(|c| c == value).ok_or_else(|| {
                        PipelineError::UnknownCategory {
                            column: column.clone(),
                            value: value.to_string(),
                        }
                    })?;
                    x.extend((0..categories.len()).map(|i| if i == hot { 1.0 } else { 0.0 }));
                }
            }
        }
        Ok(x)
    }

    /// Index of the most probable class. Ties go to the lower index.
    pub fn predict(&self, row: &[FeatureValue]) -> Result<usize, PipelineError> {
        let proba = self.predict_proba(row)?;
        let mut best = 0;
        for (i, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = i;
            }
        }
        Ok(best)
    }

    fn number(&self, row: &[FeatureValue], input: usize) -> Result<f64, PipelineError> {
        row[input]
            .as_f64()
            .ok_or_else(|| PipelineError::ExpectedNumber {
                column: self.artifact.input_columns[input].clone(),
            })
    }
}

impl InferencePipeline for Pipeline {
    fn model_id(&self) -> &str {
        &self.artifact.model_id
    }

    fn input_columns(&self) -> &[String] {
        &self.artifact.input_columns
    }

    fn categories(&self, column: &str) -> Option<&[String]> {
        self.ops.iter().find_map(|op| match op {
            ColumnOp::OneHot { input, categories }
                if self.artifact.input_columns[*input] == column =>
            {
                Some(categories.as_slice())
            }
            _ => None,
        })
    }

    fn n_classes(&self) -> usize {
        self.artifact.classifier.classes.len()
    }

    fn predict_proba(&self, row: &[FeatureValue]) -> Result<Vec<f64>, PipelineError> {
        let x = self.transform(row)?;
        let clf = &self.artifact.classifier;
        let logits: Vec<f64> = clf
            .coef
            .iter()
            .zip(&clf.intercept)
            .map(|(w, b)| dot(w, &x) + b)
            .collect();

        if clf.is_binary() {
            let p = sigmoid(logits[0]);
            Ok(vec![1.0 - p, p])
        } else {
            Ok(softmax(&logits))
        }
    }
}

// ── Validation ──

fn invalid(msg: impl Into<String>) -> ModelLoadError {
    ModelLoadError::Invalid(msg.into())
}

fn compile_steps(artifact: &PipelineArtifact) -> Result<Vec<ColumnOp>, ModelLoadError> {
    let inputs = &artifact.input_columns;
    let mut covered = vec![false; inputs.len()];
    let mut ops = Vec::with_capacity(inputs.len());

    for step in &artifact.preprocessor {
        let mut indices = Vec::with_capacity(step.columns().len());
        for col in step.columns() {
            let idx = inputs
                .iter()
                .position(|c| c == col)
                .ok_or_else(|| invalid(format!("step column {col} is not an input column")))?;
            if covered[idx] {
                return Err(invalid(format!("column {col} is transformed twice")));
            }
            covered[idx] = true;
            indices.push(idx);
        }

        match step {
            TransformStep::StandardScaler {
                columns,
                mean,
                scale,
            } => {
                if mean.len() != columns.len() || scale.len() != columns.len() {
                    return Err(invalid(format!(
                        "standard_scaler has {} columns but {} means and {} scales",
                        columns.len(),
                        mean.len(),
                        scale.len()
                    )));
                }
                for ((col, &m), &s) in columns.iter().zip(mean).zip(scale) {
                    if !m.is_finite() || !s.is_finite() || s == 0.0 {
                        return Err(invalid(format!(
                            "column {col}: scaler needs finite mean and non-zero scale"
                        )));
                    }
                }
                ops.extend(
                    indices
                        .iter()
                        .zip(mean.iter().zip(scale))
                        .map(|(&input, (&mean, &scale))| ColumnOp::Scale { input, mean, scale }),
                );
            }
            TransformStep::OneHotEncoder {
                columns,
                categories,
            } => {
                if categories.len() != columns.len() {
                    return Err(invalid(format!(
                        "one_hot_encoder has {} columns but {} category lists",
                        columns.len(),
                        categories.len()
                    )));
                }
                for (col, cats) in columns.iter().zip(categories) {
                    let distinct: HashSet<&String> = cats.iter().collect();
                    if cats.is_empty() || distinct.len() != cats.len() {
                        return Err(invalid(format!(
                            "column {col}: categories must be non-empty and distinct"
                        )));
                    }
                }
                ops.extend(
                    indices
                        .iter()
                        .zip(categories)
                        .map(|(&input, cats)| ColumnOp::OneHot {
                            input,
                            categories: cats.clone(),
                        }),
                );
            }
            TransformStep::Passthrough { .. } => {
                ops.extend(indices.iter().map(|&input| ColumnOp::Pass { input }));
            }
        }
    }

    if let Some(idx) = covered.iter().position(|c| !c) {
        return Err(invalid(format!(
            "input column {} is not used by any step",
            inputs[idx]
        )));
    }

    Ok(ops)
}

fn check_classifier(clf: &LogisticRegression, width: usize) -> Result<(), ModelLoadError> {
    let n_classes = clf.classes.len();
    if RiskLabel::table(n_classes).is_none() {
        return Err(invalid(format!(
            "{n_classes} classes; expected 2 (low/high) or 3 (low/medium/high)"
        )));
    }

    let expected_rows = if n_classes == 2 && clf.coef.len() == 1 {
        1
    } else {
        n_classes
    };
    if clf.coef.len() != expected_rows {
        return Err(invalid(format!(
            "{} coefficient rows for {n_classes} classes",
            clf.coef.len()
        )));
    }
    if clf.intercept.len() != expected_rows {
        return Err(invalid(format!(
            "{} intercepts for {expected_rows} coefficient rows",
            clf.intercept.len()
        )));
    }

    for (row, weights) in clf.coef.iter().enumerate() {
        if weights.len() != width {
            return Err(invalid(format!(
                "coefficient row {row} has {} weights, transformer produces {width} features",
                weights.len()
            )));
        }
        if let Some(i) = weights.iter().position(|w| !w.is_finite()) {
            return Err(invalid(format!("coefficient [{row}][{i}] is not finite")));
        }
    }
    if clf.intercept.iter().any(|b| !b.is_finite()) {
        return Err(invalid("intercept is not finite"));
    }

    Ok(())
}
