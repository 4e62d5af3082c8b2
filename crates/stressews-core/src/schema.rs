//! Feature schema: the 32 student-survey features the pipeline consumes.
//!
//! The schema is the single source of truth for both front-ends and the
//! prediction service. Field kinds and bounds follow the survey's answer
//! sheets: free numeric entries (age, absences, grades), integer-coded answers
//! picked from a fixed option list, and string categories that the pipeline
//! one-hot encodes.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema};
use serde::Serialize;
use tracing::info;

use crate::error::{FieldIssue, Problem, SchemaError, ValidationError};
use crate::features::{FeatureValue, FeatureVector, ValidatedFeatures};

/// Number of features the pipeline expects.
pub const FEATURE_COUNT: usize = 32;

/// An integer-coded answer and the text shown for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodedOption {
    pub label: &'static str,
    pub code: i64,
}

/// A string category and the text shown for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Category {
    pub label: &'static str,
    pub value: &'static str,
}

/// Expected type and bounds of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    /// Free numeric entry within an inclusive range.
    Numeric { min: f64, max: f64, default: f64 },
    /// Integer code picked from a fixed option list.
    Coded { options: &'static [CodedOption] },
    /// String category consumed by the pipeline's one-hot encoder.
    Categorical { categories: &'static [Category] },
}

impl FeatureKind {
    /// Inclusive bounds for kinds that are fed to the pipeline as numbers.
    pub fn numeric_bounds(&self) -> Option<(f64, f64)> {
        match self {
            Self::Numeric { min, max, .. } => Some((*min, *max)),
            Self::Coded { options } => {
                let min = options.iter().map(|o| o.code).min()?;
                let max = options.iter().map(|o| o.code).max()?;
                Some((min as f64, max as f64))
            }
            Self::Categorical { .. } => None,
        }
    }

    /// Category values, for categorical kinds.
    pub fn category_values(&self) -> Option<Vec<&'static str>> {
        match self {
            Self::Categorical { categories } => Some(categories.iter().map(|c| c.value).collect()),
            _ => None,
        }
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::Categorical { .. })
    }
}

/// One named feature with its display label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub kind: FeatureKind,
}

impl FeatureSpec {
    /// Value a blank form starts with: the configured default for numeric
    /// entries, the first option otherwise.
    pub fn default_value(&self) -> FeatureValue {
        match self.kind {
            FeatureKind::Numeric { default, .. } => FeatureValue::Number(default),
            FeatureKind::Coded { options } => {
                FeatureValue::Number(options.first().map_or(0, |o| o.code) as f64)
            }
            FeatureKind::Categorical { categories } => {
                FeatureValue::Category(categories.first().map_or("", |c| c.value).to_string())
            }
        }
    }

    /// Parse a raw text entry (form field, CLI argument, CSV cell).
    ///
    /// Coded and categorical fields also accept their display label. Range and
    /// category membership are checked later by [`FeatureSchema::validate`].
    pub fn parse(&self, raw: &str) -> Result<FeatureValue, FieldIssue> {
        let raw = raw.trim();
        match self.kind {
            FeatureKind::Numeric { .. } => raw
                .parse::<f64>()
                .map(FeatureValue::Number)
                .map_err(|_| self.issue(Problem::NotANumber { value: raw.into() })),
            FeatureKind::Coded { options } => {
                if let Ok(v) = raw.parse::<f64>() {
                    return Ok(FeatureValue::Number(v));
                }
                options
                    .iter()
                    .find(|o| o.label.eq_ignore_ascii_case(raw))
                    .map(|o| FeatureValue::Number(o.code as f64))
                    .ok_or_else(|| self.issue(Problem::NotANumber { value: raw.into() }))
            }
            FeatureKind::Categorical { categories } => {
                let value = categories
                    .iter()
                    .find(|c| c.label == raw)
                    .map_or(raw, |c| c.value);
                Ok(FeatureValue::Category(value.to_string()))
            }
        }
    }

    /// Check one value against this feature's kind, normalising numeric
    /// strings to numbers.
    pub fn check(&self, value: &FeatureValue) -> Result<FeatureValue, FieldIssue> {
        match self.kind {
            FeatureKind::Numeric { min, max, .. } => {
                let v = self.as_number(value)?;
                if !(min..=max).contains(&v) {
                    return Err(self.issue(Problem::OutOfRange { value: v, min, max }));
                }
                Ok(FeatureValue::Number(v))
            }
            FeatureKind::Coded { options } => {
                let v = self.as_number(value)?;
                if !options.iter().any(|o| o.code as f64 == v) {
                    return Err(self.issue(Problem::UnknownCode { value: v }));
                }
                Ok(FeatureValue::Number(v))
            }
            FeatureKind::Categorical { categories } => match value {
                FeatureValue::Category(s) if categories.iter().any(|c| c.value == s.as_str()) => {
                    Ok(value.clone())
                }
                FeatureValue::Category(s) => {
                    Err(self.issue(Problem::UnknownCategory { value: s.clone() }))
                }
                FeatureValue::Number(_) => Err(self.issue(Problem::ExpectedCategory)),
            },
        }
    }

    fn as_number(&self, value: &FeatureValue) -> Result<f64, FieldIssue> {
        let v = match value {
            FeatureValue::Number(v) => *v,
            FeatureValue::Category(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.issue(Problem::NotANumber { value: s.clone() }))?,
        };
        if !v.is_finite() {
            return Err(self.issue(Problem::NotFinite));
        }
        Ok(v)
    }

    fn issue(&self, problem: Problem) -> FieldIssue {
        FieldIssue::new(self.name, problem)
    }
}

/// Immutable, ordered feature schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    features: Arc<[FeatureSpec]>,
}

impl Serialize for FeatureSchema {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.features.iter())
    }
}

impl FeatureSchema {
    /// The built-in 32-feature student schema in its canonical order.
    pub fn student() -> Self {
        Self {
            features: STUDENT_FEATURES.iter().copied().collect(),
        }
    }

    /// Build the schema in the order given by a feature names file
    /// (a JSON array of 32 strings).
    ///
    /// The file must name every built-in feature exactly once.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        if !path.exists() {
            return Err(SchemaError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let names: Vec<String> =
            serde_json::from_str(&text).map_err(|source| SchemaError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let schema = Self::from_names(&names)?;
        info!(count = schema.len(), path = %path.display(), "loaded feature schema");
        Ok(schema)
    }

    /// Order the built-in feature specs by `names`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, SchemaError> {
        if names.len() != FEATURE_COUNT {
            return Err(SchemaError::Count {
                expected: FEATURE_COUNT,
                found: names.len(),
            });
        }

        let mut seen = HashSet::with_capacity(names.len());
        let mut features = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            let spec = STUDENT_FEATURES
                .iter()
                .find(|f| f.name == name)
                .ok_or_else(|| SchemaError::UnknownFeature(name.to_string()))?;
            if !seen.insert(name) {
                return Err(SchemaError::DuplicateFeature(name.to_string()));
            }
            features.push(*spec);
        }

        Ok(Self {
            features: features.into(),
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureSpec> {
        self.features.iter()
    }

    /// Feature names in schema order.
    pub fn names(&self) -> Vec<&'static str> {
        self.features.iter().map(|f| f.name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureSpec> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    /// Parse a raw text entry for the named feature.
    pub fn parse_value(&self, name: &str, raw: &str) -> Result<FeatureValue, FieldIssue> {
        self.get(name)
            .ok_or_else(|| FieldIssue::new(name, Problem::Unexpected))?
            .parse(raw)
    }

    /// A vector holding every feature's default value.
    pub fn default_vector(&self) -> FeatureVector {
        self.features
            .iter()
            .map(|f| (f.name.to_string(), f.default_value()))
            .collect()
    }

    /// Validate `input` and return its values in schema order.
    ///
    /// Collects every problem before failing so a form can flag all bad
    /// fields at once.
    pub fn validate(&self, input: &FeatureVector) -> Result<ValidatedFeatures, ValidationError> {
        let mut slots: Vec<Option<FeatureValue>> = vec![None; self.features.len()];
        let mut issues = Vec::new();

        for (name, value) in input.iter() {
            let Some(idx) = self.index_of(name) else {
                issues.push(FieldIssue::new(name, Problem::Unexpected));
                continue;
            };
            if slots[idx].is_some() {
                issues.push(FieldIssue::new(name, Problem::Duplicate));
                continue;
            }
            match self.features[idx].check(value) {
                Ok(v) => slots[idx] = Some(v),
                Err(issue) => {
                    // Mark the slot as seen so it is not also reported missing.
                    slots[idx] = Some(value.clone());
                    issues.push(issue);
                }
            }
        }

        for (spec, slot) in self.features.iter().zip(&slots) {
            if slot.is_none() {
                issues.push(FieldIssue::new(spec.name, Problem::Missing));
            }
        }

        if !issues.is_empty() {
            return Err(ValidationError { issues });
        }

        Ok(ValidatedFeatures::new(slots.into_iter().flatten().collect()))
    }

    /// Validated values keyed by feature name, in schema order.
    pub fn named(&self, validated: &ValidatedFeatures) -> FeatureVector {
        self.features
            .iter()
            .zip(validated.values())
            .map(|(f, v)| (f.name.to_string(), v.clone()))
            .collect()
    }

    /// Arrow schema of tabular files holding these features as columns.
    ///
    /// Numeric and coded features are `Float64`, categorical ones `Utf8`.
    pub fn arrow_schema(&self) -> Schema {
        Schema::new(
            self.features
                .iter()
                .map(|f| {
                    let dt = if f.kind.is_categorical() {
                        DataType::Utf8
                    } else {
                        DataType::Float64
                    };
                    Field::new(f.name, dt, false)
                })
                .collect::<Vec<_>>(),
        )
    }
}

// ── Built-in feature table ──

const fn opt(label: &'static str, code: i64) -> CodedOption {
    CodedOption { label, code }
}

const fn cat(label: &'static str, value: &'static str) -> Category {
    Category { label, value }
}

const fn numeric(min: f64, max: f64, default: f64) -> FeatureKind {
    FeatureKind::Numeric { min, max, default }
}

const fn coded(options: &'static [CodedOption]) -> FeatureKind {
    FeatureKind::Coded { options }
}

const fn categorical(categories: &'static [Category]) -> FeatureKind {
    FeatureKind::Categorical { categories }
}

const fn spec(name: &'static str, label: &'static str, kind: FeatureKind) -> FeatureSpec {
    FeatureSpec { name, label, kind }
}

const EDUCATION: &[CodedOption] = &[
    opt("0 - None", 0),
    opt("1 - Primary", 1),
    opt("2 - 5th–9th", 2),
    opt("3 - Secondary", 3),
    opt("4 - Higher", 4),
];

const TRAVEL_TIME: &[CodedOption] = &[
    opt("1 - <15 min", 1),
    opt("2 - 15–30 min", 2),
    opt("3 - 30–60 min", 3),
    opt("4 - >60 min", 4),
];

const STUDY_TIME: &[CodedOption] = &[
    opt("1 - <2 hrs", 1),
    opt("2 - 2–5 hrs", 2),
    opt("3 - 5–10 hrs", 3),
    opt("4 - >10 hrs", 4),
];

const FAILURES: &[CodedOption] = &[opt("0", 0), opt("1", 1), opt("2", 2), opt("3", 3)];

const YES_NO: &[CodedOption] = &[opt("yes", 1), opt("no", 0)];

const RATING: &[CodedOption] = &[opt("1", 1), opt("2", 2), opt("3", 3), opt("4", 4), opt("5", 5)];

const SCHOOLS: &[Category] = &[cat("GP", "GP"), cat("MS", "MS")];

const SEXES: &[Category] = &[cat("F", "F"), cat("M", "M")];

const ADDRESSES: &[Category] = &[cat("U (urban)", "U"), cat("R (rural)", "R")];

const FAMILY_SIZES: &[Category] = &[cat("GT3 (>=3)", "GT3"), cat("LE3 (<3)", "LE3")];

const COHABITATION: &[Category] = &[cat("T (together)", "T"), cat("A (apart)", "A")];

const REASONS: &[Category] = &[
    cat("home", "home"),
    cat("reputation", "reputation"),
    cat("course", "course"),
    cat("other", "other"),
];

const GUARDIANS: &[Category] = &[
    cat("mother", "mother"),
    cat("father", "father"),
    cat("other", "other"),
];

const JOBS: &[Category] = &[
    cat("teacher", "teacher"),
    cat("health", "health"),
    cat("services", "services"),
    cat("at_home", "at_home"),
    cat("other", "other"),
];

static STUDENT_FEATURES: [FeatureSpec; FEATURE_COUNT] = [
    spec("school", "School", categorical(SCHOOLS)),
    spec("sex", "Sex", categorical(SEXES)),
    spec("age", "Age (years)", numeric(10.0, 30.0, 17.0)),
    spec("address", "Address", categorical(ADDRESSES)),
    spec("famsize", "Family size", categorical(FAMILY_SIZES)),
    spec("Pstatus", "Parent cohabitation", categorical(COHABITATION)),
    spec("Medu", "Mother's education", coded(EDUCATION)),
    spec("Fedu", "Father's education", coded(EDUCATION)),
    spec("Mjob", "Mother's job", categorical(JOBS)),
    spec("Fjob", "Father's job", categorical(JOBS)),
    spec("reason", "Reason for school choice", categorical(REASONS)),
    spec("guardian", "Guardian", categorical(GUARDIANS)),
    spec("traveltime", "Travel time", coded(TRAVEL_TIME)),
    spec("studytime", "Weekly study time", coded(STUDY_TIME)),
    spec("failures", "Past failures", coded(FAILURES)),
    spec("schoolsup", "School support", coded(YES_NO)),
    spec("famsup", "Family support", coded(YES_NO)),
    spec("paid", "Extra paid classes", coded(YES_NO)),
    spec("activities", "Activities", coded(YES_NO)),
    spec("nursery", "Attended nursery", coded(YES_NO)),
    spec("higher", "Wants higher education", coded(YES_NO)),
    spec("internet", "Internet at home", coded(YES_NO)),
    spec("romantic", "In a romantic relationship", coded(YES_NO)),
    spec("famrel", "Family relationship (1=bad, 5=excellent)", coded(RATING)),
    spec("freetime", "Free time (1-5)", coded(RATING)),
    spec("goout", "Going out with friends (1-5)", coded(RATING)),
    spec("Dalc", "Workday alcohol (1-5)", coded(RATING)),
    spec("Walc", "Weekend alcohol (1-5)", coded(RATING)),
    spec("health", "Health (1-5)", coded(RATING)),
    spec("absences", "Absences (0-93)", numeric(0.0, 93.0, 0.0)),
    spec("G1", "Grade G1 (0-20)", numeric(0.0, 20.0, 10.0)),
    spec("G2", "Grade G2 (0-20)", numeric(0.0, 20.0, 10.0)),
];
