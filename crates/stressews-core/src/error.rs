use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Failure to build the feature schema from the feature names file.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("feature names file not found: {0}")]
    NotFound(PathBuf),

    #[error("reading feature names file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing feature names file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("expected {expected} feature names, found {found}")]
    Count { expected: usize, found: usize },

    #[error("unknown feature name: {0}")]
    UnknownFeature(String),

    #[error("feature listed more than once: {0}")]
    DuplicateFeature(String),
}

/// What is wrong with a single input field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "problem", rename_all = "snake_case")]
pub enum Problem {
    Missing,
    Unexpected,
    Duplicate,
    NotANumber { value: String },
    NotFinite,
    OutOfRange { value: f64, min: f64, max: f64 },
    UnknownCode { value: f64 },
    UnknownCategory { value: String },
    ExpectedCategory,
    /// The value is neither a number nor a string (JSON `null`, `true`, ...).
    WrongType { found: String },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Unexpected => write!(f, "not a known feature"),
            Self::Duplicate => write!(f, "given more than once"),
            Self::NotANumber { value } => write!(f, "{value:?} is not a number"),
            Self::NotFinite => write!(f, "must be a finite number"),
            Self::OutOfRange { value, min, max } => {
                write!(f, "{value} is outside {min}..={max}")
            }
            Self::UnknownCode { value } => write!(f, "{value} is not one of the allowed options"),
            Self::UnknownCategory { value } => write!(f, "unknown category {value:?}"),
            Self::ExpectedCategory => write!(f, "expected a category, got a number"),
            Self::WrongType { found } => write!(f, "expected a number or a string, got {found}"),
        }
    }
}

/// A problem attached to the field that caused it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    #[serde(flatten)]
    pub problem: Problem,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, problem: Problem) -> Self {
        Self {
            field: field.into(),
            problem,
        }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Input rejected by the feature schema. Always carries at least one issue.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid input: {}", join_issues(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    /// Names of the offending fields, in the order they were found.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(|i| i.field.as_str())
    }

    /// First issue reported for `field`, if any.
    pub fn issue_for(&self, field: &str) -> Option<&FieldIssue> {
        self.issues.iter().find(|i| i.field == field)
    }
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
