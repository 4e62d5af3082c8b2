//! Risk labels and the prediction result handed back to the front-ends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Predicted academic-stress category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLabel {
    Low,
    Medium,
    High,
}

/// Class index → label for three-class models.
static THREE_CLASS: [RiskLabel; 3] = [RiskLabel::Low, RiskLabel::Medium, RiskLabel::High];

/// Class index → label for binary low/high stress models.
static TWO_CLASS: [RiskLabel; 2] = [RiskLabel::Low, RiskLabel::High];

impl RiskLabel {
    pub const ALL: [RiskLabel; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    /// The fixed index → label table for a model with `n_classes` outputs.
    ///
    /// Only binary and three-class models are supported.
    pub fn table(n_classes: usize) -> Option<&'static [RiskLabel]> {
        match n_classes {
            2 => Some(&TWO_CLASS[..]),
            3 => Some(&THREE_CLASS[..]),
            _ => None,
        }
    }

    pub fn from_class_index(index: usize, n_classes: usize) -> Option<Self> {
        Self::table(n_classes)?.get(index).copied()
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRiskLabelError(String);

impl fmt::Display for ParseRiskLabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown risk label: {:?}", self.0)
    }
}

impl std::error::Error for ParseRiskLabelError {}

impl FromStr for RiskLabel {
    type Err = ParseRiskLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseRiskLabelError(s.to_string())),
        }
    }
}

/// Probability assigned to one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: RiskLabel,
    pub probability: f64,
}

/// Outcome of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: RiskLabel,
    /// Probability of the predicted class, in [0, 1].
    pub confidence: f64,
    pub class_index: usize,
    /// Full distribution, in class index order.
    pub probabilities: Vec<ClassProbability>,
}

impl PredictionResult {
    /// Build a result from per-class probabilities by taking the argmax.
    ///
    /// Ties go to the lower class index. Returns `None` when the class count
    /// has no label table.
    pub fn from_probabilities(probabilities: &[f64]) -> Option<Self> {
        let table = RiskLabel::table(probabilities.len())?;
        let (class_index, confidence) = probabilities.iter().copied().enumerate().fold(
            (0, f64::NEG_INFINITY),
            |best, (i, p)| if p > best.1 { (i, p) } else { best },
        );
        Some(Self {
            label: table[class_index],
            confidence,
            class_index,
            probabilities: table
                .iter()
                .zip(probabilities)
                .map(|(&label, &probability)| ClassProbability { label, probability })
                .collect(),
        })
    }

    pub fn probability_of(&self, label: RiskLabel) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|p| p.label == label)
            .map(|p| p.probability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_tables() {
        assert_eq!(RiskLabel::from_class_index(0, 3), Some(RiskLabel::Low));
        assert_eq!(RiskLabel::from_class_index(1, 3), Some(RiskLabel::Medium));
        assert_eq!(RiskLabel::from_class_index(2, 3), Some(RiskLabel::High));
        assert_eq!(RiskLabel::from_class_index(1, 2), Some(RiskLabel::High));
        assert_eq!(RiskLabel::from_class_index(3, 3), None);
        assert!(RiskLabel::table(4).is_none());
    }

    #[test]
    fn parse_labels() {
        assert_eq!("high".parse::<RiskLabel>(), Ok(RiskLabel::High));
        assert_eq!(" Medium ".parse::<RiskLabel>(), Ok(RiskLabel::Medium));
        assert!("severe".parse::<RiskLabel>().is_err());
    }

    #[test]
    fn argmax_picks_highest() {
        let r = PredictionResult::from_probabilities(&[0.2, 0.1, 0.7]).unwrap();
        assert_eq!(r.label, RiskLabel::High);
        assert_eq!(r.class_index, 2);
        assert!((r.confidence - 0.7).abs() < 1e-12);
        assert_eq!(r.probability_of(RiskLabel::Low), Some(0.2));
    }

    #[test]
    fn argmax_binary() {
        let r = PredictionResult::from_probabilities(&[0.9, 0.1]).unwrap();
        assert_eq!(r.label, RiskLabel::Low);
        assert_eq!(r.probability_of(RiskLabel::Medium), None);
    }

    #[test]
    fn ties_go_to_lower_index() {
        let r = PredictionResult::from_probabilities(&[0.5, 0.5]).unwrap();
        assert_eq!(r.label, RiskLabel::Low);
    }

    #[test]
    fn unsupported_class_count() {
        assert!(PredictionResult::from_probabilities(&[1.0]).is_none());
    }
}
