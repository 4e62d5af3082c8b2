//! Score the prediction service against a labelled dataset.

use std::collections::BTreeMap;

use stressews_ai::Predictor;
use stressews_core::{FeatureVector, RiskLabel};
use tracing::warn;

#[derive(Debug, Default)]
pub struct Evaluation {
    pub total: usize,
    pub failed: usize,
    /// Labels the model can emit, in class index order.
    classes: Vec<RiskLabel>,
    predicted: BTreeMap<RiskLabel, usize>,
    /// (actual, predicted) → count, labelled rows only.
    confusion: BTreeMap<(RiskLabel, RiskLabel), usize>,
}

impl Evaluation {
    pub fn run(predictor: &Predictor, rows: &[(FeatureVector, Option<RiskLabel>)]) -> Self {
        let mut eval = Self {
            classes: RiskLabel::table(predictor.n_classes())
                .map(<[RiskLabel]>::to_vec)
                .unwrap_or_default(),
            ..Self::default()
        };
        for (i, (input, actual)) in rows.iter().enumerate() {
            eval.total += 1;
            match predictor.predict(input) {
                Ok(result) => eval.record(*actual, result.label),
                Err(err) => {
                    warn!(row = i + 1, error = %err, "row could not be scored");
                    eval.failed += 1;
                }
            }
        }
        eval
    }

    fn record(&mut self, actual: Option<RiskLabel>, predicted: RiskLabel) {
        *self.predicted.entry(predicted).or_default() += 1;
        if let Some(actual) = actual {
            *self.confusion.entry((actual, predicted)).or_default() += 1;
        }
    }

    pub fn predicted(&self) -> usize {
        self.predicted.values().sum()
    }

    pub fn predicted_count(&self, label: RiskLabel) -> usize {
        self.predicted.get(&label).copied().unwrap_or(0)
    }

    pub fn labelled(&self) -> usize {
        self.confusion.values().sum()
    }

    pub fn correct(&self) -> usize {
        self.confusion
            .iter()
            .filter(|((a, p), _)| a == p)
            .map(|(_, n)| n)
            .sum()
    }

    pub fn confusion(&self, actual: RiskLabel, predicted: RiskLabel) -> usize {
        self.confusion.get(&(actual, predicted)).copied().unwrap_or(0)
    }

    /// Share of labelled rows predicted correctly.
    pub fn accuracy(&self) -> Option<f64> {
        let labelled = self.labelled();
        (labelled > 0).then(|| self.correct() as f64 / labelled as f64)
    }

    /// Labels to report: the model's classes plus any label seen in the data.
    pub fn labels(&self) -> Vec<RiskLabel> {
        let mut labels = self.classes.clone();
        for &(actual, _) in self.confusion.keys() {
            if !labels.contains(&actual) {
                labels.push(actual);
            }
        }
        labels.sort();
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use stressews_core::ArtifactPaths;
    use stressews_store::SampleDataset;

    fn project_root() -> &'static Path {
        Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../.."))
    }

    #[test]
    fn counts_and_accuracy() {
        let mut eval = Evaluation::default();
        eval.total = 4;
        eval.record(Some(RiskLabel::High), RiskLabel::High);
        eval.record(Some(RiskLabel::Low), RiskLabel::High);
        eval.record(Some(RiskLabel::Low), RiskLabel::Low);
        eval.record(None, RiskLabel::Medium);

        assert_eq!(eval.predicted(), 4);
        assert_eq!(eval.labelled(), 3);
        assert_eq!(eval.correct(), 2);
        assert_eq!(eval.confusion(RiskLabel::Low, RiskLabel::High), 1);
        assert_eq!(eval.predicted_count(RiskLabel::Medium), 1);
        assert!((eval.accuracy().unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn no_labels_no_accuracy() {
        let mut eval = Evaluation::default();
        eval.record(None, RiskLabel::Low);
        assert_eq!(eval.accuracy(), None);
    }

    #[test]
    fn shipped_sample_scores_well() {
        let root = project_root();
        let predictor = Predictor::load(&ArtifactPaths::from_project_root(root)).unwrap();
        let dataset =
            SampleDataset::load(&root.join("data/student_sample.csv"), predictor.schema()).unwrap();
        let rows = dataset.rows().unwrap();

        let eval = Evaluation::run(&predictor, &rows);
        assert_eq!(eval.total, 48);
        assert_eq!(eval.failed, 0);
        assert_eq!(eval.labelled(), 48);
        assert!(eval.accuracy().unwrap() > 0.8);
        assert_eq!(eval.labels(), RiskLabel::ALL.to_vec());
    }
}
