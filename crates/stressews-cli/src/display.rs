//! Plain-text rendering for the terminal: schema listing, result card,
//! dataset ranges and evaluation report.
//!
//! Renderers return `String`s; `main` decides where they go.

use std::fmt::Write;

use stressews_core::{FeatureKind, FeatureSchema, FeatureSpec, FeatureVector, PredictionResult};
use stressews_store::{ColumnProfile, Observed};

use crate::evaluate::Evaluation;

const BAR_WIDTH: usize = 30;

// ── Schema section groupings ──

const DEMOGRAPHICS: &[&str] = &["school", "sex", "age", "address"];

const FAMILY: &[&str] = &[
    "famsize", "Pstatus", "Medu", "Fedu", "Mjob", "Fjob", "guardian", "famrel", "famsup",
];

const SCHOOLING: &[&str] = &[
    "reason",
    "traveltime",
    "studytime",
    "failures",
    "schoolsup",
    "paid",
    "activities",
    "nursery",
    "higher",
    "absences",
];

const LIFESTYLE: &[&str] = &[
    "internet", "romantic", "freetime", "goout", "Dalc", "Walc", "health",
];

const GRADES: &[&str] = &["G1", "G2"];

pub(crate) const SECTIONS: &[(&str, &[&str])] = &[
    ("Demographics", DEMOGRAPHICS),
    ("Family", FAMILY),
    ("Schooling", SCHOOLING),
    ("Lifestyle", LIFESTYLE),
    ("Grades", GRADES),
];

// ── Public API ──

/// Every feature grouped by section, with its kind and accepted values.
pub fn render_schema(schema: &FeatureSchema) -> String {
    let mut out = String::new();
    for (header, names) in SECTIONS {
        let _ = writeln!(out, "{header}");
        for spec in names.iter().filter_map(|n| schema.get(n)) {
            let _ = writeln!(out, "  {:<12} {:<38} {}", spec.name, spec.label, describe(spec));
        }
        out.push('\n');
    }
    out
}

/// Predicted label, confidence and a bar per class. With `input`, the
/// values sent to the model follow, grouped like the schema listing.
pub fn render_result(result: &PredictionResult, input: Option<&FeatureVector>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Predicted stress level: {} ===", result.label);
    let _ = writeln!(out, "Confidence {:.1}%", result.confidence * 100.0);
    out.push('\n');
    for p in &result.probabilities {
        let filled = (p.probability * BAR_WIDTH as f64).round() as usize;
        let _ = writeln!(
            out,
            "  {:<8} {:>6.1}%  {}{}",
            p.label,
            p.probability * 100.0,
            "#".repeat(filled.min(BAR_WIDTH)),
            ".".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)),
        );
    }

    if let Some(input) = input {
        out.push('\n');
        for (header, names) in SECTIONS {
            let _ = writeln!(out, "{header}");
            for name in *names {
                if let Some(value) = input.get(name) {
                    let _ = writeln!(out, "  {name:<12} {value}");
                }
            }
        }
    }
    out
}

/// Observed dataset values next to what the schema accepts.
pub fn render_ranges(profiles: &[ColumnProfile]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  {:<12} {:<28} {:<28} fits", "feature", "observed", "allowed");
    for p in profiles {
        let observed = match &p.observed {
            Observed::Range { min, max } => format!("{min}..={max}"),
            Observed::Codes { values } => values
                .iter()
                .map(f64::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            Observed::Categories { values } => values.join(", "),
        };
        let allowed = match p.allowed {
            FeatureKind::Categorical { .. } => p
                .allowed
                .category_values()
                .unwrap_or_default()
                .join(", "),
            kind => kind
                .numeric_bounds()
                .map_or_else(String::new, |(lo, hi)| format!("{lo}..={hi}")),
        };
        let _ = writeln!(
            out,
            "  {:<12} {:<28} {:<28} {}",
            p.feature,
            observed,
            allowed,
            if p.fits_schema() { "yes" } else { "NO" }
        );
    }
    out
}

/// Accuracy, per-label counts and the confusion matrix.
pub fn render_evaluation(eval: &Evaluation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Rows           {}", eval.total);
    let _ = writeln!(out, "Predicted      {}", eval.predicted());
    if eval.failed > 0 {
        let _ = writeln!(out, "Failed         {}", eval.failed);
    }
    match eval.accuracy() {
        Some(acc) => {
            let _ = writeln!(
                out,
                "Accuracy       {:.1}% ({} of {} labelled rows)",
                acc * 100.0,
                eval.correct(),
                eval.labelled()
            );
        }
        None => {
            let _ = writeln!(out, "Accuracy       n/a (no labelled rows)");
        }
    }
    out.push('\n');

    let labels = eval.labels();
    let _ = writeln!(out, "Predicted label counts");
    for label in &labels {
        let _ = writeln!(out, "  {:<8} {}", label, eval.predicted_count(*label));
    }

    if eval.labelled() > 0 {
        out.push('\n');
        let _ = write!(out, "Confusion (rows actual, columns predicted)\n  {:<8}", "");
        for label in &labels {
            let _ = write!(out, " {:>7}", label.as_str());
        }
        out.push('\n');
        for actual in &labels {
            let _ = write!(out, "  {:<8}", actual.as_str());
            for predicted in &labels {
                let _ = write!(out, " {:>7}", eval.confusion(*actual, *predicted));
            }
            out.push('\n');
        }
    }
    out
}

// ── Helpers ──

fn describe(spec: &FeatureSpec) -> String {
    match spec.kind {
        FeatureKind::Numeric { min, max, default } => {
            format!("number {min}..={max} (default {default})")
        }
        FeatureKind::Coded { options } => options
            .iter()
            .map(|o| format!("{}={}", o.code, o.label))
            .collect::<Vec<_>>()
            .join(", "),
        FeatureKind::Categorical { categories } => categories
            .iter()
            .map(|c| c.value)
            .collect::<Vec<_>>()
            .join(" | "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sections_cover_schema_once() {
        let schema = FeatureSchema::student();
        let listed: Vec<&str> = SECTIONS.iter().flat_map(|(_, names)| names.iter().copied()).collect();
        assert_eq!(listed.len(), schema.len());
        let unique: HashSet<&str> = listed.iter().copied().collect();
        let expected: HashSet<&str> = schema.names().into_iter().collect();
        assert_eq!(unique, expected);
    }

    #[test]
    fn schema_listing_shows_ranges_and_options() {
        let text = render_schema(&FeatureSchema::student());
        assert!(text.contains("number 10..=30 (default 17)"));
        assert!(text.contains("GP | MS"));
        assert!(text.starts_with("Demographics\n"));
    }

    #[test]
    fn result_card_lists_every_class() {
        let result = PredictionResult::from_probabilities(&[0.1, 0.2, 0.7]).unwrap();
        let text = render_result(&result, None);
        assert!(text.starts_with("=== Predicted stress level: High ==="));
        assert!(text.contains("Confidence 70.0%"));
        assert!(text.contains("Low"));
        assert!(text.contains("Medium"));
        assert!(!text.contains("Demographics"));
    }

    #[test]
    fn result_card_echoes_input() {
        let schema = FeatureSchema::student();
        let result = PredictionResult::from_probabilities(&[0.9, 0.1]).unwrap();
        let input = schema.default_vector();
        let text = render_result(&result, Some(&input));
        assert!(text.contains("Grades"));
        assert!(text.contains("  age          17"));
    }
}
