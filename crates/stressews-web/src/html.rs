//! Server-rendered HTML for the survey form and the result card.

use std::fmt::Write;

use stressews_core::{FeatureKind, FeatureSchema, FeatureSpec, FeatureValue, FieldIssue, PredictionResult};

const STYLE: &str = "body{font-family:sans-serif;max-width:46rem;margin:2rem auto;padding:0 1rem}\
label{display:block;margin-top:.6rem;font-weight:600}\
input,select{width:100%;padding:.3rem}\
.grid{display:grid;grid-template-columns:1fr 1fr;gap:0 1.5rem}\
.issue{color:#b00020;font-weight:400}\
.card{border:2px solid #333;padding:1rem;margin:1rem 0}\
.Low{border-color:#2e7d32}.Medium{border-color:#f9a825}.High{border-color:#c62828}";

/// Escape text for use in element content and quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// What the page shows under the form.
pub enum Outcome<'a> {
    Blank,
    Result(&'a PredictionResult),
    Invalid(&'a [FieldIssue]),
    Failed(&'a str),
}

/// Render the whole page. `values` pre-fills fields; missing ones use the
/// schema default.
pub fn page(
    schema: &FeatureSchema,
    model_id: &str,
    values: &dyn Fn(&str) -> Option<String>,
    outcome: Outcome<'_>,
) -> String {
    let mut html = String::with_capacity(16 * 1024);
    let _ = write!(
        html,
        "<!doctype html><html><head><meta charset=\"utf-8\">\
         <title>Academic Stress Early Warning</title><style>{STYLE}</style></head><body>\
         <h1>Academic Stress Early Warning</h1>\
         <p>Fill in the student survey and press <em>Predict</em>. Model <code>{}</code>.</p>",
        escape(model_id)
    );

    let issues: &[FieldIssue] = match outcome {
        Outcome::Invalid(issues) => issues,
        _ => &[],
    };

    match outcome {
        Outcome::Result(result) => result_card(&mut html, result),
        Outcome::Invalid(issues) => {
            html.push_str("<div class=\"card High\"><strong>Please fix the highlighted fields.</strong><ul>");
            for issue in issues {
                let _ = write!(html, "<li>{}</li>", escape(&issue.to_string()));
            }
            html.push_str("</ul></div>");
        }
        Outcome::Failed(msg) => {
            let _ = write!(html, "<div class=\"card High\">Prediction failed: {}</div>", escape(msg));
        }
        Outcome::Blank => {}
    }

    html.push_str("<form method=\"post\" action=\"/predict/form\"><div class=\"grid\">");
    for spec in schema.iter() {
        let current = values(spec.name).unwrap_or_else(|| spec.default_value().to_string());
        field(&mut html, spec, &current, issues);
    }
    html.push_str("</div><p><button type=\"submit\">Predict</button></p></form></body></html>");
    html
}

fn field(html: &mut String, spec: &FeatureSpec, current: &str, issues: &[FieldIssue]) {
    let name = escape(spec.name);
    let _ = write!(html, "<div><label for=\"{name}\">{}", escape(spec.label));
    for issue in issues.iter().filter(|i| i.field == spec.name) {
        let _ = write!(html, " <span class=\"issue\">({})</span>", escape(&issue.problem.to_string()));
    }
    html.push_str("</label>");

    match spec.kind {
        FeatureKind::Numeric { min, max, .. } => {
            let _ = write!(
                html,
                "<input type=\"number\" id=\"{name}\" name=\"{name}\" min=\"{min}\" max=\"{max}\" step=\"1\" value=\"{}\" required>",
                escape(current)
            );
        }
        FeatureKind::Coded { options } => {
            let _ = write!(html, "<select id=\"{name}\" name=\"{name}\">");
            for o in options {
                let value = FeatureValue::Number(o.code as f64).to_string();
                option(html, &value, o.label, value == current);
            }
            html.push_str("</select>");
        }
        FeatureKind::Categorical { categories } => {
            let _ = write!(html, "<select id=\"{name}\" name=\"{name}\">");
            for c in categories {
                option(html, c.value, c.label, c.value == current);
            }
            html.push_str("</select>");
        }
    }
    html.push_str("</div>");
}

fn option(html: &mut String, value: &str, label: &str, selected: bool) {
    let _ = write!(
        html,
        "<option value=\"{}\"{}>{}</option>",
        escape(value),
        if selected { " selected" } else { "" },
        escape(label)
    );
}

fn result_card(html: &mut String, result: &PredictionResult) {
    let _ = write!(
        html,
        "<div class=\"card {label}\"><h2>Predicted stress level: {label}</h2>\
         <p>Confidence {:.1}%</p><table>",
        result.confidence * 100.0,
        label = result.label
    );
    for p in &result.probabilities {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{:.1}%</td></tr>",
            p.label,
            p.probability * 100.0
        );
    }
    html.push_str("</table></div>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use stressews_core::Problem;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn blank_form_has_every_field_with_defaults() {
        let schema = FeatureSchema::student();
        let html = page(&schema, "m1", &|_: &str| None, Outcome::Blank);
        for spec in schema.iter() {
            assert!(html.contains(&format!("name=\"{}\"", spec.name)), "{}", spec.name);
        }
        assert!(html.contains("name=\"age\" min=\"10\" max=\"30\" step=\"1\" value=\"17\""));
        assert!(html.contains("name=\"G1\" min=\"0\" max=\"20\" step=\"1\" value=\"10\""));
        assert!(html.contains("<option value=\"GP\" selected>"));
        assert!(!html.contains("class=\"card"));
    }

    #[test]
    fn invalid_outcome_flags_fields() {
        let schema = FeatureSchema::student();
        let issues = vec![FieldIssue::new("age", Problem::NotANumber { value: "abc".into() })];
        let html = page(
            &schema,
            "m1",
            &|name: &str| (name == "age").then(|| "abc".to_string()),
            Outcome::Invalid(&issues),
        );
        assert!(html.contains("Please fix the highlighted fields."));
        assert!(html.contains("class=\"issue\""));
        assert!(html.contains("value=\"abc\""));
    }
}
