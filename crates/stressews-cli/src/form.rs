//! Interactive terminal form: one prompt per feature, in schema order.
//!
//! An empty answer keeps the default shown in brackets. Dropdown-style fields
//! accept either the option code/value or its label. Bad answers are
//! re-prompted, so the returned vector always validates.

use std::io::{BufRead, Write};

use anyhow::{Context, bail};
use stressews_core::{FeatureKind, FeatureSchema, FeatureSpec, FeatureValue, FeatureVector};

pub fn run_form<R: BufRead, W: Write>(
    schema: &FeatureSchema,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<FeatureVector> {
    writeln!(out, "Student survey ({} questions). Press Enter to keep the default.", schema.len())?;
    let mut vector = FeatureVector::new();
    for spec in schema.iter() {
        let value = ask(spec, input, out)?;
        vector.insert(spec.name, value);
    }
    Ok(vector)
}

fn ask<R: BufRead, W: Write>(spec: &FeatureSpec, input: &mut R, out: &mut W) -> anyhow::Result<FeatureValue> {
    let default = spec.default_value();
    writeln!(out)?;
    writeln!(out, "{} ({})", spec.label, spec.name)?;
    match spec.kind {
        FeatureKind::Numeric { min, max, .. } => writeln!(out, "  a number from {min} to {max}")?,
        FeatureKind::Coded { options } => {
            for o in options {
                writeln!(out, "  {:>3}  {}", o.code, o.label)?;
            }
        }
        FeatureKind::Categorical { categories } => {
            for c in categories {
                writeln!(out, "  {:>7}  {}", c.value, c.label)?;
            }
        }
    }

    loop {
        write!(out, "[{default}]: ")?;
        out.flush()?;

        let mut line = String::new();
        let read = input.read_line(&mut line).context("reading answer")?;
        if read == 0 {
            bail!("input ended before {} was answered", spec.name);
        }
        let answer = line.trim();
        if answer.is_empty() {
            return Ok(default);
        }

        match spec.parse(answer).and_then(|v| spec.check(&v)) {
            Ok(value) => return Ok(value),
            Err(issue) => writeln!(out, "  {}; try again", issue.problem)?,
        }
    }
}
