//! Labelled sample dataset: one row per student, the schema's features as
//! columns plus an optional `stress` label column.
//!
//! The file is read with Arrow's CSV reader using a schema derived from the
//! feature schema, so numeric cells that fail to parse are rejected by Arrow
//! rather than silently dropped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Float64Array, StringArray};
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use stressews_core::{
    FeatureKind, FeatureSchema, FeatureSpec, FeatureValue, FeatureVector, RiskLabel,
};
use tracing::info;

use crate::StoreError;

/// Name of the optional label column.
pub const LABEL_COLUMN: &str = "stress";

const BATCH_SIZE: usize = 1024;

/// Sample rows held in memory as Arrow record batches.
#[derive(Debug)]
pub struct SampleDataset {
    schema: FeatureSchema,
    batches: Vec<RecordBatch>,
    has_labels: bool,
}

impl SampleDataset {
    /// Read a CSV file whose header names every schema feature (any order),
    /// optionally followed by a `stress` label column.
    pub fn load(path: &Path, schema: &FeatureSchema) -> Result<Self, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut header = String::new();
        BufReader::new(File::open(path).map_err(io_err)?)
            .read_line(&mut header)
            .map_err(io_err)?;
        let (arrow_schema, has_labels) = csv_schema(header.trim_end(), schema)?;

        let file = File::open(path).map_err(io_err)?;
        let reader = ReaderBuilder::new(Arc::new(arrow_schema))
            .with_header(true)
            .with_batch_size(BATCH_SIZE)
            .build(file)?;
        let batches = reader.collect::<Result<Vec<_>, _>>()?;

        let dataset = Self {
            schema: schema.clone(),
            batches,
            has_labels,
        };
        if dataset.len() == 0 {
            return Err(StoreError::Empty);
        }
        info!(
            rows = dataset.len(),
            labelled = has_labels,
            path = %path.display(),
            "loaded sample dataset"
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_labels(&self) -> bool {
        self.has_labels
    }

    /// Every row as a feature vector in schema order, with its label when the
    /// file has a label column and the cell is non-empty.
    pub fn rows(&self) -> Result<Vec<(FeatureVector, Option<RiskLabel>)>, StoreError> {
        let mut out = Vec::with_capacity(self.len());
        for batch in &self.batches {
            let columns = self
                .schema
                .iter()
                .map(|spec| column_values(batch, spec))
                .collect::<Result<Vec<_>, _>>()?;
            let labels = if self.has_labels {
                Some(string_column(batch, LABEL_COLUMN)?)
            } else {
                None
            };

            for row in 0..batch.num_rows() {
                let vector = self
                    .schema
                    .iter()
                    .zip(&columns)
                    .map(|(spec, col)| (spec.name.to_string(), col.value(row)))
                    .collect();

                let label = match labels {
                    Some(labels) if labels.is_valid(row) && !labels.value(row).trim().is_empty() => {
                        let raw = labels.value(row);
                        Some(raw.parse::<RiskLabel>().map_err(|_| StoreError::Label {
                            row: out.len() + 1,
                            value: raw.to_string(),
                        })?)
                    }
                    _ => None,
                };
                out.push((vector, label));
            }
        }
        Ok(out)
    }

    /// Observed range or category set of each feature, in schema order.
    pub fn profile(&self) -> Result<Vec<ColumnProfile>, StoreError> {
        let mut profiles = Vec::with_capacity(self.schema.len());
        for spec in self.schema.iter() {
            let observed = match spec.kind {
                FeatureKind::Categorical { .. } => {
                    let mut seen: Vec<String> = Vec::new();
                    for batch in &self.batches {
                        let col = string_column(batch, spec.name)?;
                        for value in col.iter().flatten() {
                            if !seen.iter().any(|s| s == value) {
                                seen.push(value.to_string());
                            }
                        }
                    }
                    seen.sort();
                    Observed::Categories { values: seen }
                }
                FeatureKind::Coded { .. } => {
                    let mut seen: Vec<f64> = Vec::new();
                    for batch in &self.batches {
                        seen.extend(float_column(batch, spec.name)?.iter().flatten());
                    }
                    seen.sort_by(f64::total_cmp);
                    seen.dedup();
                    Observed::Codes { values: seen }
                }
                FeatureKind::Numeric { .. } => {
                    let (mut min, mut max) = (f64::INFINITY, f64::NEG_INFINITY);
                    for batch in &self.batches {
                        let col = float_column(batch, spec.name)?;
                        if let Some(lo) = arrow::compute::min(col) {
                            min = min.min(lo);
                        }
                        if let Some(hi) = arrow::compute::max(col) {
                            max = max.max(hi);
                        }
                    }
                    Observed::Range { min, max }
                }
            };
            profiles.push(ColumnProfile {
                feature: spec.name,
                allowed: spec.kind,
                observed,
            });
        }
        Ok(profiles)
    }
}

/// What the dataset holds for one feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "observed", rename_all = "snake_case")]
pub enum Observed {
    Range { min: f64, max: f64 },
    /// Distinct codes, ascending.
    Codes { values: Vec<f64> },
    Categories { values: Vec<String> },
}

/// Observed values of one feature next to what the schema allows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub feature: &'static str,
    pub allowed: FeatureKind,
    pub observed: Observed,
}

impl ColumnProfile {
    /// Whether every observed value is accepted by the schema.
    pub fn fits_schema(&self) -> bool {
        match (&self.observed, self.allowed) {
            (Observed::Codes { values }, FeatureKind::Coded { options }) => values
                .iter()
                .all(|&v| options.iter().any(|o| o.code as f64 == v)),
            (Observed::Codes { .. }, _) => false,
            (Observed::Range { min, max }, kind) => kind
                .numeric_bounds()
                .is_some_and(|(lo, hi)| *min >= lo && *max <= hi),
            (Observed::Categories { values: seen }, kind) => kind
                .category_values()
                .is_some_and(|allowed| seen.iter().all(|s| allowed.contains(&s.as_str()))),
        }
    }
}

/// Arrow schema for the file's header, in header order.
fn csv_schema(header: &str, schema: &FeatureSchema) -> Result<(Schema, bool), StoreError> {
    let features = schema.arrow_schema();
    let mut fields = Vec::new();
    let mut has_labels = false;

    for name in header.split(',').map(str::trim) {
        if name == LABEL_COLUMN {
            has_labels = true;
            fields.push(Field::new(LABEL_COLUMN, DataType::Utf8, true));
            continue;
        }
        let field = features
            .field_with_name(name)
            .map_err(|_| StoreError::UnknownColumn(name.to_string()))?;
        fields.push(field.clone());
    }

    for spec in schema.iter() {
        if !fields.iter().any(|f| f.name() == spec.name) {
            return Err(StoreError::MissingColumn(spec.name.to_string()));
        }
    }

    Ok((Schema::new(fields), has_labels))
}

enum ColumnRef<'a> {
    Number(&'a Float64Array),
    Category(&'a StringArray),
}

impl ColumnRef<'_> {
    fn value(&self, row: usize) -> FeatureValue {
        match self {
            Self::Number(a) => FeatureValue::Number(a.value(row)),
            Self::Category(a) => FeatureValue::Category(a.value(row).to_string()),
        }
    }
}

fn column_values<'a>(batch: &'a RecordBatch, spec: &FeatureSpec) -> Result<ColumnRef<'a>, StoreError> {
    if spec.kind.is_categorical() {
        string_column(batch, spec.name).map(ColumnRef::Category)
    } else {
        float_column(batch, spec.name).map(ColumnRef::Number)
    }
}

fn float_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
        .ok_or_else(|| StoreError::Other(format!("column {name} is not a Float64 column")))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StoreError::Other(format!("column {name} is not a Utf8 column")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("data")
            .join("student_sample.csv")
    }

    fn write_csv(dir: &tempfile::TempDir, text: &str) -> PathBuf {
        let path = dir.path().join("sample.csv");
        std::fs::write(&path, text).unwrap();
        path
    }

    const HEADER: &str = "school,sex,age,address,famsize,Pstatus,Medu,Fedu,Mjob,Fjob,reason,guardian,traveltime,studytime,failures,schoolsup,famsup,paid,activities,nursery,higher,internet,romantic,famrel,freetime,goout,Dalc,Walc,health,absences,G1,G2";
    const ROW: &str = "GP,F,17,U,GT3,T,4,3,teacher,services,course,mother,1,3,0,0,1,0,1,1,1,1,0,4,3,2,1,1,5,2,15,16";

    #[test]
    fn shipped_sample_loads_with_labels() {
        let schema = FeatureSchema::student();
        let ds = SampleDataset::load(&sample_path(), &schema).unwrap();
        assert_eq!(ds.len(), 48);
        assert!(ds.has_labels());

        let rows = ds.rows().unwrap();
        assert_eq!(rows.len(), 48);
        for (vector, label) in &rows {
            assert!(schema.validate(vector).is_ok());
            assert!(label.is_some());
        }
        let high = rows
            .iter()
            .filter(|(_, l)| *l == Some(RiskLabel::High))
            .count();
        assert_eq!(high, 31);
    }

    #[test]
    fn shipped_sample_fits_schema_ranges() {
        let schema = FeatureSchema::student();
        let ds = SampleDataset::load(&sample_path(), &schema).unwrap();
        let profile = ds.profile().unwrap();
        assert_eq!(profile.len(), 32);
        for column in &profile {
            assert!(column.fits_schema(), "{column:?}");
        }
        let age = profile.iter().find(|c| c.feature == "age").unwrap();
        assert_eq!(age.observed, Observed::Range { min: 15.0, max: 21.0 });
        let medu = profile.iter().find(|c| c.feature == "Medu").unwrap();
        assert!(matches!(medu.observed, Observed::Codes { .. }));
    }

    #[test]
    fn unlabelled_file_in_any_column_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut names: Vec<&str> = HEADER.split(',').collect();
        let mut cells: Vec<&str> = ROW.split(',').collect();
        names.reverse();
        cells.reverse();
        let path = write_csv(&dir, &format!("{}\n{}\n", names.join(","), cells.join(",")));

        let schema = FeatureSchema::student();
        let ds = SampleDataset::load(&path, &schema).unwrap();
        assert!(!ds.has_labels());
        let rows = ds.rows().unwrap();
        assert_eq!(rows.len(), 1);
        let (vector, label) = &rows[0];
        assert_eq!(label, &None);
        assert_eq!(vector.get("G2"), Some(&FeatureValue::Number(16.0)));
        assert_eq!(vector.get("school"), Some(&FeatureValue::Category("GP".into())));
        let keys: Vec<&str> = vector.iter().map(|(n, _)| n).collect();
        assert_eq!(keys, schema.names());
    }

    #[test]
    fn unknown_column_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_csv(&dir, &format!("{HEADER},shoe_size\n{ROW},42\n"));
        let err = SampleDataset::load(&path, &FeatureSchema::student()).unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn(ref c) if c == "shoe_size"));
    }

    #[test]
    fn missing_column_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let header = HEADER.replace(",G2", "");
        let row = ROW.rsplit_once(',').unwrap().0;
        let path = write_csv(&dir, &format!("{header}\n{row}\n"));
        let err = SampleDataset::load(&path, &FeatureSchema::student()).unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn(ref c) if c == "G2"));
    }

    #[test]
    fn bad_label_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_csv(&dir, &format!("{HEADER},stress\n{ROW},Severe\n"));
        let ds = SampleDataset::load(&path, &FeatureSchema::student()).unwrap();
        let err = ds.rows().unwrap_err();
        assert!(matches!(err, StoreError::Label { row: 1, .. }));
    }

    #[test]
    fn header_only_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_csv(&dir, &format!("{HEADER}\n"));
        assert!(matches!(
            SampleDataset::load(&path, &FeatureSchema::student()),
            Err(StoreError::Empty)
        ));
    }

    #[test]
    fn missing_file() {
        let err = SampleDataset::load(Path::new("/nonexistent/sample.csv"), &FeatureSchema::student())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn out_of_bounds_detected() {
        let dir = tempfile::TempDir::new().unwrap();
        let row = ROW.replacen("GP,F,17", "GP,F,42", 1);
        let path = write_csv(&dir, &format!("{HEADER}\n{row}\n"));
        let ds = SampleDataset::load(&path, &FeatureSchema::student()).unwrap();
        let profile = ds.profile().unwrap();
        let age = profile.iter().find(|c| c.feature == "age").unwrap();
        assert!(!age.fits_schema());
    }

    #[test]
    fn unlisted_code_between_listed_ones_detected() {
        let dir = tempfile::TempDir::new().unwrap();
        let rows: Vec<String> = ["0", "2.5", "4"]
            .iter()
            .map(|medu| ROW.replacen("T,4,3,", &format!("T,{medu},3,"), 1))
            .collect();
        let path = write_csv(&dir, &format!("{HEADER}\n{}\n", rows.join("\n")));
        let schema = FeatureSchema::student();
        let ds = SampleDataset::load(&path, &schema).unwrap();

        let profile = ds.profile().unwrap();
        let medu = profile.iter().find(|c| c.feature == "Medu").unwrap();
        assert_eq!(medu.observed, Observed::Codes { values: vec![0.0, 2.5, 4.0] });
        assert!(!medu.fits_schema());

        let invalid = ds
            .rows()
            .unwrap()
            .iter()
            .filter(|(v, _)| schema.validate(v).is_err())
            .count();
        assert_eq!(invalid, 1);
    }
}
