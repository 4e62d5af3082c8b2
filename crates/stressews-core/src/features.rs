//! Feature values and vectors passed from the front-ends to the prediction service.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A single feature value: a number (free numeric entry or integer code) or
/// a string category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Category(String),
}

impl FeatureValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            Self::Category(s) => Some(s),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Category(s) => f.write_str(s),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        Self::Number(v as f64)
    }
}

impl From<u32> for FeatureValue {
    fn from(v: u32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<&str> for FeatureValue {
    fn from(s: &str) -> Self {
        Self::Category(s.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(s: String) -> Self {
        Self::Category(s)
    }
}

/// Named feature values as supplied by a caller, in insertion order.
///
/// Not yet checked against the schema: it may hold unknown, missing, or
/// repeated names. [`FeatureSchema::validate`](crate::FeatureSchema::validate)
/// turns it into [`ValidatedFeatures`].
///
/// Serializes as a map in insertion order. Deserializing keeps repeated keys
/// so validation can report them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    entries: Vec<(String, FeatureValue)>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Repeating a name is allowed here and rejected on validation.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FeatureValue>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace the first entry named `name`, or append it.
    pub fn set(&mut self, name: &str, value: impl Into<FeatureValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    /// Remove every entry named `name`, returning the first one's value.
    pub fn remove(&mut self, name: &str) -> Option<FeatureValue> {
        let first = self.get(name).cloned();
        self.entries.retain(|(n, _)| n != name);
        first
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = FeatureVector;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of feature names to numbers or strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut vector = FeatureVector::new();
                while let Some((name, value)) = map.next_entry::<String, FeatureValue>()? {
                    vector.insert(name, value);
                }
                Ok(vector)
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

impl FromIterator<(String, FeatureValue)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (String, FeatureValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FeatureVector {
    type Item = (String, FeatureValue);
    type IntoIter = std::vec::IntoIter<(String, FeatureValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl From<BTreeMap<String, FeatureValue>> for FeatureVector {
    fn from(map: BTreeMap<String, FeatureValue>) -> Self {
        map.into_iter().collect()
    }
}

impl From<HashMap<String, FeatureValue>> for FeatureVector {
    fn from(map: HashMap<String, FeatureValue>) -> Self {
        map.into_iter().collect()
    }
}

impl From<FeatureVector> for BTreeMap<String, FeatureValue> {
    fn from(v: FeatureVector) -> Self {
        v.entries.into_iter().collect()
    }
}

/// Feature values that passed schema validation, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFeatures {
    values: Vec<FeatureValue>,
}

impl ValidatedFeatures {
    pub(crate) fn new(values: Vec<FeatureValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Statically-typed survey answers for one student.
///
/// Field names map onto the schema's feature names; yes/no answers use the
/// 1/0 codes and ratings their 1-5 codes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub school: String,
    pub sex: String,
    pub age: u32,
    pub address: String,
    pub famsize: String,
    #[serde(rename = "Pstatus")]
    pub pstatus: String,
    #[serde(rename = "Medu")]
    pub medu: u32,
    #[serde(rename = "Fedu")]
    pub fedu: u32,
    #[serde(rename = "Mjob")]
    pub mjob: String,
    #[serde(rename = "Fjob")]
    pub fjob: String,
    pub reason: String,
    pub guardian: String,
    pub traveltime: u32,
    pub studytime: u32,
    pub failures: u32,
    pub schoolsup: u32,
    pub famsup: u32,
    pub paid: u32,
    pub activities: u32,
    pub nursery: u32,
    pub higher: u32,
    pub internet: u32,
    pub romantic: u32,
    pub famrel: u32,
    pub freetime: u32,
    pub goout: u32,
    #[serde(rename = "Dalc")]
    pub dalc: u32,
    #[serde(rename = "Walc")]
    pub walc: u32,
    pub health: u32,
    pub absences: u32,
    #[serde(rename = "G1")]
    pub g1: u32,
    #[serde(rename = "G2")]
    pub g2: u32,
}

impl From<StudentProfile> for FeatureVector {
    fn from(p: StudentProfile) -> Self {
        let mut v = FeatureVector::new();
        v.insert("school", p.school);
        v.insert("sex", p.sex);
        v.insert("age", p.age);
        v.insert("address", p.address);
        v.insert("famsize", p.famsize);
        v.insert("Pstatus", p.pstatus);
        v.insert("Medu", p.medu);
        v.insert("Fedu", p.fedu);
        v.insert("Mjob", p.mjob);
        v.insert("Fjob", p.fjob);
        v.insert("reason", p.reason);
        v.insert("guardian", p.guardian);
        v.insert("traveltime", p.traveltime);
        v.insert("studytime", p.studytime);
        v.insert("failures", p.failures);
        v.insert("schoolsup", p.schoolsup);
        v.insert("famsup", p.famsup);
        v.insert("paid", p.paid);
        v.insert("activities", p.activities);
        v.insert("nursery", p.nursery);
        v.insert("higher", p.higher);
        v.insert("internet", p.internet);
        v.insert("romantic", p.romantic);
        v.insert("famrel", p.famrel);
        v.insert("freetime", p.freetime);
        v.insert("goout", p.goout);
        v.insert("Dalc", p.dalc);
        v.insert("Walc", p.walc);
        v.insert("health", p.health);
        v.insert("absences", p.absences);
        v.insert("G1", p.g1);
        v.insert("G2", p.g2);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FeatureSchema;

    fn profile() -> StudentProfile {
        StudentProfile {
            school: "GP".into(),
            sex: "F".into(),
            age: 17,
            address: "U".into(),
            famsize: "GT3".into(),
            pstatus: "T".into(),
            medu: 4,
            fedu: 3,
            mjob: "teacher".into(),
            fjob: "services".into(),
            reason: "course".into(),
            guardian: "mother".into(),
            traveltime: 1,
            studytime: 3,
            failures: 0,
            schoolsup: 0,
            famsup: 1,
            paid: 0,
            activities: 1,
            nursery: 1,
            higher: 1,
            internet: 1,
            romantic: 0,
            famrel: 4,
            freetime: 3,
            goout: 2,
            dalc: 1,
            walc: 1,
            health: 5,
            absences: 2,
            g1: 15,
            g2: 16,
        }
    }

    #[test]
    fn profile_keys_follow_schema() {
        let vector = FeatureVector::from(profile());
        let keys: Vec<&str> = vector.iter().map(|(n, _)| n).collect();
        assert_eq!(keys, FeatureSchema::student().names());
        assert!(FeatureSchema::student().validate(&vector).is_ok());
    }

    #[test]
    fn profile_json_uses_schema_names() {
        let json = serde_json::to_value(profile()).unwrap();
        assert_eq!(json["Pstatus"], "T");
        assert_eq!(json["G2"], 16);

        let vector: FeatureVector = serde_json::from_value(json).unwrap();
        assert_eq!(vector.len(), 32);
        assert_eq!(vector.get("Medu"), Some(&FeatureValue::Number(4.0)));
        assert_eq!(vector.get("Mjob"), Some(&FeatureValue::Category("teacher".into())));
    }

    #[test]
    fn vector_set_and_remove() {
        let mut v = FeatureVector::new();
        v.insert("age", 17.0);
        v.set("age", 18.0);
        v.set("G1", 12.0);
        assert_eq!(v.len(), 2);
        assert_eq!(v.get("age"), Some(&FeatureValue::Number(18.0)));

        assert_eq!(v.remove("age"), Some(FeatureValue::Number(18.0)));
        assert_eq!(v.remove("age"), None);
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn repeated_json_keys_are_kept() {
        let v: FeatureVector = serde_json::from_str(r#"{"age": 17, "age": 18}"#).unwrap();
        assert_eq!(v.len(), 2);
        let err = FeatureSchema::student().validate(&v).unwrap_err();
        assert!(err.issue_for("age").is_some());
    }

    #[test]
    fn serializes_in_insertion_order() {
        let mut v = FeatureVector::new();
        v.insert("school", "GP");
        v.insert("age", 17.0);
        v.insert("G2", 16.0);
        assert_eq!(
            serde_json::to_string(&v).unwrap(),
            r#"{"school":"GP","age":17.0,"G2":16.0}"#
        );
    }

    #[test]
    fn untagged_values_from_json() {
        let v: FeatureVector = serde_json::from_str(r#"{"age": 17, "school": "GP"}"#).unwrap();
        assert_eq!(v.get("age"), Some(&FeatureValue::Number(17.0)));
        assert_eq!(v.get("school"), Some(&FeatureValue::Category("GP".into())));
    }
}
