//! Battery specification records.
//!
//! A [`Document`] is an opaque string→string field mapping owned by the
//! document repository. The core never mutates it; the only typed view it
//! takes is [`CellSpec`], which pulls the per-cell nominal voltage and capacity
//! out of whatever column names the catalog uses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single battery specification record.
///
/// Fields are kept in a `BTreeMap` so that every rendering of a document lists
/// its fields in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier assigned by the repository
    pub id: String,

    /// Column name → cleaned value
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Text used when embedding the record for similarity search.
    pub fn embedding_text(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A document paired with the relevance score it was retrieved with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

/// Typed view of the per-cell electrical values of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CellSpec {
    /// Nominal cell voltage in volts
    pub voltage: Option<f64>,
    /// Nominal cell capacity in amp-hours
    pub capacity_ah: Option<f64>,
}

const VOLTAGE_KEYS: &[&str] = &[
    "nominalvoltage",
    "nominalvoltagev",
    "voltage",
    "voltagev",
    "cellvoltage",
    "cellvoltagev",
];

const CAPACITY_STEMS: &[&str] = &["capacity", "nominalcapacity", "ratedcapacity", "cellcapacity"];

impl CellSpec {
    /// Extract the cell voltage and capacity from a document.
    ///
    /// Keys are matched after lower-casing and stripping everything that is
    /// not alphanumeric, so `"Nominal Voltage (V)"` and `nominal_voltage` are
    /// the same column. A unit written in the value wins over the column
    /// name, so `"2500mAh"` is 2.5 Ah under a plain `Capacity` column; a
    /// bare number in a `...mah` column is read as mAh. Values in any other
    /// unit are treated as absent.
    pub fn from_document(doc: &Document) -> Self {
        let mut spec = Self::default();

        for (key, value) in &doc.fields {
            let key = normalize_key(key);

            if spec.voltage.is_none() && VOLTAGE_KEYS.contains(&key.as_str()) {
                spec.voltage = voltage_in_volts(value);
                continue;
            }

            if spec.capacity_ah.is_none() {
                let (stem, column_in_mah) = match key.strip_suffix("mah") {
                    Some(stem) => (stem, true),
                    None => (key.strip_suffix("ah").unwrap_or(&key), false),
                };
                if CAPACITY_STEMS.contains(&stem) {
                    spec.capacity_ah = capacity_in_ah(value, column_in_mah);
                }
            }
        }

        spec
    }
}

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn voltage_in_volts(value: &str) -> Option<f64> {
    let (number, unit) = parse_quantity(value)?;
    matches!(unit.as_str(), "" | "v").then_some(number)
}

fn capacity_in_ah(value: &str, column_in_mah: bool) -> Option<f64> {
    let (number, unit) = parse_quantity(value)?;
    match unit.as_str() {
        "" if column_in_mah => Some(number / 1000.0),
        "" | "ah" => Some(number),
        "mah" => Some(number / 1000.0),
        _ => None,
    }
}

/// Split a value such as `"3.6 V"` or `"5000mAh"` into its positive leading
/// number and the lower-cased unit word that follows it (empty if none).
fn parse_quantity(value: &str) -> Option<(f64, String)> {
    let trimmed = value.trim();
    let end = trimmed
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    let number: f64 = trimmed[..end].parse().ok()?;
    if !(number.is_finite() && number > 0.0) {
        return None;
    }
    let unit = trimmed[end..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();
    Some((number, unit))
}
