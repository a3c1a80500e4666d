//! Pack configuration parsing and calculation.
//!
//! Detects `SxPy` notation in a query, picks per-cell values from the
//! retrieved documents, and computes the pack's electrical values.

pub mod calculator;
pub mod notation;

pub use calculator::{CellValues, PackResult, calculate, format_number};
pub use notation::{BatteryConfig, detect, parse};

use voltrag_core::{CellSpec, QueryWarning, ScoredDocument};

/// Relative difference above which two documents disagree on a cell value.
pub const DISAGREEMENT_TOLERANCE: f64 = 0.01;

/// Cell values chosen from the retrieved documents.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCell {
    pub values: CellValues,
    /// Document the values were taken from
    pub source_document: String,
}

/// Pick per-cell values from the highest-scoring document that lists both
/// voltage and capacity. Equal scores keep retrieval order.
///
/// Every other document whose value for either field differs from the chosen
/// one by more than [`DISAGREEMENT_TOLERANCE`] (relative to the chosen value)
/// yields an [`QueryWarning::AmbiguousData`].
pub fn resolve_cell_values(
    documents: &[ScoredDocument],
) -> (Option<ResolvedCell>, Vec<QueryWarning>) {
    let specs: Vec<(&ScoredDocument, CellSpec)> = documents
        .iter()
        .map(|d| (d, CellSpec::from_document(&d.document)))
        .collect();

    let mut chosen: Option<(&ScoredDocument, f64, f64)> = None;
    for (doc, spec) in &specs {
        if let (Some(voltage), Some(capacity)) = (spec.voltage, spec.capacity_ah) {
            let better = match chosen {
                Some((best, _, _)) => doc.score > best.score,
                None => true,
            };
            if better {
                chosen = Some((*doc, voltage, capacity));
            }
        }
    }

    let Some((source, voltage, capacity)) = chosen else {
        return (None, Vec::new());
    };

    let mut warnings = Vec::new();
    for (doc, spec) in &specs {
        if doc.document.id == source.document.id {
            continue;
        }
        let fields = [
            ("cell voltage (V)", voltage, spec.voltage),
            ("cell capacity (Ah)", capacity, spec.capacity_ah),
        ];
        for (field, chosen_value, other) in fields {
            if let Some(other_value) = other
                && disagrees(chosen_value, other_value)
            {
                warnings.push(QueryWarning::AmbiguousData {
                    field: field.to_string(),
                    chosen_document: source.document.id.clone(),
                    chosen_value,
                    conflicting_document: doc.document.id.clone(),
                    conflicting_value: other_value,
                });
            }
        }
    }

    (
        Some(ResolvedCell {
            values: CellValues {
                voltage,
                capacity_ah: capacity,
            },
            source_document: source.document.id.clone(),
        }),
        warnings,
    )
}

fn disagrees(chosen: f64, other: f64) -> bool {
    (other - chosen).abs() / chosen.abs() > DISAGREEMENT_TOLERANCE
}
