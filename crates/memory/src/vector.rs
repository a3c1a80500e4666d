//! Vector similarity search.
//!
//! Pure-Rust brute-force cosine search over a fixed set of document vectors.
//! Adequate for catalogs of a few thousand records.

use async_trait::async_trait;
use std::cmp::Ordering;
use voltrag_core::{CollaboratorError, ScoredId, SimilarityIndex};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ or either vector is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Brute-force similarity index held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    dimensions: Option<usize>,
    vectors: Vec<(String, Vec<f32>)>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document vector. All vectors must share one dimensionality.
    pub fn insert(&mut self, id: impl Into<String>, vector: Vec<f32>) -> Result<(), CollaboratorError> {
        match self.dimensions {
            Some(d) if d != vector.len() => {
                return Err(CollaboratorError::Index(format!(
                    "vector has {} dimensions, index expects {d}",
                    vector.len()
                )));
            }
            None => self.dimensions = Some(vector.len()),
            _ => {}
        }
        self.vectors.push((id.into(), vector));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

#[async_trait]
impl SimilarityIndex for InMemoryIndex {
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredId>, CollaboratorError> {
        if let Some(d) = self.dimensions
            && d != vector.len()
        {
            return Err(CollaboratorError::Index(format!(
                "query has {} dimensions, index expects {d}",
                vector.len()
            )));
        }

        let mut scored: Vec<ScoredId> = self
            .vectors
            .iter()
            .map(|(id, v)| ScoredId::new(id.clone(), cosine_similarity(v, vector)))
            .collect();

        // Equal scores fall back to id order so results are reproducible.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);
        Ok(scored)
    }
}
