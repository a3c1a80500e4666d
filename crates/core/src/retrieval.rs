//! Retrieval collaborators — embedding, similarity search, document lookup.
//!
//! The pipeline only consumes these through the narrow traits below. The
//! similarity index and the repository are shared between sessions and must
//! be safe for concurrent reads.

use crate::document::Document;
use crate::error::CollaboratorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A document identifier with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredId {
    pub id: String,
    pub score: f32,
}

impl ScoredId {
    pub fn new(id: impl Into<String>, score: f32) -> Self {
        Self {
            id: id.into(),
            score,
        }
    }
}

/// Turns text into a fixed-dimensionality vector.
///
/// Must be deterministic: identical text yields identical vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Vector dimensionality `D`.
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError>;
}

/// Nearest-neighbour lookup over document embeddings.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    /// Return at most `k` results ordered by descending score.
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredId>, CollaboratorError>;
}

/// Read-only access to the battery records.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn get_document(&self, id: &str) -> Result<Option<Document>, CollaboratorError>;
}
