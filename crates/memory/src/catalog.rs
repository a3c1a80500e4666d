//! Battery catalog loading.
//!
//! A catalog is a JSON array of already-cleaned records:
//!
//! ```json
//! [{ "id": "samsung-25r", "fields": { "Model": "INR18650-25R", "Nominal Voltage (V)": "3.6" } }]
//! ```
//!
//! Loading embeds every record once and fills an [`InMemoryRepository`] and an
//! [`InMemoryIndex`].

use crate::in_memory::InMemoryRepository;
use crate::vector::InMemoryIndex;
use std::path::{Path, PathBuf};
use tracing::info;
use voltrag_core::{CollaboratorError, Document, Embedder};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse catalog at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Duplicate document id in catalog: {0}")]
    DuplicateId(String),

    #[error("Failed to index catalog: {0}")]
    Indexing(#[from] CollaboratorError),
}

/// The repository and index built from one catalog.
#[derive(Debug)]
pub struct Catalog {
    pub repository: InMemoryRepository,
    pub index: InMemoryIndex,
}

impl Catalog {
    /// Read a JSON catalog from disk and index it with `embedder`.
    pub async fn load(path: &Path, embedder: &dyn Embedder) -> Result<Self, CatalogError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CatalogError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let documents: Vec<Document> =
            serde_json::from_str(&content).map_err(|e| CatalogError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let catalog = Self::from_documents(documents, embedder).await?;
        info!(
            path = %path.display(),
            documents = catalog.repository.len(),
            "Catalog loaded"
        );
        Ok(catalog)
    }

    /// Index an in-memory list of documents.
    pub async fn from_documents(
        documents: Vec<Document>,
        embedder: &dyn Embedder,
    ) -> Result<Self, CatalogError> {
        let mut repository = InMemoryRepository::new();
        let mut index = InMemoryIndex::new();

        for document in documents {
            if repository.get(&document.id).is_some() {
                return Err(CatalogError::DuplicateId(document.id));
            }
            let vector = embedder.embed(&document.embedding_text()).await?;
            index.insert(document.id.clone(), vector)?;
            repository.insert(document);
        }

        Ok(Self { repository, index })
    }
}
