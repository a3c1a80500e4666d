//! In-memory document repository — useful for testing and small catalogs.

use async_trait::async_trait;
use std::collections::HashMap;
use voltrag_core::{CollaboratorError, Document, DocumentRepository};

/// A repository that keeps every record in a `HashMap`.
///
/// Read-only once built, so it can be shared between sessions behind an `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    documents: HashMap<String, Document>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document, replacing any previous record with the same id.
    pub fn insert(&mut self, document: Document) {
        self.documents.insert(document.id.clone(), document);
    }

    pub fn get(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryRepository {
    async fn get_document(&self, id: &str) -> Result<Option<Document>, CollaboratorError> {
        Ok(self.documents.get(id).cloned())
    }
}
