//! A completed question/answer exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded query and its answer. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// When the answer was produced
    pub timestamp: DateTime<Utc>,

    /// The user's question
    pub query: String,

    /// The generated answer
    pub response: String,

    /// Identifiers of the documents the answer was grounded in
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_ids: Vec<String>,
}

impl Interaction {
    /// Create an interaction stamped with the current time.
    pub fn new(
        query: impl Into<String>,
        response: impl Into<String>,
        document_ids: Vec<String>,
    ) -> Self {
        Self::at(Utc::now(), query, response, document_ids)
    }

    /// Create an interaction with an explicit timestamp.
    pub fn at(
        timestamp: DateTime<Utc>,
        query: impl Into<String>,
        response: impl Into<String>,
        document_ids: Vec<String>,
    ) -> Self {
        Self {
            timestamp,
            query: query.into(),
            response: response.into(),
            document_ids,
        }
    }
}
