//! Error types for the voltrag domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded context has
//! its own enum:
//!
//! - [`GenerationError`] — raised by a generation backend, classified as
//!   transient or fatal so the fallback controller can decide to retry.
//! - [`CollaboratorError`] — embedding / index / repository failures. These
//!   never reach the caller; the orchestrator downgrades them.
//! - [`PackError`] — malformed series/parallel notation.
//! - [`QueryWarning`] — the non-fatal members of the query taxonomy, attached
//!   to a successful result.
//! - [`QueryError`] — the terminal failures a caller of `query` can observe.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// --- Collaborator-level errors ---

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Generation backend not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs
        .map(|secs| format!(", retry after {secs}s"))
        .unwrap_or_default()
}

impl GenerationError {
    /// Whether retrying the same model may succeed.
    ///
    /// Rate limits, timeouts, network drops and 5xx/408 responses are
    /// transient. Everything else (bad credentials, unknown model, 4xx) is
    /// fatal for that model.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 408,
            Self::AuthenticationFailed(_) | Self::ModelNotFound(_) | Self::NotConfigured(_) => {
                false
            }
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Similarity search failed: {0}")]
    Index(String),

    #[error("Document lookup failed: {0}")]
    Repository(String),
}

// --- Pack notation ---

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PackError {
    #[error("Invalid pack configuration '{input}': {reason}")]
    InvalidConfiguration { input: String, reason: String },
}

impl PackError {
    pub fn invalid(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

// --- Query taxonomy ---

/// Pipeline stage of a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStage {
    Start,
    Embedding,
    Retrieval,
    ParseConfig,
    Assemble,
    Generate,
    RecordMemory,
    Done,
    Failed,
}

impl std::fmt::Display for QueryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Embedding => "embedding",
            Self::Retrieval => "retrieval",
            Self::ParseConfig => "parse_config",
            Self::Assemble => "assemble",
            Self::Generate => "generate",
            Self::RecordMemory => "record_memory",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Non-fatal conditions resolved locally by the orchestrator.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryWarning {
    #[error("Invalid pack configuration '{input}': {reason}")]
    InvalidConfiguration { input: String, reason: String },

    #[error(
        "Ambiguous {field}: using {chosen_value} from '{chosen_document}', \
         but '{conflicting_document}' reports {conflicting_value}"
    )]
    AmbiguousData {
        field: String,
        chosen_document: String,
        chosen_value: f64,
        conflicting_document: String,
        conflicting_value: f64,
    },

    #[error("No grounding data found: {reason}")]
    RetrievalEmpty { reason: String },

    #[error(
        "Pack {configuration} requested, but no retrieved document lists both cell voltage and capacity"
    )]
    CellDataUnavailable { configuration: String },
}

impl From<PackError> for QueryWarning {
    fn from(err: PackError) -> Self {
        match err {
            PackError::InvalidConfiguration { input, reason } => {
                Self::InvalidConfiguration { input, reason }
            }
        }
    }
}

/// Terminal failures surfaced to the caller of `query`.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    #[error(
        "All generation models are unavailable after {attempts} attempt(s) across [{}]; please retry later",
        .models_tried.join(", ")
    )]
    GenerationUnavailable {
        models_tried: Vec<String>,
        attempts: u32,
        last_error: Option<GenerationError>,
    },

    #[error("Query cancelled during {stage}")]
    Cancelled { stage: QueryStage },
}
