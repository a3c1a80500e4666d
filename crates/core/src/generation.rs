//! Generator trait — the abstraction over text-generation backends.
//!
//! A Generator turns an assembled prompt into answer text for a named model.
//! Failures are classified (see [`GenerationError::is_transient`]) so the
//! fallback controller can decide between retrying and moving on.
//!
//! Implementations: OpenAI-compatible HTTP endpoints, scripted test doubles.

use crate::error::GenerationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The core Generator trait.
///
/// The orchestrator calls `generate()` without knowing which backend is
/// serving the request.
#[async_trait]
pub trait Generator: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai", "mock").
    fn name(&self) -> &str;

    /// Generate an answer for `prompt` using model `model_id`.
    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String, GenerationError>;
}

/// Per-model retry behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts against the model before moving on (≥ 1)
    pub max_attempts: u32,

    /// Backoff before the second attempt; doubles on every retry
    pub base_backoff_ms: u64,

    /// Upper bound for a single attempt
    pub attempt_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
            attempt_timeout_ms: 60_000,
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt with zero-based index `attempt`:
    /// `base · 2^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor))
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

/// A model the fallback controller may use, with its rank and retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Model identifier passed to the generator (e.g. "gpt-4o-mini")
    pub id: String,

    /// Lower rank is tried first
    pub priority: u32,

    #[serde(default)]
    pub retry: RetryPolicy,
}

impl ModelProfile {
    pub fn new(id: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            priority,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
