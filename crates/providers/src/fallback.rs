//! Generation fallback — per-model retry with exponential backoff, then the
//! next model by priority.
//!
//! For each model, in ascending priority rank:
//! - a transient failure (rate limit, timeout, network, 5xx) is retried on the
//!   same model up to `retry.max_attempts` times, sleeping `base · 2^attempt`
//!   between attempts;
//! - a fatal failure moves on to the next model immediately;
//! - every attempt runs under `retry.attempt_timeout`, and an elapsed timeout
//!   counts as a transient failure.
//!
//! When every model is exhausted the caller receives
//! [`QueryError::GenerationUnavailable`]. Individual failures are only
//! observable through logging and the optional attempt observer.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use voltrag_core::{GenerationError, Generator, ModelProfile, QueryError};

/// A successful generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOutcome {
    pub response_text: String,
    /// Identifier of the model that produced the answer
    pub serving_model: String,
    /// Attempts made across all models, including the successful one
    pub attempts: u32,
}

/// One failed attempt, reported to the observer.
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub model: String,
    /// 1-based attempt number against this model
    pub attempt: u32,
    pub error: GenerationError,
    pub transient: bool,
}

type AttemptObserver = Arc<dyn Fn(&AttemptFailure) + Send + Sync>;

/// Drives a [`Generator`] across an ordered list of model profiles.
pub struct FallbackController {
    generator: Arc<dyn Generator>,
    profiles: Vec<ModelProfile>,
    observer: Option<AttemptObserver>,
}

impl FallbackController {
    /// Profiles are tried in ascending `priority`; equal ranks keep list order.
    pub fn new(generator: Arc<dyn Generator>, mut profiles: Vec<ModelProfile>) -> Self {
        profiles.sort_by_key(|p| p.priority);
        Self {
            generator,
            profiles,
            observer: None,
        }
    }

    /// Register a callback invoked for every failed attempt.
    pub fn with_observer(
        mut self,
        observer: impl Fn(&AttemptFailure) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn profiles(&self) -> &[ModelProfile] {
        &self.profiles
    }

    pub async fn generate(&self, prompt: &str) -> Result<GenerationOutcome, QueryError> {
        let mut attempts = 0u32;
        let mut models_tried = Vec::with_capacity(self.profiles.len());
        let mut last_error = None;

        for profile in &self.profiles {
            models_tried.push(profile.id.clone());
            let max_attempts = profile.retry.max_attempts.max(1);
            let timeout = profile.retry.attempt_timeout();

            for attempt in 0..max_attempts {
                attempts += 1;
                debug!(
                    model = %profile.id,
                    attempt = attempt + 1,
                    max_attempts,
                    "Generation attempt"
                );

                let result =
                    match tokio::time::timeout(timeout, self.generator.generate(&profile.id, prompt))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(GenerationError::Timeout(format!(
                            "Model '{}' timed out after {}ms",
                            profile.id,
                            timeout.as_millis()
                        ))),
                    };

                let error = match result {
                    Ok(response_text) => {
                        info!(model = %profile.id, attempts, "Generation succeeded");
                        return Ok(GenerationOutcome {
                            response_text,
                            serving_model: profile.id.clone(),
                            attempts,
                        });
                    }
                    Err(e) => e,
                };

                let transient = error.is_transient();
                warn!(
                    model = %profile.id,
                    attempt = attempt + 1,
                    max_attempts,
                    transient,
                    error = %error,
                    "Generation attempt failed"
                );
                if let Some(observer) = &self.observer {
                    observer(&AttemptFailure {
                        model: profile.id.clone(),
                        attempt: attempt + 1,
                        error: error.clone(),
                        transient,
                    });
                }
                last_error = Some(error);

                if !transient {
                    info!(model = %profile.id, "Fallback: fatal error, trying next model");
                    break;
                }

                if attempt + 1 < max_attempts {
                    let delay = profile.retry.backoff(attempt);
                    debug!(
                        model = %profile.id,
                        delay_ms = delay.as_millis() as u64,
                        "Backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    info!(model = %profile.id, "Fallback: retries exhausted, trying next model");
                }
            }
        }

        Err(QueryError::GenerationUnavailable {
            models_tried,
            attempts,
            last_error,
        })
    }
}
