//! Configuration loading, validation, and management for voltrag.
//!
//! Loads configuration from `~/.voltrag/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use voltrag_core::generation::{ModelProfile, RetryPolicy};

/// The root configuration structure.
///
/// Maps directly to `~/.voltrag/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the OpenAI-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Session memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Prompt context configuration
    #[serde(default)]
    pub context: ContextConfig,

    /// Generation models and retry policy
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Embedding backend
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Battery record catalog
    #[serde(default)]
    pub catalog: CatalogConfig,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("retrieval", &self.retrieval)
            .field("memory", &self.memory)
            .field("context", &self.context)
            .field("generation", &self.generation)
            .field("embedding", &self.embedding)
            .field("catalog", &self.catalog)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of documents requested from the similarity index
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Documents scoring below this are not used for grounding
    #[serde(default = "default_min_relevance")]
    pub min_relevance: f32,
}

fn default_top_k() -> usize {
    5
}
fn default_min_relevance() -> f32 {
    0.2
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_relevance: default_min_relevance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Interactions kept per session (0 disables memory)
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,
}

fn default_memory_window() -> usize {
    3
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            memory_window: default_memory_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Hard upper bound, in characters, for the assembled prompt
    #[serde(default = "default_context_char_budget")]
    pub context_char_budget: usize,
}

fn default_context_char_budget() -> usize {
    4000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            context_char_budget: default_context_char_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Model identifiers, tried in this order
    #[serde(default = "default_model_priority")]
    pub model_priority: Vec<String>,

    /// Attempts per model before falling back
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,

    /// Base of the exponential backoff between attempts
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Timeout for a single generation attempt
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_model_priority() -> Vec<String> {
    vec!["gpt-4o-mini".into(), "gpt-3.5-turbo".into()]
}
fn default_retry_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_attempt_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_priority: default_model_priority(),
            retry_max_attempts: default_retry_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl GenerationConfig {
    /// Build the ordered model profiles; priority is the list position.
    pub fn model_profiles(&self) -> Vec<ModelProfile> {
        let retry = RetryPolicy {
            max_attempts: self.retry_max_attempts,
            base_backoff_ms: self.backoff_base_ms,
            attempt_timeout_ms: self.attempt_timeout_secs.saturating_mul(1000),
        };
        self.model_priority
            .iter()
            .enumerate()
            .map(|(i, id)| ModelProfile::new(id, i as u32).with_retry(retry.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "openai" (remote embeddings endpoint) or "hash" (offline, lexical)
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector size for either provider
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_provider() -> String {
    "openai".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_dimensions() -> usize {
    256
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON file with the cleaned battery records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.voltrag/config.toml).
    ///
    /// Also checks environment variables:
    /// - `VOLTRAG_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `VOLTRAG_API_URL`
    /// - `VOLTRAG_MODELS` — comma-separated model priority list
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var("VOLTRAG_API_KEY").or_else(|| {
            if self.api_key.is_none() {
                var("OPENAI_API_KEY")
            } else {
                None
            }
        }) {
            self.api_key = Some(key);
        }

        if let Some(url) = var("VOLTRAG_API_URL") {
            self.api_url = url;
        }

        if let Some(models) = var("VOLTRAG_MODELS") {
            let models: Vec<String> = models
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
            if !models.is_empty() {
                self.generation.model_priority = models;
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".voltrag")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        if !(-1.0..=1.0).contains(&self.retrieval.min_relevance) {
            return Err(ConfigError::ValidationError(
                "retrieval.min_relevance must be between -1.0 and 1.0".into(),
            ));
        }

        if self.context.context_char_budget == 0 {
            return Err(ConfigError::ValidationError(
                "context.context_char_budget must be greater than 0".into(),
            ));
        }

        if self.generation.model_priority.is_empty() {
            return Err(ConfigError::ValidationError(
                "generation.model_priority must list at least one model".into(),
            ));
        }

        if self.generation.retry_max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "generation.retry_max_attempts must be at least 1".into(),
            ));
        }

        if self.generation.temperature < 0.0 || self.generation.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !matches!(self.embedding.provider.as_str(), "openai" | "hash") {
            return Err(ConfigError::ValidationError(format!(
                "embedding.provider must be \"openai\" or \"hash\", got \"{}\"",
                self.embedding.provider
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.dimensions must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            retrieval: RetrievalConfig::default(),
            memory: MemoryConfig::default(),
            context: ContextConfig::default(),
            generation: GenerationConfig::default(),
            embedding: EmbeddingConfig::default(),
            catalog: CatalogConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.memory.memory_window, 3);
        assert_eq!(config.context.context_char_budget, 4000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.generation.model_priority, config.generation.model_priority);
        assert_eq!(parsed.retrieval.top_k, config.retrieval.top_k);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[generation]
model_priority = ["primary", "backup"]
retry_max_attempts = 2

[memory]
memory_window = 0
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.generation.model_priority, vec!["primary", "backup"]);
        assert_eq!(config.generation.retry_max_attempts, 2);
        assert_eq!(config.generation.backoff_base_ms, 500);
        assert_eq!(config.memory.memory_window, 0);
        assert_eq!(config.context.context_char_budget, 4000);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[retrieval\ntop_k = ").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().retrieval.top_k, 5);
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = AppConfig::default();
        config.generation.retry_max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_model_list_rejected() {
        let mut config = AppConfig::default();
        config.generation.model_priority.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_embedding_provider_rejected() {
        let mut config = AppConfig::default();
        config.embedding.provider = "word2vec".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn model_profiles_follow_priority_order() {
        let config = GenerationConfig {
            model_priority: vec!["a".into(), "b".into()],
            retry_max_attempts: 4,
            backoff_base_ms: 250,
            attempt_timeout_secs: 5,
            ..GenerationConfig::default()
        };
        let profiles = config.model_profiles();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].id, "a");
        assert_eq!(profiles[0].priority, 0);
        assert_eq!(profiles[1].priority, 1);
        assert_eq!(profiles[1].retry.max_attempts, 4);
        assert_eq!(profiles[1].retry.base_backoff_ms, 250);
        assert_eq!(profiles[1].retry.attempt_timeout_ms, 5_000);
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-openai"),
            ("VOLTRAG_MODELS", "m1, m2 ,,m3"),
            ("VOLTRAG_API_URL", "http://localhost:11434/v1"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.generation.model_priority, vec!["m1", "m2", "m3"]);
        assert_eq!(config.api_url, "http://localhost:11434/v1");
    }

    #[test]
    fn voltrag_key_wins_over_file_and_openai() {
        let env: HashMap<&str, &str> =
            HashMap::from([("VOLTRAG_API_KEY", "sk-voltrag"), ("OPENAI_API_KEY", "sk-openai")]);
        let mut config = AppConfig {
            api_key: Some("sk-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-voltrag"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("context_char_budget = 4000"));
    }
}
