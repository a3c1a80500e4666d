//! Wiring shared by `chat` and `ask`: config, catalog, backends, orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use voltrag_agent::{Orchestrator, PipelineSettings};
use voltrag_config::AppConfig;
use voltrag_core::{DocumentRepository, Embedder, Generator, SimilarityIndex};
use voltrag_memory::Catalog;
use voltrag_providers::{
    AttemptFailure, FallbackController, HashEmbedder, OpenAiCompatEmbedder, OpenAiCompatGenerator,
};

pub struct Runtime {
    pub config: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub documents: usize,
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    Ok(config.map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Build the orchestrator described by the config. A `catalog` path given on
/// the command line wins over `catalog.path`.
pub async fn build(
    config_path: Option<&Path>,
    catalog: Option<PathBuf>,
) -> Result<Runtime, Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    let Some(api_key) = config.api_key.clone().filter(|k| !k.is_empty()) else {
        print_missing_key_help();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let embedder: Arc<dyn Embedder> = match config.embedding.provider.as_str() {
        "hash" => Arc::new(HashEmbedder::new(config.embedding.dimensions)),
        _ => Arc::new(OpenAiCompatEmbedder::new(
            &config.api_url,
            &api_key,
            &config.embedding.model,
            config.embedding.dimensions,
        )),
    };

    let catalog_path = catalog.or_else(|| config.catalog.path.as_ref().map(PathBuf::from));
    let catalog = match &catalog_path {
        Some(path) => Catalog::load(path, embedder.as_ref())
            .await
            .map_err(|e| format!("Failed to load catalog: {e}"))?,
        None => {
            warn!("No battery catalog configured; answers will have no grounding data");
            Catalog::from_documents(Vec::new(), embedder.as_ref()).await?
        }
    };
    let documents = catalog.repository.len();

    let generator: Arc<dyn Generator> = Arc::new(
        OpenAiCompatGenerator::new("openai-compat", &config.api_url, api_key)
            .with_temperature(config.generation.temperature)
            .with_max_tokens(config.generation.max_tokens),
    );
    let fallback = FallbackController::new(generator, config.generation.model_profiles())
        .with_observer(|failure: &AttemptFailure| {
            info!(
                model = %failure.model,
                attempt = failure.attempt,
                transient = failure.transient,
                "Generation attempt failed"
            );
        });

    let index: Arc<dyn SimilarityIndex> = Arc::new(catalog.index);
    let repository: Arc<dyn DocumentRepository> = Arc::new(catalog.repository);
    let orchestrator = Arc::new(Orchestrator::new(
        embedder,
        index,
        repository,
        fallback,
        PipelineSettings::from_config(&config),
    ));

    Ok(Runtime {
        config,
        orchestrator,
        documents,
    })
}

fn print_missing_key_help() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    VOLTRAG_API_KEY = 'sk-...'   (recommended)");
    eprintln!("    OPENAI_API_KEY  = 'sk-...'   (for OpenAI direct)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    eprintln!("  Any OpenAI-compatible endpoint works; point VOLTRAG_API_URL at it.");
    eprintln!();
}
