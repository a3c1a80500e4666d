//! End-to-end session tests over the in-memory adapters.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use voltrag_agent::context::assembler::{CALCULATION_HEADER, NO_GROUNDING_DATA};
use voltrag_agent::{Orchestrator, PipelineSettings, QueryResult, Session};
use voltrag_core::{
    CollaboratorError, Document, DocumentRepository, Embedder, GenerationError, Generator,
    ModelProfile, QueryError, QueryStage, QueryWarning, RetryPolicy, SimilarityIndex,
};
use voltrag_memory::Catalog;
use voltrag_providers::{FallbackController, HashEmbedder};

// ── Test doubles ──────────────────────────────────────────────────────────

/// Answers every prompt and keeps a copy of it.
#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, _model_id: &str, prompt: &str) -> Result<String, GenerationError> {
        let mut prompts = self.prompts.lock().unwrap();
        prompts.push(prompt.to_string());
        Ok(format!("answer {}", prompts.len()))
    }
}

/// Signals when called, then never completes.
struct HangingGenerator {
    started: Arc<Notify>,
}

#[async_trait]
impl Generator for HangingGenerator {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn generate(&self, _model_id: &str, _prompt: &str) -> Result<String, GenerationError> {
        self.started.notify_one();
        std::future::pending::<()>().await;
        Ok(String::new())
    }
}

struct UnavailableGenerator;

#[async_trait]
impl Generator for UnavailableGenerator {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn generate(&self, _model_id: &str, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::RateLimited {
            retry_after_secs: Some(1),
        })
    }
}

struct BrokenEmbedder;

#[async_trait]
impl Embedder for BrokenEmbedder {
    fn dimensions(&self) -> usize {
        64
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, CollaboratorError> {
        Err(CollaboratorError::Embedding("connection refused".into()))
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────

fn catalog_documents() -> Vec<Document> {
    vec![
        Document::new("samsung-25r")
            .with_field("Manufacturer", "Samsung")
            .with_field("Model", "INR18650-25R")
            .with_field("Nominal Voltage (V)", "3.7")
            .with_field("Capacity (mAh)", "2500"),
        Document::new("daly-bms-4s")
            .with_field("Manufacturer", "Daly")
            .with_field("Model", "BMS 4S 40A")
            .with_field("Type", "Battery management system"),
    ]
}

fn settings() -> PipelineSettings {
    PipelineSettings {
        top_k: 5,
        min_relevance: -1.0,
        context_char_budget: 4000,
    }
}

fn profiles() -> Vec<ModelProfile> {
    vec![
        ModelProfile::new("primary", 0).with_retry(RetryPolicy {
            max_attempts: 2,
            base_backoff_ms: 10,
            attempt_timeout_ms: 5_000,
        }),
        ModelProfile::new("backup", 1).with_retry(RetryPolicy {
            max_attempts: 1,
            base_backoff_ms: 10,
            attempt_timeout_ms: 5_000,
        }),
    ]
}

async fn orchestrator(
    generator: Arc<dyn Generator>,
    query_embedder: Arc<dyn Embedder>,
) -> Arc<Orchestrator> {
    let catalog = Catalog::from_documents(catalog_documents(), &HashEmbedder::new(64))
        .await
        .unwrap();
    let index: Arc<dyn SimilarityIndex> = Arc::new(catalog.index);
    let repository: Arc<dyn DocumentRepository> = Arc::new(catalog.repository);

    Arc::new(Orchestrator::new(
        query_embedder,
        index,
        repository,
        FallbackController::new(generator, profiles()),
        settings(),
    ))
}

fn hash_embedder() -> Arc<dyn Embedder> {
    Arc::new(HashEmbedder::new(64))
}

// ── Tests ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pack_question_is_calculated_and_recorded() {
    let generator = Arc::new(RecordingGenerator::default());
    let mut session = Session::new(orchestrator(generator.clone(), hash_embedder()).await, 3);

    let result = session
        .query("What is the energy of a 2S3P pack of Samsung 25R cells?")
        .await
        .unwrap();

    let block = result.calculation_block.as_deref().unwrap();
    assert!(block.contains("packVoltage = 3.7V × 2 = 7.4V"));
    assert!(block.contains("packCapacity = 2.5Ah × 3 = 7.5Ah"));
    assert!(block.contains("packEnergy = 7.4V × 7.5Ah = 55.5Wh"));
    assert_eq!(result.serving_model, "primary");
    assert_eq!(result.attempts, 1);
    assert_eq!(result.response_text, "answer 1");
    assert!(result.retrieved_document_ids.contains(&"samsung-25r".to_string()));
    assert!(result.warnings.is_empty());

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains(CALCULATION_HEADER));
    assert!(prompt.contains("Model: INR18650-25R"));

    let history = session.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].response, "answer 1");
    assert_eq!(history[0].document_ids, result.retrieved_document_ids);
}

#[tokio::test]
async fn memory_feeds_the_next_prompt() {
    let generator = Arc::new(RecordingGenerator::default());
    let mut session = Session::new(orchestrator(generator.clone(), hash_embedder()).await, 3);

    session.query("Tell me about the Samsung 25R").await.unwrap();
    session.query("And its capacity?").await.unwrap();

    let prompts = generator.prompts();
    assert!(!prompts[0].contains("Q: Tell me about the Samsung 25R"));
    assert!(prompts[1].contains("Q: Tell me about the Samsung 25R"));
    assert!(prompts[1].contains("A: answer 1"));
}

#[tokio::test]
async fn memory_window_bounds_history() {
    let generator = Arc::new(RecordingGenerator::default());
    let mut session = Session::new(orchestrator(generator, hash_embedder()).await, 2);

    for q in ["one", "two", "three"] {
        session.query(q).await.unwrap();
    }
    let history: Vec<String> = session.history().into_iter().map(|i| i.query).collect();
    assert_eq!(history, vec!["two", "three"]);

    session.reset();
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn embedding_failure_still_answers_without_grounding() {
    let generator = Arc::new(RecordingGenerator::default());
    let orchestrator = orchestrator(generator.clone(), Arc::new(BrokenEmbedder)).await;
    let mut session = Session::new(orchestrator, 3);

    let result = session.query("Which cell has the highest capacity?").await.unwrap();

    assert!(result.retrieved_document_ids.is_empty());
    assert!(matches!(
        result.warnings.as_slice(),
        [QueryWarning::RetrievalEmpty { reason }] if reason.contains("connection refused")
    ));
    assert!(generator.prompts()[0].contains(NO_GROUNDING_DATA));
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn nothing_above_threshold_is_retrieval_empty() {
    let generator = Arc::new(RecordingGenerator::default());
    let catalog = Catalog::from_documents(catalog_documents(), &HashEmbedder::new(64))
        .await
        .unwrap();
    let orchestrator = Arc::new(Orchestrator::new(
        hash_embedder(),
        Arc::new(catalog.index),
        Arc::new(catalog.repository),
        FallbackController::new(generator.clone(), profiles()),
        PipelineSettings {
            min_relevance: 1.5,
            ..settings()
        },
    ));
    let mut session = Session::new(orchestrator, 3);

    let result = session.query("What is the energy of a 2S pack?").await.unwrap();

    assert!(result.retrieved_document_ids.is_empty());
    assert!(result.calculation_block.is_none());
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, QueryWarning::RetrievalEmpty { .. })));
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, QueryWarning::CellDataUnavailable { configuration } if configuration == "2S1P")));
    assert!(generator.prompts()[0].contains(NO_GROUNDING_DATA));
}

#[tokio::test]
async fn malformed_notation_is_a_warning() {
    let generator = Arc::new(RecordingGenerator::default());
    let mut session = Session::new(orchestrator(generator.clone(), hash_embedder()).await, 3);

    let result = session.query("How much energy in a 2S0P Samsung pack?").await.unwrap();

    assert!(result.calculation_block.is_none());
    assert!(matches!(
        result.warnings.as_slice(),
        [QueryWarning::InvalidConfiguration { input, .. }] if input == "2S0P"
    ));
    assert!(!generator.prompts()[0].contains(CALCULATION_HEADER));
}

#[tokio::test(start_paused = true)]
async fn exhausted_generation_is_terminal_and_not_recorded() {
    let orchestrator = orchestrator(Arc::new(UnavailableGenerator), hash_embedder()).await;
    let mut session = Session::new(orchestrator, 3);

    let err = session.query("Samsung 25R voltage?").await.unwrap_err();
    assert!(err.to_string().contains("please retry later"));
    match err {
        QueryError::GenerationUnavailable {
            models_tried,
            attempts,
            ..
        } => {
            assert_eq!(models_tried, vec!["primary", "backup"]);
            assert_eq!(attempts, 3);
        }
        other => panic!("Expected GenerationUnavailable, got: {other:?}"),
    }
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn cancellation_during_generation_leaves_memory_unchanged() {
    let started = Arc::new(Notify::new());
    let generator = Arc::new(HangingGenerator {
        started: started.clone(),
    });
    let mut session = Session::new(orchestrator(generator, hash_embedder()).await, 3);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        started.notified().await;
        trigger.cancel();
    });

    let err = session
        .query_with_cancel("2S3P Samsung 25R pack energy?", &cancel)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        QueryError::Cancelled {
            stage: QueryStage::Generate
        }
    ));
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn cancelled_before_start_does_nothing() {
    let generator = Arc::new(RecordingGenerator::default());
    let mut session = Session::new(orchestrator(generator.clone(), hash_embedder()).await, 3);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = session.query_with_cancel("anything", &cancel).await.unwrap_err();

    assert!(matches!(
        err,
        QueryError::Cancelled {
            stage: QueryStage::Start
        }
    ));
    assert!(generator.prompts().is_empty());
    assert!(session.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropped_query_future_leaves_memory_unchanged() {
    let generator = Arc::new(HangingGenerator {
        started: Arc::new(Notify::new()),
    });
    let mut session = Session::new(orchestrator(generator, hash_embedder()).await, 3);

    let outcome =
        tokio::time::timeout(Duration::from_secs(1), session.query("Samsung 25R capacity?")).await;
    assert!(outcome.is_err());
    assert!(session.history().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sessions_run_concurrently_with_independent_memory() {
    let generator = Arc::new(RecordingGenerator::default());
    let shared = orchestrator(generator.clone(), hash_embedder()).await;

    let tasks: Vec<_> = ["alpha", "beta"]
        .into_iter()
        .map(|name| {
            let orchestrator = shared.clone();
            tokio::spawn(async move {
                let mut session = Session::new(orchestrator, 5);
                let mut results: Vec<QueryResult> = Vec::new();
                for i in 0..3 {
                    results.push(session.query(&format!("{name} question {i}")).await.unwrap());
                }
                (name, session.history(), results)
            })
        })
        .collect();

    for task in tasks {
        let (name, history, results) = task.await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|i| i.query.starts_with(name)));
    }
    assert_eq!(generator.prompts().len(), 6);
}

#[tokio::test]
async fn query_result_serializes_to_json() {
    let generator = Arc::new(RecordingGenerator::default());
    let mut session = Session::new(orchestrator(generator, hash_embedder()).await, 3);

    let result = session.query("2S0P?").await.unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["serving_model"], "primary");
    assert_eq!(json["warnings"][0]["kind"], "invalid_configuration");
    assert!(json.get("calculation_block").is_none());
}

#[tokio::test]
async fn cell_plurals_do_not_trigger_a_calculation() {
    let generator = Arc::new(RecordingGenerator::default());
    let mut session = Session::new(orchestrator(generator.clone(), hash_embedder()).await, 3);

    let result = session
        .query("How many 18650s can discharge for 30s at 10A?")
        .await
        .unwrap();

    assert!(result.calculation_block.is_none());
    assert!(result.warnings.is_empty());
    assert!(!generator.prompts()[0].contains(CALCULATION_HEADER));
}
