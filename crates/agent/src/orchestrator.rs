//! Query orchestration — the pipeline behind every session query.
//!
//! ```text
//! Start → Embedding → Retrieval → ParseConfig → Assemble → Generate → Done
//! ```
//!
//! The orchestrator is the only component that sees every collaborator, and
//! the only error boundary: embedding, index and repository failures are
//! downgraded to a [`QueryWarning::RetrievalEmpty`] and the query is still
//! answered; malformed pack notation becomes a warning; only exhausted
//! generation and cancellation end a query without an answer.
//!
//! It holds no per-session state and is shared between sessions behind an
//! `Arc`. Recording memory is left to the session, after `run` returns.

use crate::context::{AssemblyInput, ContextAssembler};
use crate::pack::{self, PackResult};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voltrag_config::AppConfig;
use voltrag_core::{
    DocumentRepository, Embedder, Interaction, QueryError, QueryStage, QueryWarning,
    ScoredDocument, SimilarityIndex,
};
use voltrag_providers::FallbackController;

/// Pipeline options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Documents requested from the similarity index
    pub top_k: usize,
    /// Minimum score for a document to ground the answer
    pub min_relevance: f32,
    /// Hard prompt size limit, in characters
    pub context_char_budget: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_relevance: 0.2,
            context_char_budget: 4000,
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            min_relevance: config.retrieval.min_relevance,
            context_char_budget: config.context.context_char_budget,
        }
    }
}

/// The answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub response_text: String,
    /// Documents that cleared the relevance threshold, in rank order
    pub retrieved_document_ids: Vec<String>,
    /// Rendered pack calculation, when the query named a configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation_block: Option<String>,
    pub serving_model: String,
    #[serde(default)]
    pub warnings: Vec<QueryWarning>,
    /// Generation attempts across all models
    pub attempts: u32,
}

/// Shared, stateless query pipeline.
pub struct Orchestrator {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn SimilarityIndex>,
    repository: Arc<dyn DocumentRepository>,
    fallback: FallbackController,
    assembler: ContextAssembler,
    settings: PipelineSettings,
}

impl Orchestrator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn SimilarityIndex>,
        repository: Arc<dyn DocumentRepository>,
        fallback: FallbackController,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder,
            index,
            repository,
            fallback,
            assembler: ContextAssembler::new(settings.context_char_budget),
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run the pipeline for `query` with the session's recent interactions.
    ///
    /// Every await point races `cancel`; a cancelled query reports the stage
    /// it was in and leaves no trace.
    pub async fn run(
        &self,
        query: &str,
        memory: &[Interaction],
        cancel: &CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        let mut warnings = Vec::new();

        enter(QueryStage::Start);
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled {
                stage: QueryStage::Start,
            });
        }

        // ── Embedding + Retrieval ──────────────────────────────────────────
        let documents = self.retrieve(query, cancel, &mut warnings).await?;
        let retrieved_document_ids: Vec<String> =
            documents.iter().map(|d| d.document.id.clone()).collect();

        // ── ParseConfig ────────────────────────────────────────────────────
        enter(QueryStage::ParseConfig);
        let calculation_block = self.calculate_pack(query, &documents, &mut warnings);

        // ── Assemble ───────────────────────────────────────────────────────
        enter(QueryStage::Assemble);
        let context = self.assembler.assemble(&AssemblyInput {
            query,
            documents: &documents,
            memory,
            calculation: calculation_block.as_deref(),
        });
        debug!(
            chars = context.metadata.total_chars,
            budget = context.metadata.budget,
            drops = context.metadata.drops.len(),
            "Prompt assembled"
        );

        // ── Generate ───────────────────────────────────────────────────────
        enter(QueryStage::Generate);
        let outcome = guarded(
            cancel,
            QueryStage::Generate,
            self.fallback.generate(&context.prompt),
        )
        .await?
        .inspect_err(|e| warn!(stage = %QueryStage::Failed, error = %e, "Query failed"))?;

        info!(
            model = %outcome.serving_model,
            attempts = outcome.attempts,
            documents = retrieved_document_ids.len(),
            warnings = warnings.len(),
            "Query answered"
        );

        Ok(QueryResult {
            response_text: outcome.response_text,
            retrieved_document_ids,
            calculation_block,
            serving_model: outcome.serving_model,
            warnings,
            attempts: outcome.attempts,
        })
    }

    /// Embed the query, search the index and fetch the documents that clear
    /// the relevance threshold. Collaborator failures become warnings.
    async fn retrieve(
        &self,
        query: &str,
        cancel: &CancellationToken,
        warnings: &mut Vec<QueryWarning>,
    ) -> Result<Vec<ScoredDocument>, QueryError> {
        enter(QueryStage::Embedding);
        let vector = match guarded(cancel, QueryStage::Embedding, self.embedder.embed(query)).await? {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Embedding failed, answering without grounding data");
                warnings.push(QueryWarning::RetrievalEmpty {
                    reason: e.to_string(),
                });
                return Ok(Vec::new());
            }
        };

        enter(QueryStage::Retrieval);
        let hits = match guarded(
            cancel,
            QueryStage::Retrieval,
            self.index.search(&vector, self.settings.top_k),
        )
        .await?
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Similarity search failed, answering without grounding data");
                warnings.push(QueryWarning::RetrievalEmpty {
                    reason: e.to_string(),
                });
                return Ok(Vec::new());
            }
        };

        let relevant: Vec<_> = hits
            .into_iter()
            .take(self.settings.top_k)
            .filter(|hit| hit.score >= self.settings.min_relevance)
            .collect();

        let lookups = join_all(relevant.iter().map(|hit| self.repository.get_document(&hit.id)));
        let fetched = guarded(cancel, QueryStage::Retrieval, lookups).await?;

        let mut documents = Vec::with_capacity(relevant.len());
        for (hit, lookup) in relevant.into_iter().zip(fetched) {
            match lookup {
                Ok(Some(document)) => documents.push(ScoredDocument {
                    document,
                    score: hit.score,
                }),
                Ok(None) => warn!(document = %hit.id, "Indexed document missing from repository"),
                Err(e) => warn!(document = %hit.id, error = %e, "Document lookup failed"),
            }
        }

        debug!(documents = documents.len(), top_k = self.settings.top_k, "Retrieval complete");

        if documents.is_empty() {
            warnings.push(QueryWarning::RetrievalEmpty {
                reason: format!(
                    "no battery record reached the relevance threshold of {}",
                    self.settings.min_relevance
                ),
            });
        }
        Ok(documents)
    }

    /// Detect pack notation in the query and compute the pack, returning the
    /// rendered calculation block.
    fn calculate_pack(
        &self,
        query: &str,
        documents: &[ScoredDocument],
        warnings: &mut Vec<QueryWarning>,
    ) -> Option<String> {
        let config = match pack::detect(query)? {
            Ok(config) => config,
            Err(e) => {
                debug!(error = %e, "Pack notation rejected");
                warnings.push(e.into());
                return None;
            }
        };

        let (resolved, ambiguity) = pack::resolve_cell_values(documents);
        warnings.extend(ambiguity);

        let Some(resolved) = resolved else {
            warnings.push(QueryWarning::CellDataUnavailable {
                configuration: config.to_string(),
            });
            return None;
        };

        let result: PackResult = pack::calculate(config, resolved.values);
        debug!(
            configuration = %config,
            source = %resolved.source_document,
            pack_voltage = result.pack_voltage,
            pack_energy_wh = result.pack_energy_wh,
            "Pack calculated"
        );
        Some(result.render(&resolved.source_document))
    }
}

fn enter(stage: QueryStage) {
    debug!(stage = %stage, "Query stage");
}

/// Race `fut` against cancellation.
async fn guarded<F: Future>(
    cancel: &CancellationToken,
    stage: QueryStage,
    fut: F,
) -> Result<F::Output, QueryError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!(stage = %stage, "Query cancelled");
            Err(QueryError::Cancelled { stage })
        }
        output = fut => Ok(output),
    }
}
