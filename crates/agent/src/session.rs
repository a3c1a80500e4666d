//! Sessions — one conversation with its own short-term memory.
//!
//! A session owns its [`MemoryManager`] outright; the [`Orchestrator`] it
//! queries through is shared. Queries within a session are sequential
//! (`&mut self`), different sessions run in parallel without coordination.

use crate::orchestrator::{Orchestrator, QueryResult};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;
use voltrag_core::{Interaction, QueryError, QueryStage};
use voltrag_memory::MemoryManager;

pub struct Session {
    id: Uuid,
    memory: MemoryManager,
    orchestrator: Arc<Orchestrator>,
}

impl Session {
    /// Start a session keeping up to `memory_window` interactions.
    pub fn new(orchestrator: Arc<Orchestrator>, memory_window: usize) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, memory_window, "Session started");
        Self {
            id,
            memory: MemoryManager::new(memory_window),
            orchestrator,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn query(&mut self, text: &str) -> Result<QueryResult, QueryError> {
        self.query_with_cancel(text, &CancellationToken::new()).await
    }

    /// Answer `text`, giving up as soon as `cancel` fires.
    ///
    /// The interaction is recorded only after generation has completed, with
    /// no await point in between, so a cancelled or dropped query never
    /// touches memory.
    pub async fn query_with_cancel(
        &mut self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        let recent = self.memory.recent(self.memory.capacity());
        let result = self.orchestrator.run(text, &recent, cancel).await?;

        debug!(session = %self.id, stage = %QueryStage::RecordMemory, "Query stage");
        self.memory.record(Interaction::new(
            text,
            result.response_text.as_str(),
            result.retrieved_document_ids.clone(),
        ));
        debug!(session = %self.id, stage = %QueryStage::Done, "Query stage");
        Ok(result)
    }

    /// Recorded interactions, oldest first.
    pub fn history(&self) -> Vec<Interaction> {
        self.memory.recent(self.memory.capacity())
    }

    /// Forget the conversation so far.
    pub fn reset(&mut self) {
        self.memory.clear();
        info!(session = %self.id, "Session memory cleared");
    }
}
