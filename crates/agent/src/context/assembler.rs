//! Context assembly: retrieved documents, conversation memory, the pack
//! calculation and the question merged into one prompt under a hard
//! character budget.
//!
//! # Sections (output order)
//!
//! | Section | Source | Trim Strategy |
//! |---------|--------|---------------|
//! | Battery data | Retrieved documents, ranked | Truncated at a field boundary, then lowest-ranked dropped |
//! | Conversation memory | Recent interactions | Oldest interactions dropped |
//! | Pack calculation | Calculator output | Never trimmed |
//! | Question | User query | Never trimmed |
//!
//! Budget is filled in priority order: calculation and question first, then
//! documents, then memory with whatever remains. Sizes are counted in
//! characters.
//!
//! # Determinism
//!
//! Assembly is a pure function of its inputs: identical inputs produce
//! byte-identical prompts.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use voltrag_core::{Interaction, ScoredDocument};

// ── Types ─────────────────────────────────────────────────────────────────

pub const DOCUMENTS_HEADER: &str = "=== BATTERY DATA ===";
pub const MEMORY_HEADER: &str = "=== CONVERSATION MEMORY ===";
pub const CALCULATION_HEADER: &str = "=== PACK CALCULATION ===";
pub const QUERY_HEADER: &str = "=== QUESTION ===";

pub const NO_GROUNDING_DATA: &str =
    "No grounding data found: no battery record matched this question.";
pub const DOCUMENTS_OMITTED: &str =
    "Retrieved battery records were omitted to fit the context budget.";
pub const NO_MEMORY: &str = "No previous interactions.";

/// All inputs required by the assembler for a single prompt.
pub struct AssemblyInput<'a> {
    /// The user's question.
    pub query: &'a str,
    /// Retrieved documents, pre-sorted by relevance (descending).
    pub documents: &'a [ScoredDocument],
    /// Recent interactions in chronological order (oldest first).
    pub memory: &'a [Interaction],
    /// Rendered pack calculation, if one was performed.
    pub calculation: Option<&'a str>,
}

/// The assembled prompt.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    pub prompt: String,
    /// Documents that made it into the prompt, in rank order.
    pub included_document_ids: Vec<String>,
    pub metadata: AssemblyMetadata,
}

/// Detailed metadata about the assembly process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Characters in the assembled prompt.
    pub total_chars: usize,
    /// Configured character budget.
    pub budget: usize,
    /// Budget utilization percentage.
    pub utilization_pct: f32,
    /// The calculation and question alone exceed the budget.
    pub over_budget: bool,
    pub per_layer: Vec<LayerStats>,
    pub drops: Vec<DropInfo>,
}

/// Statistics for a single section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStats {
    pub name: String,
    pub chars: usize,
    pub items_included: usize,
    pub items_total: usize,
}

/// Items removed from a section during budget enforcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropInfo {
    pub layer: String,
    pub items_dropped: usize,
    /// Characters of dropped content, as it would have been rendered.
    pub chars_dropped: usize,
    pub reason: String,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Stateless — create one and reuse it.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    budget: usize,
}

/// Body of the documents section while filling.
enum DocumentsBody<'a> {
    Rendered(&'a [String]),
    Placeholder(&'static str),
}

impl ContextAssembler {
    pub fn new(char_budget: usize) -> Self {
        Self {
            budget: char_budget,
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Assemble the prompt.
    ///
    /// # Algorithm
    ///
    /// 1. Render the mandatory calculation and question sections. If they
    ///    alone exceed the budget they are emitted anyway, without any other
    ///    section, and the result is flagged `over_budget`.
    /// 2. Add documents in rank order while the whole prompt fits. The first
    ///    document that does not fit is cut to its header plus as many whole
    ///    fields as fit (at least one); it and every later document are
    ///    otherwise dropped.
    /// 3. Add memory, most recent first, whole interactions only, until the
    ///    next one does not fit.
    pub fn assemble(&self, input: &AssemblyInput<'_>) -> AssembledContext {
        let mut drops = Vec::new();
        let calculation = input.calculation.map(|c| section(CALCULATION_HEADER, c));
        let question = section(QUERY_HEADER, input.query);

        let mandatory = join_sections(&[calculation.as_deref(), Some(&question)]);
        if char_len(&mandatory) > self.budget {
            warn!(
                budget = self.budget,
                mandatory_chars = char_len(&mandatory),
                "Calculation and question exceed the context budget"
            );
            return self.finish_over_budget(mandatory, input);
        }

        let empty_placeholder = if input.documents.is_empty() {
            NO_GROUNDING_DATA
        } else {
            DOCUMENTS_OMITTED
        };

        let base = self.render(
            DocumentsBody::Placeholder(empty_placeholder),
            &[],
            calculation.as_deref(),
            &question,
        );
        if char_len(&base) > self.budget {
            // Placeholders do not fit; emit the mandatory sections only.
            drops.extend(document_drop(input.documents, 0, "No budget for documents section"));
            drops.extend(memory_drop(input.memory, 0, "No budget for memory section"));
            return self.finish(mandatory, Vec::new(), input, &[], &[], drops, false);
        }

        // ── Documents ─────────────────────────────────────────────────────
        let mut doc_blocks: Vec<String> = Vec::new();
        let mut included_ids = Vec::new();
        for (rank, scored) in input.documents.iter().enumerate() {
            let full = render_document(rank, scored, scored.document.fields.len(), false);
            doc_blocks.push(full);
            if self.fits(&doc_blocks, &[], calculation.as_deref(), &question, empty_placeholder) {
                included_ids.push(scored.document.id.clone());
                continue;
            }
            doc_blocks.pop();

            let mut truncated = None;
            for keep in 1..scored.document.fields.len() {
                doc_blocks.push(render_document(rank, scored, keep, true));
                let fits =
                    self.fits(&doc_blocks, &[], calculation.as_deref(), &question, empty_placeholder);
                let candidate = doc_blocks.pop();
                if !fits {
                    break;
                }
                truncated = candidate;
            }
            if let Some(block) = truncated {
                debug!(document = %scored.document.id, "Document truncated at field boundary");
                doc_blocks.push(block);
                included_ids.push(scored.document.id.clone());
            }
            break;
        }
        drops.extend(document_drop(
            input.documents,
            included_ids.len(),
            "Lowest-relevance documents dropped",
        ));

        // ── Memory (most recent first) ────────────────────────────────────
        let mut memory_blocks: Vec<String> = Vec::new();
        for interaction in input.memory.iter().rev() {
            memory_blocks.push(render_interaction(interaction));
            if !self.fits(
                &doc_blocks,
                &memory_blocks,
                calculation.as_deref(),
                &question,
                empty_placeholder,
            ) {
                memory_blocks.pop();
                break;
            }
        }
        drops.extend(memory_drop(
            input.memory,
            memory_blocks.len(),
            "Oldest interactions dropped",
        ));

        let prompt = self.render(
            documents_body(&doc_blocks, empty_placeholder),
            &memory_blocks,
            calculation.as_deref(),
            &question,
        );
        self.finish(prompt, included_ids, input, &doc_blocks, &memory_blocks, drops, false)
    }

    fn fits(
        &self,
        docs: &[String],
        memory: &[String],
        calculation: Option<&str>,
        question: &str,
        placeholder: &'static str,
    ) -> bool {
        let prompt = self.render(documents_body(docs, placeholder), memory, calculation, question);
        char_len(&prompt) <= self.budget
    }

    fn render(
        &self,
        documents: DocumentsBody<'_>,
        memory: &[String],
        calculation: Option<&str>,
        question: &str,
    ) -> String {
        let documents = match documents {
            DocumentsBody::Rendered(blocks) => section(DOCUMENTS_HEADER, &blocks.join("\n\n")),
            DocumentsBody::Placeholder(text) => section(DOCUMENTS_HEADER, text),
        };
        let memory = if memory.is_empty() {
            section(MEMORY_HEADER, NO_MEMORY)
        } else {
            section(MEMORY_HEADER, &memory.join("\n\n"))
        };
        join_sections(&[Some(&documents), Some(&memory), calculation, Some(question)])
    }

    fn finish_over_budget(&self, prompt: String, input: &AssemblyInput<'_>) -> AssembledContext {
        let mut drops = Vec::new();
        drops.extend(document_drop(input.documents, 0, "Mandatory sections exceed budget"));
        drops.extend(memory_drop(input.memory, 0, "Mandatory sections exceed budget"));
        self.finish(prompt, Vec::new(), input, &[], &[], drops, true)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        prompt: String,
        included_document_ids: Vec<String>,
        input: &AssemblyInput<'_>,
        doc_blocks: &[String],
        memory_blocks: &[String],
        drops: Vec<DropInfo>,
        over_budget: bool,
    ) -> AssembledContext {
        let total_chars = char_len(&prompt);
        let utilization_pct = if self.budget == 0 {
            100.0
        } else {
            (total_chars as f32 / self.budget as f32) * 100.0
        };

        let per_layer = vec![
            LayerStats {
                name: "documents".into(),
                chars: doc_blocks.iter().map(|b| char_len(b)).sum(),
                items_included: included_document_ids.len(),
                items_total: input.documents.len(),
            },
            LayerStats {
                name: "memory".into(),
                chars: memory_blocks.iter().map(|b| char_len(b)).sum(),
                items_included: memory_blocks.len(),
                items_total: input.memory.len(),
            },
            LayerStats {
                name: "calculation".into(),
                chars: input.calculation.map(char_len).unwrap_or(0),
                items_included: usize::from(input.calculation.is_some()),
                items_total: usize::from(input.calculation.is_some()),
            },
            LayerStats {
                name: "query".into(),
                chars: char_len(input.query),
                items_included: 1,
                items_total: 1,
            },
        ];

        debug!(
            total_chars,
            budget = self.budget,
            documents = included_document_ids.len(),
            memory = memory_blocks.len(),
            "Context assembled"
        );

        AssembledContext {
            prompt,
            included_document_ids,
            metadata: AssemblyMetadata {
                total_chars,
                budget: self.budget,
                utilization_pct,
                over_budget,
                per_layer,
                drops,
            },
        }
    }
}

// ── Rendering helpers ─────────────────────────────────────────────────────

fn documents_body<'a>(blocks: &'a [String], placeholder: &'static str) -> DocumentsBody<'a> {
    if blocks.is_empty() {
        DocumentsBody::Placeholder(placeholder)
    } else {
        DocumentsBody::Rendered(blocks)
    }
}

fn section(header: &str, body: &str) -> String {
    format!("{header}\n{body}")
}

fn join_sections(sections: &[Option<&str>]) -> String {
    sections
        .iter()
        .flatten()
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Render a document with its first `fields` fields.
fn render_document(rank: usize, scored: &ScoredDocument, fields: usize, truncated: bool) -> String {
    let mut out = format!(
        "[{}] {} (relevance {:.3}{})",
        rank + 1,
        scored.document.id,
        scored.score,
        if truncated { ", truncated" } else { "" }
    );
    for (key, value) in scored.document.fields.iter().take(fields) {
        out.push('\n');
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
    }
    out
}

fn render_interaction(interaction: &Interaction) -> String {
    format!(
        "[{}] Q: {}\nA: {}",
        interaction.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        interaction.query,
        interaction.response
    )
}

fn document_drop(documents: &[ScoredDocument], included: usize, reason: &str) -> Option<DropInfo> {
    let dropped = documents.len().saturating_sub(included);
    (dropped > 0).then(|| DropInfo {
        layer: "documents".into(),
        items_dropped: dropped,
        chars_dropped: documents[included..]
            .iter()
            .enumerate()
            .map(|(i, d)| char_len(&render_document(included + i, d, d.document.fields.len(), false)))
            .sum(),
        reason: reason.into(),
    })
}

fn memory_drop(memory: &[Interaction], included: usize, reason: &str) -> Option<DropInfo> {
    let dropped = memory.len().saturating_sub(included);
    (dropped > 0).then(|| DropInfo {
        layer: "memory".into(),
        items_dropped: dropped,
        chars_dropped: memory[..dropped]
            .iter()
            .map(|i| char_len(&render_interaction(i)))
            .sum(),
        reason: reason.into(),
    })
}
