//! # voltrag Core
//!
//! Domain types, collaborator traits, and error definitions for the voltrag
//! battery question-answering pipeline. This crate has **no framework
//! dependencies**: it fixes the contracts that every other crate implements
//! against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (embedding model, similarity index, document
//! repository, generation backend) is a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping backends via configuration
//! - Easy testing with scripted mock collaborators
//! - Clean dependency graph (all crates depend inward on core)

pub mod document;
pub mod error;
pub mod generation;
pub mod interaction;
pub mod retrieval;

// Re-export key types at crate root for ergonomics
pub use document::{CellSpec, Document, ScoredDocument};
pub use error::{
    CollaboratorError, GenerationError, PackError, QueryError, QueryStage, QueryWarning,
};
pub use generation::{Generator, ModelProfile, RetryPolicy};
pub use interaction::Interaction;
pub use retrieval::{DocumentRepository, Embedder, ScoredId, SimilarityIndex};
