//! Generation and embedding backends for voltrag.
//!
//! Backends implement the `voltrag_core::Generator` and
//! `voltrag_core::Embedder` traits. The [`FallbackController`] drives a
//! generator across the configured model priority list.

pub mod fallback;
pub mod hash_embedder;
pub mod openai_compat;

pub use fallback::{AttemptFailure, FallbackController, GenerationOutcome};
pub use hash_embedder::HashEmbedder;
pub use openai_compat::{OpenAiCompatEmbedder, OpenAiCompatGenerator};
