//! Session memory and in-memory retrieval adapters for voltrag.
//!
//! - [`MemoryManager`] — bounded, chronological record of a session's
//!   recent interactions.
//! - [`InMemoryRepository`] / [`InMemoryIndex`] — reference implementations
//!   of the document repository and similarity index traits.
//! - [`Catalog`] — loads a JSON battery catalog into both.

pub mod catalog;
pub mod in_memory;
pub mod manager;
pub mod vector;

pub use catalog::{Catalog, CatalogError};
pub use in_memory::InMemoryRepository;
pub use manager::MemoryManager;
pub use vector::{InMemoryIndex, cosine_similarity};
