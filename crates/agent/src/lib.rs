//! The voltrag query pipeline.
//!
//! Each query runs **embed → retrieve → parse/calculate → assemble →
//! generate → record**:
//!
//! 1. **Embed** the question and **retrieve** the top-k battery records
//! 2. **Parse** any `SxPy` pack notation and **calculate** the pack values
//! 3. **Assemble** documents, memory and calculation under a character budget
//! 4. **Generate** the answer with retry and model fallback
//! 5. **Record** the interaction in the session's memory
//!
//! [`Orchestrator`] runs steps 1–4 and is shared; [`Session`] owns the
//! memory and performs step 5.

pub mod context;
pub mod orchestrator;
pub mod pack;
pub mod session;

pub use context::{AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler};
pub use orchestrator::{Orchestrator, PipelineSettings, QueryResult};
pub use pack::{BatteryConfig, CellValues, PackResult};
pub use session::Session;
