//! Budget-constrained prompt assembly.
//!
//! Merges four labelled sections (battery data, conversation memory, pack
//! calculation, question) into one prompt that never exceeds the configured
//! character budget, except when the calculation and question alone do.

pub mod assembler;

pub use assembler::{
    AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler, DropInfo, LayerStats,
};
