#![deny(missing_docs)]
//! # cortex-memory — Layered Memory Manager (spec §4.4, component C5)
//!
//! Four independent memory layers — ephemeral conversation buffer,
//! embedding-ranked retrieval over indexed project chunks, durable
//! project knowledge, and recent git history — each gathered against
//! its own token budget and composed by [`MemoryManager`] into a single
//! ordered prompt.
//!
//! Grounded on `neuron-context`'s `ContextStrategy` abstraction,
//! generalized from one interchangeable strategy to four layers with
//! genuinely different dependency shapes (store+embeddings for
//! retrieval and git, store-only for knowledge, pure in-memory for
//! ephemeral) unified by [`types::GatherRequest`]/[`types::LayerOutput`]
//! rather than a single object-safe trait.

mod ephemeral;
mod error;
mod git_context;
mod knowledge;
mod manager;
mod retrieval;
mod types;

pub use ephemeral::EphemeralLayer;
pub use error::MemoryError;
pub use git_context::GitContextLayer;
pub use knowledge::KnowledgeLayer;
pub use manager::{ComposedPrompt, MemoryManager};
pub use retrieval::RetrievalLayer;
pub use types::{GatherRequest, LayerOutput, MemoryEvent, Turn, TurnRole, WorkingContext};
