#![deny(missing_docs)]
//! # cortex-embed — Embeddings Client (spec §4.2, component C2)
//!
//! Computes fixed-dimension vectors for text and compares them by
//! cosine similarity. Retrieval (`cortex-memory`) is the only consumer.
//! Computing a vector is storage-agnostic (`client`, `vector`); caching
//! one is not — [`cached::CachedEmbeddingsClient`] persists through
//! `cortex-store`'s `Cache` table so repeated lookups in the same or a
//! resumed session skip the network round trip entirely.

mod cached;
mod client;
mod vector;

pub use cached::CachedEmbeddingsClient;
pub use client::{pseudo_embedding, EmbeddingOutcome, EmbeddingsClient, HttpEmbeddingsClient};
pub use vector::{cosine_similarity, EmbeddingVector};
