#![deny(missing_docs)]
//! # cortex-store — embedded relational persistence (spec §6, component C3)
//!
//! A single SQLite file per project (`store.db`) holds every durable
//! row the orchestration core needs: projects, sessions and their
//! crash-recovery snapshots, retrieval chunks, knowledge entries,
//! cached git history, the execution audit log, and a small blob cache.
//!
//! Grounded on `oldnordic-odincode/databases/src/sqlite.rs`'s
//! `SQLiteManager` — the teacher workspace (`SecBear-neuron`) has no
//! relational store of its own, only in-memory/filesystem key-value
//! backends (`neuron-state-memory`, `neuron-state-fs`), so this crate
//! is enriched from elsewhere in the retrieval pack per the
//! transformation brief.

mod cache;
mod chunk;
mod connection;
mod execution_log;
mod git;
mod knowledge;
mod project;
mod session;

pub use cache::{hash_key, CacheEntry};
pub use chunk::Chunk;
pub use connection::{Store, SCHEMA_VERSION};
pub use execution_log::ExecutionLogEntry;
pub use git::GitCommitRecord;
pub use knowledge::KnowledgeEntry;
pub use project::Project;
pub use session::{Session, SessionSnapshot};
