#![deny(missing_docs)]
//! # cortex-core — shared protocol types for the orchestration core
//!
//! Foundational types and traits used across every component of the
//! assistant: the universal [`Content`] wire type, typed identifiers,
//! the error taxonomy (spec §7), the observer/event interface backing
//! the orchestrator's event stream (spec §4.8), and a minimal scoped
//! key/value trait for the `memory` tool.
//!
//! Nothing in this crate talks to a database, an LLM, or the filesystem
//! — it is the vocabulary the other crates share.

pub mod content;
pub mod duration;
pub mod error;
pub mod hook;
pub mod ids;
pub mod state;

pub use content::{Content, ContentBlock};
pub use duration::DurationMs;
pub use hook::{Event, EventKind, Observer, ObserverRegistry};
pub use ids::{ChunkId, ProjectId, SessionId, TaskId};
pub use state::{Scope, StateError, StateStore};
