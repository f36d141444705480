//! `scout-memory` – research memory on a local SQLite substrate.
//!
//! # Modules
//!
//! - [`db`] – [`Database`][db::Database]: one shared connection and the
//!   column helpers every store uses.
//! - [`knowledge_graph`] – [`KnowledgeGraph`][knowledge_graph::KnowledgeGraph]:
//!   topics, sources and the weighted edges between them, with keyword-overlap
//!   topic search and clustering.
//! - [`learning`] – [`LearningEngine`][learning::LearningEngine]: learns
//!   source effectiveness per keyword set and turns it into recommendations
//!   and strategies.
//! - [`memory_system`] –
//!   [`AdvancedMemorySystem`][memory_system::AdvancedMemorySystem]: projects,
//!   results and sessions, wired to the graph and the learning engine.

pub mod db;
pub mod knowledge_graph;
pub mod learning;
pub mod memory_system;

pub use db::{Database, MemoryError};
pub use knowledge_graph::KnowledgeGraph;
pub use learning::LearningEngine;
pub use memory_system::AdvancedMemorySystem;
