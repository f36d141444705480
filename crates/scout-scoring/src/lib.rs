//! `scout-scoring` – Ranking and analysis of research results.
//!
//! # Modules
//!
//! - [`scoring`] – [`ScoringSystem`][scoring::ScoringSystem]: rates every
//!   result on relevance, authority, recency, engagement and completeness and
//!   combines them with the active methodology's weights.
//! - [`dataset`] – [`DatasetManager`][dataset::DatasetManager]: assembles a
//!   project's scored results into a dataset with per-dimension rankings and
//!   headline insights, and saves it as JSON.
//! - [`report`] – summaries, source/quality distributions and project-level
//!   recommendations.
//! - [`methodology`] – [`ConfigurationManager`][methodology::ConfigurationManager]:
//!   the `sources.toml` / `methodologies.toml` configuration directory.

pub mod dataset;
pub mod methodology;
pub mod report;
pub mod scoring;

pub use dataset::{ComprehensiveDataset, DatasetError, DatasetManager};
pub use methodology::{ConfigError, ConfigurationManager, default_methodology};
pub use scoring::ScoringSystem;
