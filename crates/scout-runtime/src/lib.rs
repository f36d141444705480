//! `scout-runtime` – runs research.
//!
//! # Modules
//!
//! - [`adapter`] – the [`SearchAdapter`][adapter::SearchAdapter] seam and the
//!   crawl-export [`JsonFileAdapter`][adapter::JsonFileAdapter].
//! - [`rate_limit`] – [`SourceRateLimiter`][rate_limit::SourceRateLimiter]:
//!   per-source request pacing from the source configuration.
//! - [`researcher`] – [`Researcher`][researcher::Researcher]: research,
//!   enrichment and insight reports over memory, scoring and datasets.
//! - [`telemetry`] – `tracing` subscriber and optional OTLP export.

pub mod adapter;
pub mod rate_limit;
pub mod researcher;
pub mod telemetry;

pub use adapter::{JsonFileAdapter, SearchAdapter};
pub use rate_limit::SourceRateLimiter;
pub use researcher::{ResearchError, ResearchRequest, Researcher};
