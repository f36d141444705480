//! Multi-factor scoring of research results.
//!
//! Every result is rated on five factors, each in `[0.0, 1.0]`:
//!
//! | factor         | signal                                              |
//! |----------------|-----------------------------------------------------|
//! | `relevance`    | query-term hits in title (double weight) and content |
//! | `authority`    | source reputation, boosted by stars / votes          |
//! | `recency`      | age of the content, bucketed                         |
//! | `engagement`   | stars, forks, votes, comments, views                 |
//! | `completeness` | content length and metadata richness                 |
//!
//! The overall score is the weighted sum of the factors using the active
//! methodology's [`ScoringWeights`].
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use scout_scoring::scoring::ScoringSystem;
//! use scout_types::SearchResult;
//!
//! let scorer = ScoringSystem::default();
//! let mut result = SearchResult::new(
//!     "Async Rust runtimes",
//!     "https://example.com/async",
//!     "A comparison of async runtimes for Rust.",
//!     "web",
//! );
//! scorer.apply(&mut result, "rust async", Utc::now());
//! assert!(result.relevance_score > 0.5);
//! assert!(result.breakdown.is_some());
//! ```

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use scout_types::{Metadata, ScoreBreakdown, ScoringWeights, SearchResult};
use serde_json::Value;

/// Recency assigned when a timestamp cannot be interpreted.
pub const UNKNOWN_RECENCY: f64 = 0.5;

/// Engagement assigned to sources without engagement metrics.
const DEFAULT_ENGAGEMENT: f64 = 0.5;

/// Authority assigned to sources missing from the reputation table.
const DEFAULT_AUTHORITY: f64 = 0.5;

fn base_authority(source: &str) -> f64 {
    match source {
        "academic" => 0.95,
        "github" => 0.9,
        "web" => 0.7,
        "reddit" | "blog" => 0.6,
        "youtube" | "forum" => 0.5,
        _ => DEFAULT_AUTHORITY,
    }
}

/// Read a numeric metadata field. Numeric strings are accepted, anything
/// else counts as zero.
pub fn meta_f64(metadata: &Metadata, key: &str) -> f64 {
    match metadata.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// `min(value / scale, 1.0)`, never negative.
fn saturate(value: f64, scale: f64) -> f64 {
    (value / scale).clamp(0.0, 1.0)
}

/// Parse the timestamp formats crawlers commonly emit.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let head: String = raw.chars().take(19).collect();
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&head, fmt) {
            return Some(naive.and_utc());
        }
    }
    let day: String = raw.chars().take(10).collect();
    NaiveDate::parse_from_str(&day, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Scores research results against a query.
#[derive(Debug, Clone, Default)]
pub struct ScoringSystem {
    weights: ScoringWeights,
}

impl ScoringSystem {
    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Keyword-hit relevance of a result to `query`.
    ///
    /// Title hits count double; the combined score is normalised by 3 and
    /// capped at 1.0. An empty query is never relevant.
    pub fn relevance(&self, title: &str, content: &str, query: &str) -> f64 {
        let query = query.to_lowercase();
        let terms: Vec<&str> = query.split_whitespace().collect();
        if terms.is_empty() {
            return 0.0;
        }
        let title = title.to_lowercase();
        let content = content.to_lowercase();
        let n = terms.len() as f64;

        let title_hits = terms.iter().filter(|t| title.contains(*t)).count() as f64;
        let content_hits = terms.iter().filter(|t| content.contains(*t)).count() as f64;

        let title_score = (title_hits / n).min(1.0) * 2.0;
        let content_score = (content_hits / n).min(1.0);
        ((title_score + content_score) / 3.0).min(1.0)
    }

    pub fn authority(&self, source: &str, metadata: &Metadata) -> f64 {
        let base = base_authority(source);
        let boost = match source {
            "github" => {
                saturate(meta_f64(metadata, "stars"), 1000.0) * 0.3
                    + saturate(meta_f64(metadata, "forks"), 100.0) * 0.2
            }
            "reddit" => {
                saturate(meta_f64(metadata, "score"), 100.0) * 0.2
                    + saturate(meta_f64(metadata, "num_comments"), 50.0) * 0.1
            }
            _ => 0.0,
        };
        (base + boost).min(1.0)
    }

    /// Bucketed freshness of content published at `timestamp`, as seen at
    /// `now`. Timestamps in the future count as fresh.
    pub fn recency(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age = now - timestamp;
        if age <= Duration::days(30) {
            1.0
        } else if age <= Duration::days(90) {
            0.8
        } else if age <= Duration::days(365) {
            0.6
        } else if age <= Duration::days(730) {
            0.4
        } else {
            0.2
        }
    }

    /// [`recency`][Self::recency] for a raw timestamp string;
    /// [`UNKNOWN_RECENCY`] when it cannot be parsed.
    pub fn recency_from_str(&self, raw: &str, now: DateTime<Utc>) -> f64 {
        match parse_timestamp(raw) {
            Some(ts) => self.recency(ts, now),
            None => UNKNOWN_RECENCY,
        }
    }

    pub fn engagement(&self, source: &str, metadata: &Metadata) -> f64 {
        match source {
            "github" => {
                saturate(meta_f64(metadata, "stars"), 500.0) * 0.5
                    + saturate(meta_f64(metadata, "forks"), 100.0) * 0.3
                    + saturate(meta_f64(metadata, "watchers"), 50.0) * 0.2
            }
            "reddit" => {
                saturate(meta_f64(metadata, "score"), 50.0) * 0.6
                    + saturate(meta_f64(metadata, "num_comments"), 25.0) * 0.4
            }
            "youtube" => {
                saturate(meta_f64(metadata, "views"), 10_000.0) * 0.7
                    + saturate(meta_f64(metadata, "likes"), 100.0) * 0.3
            }
            _ => DEFAULT_ENGAGEMENT,
        }
    }

    pub fn completeness(&self, content: &str, metadata: &Metadata) -> f64 {
        let length = content.trim().chars().count() as f64;
        let rich_fields = metadata
            .values()
            .filter(|v| match v {
                Value::Null => false,
                Value::String(s) => !s.is_empty(),
                _ => true,
            })
            .count() as f64;
        saturate(length, 1000.0) * 0.7 + saturate(rich_fields, 10.0) * 0.3
    }

    /// Rate `result` against `query` on all five factors.
    pub fn score(&self, result: &SearchResult, query: &str, now: DateTime<Utc>) -> ScoreBreakdown {
        let relevance = self.relevance(&result.title, &result.content, query);
        let authority = self.authority(&result.source, &result.metadata);
        let recency = self.recency(result.timestamp, now);
        let engagement = self.engagement(&result.source, &result.metadata);
        let completeness = self.completeness(&result.content, &result.metadata);

        let w = &self.weights;
        let overall = relevance * w.relevance
            + authority * w.authority
            + recency * w.recency
            + engagement * w.engagement
            + completeness * w.completeness;

        ScoreBreakdown {
            relevance,
            authority,
            recency,
            engagement,
            completeness,
            overall,
        }
    }

    /// Score `result` in place: the breakdown is attached and the overall
    /// score becomes its `relevance_score`.
    pub fn apply(&self, result: &mut SearchResult, query: &str, now: DateTime<Utc>) -> f64 {
        let breakdown = self.score(result, query, now);
        result.relevance_score = breakdown.overall;
        result.breakdown = Some(breakdown);
        breakdown.overall
    }
}
