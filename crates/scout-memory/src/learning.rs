//! Learns which sources work for which kinds of query.
//!
//! # Storage layout
//!
//! | table                 | purpose                                              |
//! |-----------------------|------------------------------------------------------|
//! | `search_patterns`     | one row per keyword set (sorted keywords joined `_`) |
//! | `learning_insights`   | observations with a confidence and a `subject`       |
//! | `research_strategies` | strategies derived from confident recommendations    |
//! | `performance_metrics` | raw per-source numbers of every analysed search      |
//!
//! A pattern's `success_rate` is the running mean of the average relevance
//! seen for its keyword set and `effectiveness_score` is that rate times the
//! result count of the latest update.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Transaction, params};
use scout_types::{SearchResult, query_keywords, short_id};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::db::{Database, MemoryError, count, json_col, ts, ts_col};
use crate::knowledge_graph::keyword_similarity;

/// Minimum keyword similarity for a pattern to inform recommendations.
const PATTERN_SIMILARITY: f64 = 0.3;
/// Recommendations below this confidence do not produce a strategy.
pub const STRATEGY_CONFIDENCE: f64 = 0.3;
const SOURCE_BOOST: f64 = 1.2;
const SIMPLIFY_QUERY: &str = "Consider simplifying the query for better results";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPattern {
    pub pattern_id: String,
    pub keywords: Vec<String>,
    pub successful_sources: Vec<String>,
    pub optimal_parameters: Value,
    pub success_rate: f64,
    pub usage_count: u64,
    pub last_used: DateTime<Utc>,
    pub effectiveness_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    SourceEffectiveness,
    QueryComplexity,
}

impl InsightKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightKind::SourceEffectiveness => "source_effectiveness",
            InsightKind::QueryComplexity => "query_complexity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "source_effectiveness" => Some(InsightKind::SourceEffectiveness),
            "query_complexity" => Some(InsightKind::QueryComplexity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningInsight {
    pub insight_id: String,
    pub kind: InsightKind,
    /// The entity the insight is about, e.g. the better-performing source.
    pub subject: Option<String>,
    pub description: String,
    pub confidence: f64,
    pub supporting_evidence: Vec<String>,
    pub applications: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Advice for a query derived from learned patterns and insights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recommendations {
    /// Normalised source votes in `[0, 1]`.
    pub source_priorities: BTreeMap<String, f64>,
    pub query_suggestions: Vec<String>,
    pub parameter_optimizations: serde_json::Map<String, Value>,
    pub confidence: f64,
    /// Weighted mean success rate of the patterns that voted.
    pub expected_quality: f64,
}

impl Recommendations {
    pub fn ranked_sources(&self) -> Vec<String> {
        rank_sources(&self.source_priorities)
    }
}

/// Sources by descending priority, ties alphabetical.
pub fn rank_sources(priorities: &BTreeMap<String, f64>) -> Vec<String> {
    let mut ranked: Vec<(&String, &f64)> = priorities.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().map(|(s, _)| s.clone()).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchStrategy {
    pub strategy_id: String,
    pub name: String,
    pub description: String,
    pub query_patterns: Vec<String>,
    pub source_priorities: BTreeMap<String, f64>,
    pub parameter_optimizations: serde_json::Map<String, Value>,
    pub success_metrics: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
    pub usage_count: u64,
}

fn insight_kind_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<InsightKind> {
    let raw: String = row.get(idx)?;
    InsightKind::parse(&raw)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(idx, raw, rusqlite::types::Type::Text))
}

fn average_relevance(results: &[SearchResult]) -> f64 {
    results.iter().map(|r| r.relevance_score).sum::<f64>() / results.len() as f64
}

pub struct LearningEngine {
    db: Database,
}

impl LearningEngine {
    pub fn new(db: Database) -> Result<Self, MemoryError> {
        let engine = Self { db };
        engine.init_schema()?;
        Ok(engine)
    }

    fn init_schema(&self) -> Result<(), MemoryError> {
        self.db.with(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS search_patterns (
                    pattern_id          TEXT NOT NULL PRIMARY KEY,
                    query_keywords      TEXT NOT NULL,
                    successful_sources  TEXT NOT NULL,
                    optimal_parameters  TEXT NOT NULL,
                    success_rate        REAL NOT NULL,
                    usage_count         INTEGER NOT NULL,
                    last_used           TEXT NOT NULL,
                    effectiveness_score REAL NOT NULL
                );
                CREATE TABLE IF NOT EXISTS learning_insights (
                    insight_id          TEXT NOT NULL PRIMARY KEY,
                    insight_type        TEXT NOT NULL,
                    subject             TEXT,
                    description         TEXT NOT NULL,
                    confidence          REAL NOT NULL,
                    supporting_evidence TEXT NOT NULL,
                    applications        TEXT NOT NULL,
                    created_at          TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS research_strategies (
                    strategy_id             TEXT NOT NULL PRIMARY KEY,
                    name                    TEXT NOT NULL,
                    description             TEXT NOT NULL,
                    query_patterns          TEXT NOT NULL,
                    source_priorities       TEXT NOT NULL,
                    parameter_optimizations TEXT NOT NULL,
                    success_metrics         TEXT NOT NULL,
                    created_at              TEXT NOT NULL,
                    usage_count             INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS performance_metrics (
                    metric_id           TEXT NOT NULL PRIMARY KEY,
                    project_id          TEXT NOT NULL,
                    query               TEXT NOT NULL,
                    source              TEXT NOT NULL,
                    results_count       INTEGER NOT NULL,
                    avg_relevance_score REAL NOT NULL,
                    execution_time      REAL NOT NULL,
                    timestamp           TEXT NOT NULL
                );",
            )?;
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Learning
    // ─────────────────────────────────────────────────────────────────────────

    /// Record how each source performed for `query` and learn from it.
    ///
    /// Sources with no results are skipped. Missing execution times count as
    /// zero seconds.
    pub fn analyze_search_performance(
        &self,
        project_id: &str,
        query: &str,
        results_by_source: &BTreeMap<String, Vec<SearchResult>>,
        execution_times: &BTreeMap<String, f64>,
    ) -> Result<(), MemoryError> {
        let keywords = query_keywords(query);
        let now = Utc::now();

        self.db.with(|conn| {
            let tx = conn.transaction()?;
            for (source, results) in results_by_source {
                if results.is_empty() {
                    continue;
                }
                let avg = average_relevance(results);
                tx.execute(
                    "INSERT INTO performance_metrics
                         (metric_id, project_id, query, source, results_count,
                          avg_relevance_score, execution_time, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        short_id(),
                        project_id,
                        query,
                        source,
                        results.len() as i64,
                        avg,
                        execution_times.get(source).copied().unwrap_or(0.0),
                        ts(now),
                    ],
                )?;
                update_pattern(&tx, &keywords, source, avg, results.len(), now)?;
            }
            tx.commit()?;
            Ok(())
        })?;

        for insight in search_insights(query, results_by_source, now) {
            self.store_insight(&insight)?;
        }
        Ok(())
    }

    fn store_insight(&self, insight: &LearningInsight) -> Result<(), MemoryError> {
        let evidence = serde_json::to_string(&insight.supporting_evidence)?;
        let applications = serde_json::to_string(&insight.applications)?;
        self.db.with(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO learning_insights
                     (insight_id, insight_type, subject, description, confidence,
                      supporting_evidence, applications, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    insight.insight_id,
                    insight.kind.as_str(),
                    insight.subject,
                    insight.description,
                    insight.confidence,
                    evidence,
                    applications,
                    ts(insight.created_at),
                ],
            )?;
            Ok(())
        })?;
        debug!(kind = insight.kind.as_str(), "learning insight stored");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recommendations
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_optimization_recommendations(
        &self,
        query: &str,
    ) -> Result<Recommendations, MemoryError> {
        let keywords = query_keywords(query);
        let mut recs = Recommendations::default();

        let mut matching: Vec<(SearchPattern, f64)> = self
            .patterns()?
            .into_iter()
            .filter_map(|p| {
                let sim = keyword_similarity(&keywords, &p.keywords);
                (sim > PATTERN_SIMILARITY).then_some((p, sim))
            })
            .collect();
        matching.sort_by(|a, b| {
            (b.1 * b.0.effectiveness_score)
                .total_cmp(&(a.1 * a.0.effectiveness_score))
                .then_with(|| a.0.pattern_id.cmp(&b.0.pattern_id))
        });

        let mut total_weight = 0.0;
        let mut weighted_rate = 0.0;
        let mut votes: BTreeMap<String, f64> = BTreeMap::new();
        for (pattern, sim) in matching.iter().take(5) {
            let weight = sim * pattern.effectiveness_score;
            total_weight += weight;
            weighted_rate += weight * pattern.success_rate;
            for source in &pattern.successful_sources {
                *votes.entry(source.clone()).or_insert(0.0) += weight;
            }
        }
        if total_weight > 0.0 {
            recs.source_priorities = votes
                .into_iter()
                .map(|(source, v)| (source, v / total_weight))
                .collect();
            recs.confidence = (total_weight / matching.len() as f64).min(1.0);
            recs.expected_quality = weighted_rate / total_weight;
        }

        for insight in self.insights(0.5)?.into_iter().take(3) {
            match insight.kind {
                InsightKind::SourceEffectiveness => {
                    if let Some(subject) = &insight.subject
                        && let Some(priority) = recs.source_priorities.get_mut(subject)
                    {
                        *priority = (*priority * SOURCE_BOOST).min(1.0);
                    }
                }
                InsightKind::QueryComplexity => {
                    if !recs.query_suggestions.iter().any(|s| s == SIMPLIFY_QUERY) {
                        recs.query_suggestions.push(SIMPLIFY_QUERY.to_string());
                    }
                }
            }
        }
        Ok(recs)
    }

    /// Persist a strategy for `query` when recommendations are confident enough.
    pub fn create_optimized_strategy(
        &self,
        query: &str,
        research_type: &str,
    ) -> Result<Option<ResearchStrategy>, MemoryError> {
        let recs = self.get_optimization_recommendations(query)?;
        if recs.confidence < STRATEGY_CONFIDENCE {
            return Ok(None);
        }
        let strategy = ResearchStrategy {
            strategy_id: short_id(),
            name: format!("Optimized Strategy for {research_type}"),
            description: format!(
                "Auto-generated strategy based on learned patterns for queries similar to '{query}'"
            ),
            query_patterns: vec![query.to_string()],
            source_priorities: recs.source_priorities,
            parameter_optimizations: recs.parameter_optimizations,
            success_metrics: BTreeMap::from([
                ("confidence".to_string(), recs.confidence),
                ("expected_quality".to_string(), recs.expected_quality),
            ]),
            created_at: Utc::now(),
            usage_count: 0,
        };
        self.store_strategy(&strategy)?;
        info!(
            strategy_id = %strategy.strategy_id,
            confidence = recs.confidence,
            "optimized strategy created"
        );
        Ok(Some(strategy))
    }

    fn store_strategy(&self, s: &ResearchStrategy) -> Result<(), MemoryError> {
        let patterns = serde_json::to_string(&s.query_patterns)?;
        let priorities = serde_json::to_string(&s.source_priorities)?;
        let params_json = serde_json::to_string(&s.parameter_optimizations)?;
        let metrics = serde_json::to_string(&s.success_metrics)?;
        self.db.with(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO research_strategies
                     (strategy_id, name, description, query_patterns, source_priorities,
                      parameter_optimizations, success_metrics, created_at, usage_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    s.strategy_id,
                    s.name,
                    s.description,
                    patterns,
                    priorities,
                    params_json,
                    metrics,
                    ts(s.created_at),
                    s.usage_count as i64,
                ],
            )?;
            Ok(())
        })
    }

    /// Bump a strategy's usage counter.
    pub fn record_strategy_use(&self, strategy_id: &str) -> Result<(), MemoryError> {
        self.db.with(|conn| {
            let changed = conn.execute(
                "UPDATE research_strategies SET usage_count = usage_count + 1
                 WHERE strategy_id = ?1",
                params![strategy_id],
            )?;
            if changed == 0 {
                return Err(MemoryError::NotFound(format!("strategy {strategy_id}")));
            }
            Ok(())
        })
    }

    pub fn strategy(&self, strategy_id: &str) -> Result<Option<ResearchStrategy>, MemoryError> {
        self.db.with(|conn| {
            let s = conn
                .query_row(
                    "SELECT strategy_id, name, description, query_patterns, source_priorities,
                            parameter_optimizations, success_metrics, created_at, usage_count
                     FROM research_strategies WHERE strategy_id = ?1",
                    params![strategy_id],
                    |row| {
                        Ok(ResearchStrategy {
                            strategy_id: row.get(0)?,
                            name: row.get(1)?,
                            description: row.get(2)?,
                            query_patterns: json_col(row, 3)?,
                            source_priorities: json_col(row, 4)?,
                            parameter_optimizations: json_col(row, 5)?,
                            success_metrics: json_col(row, 6)?,
                            created_at: ts_col(row, 7)?,
                            usage_count: count(row.get(8)?),
                        })
                    },
                )
                .optional()?;
            Ok(s)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Introspection
    // ─────────────────────────────────────────────────────────────────────────

    /// All learned patterns, most effective first.
    pub fn patterns(&self) -> Result<Vec<SearchPattern>, MemoryError> {
        self.db.with(|conn| {
            let mut stmt = conn.prepare(
                "SELECT pattern_id, query_keywords, successful_sources, optimal_parameters,
                        success_rate, usage_count, last_used, effectiveness_score
                 FROM search_patterns
                 ORDER BY effectiveness_score DESC, pattern_id ASC",
            )?;
            let rows = stmt.query_map([], pattern_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Insights with confidence strictly above `min_confidence`, most
    /// confident (then newest) first.
    pub fn insights(&self, min_confidence: f64) -> Result<Vec<LearningInsight>, MemoryError> {
        self.db.with(|conn| {
            let mut stmt = conn.prepare(
                "SELECT insight_id, insight_type, subject, description, confidence,
                        supporting_evidence, applications, created_at
                 FROM learning_insights
                 WHERE confidence > ?1
                 ORDER BY confidence DESC, created_at DESC, insight_id ASC",
            )?;
            let rows = stmt.query_map(params![min_confidence], |row| {
                Ok(LearningInsight {
                    insight_id: row.get(0)?,
                    kind: insight_kind_col(row, 1)?,
                    subject: row.get(2)?,
                    description: row.get(3)?,
                    confidence: row.get(4)?,
                    supporting_evidence: json_col(row, 5)?,
                    applications: json_col(row, 6)?,
                    created_at: ts_col(row, 7)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn insight_count(&self) -> Result<u64, MemoryError> {
        self.db.with(|conn| {
            let n: i64 =
                conn.query_row("SELECT COUNT(*) FROM learning_insights", [], |r| r.get(0))?;
            Ok(count(n))
        })
    }
}

fn pattern_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SearchPattern> {
    Ok(SearchPattern {
        pattern_id: row.get(0)?,
        keywords: json_col(row, 1)?,
        successful_sources: json_col(row, 2)?,
        optimal_parameters: json_col(row, 3)?,
        success_rate: row.get(4)?,
        usage_count: count(row.get(5)?),
        last_used: ts_col(row, 6)?,
        effectiveness_score: row.get(7)?,
    })
}

fn update_pattern(
    tx: &Transaction<'_>,
    keywords: &[String],
    source: &str,
    avg: f64,
    results_count: usize,
    now: DateTime<Utc>,
) -> Result<(), MemoryError> {
    if keywords.is_empty() {
        return Ok(());
    }
    let mut sorted = keywords.to_vec();
    sorted.sort();
    let pattern_id = sorted.join("_");

    let existing = tx
        .query_row(
            "SELECT pattern_id, query_keywords, successful_sources, optimal_parameters,
                    success_rate, usage_count, last_used, effectiveness_score
             FROM search_patterns WHERE pattern_id = ?1",
            params![pattern_id],
            pattern_from_row,
        )
        .optional()?;

    match existing {
        Some(mut p) => {
            let usage = p.usage_count as f64;
            let rate = (p.success_rate * usage + avg) / (usage + 1.0);
            if !p.successful_sources.iter().any(|s| s == source) {
                p.successful_sources.push(source.to_string());
            }
            tx.execute(
                "UPDATE search_patterns
                 SET successful_sources = ?1, success_rate = ?2, usage_count = ?3,
                     last_used = ?4, effectiveness_score = ?5
                 WHERE pattern_id = ?6",
                params![
                    serde_json::to_string(&p.successful_sources)?,
                    rate,
                    (p.usage_count + 1) as i64,
                    ts(now),
                    rate * results_count as f64,
                    pattern_id,
                ],
            )?;
        }
        None => {
            tx.execute(
                "INSERT INTO search_patterns
                     (pattern_id, query_keywords, successful_sources, optimal_parameters,
                      success_rate, usage_count, last_used, effectiveness_score)
                 VALUES (?1, ?2, ?3, '{}', ?4, 1, ?5, ?6)",
                params![
                    pattern_id,
                    serde_json::to_string(keywords)?,
                    serde_json::to_string(&[source])?,
                    avg,
                    ts(now),
                    avg * results_count as f64,
                ],
            )?;
        }
    }
    Ok(())
}

fn search_insights(
    query: &str,
    results_by_source: &BTreeMap<String, Vec<SearchResult>>,
    now: DateTime<Utc>,
) -> Vec<LearningInsight> {
    let mut insights = Vec::new();

    let scores: Vec<(&String, f64)> = results_by_source
        .iter()
        .filter(|(_, results)| !results.is_empty())
        .map(|(source, results)| (source, average_relevance(results)))
        .collect();
    let best = scores
        .iter()
        .copied()
        .reduce(|best, s| if s.1 > best.1 { s } else { best });
    let worst = scores
        .iter()
        .copied()
        .reduce(|worst, s| if s.1 < worst.1 { s } else { worst });
    if let (Some((best, hi)), Some((worst, lo))) = (best, worst)
        && hi - lo > 0.3
    {
        insights.push(LearningInsight {
            insight_id: short_id(),
            kind: InsightKind::SourceEffectiveness,
            subject: Some(best.clone()),
            description: format!(
                "For queries like '{query}', {best} performs significantly better than {worst}"
            ),
            confidence: 0.8,
            supporting_evidence: vec![format!("{best}: {hi:.2}"), format!("{worst}: {lo:.2}")],
            applications: vec![
                "source_prioritization".to_string(),
                "search_optimization".to_string(),
            ],
            created_at: now,
        });
    }

    let words = query.split_whitespace().count();
    let total: usize = results_by_source.values().map(Vec::len).sum();
    if words > 5 && total < 10 {
        insights.push(LearningInsight {
            insight_id: short_id(),
            kind: InsightKind::QueryComplexity,
            subject: None,
            description: format!("Complex queries with {words} words tend to return fewer results"),
            confidence: 0.6,
            supporting_evidence: vec![
                format!("Query length: {words}"),
                format!("Total results: {total}"),
            ],
            applications: vec![
                "query_simplification".to_string(),
                "search_strategy".to_string(),
            ],
            created_at: now,
        });
    }
    insights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> LearningEngine {
        LearningEngine::new(Database::open_in_memory().unwrap()).unwrap()
    }

    fn results(source: &str, scores: &[f64]) -> Vec<SearchResult> {
        scores
            .iter()
            .map(|s| {
                let mut r = SearchResult::new("t", "u", "c", source);
                r.relevance_score = *s;
                r
            })
            .collect()
    }

    fn by_source(entries: &[(&str, &[f64])]) -> BTreeMap<String, Vec<SearchResult>> {
        entries
            .iter()
            .map(|(s, scores)| (s.to_string(), results(s, scores)))
            .collect()
    }

    fn metric_count(e: &LearningEngine) -> i64 {
        e.db.with(|c| Ok(c.query_row("SELECT COUNT(*) FROM performance_metrics", [], |r| r.get(0))?))
            .unwrap()
    }

    // ── patterns ─────────────────────────────────────────────────────────────

    #[test]
    fn first_analysis_creates_pattern() {
        let e = engine();
        let data = by_source(&[("github", &[0.8, 0.6])]);
        e.analyze_search_performance("p1", "Rust web frameworks", &data, &BTreeMap::new())
            .unwrap();

        let patterns = e.patterns().unwrap();
        assert_eq!(patterns.len(), 1);
        let p = &patterns[0];
        assert_eq!(p.pattern_id, "frameworks_rust_web");
        assert_eq!(p.usage_count, 1);
        assert!((p.success_rate - 0.7).abs() < 1e-9);
        assert!((p.effectiveness_score - 1.4).abs() < 1e-9);
        assert_eq!(p.successful_sources, vec!["github"]);
        assert_eq!(metric_count(&e), 1);
    }

    #[test]
    fn repeated_analysis_updates_running_rate() {
        let e = engine();
        e.analyze_search_performance(
            "p1",
            "rust web",
            &by_source(&[("github", &[0.8])]),
            &BTreeMap::new(),
        )
        .unwrap();
        e.analyze_search_performance(
            "p2",
            "web rust",
            &by_source(&[("reddit", &[0.4, 0.4, 0.4])]),
            &BTreeMap::from([("reddit".to_string(), 1.5)]),
        )
        .unwrap();

        let p = &e.patterns().unwrap()[0];
        assert_eq!(p.usage_count, 2);
        assert!((p.success_rate - 0.6).abs() < 1e-9);
        assert!((p.effectiveness_score - 1.8).abs() < 1e-9);
        assert_eq!(p.successful_sources, vec!["github", "reddit"]);
    }

    #[test]
    fn empty_sources_and_keywordless_queries_are_skipped() {
        let e = engine();
        e.analyze_search_performance(
            "p1",
            "a b",
            &by_source(&[("github", &[0.5]), ("web", &[])]),
            &BTreeMap::new(),
        )
        .unwrap();
        assert!(e.patterns().unwrap().is_empty());
        assert_eq!(metric_count(&e), 1);
    }

    // ── insights ─────────────────────────────────────────────────────────────

    #[test]
    fn source_gap_produces_effectiveness_insight() {
        let e = engine();
        let data = by_source(&[("github", &[0.9]), ("reddit", &[0.2])]);
        e.analyze_search_performance("p", "rust", &data, &BTreeMap::new()).unwrap();

        let insights = e.insights(0.0).unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::SourceEffectiveness);
        assert_eq!(insights[0].subject.as_deref(), Some("github"));
        assert_eq!(insights[0].supporting_evidence, vec!["github: 0.90", "reddit: 0.20"]);
    }

    #[test]
    fn long_query_with_few_results_produces_complexity_insight() {
        let e = engine();
        let data = by_source(&[("web", &[0.5, 0.5])]);
        e.analyze_search_performance(
            "p",
            "how do i build a distributed cache in rust",
            &data,
            &BTreeMap::new(),
        )
        .unwrap();
        let insights = e.insights(0.5).unwrap();
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::QueryComplexity);
        assert!(insights[0].description.contains("9 words"));
        assert_eq!(e.insight_count().unwrap(), 1);
    }

    // ── recommendations ──────────────────────────────────────────────────────

    #[test]
    fn no_patterns_means_zero_confidence() {
        let recs = engine().get_optimization_recommendations("rust web").unwrap();
        assert!(recs.source_priorities.is_empty());
        assert_eq!(recs.confidence, 0.0);
        assert_eq!(recs.expected_quality, 0.0);
    }

    #[test]
    fn complexity_insights_suggest_simplifying_once() {
        let e = engine();
        let query = "how do i build a distributed cache in rust";
        for project in ["p1", "p2"] {
            e.analyze_search_performance(
                project,
                query,
                &by_source(&[("web", &[0.5, 0.5])]),
                &BTreeMap::new(),
            )
            .unwrap();
        }
        assert_eq!(e.insights(0.5).unwrap().len(), 2);

        let recs = e.get_optimization_recommendations(query).unwrap();
        let simplify = recs
            .query_suggestions
            .iter()
            .filter(|s| s.as_str() == SIMPLIFY_QUERY)
            .count();
        assert_eq!(simplify, 1);
        assert_eq!(recs.query_suggestions.len(), 1);
    }

    #[test]
    fn recommendations_vote_for_successful_sources() {
        let e = engine();
        e.analyze_search_performance(
            "p",
            "rust web frameworks",
            &by_source(&[("github", &[0.8, 0.8]), ("web", &[0.6, 0.6])]),
            &BTreeMap::new(),
        )
        .unwrap();

        let recs = e.get_optimization_recommendations("rust web").unwrap();
        // One pattern, both sources voted with the same weight.
        assert!((recs.source_priorities["web"] - 1.0).abs() < 1e-9);
        assert!((recs.source_priorities["github"] - 1.0).abs() < 1e-9);
        assert!((recs.confidence - 1.4 * 2.0 / 3.0).abs() < 1e-9);
        assert!((recs.expected_quality - 0.7).abs() < 1e-9);
    }

    #[test]
    fn effectiveness_insight_boosts_subject_capped_at_one() {
        let e = engine();
        e.analyze_search_performance(
            "p1",
            "rust web",
            &by_source(&[("github", &[0.9])]),
            &BTreeMap::new(),
        )
        .unwrap();
        e.analyze_search_performance(
            "p2",
            "rust async",
            &by_source(&[("reddit", &[0.9]), ("github", &[0.1])]),
            &BTreeMap::new(),
        )
        .unwrap();
        e.analyze_search_performance(
            "p3",
            "rust async",
            &by_source(&[("web", &[0.95])]),
            &BTreeMap::new(),
        )
        .unwrap();

        assert_eq!(e.patterns().unwrap().len(), 2);

        let recs = e.get_optimization_recommendations("rust async").unwrap();
        let reddit = recs.source_priorities["reddit"];
        let web = recs.source_priorities["web"];
        // Reddit and web share the async pattern's vote; only reddit is boosted.
        assert!((web - 0.65 / 1.1).abs() < 1e-9);
        assert!((reddit - 0.65 / 1.1 * 1.2).abs() < 1e-9);
        assert!((recs.source_priorities["github"] - 1.0).abs() < 1e-9);
        assert!(reddit <= 1.0);
    }

    #[test]
    fn ranked_sources_break_ties_alphabetically() {
        let recs = Recommendations {
            source_priorities: BTreeMap::from([
                ("web".to_string(), 0.5),
                ("github".to_string(), 0.9),
                ("reddit".to_string(), 0.5),
            ]),
            ..Default::default()
        };
        assert_eq!(recs.ranked_sources(), vec!["github", "reddit", "web"]);
    }

    // ── strategies ───────────────────────────────────────────────────────────

    #[test]
    fn low_confidence_yields_no_strategy() {
        let e = engine();
        e.analyze_search_performance(
            "p",
            "rust web",
            &by_source(&[("github", &[0.1])]),
            &BTreeMap::new(),
        )
        .unwrap();
        assert!(e.create_optimized_strategy("rust web", "technology_analysis").unwrap().is_none());
    }

    #[test]
    fn confident_strategy_is_persisted_and_usage_tracked() {
        let e = engine();
        e.analyze_search_performance(
            "p",
            "rust web",
            &by_source(&[("github", &[0.9, 0.9])]),
            &BTreeMap::new(),
        )
        .unwrap();
        let s = e
            .create_optimized_strategy("rust web", "technology_analysis")
            .unwrap()
            .expect("strategy");
        assert_eq!(s.name, "Optimized Strategy for technology_analysis");
        assert_eq!(s.query_patterns, vec!["rust web"]);

        e.record_strategy_use(&s.strategy_id).unwrap();
        let back = e.strategy(&s.strategy_id).unwrap().expect("stored");
        assert_eq!(back.usage_count, 1);
        assert!((back.success_metrics["confidence"] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn record_use_of_unknown_strategy_is_not_found() {
        let err = engine().record_strategy_use("ghost").unwrap_err();
        assert!(matches!(err, MemoryError::NotFound(_)));
    }
}
