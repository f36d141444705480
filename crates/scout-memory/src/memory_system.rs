//! Research memory: projects, their results, sessions, and the learning
//! components that feed on them.
//!
//! # Storage layout
//!
//! Everything lives in `<data_dir>/advanced_memory.db`:
//!
//! | table                | owner                    |
//! |----------------------|--------------------------|
//! | `projects`           | [`AdvancedMemorySystem`] |
//! | `search_results`     | [`AdvancedMemorySystem`] |
//! | `search_sessions`    | [`AdvancedMemorySystem`] |
//! | `entities`, …        | [`KnowledgeGraph`]       |
//! | `search_patterns`, … | [`LearningEngine`]       |
//!
//! # Example
//!
//! ```rust
//! use scout_memory::memory_system::{AdvancedMemorySystem, NewSession};
//! use scout_types::{ResearchProject, SearchResult};
//!
//! let memory = AdvancedMemorySystem::open_in_memory().unwrap();
//! let project = ResearchProject::new("rust web frameworks", "survey", vec!["github".into()]);
//! memory.save_project(&project).unwrap();
//!
//! let mut hit = SearchResult::new("axum", "https://github.com/tokio-rs/axum", "", "github");
//! hit.relevance_score = 0.8;
//! memory.save_search_results(&project.project_id, &[hit.clone()]).unwrap();
//!
//! let sources = vec!["github".to_string()];
//! let results = [hit];
//! let session = NewSession::new(&project.project_id, &project.query, &sources, &results);
//! memory.store_research_session(&session).unwrap();
//!
//! let insights = memory.get_memory_insights().unwrap();
//! assert_eq!(insights.total_results, 1);
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, params};
use scout_types::{ProjectStatus, ResearchProject, SearchResult, query_keywords, short_id};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{Database, MemoryError, count, json_col, ts, ts_col};
use crate::knowledge_graph::{DEFAULT_SIMILARITY_THRESHOLD, EntityKind, KnowledgeGraph};
use crate::learning::{LearningEngine, ResearchStrategy, rank_sources};

pub const MEMORY_DB_FILE: &str = "advanced_memory.db";
/// Recommendations above this confidence come with a persisted strategy.
const STRATEGY_THRESHOLD: f64 = 0.5;
const TREND_DAYS: i64 = 30;

/// Deterministic knowledge-graph id for a research query.
pub fn topic_id(query: &str) -> String {
    let mut id = Uuid::new_v5(&Uuid::NAMESPACE_OID, query.as_bytes())
        .simple()
        .to_string();
    id.truncate(12);
    id
}

/// One research or enrichment run to be recorded.
#[derive(Debug, Clone)]
pub struct NewSession<'a> {
    pub project_id: &'a str,
    pub query: &'a str,
    pub sources_used: &'a [String],
    pub results: &'a [SearchResult],
    pub strategy_used: Option<&'a str>,
    /// Seconds spent per source.
    pub execution_times: BTreeMap<String, f64>,
    pub started_at: DateTime<Utc>,
}

impl<'a> NewSession<'a> {
    pub fn new(
        project_id: &'a str,
        query: &'a str,
        sources_used: &'a [String],
        results: &'a [SearchResult],
    ) -> Self {
        Self {
            project_id,
            query,
            sources_used,
            results,
            strategy_used: None,
            execution_times: BTreeMap::new(),
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub project_id: String,
    pub query: String,
    pub sources_used: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_results: u64,
    pub avg_quality_score: f64,
    pub strategy_used: Option<String>,
}

/// Learned and graph-derived advice for a new research query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchRecommendations {
    pub optimized_strategy: Option<ResearchStrategy>,
    pub source_priorities: BTreeMap<String, f64>,
    pub similar_topics: Vec<String>,
    pub query_suggestions: Vec<String>,
    pub expected_quality: f64,
    pub confidence: f64,
}

impl ResearchRecommendations {
    pub fn ranked_sources(&self) -> Vec<String> {
        rank_sources(&self.source_priorities)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStats {
    pub source: String,
    pub avg_score: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyCount {
    /// `YYYY-MM-DD`
    pub date: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryInsights {
    pub total_projects: u64,
    pub total_results: u64,
    pub avg_project_quality: f64,
    pub most_successful_sources: Vec<SourceStats>,
    /// Projects created per day over the last 30 days, newest first.
    pub research_trends: Vec<DailyCount>,
    pub learning_insights_count: u64,
    pub knowledge_entities: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub archived_projects: u64,
    pub deleted_results: u64,
}

fn status_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<ProjectStatus> {
    let raw: String = row.get(idx)?;
    ProjectStatus::parse(&raw)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(idx, raw, rusqlite::types::Type::Text))
}

fn project_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResearchProject> {
    Ok(ResearchProject {
        project_id: row.get(0)?,
        query: row.get(1)?,
        description: row.get(2)?,
        sources: json_col(row, 3)?,
        status: status_col(row, 4)?,
        created_at: ts_col(row, 5)?,
        updated_at: ts_col(row, 6)?,
        results_count: count(row.get(7)?),
        avg_relevance_score: row.get(8)?,
        research_type: row.get(9)?,
        methodology: row.get(10)?,
        tags: json_col(row, 11)?,
        parent_project_id: row.get(12)?,
    })
}

const PROJECT_COLUMNS: &str = "project_id, query, description, sources, status, created_at,
     updated_at, results_count, avg_relevance_score, research_type, methodology, tags,
     parent_project_id";

/// Storage, learning and knowledge graph behind one SQLite file.
pub struct AdvancedMemorySystem {
    db: Database,
    graph: KnowledgeGraph,
    learning: LearningEngine,
    data_dir: Option<PathBuf>,
}

impl AdvancedMemorySystem {
    /// Open (or create) the memory database under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, MemoryError> {
        fs::create_dir_all(data_dir)?;
        let db = Database::open(&data_dir.join(MEMORY_DB_FILE))?;
        let mut memory = Self::with_database(db)?;
        memory.data_dir = Some(data_dir.to_path_buf());
        info!(path = %data_dir.display(), "memory system initialised");
        Ok(memory)
    }

    /// A throwaway in-memory system (useful for testing).
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        Self::with_database(Database::open_in_memory()?)
    }

    fn with_database(db: Database) -> Result<Self, MemoryError> {
        let graph = KnowledgeGraph::new(db.clone())?;
        let learning = LearningEngine::new(db.clone())?;
        let memory = Self {
            db,
            graph,
            learning,
            data_dir: None,
        };
        memory.init_schema()?;
        Ok(memory)
    }

    fn init_schema(&self) -> Result<(), MemoryError> {
        self.db.with(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS projects (
                    project_id          TEXT NOT NULL PRIMARY KEY,
                    query               TEXT NOT NULL,
                    description         TEXT NOT NULL,
                    sources             TEXT NOT NULL,
                    status              TEXT NOT NULL,
                    created_at          TEXT NOT NULL,
                    updated_at          TEXT NOT NULL,
                    results_count       INTEGER NOT NULL DEFAULT 0,
                    avg_relevance_score REAL,
                    research_type       TEXT,
                    methodology         TEXT,
                    tags                TEXT NOT NULL DEFAULT '[]',
                    parent_project_id   TEXT
                );
                CREATE TABLE IF NOT EXISTS search_results (
                    id              INTEGER PRIMARY KEY AUTOINCREMENT,
                    project_id      TEXT NOT NULL,
                    title           TEXT NOT NULL,
                    url             TEXT NOT NULL,
                    content         TEXT NOT NULL,
                    source          TEXT NOT NULL,
                    timestamp       TEXT NOT NULL,
                    metadata        TEXT NOT NULL,
                    relevance_score REAL NOT NULL,
                    breakdown       TEXT,
                    processed       INTEGER NOT NULL DEFAULT 0,
                    FOREIGN KEY (project_id) REFERENCES projects (project_id)
                );
                CREATE INDEX IF NOT EXISTS idx_search_results_project
                    ON search_results (project_id);
                CREATE TABLE IF NOT EXISTS search_sessions (
                    session_id        TEXT NOT NULL PRIMARY KEY,
                    project_id        TEXT NOT NULL,
                    query             TEXT NOT NULL,
                    sources_used      TEXT NOT NULL,
                    start_time        TEXT NOT NULL,
                    end_time          TEXT NOT NULL,
                    total_results     INTEGER NOT NULL,
                    avg_quality_score REAL NOT NULL,
                    strategy_used     TEXT,
                    FOREIGN KEY (project_id) REFERENCES projects (project_id)
                );",
            )?;
            Ok(())
        })
    }

    pub fn knowledge_graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    pub fn learning(&self) -> &LearningEngine {
        &self.learning
    }

    /// Directory holding the database file; `None` when in memory.
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Projects and results
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert or replace a project row.
    pub fn save_project(&self, project: &ResearchProject) -> Result<(), MemoryError> {
        let sources = serde_json::to_string(&project.sources)?;
        let tags = serde_json::to_string(&project.tags)?;
        self.db.with(|conn| {
            conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO projects ({PROJECT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    project.project_id,
                    project.query,
                    project.description,
                    sources,
                    project.status.as_str(),
                    ts(project.created_at),
                    ts(project.updated_at),
                    project.results_count as i64,
                    project.avg_relevance_score,
                    project.research_type,
                    project.methodology,
                    tags,
                    project.parent_project_id,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_project(&self, project_id: &str) -> Result<Option<ResearchProject>, MemoryError> {
        self.db.with(|conn| {
            let project = conn
                .query_row(
                    &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE project_id = ?1"),
                    params![project_id],
                    project_from_row,
                )
                .optional()?;
            Ok(project)
        })
    }

    /// Projects, newest first, optionally restricted to one status.
    pub fn list_projects(
        &self,
        status: Option<ProjectStatus>,
    ) -> Result<Vec<ResearchProject>, MemoryError> {
        self.db.with(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROJECT_COLUMNS} FROM projects
                 WHERE (?1 IS NULL OR status = ?1)
                 ORDER BY created_at DESC, project_id ASC"
            ))?;
            let rows = stmt.query_map(params![status.map(|s| s.as_str())], project_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn set_project_status(
        &self,
        project_id: &str,
        status: ProjectStatus,
    ) -> Result<(), MemoryError> {
        self.db.with(|conn| {
            let changed = conn.execute(
                "UPDATE projects SET status = ?1, updated_at = ?2 WHERE project_id = ?3",
                params![status.as_str(), ts(Utc::now()), project_id],
            )?;
            if changed == 0 {
                return Err(MemoryError::NotFound(format!("project {project_id}")));
            }
            Ok(())
        })
    }

    /// Append results to a project in a single transaction.
    pub fn save_search_results(
        &self,
        project_id: &str,
        results: &[SearchResult],
    ) -> Result<usize, MemoryError> {
        self.db.with(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO search_results
                         (project_id, title, url, content, source, timestamp, metadata,
                          relevance_score, breakdown)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )?;
                for r in results {
                    let breakdown = r.breakdown.map(|b| serde_json::to_string(&b)).transpose()?;
                    stmt.execute(params![
                        project_id,
                        r.title,
                        r.url,
                        r.content,
                        r.source,
                        ts(r.timestamp),
                        serde_json::to_string(&r.metadata)?,
                        r.relevance_score,
                        breakdown,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(())
        })?;
        debug!(project_id, count = results.len(), "search results saved");
        Ok(results.len())
    }

    /// Stored results of a project in insertion order.
    pub fn get_search_results(&self, project_id: &str) -> Result<Vec<SearchResult>, MemoryError> {
        self.db.with(|conn| {
            let mut stmt = conn.prepare(
                "SELECT title, url, content, source, timestamp, metadata, relevance_score,
                        breakdown
                 FROM search_results WHERE project_id = ?1
                 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![project_id], |row| {
                let breakdown: Option<String> = row.get(7)?;
                Ok(SearchResult {
                    title: row.get(0)?,
                    url: row.get(1)?,
                    content: row.get(2)?,
                    source: row.get(3)?,
                    timestamp: ts_col(row, 4)?,
                    metadata: json_col(row, 5)?,
                    relevance_score: row.get(6)?,
                    breakdown: match breakdown {
                        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                7,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?),
                        None => None,
                    },
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Recompute a project's result count and average relevance from its
    /// stored results and return the updated project.
    pub fn refresh_project_stats(&self, project_id: &str) -> Result<ResearchProject, MemoryError> {
        self.db.with(|conn| {
            let changed = conn.execute(
                "UPDATE projects SET
                     results_count = (SELECT COUNT(*) FROM search_results WHERE project_id = ?1),
                     avg_relevance_score =
                         (SELECT AVG(relevance_score) FROM search_results WHERE project_id = ?1),
                     updated_at = ?2
                 WHERE project_id = ?1",
                params![project_id, ts(Utc::now())],
            )?;
            if changed == 0 {
                return Err(MemoryError::NotFound(format!("project {project_id}")));
            }
            Ok(())
        })?;
        self.get_project(project_id)?
            .ok_or_else(|| MemoryError::NotFound(format!("project {project_id}")))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a session, learn from its results and extend the knowledge
    /// graph. Returns the new session id.
    pub fn store_research_session(&self, session: &NewSession<'_>) -> Result<String, MemoryError> {
        let session_id = short_id();
        let total = session.results.len();
        let avg_quality = if total == 0 {
            0.0
        } else {
            session.results.iter().map(|r| r.relevance_score).sum::<f64>() / total as f64
        };
        let sources = serde_json::to_string(session.sources_used)?;

        self.db.with(|conn| {
            conn.execute(
                "INSERT INTO search_sessions
                     (session_id, project_id, query, sources_used, start_time, end_time,
                      total_results, avg_quality_score, strategy_used)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    session_id,
                    session.project_id,
                    session.query,
                    sources,
                    ts(session.started_at),
                    ts(Utc::now()),
                    total as i64,
                    avg_quality,
                    session.strategy_used,
                ],
            )?;
            Ok(())
        })?;

        let mut by_source: BTreeMap<String, Vec<SearchResult>> = BTreeMap::new();
        for r in session.results {
            by_source.entry(r.source.clone()).or_default().push(r.clone());
        }
        self.learning.analyze_search_performance(
            session.project_id,
            session.query,
            &by_source,
            &session.execution_times,
        )?;
        self.update_knowledge_graph(session.query, &by_source, total)?;

        info!(
            session_id = %session_id,
            project_id = session.project_id,
            results = total,
            avg_quality,
            "research session stored"
        );
        Ok(session_id)
    }

    fn update_knowledge_graph(
        &self,
        query: &str,
        by_source: &BTreeMap<String, Vec<SearchResult>>,
        total: usize,
    ) -> Result<(), MemoryError> {
        let topic = topic_id(query);
        self.graph.add_entity(
            &topic,
            EntityKind::Topic,
            query,
            json!({ "keywords": query_keywords(query), "result_count": total }),
        )?;

        for (source, results) in by_source {
            let n = results.len();
            let source_id = format!("source_{source}");
            self.graph
                .add_entity(&source_id, EntityKind::Source, source, json!({}))?;
            let avg_quality = results.iter().map(|r| r.relevance_score).sum::<f64>() / n as f64;
            let strength = (n as f64 / total as f64) * avg_quality;
            self.graph.add_relationship(
                &topic,
                &source_id,
                "found_in",
                strength,
                json!({ "result_count": n, "avg_quality": avg_quality }),
            )?;
        }
        Ok(())
    }

    pub fn sessions(&self, project_id: &str) -> Result<Vec<SessionSummary>, MemoryError> {
        self.db.with(|conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, project_id, query, sources_used, start_time, end_time,
                        total_results, avg_quality_score, strategy_used
                 FROM search_sessions WHERE project_id = ?1
                 ORDER BY start_time ASC, session_id ASC",
            )?;
            let rows = stmt.query_map(params![project_id], |row| {
                Ok(SessionSummary {
                    session_id: row.get(0)?,
                    project_id: row.get(1)?,
                    query: row.get(2)?,
                    sources_used: json_col(row, 3)?,
                    start_time: ts_col(row, 4)?,
                    end_time: ts_col(row, 5)?,
                    total_results: count(row.get(6)?),
                    avg_quality_score: row.get(7)?,
                    strategy_used: row.get(8)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recommendations and insights
    // ─────────────────────────────────────────────────────────────────────────

    /// Combine learned recommendations with the sources that served similar
    /// topics. A strategy is created when confidence exceeds 0.5.
    pub fn get_research_recommendations(
        &self,
        query: &str,
        research_type: Option<&str>,
    ) -> Result<ResearchRecommendations, MemoryError> {
        let learned = self.learning.get_optimization_recommendations(query)?;
        let mut recs = ResearchRecommendations {
            optimized_strategy: None,
            source_priorities: learned.source_priorities,
            similar_topics: Vec::new(),
            query_suggestions: learned.query_suggestions,
            expected_quality: learned.expected_quality,
            confidence: learned.confidence,
        };

        let similar = self
            .graph
            .find_similar_topics(&query_keywords(query), DEFAULT_SIMILARITY_THRESHOLD)?;
        for topic in similar.iter().take(3) {
            for related in self.graph.get_related_entities(topic, Some("found_in"))? {
                let entry = recs
                    .source_priorities
                    .entry(related.name)
                    .or_insert(related.strength);
                *entry = entry.max(related.strength);
            }
        }
        recs.similar_topics = similar.into_iter().take(5).collect();

        if recs.confidence > STRATEGY_THRESHOLD {
            recs.optimized_strategy = self
                .learning
                .create_optimized_strategy(query, research_type.unwrap_or("general"))?;
        }
        Ok(recs)
    }

    pub fn get_memory_insights(&self) -> Result<MemoryInsights, MemoryError> {
        let trend_cutoff = (Utc::now() - Duration::days(TREND_DAYS))
            .format("%Y-%m-%d")
            .to_string();

        let mut insights = self.db.with(|conn| {
            let total_projects: i64 =
                conn.query_row("SELECT COUNT(*) FROM projects", [], |r| r.get(0))?;
            let total_results: i64 =
                conn.query_row("SELECT COUNT(*) FROM search_results", [], |r| r.get(0))?;
            let avg_quality: Option<f64> = conn.query_row(
                "SELECT AVG(avg_relevance_score) FROM projects
                 WHERE avg_relevance_score IS NOT NULL",
                [],
                |r| r.get(0),
            )?;

            let mut stmt = conn.prepare(
                "SELECT source, AVG(relevance_score) AS avg_score, COUNT(*) AS n
                 FROM search_results
                 GROUP BY source
                 ORDER BY avg_score DESC, n DESC, source ASC
                 LIMIT 5",
            )?;
            let sources = stmt
                .query_map([], |row| {
                    Ok(SourceStats {
                        source: row.get(0)?,
                        avg_score: row.get(1)?,
                        count: count(row.get(2)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            let mut stmt = conn.prepare(
                "SELECT substr(created_at, 1, 10) AS day, COUNT(*)
                 FROM projects
                 WHERE substr(created_at, 1, 10) >= ?1
                 GROUP BY day
                 ORDER BY day DESC",
            )?;
            let trends = stmt
                .query_map(params![trend_cutoff], |row| {
                    Ok(DailyCount {
                        date: row.get(0)?,
                        count: count(row.get(1)?),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(MemoryInsights {
                total_projects: count(total_projects),
                total_results: count(total_results),
                avg_project_quality: avg_quality.unwrap_or(0.0),
                most_successful_sources: sources,
                research_trends: trends,
                learning_insights_count: 0,
                knowledge_entities: 0,
            })
        })?;

        insights.learning_insights_count = self.learning.insight_count()?;
        insights.knowledge_entities = self.graph.entity_count()?;
        Ok(insights)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Retention
    // ─────────────────────────────────────────────────────────────────────────

    /// Archive projects older than `days_to_keep` days and drop the raw
    /// results of archived projects past the cutoff. Learned patterns,
    /// insights and the knowledge graph are kept.
    pub fn cleanup_old_data(&self, days_to_keep: u32) -> Result<CleanupReport, MemoryError> {
        let Some(cutoff) = Utc::now().checked_sub_signed(Duration::days(i64::from(days_to_keep)))
        else {
            debug!(days_to_keep, "retention reaches past the calendar, nothing to clean");
            return Ok(CleanupReport::default());
        };
        let cutoff = ts(cutoff);
        let report = self.db.with(|conn| {
            let tx = conn.transaction()?;
            let archived = tx.execute(
                "UPDATE projects SET status = 'archived'
                 WHERE created_at < ?1 AND status != 'archived'",
                params![cutoff],
            )?;
            let deleted = tx.execute(
                "DELETE FROM search_results
                 WHERE project_id IN (
                     SELECT project_id FROM projects
                     WHERE status = 'archived' AND created_at < ?1
                 )",
                params![cutoff],
            )?;
            tx.commit()?;
            Ok(CleanupReport {
                archived_projects: archived as u64,
                deleted_results: deleted as u64,
            })
        })?;
        info!(
            days_to_keep,
            archived = report.archived_projects,
            deleted = report.deleted_results,
            "old research data cleaned up"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> AdvancedMemorySystem {
        AdvancedMemorySystem::open_in_memory().unwrap()
    }

    fn hit(source: &str, score: f64) -> SearchResult {
        let mut r = SearchResult::new(&format!("{source} hit"), "https://x", "body", source);
        r.relevance_score = score;
        r
    }

    fn project(query: &str, age_days: i64) -> ResearchProject {
        let mut p = ResearchProject::new(query, "test", vec!["github".into(), "web".into()]);
        p.created_at = Utc::now() - Duration::days(age_days);
        p.updated_at = p.created_at;
        p
    }

    // ── projects ─────────────────────────────────────────────────────────────

    #[test]
    fn project_roundtrip_keeps_optional_fields() {
        let m = memory();
        let mut p = project("rust web", 0);
        p.research_type = Some("technology_analysis".into());
        p.tags = vec!["rust".into()];
        p.parent_project_id = Some("parent".into());
        m.save_project(&p).unwrap();

        let back = m.get_project(&p.project_id).unwrap().expect("saved");
        assert_eq!(back.query, "rust web");
        assert_eq!(back.status, ProjectStatus::InProgress);
        assert_eq!(back.tags, vec!["rust"]);
        assert_eq!(back.parent_project_id.as_deref(), Some("parent"));
        assert!(back.avg_relevance_score.is_none());
    }

    #[test]
    fn unknown_project_is_none_and_status_update_not_found() {
        let m = memory();
        assert!(m.get_project("ghost").unwrap().is_none());
        assert!(matches!(
            m.set_project_status("ghost", ProjectStatus::Completed),
            Err(MemoryError::NotFound(_))
        ));
    }

    #[test]
    fn list_projects_filters_by_status() {
        let m = memory();
        let a = project("a topic", 2);
        let b = project("b topic", 1);
        m.save_project(&a).unwrap();
        m.save_project(&b).unwrap();
        m.set_project_status(&a.project_id, ProjectStatus::Completed).unwrap();

        let all = m.list_projects(None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].project_id, b.project_id);

        let done = m.list_projects(Some(ProjectStatus::Completed)).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].project_id, a.project_id);
    }

    // ── results ──────────────────────────────────────────────────────────────

    #[test]
    fn results_roundtrip_and_refresh_stats() {
        let m = memory();
        let p = project("rust web", 0);
        m.save_project(&p).unwrap();

        let mut scored = hit("github", 0.8);
        scored.breakdown = Some(scout_types::ScoreBreakdown { recency: 1.0, ..Default::default() });
        scored.metadata.insert("stars".into(), json!(1200));
        m.save_search_results(&p.project_id, &[scored, hit("web", 0.4)]).unwrap();

        let back = m.get_search_results(&p.project_id).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].metadata["stars"], 1200);
        assert_eq!(back[0].recency_factor(), 1.0);
        assert!(back[1].breakdown.is_none());

        let refreshed = m.refresh_project_stats(&p.project_id).unwrap();
        assert_eq!(refreshed.results_count, 2);
        assert!((refreshed.avg_relevance_score.unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn refresh_unknown_project_is_not_found() {
        assert!(matches!(
            memory().refresh_project_stats("ghost"),
            Err(MemoryError::NotFound(_))
        ));
    }

    // ── sessions ─────────────────────────────────────────────────────────────

    #[test]
    fn store_session_feeds_learning_and_graph() {
        let m = memory();
        let sources = vec!["github".to_string(), "web".to_string()];
        let results = vec![hit("github", 0.8), hit("github", 0.6), hit("web", 0.5)];
        let mut session = NewSession::new("p1", "AI frameworks Python", &sources, &results);
        session.strategy_used = Some("default");
        let id = m.store_research_session(&session).unwrap();

        let sessions = m.sessions("p1").unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, id);
        assert_eq!(sessions[0].total_results, 3);
        assert!((sessions[0].avg_quality_score - 1.9 / 3.0).abs() < 1e-9);
        assert_eq!(sessions[0].strategy_used.as_deref(), Some("default"));

        assert_eq!(m.learning().patterns().unwrap().len(), 1);

        let topic = topic_id("AI frameworks Python");
        let entity = m.knowledge_graph().entity(&topic).unwrap().expect("topic");
        assert_eq!(entity.properties["result_count"], 3);
        assert_eq!(entity.properties["keywords"], json!(["frameworks", "python"]));

        let related = m.knowledge_graph().get_related_entities(&topic, Some("found_in")).unwrap();
        assert_eq!(related.len(), 2);
        assert_eq!(related[0].name, "github");
        assert!((related[0].strength - (2.0 / 3.0) * 0.7).abs() < 1e-9);
    }

    #[test]
    fn empty_session_has_zero_quality() {
        let m = memory();
        let id = m
            .store_research_session(&NewSession::new("p", "rust web", &[], &[]))
            .unwrap();
        let s = &m.sessions("p").unwrap()[0];
        assert_eq!(s.session_id, id);
        assert_eq!(s.avg_quality_score, 0.0);
        assert_eq!(m.knowledge_graph().entity_count().unwrap(), 1);
    }

    #[test]
    fn topic_id_is_deterministic() {
        assert_eq!(topic_id("rust web"), topic_id("rust web"));
        assert_ne!(topic_id("rust web"), topic_id("rust cli"));
        assert_eq!(topic_id("rust web").len(), 12);
    }

    // ── recommendations ──────────────────────────────────────────────────────

    #[test]
    fn recommendations_merge_similar_topic_sources() {
        let m = memory();
        let sources = vec!["github".to_string(), "reddit".to_string()];
        let results = vec![
            hit("github", 0.9),
            hit("github", 0.9),
            hit("reddit", 0.3),
            hit("reddit", 0.3),
            hit("reddit", 0.3),
        ];
        m.store_research_session(&NewSession::new("p", "rust web frameworks", &sources, &results))
            .unwrap();

        let recs = m
            .get_research_recommendations("rust web servers", Some("technology_analysis"))
            .unwrap();
        assert_eq!(recs.similar_topics, vec![topic_id("rust web frameworks")]);
        assert!(recs.source_priorities.contains_key("github"));
        assert!(recs.source_priorities.contains_key("reddit"));
        assert_eq!(recs.ranked_sources()[0], "github");
        assert!(recs.confidence > 0.5);
        let strategy = recs.optimized_strategy.expect("strategy");
        assert_eq!(strategy.name, "Optimized Strategy for technology_analysis");
    }

    #[test]
    fn recommendations_without_history_are_empty() {
        let recs = memory().get_research_recommendations("anything", None).unwrap();
        assert!(recs.source_priorities.is_empty());
        assert!(recs.similar_topics.is_empty());
        assert!(recs.optimized_strategy.is_none());
    }

    // ── insights ─────────────────────────────────────────────────────────────

    #[test]
    fn memory_insights_aggregate_everything() {
        let m = memory();
        let p = project("rust web", 0);
        let old = project("cobol mainframes", 60);
        m.save_project(&p).unwrap();
        m.save_project(&old).unwrap();
        m.save_search_results(&p.project_id, &[hit("github", 0.9), hit("web", 0.5), hit("web", 0.5)])
            .unwrap();
        m.refresh_project_stats(&p.project_id).unwrap();

        let i = m.get_memory_insights().unwrap();
        assert_eq!(i.total_projects, 2);
        assert_eq!(i.total_results, 3);
        assert!((i.avg_project_quality - 1.9 / 3.0).abs() < 1e-9);
        assert_eq!(i.most_successful_sources[0].source, "github");
        assert_eq!(i.most_successful_sources[1].count, 2);
        assert_eq!(i.research_trends.len(), 1);
        assert_eq!(i.research_trends[0].count, 1);
    }

    #[test]
    fn empty_memory_insights_are_zero() {
        let i = memory().get_memory_insights().unwrap();
        assert_eq!(i.total_projects, 0);
        assert_eq!(i.avg_project_quality, 0.0);
        assert!(i.most_successful_sources.is_empty());
    }

    // ── cleanup ──────────────────────────────────────────────────────────────

    #[test]
    fn cleanup_archives_old_projects_and_keeps_learning() {
        let m = memory();
        let fresh = project("rust web", 1);
        let stale = project("rust web", 120);
        m.save_project(&fresh).unwrap();
        m.save_project(&stale).unwrap();
        m.save_search_results(&fresh.project_id, &[hit("github", 0.7)]).unwrap();
        m.save_search_results(&stale.project_id, &[hit("github", 0.7), hit("web", 0.2)])
            .unwrap();
        let sources = vec!["github".to_string()];
        let results = vec![hit("github", 0.7)];
        m.store_research_session(&NewSession::new(&stale.project_id, "rust web", &sources, &results))
            .unwrap();

        let report = m.cleanup_old_data(90).unwrap();
        assert_eq!(report, CleanupReport { archived_projects: 1, deleted_results: 2 });
        assert_eq!(
            m.get_project(&stale.project_id).unwrap().unwrap().status,
            ProjectStatus::Archived
        );
        assert_eq!(m.get_search_results(&fresh.project_id).unwrap().len(), 1);
        assert!(m.get_search_results(&stale.project_id).unwrap().is_empty());
        assert_eq!(m.learning().patterns().unwrap().len(), 1);

        let again = m.cleanup_old_data(90).unwrap();
        assert_eq!(again, CleanupReport::default());
    }

    #[test]
    fn cleanup_with_huge_retention_keeps_everything() {
        let m = memory();
        let stale = project("rust web", 120);
        m.save_project(&stale).unwrap();
        m.save_search_results(&stale.project_id, &[hit("github", 0.7)]).unwrap();

        let report = m.cleanup_old_data(200_000_000).unwrap();
        assert_eq!(report, CleanupReport::default());
        let report = m.cleanup_old_data(u32::MAX).unwrap();
        assert_eq!(report, CleanupReport::default());
        assert_eq!(
            m.get_project(&stale.project_id).unwrap().unwrap().status,
            ProjectStatus::InProgress
        );
        assert_eq!(m.get_search_results(&stale.project_id).unwrap().len(), 1);
    }

    #[test]
    fn open_creates_database_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let data = dir.path().join("data");
        let m = AdvancedMemorySystem::open(&data).unwrap();
        assert!(data.join(MEMORY_DB_FILE).exists());
        assert_eq!(m.data_dir(), Some(data.as_path()));
    }
}
