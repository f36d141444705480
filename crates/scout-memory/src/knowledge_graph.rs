//! Knowledge graph of research topics and the sources that served them.
//!
//! # Storage layout
//!
//! | table            | purpose                                                  |
//! |------------------|----------------------------------------------------------|
//! | `entities`       | topics, sources and results keyed by `entity_id`         |
//! | `relationships`  | directed, weighted edges; one row per observation        |
//! | `topic_clusters` | groups of topics sharing keywords (rebuilt on demand)    |
//!
//! Topics carry a `keywords` array in their JSON properties; similarity
//! between keyword sets is `|A ∩ B| / max(|A|, |B|)`.
//!
//! # Example
//!
//! ```rust
//! use scout_memory::db::Database;
//! use scout_memory::knowledge_graph::{EntityKind, KnowledgeGraph};
//! use serde_json::json;
//!
//! let graph = KnowledgeGraph::new(Database::open_in_memory().unwrap()).unwrap();
//! graph
//!     .add_entity("t1", EntityKind::Topic, "rust web frameworks",
//!                 json!({"keywords": ["rust", "web", "frameworks"]}))
//!     .unwrap();
//! graph.add_entity("source_github", EntityKind::Source, "github", json!({})).unwrap();
//! graph.add_relationship("t1", "source_github", "found_in", 0.8, json!({})).unwrap();
//!
//! let similar = graph.find_similar_topics(&["rust".into(), "web".into()], 0.3).unwrap();
//! assert_eq!(similar, vec!["t1"]);
//! ```

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::db::{Database, MemoryError, json_col, ts, ts_col};

/// Default similarity threshold for topic matching.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Topic,
    Source,
    Result,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Topic => "topic",
            EntityKind::Source => "source",
            EntityKind::Result => "result",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "topic" => Some(EntityKind::Topic),
            "source" => Some(EntityKind::Source),
            "result" => Some(EntityKind::Result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    pub kind: EntityKind,
    pub name: String,
    pub properties: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An entity reached over an outgoing edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub entity_id: String,
    pub kind: EntityKind,
    pub name: String,
    pub properties: Value,
    pub strength: f64,
    pub relationship_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicCluster {
    pub cluster_id: String,
    pub cluster_name: String,
    pub keywords: Vec<String>,
    pub entities: Vec<String>,
    pub coherence_score: f64,
    pub created_at: DateTime<Utc>,
}

/// Overlap of two keyword sets relative to the larger one.
///
/// Returns `0.0` when both sets are empty.
pub fn keyword_similarity(a: &[String], b: &[String]) -> f64 {
    let a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let b: HashSet<&str> = b.iter().map(String::as_str).collect();
    let denom = a.len().max(b.len());
    if denom == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / denom as f64
}

fn kind_col(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<EntityKind> {
    let raw: String = row.get(idx)?;
    EntityKind::parse(&raw).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(idx, raw, rusqlite::types::Type::Text)
    })
}

fn topic_keywords(properties: &Value) -> Vec<String> {
    properties
        .get("keywords")
        .and_then(Value::as_array)
        .map(|kw| {
            kw.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// SQLite-backed graph of topics, sources and their relationships.
pub struct KnowledgeGraph {
    db: Database,
}

impl KnowledgeGraph {
    pub fn new(db: Database) -> Result<Self, MemoryError> {
        let graph = Self { db };
        graph.init_schema()?;
        Ok(graph)
    }

    fn init_schema(&self) -> Result<(), MemoryError> {
        self.db.with(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS entities (
                    entity_id   TEXT NOT NULL PRIMARY KEY,
                    entity_type TEXT NOT NULL,
                    name        TEXT NOT NULL,
                    properties  TEXT NOT NULL,
                    created_at  TEXT NOT NULL,
                    updated_at  TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS relationships (
                    id                INTEGER PRIMARY KEY AUTOINCREMENT,
                    source_entity     TEXT NOT NULL,
                    target_entity     TEXT NOT NULL,
                    relationship_type TEXT NOT NULL,
                    strength          REAL NOT NULL,
                    properties        TEXT NOT NULL,
                    created_at        TEXT NOT NULL,
                    FOREIGN KEY (source_entity) REFERENCES entities (entity_id),
                    FOREIGN KEY (target_entity) REFERENCES entities (entity_id)
                );
                CREATE INDEX IF NOT EXISTS idx_relationships_source
                    ON relationships (source_entity);
                CREATE TABLE IF NOT EXISTS topic_clusters (
                    cluster_id      TEXT NOT NULL PRIMARY KEY,
                    cluster_name    TEXT NOT NULL,
                    keywords        TEXT NOT NULL,
                    entities        TEXT NOT NULL,
                    coherence_score REAL NOT NULL,
                    created_at      TEXT NOT NULL
                );",
            )?;
            Ok(())
        })
    }

    /// Insert or update an entity. The original `created_at` survives updates.
    pub fn add_entity(
        &self,
        entity_id: &str,
        kind: EntityKind,
        name: &str,
        properties: Value,
    ) -> Result<(), MemoryError> {
        let now = ts(Utc::now());
        let props = serde_json::to_string(&properties)?;
        self.db.with(|conn| {
            conn.execute(
                "INSERT INTO entities
                     (entity_id, entity_type, name, properties, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(entity_id) DO UPDATE SET
                     entity_type = excluded.entity_type,
                     name        = excluded.name,
                     properties  = excluded.properties,
                     updated_at  = excluded.updated_at",
                params![entity_id, kind.as_str(), name, props, now],
            )?;
            Ok(())
        })
    }

    pub fn entity(&self, entity_id: &str) -> Result<Option<Entity>, MemoryError> {
        self.db.with(|conn| {
            let entity = conn
                .query_row(
                    "SELECT entity_id, entity_type, name, properties, created_at, updated_at
                     FROM entities WHERE entity_id = ?1",
                    params![entity_id],
                    |row| {
                        Ok(Entity {
                            entity_id: row.get(0)?,
                            kind: kind_col(row, 1)?,
                            name: row.get(2)?,
                            properties: json_col(row, 3)?,
                            created_at: ts_col(row, 4)?,
                            updated_at: ts_col(row, 5)?,
                        })
                    },
                )
                .optional()?;
            Ok(entity)
        })
    }

    pub fn entity_count(&self) -> Result<u64, MemoryError> {
        self.db.with(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM entities", [], |r| r.get(0))?;
            Ok(crate::db::count(n))
        })
    }

    /// Record an edge from `source` to `target`.
    pub fn add_relationship(
        &self,
        source: &str,
        target: &str,
        relationship_type: &str,
        strength: f64,
        properties: Value,
    ) -> Result<(), MemoryError> {
        let props = serde_json::to_string(&properties)?;
        self.db.with(|conn| {
            conn.execute(
                "INSERT INTO relationships
                     (source_entity, target_entity, relationship_type, strength, properties, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![source, target, relationship_type, strength, props, ts(Utc::now())],
            )?;
            Ok(())
        })
    }

    /// Entities reachable over outgoing edges of `entity_id`, strongest first.
    pub fn get_related_entities(
        &self,
        entity_id: &str,
        relationship_type: Option<&str>,
    ) -> Result<Vec<RelatedEntity>, MemoryError> {
        self.db.with(|conn| {
            let mut stmt = conn.prepare(
                "SELECT e.entity_id, e.entity_type, e.name, e.properties,
                        r.strength, r.relationship_type
                 FROM relationships r
                 JOIN entities e ON e.entity_id = r.target_entity
                 WHERE r.source_entity = ?1
                   AND (?2 IS NULL OR r.relationship_type = ?2)
                 ORDER BY r.strength DESC, r.id ASC",
            )?;
            let rows = stmt.query_map(params![entity_id, relationship_type], |row| {
                Ok(RelatedEntity {
                    entity_id: row.get(0)?,
                    kind: kind_col(row, 1)?,
                    name: row.get(2)?,
                    properties: json_col(row, 3)?,
                    strength: row.get(4)?,
                    relationship_type: row.get(5)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// `(entity_id, name, keywords)` of every topic, oldest first.
    fn topics(&self) -> Result<Vec<(String, String, Vec<String>)>, MemoryError> {
        self.db.with(|conn| {
            let mut stmt = conn.prepare(
                "SELECT entity_id, name, properties FROM entities
                 WHERE entity_type = 'topic'
                 ORDER BY created_at ASC, entity_id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                let props: Value = json_col(row, 2)?;
                Ok((row.get(0)?, row.get(1)?, topic_keywords(&props)))
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Ids of topics whose keywords overlap `keywords` by at least
    /// `threshold`, most similar first (ties broken by id).
    pub fn find_similar_topics(
        &self,
        keywords: &[String],
        threshold: f64,
    ) -> Result<Vec<String>, MemoryError> {
        let mut scored: Vec<(String, f64)> = self
            .topics()?
            .into_iter()
            .filter_map(|(id, _, topic_kw)| {
                if keywords.is_empty() && topic_kw.is_empty() {
                    return None;
                }
                let sim = keyword_similarity(keywords, &topic_kw);
                (sim >= threshold).then_some((id, sim))
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(scored.into_iter().map(|(id, _)| id).collect())
    }

    /// Rebuild topic clusters.
    ///
    /// Topics are visited oldest first; each unclustered topic seeds a cluster
    /// that absorbs every remaining topic at least `threshold` similar to the
    /// seed. Coherence is the mean similarity of members to the seed (1.0 for
    /// singletons). Previous clusters are replaced.
    pub fn cluster_topics(&self, threshold: f64) -> Result<Vec<TopicCluster>, MemoryError> {
        let topics = self.topics()?;
        let mut assigned = vec![false; topics.len()];
        let mut clusters = Vec::new();
        let now = Utc::now();

        for (i, (seed_id, seed_name, seed_kw)) in topics.iter().enumerate() {
            if assigned[i] {
                continue;
            }
            assigned[i] = true;
            let mut members = vec![seed_id.clone()];
            let mut keywords: BTreeSet<String> = seed_kw.iter().cloned().collect();
            let mut similarities = Vec::new();

            for (j, (id, _, kw)) in topics.iter().enumerate().skip(i + 1) {
                if assigned[j] {
                    continue;
                }
                let sim = keyword_similarity(seed_kw, kw);
                if sim >= threshold {
                    assigned[j] = true;
                    members.push(id.clone());
                    keywords.extend(kw.iter().cloned());
                    similarities.push(sim);
                }
            }

            let coherence_score = if similarities.is_empty() {
                1.0
            } else {
                similarities.iter().sum::<f64>() / similarities.len() as f64
            };
            clusters.push(TopicCluster {
                cluster_id: format!("cluster_{seed_id}"),
                cluster_name: seed_name.clone(),
                keywords: keywords.into_iter().collect(),
                entities: members,
                coherence_score,
                created_at: now,
            });
        }

        self.db.with(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM topic_clusters", [])?;
            for c in &clusters {
                tx.execute(
                    "INSERT INTO topic_clusters
                         (cluster_id, cluster_name, keywords, entities, coherence_score, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        c.cluster_id,
                        c.cluster_name,
                        serde_json::to_string(&c.keywords)?,
                        serde_json::to_string(&c.entities)?,
                        c.coherence_score,
                        ts(c.created_at),
                    ],
                )?;
            }
            tx.commit()?;
            Ok(())
        })?;
        debug!(clusters = clusters.len(), "topic clusters rebuilt");
        Ok(clusters)
    }

    /// Stored clusters, most coherent first.
    pub fn topic_clusters(&self) -> Result<Vec<TopicCluster>, MemoryError> {
        self.db.with(|conn| {
            let mut stmt = conn.prepare(
                "SELECT cluster_id, cluster_name, keywords, entities, coherence_score, created_at
                 FROM topic_clusters
                 ORDER BY coherence_score DESC, cluster_id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(TopicCluster {
                    cluster_id: row.get(0)?,
                    cluster_name: row.get(1)?,
                    keywords: json_col(row, 2)?,
                    entities: json_col(row, 3)?,
                    coherence_score: row.get(4)?,
                    created_at: ts_col(row, 5)?,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graph() -> KnowledgeGraph {
        KnowledgeGraph::new(Database::open_in_memory().unwrap()).unwrap()
    }

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn add_topic(g: &KnowledgeGraph, id: &str, words: &[&str]) {
        g.add_entity(id, EntityKind::Topic, &words.join(" "), json!({ "keywords": words }))
            .unwrap();
    }

    // ── keyword_similarity ───────────────────────────────────────────────────

    #[test]
    fn similarity_relative_to_larger_set() {
        let s = keyword_similarity(&kw(&["rust", "web"]), &kw(&["rust", "web", "async", "http"]));
        assert!((s - 0.5).abs() < 1e-9);
    }

    #[test]
    fn similarity_of_empty_sets_is_zero() {
        assert_eq!(keyword_similarity(&[], &[]), 0.0);
    }

    // ── entities ─────────────────────────────────────────────────────────────

    #[test]
    fn add_entity_upsert_preserves_created_at() {
        let g = graph();
        g.add_entity("s", EntityKind::Source, "github", json!({})).unwrap();
        let first = g.entity("s").unwrap().unwrap();
        g.add_entity("s", EntityKind::Source, "GitHub", json!({"v": 2})).unwrap();
        let second = g.entity("s").unwrap().unwrap();

        assert_eq!(g.entity_count().unwrap(), 1);
        assert_eq!(second.name, "GitHub");
        assert_eq!(second.properties["v"], 2);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn missing_entity_is_none() {
        assert!(graph().entity("nope").unwrap().is_none());
    }

    // ── relationships ────────────────────────────────────────────────────────

    #[test]
    fn related_entities_ordered_by_strength_and_filtered() {
        let g = graph();
        add_topic(&g, "t", &["rust"]);
        g.add_entity("a", EntityKind::Source, "reddit", json!({})).unwrap();
        g.add_entity("b", EntityKind::Source, "github", json!({})).unwrap();
        g.add_relationship("t", "a", "found_in", 0.2, json!({})).unwrap();
        g.add_relationship("t", "b", "found_in", 0.9, json!({"result_count": 3})).unwrap();
        g.add_relationship("t", "a", "mentions", 1.0, json!({})).unwrap();

        let found = g.get_related_entities("t", Some("found_in")).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name, "github");
        assert_eq!(found[0].kind, EntityKind::Source);

        let all = g.get_related_entities("t", None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].relationship_type, "mentions");
    }

    // ── find_similar_topics ──────────────────────────────────────────────────

    #[test]
    fn similar_topics_respect_threshold_and_order() {
        let g = graph();
        add_topic(&g, "t1", &["rust", "web", "frameworks"]);
        add_topic(&g, "t2", &["rust", "web"]);
        add_topic(&g, "t3", &["cooking", "pasta"]);

        let found = g.find_similar_topics(&kw(&["rust", "web"]), 0.3).unwrap();
        assert_eq!(found, vec!["t2", "t1"]);

        let strict = g.find_similar_topics(&kw(&["rust", "web"]), 0.9).unwrap();
        assert_eq!(strict, vec!["t2"]);
    }

    #[test]
    fn similar_topics_skip_non_topics() {
        let g = graph();
        g.add_entity("s", EntityKind::Source, "rust", json!({"keywords": ["rust"]}))
            .unwrap();
        assert!(g.find_similar_topics(&kw(&["rust"]), 0.1).unwrap().is_empty());
    }

    // ── clusters ─────────────────────────────────────────────────────────────

    #[test]
    fn cluster_topics_groups_overlapping_keywords() {
        let g = graph();
        add_topic(&g, "t1", &["rust", "web", "frameworks"]);
        add_topic(&g, "t2", &["rust", "web", "servers"]);
        add_topic(&g, "t3", &["cooking", "pasta"]);

        let clusters = g.cluster_topics(0.5).unwrap();
        assert_eq!(clusters.len(), 2);
        let web = clusters.iter().find(|c| c.entities.len() == 2).unwrap();
        assert_eq!(web.cluster_id, "cluster_t1");
        assert!((web.coherence_score - 2.0 / 3.0).abs() < 1e-9);
        assert!(web.keywords.contains(&"servers".to_string()));

        let stored = g.topic_clusters().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].coherence_score, 1.0);
    }

    #[test]
    fn cluster_topics_replaces_previous_clusters() {
        let g = graph();
        add_topic(&g, "t1", &["rust"]);
        add_topic(&g, "t2", &["rust"]);
        assert_eq!(g.cluster_topics(0.5).unwrap().len(), 1);
        assert_eq!(g.cluster_topics(1.1).unwrap().len(), 2);
        assert_eq!(g.topic_clusters().unwrap().len(), 2);
    }
}
