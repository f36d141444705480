//! Research orchestration.
//!
//! [`Researcher`] ties the pieces together: it picks a methodology, asks the
//! memory system which sources have worked for similar queries, searches the
//! registered adapters under their rate limits, scores and filters what comes
//! back, persists it, feeds the learning engine and writes the dataset.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use scout_memory::memory_system::{MemoryInsights, NewSession};
use scout_memory::{AdvancedMemorySystem, MemoryError};
use scout_scoring::dataset::{DatasetInsight, DimensionAnalysis};
use scout_scoring::report::{
    QualityDistribution, ResultsSummary, SourceDistribution, project_recommendations,
    quality_distribution, results_summary, source_distribution,
};
use scout_scoring::{
    ConfigError, ConfigurationManager, DatasetError, DatasetManager, ScoringSystem,
    default_methodology,
};
use scout_types::{
    ProjectStatus, ResearchMethodology, ResearchProject, ResearchType, ScoutError, SearchResult,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::adapter::SearchAdapter;
use crate::rate_limit::SourceRateLimiter;

pub const DEFAULT_LIMIT_PER_SOURCE: usize = 15;
/// At most this many learned sources are searched when none are requested.
const MAX_RECOMMENDED_SOURCES: usize = 4;
const ENRICH_SOURCE_LIMIT: usize = 10;
const ENRICH_VARIATION_LIMIT: usize = 5;
/// Enrichment only keeps results at least this good.
pub const ENRICH_THRESHOLD: f64 = 0.4;
/// Query used to probe learned patterns for the insights report.
const GENERAL_QUERY: &str = "general research";

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Scout(#[from] ScoutError),
}

/// Parameters of a research run.
#[derive(Debug, Clone)]
pub struct ResearchRequest {
    pub query: String,
    pub description: String,
    /// Methodology key, e.g. `technology_analysis`.
    pub research_type: String,
    /// Explicit sources; when `None` learned priorities or the methodology
    /// decide.
    pub sources: Option<Vec<String>>,
    pub use_learning: bool,
    pub limit_per_source: usize,
    pub tags: Vec<String>,
}

impl ResearchRequest {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            description: String::new(),
            research_type: ResearchType::TechnologyAnalysis.as_str().to_string(),
            sources: None,
            use_learning: true,
            limit_per_source: DEFAULT_LIMIT_PER_SOURCE,
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchReport {
    pub project_id: String,
    pub session_id: String,
    pub query: String,
    pub research_type: String,
    pub methodology_used: String,
    pub sources_searched: Vec<String>,
    pub total_results: usize,
    pub high_quality_results: usize,
    pub quality_threshold: f64,
    pub dataset_path: PathBuf,
    pub learning_applied: bool,
    pub recommendations_confidence: f64,
    pub strategy_used: String,
    pub strategy_id: Option<String>,
    pub results_summary: ResultsSummary,
    pub insights: Vec<DatasetInsight>,
    pub analysis: BTreeMap<String, DimensionAnalysis>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentReport {
    pub project_id: String,
    /// `None` when the enrichment found nothing new.
    pub session_id: Option<String>,
    pub original_results_count: usize,
    pub new_results_count: usize,
    pub total_results_count: usize,
    pub quality_threshold: f64,
    pub dataset_path: Option<PathBuf>,
    pub new_results_summary: ResultsSummary,
    pub insights: Vec<DatasetInsight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectInsights {
    pub project_id: String,
    pub query: String,
    pub total_results: usize,
    pub avg_quality: f64,
    pub source_distribution: SourceDistribution,
    pub quality_distribution: QualityDistribution,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LearningPatterns {
    pub most_effective_sources: BTreeMap<String, f64>,
    pub confidence_level: f64,
    pub similar_topics_found: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchInsights {
    pub memory_insights: MemoryInsights,
    pub project: Option<ProjectInsights>,
    pub learning_patterns: LearningPatterns,
    pub recommendations: Vec<String>,
}

/// Advice derived from the state of the whole memory.
pub fn general_recommendations(insights: &MemoryInsights) -> Vec<String> {
    let mut recs = Vec::new();
    if insights.total_projects < 5 {
        recs.push(
            "Limited research history. Continue conducting research to improve learning and optimization."
                .to_string(),
        );
    }
    if let Some(top) = insights.most_successful_sources.first() {
        recs.push(format!(
            "Consider prioritizing {} (avg score: {:.2}) for future research.",
            top.source, top.avg_score
        ));
    }
    if insights.learning_insights_count > 10 {
        recs.push(
            "Rich learning data available. Enable learning mode for optimized research strategies."
                .to_string(),
        );
    }
    if insights.avg_project_quality > 0.7 {
        recs.push(
            "High-quality research patterns detected. Current methodology is working well."
                .to_string(),
        );
    } else if insights.avg_project_quality < 0.5 {
        recs.push(
            "Consider adjusting research methodology or quality thresholds to improve results."
                .to_string(),
        );
    }
    recs
}

/// Drives research runs over the registered search adapters.
pub struct Researcher {
    memory: AdvancedMemorySystem,
    configs: ConfigurationManager,
    datasets: DatasetManager,
    adapters: BTreeMap<String, Box<dyn SearchAdapter>>,
    limiter: SourceRateLimiter,
}

impl Researcher {
    pub fn new(
        memory: AdvancedMemorySystem,
        configs: ConfigurationManager,
        datasets: DatasetManager,
    ) -> Result<Self, ResearchError> {
        let limiter = SourceRateLimiter::from_configs(&configs.source_configs()?);
        Ok(Self {
            memory,
            configs,
            datasets,
            adapters: BTreeMap::new(),
            limiter,
        })
    }

    /// Memory under `<data_dir>/memory`, datasets under
    /// `<data_dir>/processed`, configuration in `config_dir`.
    pub fn open(data_dir: &Path, config_dir: &Path) -> Result<Self, ResearchError> {
        let memory = AdvancedMemorySystem::open(&data_dir.join("memory"))?;
        let configs = ConfigurationManager::new(config_dir)?;
        let datasets = DatasetManager::new(data_dir)?;
        Self::new(memory, configs, datasets)
    }

    /// Register (or replace) the adapter for its source.
    pub fn register(&mut self, adapter: Box<dyn SearchAdapter>) {
        let name = adapter.source_name().to_string();
        debug!(source = %name, "adapter registered");
        self.adapters.insert(name, adapter);
    }

    pub fn sources(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    pub fn memory(&self) -> &AdvancedMemorySystem {
        &self.memory
    }

    pub fn configs(&self) -> &ConfigurationManager {
        &self.configs
    }

    fn methodology(&self, research_type: &str) -> Result<ResearchMethodology, ResearchError> {
        Ok(match self.configs.load_methodology(research_type)? {
            Some(m) => m,
            None => {
                warn!(research_type, "unknown research type, using default methodology");
                default_methodology(research_type)
            }
        })
    }

    /// Search each source that has an adapter. Failures are logged and
    /// skipped. Returns the results and the seconds spent per source.
    async fn search_sources(
        &self,
        sources: &[String],
        query: &str,
        limit: usize,
    ) -> (Vec<SearchResult>, BTreeMap<String, f64>) {
        let mut results = Vec::new();
        let mut times = BTreeMap::new();
        for source in sources {
            let Some(adapter) = self.adapters.get(source) else {
                debug!(source = %source, "no adapter registered, skipping");
                continue;
            };
            self.limiter.until_ready(source).await;
            let started = Instant::now();
            match adapter.search(query, limit).await {
                Ok(found) => {
                    info!(source = %source, query, found = found.len(), "source searched");
                    results.extend(found);
                }
                Err(e) => warn!(source = %source, query, error = %e, "search failed"),
            }
            *times.entry(source.clone()).or_insert(0.0) += started.elapsed().as_secs_f64();
        }
        (results, times)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Research
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn conduct_research(
        &self,
        request: &ResearchRequest,
    ) -> Result<ResearchReport, ResearchError> {
        let started_at = Utc::now();
        let query = request.query.as_str();
        info!(query, research_type = %request.research_type, "research started");

        let methodology = self.methodology(&request.research_type)?;
        let recommendations = if request.use_learning {
            let recs = self
                .memory
                .get_research_recommendations(query, Some(&request.research_type))?;
            info!(confidence = recs.confidence, "learning recommendations loaded");
            Some(recs)
        } else {
            None
        };

        let sources = match (&request.sources, &recommendations) {
            (Some(explicit), _) => explicit.clone(),
            (None, Some(recs)) if !recs.source_priorities.is_empty() => recs
                .ranked_sources()
                .into_iter()
                .take(MAX_RECOMMENDED_SOURCES)
                .collect(),
            _ => methodology.sources.clone(),
        };
        info!(sources = ?sources, "sources selected");

        let mut project = ResearchProject::new(query, &request.description, sources.clone());
        project.research_type = Some(request.research_type.clone());
        project.methodology = Some(methodology.name.clone());
        project.tags = request.tags.clone();
        self.memory.save_project(&project)?;

        let (mut results, execution_times) = self
            .search_sources(&sources, query, request.limit_per_source)
            .await;
        let scorer = ScoringSystem::with_weights(methodology.scoring_weights);
        let now = Utc::now();
        for r in &mut results {
            scorer.apply(r, query, now);
        }
        let threshold = methodology.quality_thresholds.minimum_score;
        let total_results = results.len();
        let kept: Vec<SearchResult> = results
            .into_iter()
            .filter(|r| r.relevance_score >= threshold)
            .collect();
        info!(kept = kept.len(), total = total_results, threshold, "results filtered");

        self.memory.save_search_results(&project.project_id, &kept)?;

        let strategy = recommendations
            .as_ref()
            .and_then(|r| r.optimized_strategy.as_ref());
        let strategy_used = strategy.map_or_else(|| "default".to_string(), |s| s.name.clone());
        let strategy_id = strategy.map(|s| s.strategy_id.clone());
        if let Some(id) = &strategy_id {
            self.memory.learning().record_strategy_use(id)?;
        }

        let mut session = NewSession::new(&project.project_id, query, &sources, &kept);
        session.strategy_used = Some(strategy_used.as_str());
        session.execution_times = execution_times;
        session.started_at = started_at;
        let session_id = self.memory.store_research_session(&session)?;

        let dataset =
            self.datasets
                .create_comprehensive_dataset(&project.project_id, &kept, &methodology);
        let dataset_path = self.datasets.save_dataset(&dataset, "")?;

        self.memory.refresh_project_stats(&project.project_id)?;
        self.memory
            .set_project_status(&project.project_id, ProjectStatus::Completed)?;
        info!(project_id = %project.project_id, "research completed");

        Ok(ResearchReport {
            project_id: project.project_id,
            session_id,
            query: request.query.clone(),
            research_type: request.research_type.clone(),
            methodology_used: methodology.name,
            sources_searched: sources,
            total_results,
            high_quality_results: kept.len(),
            quality_threshold: threshold,
            dataset_path,
            learning_applied: request.use_learning,
            recommendations_confidence: recommendations.as_ref().map_or(0.0, |r| r.confidence),
            strategy_used,
            strategy_id,
            results_summary: results_summary(&kept),
            insights: dataset.insights,
            analysis: dataset.analysis,
        })
    }

    /// Add results to an existing project from extra sources and query
    /// variations, scored against the project's original query.
    pub async fn enrich_research(
        &self,
        project_id: &str,
        additional_sources: &[String],
        query_variations: &[String],
    ) -> Result<EnrichmentReport, ResearchError> {
        let started_at = Utc::now();
        let project = self
            .memory
            .get_project(project_id)?
            .ok_or_else(|| ScoutError::ProjectNotFound(project_id.to_string()))?;
        let existing = self.memory.get_search_results(project_id)?;
        info!(project_id, existing = existing.len(), "enrichment started");

        let (mut found, mut execution_times) = self
            .search_sources(additional_sources, &project.query, ENRICH_SOURCE_LIMIT)
            .await;
        for variation in query_variations {
            let (more, times) = self
                .search_sources(&project.sources, variation, ENRICH_VARIATION_LIMIT)
                .await;
            found.extend(more);
            for (source, secs) in times {
                *execution_times.entry(source).or_insert(0.0) += secs;
            }
        }

        if found.is_empty() {
            warn!(project_id, "no new results found during enrichment");
            return Ok(EnrichmentReport {
                project_id: project_id.to_string(),
                session_id: None,
                original_results_count: existing.len(),
                new_results_count: 0,
                total_results_count: existing.len(),
                quality_threshold: ENRICH_THRESHOLD,
                dataset_path: None,
                new_results_summary: ResultsSummary::default(),
                insights: Vec::new(),
            });
        }

        let methodology = self.methodology(
            project
                .research_type
                .as_deref()
                .unwrap_or(ResearchType::TechnologyAnalysis.as_str()),
        )?;
        let scorer = ScoringSystem::with_weights(methodology.scoring_weights);
        let now = Utc::now();
        for r in &mut found {
            scorer.apply(r, &project.query, now);
        }
        let kept: Vec<SearchResult> = found
            .into_iter()
            .filter(|r| r.relevance_score >= ENRICH_THRESHOLD)
            .collect();
        self.memory.save_search_results(project_id, &kept)?;
        self.memory.refresh_project_stats(project_id)?;

        let session_query = format!("ENRICHMENT: {}", project.query);
        let mut session = NewSession::new(project_id, &session_query, additional_sources, &kept);
        session.strategy_used = Some("enrichment");
        session.execution_times = execution_times;
        session.started_at = started_at;
        let session_id = self.memory.store_research_session(&session)?;

        let mut all = existing;
        let original_results_count = all.len();
        all.extend(kept.iter().cloned());
        let dataset = self
            .datasets
            .create_comprehensive_dataset(project_id, &all, &methodology);
        let dataset_path = self.datasets.save_dataset(&dataset, "_enriched")?;
        info!(project_id, added = kept.len(), "enrichment completed");

        Ok(EnrichmentReport {
            project_id: project_id.to_string(),
            session_id: Some(session_id),
            original_results_count,
            new_results_count: kept.len(),
            total_results_count: all.len(),
            quality_threshold: ENRICH_THRESHOLD,
            dataset_path: Some(dataset_path),
            new_results_summary: results_summary(&kept),
            insights: dataset.insights,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Insights
    // ─────────────────────────────────────────────────────────────────────────

    pub fn research_insights(
        &self,
        project_id: Option<&str>,
    ) -> Result<ResearchInsights, ResearchError> {
        let memory_insights = self.memory.get_memory_insights()?;

        let project = match project_id {
            Some(id) => {
                let project = self
                    .memory
                    .get_project(id)?
                    .ok_or_else(|| ScoutError::ProjectNotFound(id.to_string()))?;
                let results = self.memory.get_search_results(id)?;
                let avg_quality = if results.is_empty() {
                    0.0
                } else {
                    results.iter().map(|r| r.relevance_score).sum::<f64>() / results.len() as f64
                };
                Some(ProjectInsights {
                    project_id: project.project_id,
                    query: project.query,
                    total_results: results.len(),
                    avg_quality,
                    source_distribution: source_distribution(&results),
                    quality_distribution: quality_distribution(&results),
                    recommendations: project_recommendations(&results),
                })
            }
            None => None,
        };

        let learned = self.memory.get_research_recommendations(GENERAL_QUERY, None)?;
        let learning_patterns = LearningPatterns {
            most_effective_sources: learned.source_priorities,
            confidence_level: learned.confidence,
            similar_topics_found: learned.similar_topics.len(),
        };

        Ok(ResearchInsights {
            recommendations: general_recommendations(&memory_insights),
            memory_insights,
            project,
            learning_patterns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::JsonFileAdapter;
    use scout_memory::memory_system::SourceStats;
    use tempfile::TempDir;

    const GITHUB_FEED: &str = r#"[
        {"title": "Rust web framework", "url": "https://github.com/x/web",
         "content": "A rust web server", "metadata": {"stars": 1000, "forks": 100}}
    ]"#;

    const WEB_FEED: &str = r#"[
        {"title": "Gardening", "url": "https://garden.example/rust",
         "content": "rust removal from tools", "timestamp": "2015-01-01T00:00:00Z"}
    ]"#;

    fn researcher() -> (TempDir, Researcher) {
        let dir = tempfile::tempdir().expect("tmp dir");
        let feeds = dir.path().join("feeds");
        std::fs::create_dir_all(&feeds).unwrap();
        std::fs::write(feeds.join("github.json"), GITHUB_FEED).unwrap();
        std::fs::write(feeds.join("web.json"), WEB_FEED).unwrap();

        let mut researcher =
            Researcher::open(&dir.path().join("data"), &dir.path().join("config")).unwrap();
        for adapter in JsonFileAdapter::discover(&feeds).unwrap() {
            researcher.register(Box::new(adapter));
        }
        (dir, researcher)
    }

    // ── conduct_research ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn research_scores_filters_and_persists() {
        let (_dir, r) = researcher();
        let report = r.conduct_research(&ResearchRequest::new("rust web")).await.unwrap();

        assert_eq!(report.sources_searched, vec!["github", "web", "reddit"]);
        assert_eq!(report.total_results, 2);
        assert_eq!(report.high_quality_results, 1);
        assert!((report.quality_threshold - 0.4).abs() < 1e-9);
        assert_eq!(report.strategy_used, "default");
        assert!(report.dataset_path.exists());
        assert_eq!(report.results_summary.top_results[0].source, "github");

        let project = r.memory().get_project(&report.project_id).unwrap().unwrap();
        assert_eq!(project.status, ProjectStatus::Completed);
        assert_eq!(project.results_count, 1);
        assert_eq!(project.methodology.as_deref(), Some("Technology Analysis"));
        assert_eq!(r.memory().sessions(&report.project_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn second_run_follows_learned_sources() {
        let (_dir, r) = researcher();
        r.conduct_research(&ResearchRequest::new("rust web")).await.unwrap();
        let report = r.conduct_research(&ResearchRequest::new("rust web")).await.unwrap();

        assert_eq!(report.sources_searched, vec!["github"]);
        assert!(report.recommendations_confidence > 0.5);
        assert_eq!(report.strategy_used, "Optimized Strategy for technology_analysis");
        let id = report.strategy_id.expect("strategy id");
        let strategy = r.memory().learning().strategy(&id).unwrap().unwrap();
        assert_eq!(strategy.usage_count, 1);
    }

    #[tokio::test]
    async fn explicit_sources_and_no_learning() {
        let (_dir, r) = researcher();
        let mut request = ResearchRequest::new("rust web");
        request.sources = Some(vec!["web".to_string()]);
        request.use_learning = false;
        let report = r.conduct_research(&request).await.unwrap();
        assert_eq!(report.sources_searched, vec!["web"]);
        assert_eq!(report.high_quality_results, 0);
        assert_eq!(report.recommendations_confidence, 0.0);
    }

    #[tokio::test]
    async fn unknown_research_type_uses_default_methodology() {
        let (_dir, r) = researcher();
        let mut request = ResearchRequest::new("rust web");
        request.research_type = "vibes".to_string();
        let report = r.conduct_research(&request).await.unwrap();
        assert_eq!(report.methodology_used, "Default vibes");
        assert!((report.quality_threshold - 0.3).abs() < 1e-9);
    }

    // ── enrich_research ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn enrichment_adds_results_and_regenerates_dataset() {
        let (_dir, r) = researcher();
        let base = r.conduct_research(&ResearchRequest::new("rust web")).await.unwrap();

        let report = r
            .enrich_research(&base.project_id, &["web".to_string()], &["framework".to_string()])
            .await
            .unwrap();
        assert_eq!(report.original_results_count, 1);
        assert_eq!(report.new_results_count, 1);
        assert_eq!(report.total_results_count, 2);
        let path = report.dataset_path.expect("dataset");
        assert!(path.to_string_lossy().ends_with("_dataset_enriched.json"));

        let project = r.memory().get_project(&base.project_id).unwrap().unwrap();
        assert_eq!(project.results_count, 2);
        let sessions = r.memory().sessions(&base.project_id).unwrap();
        assert_eq!(sessions.len(), 2);
        assert!(sessions.iter().any(|s| s.query == "ENRICHMENT: rust web"
            && s.strategy_used.as_deref() == Some("enrichment")));
    }

    #[tokio::test]
    async fn enrichment_without_new_results() {
        let (_dir, r) = researcher();
        let base = r.conduct_research(&ResearchRequest::new("rust web")).await.unwrap();
        let report = r
            .enrich_research(&base.project_id, &["reddit".to_string()], &[])
            .await
            .unwrap();
        assert_eq!(report.new_results_count, 0);
        assert!(report.session_id.is_none());
        assert!(report.dataset_path.is_none());
    }

    #[tokio::test]
    async fn enrichment_of_unknown_project_fails() {
        let (_dir, r) = researcher();
        let err = r.enrich_research("ghost", &[], &[]).await.unwrap_err();
        assert!(matches!(err, ResearchError::Scout(ScoutError::ProjectNotFound(_))));
    }

    // ── insights ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn insights_cover_memory_and_project() {
        let (_dir, r) = researcher();
        let base = r.conduct_research(&ResearchRequest::new("rust web")).await.unwrap();

        let insights = r.research_insights(Some(&base.project_id)).unwrap();
        assert_eq!(insights.memory_insights.total_projects, 1);
        let project = insights.project.expect("project section");
        assert_eq!(project.total_results, 1);
        assert_eq!(project.source_distribution.most_productive.as_deref(), Some("github"));
        assert!(insights.recommendations[0].starts_with("Limited research history"));
        assert!(insights.recommendations[1].contains("github"));

        assert!(r.research_insights(None).unwrap().project.is_none());
        assert!(r.research_insights(Some("ghost")).is_err());
    }

    #[test]
    fn general_recommendations_follow_memory_state() {
        let rich = MemoryInsights {
            total_projects: 12,
            avg_project_quality: 0.8,
            learning_insights_count: 11,
            most_successful_sources: vec![SourceStats {
                source: "github".to_string(),
                avg_score: 0.81,
                count: 30,
            }],
            ..Default::default()
        };
        let recs = general_recommendations(&rich);
        assert_eq!(recs.len(), 3);
        assert!(recs[0].contains("github (avg score: 0.81)"));
        assert!(recs[1].starts_with("Rich learning data"));
        assert!(recs[2].starts_with("High-quality"));

        let empty = general_recommendations(&MemoryInsights::default());
        assert_eq!(empty.len(), 2);
        assert!(empty[1].starts_with("Consider adjusting"));
    }
}
