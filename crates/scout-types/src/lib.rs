use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Free-form per-result metadata as delivered by a source (stars, forks,
/// subreddit, …).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Extract the keywords used to key learned patterns and topics.
///
/// Words shorter than three characters are dropped; the rest are lower-cased.
pub fn query_keywords(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.trim().to_lowercase())
        .collect()
}

/// Generate a short, random identifier (12 hex characters).
pub fn short_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(12);
    id
}

/// Per-factor breakdown of a result's score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreBreakdown {
    pub relevance: f64,
    pub authority: f64,
    pub recency: f64,
    pub engagement: f64,
    pub completeness: f64,
    /// Weighted sum of the five factors.
    pub overall: f64,
}

/// A single search result from any source.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    /// Source label, e.g. `"github"`, `"reddit"`, `"web"`.
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub relevance_score: f64,
    /// Set once the result has been through the scoring system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

impl SearchResult {
    pub fn new(title: &str, url: &str, content: &str, source: &str) -> Self {
        Self {
            title: title.to_string(),
            url: url.to_string(),
            content: content.to_string(),
            source: source.to_string(),
            timestamp: Utc::now(),
            metadata: Metadata::new(),
            relevance_score: 0.0,
            breakdown: None,
        }
    }

    /// Recency factor from the last scoring pass, `0.0` if unscored.
    pub fn recency_factor(&self) -> f64 {
        self.breakdown.map(|b| b.recency).unwrap_or(0.0)
    }
}

/// Lifecycle of a research project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    InProgress,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(ProjectStatus::InProgress),
            "completed" => Some(ProjectStatus::Completed),
            "archived" => Some(ProjectStatus::Archived),
            _ => None,
        }
    }
}

/// A research project and its bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchProject {
    pub project_id: String,
    pub query: String,
    pub description: String,
    pub sources: Vec<String>,
    pub status: ProjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub results_count: u64,
    pub avg_relevance_score: Option<f64>,
    pub research_type: Option<String>,
    pub methodology: Option<String>,
    pub tags: Vec<String>,
    pub parent_project_id: Option<String>,
}

impl ResearchProject {
    /// A fresh in-progress project with a generated id.
    pub fn new(query: &str, description: &str, sources: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            project_id: short_id(),
            query: query.to_string(),
            description: description.to_string(),
            sources,
            status: ProjectStatus::InProgress,
            created_at: now,
            updated_at: now,
            results_count: 0,
            avg_relevance_score: None,
            research_type: None,
            methodology: None,
            tags: Vec::new(),
            parent_project_id: None,
        }
    }
}

/// Kinds of research a methodology can be tailored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchType {
    TechnologyAnalysis,
    MarketResearch,
    CompetitiveAnalysis,
    TrendAnalysis,
    AcademicResearch,
    ProductResearch,
}

impl ResearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchType::TechnologyAnalysis => "technology_analysis",
            ResearchType::MarketResearch => "market_research",
            ResearchType::CompetitiveAnalysis => "competitive_analysis",
            ResearchType::TrendAnalysis => "trend_analysis",
            ResearchType::AcademicResearch => "academic_research",
            ResearchType::ProductResearch => "product_research",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "technology_analysis" => Some(ResearchType::TechnologyAnalysis),
            "market_research" => Some(ResearchType::MarketResearch),
            "competitive_analysis" => Some(ResearchType::CompetitiveAnalysis),
            "trend_analysis" => Some(ResearchType::TrendAnalysis),
            "academic_research" => Some(ResearchType::AcademicResearch),
            "product_research" => Some(ResearchType::ProductResearch),
            _ => None,
        }
    }
}

/// Priority level of a configured source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourcePriority {
    Low = 1,
    Medium = 2,
    High = 3,
}

/// Configuration for one research source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub enabled: bool,
    pub priority: SourcePriority,
    /// Requests per minute.
    pub rate_limit: u32,
    pub max_results: usize,
    pub quality_weight: f64,
    #[serde(default)]
    pub metadata_fields: Vec<String>,
    #[serde(default)]
    pub search_parameters: BTreeMap<String, String>,
}

/// Weights of the five scoring factors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub relevance: f64,
    pub authority: f64,
    pub recency: f64,
    pub engagement: f64,
    pub completeness: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            relevance: 0.30,
            authority: 0.25,
            recency: 0.20,
            engagement: 0.15,
            completeness: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub minimum_score: f64,
    pub high_quality_score: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            minimum_score: 0.3,
            high_quality_score: 0.7,
        }
    }
}

/// A complete research methodology: which sources to use, how to weigh
/// results and which analysis dimensions to report on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchMethodology {
    pub name: String,
    pub description: String,
    pub research_type: ResearchType,
    pub sources: Vec<String>,
    #[serde(default)]
    pub scoring_weights: ScoringWeights,
    #[serde(default)]
    pub quality_thresholds: QualityThresholds,
    #[serde(default)]
    pub enrichment_strategies: Vec<String>,
    #[serde(default)]
    pub analysis_dimensions: Vec<String>,
}

/// One record of a crawl export, as written by the fetchers that feed the
/// file adapter. The source is implied by the export file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FeedRecord {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    /// Publication or last-update time; the import time when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl FeedRecord {
    pub fn into_result(self, source: &str, imported_at: DateTime<Utc>) -> SearchResult {
        SearchResult {
            title: self.title,
            url: self.url,
            content: self.content,
            source: source.to_string(),
            timestamp: self.timestamp.unwrap_or(imported_at),
            metadata: self.metadata,
            relevance_score: 0.0,
            breakdown: None,
        }
    }
}

/// Errors crossing the adapter boundary.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum ScoutError {
    #[error("Source {source_name} failed: {details}")]
    SourceFailed { source_name: String, details: String },

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Malformed result data: {0}")]
    Malformed(String),
}
