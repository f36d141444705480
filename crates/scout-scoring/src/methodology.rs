//! Research configuration directory.
//!
//! Two TOML files live in the configuration directory:
//!
//! - `sources.toml` – one table per source (`[github]`, `[web]`, …) holding a
//!   [`SourceConfig`].
//! - `methodologies.toml` – one table per methodology key holding a
//!   [`ResearchMethodology`].
//!
//! Both are written with defaults the first time a [`ConfigurationManager`]
//! is opened on a directory; existing files are never overwritten.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use scout_types::{
    QualityThresholds, ResearchMethodology, ResearchType, ScoringWeights, SourceConfig,
    SourcePriority,
};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

fn source(
    name: &str,
    priority: SourcePriority,
    rate_limit: u32,
    max_results: usize,
    quality_weight: f64,
    fields: &[&str],
    params: &[(&str, &str)],
) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        enabled: true,
        priority,
        rate_limit,
        max_results,
        quality_weight,
        metadata_fields: fields.iter().map(|f| f.to_string()).collect(),
        search_parameters: params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_sources() -> BTreeMap<String, SourceConfig> {
    BTreeMap::from([
        (
            "github".to_string(),
            source(
                "GitHub",
                SourcePriority::High,
                60,
                20,
                0.9,
                &["stars", "forks", "language", "updated_at", "topics"],
                &[("sort", "stars"), ("order", "desc")],
            ),
        ),
        (
            "web".to_string(),
            source(
                "Web Search",
                SourcePriority::Medium,
                30,
                15,
                0.7,
                &["source_name", "type"],
                &[],
            ),
        ),
        (
            "reddit".to_string(),
            source(
                "Reddit",
                SourcePriority::Medium,
                60,
                15,
                0.6,
                &["subreddit", "score", "num_comments", "author"],
                &[("sort", "relevance"), ("t", "all")],
            ),
        ),
    ])
}

fn default_methodologies() -> BTreeMap<String, ResearchMethodology> {
    BTreeMap::from([
        (
            "technology_analysis".to_string(),
            ResearchMethodology {
                name: "Technology Analysis".to_string(),
                description: "Comprehensive analysis of technologies, frameworks, and tools"
                    .to_string(),
                research_type: ResearchType::TechnologyAnalysis,
                sources: strings(&["github", "web", "reddit"]),
                scoring_weights: ScoringWeights::default(),
                quality_thresholds: QualityThresholds {
                    minimum_score: 0.4,
                    high_quality_score: 0.7,
                },
                enrichment_strategies: strings(&[
                    "cross_reference_validation",
                    "trend_analysis",
                    "community_sentiment",
                ]),
                analysis_dimensions: strings(&[
                    "popularity",
                    "recency",
                    "authority",
                    "community_engagement",
                ]),
            },
        ),
        (
            "market_research".to_string(),
            ResearchMethodology {
                name: "Market Research".to_string(),
                description: "Market analysis and competitive intelligence".to_string(),
                research_type: ResearchType::MarketResearch,
                sources: strings(&["web", "reddit"]),
                scoring_weights: ScoringWeights {
                    relevance: 0.35,
                    authority: 0.30,
                    recency: 0.25,
                    engagement: 0.10,
                    completeness: 0.0,
                },
                quality_thresholds: QualityThresholds {
                    minimum_score: 0.5,
                    high_quality_score: 0.8,
                },
                enrichment_strategies: strings(&[
                    "competitive_analysis",
                    "market_sizing",
                    "trend_identification",
                ]),
                analysis_dimensions: strings(&["market_size", "competition", "trends", "opportunities"]),
            },
        ),
    ])
}

/// Fallback methodology for research types without a configured entry.
pub fn default_methodology(research_type: &str) -> ResearchMethodology {
    ResearchMethodology {
        name: format!("Default {research_type}"),
        description: format!("Default methodology for {research_type}"),
        research_type: ResearchType::parse(research_type)
            .unwrap_or(ResearchType::TechnologyAnalysis),
        sources: strings(&["github", "web", "reddit"]),
        scoring_weights: ScoringWeights::default(),
        quality_thresholds: QualityThresholds::default(),
        enrichment_strategies: strings(&["cross_reference_validation"]),
        analysis_dimensions: strings(&["popularity", "recency", "authority"]),
    }
}

/// Key under which a methodology is stored: lower-cased, spaces to `_`.
pub fn methodology_key(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Reads and writes the research configuration directory.
pub struct ConfigurationManager {
    sources_path: PathBuf,
    methodologies_path: PathBuf,
}

impl ConfigurationManager {
    /// Open `config_dir`, creating it and the default files when missing.
    pub fn new(config_dir: &Path) -> Result<Self, ConfigError> {
        fs::create_dir_all(config_dir).map_err(|source| ConfigError::Io {
            path: config_dir.to_path_buf(),
            source,
        })?;
        let manager = Self {
            sources_path: config_dir.join("sources.toml"),
            methodologies_path: config_dir.join("methodologies.toml"),
        };
        if !manager.sources_path.exists() {
            write_toml(&manager.sources_path, &default_sources())?;
            debug!(path = %manager.sources_path.display(), "wrote default source config");
        }
        if !manager.methodologies_path.exists() {
            write_toml(&manager.methodologies_path, &default_methodologies())?;
            debug!(path = %manager.methodologies_path.display(), "wrote default methodologies");
        }
        Ok(manager)
    }

    pub fn source_configs(&self) -> Result<BTreeMap<String, SourceConfig>, ConfigError> {
        read_toml(&self.sources_path)
    }

    pub fn load_source_config(&self, name: &str) -> Result<Option<SourceConfig>, ConfigError> {
        Ok(self.source_configs()?.remove(name))
    }

    fn methodologies(&self) -> Result<BTreeMap<String, ResearchMethodology>, ConfigError> {
        read_toml(&self.methodologies_path)
    }

    pub fn load_methodology(&self, key: &str) -> Result<Option<ResearchMethodology>, ConfigError> {
        Ok(self.methodologies()?.remove(key))
    }

    /// Keys of every configured methodology, sorted.
    pub fn available_methodologies(&self) -> Result<Vec<String>, ConfigError> {
        Ok(self.methodologies()?.into_keys().collect())
    }

    /// Add or replace a methodology; returns the key it was stored under.
    pub fn save_custom_methodology(
        &self,
        methodology: &ResearchMethodology,
    ) -> Result<String, ConfigError> {
        let key = methodology_key(&methodology.name);
        let mut all = self.methodologies()?;
        all.insert(key.clone(), methodology.clone());
        write_toml(&self.methodologies_path, &all)?;
        Ok(key)
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn write_toml<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let raw = toml::to_string_pretty(value)?;
    fs::write(path, raw).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_writes_default_files() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let manager = ConfigurationManager::new(dir.path()).expect("manager");
        assert!(dir.path().join("sources.toml").exists());
        assert!(dir.path().join("methodologies.toml").exists());

        let github = manager.load_source_config("github").unwrap().expect("github");
        assert_eq!(github.priority, SourcePriority::High);
        assert_eq!(github.rate_limit, 60);
        assert_eq!(github.search_parameters["sort"], "stars");
    }

    #[test]
    fn unknown_source_is_none() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let manager = ConfigurationManager::new(dir.path()).expect("manager");
        assert!(manager.load_source_config("myspace").unwrap().is_none());
    }

    #[test]
    fn load_default_methodologies() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let manager = ConfigurationManager::new(dir.path()).expect("manager");
        assert_eq!(
            manager.available_methodologies().unwrap(),
            vec!["market_research", "technology_analysis"]
        );
        let m = manager.load_methodology("market_research").unwrap().expect("market");
        assert_eq!(m.research_type, ResearchType::MarketResearch);
        assert!((m.quality_thresholds.minimum_score - 0.5).abs() < 1e-9);
        assert_eq!(m.scoring_weights.completeness, 0.0);
    }

    #[test]
    fn existing_files_are_not_overwritten() {
        let dir = tempfile::tempdir().expect("tmp dir");
        std::fs::write(
            dir.path().join("sources.toml"),
            "[blog]\nname = \"Blogs\"\nenabled = false\npriority = \"LOW\"\nrate_limit = 5\nmax_results = 3\nquality_weight = 0.5\n",
        )
        .unwrap();
        let manager = ConfigurationManager::new(dir.path()).expect("manager");
        let sources = manager.source_configs().unwrap();
        assert_eq!(sources.len(), 1);
        assert!(!sources["blog"].enabled);
        assert!(sources["blog"].metadata_fields.is_empty());
    }

    #[test]
    fn save_custom_methodology_uses_normalised_key() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let manager = ConfigurationManager::new(dir.path()).expect("manager");
        let mut m = default_methodology("trend_analysis");
        m.name = "Quarterly Trend Scan".to_string();
        let key = manager.save_custom_methodology(&m).unwrap();
        assert_eq!(key, "quarterly_trend_scan");

        let back = manager.load_methodology(&key).unwrap().expect("saved");
        assert_eq!(back, m);
        assert_eq!(manager.available_methodologies().unwrap().len(), 3);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        std::fs::write(dir.path().join("methodologies.toml"), "not = [valid").unwrap();
        let manager = ConfigurationManager::new(dir.path()).expect("manager");
        let err = manager.load_methodology("anything").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn default_methodology_falls_back_to_technology() {
        let m = default_methodology("vibes");
        assert_eq!(m.research_type, ResearchType::TechnologyAnalysis);
        assert_eq!(m.name, "Default vibes");
        assert!((m.quality_thresholds.minimum_score - 0.3).abs() < 1e-9);
    }
}
