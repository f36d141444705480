//! Dataset assembly and per-dimension analysis.
//!
//! A [`ComprehensiveDataset`] bundles the scored results of one project with
//! descriptive metadata, a top-10 ranking per analysis dimension and a few
//! headline insights. [`DatasetManager::save_dataset`] writes it as pretty
//! JSON under `<data_dir>/processed/`.
//!
//! Supported dimensions:
//!
//! | dimension    | ranked by breakdown factor |
//! |--------------|----------------------------|
//! | `popularity` | `engagement`               |
//! | `recency`    | `recency`                  |
//! | `authority`  | `authority`                |
//!
//! Any other dimension name yields an empty analysis.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use scout_types::{ResearchMethodology, ScoreBreakdown, SearchResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::info;

/// Results above this score count as high quality in dataset insights.
const HIGH_QUALITY_SCORE: f64 = 0.7;

/// Results whose recency factor exceeds this are "very recent".
pub const RECENT_FACTOR: f64 = 0.8;

/// How many results each dimension ranking keeps.
const TOP_RESULTS: usize = 10;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub project_id: String,
    pub methodology: String,
    pub research_type: String,
    pub total_results: usize,
    /// Sources in the order they first appear in the results.
    pub sources_used: Vec<String>,
    pub analysis_dimensions: Vec<String>,
}

/// One entry of a dimension ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub title: String,
    pub source: String,
    pub url: String,
    /// Value of the factor the ranking is based on.
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionAnalysis {
    pub dimension: String,
    pub top_results: Vec<RankedResult>,
}

/// A headline observation about a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInsight {
    pub kind: String,
    pub title: String,
    pub description: String,
    pub data: serde_json::Value,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensiveDataset {
    pub metadata: DatasetMetadata,
    pub results: Vec<SearchResult>,
    pub analysis: BTreeMap<String, DimensionAnalysis>,
    pub insights: Vec<DatasetInsight>,
}

/// Result counts per source, keyed alphabetically.
pub fn count_by_source(results: &[SearchResult]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for r in results {
        *counts.entry(r.source.clone()).or_insert(0) += 1;
    }
    counts
}

/// Key with the largest value; ties go to the alphabetically first key.
pub(crate) fn arg_max<V: PartialOrd + Copy>(map: &BTreeMap<String, V>) -> Option<(&str, V)> {
    let mut best: Option<(&str, V)> = None;
    for (k, &v) in map {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((k.as_str(), v)),
        }
    }
    best
}

fn factor(dimension: &str, b: &ScoreBreakdown) -> Option<f64> {
    match dimension {
        "popularity" => Some(b.engagement),
        "recency" => Some(b.recency),
        "authority" => Some(b.authority),
        _ => None,
    }
}

/// Rank `results` along `dimension`.
pub fn analyze_dimension(results: &[SearchResult], dimension: &str) -> DimensionAnalysis {
    if factor(dimension, &ScoreBreakdown::default()).is_none() {
        return DimensionAnalysis {
            dimension: dimension.to_string(),
            top_results: Vec::new(),
        };
    }
    let value = |r: &SearchResult| {
        r.breakdown
            .as_ref()
            .and_then(|b| factor(dimension, b))
            .unwrap_or(0.0)
    };

    let mut ranked: Vec<&SearchResult> = results.iter().collect();
    ranked.sort_by(|a, b| value(b).total_cmp(&value(a)));

    let top_results = ranked
        .into_iter()
        .take(TOP_RESULTS)
        .map(|r| RankedResult {
            title: r.title.clone(),
            source: r.source.clone(),
            url: r.url.clone(),
            score: value(r),
            timestamp: (dimension == "recency").then_some(r.timestamp),
        })
        .collect();

    DimensionAnalysis {
        dimension: dimension.to_string(),
        top_results,
    }
}

/// Source, quality and recency insights for a result set.
pub fn generate_insights(results: &[SearchResult]) -> Vec<DatasetInsight> {
    let total = results.len();
    let counts = count_by_source(results);

    let recommendation = match arg_max(&counts) {
        Some((source, n)) => format!("The most productive source was {source} with {n} results"),
        None => "No results were collected".to_string(),
    };
    let source_insight = DatasetInsight {
        kind: "source_distribution".to_string(),
        title: "Source Distribution Analysis".to_string(),
        description: format!("Results were found across {} different sources", counts.len()),
        data: json!(counts),
        recommendation,
    };

    let avg_score = if total == 0 {
        0.0
    } else {
        results.iter().map(|r| r.relevance_score).sum::<f64>() / total as f64
    };
    let high_quality = results
        .iter()
        .filter(|r| r.relevance_score > HIGH_QUALITY_SCORE)
        .count();
    let high_pct = if total == 0 {
        0.0
    } else {
        high_quality as f64 / total as f64 * 100.0
    };
    let quality_insight = DatasetInsight {
        kind: "quality_analysis".to_string(),
        title: "Result Quality Analysis".to_string(),
        description: format!("Average relevance score: {avg_score:.2}"),
        data: json!({
            "average_score": avg_score,
            "high_quality_results": high_quality,
            "total_results": total,
        }),
        recommendation: format!(
            "{high_quality} out of {total} results ({high_pct:.1}%) are high quality"
        ),
    };

    let recent = results
        .iter()
        .filter(|r| r.recency_factor() > RECENT_FACTOR)
        .count();
    let recency_insight = DatasetInsight {
        kind: "recency_analysis".to_string(),
        title: "Content Recency Analysis".to_string(),
        description: format!("{recent} results are very recent (within 30 days)"),
        data: json!({ "recent_results": recent, "total_results": total }),
        recommendation: "Consider setting up alerts for ongoing monitoring of new developments"
            .to_string(),
    };

    vec![source_insight, quality_insight, recency_insight]
}

/// Builds and persists [`ComprehensiveDataset`]s.
pub struct DatasetManager {
    processed_dir: PathBuf,
}

impl DatasetManager {
    /// Create a manager rooted at `data_dir`, creating `processed/` if needed.
    pub fn new(data_dir: &Path) -> Result<Self, DatasetError> {
        let processed_dir = data_dir.join("processed");
        fs::create_dir_all(&processed_dir)?;
        Ok(Self { processed_dir })
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    pub fn create_comprehensive_dataset(
        &self,
        project_id: &str,
        results: &[SearchResult],
        methodology: &ResearchMethodology,
    ) -> ComprehensiveDataset {
        let mut sources_used: Vec<String> = Vec::new();
        for r in results {
            if !sources_used.contains(&r.source) {
                sources_used.push(r.source.clone());
            }
        }

        let analysis = methodology
            .analysis_dimensions
            .iter()
            .map(|d| (d.clone(), analyze_dimension(results, d)))
            .collect();

        ComprehensiveDataset {
            metadata: DatasetMetadata {
                project_id: project_id.to_string(),
                methodology: methodology.name.clone(),
                research_type: methodology.research_type.as_str().to_string(),
                total_results: results.len(),
                sources_used,
                analysis_dimensions: methodology.analysis_dimensions.clone(),
            },
            results: results.to_vec(),
            analysis,
            insights: generate_insights(results),
        }
    }

    /// Write `dataset` to `<processed>/<project_id>_dataset<suffix>.json`.
    pub fn save_dataset(
        &self,
        dataset: &ComprehensiveDataset,
        suffix: &str,
    ) -> Result<PathBuf, DatasetError> {
        let path = self
            .processed_dir
            .join(format!("{}_dataset{}.json", dataset.metadata.project_id, suffix));
        let raw = serde_json::to_string_pretty(dataset)?;
        fs::write(&path, raw)?;
        info!(path = %path.display(), results = dataset.metadata.total_results, "dataset saved");
        Ok(path)
    }
}
