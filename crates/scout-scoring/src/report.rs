//! Summaries and distributions over a set of scored results, plus the
//! project-level advice derived from them.

use std::collections::BTreeMap;

use scout_types::SearchResult;
use serde::{Deserialize, Serialize};

use crate::dataset::{RECENT_FACTOR, arg_max, count_by_source};

/// Quality band boundaries.
const HIGH_BAND: f64 = 0.7;
const MEDIUM_BAND: f64 = 0.4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopResult {
    pub title: String,
    pub source: String,
    pub quality_score: f64,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsSummary {
    pub total: usize,
    pub sources: BTreeMap<String, usize>,
    pub avg_quality: f64,
    /// `(min, max)` quality; absent for an empty set.
    pub quality_range: Option<(f64, f64)>,
    pub top_results: Vec<TopResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDistribution {
    pub counts: BTreeMap<String, usize>,
    pub avg_quality_by_source: BTreeMap<String, f64>,
    pub most_productive: Option<String>,
    pub highest_quality: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityDistribution {
    pub high_quality: usize,
    pub medium_quality: usize,
    pub low_quality: usize,
    pub avg_score: f64,
    pub high_quality_pct: f64,
    pub medium_quality_pct: f64,
    pub low_quality_pct: f64,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

pub fn results_summary(results: &[SearchResult]) -> ResultsSummary {
    if results.is_empty() {
        return ResultsSummary::default();
    }
    let scores = results.iter().map(|r| r.relevance_score);
    let min = scores.clone().fold(f64::INFINITY, f64::min);
    let max = scores.clone().fold(f64::NEG_INFINITY, f64::max);

    let mut ranked: Vec<&SearchResult> = results.iter().collect();
    ranked.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));

    ResultsSummary {
        total: results.len(),
        sources: count_by_source(results),
        avg_quality: mean(scores).unwrap_or(0.0),
        quality_range: Some((min, max)),
        top_results: ranked
            .into_iter()
            .take(5)
            .map(|r| TopResult {
                title: r.title.clone(),
                source: r.source.clone(),
                quality_score: r.relevance_score,
                url: r.url.clone(),
            })
            .collect(),
    }
}

pub fn source_distribution(results: &[SearchResult]) -> SourceDistribution {
    let counts = count_by_source(results);
    let avg_quality_by_source: BTreeMap<String, f64> = counts
        .keys()
        .map(|source| {
            let avg = mean(
                results
                    .iter()
                    .filter(|r| &r.source == source)
                    .map(|r| r.relevance_score),
            )
            .unwrap_or(0.0);
            (source.clone(), avg)
        })
        .collect();

    SourceDistribution {
        most_productive: arg_max(&counts).map(|(s, _)| s.to_string()),
        highest_quality: arg_max(&avg_quality_by_source).map(|(s, _)| s.to_string()),
        counts,
        avg_quality_by_source,
    }
}

pub fn quality_distribution(results: &[SearchResult]) -> QualityDistribution {
    if results.is_empty() {
        return QualityDistribution::default();
    }
    let total = results.len() as f64;
    let high = results.iter().filter(|r| r.relevance_score >= HIGH_BAND).count();
    let medium = results
        .iter()
        .filter(|r| (MEDIUM_BAND..HIGH_BAND).contains(&r.relevance_score))
        .count();
    let low = results.iter().filter(|r| r.relevance_score < MEDIUM_BAND).count();

    QualityDistribution {
        high_quality: high,
        medium_quality: medium,
        low_quality: low,
        avg_score: mean(results.iter().map(|r| r.relevance_score)).unwrap_or(0.0),
        high_quality_pct: high as f64 / total * 100.0,
        medium_quality_pct: medium as f64 / total * 100.0,
        low_quality_pct: low as f64 / total * 100.0,
    }
}

/// Advice for improving a single project's result set.
pub fn project_recommendations(results: &[SearchResult]) -> Vec<String> {
    let mut recs = Vec::new();
    if results.is_empty() {
        recs.push(
            "No results found. Consider broadening the search query or trying different sources."
                .to_string(),
        );
        return recs;
    }

    let avg = mean(results.iter().map(|r| r.relevance_score)).unwrap_or(0.0);
    if avg < 0.5 {
        recs.push(
            "Average result quality is low. Consider refining the search query or using different keywords."
                .to_string(),
        );
    }

    if count_by_source(results).len() < 2 {
        recs.push(
            "Results found from only one source. Consider expanding to additional sources for broader coverage."
                .to_string(),
        );
    }

    let recent = results
        .iter()
        .filter(|r| r.recency_factor() > RECENT_FACTOR)
        .count();
    if (recent as f64) < results.len() as f64 * 0.3 {
        recs.push(
            "Few recent results found. Consider setting up monitoring for ongoing developments."
                .to_string(),
        );
    }

    if results.len() < 10 {
        recs.push(
            "Limited number of results. Consider using broader search terms or additional sources."
                .to_string(),
        );
    } else if results.len() > 50 {
        recs.push(
            "Large number of results found. Consider using more specific search terms for focused analysis."
                .to_string(),
        );
    }
    recs
}
