//! Search adapters.
//!
//! The researcher never talks to a search backend directly; every source is
//! reached through a [`SearchAdapter`].
//!
//! - [`SearchAdapter`] – the trait every source must implement.
//! - [`JsonFileAdapter`] – serves results from a crawl export on disk
//!   (`<feeds_dir>/<source>.json`, an array of [`FeedRecord`]s).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use scout_types::{FeedRecord, ScoutError, SearchResult};
use tracing::debug;

/// A searchable source of research results.
///
/// # Contract
///
/// * `source_name` – the label stamped on every result (`"github"`, …) and
///   the key used for rate limits and learned priorities.
/// * `search` – at most `limit` unscored results for `query`.
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    fn source_name(&self) -> &str;

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ScoutError>;
}

/// Serves a single source from a JSON crawl export.
pub struct JsonFileAdapter {
    source: String,
    path: PathBuf,
}

impl JsonFileAdapter {
    pub fn new(source: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            source: source.to_string(),
            path: path.into(),
        }
    }

    /// Adapter for `<feeds_dir>/<source>.json`.
    pub fn in_feeds_dir(feeds_dir: &Path, source: &str) -> Self {
        Self::new(source, feeds_dir.join(format!("{source}.json")))
    }

    /// One adapter per `*.json` file in `feeds_dir`, sorted by source name.
    /// A missing directory yields no adapters.
    pub fn discover(feeds_dir: &Path) -> std::io::Result<Vec<Self>> {
        let entries = match std::fs::read_dir(feeds_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut adapters = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                adapters.push(Self::new(stem, path.clone()));
            }
        }
        adapters.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(adapters)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn failed(&self, details: impl std::fmt::Display) -> ScoutError {
        ScoutError::SourceFailed {
            source_name: self.source.clone(),
            details: format!("{}: {details}", self.path.display()),
        }
    }
}

/// Does `title` or `content` mention any of the query terms?
/// An empty query matches everything.
fn mentions_any(terms: &[String], title: &str, content: &str) -> bool {
    if terms.is_empty() {
        return true;
    }
    let title = title.to_lowercase();
    let content = content.to_lowercase();
    terms
        .iter()
        .any(|t| title.contains(t.as_str()) || content.contains(t.as_str()))
}

#[async_trait]
impl SearchAdapter for JsonFileAdapter {
    fn source_name(&self) -> &str {
        &self.source
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, ScoutError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.failed(e))?;
        let records: Vec<FeedRecord> = serde_json::from_str(&raw)
            .map_err(|e| ScoutError::Malformed(format!("{}: {e}", self.path.display())))?;

        let terms: Vec<String> = query
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let now = Utc::now();
        let results: Vec<SearchResult> = records
            .into_iter()
            .filter(|r| mentions_any(&terms, &r.title, &r.content))
            .take(limit)
            .map(|r| r.into_result(&self.source, now))
            .collect();
        debug!(source = %self.source, query, found = results.len(), "feed searched");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_feed(dir: &Path, source: &str, body: &str) -> PathBuf {
        let path = dir.join(format!("{source}.json"));
        std::fs::write(&path, body).unwrap();
        path
    }

    const FEED: &str = r#"[
        {"title": "Axum web framework", "url": "https://a", "content": "ergonomic",
         "timestamp": "2026-01-01T00:00:00Z", "metadata": {"stars": 20000}},
        {"title": "Pasta recipes", "url": "https://b", "content": "carbonara"},
        {"title": "Actix", "url": "https://c", "content": "A powerful WEB framework"}
    ]"#;

    #[tokio::test]
    async fn search_filters_by_query_terms() {
        let dir = tempfile::tempdir().expect("tmp dir");
        write_feed(dir.path(), "github", FEED);
        let adapter = JsonFileAdapter::in_feeds_dir(dir.path(), "github");

        let results = adapter.search("web", 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.source == "github"));
        assert_eq!(results[0].metadata["stars"], 20000);
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let dir = tempfile::tempdir().expect("tmp dir");
        write_feed(dir.path(), "web", FEED);
        let adapter = JsonFileAdapter::in_feeds_dir(dir.path(), "web");
        assert_eq!(adapter.search("", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_file_is_source_failure() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let adapter = JsonFileAdapter::in_feeds_dir(dir.path(), "reddit");
        let err = adapter.search("rust", 5).await.unwrap_err();
        assert!(matches!(err, ScoutError::SourceFailed { ref source_name, .. } if source_name == "reddit"));
    }

    #[tokio::test]
    async fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().expect("tmp dir");
        write_feed(dir.path(), "web", "{not an array");
        let adapter = JsonFileAdapter::in_feeds_dir(dir.path(), "web");
        assert!(matches!(
            adapter.search("rust", 5).await,
            Err(ScoutError::Malformed(_))
        ));
    }

    #[test]
    fn discover_lists_json_feeds_sorted() {
        let dir = tempfile::tempdir().expect("tmp dir");
        write_feed(dir.path(), "web", "[]");
        write_feed(dir.path(), "github", "[]");
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let adapters = JsonFileAdapter::discover(dir.path()).unwrap();
        let names: Vec<&str> = adapters.iter().map(|a| a.source_name()).collect();
        assert_eq!(names, vec!["github", "web"]);
    }

    #[test]
    fn discover_missing_dir_is_empty() {
        let dir = tempfile::tempdir().expect("tmp dir");
        assert!(JsonFileAdapter::discover(&dir.path().join("nope")).unwrap().is_empty());
    }
}
