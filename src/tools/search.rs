//! Search backend implementation using daedra
//!
//! daedra queries DuckDuckGo; results are condensed into a short answer plus
//! the source URLs.

use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSource {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

/// What a search backend returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub answer: String,
    pub sources: Vec<SearchSource>,
}

impl SearchResponse {
    pub fn urls(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.url.clone()).collect()
    }
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse>;
}

/// Web search powered by daedra
#[cfg(feature = "web-search")]
pub struct DuckDuckGoSearch {
    num_results: usize,
}

#[cfg(feature = "web-search")]
impl DuckDuckGoSearch {
    pub fn new(num_results: usize) -> Self {
        Self { num_results }
    }
}

#[cfg(feature = "web-search")]
impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(feature = "web-search")]
#[async_trait]
impl SearchBackend for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: self.num_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::BackendUnavailable(format!("Search failed: {}", e)))?;

        let sources: Vec<SearchSource> = response
            .data
            .iter()
            .map(|r| SearchSource {
                title: r.title.clone(),
                url: r.url.clone(),
                snippet: r.description.clone(),
            })
            .collect();

        tracing::debug!(query, results = sources.len(), "Search completed");
        Ok(SearchResponse {
            answer: summarize(&sources),
            sources,
        })
    }
}

/// Join the leading snippets into a compact answer.
pub fn summarize(sources: &[SearchSource]) -> String {
    sources
        .iter()
        .map(|s| s.snippet.trim())
        .filter(|s| !s.is_empty())
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}
