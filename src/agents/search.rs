use crate::agents::{mentions_any, Backends, TaskContext, Worker, WorkerOutput};
use crate::tools::SearchResponse;
use crate::types::{PromptMessage, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

pub const SEARCH_ID: &str = "search";

/// Sources listed in a reply unless configured otherwise.
pub const DEFAULT_MAX_SOURCES: usize = 5;

const SEARCH_KEYWORDS: &[&str] = &[
    "search", "find", "look up", "research", "what is", "who is", "when did", "where is",
    "how much", "latest", "current", "news", "recent", "information about", "tell me about",
    "weather", "stock", "price", "compare", "reviews", "facts",
];

/// Answers with web results, falling back to the model alone when search
/// is unavailable.
pub struct SearchWorker {
    backends: Backends,
    max_sources: usize,
    max_tokens: u32,
}

impl SearchWorker {
    pub fn new(backends: Backends, max_sources: usize, max_tokens: u32) -> Self {
        Self {
            backends,
            max_sources: max_sources.max(1),
            max_tokens,
        }
    }

    fn format_results(&self, query: &str, response: &SearchResponse) -> String {
        if response.sources.is_empty() && response.answer.trim().is_empty() {
            return format!("I couldn't find anything for \"{}\".", query);
        }

        let mut text = response.answer.trim().to_string();
        if !response.sources.is_empty() {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str("Sources:");
            for (i, source) in response.sources.iter().take(self.max_sources).enumerate() {
                text.push_str(&format!("\n{}. {} - {}", i + 1, source.title, source.url));
            }
        }
        text
    }

    async fn answer_without_search(&self, task: &str, context: &TaskContext) -> Result<String> {
        let mut messages = vec![PromptMessage::system(
            "You are a research assistant. Web search is unavailable right now, so answer \
             from what you know and say when the information may be out of date.",
        )];
        messages.extend(crate::memory::to_prompt_messages(&context.history));
        if context.history.last().is_none_or(|m| m.content != task) {
            messages.push(PromptMessage::user(task));
        }

        let response = self.backends.complete(&messages, self.max_tokens).await?;
        Ok(response.trim().to_string())
    }
}

#[async_trait]
impl Worker for SearchWorker {
    fn id(&self) -> &str {
        SEARCH_ID
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "web search for current information".to_string(),
            "research and fact-finding".to_string(),
            "news and current events".to_string(),
            "prices, weather and market data".to_string(),
            "source citation".to_string(),
        ]
    }

    fn can_handle(&self, task: &str, _context: &TaskContext) -> bool {
        mentions_any(task, SEARCH_KEYWORDS)
    }

    async fn process(&self, task: &str, context: &TaskContext) -> Result<WorkerOutput> {
        match self.backends.search(task).await {
            Ok(response) => {
                let urls: Vec<Value> = response
                    .urls()
                    .into_iter()
                    .take(self.max_sources)
                    .map(Value::String)
                    .collect();
                tracing::debug!(session_id = %context.session_id, sources = urls.len(), "Search answered");

                Ok(WorkerOutput::text(self.format_results(task, &response))
                    .with_metadata("search_performed", true)
                    .with_metadata("sources", Value::Array(urls))
                    .with_context("last_search_query", task)
                    .with_action("web_search"))
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %context.session_id,
                    error = %e,
                    "Search backend failed, answering from the model"
                );
                let answer = self.answer_without_search(task, context).await?;

                Ok(WorkerOutput::text(answer)
                    .with_metadata("search_performed", false)
                    .with_metadata("search_error", json!(e.kind().as_str()))
                    .with_action("direct_answer"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{backends, ScriptedInference};
    use crate::tools::{SearchBackend, SearchSource};
    use crate::types::AppError;
    use std::sync::Arc;

    struct FixedSearch(Option<SearchResponse>);

    #[async_trait]
    impl SearchBackend for FixedSearch {
        async fn search(&self, _query: &str) -> Result<SearchResponse> {
            self.0
                .clone()
                .ok_or_else(|| AppError::BackendUnavailable("offline".to_string()))
        }
    }

    fn response(count: usize) -> SearchResponse {
        SearchResponse {
            answer: "Rust 1.85 shipped the 2024 edition.".to_string(),
            sources: (0..count)
                .map(|i| SearchSource {
                    title: format!("Post {}", i),
                    url: format!("https://blog.example/{}", i),
                    snippet: String::new(),
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_formats_limited_sources() {
        let inference = ScriptedInference::new(vec![]);
        let backends = backends(inference.clone()).with_search(Arc::new(FixedSearch(Some(response(4)))));
        let worker = SearchWorker::new(backends, 2, 300);

        let out = worker
            .process("latest rust release", &TaskContext::default())
            .await
            .unwrap();

        assert_eq!(out.metadata["search_performed"], json!(true));
        assert_eq!(out.metadata["sources"].as_array().unwrap().len(), 2);
        assert!(out.response_text.contains("2. Post 1 - https://blog.example/1"));
        assert!(!out.response_text.contains("Post 2"));
        assert_eq!(inference.calls(), 0);
    }

    #[tokio::test]
    async fn test_falls_back_to_model_when_search_fails() {
        let inference = ScriptedInference::new(vec![Ok("Probably 1.85.".to_string())]);
        let backends = backends(inference.clone()).with_search(Arc::new(FixedSearch(None)));
        let worker = SearchWorker::new(backends, DEFAULT_MAX_SOURCES, 300);

        let out = worker
            .process("latest rust release", &TaskContext::default())
            .await
            .unwrap();

        assert_eq!(out.response_text, "Probably 1.85.");
        assert_eq!(out.metadata["search_performed"], json!(false));
        assert_eq!(out.metadata["search_error"], json!("BackendUnavailable"));
    }

    #[tokio::test]
    async fn test_without_search_backend_uses_model() {
        let inference = ScriptedInference::new(vec![Ok("From memory.".to_string())]);
        let worker = SearchWorker::new(backends(inference.clone()), DEFAULT_MAX_SOURCES, 300);

        let out = worker
            .process("who is the mayor", &TaskContext::default())
            .await
            .unwrap();
        assert_eq!(out.metadata["search_performed"], json!(false));
        assert_eq!(inference.calls(), 1);
    }

    #[test]
    fn test_can_handle_keywords() {
        let worker = SearchWorker::new(backends(ScriptedInference::new(vec![])), 5, 300);
        assert!(worker.can_handle("What is the weather in Lisbon?", &TaskContext::default()));
        assert!(!worker.can_handle("Schedule a meeting", &TaskContext::default()));
    }
}
