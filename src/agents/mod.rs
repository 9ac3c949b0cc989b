pub mod calendar;
pub mod code;
pub mod coordinator;
pub mod registry;
pub mod router;
pub mod search;

use crate::llm::InferenceBackend;
use crate::resilience::{self, BreakerSet};
use crate::session::ChatMessage;
use crate::tools::{SearchBackend, SearchResponse, ToolBackend, ToolRun};
use crate::types::{AppError, PromptMessage, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

// Re-export commonly used types
pub use calendar::{CalendarEvent, CalendarWorker, EventStore};
pub use code::CodeAssistantWorker;
pub use coordinator::CoordinatorWorker;
pub use registry::{CapabilityRegistry, CapabilityRegistryBuilder};
pub use router::{DelegationClassifier, DelegationDecision, DelegationRecord};
pub use search::SearchWorker;

/// What a worker sees of the session while handling one task.
///
/// A snapshot: changes are returned through [`WorkerOutput`], never written
/// here.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    pub session_id: String,
    /// Windowed message history, oldest first, ending with the current task.
    pub history: Vec<ChatMessage>,
    pub global_context: Map<String, Value>,
    /// This worker's local context in this session.
    pub local_context: Map<String, Value>,
    pub delegation: Option<DelegationRecord>,
}

/// Result of a successful `Worker::process` call.
#[derive(Debug, Clone, Default)]
pub struct WorkerOutput {
    pub response_text: String,
    pub metadata: Map<String, Value>,
    /// Writes to the session's shared context.
    pub context_updates: Map<String, Value>,
    /// Writes to this worker's local context.
    pub local_updates: Map<String, Value>,
    pub last_action: Option<String>,
}

impl WorkerOutput {
    pub fn text(response_text: impl Into<String>) -> Self {
        Self {
            response_text: response_text.into(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context_updates.insert(key.to_string(), value.into());
        self
    }

    pub fn with_local(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.local_updates.insert(key.to_string(), value.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.last_action = Some(action.into());
        self
    }
}

/// A handler the engine can route tasks to.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Stable identifier used for routing and breaker names.
    fn id(&self) -> &str;

    /// Capability tags shown to the delegation classifier.
    fn capabilities(&self) -> Vec<String>;

    /// Cheap local check run before dispatch.
    fn can_handle(&self, task: &str, context: &TaskContext) -> bool;

    /// Handle the task. May be called again on retry.
    async fn process(&self, task: &str, context: &TaskContext) -> Result<WorkerOutput>;
}

/// Shared handles to the external backends, each call guarded by its
/// dependency's circuit breaker and a per-call timeout.
#[derive(Clone)]
pub struct Backends {
    inference: Arc<dyn InferenceBackend>,
    search: Option<Arc<dyn SearchBackend>>,
    tools: Option<Arc<dyn ToolBackend>>,
    breakers: Arc<BreakerSet>,
    call_timeout: Duration,
}

impl Backends {
    pub fn new(inference: Arc<dyn InferenceBackend>, breakers: Arc<BreakerSet>, call_timeout: Duration) -> Self {
        breakers.get_or_create(resilience::INFERENCE);
        Self {
            inference,
            search: None,
            tools: None,
            breakers,
            call_timeout,
        }
    }

    pub fn with_search(mut self, search: Arc<dyn SearchBackend>) -> Self {
        self.breakers.get_or_create(resilience::SEARCH);
        self.search = Some(search);
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolBackend>) -> Self {
        self.breakers.get_or_create(resilience::TOOLS);
        self.tools = Some(tools);
        self
    }

    pub fn breakers(&self) -> &Arc<BreakerSet> {
        &self.breakers
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn model_name(&self) -> &str {
        self.inference.model_name()
    }

    pub fn has_search(&self) -> bool {
        self.search.is_some()
    }

    pub async fn complete(&self, messages: &[PromptMessage], max_tokens: u32) -> Result<String> {
        self.breakers
            .get_or_create(resilience::INFERENCE)
            .call_with_timeout(self.call_timeout, self.inference.complete(messages, max_tokens))
            .await
    }

    pub async fn search(&self, query: &str) -> Result<SearchResponse> {
        let search = self
            .search
            .as_ref()
            .ok_or_else(|| AppError::BackendUnavailable("no search backend configured".to_string()))?;
        self.breakers
            .get_or_create(resilience::SEARCH)
            .call_with_timeout(self.call_timeout, search.search(query))
            .await
    }

    pub async fn run_tool(&self, tool_id: &str, args: Value) -> Result<ToolRun> {
        let tools = self
            .tools
            .as_ref()
            .ok_or_else(|| AppError::BackendUnavailable("no tool backend configured".to_string()))?;
        self.breakers
            .get_or_create(resilience::TOOLS)
            .call_with_timeout(self.call_timeout, tools.run_tool(tool_id, args))
            .await
    }
}

/// True when `task` mentions any of `keywords` (case-insensitive).
pub(crate) fn mentions_any(task: &str, keywords: &[&str]) -> bool {
    let lowered = task.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k))
}

/// Like [`mentions_any`], but keywords only match whole words, so "list"
/// does not match "shortlist". A keyword may span several words.
pub(crate) fn mentions_word(task: &str, keywords: &[&str]) -> bool {
    let lowered = task.to_lowercase().replace('\u{2019}', "'");
    let words: Vec<&str> = lowered
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect();
    let padded = format!(" {} ", words.join(" "));
    keywords.iter().any(|k| padded.contains(&format!(" {} ", k)))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::resilience::BreakerConfig;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Inference backend that replays queued replies in order.
    pub struct ScriptedInference {
        replies: Mutex<VecDeque<Result<String>>>,
        calls: AtomicUsize,
        pub prompts: Mutex<Vec<Vec<PromptMessage>>>,
    }

    impl ScriptedInference {
        pub fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InferenceBackend for ScriptedInference {
        async fn complete(&self, messages: &[PromptMessage], _max_tokens: u32) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().push(messages.to_vec());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(AppError::BackendUnavailable("script exhausted".to_string())))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    pub fn backends(inference: Arc<ScriptedInference>) -> Backends {
        Backends::new(
            inference,
            Arc::new(BreakerSet::new(BreakerConfig::default())),
            Duration::from_secs(5),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mentions_word_needs_whole_words() {
        assert!(mentions_word("List my events", &["list"]));
        assert!(mentions_word("What\u{2019}s on, tomorrow?", &["what's on"]));
        assert!(!mentions_word("review the shortlist", &["list"]));
        assert!(!mentions_word("book a showcase", &["show"]));
        assert!(mentions_any("review the shortlist", &["list"]));
    }
}
