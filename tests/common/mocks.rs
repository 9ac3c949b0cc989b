//! Mock backends and workers for driving the engine without a model server.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchboard::agents::{TaskContext, Worker, WorkerOutput};
use switchboard::tools::{SearchBackend, SearchResponse, SearchSource};
use switchboard::types::{MessageRole, PromptMessage};
use switchboard::session::WorkflowState;
use switchboard::{AppError, InferenceBackend, Result, SessionPersistence};

/// Phrase from the classifier's system prompt; tells classifier calls apart
/// from worker calls.
pub const CLASSIFIER_MARKER: &str = "decide whether a user request should be handed to a specialist";

pub fn is_classifier(messages: &[PromptMessage]) -> bool {
    messages
        .first()
        .is_some_and(|m| m.role == MessageRole::System && m.content.contains(CLASSIFIER_MARKER))
}

/// Content of the last user message.
pub fn last_user(messages: &[PromptMessage]) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

/// The task text inside a classifier request.
pub fn classified_task(messages: &[PromptMessage]) -> String {
    let user = last_user(messages);
    match user.rsplit_once("Request: ") {
        Some((_, task)) => task.to_string(),
        None => user,
    }
}

/// Classifier reply proposing `worker`.
pub fn delegate(worker: &str, confidence: f64) -> String {
    json!({
        "needs_delegation": true,
        "target_worker": worker,
        "confidence": confidence,
        "reasoning": format!("{} fits", worker),
        "task_type": "test",
    })
    .to_string()
}

/// Classifier reply keeping the task with the coordinator.
pub fn no_delegation() -> String {
    json!({
        "needs_delegation": false,
        "target_worker": null,
        "confidence": 0.9,
        "reasoning": "general question",
    })
    .to_string()
}

type ClassifyFn = Box<dyn Fn(&str) -> String + Send + Sync>;
type AnswerFn = Box<dyn Fn(&[PromptMessage]) -> Result<String> + Send + Sync>;

/// Inference backend answering classifier and worker prompts separately.
///
/// By default the classifier never delegates and workers reply
/// `echo: <last user message>`.
pub struct MockInference {
    classify: ClassifyFn,
    answer: AnswerFn,
    delay: Duration,
    classifier_calls: AtomicUsize,
    answer_calls: AtomicUsize,
    pub prompts: Mutex<Vec<Vec<PromptMessage>>>,
}

impl Default for MockInference {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInference {
    pub fn new() -> Self {
        Self {
            classify: Box::new(|_| no_delegation()),
            answer: Box::new(|messages| Ok(format!("echo: {}", last_user(messages)))),
            delay: Duration::ZERO,
            classifier_calls: AtomicUsize::new(0),
            answer_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Reply to classifier prompts with `f(task)`.
    pub fn classify_with(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.classify = Box::new(f);
        self
    }

    /// Reply to every non-classifier prompt with `f(messages)`.
    pub fn answer_with(
        mut self,
        f: impl Fn(&[PromptMessage]) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        self.answer = Box::new(f);
        self
    }

    /// Sleep before answering worker prompts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn classifier_calls(&self) -> usize {
        self.classifier_calls.load(Ordering::SeqCst)
    }

    pub fn answer_calls(&self) -> usize {
        self.answer_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for MockInference {
    async fn complete(&self, messages: &[PromptMessage], _max_tokens: u32) -> Result<String> {
        self.prompts.lock().push(messages.to_vec());

        if is_classifier(messages) {
            self.classifier_calls.fetch_add(1, Ordering::SeqCst);
            return Ok((self.classify)(&classified_task(messages)));
        }

        self.answer_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.answer)(messages)
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Inference backend that never answers.
#[derive(Default)]
pub struct HangingInference {
    calls: AtomicUsize,
}

impl HangingInference {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for HangingInference {
    async fn complete(&self, _messages: &[PromptMessage], _max_tokens: u32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Err(AppError::BackendUnavailable("unreachable".to_string()))
    }

    fn model_name(&self) -> &str {
        "hanging"
    }
}

/// Worker that panics on every task.
pub struct PanickingWorker {
    calls: AtomicUsize,
}

pub const PANICKING_WORKER_ID: &str = "flaky";

impl PanickingWorker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Worker for PanickingWorker {
    fn id(&self) -> &str {
        PANICKING_WORKER_ID
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["crashing on purpose".to_string()]
    }

    fn can_handle(&self, _task: &str, _context: &TaskContext) -> bool {
        true
    }

    async fn process(&self, _task: &str, _context: &TaskContext) -> Result<WorkerOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("worker blew up");
    }
}

/// Worker that accepts every task and names itself in the reply.
pub struct NamedWorker {
    id: String,
}

impl NamedWorker {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self { id: id.to_string() })
    }
}

#[async_trait]
impl Worker for NamedWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["anything".to_string()]
    }

    fn can_handle(&self, _task: &str, _context: &TaskContext) -> bool {
        true
    }

    async fn process(&self, _task: &str, _context: &TaskContext) -> Result<WorkerOutput> {
        Ok(WorkerOutput::text(format!("handled by {}", self.id)))
    }
}

/// Search backend with a canned response.
pub struct FixedSearch {
    response: SearchResponse,
}

impl FixedSearch {
    pub fn with_sources(answer: &str, urls: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            response: SearchResponse {
                answer: answer.to_string(),
                sources: urls
                    .iter()
                    .enumerate()
                    .map(|(i, url)| SearchSource {
                        title: format!("Result {}", i + 1),
                        url: url.to_string(),
                        snippet: String::new(),
                    })
                    .collect(),
            },
        })
    }
}

#[async_trait]
impl SearchBackend for FixedSearch {
    async fn search(&self, _query: &str) -> Result<SearchResponse> {
        Ok(self.response.clone())
    }
}

/// Persistence whose writes always fail; reads find nothing.
#[derive(Default)]
pub struct FailingSaves {
    attempts: AtomicUsize,
}

impl FailingSaves {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionPersistence for FailingSaves {
    async fn load_session(&self, _session_id: &str) -> Result<Option<WorkflowState>> {
        Ok(None)
    }

    async fn save_session(&self, _state: &WorkflowState) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Database("disk full".to_string()))
    }

    async fn delete_session(&self, _session_id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn session_ids(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}
