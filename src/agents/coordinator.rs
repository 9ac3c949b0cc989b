use crate::agents::{Backends, TaskContext, Worker, WorkerOutput};
use crate::memory::{format_context_for_prompt, to_prompt_messages, truncate_history_to_tokens};
use crate::types::{PromptMessage, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

pub const COORDINATOR_ID: &str = "personal_assistant";

/// Token budget for the history the coordinator forwards.
pub const DEFAULT_CONTEXT_TOKEN_BUDGET: usize = 2000;

/// General assistant that keeps every task nobody else takes.
pub struct CoordinatorWorker {
    id: String,
    backends: Backends,
    max_tokens: u32,
    token_budget: usize,
    specialists: BTreeMap<String, Vec<String>>,
}

impl CoordinatorWorker {
    pub fn new(backends: Backends, max_tokens: u32) -> Self {
        Self {
            id: COORDINATOR_ID.to_string(),
            backends,
            max_tokens,
            token_budget: DEFAULT_CONTEXT_TOKEN_BUDGET,
            specialists: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_token_budget(mut self, token_budget: usize) -> Self {
        self.token_budget = token_budget;
        self
    }

    /// Specialists to mention in the system prompt.
    pub fn with_specialists(mut self, specialists: BTreeMap<String, Vec<String>>) -> Self {
        self.specialists = specialists;
        self
    }

    fn system_prompt(&self, context: &TaskContext) -> String {
        let mut prompt = String::from(
            "You are a personal assistant. Answer general questions and hold a helpful, \
             conversational tone. Keep answers concise.",
        );

        if !self.specialists.is_empty() {
            let lines: Vec<String> = self
                .specialists
                .iter()
                .map(|(id, tags)| format!("- {}: {}", id, tags.join(", ")))
                .collect();
            prompt.push_str("\n\nSpecialists exist for:\n");
            prompt.push_str(&lines.join("\n"));
            prompt.push_str(
                "\nIf the user needs one of them, say which and what they should ask.",
            );
        }

        let known = format_context_for_prompt(&context.global_context);
        if !known.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&known);
        }
        prompt
    }
}

#[async_trait]
impl Worker for CoordinatorWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "general conversation".to_string(),
            "answering general questions".to_string(),
            "coordinating specialists".to_string(),
        ]
    }

    fn can_handle(&self, _task: &str, _context: &TaskContext) -> bool {
        true
    }

    async fn process(&self, task: &str, context: &TaskContext) -> Result<WorkerOutput> {
        let history = truncate_history_to_tokens(&context.history, self.token_budget);

        let mut messages = vec![PromptMessage::system(self.system_prompt(context))];
        messages.extend(to_prompt_messages(&history));
        if history.last().is_none_or(|m| m.content != task) {
            messages.push(PromptMessage::user(task));
        }

        let response = self.backends.complete(&messages, self.max_tokens).await?;

        Ok(WorkerOutput::text(response.trim())
            .with_metadata("model", self.backends.model_name())
            .with_action("direct_response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{backends, ScriptedInference};
    use crate::session::ChatMessage;
    use crate::types::MessageRole;
    use serde_json::json;

    fn message(role: MessageRole, content: &str) -> ChatMessage {
        ChatMessage {
            role,
            content: content.to_string(),
            worker_id: None,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_answers_with_history_and_context() {
        let inference = ScriptedInference::new(vec![Ok("  Hi Ana!  ".to_string())]);
        let mut specialists = BTreeMap::new();
        specialists.insert("calendar".to_string(), vec!["scheduling".to_string()]);
        let worker = CoordinatorWorker::new(backends(inference.clone()), 200).with_specialists(specialists);

        let mut context = TaskContext {
            session_id: "s1".to_string(),
            history: vec![
                message(MessageRole::User, "my name is Ana"),
                message(MessageRole::Assistant, "Nice to meet you."),
                message(MessageRole::User, "say hi"),
            ],
            ..Default::default()
        };
        context.global_context.insert("user_name".into(), json!("Ana"));

        let out = worker.process("say hi", &context).await.unwrap();
        assert_eq!(out.response_text, "Hi Ana!");
        assert_eq!(out.metadata["model"], json!("scripted"));

        let prompts = inference.prompts.lock();
        let sent = &prompts[0];
        // System prompt plus the three history messages; the task is not repeated.
        assert_eq!(sent.len(), 4);
        assert!(sent[0].content.contains("- calendar: scheduling"));
        assert!(sent[0].content.contains("user_name"));
        assert_eq!(sent[3].content, "say hi");
    }

    #[tokio::test]
    async fn test_appends_task_missing_from_history() {
        let inference = ScriptedInference::new(vec![Ok("ok".to_string())]);
        let worker = CoordinatorWorker::new(backends(inference.clone()), 200);

        worker.process("hello", &TaskContext::default()).await.unwrap();
        let prompts = inference.prompts.lock();
        assert_eq!(prompts[0].len(), 2);
        assert_eq!(prompts[0][1].content, "hello");
    }

    #[tokio::test]
    async fn test_propagates_backend_failure() {
        let worker = CoordinatorWorker::new(backends(ScriptedInference::new(vec![])), 200);
        let result = worker.process("hello", &TaskContext::default()).await;
        assert!(matches!(result, Err(crate::types::AppError::BackendUnavailable(_))));
    }

    #[test]
    fn test_handles_everything() {
        let worker = CoordinatorWorker::new(backends(ScriptedInference::new(vec![])), 200);
        assert!(worker.can_handle("anything at all", &TaskContext::default()));
        assert_eq!(worker.with_id("assistant").id(), "assistant");
    }
}
