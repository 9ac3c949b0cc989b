//! Conversation context helpers.
//!
//! This module provides utilities for:
//! - Windowing a session's message history before it reaches a worker
//! - Trimming history to a rough token budget
//! - Formatting the shared session context for prompts

use crate::session::ChatMessage;
use crate::types::{MessageRole, PromptMessage};
use serde_json::{Map, Value};

/// Default number of recent messages to include in context.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// Maximum number of shared context entries to include in a prompt.
pub const MAX_CONTEXT_ENTRIES_IN_PROMPT: usize = 20;

/// Formats the session's shared context into a prompt section.
///
/// Returns an empty string when there is nothing to show.
///
/// # Example
/// ```ignore
/// // {"city": "Lisbon", "attendees": 3}
/// let section = format_context_for_prompt(&state.global_context);
/// // "Known context:\n- attendees: 3\n- city: Lisbon"
/// ```
pub fn format_context_for_prompt(context: &Map<String, Value>) -> String {
    if context.is_empty() {
        return String::new();
    }

    let mut entries: Vec<(&String, &Value)> = context.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let lines: Vec<String> = entries
        .into_iter()
        .take(MAX_CONTEXT_ENTRIES_IN_PROMPT)
        .map(|(key, value)| match value {
            Value::String(s) => format!("- {}: {}", key, s),
            other => format!("- {}: {}", key, other),
        })
        .collect();

    format!("Known context:\n{}", lines.join("\n"))
}

/// Truncates conversation history to a window of recent messages.
pub fn truncate_history(history: &[ChatMessage], window_size: usize) -> Vec<ChatMessage> {
    if history.len() <= window_size {
        history.to_vec()
    } else {
        history[history.len() - window_size..].to_vec()
    }
}

/// Estimates token count for a message (rough approximation).
///
/// Uses a simple heuristic of ~4 characters per token for English text.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Truncates history to fit within a token budget.
///
/// Removes oldest messages until the total estimated tokens is under the budget.
pub fn truncate_history_to_tokens(history: &[ChatMessage], token_budget: usize) -> Vec<ChatMessage> {
    let mut result: Vec<ChatMessage> = Vec::new();
    let mut total_tokens = 0;

    for msg in history.iter().rev() {
        let msg_tokens = estimate_tokens(&msg.content);
        if total_tokens + msg_tokens > token_budget {
            break;
        }
        result.push(msg.clone());
        total_tokens += msg_tokens;
    }

    result.reverse();
    result
}

/// Converts history into inference messages. System entries are dropped; the
/// caller supplies its own system prompt.
pub fn to_prompt_messages(history: &[ChatMessage]) -> Vec<PromptMessage> {
    history
        .iter()
        .filter_map(|m| match m.role {
            MessageRole::User => Some(PromptMessage::user(m.content.clone())),
            MessageRole::Assistant => Some(PromptMessage::assistant(m.content.clone())),
            MessageRole::System => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn history(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| ChatMessage {
                role: if i % 2 == 0 {
                    MessageRole::User
                } else {
                    MessageRole::Assistant
                },
                content: format!("Message {}", i),
                worker_id: None,
                timestamp: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_truncate_history() {
        let truncated = truncate_history(&history(10), 3);
        assert_eq!(truncated.len(), 3);
        assert!(truncated[0].content.contains("7"));
        assert!(truncated[2].content.contains("9"));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("test"), 1);
        assert_eq!(estimate_tokens("this is a longer test string"), 7);
    }

    #[test]
    fn test_truncate_to_tokens_keeps_newest() {
        // "Message N" is 9 chars, 3 tokens each.
        let kept = truncate_history_to_tokens(&history(10), 7);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].content, "Message 8");
        assert_eq!(kept[1].content, "Message 9");
    }

    #[test]
    fn test_format_context_sorted() {
        let mut context = Map::new();
        context.insert("city".into(), json!("Lisbon"));
        context.insert("attendees".into(), json!(3));

        assert_eq!(
            format_context_for_prompt(&context),
            "Known context:\n- attendees: 3\n- city: Lisbon"
        );
        assert_eq!(format_context_for_prompt(&Map::new()), "");
    }

    #[test]
    fn test_prompt_messages_skip_system() {
        let mut msgs = history(2);
        msgs.push(ChatMessage {
            role: MessageRole::System,
            content: "internal".into(),
            worker_id: None,
            timestamp: Utc::now(),
        });

        let prompt = to_prompt_messages(&msgs);
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[0].role, MessageRole::User);
        assert_eq!(prompt[1].role, MessageRole::Assistant);
    }
}
