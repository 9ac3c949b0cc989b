use crate::agents::Backends;
use crate::memory::format_context_for_prompt;
use crate::types::{AppError, PromptMessage, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default token limit for a classifier reply.
pub const DEFAULT_CLASSIFIER_MAX_TOKENS: u32 = 300;

/// A routing proposal from the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationDecision {
    pub needs_delegation: bool,
    pub target_worker: Option<String>,
    pub confidence: f64,
    /// Free text from the model. Diagnostic only.
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
}

impl DelegationDecision {
    pub fn no_delegation(reasoning: impl Into<String>) -> Self {
        Self {
            needs_delegation: false,
            target_worker: None,
            confidence: 0.0,
            reasoning: reasoning.into(),
            task_type: None,
        }
    }
}

/// A delegation that was acted on. Logged, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegationRecord {
    pub from_worker: String,
    pub to_worker: String,
    pub confidence: f64,
    pub reasoning: String,
    pub decided_at: DateTime<Utc>,
}

/// Wire shape of the model's reply. `recommended_agent` is accepted as an
/// alias for `target_worker`.
#[derive(Debug, Deserialize)]
struct RawDecision {
    needs_delegation: Option<bool>,
    #[serde(alias = "recommended_agent")]
    target_worker: Option<String>,
    confidence: Option<f64>,
    reasoning: Option<String>,
    task_type: Option<String>,
}

/// Asks the inference backend which worker should take a task.
///
/// Never fails: a backend error or an unusable reply becomes "no delegation",
/// which the engine routes to the coordinator.
pub struct DelegationClassifier {
    backends: Backends,
    coordinator_id: String,
    max_tokens: u32,
}

impl DelegationClassifier {
    pub fn new(backends: Backends, coordinator_id: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            backends,
            coordinator_id: coordinator_id.into(),
            max_tokens,
        }
    }

    pub fn coordinator_id(&self) -> &str {
        &self.coordinator_id
    }

    fn system_prompt(&self, capabilities: &BTreeMap<String, Vec<String>>) -> String {
        let workers: Vec<String> = capabilities
            .iter()
            .filter(|(id, _)| *id != &self.coordinator_id)
            .map(|(id, tags)| format!("- {}: {}", id, tags.join(", ")))
            .collect();

        format!(
            r#"You decide whether a user request should be handed to a specialist.

Available specialists:
{}

If no specialist fits, the request stays with the general assistant.

Respond with ONLY a JSON object, no other text:
{{"needs_delegation": true|false, "target_worker": "<specialist id or null>", "confidence": <0.0-1.0>, "reasoning": "<one sentence>", "task_type": "<short label>"}}"#,
            workers.join("\n")
        )
    }

    fn build_messages(
        &self,
        task: &str,
        global_context: &Map<String, Value>,
        capabilities: &BTreeMap<String, Vec<String>>,
    ) -> Vec<PromptMessage> {
        let context = format_context_for_prompt(global_context);
        let user = if context.is_empty() {
            format!("Request: {}", task)
        } else {
            format!("{}\n\nRequest: {}", context, task)
        };

        vec![
            PromptMessage::system(self.system_prompt(capabilities)),
            PromptMessage::user(user),
        ]
    }

    /// Validate a raw model reply against the registered workers.
    pub fn parse_decision(
        output: &str,
        capabilities: &BTreeMap<String, Vec<String>>,
    ) -> Result<DelegationDecision> {
        let json = extract_json_object(output)
            .ok_or_else(|| AppError::MalformedDelegation("no JSON object in reply".to_string()))?;

        let raw: RawDecision = serde_json::from_str(json)
            .map_err(|e| AppError::MalformedDelegation(format!("invalid JSON: {}", e)))?;

        let needs_delegation = raw
            .needs_delegation
            .ok_or_else(|| AppError::MalformedDelegation("missing needs_delegation".to_string()))?;

        let confidence = raw
            .confidence
            .ok_or_else(|| AppError::MalformedDelegation("missing confidence".to_string()))?;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(AppError::MalformedDelegation(format!(
                "confidence {} outside [0, 1]",
                confidence
            )));
        }

        let target_worker = if needs_delegation {
            let target = raw
                .target_worker
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("null"))
                .ok_or_else(|| AppError::MalformedDelegation("missing target_worker".to_string()))?;
            let registered = capabilities
                .keys()
                .find(|id| id.eq_ignore_ascii_case(&target))
                .ok_or_else(|| {
                    AppError::MalformedDelegation(format!("unknown worker '{}'", target))
                })?;
            Some(registered.clone())
        } else {
            None
        };

        Ok(DelegationDecision {
            needs_delegation,
            target_worker,
            confidence,
            reasoning: raw.reasoning.unwrap_or_default(),
            task_type: raw.task_type,
        })
    }

    pub async fn classify(
        &self,
        task: &str,
        global_context: &Map<String, Value>,
        capabilities: &BTreeMap<String, Vec<String>>,
    ) -> DelegationDecision {
        let messages = self.build_messages(task, global_context, capabilities);

        let output = match self.backends.complete(&messages, self.max_tokens).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(error = %e, "Delegation classifier unavailable, keeping task with coordinator");
                return DelegationDecision::no_delegation(format!("classifier unavailable: {}", e));
            }
        };

        match Self::parse_decision(&output, capabilities) {
            Ok(decision) => {
                tracing::debug!(
                    needs_delegation = decision.needs_delegation,
                    target = ?decision.target_worker,
                    confidence = decision.confidence,
                    "Delegation classified"
                );
                decision
            }
            Err(e) => {
                tracing::warn!(error = %e, raw = %output, "Discarding malformed delegation response");
                DelegationDecision::no_delegation(e.to_string())
            }
        }
    }
}

/// The outermost `{...}` span of `text`, skipping code fences or chatter.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
