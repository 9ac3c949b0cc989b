//! Per-session conversation state.
//!
//! A [`WorkflowState`] is owned by the [`SessionStore`]; the engine borrows it
//! for the duration of one task through the per-session lock. Workers never
//! see it directly, they get a [`TaskContext`](crate::agents::TaskContext)
//! snapshot instead.

pub mod store;

pub use store::{SessionGuard, SessionStore};

use crate::types::MessageRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One entry of a session's message history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowEventType {
    UserInput,
    Delegation,
    WorkerStart,
    WorkerComplete,
    WorkerError,
    IterationLimit,
}

/// Audit entry in a session's workflow history. Never read back for routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: WorkflowEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    pub iteration: u32,
    #[serde(default)]
    pub data: Value,
}

/// Scratch state for one worker within one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub worker_id: String,
    #[serde(default)]
    pub local_context: Map<String, Value>,
    #[serde(default)]
    pub last_action: Option<String>,
    #[serde(default)]
    pub error_count: u32,
}

impl AgentState {
    pub fn new(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub message_history: Vec<ChatMessage>,
    #[serde(default)]
    pub global_context: Map<String, Value>,
    #[serde(default)]
    pub agent_states: BTreeMap<String, AgentState>,
    #[serde(default)]
    pub iteration_count: u32,
    #[serde(default)]
    pub current_worker: Option<String>,
    #[serde(default)]
    pub workflow_history: Vec<WorkflowEvent>,
}

impl WorkflowState {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            created_at: now,
            last_activity_at: now,
            message_history: Vec::new(),
            global_context: Map::new(),
            agent_states: BTreeMap::new(),
            iteration_count: 0,
            current_worker: None,
            workflow_history: Vec::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity_at = Utc::now();
    }

    pub fn add_message(&mut self, role: MessageRole, content: impl Into<String>, worker_id: Option<&str>) {
        self.message_history.push(ChatMessage {
            role,
            content: content.into(),
            worker_id: worker_id.map(str::to_string),
            timestamp: Utc::now(),
        });
    }

    pub fn record_event(&mut self, event_type: WorkflowEventType, worker_id: Option<&str>, data: Value) {
        self.workflow_history.push(WorkflowEvent {
            timestamp: Utc::now(),
            event_type,
            worker_id: worker_id.map(str::to_string),
            iteration: self.iteration_count,
            data,
        });
    }

    /// The worker's state in this session, created on first use.
    pub fn agent_state_mut(&mut self, worker_id: &str) -> &mut AgentState {
        self.agent_states
            .entry(worker_id.to_string())
            .or_insert_with(|| AgentState::new(worker_id))
    }

    /// The last `window` messages, oldest first.
    pub fn recent_messages(&self, window: usize) -> &[ChatMessage] {
        let skip = self.message_history.len().saturating_sub(window);
        &self.message_history[skip..]
    }

    /// Apply a worker's context writes. Later writers win per key.
    pub fn merge_global_context(&mut self, updates: Map<String, Value>) {
        for (key, value) in updates {
            self.global_context.insert(key, value);
        }
    }
}
