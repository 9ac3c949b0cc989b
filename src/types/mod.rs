use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============= Message Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A message sent to the inference backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: MessageRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// ============= Task Response Types =============

/// Structured result of `WorkflowEngine::process_task`.
///
/// Every outcome, including failures, is expressed through this type so the
/// request-handling layer can render it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    pub success: bool,
    pub response_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskResponse {
    pub fn succeeded(
        session_id: &str,
        worker_id: &str,
        response_text: String,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: true,
            response_text,
            worker_id: Some(worker_id.to_string()),
            metadata,
            session_id: session_id.to_string(),
            error: None,
            message: None,
        }
    }

    /// Build a failure response from an error. Internal errors never leak
    /// their detail to the caller.
    pub fn failed(session_id: &str, worker_id: Option<&str>, err: &AppError) -> Self {
        let kind = err.kind();
        let message = match kind {
            ErrorKind::InternalError => "An internal error occurred".to_string(),
            _ => err.to_string(),
        };

        Self {
            success: false,
            response_text: kind.user_message().to_string(),
            worker_id: worker_id.map(str::to_string),
            metadata: serde_json::Map::new(),
            session_id: session_id.to_string(),
            error: Some(kind),
            message: Some(message),
        }
    }
}

// ============= Health Types =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub overall: OverallHealth,
    pub breakers: BTreeMap<String, crate::resilience::BreakerState>,
    pub active_sessions: usize,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionLifecycle {
    Active,
    NotFound,
}

/// Summary returned by `WorkflowEngine::session_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub status: SessionLifecycle,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_worker: Option<String>,
    pub iteration_count: u32,
    pub worker_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<DateTime<Utc>>,
}

// ============= Error Types =============

/// Error kinds visible to callers of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "InvalidInputError")]
    InvalidInputError,
    IterationLimitExceeded,
    #[serde(rename = "CircuitOpenError")]
    CircuitOpenError,
    BackendTimeout,
    BackendUnavailable,
    MalformedDelegationResponse,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInputError => "InvalidInputError",
            ErrorKind::IterationLimitExceeded => "IterationLimitExceeded",
            ErrorKind::CircuitOpenError => "CircuitOpenError",
            ErrorKind::BackendTimeout => "BackendTimeout",
            ErrorKind::BackendUnavailable => "BackendUnavailable",
            ErrorKind::MalformedDelegationResponse => "MalformedDelegationResponse",
            ErrorKind::InternalError => "InternalError",
        }
    }

    /// Text a front end can show as-is.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInputError => "Please enter a request.",
            ErrorKind::IterationLimitExceeded => {
                "This conversation has reached its limit. Please start a new session."
            }
            ErrorKind::CircuitOpenError => {
                "This service is temporarily unavailable. Please try again shortly."
            }
            ErrorKind::BackendTimeout => "The request took too long to complete. Please try again.",
            ErrorKind::BackendUnavailable => {
                "A required service could not be reached. Please try again later."
            }
            ErrorKind::MalformedDelegationResponse | ErrorKind::InternalError => {
                "Something went wrong while handling your request."
            }
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Iteration limit of {max} tasks reached for this session")]
    IterationLimitExceeded { max: u32 },

    #[error("Circuit open for '{0}'")]
    CircuitOpen(String),

    #[error("Timed out waiting for '{0}'")]
    BackendTimeout(String),

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Malformed delegation response: {0}")]
    MalformedDelegation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(_) => ErrorKind::InvalidInputError,
            AppError::IterationLimitExceeded { .. } => ErrorKind::IterationLimitExceeded,
            AppError::CircuitOpen(_) => ErrorKind::CircuitOpenError,
            AppError::BackendTimeout(_) => ErrorKind::BackendTimeout,
            AppError::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
            AppError::MalformedDelegation(_) => ErrorKind::MalformedDelegationResponse,
            AppError::NotFound(_)
            | AppError::Configuration(_)
            | AppError::Database(_)
            | AppError::Internal(_) => ErrorKind::InternalError,
        }
    }

    /// Whether the retry supervisor may attempt the call again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::BackendTimeout(_) | AppError::BackendUnavailable(_)
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
