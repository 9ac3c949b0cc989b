//! TOML-based configuration for switchboard
//!
//! Every field has a default, so an empty `switchboard.toml` is a valid
//! configuration. Environment variables (loaded from `.env` by the binary)
//! override the inference endpoint and model.

use crate::db::PersistenceProvider;
use crate::resilience::{BreakerConfig, RetryPolicy};
use crate::workflows::EngineSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `[inference].base_url`.
pub const ENV_OLLAMA_URL: &str = "SWITCHBOARD_OLLAMA_URL";
/// Overrides `[inference].model`.
pub const ENV_MODEL: &str = "SWITCHBOARD_MODEL";

/// Root configuration structure loaded from switchboard.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub inference: InferenceConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============= Engine Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Minimum classifier confidence (0.0-1.0) for a delegation to stick
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f64,

    #[serde(default = "default_worker_timeout_secs")]
    pub worker_timeout_secs: u64,

    /// Worker that keeps tasks nobody else takes
    #[serde(default = "default_coordinator")]
    pub coordinator: String,

    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

fn default_max_iterations() -> u32 {
    10
}

fn default_confidence_floor() -> f64 {
    0.5
}

fn default_worker_timeout_secs() -> u64 {
    30
}

fn default_coordinator() -> String {
    crate::agents::coordinator::COORDINATOR_ID.to_string()
}

fn default_history_window() -> usize {
    crate::memory::DEFAULT_HISTORY_WINDOW
}

fn default_session_ttl_secs() -> u64 {
    3600
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            confidence_floor: default_confidence_floor(),
            worker_timeout_secs: default_worker_timeout_secs(),
            coordinator: default_coordinator(),
            history_window: default_history_window(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

// ============= Resilience Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per task, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,

    #[serde(default = "default_failure_window_secs")]
    pub failure_window_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    30
}

fn default_failure_window_secs() -> u64 {
    60
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
            failure_window_secs: default_failure_window_secs(),
        }
    }
}

// ============= Backend Configuration =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Reply budget for worker completions
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Reply budget for delegation classification
    #[serde(default = "default_classifier_max_tokens")]
    pub classifier_max_tokens: u32,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_classifier_max_tokens() -> u32 {
    crate::agents::router::DEFAULT_CLASSIFIER_MAX_TOKENS
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            classifier_max_tokens: default_classifier_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_sources() -> usize {
    crate::agents::search::DEFAULT_MAX_SOURCES
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_sources: default_max_sources(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: PersistenceBackend,

    /// Database file for the sqlite backend (`:memory:` allowed)
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl SwitchboardConfig {
    /// Load, apply environment overrides, and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse without touching the environment or validating.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_OLLAMA_URL).filter(|v| !v.trim().is_empty()) {
            self.inference.base_url = url;
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
            self.inference.model = model;
        }
    }

    /// Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

        if self.engine.max_iterations == 0 {
            return invalid("engine.max_iterations must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.engine.confidence_floor) {
            return invalid("engine.confidence_floor must be between 0.0 and 1.0");
        }
        if self.engine.coordinator.trim().is_empty() {
            return invalid("engine.coordinator must not be empty");
        }
        if self.engine.worker_timeout_secs == 0 {
            return invalid("engine.worker_timeout_secs must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if self.breaker.failure_threshold == 0 {
            return invalid("breaker.failure_threshold must be at least 1");
        }
        if self.persistence.backend == PersistenceBackend::Sqlite
            && self
                .persistence
                .path
                .as_deref()
                .is_none_or(|p| p.trim().is_empty())
        {
            return invalid("persistence.path is required for the sqlite backend");
        }

        Ok(())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_iterations: self.engine.max_iterations,
            confidence_floor: self.engine.confidence_floor,
            worker_timeout: Duration::from_secs(self.engine.worker_timeout_secs),
            coordinator: self.engine.coordinator.clone(),
            history_window: self.engine.history_window,
            session_ttl: Duration::from_secs(self.engine.session_ttl_secs),
            retry: RetryPolicy::new(
                self.retry.max_attempts,
                Duration::from_millis(self.retry.base_delay_ms),
            ),
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker.failure_threshold,
            reset_timeout: Duration::from_secs(self.breaker.reset_timeout_secs),
            failure_window: Duration::from_secs(self.breaker.failure_window_secs),
        }
    }

    pub fn persistence_provider(&self) -> PersistenceProvider {
        match self.persistence.backend {
            PersistenceBackend::Memory => PersistenceProvider::Memory,
            PersistenceBackend::Sqlite => PersistenceProvider::Sqlite {
                path: self.persistence.path.clone().unwrap_or_default(),
            },
        }
    }

    /// Render the configuration as TOML, e.g. for `switchboard init`.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationError(format!("Failed to render TOML: {}", e)))
    }
}
