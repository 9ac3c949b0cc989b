//! # switchboard
//!
//! Task routing and delegation core for a multi-agent personal assistant.
//!
//! Every request enters through [`WorkflowEngine::process_task`]. A
//! coordinator worker asks the model whether a specialist should take the
//! request; delegations below the confidence floor, or naming an unknown
//! worker, stay with the coordinator. Each worker call runs under a per-worker
//! circuit breaker with a timeout, is retried with exponential backoff while
//! the error is transient, and has panics converted into errors. Sessions keep
//! their history, events and per-worker state under a per-session lock, so
//! concurrent requests to one session apply in order.
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use switchboard::{SwitchboardConfig, WorkflowEngineBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = WorkflowEngineBuilder::new(SwitchboardConfig::default())
//!         .build()
//!         .await?;
//!
//!     let reply = engine
//!         .process_task("session-1", "Book a dentist appointment tomorrow 2-3pm")
//!         .await;
//!     println!("{}: {}", reply.worker_id.unwrap_or_default(), reply.response_text);
//!     Ok(())
//! }
//! ```
//!
//! Backends are traits, so tests and embedders can swap them:
//!
//! ```rust,ignore
//! let engine = WorkflowEngineBuilder::new(config)
//!     .with_inference(my_backend)
//!     .with_persistence(Arc::new(InMemoryPersistence::default()))
//!     .build()
//!     .await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama inference backend (default) |
//! | `web-search` | DuckDuckGo search backend (default) |
//!
//! ## Modules
//!
//! - [`workflows`] - The engine and its builder
//! - [`agents`] - Worker trait, coordinator, specialists, classifier
//! - [`resilience`] - Circuit breakers and retry
//! - [`session`] - Per-session state and locking
//! - [`db`] - Session persistence (memory, SQLite)
//! - [`llm`] - Inference backends
//! - [`tools`] - Search backend and built-in tools
//! - [`schedule`] - Time range parsing and overlap checks

#![warn(rustdoc::missing_crate_level_docs)]

/// Workers, the coordinator and the delegation classifier.
pub mod agents;
/// Command-line parsing and terminal output.
pub mod cli;
/// Session persistence backends.
pub mod db;
/// Inference backend clients.
pub mod llm;
/// Prompt history helpers.
pub mod memory;
/// Circuit breakers and retry.
pub mod resilience;
/// Calendar time parsing.
pub mod schedule;
/// Session state and the session store.
pub mod session;
/// Search backend and built-in tools.
pub mod tools;
/// Core types (responses, health, errors).
pub mod types;
/// Configuration and logging setup.
pub mod utils;
/// The workflow engine.
pub mod workflows;

pub use agents::{CapabilityRegistry, TaskContext, Worker, WorkerOutput};
pub use db::{PersistenceProvider, SessionPersistence};
pub use llm::{InferenceBackend, InferenceProvider};
pub use resilience::{BreakerConfig, BreakerSet, BreakerState, RetryPolicy};
pub use session::SessionStore;
pub use tools::{SearchBackend, ToolBackend, ToolRegistry};
pub use types::{AppError, ErrorKind, HealthStatus, Result, SessionStatus, TaskResponse};
pub use utils::toml_config::SwitchboardConfig;
pub use workflows::{EngineSettings, WorkflowEngine, WorkflowEngineBuilder};
