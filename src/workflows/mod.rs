//! Workflow Engine Module
//!
//! The [`WorkflowEngine`] is the single entry point for task processing. It
//! loads the session, asks the delegation classifier who should handle the
//! task, runs the chosen worker under its circuit breaker, and records the
//! outcome.
//!
//! # Configuration
//!
//! Engine limits come from `switchboard.toml`:
//!
//! ```toml
//! [engine]
//! max_iterations = 10
//! confidence_floor = 0.5
//! worker_timeout_secs = 30
//! coordinator = "personal_assistant"
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let engine = WorkflowEngineBuilder::new(config).build().await?;
//! let response = engine.process_task("s1", "Schedule a meeting tomorrow 2-3pm").await;
//! println!("{} answered: {}", response.worker_id.unwrap_or_default(), response.response_text);
//! ```

pub mod builder;
pub mod engine;

pub use builder::WorkflowEngineBuilder;
pub use engine::{worker_breaker_name, EngineSettings, WorkflowEngine};
