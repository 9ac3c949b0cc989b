//! Failure handling for calls into backend dependencies.
//!
//! - [`CircuitBreaker`] / [`BreakerSet`]: one breaker per dependency, shared
//!   across sessions.
//! - [`with_retry`]: bounded retries with exponential backoff, skipped while
//!   the breaker is open.

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{BreakerConfig, BreakerSet, BreakerState, CallPermit, CircuitBreaker};
pub use retry::{panic_to_error, with_retry, RetryPolicy};

/// Breaker name for the inference backend.
pub const INFERENCE: &str = "inference";
/// Breaker name for the search backend.
pub const SEARCH: &str = "search";
/// Breaker name for the tool backend.
pub const TOOLS: &str = "tools";
