//! Configuration and process setup.

/// Tracing subscriber setup.
pub mod logging;
/// TOML configuration (`switchboard.toml`).
pub mod toml_config;

pub use logging::init_logging;
pub use toml_config::{ConfigError, SwitchboardConfig};
