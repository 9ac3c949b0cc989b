//! Backends workers call beyond the language model.
//!
//! # Module Structure
//!
//! - [`registry`](crate::tools::registry) - `Tool` trait, the `ToolBackend` contract and `ToolRegistry`
//! - [`journal`](crate::tools::journal) - In-memory assistant journal
//! - [`python`](crate::tools::python) - `python_repl` code runner
//! - [`search`](crate::tools::search) - `SearchBackend` trait and the DuckDuckGo backend
//!
//! ```ignore
//! let registry = ToolRegistry::with_default_tools();
//! let run = registry.run_tool("journal", json!({"operation": "read"})).await?;
//! assert_eq!(run.exit_status, 0);
//! ```

/// Assistant journal.
pub mod journal;
/// Python snippet runner.
pub mod python;
/// Tool registry and tool backend contract.
pub mod registry;
/// Web search backend.
pub mod search;

pub use registry::{Tool, ToolBackend, ToolRegistry, ToolRun};
#[cfg(feature = "web-search")]
pub use search::DuckDuckGoSearch;
pub use search::{SearchBackend, SearchResponse, SearchSource};
