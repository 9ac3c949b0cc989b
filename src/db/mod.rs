//! Session persistence backends.
//!
//! - **memory**: process-local map, the default
//! - **sqlite**: libSQL database (local file or `:memory:`), one JSON row per session

pub mod memory;
pub mod sqlite;
pub mod traits;

pub use memory::InMemoryPersistence;
pub use sqlite::SqlitePersistence;
pub use traits::{PersistenceProvider, SessionPersistence};
