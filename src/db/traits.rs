//! Session persistence abstraction
//!
//! The engine only needs to load and save whole [`WorkflowState`] values; how
//! they are stored is up to the backend.
//!
//! ```rust,ignore
//! use switchboard::db::PersistenceProvider;
//!
//! // Process-local, lost on restart (default)
//! let store = PersistenceProvider::Memory.create().await?;
//!
//! // File-backed libSQL
//! let store = PersistenceProvider::Sqlite { path: "sessions.db".into() }.create().await?;
//! ```

use crate::session::WorkflowState;
use crate::types::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Persistence backend configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PersistenceProvider {
    #[default]
    Memory,
    /// libSQL database at `path` (`:memory:` for an ephemeral database)
    Sqlite { path: String },
}

impl PersistenceProvider {
    pub async fn create(&self) -> Result<Arc<dyn SessionPersistence>> {
        match self {
            PersistenceProvider::Memory => Ok(Arc::new(super::memory::InMemoryPersistence::new())),
            PersistenceProvider::Sqlite { path } => {
                let store = super::sqlite::SqlitePersistence::open(path).await?;
                Ok(Arc::new(store))
            }
        }
    }
}

#[async_trait]
pub trait SessionPersistence: Send + Sync {
    async fn load_session(&self, session_id: &str) -> Result<Option<WorkflowState>>;

    /// Insert or replace the stored state.
    async fn save_session(&self, state: &WorkflowState) -> Result<()>;

    /// Returns whether a stored session was removed.
    async fn delete_session(&self, session_id: &str) -> Result<bool>;

    async fn session_ids(&self) -> Result<Vec<String>>;

    fn backend_name(&self) -> &'static str;
}
