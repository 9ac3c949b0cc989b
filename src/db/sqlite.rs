use super::traits::SessionPersistence;
use crate::session::WorkflowState;
use crate::types::{AppError, Result};
use async_trait::async_trait;
use libsql::{Builder, Connection, Database};

/// Session persistence over libSQL.
///
/// Holds a single connection so that `:memory:` databases keep their data
/// for the lifetime of the store.
pub struct SqlitePersistence {
    _db: Database,
    conn: Connection,
}

impl SqlitePersistence {
    pub async fn open(path: &str) -> Result<Self> {
        let db = Builder::new_local(path)
            .build()
            .await
            .map_err(|e| AppError::Database(format!("Failed to open {}: {}", path, e)))?;

        let conn = db
            .connect()
            .map_err(|e| AppError::Database(format!("Failed to get connection: {}", e)))?;

        let store = Self { _db: db, conn };
        store.initialize_schema().await?;

        tracing::info!(path, "Opened session database");
        Ok(store)
    }

    pub async fn open_in_memory() -> Result<Self> {
        Self::open(":memory:").await
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS workflow_sessions (
                    session_id TEXT PRIMARY KEY,
                    state TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
                (),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to create sessions table: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl SessionPersistence for SqlitePersistence {
    async fn load_session(&self, session_id: &str) -> Result<Option<WorkflowState>> {
        let mut rows = self
            .conn
            .query(
                "SELECT state FROM workflow_sessions WHERE session_id = ?",
                [session_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to query session: {}", e)))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let raw: String = row.get(0).map_err(|e| AppError::Database(e.to_string()))?;
        let state = serde_json::from_str(&raw).map_err(|e| {
            AppError::Database(format!("Corrupt state for session {}: {}", session_id, e))
        })?;
        Ok(Some(state))
    }

    async fn save_session(&self, state: &WorkflowState) -> Result<()> {
        let raw = serde_json::to_string(state)?;

        self.conn
            .execute(
                "INSERT INTO workflow_sessions (session_id, state, updated_at)
                 VALUES (?, ?, ?)
                 ON CONFLICT(session_id) DO UPDATE SET
                    state = excluded.state,
                    updated_at = excluded.updated_at",
                (
                    state.session_id.as_str(),
                    raw,
                    state.last_activity_at.timestamp(),
                ),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to save session: {}", e)))?;

        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM workflow_sessions WHERE session_id = ?",
                [session_id],
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete session: {}", e)))?;

        Ok(removed > 0)
    }

    async fn session_ids(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT session_id FROM workflow_sessions ORDER BY session_id",
                (),
            )
            .await
            .map_err(|e| AppError::Database(format!("Failed to list sessions: {}", e)))?;

        let mut ids = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            ids.push(row.get(0).map_err(|e| AppError::Database(e.to_string()))?);
        }
        Ok(ids)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageRole;

    #[tokio::test]
    async fn test_round_trip_in_memory() {
        let store = SqlitePersistence::open_in_memory().await.unwrap();

        let mut state = WorkflowState::new("s1");
        state.add_message(MessageRole::User, "hello", None);
        state.iteration_count = 1;
        store.save_session(&state).await.unwrap();

        state.iteration_count = 2;
        store.save_session(&state).await.unwrap();

        let loaded = store.load_session("s1").await.unwrap().unwrap();
        assert_eq!(loaded.iteration_count, 2);
        assert_eq!(loaded.message_history.len(), 1);
        assert_eq!(store.session_ids().await.unwrap(), vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_session_is_none() {
        let store = SqlitePersistence::open_in_memory().await.unwrap();
        assert!(store.load_session("nope").await.unwrap().is_none());
        assert!(!store.delete_session("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let path = path.to_str().unwrap();

        {
            let store = SqlitePersistence::open(path).await.unwrap();
            store.save_session(&WorkflowState::new("s1")).await.unwrap();
        }

        let store = SqlitePersistence::open(path).await.unwrap();
        assert!(store.load_session("s1").await.unwrap().is_some());
        assert!(store.delete_session("s1").await.unwrap());
    }
}
