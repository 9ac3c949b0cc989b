use super::traits::SessionPersistence;
use crate::session::WorkflowState;
use crate::types::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Process-local persistence. Sessions are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    sessions: RwLock<HashMap<String, WorkflowState>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionPersistence for InMemoryPersistence {
    async fn load_session(&self, session_id: &str) -> Result<Option<WorkflowState>> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn save_session(&self, state: &WorkflowState) -> Result<()> {
        self.sessions
            .write()
            .insert(state.session_id.clone(), state.clone());
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.write().remove(session_id).is_some())
    }

    async fn session_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = InMemoryPersistence::new();
        assert!(store.load_session("s1").await.unwrap().is_none());

        let mut state = WorkflowState::new("s1");
        state.iteration_count = 3;
        store.save_session(&state).await.unwrap();

        let loaded = store.load_session("s1").await.unwrap().unwrap();
        assert_eq!(loaded.iteration_count, 3);
        assert_eq!(store.session_ids().await.unwrap(), vec!["s1".to_string()]);

        assert!(store.delete_session("s1").await.unwrap());
        assert!(!store.delete_session("s1").await.unwrap());
    }
}
