use super::WorkflowState;
use crate::db::SessionPersistence;
use crate::types::Result;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<WorkflowState>>;

/// Exclusive access to one session for the duration of a task.
pub type SessionGuard = OwnedMutexGuard<WorkflowState>;

/// Owns every cached [`WorkflowState`] and serializes work per session.
///
/// Each session sits behind its own async mutex, so tasks for the same
/// session run one after another while different sessions proceed in
/// parallel. The map itself is only locked briefly to find or insert a slot.
pub struct SessionStore {
    persistence: Arc<dyn SessionPersistence>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl SessionStore {
    pub fn new(persistence: Arc<dyn SessionPersistence>) -> Self {
        Self {
            persistence,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn persistence(&self) -> &Arc<dyn SessionPersistence> {
        &self.persistence
    }

    async fn slot(&self, session_id: &str) -> Result<Slot> {
        let cached = self.slots.lock().get(session_id).cloned();
        if let Some(slot) = cached {
            return Ok(slot);
        }

        let state = match self.persistence.load_session(session_id).await? {
            Some(state) => {
                tracing::debug!(session_id, "Restored session from persistence");
                state
            }
            None => {
                tracing::info!(session_id, "Created new session");
                WorkflowState::new(session_id)
            }
        };

        // Another caller may have inserted the slot while we were loading.
        Ok(self
            .slots
            .lock()
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(state)))
            .clone())
    }

    fn is_current(&self, session_id: &str, slot: &Slot) -> bool {
        self.slots
            .lock()
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, slot))
    }

    /// Lock a session, loading or creating it first.
    ///
    /// Waits while another task holds the same session.
    pub async fn lock(&self, session_id: &str) -> Result<SessionGuard> {
        loop {
            let slot = self.slot(session_id).await?;
            let guard = slot.clone().lock_owned().await;
            // The slot may have been cleared or evicted while we waited.
            if self.is_current(session_id, &slot) {
                return Ok(guard);
            }
        }
    }

    /// Write the state through to the persistence backend.
    pub async fn save(&self, state: &WorkflowState) -> Result<()> {
        self.persistence.save_session(state).await
    }

    /// Snapshot of a session without creating it.
    pub async fn peek(&self, session_id: &str) -> Result<Option<WorkflowState>> {
        let cached = self.slots.lock().get(session_id).cloned();
        match cached {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => self.persistence.load_session(session_id).await,
        }
    }

    /// Drop a session from the cache and the persistence backend.
    ///
    /// Waits for an in-flight task on the session to finish first.
    pub async fn clear(&self, session_id: &str) -> Result<bool> {
        let cached = self.slots.lock().get(session_id).cloned();
        let mut existed = false;

        if let Some(slot) = cached {
            let _guard = slot.lock().await;
            let mut slots = self.slots.lock();
            if slots
                .get(session_id)
                .is_some_and(|current| Arc::ptr_eq(current, &slot))
            {
                slots.remove(session_id);
                existed = true;
            }
        }

        let deleted = self.persistence.delete_session(session_id).await?;
        tracing::info!(session_id, "Cleared session");
        Ok(existed || deleted)
    }

    /// Drop cached sessions idle for longer than `ttl`. Busy sessions are
    /// skipped. Persisted copies are kept.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;

        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|session_id, slot| match slot.try_lock() {
            Ok(state) if state.last_activity_at < cutoff => {
                tracing::debug!(session_id = %session_id, "Evicting idle session");
                false
            }
            _ => true,
        });
        before - slots.len()
    }

    /// Number of sessions currently cached.
    pub fn active_count(&self) -> usize {
        self.slots.lock().len()
    }
}
