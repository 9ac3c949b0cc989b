//! Capability registry
//!
//! Holds the workers the engine may route to and the capability tags each
//! one declares. Workers are registered at startup; the registry is then
//! handed to the engine and only read.

use crate::agents::Worker;
use crate::types::{AppError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
pub struct CapabilityRegistry {
    workers: BTreeMap<String, Arc<dyn Worker>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker, replacing any previous worker with the same id.
    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        let id = worker.id().to_string();
        if self.workers.insert(id.clone(), worker).is_some() {
            tracing::warn!(worker = %id, "Replaced previously registered worker");
        } else {
            tracing::debug!(worker = %id, "Registered worker");
        }
    }

    pub fn unregister(&mut self, worker_id: &str) -> Option<Arc<dyn Worker>> {
        self.workers.remove(worker_id)
    }

    pub fn get(&self, worker_id: &str) -> Option<Arc<dyn Worker>> {
        self.workers.get(worker_id).cloned()
    }

    pub fn contains(&self, worker_id: &str) -> bool {
        self.workers.contains_key(worker_id)
    }

    /// Worker id to declared capability tags.
    pub fn capabilities(&self) -> BTreeMap<String, Vec<String>> {
        self.workers
            .iter()
            .map(|(id, worker)| (id.clone(), worker.capabilities()))
            .collect()
    }

    pub fn worker_ids(&self) -> Vec<String> {
        self.workers.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

/// Builder for creating a CapabilityRegistry with a fluent API
///
/// ```rust,ignore
/// let registry = CapabilityRegistryBuilder::new()
///     .with_worker(Arc::new(CoordinatorWorker::new(backends.clone(), 1000)))
///     .with_worker(Arc::new(CalendarWorker::new(backends.clone(), events, 1000)))
///     .require("personal_assistant")
///     .build()?;
/// ```
#[derive(Default)]
pub struct CapabilityRegistryBuilder {
    workers: Vec<Arc<dyn Worker>>,
    required: Vec<String>,
}

impl CapabilityRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.workers.push(worker);
        self
    }

    /// Fail `build` unless a worker with this id was added.
    pub fn require(mut self, worker_id: &str) -> Self {
        self.required.push(worker_id.to_string());
        self
    }

    pub fn build(self) -> Result<CapabilityRegistry> {
        let mut registry = CapabilityRegistry::new();
        for worker in self.workers {
            registry.register(worker);
        }

        if let Some(missing) = self.required.iter().find(|id| !registry.contains(id)) {
            return Err(AppError::Configuration(format!(
                "Required worker '{}' is not registered",
                missing
            )));
        }

        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{TaskContext, WorkerOutput};
    use async_trait::async_trait;

    struct StubWorker(&'static str, &'static [&'static str]);

    #[async_trait]
    impl Worker for StubWorker {
        fn id(&self) -> &str {
            self.0
        }

        fn capabilities(&self) -> Vec<String> {
            self.1.iter().map(|s| s.to_string()).collect()
        }

        fn can_handle(&self, _task: &str, _context: &TaskContext) -> bool {
            true
        }

        async fn process(&self, _task: &str, _context: &TaskContext) -> Result<WorkerOutput> {
            Ok(WorkerOutput::text(self.0))
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(StubWorker("calendar", &["scheduling"])));

        assert!(registry.contains("calendar"));
        assert_eq!(registry.get("calendar").unwrap().id(), "calendar");
        assert!(registry.get("search").is_none());
    }

    #[test]
    fn test_capabilities_map() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(StubWorker("search", &["web_search", "research"])));
        registry.register(Arc::new(StubWorker("calendar", &["scheduling"])));

        let caps = registry.capabilities();
        assert_eq!(caps.len(), 2);
        assert_eq!(caps["search"], vec!["web_search", "research"]);
        assert_eq!(registry.worker_ids(), vec!["calendar", "search"]);
    }

    #[test]
    fn test_unregister() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(StubWorker("calendar", &[])));
        assert!(registry.unregister("calendar").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_builder_requires_coordinator() {
        let result = CapabilityRegistryBuilder::new()
            .with_worker(Arc::new(StubWorker("calendar", &[])))
            .require("personal_assistant")
            .build();
        assert!(matches!(result, Err(AppError::Configuration(_))));

        let registry = CapabilityRegistryBuilder::new()
            .with_worker(Arc::new(StubWorker("personal_assistant", &[])))
            .require("personal_assistant")
            .build()
            .unwrap();
        assert_eq!(registry.len(), 1);
    }
}
