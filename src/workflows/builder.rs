//! Wires a [`WorkflowEngine`] together from configuration.
//!
//! Backends default to the ones named in the configuration; tests and
//! embedders can inject their own.

use super::WorkflowEngine;
use crate::agents::{
    Backends, CalendarWorker, CapabilityRegistryBuilder, CodeAssistantWorker, CoordinatorWorker,
    DelegationClassifier, EventStore, SearchWorker, Worker,
};
use crate::db::SessionPersistence;
use crate::llm::{InferenceBackend, InferenceProvider};
use crate::resilience::BreakerSet;
use crate::session::SessionStore;
use crate::tools::{SearchBackend, ToolBackend, ToolRegistry};
use crate::types::Result;
use crate::utils::SwitchboardConfig;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct WorkflowEngineBuilder {
    config: SwitchboardConfig,
    inference: Option<Arc<dyn InferenceBackend>>,
    search: Option<Arc<dyn SearchBackend>>,
    tools: Option<Arc<dyn ToolBackend>>,
    persistence: Option<Arc<dyn SessionPersistence>>,
    events: Option<Arc<EventStore>>,
    extra_workers: Vec<Arc<dyn Worker>>,
}

impl WorkflowEngineBuilder {
    pub fn new(config: SwitchboardConfig) -> Self {
        Self {
            config,
            inference: None,
            search: None,
            tools: None,
            persistence: None,
            events: None,
            extra_workers: Vec::new(),
        }
    }

    pub fn with_inference(mut self, inference: Arc<dyn InferenceBackend>) -> Self {
        self.inference = Some(inference);
        self
    }

    pub fn with_search(mut self, search: Arc<dyn SearchBackend>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolBackend>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_persistence(mut self, persistence: Arc<dyn SessionPersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Share a calendar between engines.
    pub fn with_event_store(mut self, events: Arc<EventStore>) -> Self {
        self.events = Some(events);
        self
    }

    /// Register an additional worker; replaces a built-in with the same id.
    pub fn with_worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.extra_workers.push(worker);
        self
    }

    fn default_search(config: &SwitchboardConfig) -> Option<Arc<dyn SearchBackend>> {
        if !config.search.enabled {
            return None;
        }
        #[cfg(feature = "web-search")]
        {
            Some(Arc::new(crate::tools::DuckDuckGoSearch::new(config.search.max_sources)))
        }
        #[cfg(not(feature = "web-search"))]
        {
            tracing::warn!("Search enabled but the `web-search` feature is not compiled in");
            None
        }
    }

    pub async fn build(self) -> Result<WorkflowEngine> {
        let config = self.config;
        let settings = config.engine_settings();
        let max_tokens = config.inference.max_tokens;

        let inference = match self.inference {
            Some(inference) => inference,
            None => InferenceProvider::Ollama {
                base_url: config.inference.base_url.clone(),
                model: config.inference.model.clone(),
            }
            .create_backend()?,
        };
        let search = self.search.or_else(|| Self::default_search(&config));
        let tools = self
            .tools
            .unwrap_or_else(|| Arc::new(ToolRegistry::with_default_tools()));
        let persistence = match self.persistence {
            Some(persistence) => persistence,
            None => config.persistence_provider().create().await?,
        };

        let breakers = Arc::new(BreakerSet::new(config.breaker_config()));
        let mut backends = Backends::new(inference, breakers.clone(), settings.worker_timeout)
            .with_tools(tools);
        if let Some(search) = search {
            backends = backends.with_search(search);
        }

        let events = self.events.unwrap_or_default();
        let specialists: Vec<Arc<dyn Worker>> = vec![
            Arc::new(CalendarWorker::new(backends.clone(), events, max_tokens)),
            Arc::new(SearchWorker::new(
                backends.clone(),
                config.search.max_sources,
                max_tokens,
            )),
            Arc::new(CodeAssistantWorker::new(backends.clone(), max_tokens)),
        ];

        let specialist_capabilities: BTreeMap<String, Vec<String>> = specialists
            .iter()
            .chain(self.extra_workers.iter())
            .filter(|w| w.id() != settings.coordinator)
            .map(|w| (w.id().to_string(), w.capabilities()))
            .collect();
        let coordinator = CoordinatorWorker::new(backends.clone(), max_tokens)
            .with_id(settings.coordinator.clone())
            .with_specialists(specialist_capabilities);

        let mut registry = CapabilityRegistryBuilder::new().with_worker(Arc::new(coordinator));
        for worker in specialists.into_iter().chain(self.extra_workers) {
            registry = registry.with_worker(worker);
        }
        let registry = registry.require(&settings.coordinator).build()?;

        let classifier = DelegationClassifier::new(
            backends,
            settings.coordinator.clone(),
            config.inference.classifier_max_tokens,
        );

        tracing::info!(
            model = %config.inference.model,
            persistence = persistence.backend_name(),
            "Building workflow engine"
        );

        WorkflowEngine::new(
            settings,
            registry,
            classifier,
            breakers,
            SessionStore::new(persistence),
        )
    }
}
