//! Shared helpers for the integration tests.
#![allow(dead_code)]

pub mod mocks;

use mocks::MockInference;
use std::sync::Arc;
use switchboard::db::InMemoryPersistence;
use switchboard::{InferenceBackend, SwitchboardConfig, WorkflowEngine, WorkflowEngineBuilder};

/// Defaults with web search off and short backoff.
pub fn test_config() -> SwitchboardConfig {
    let mut config = SwitchboardConfig::default();
    config.search.enabled = false;
    config.retry.base_delay_ms = 10;
    config
}

pub async fn engine_with_config(
    config: SwitchboardConfig,
    inference: Arc<dyn InferenceBackend>,
) -> WorkflowEngine {
    WorkflowEngineBuilder::new(config)
        .with_inference(inference)
        .with_persistence(Arc::new(InMemoryPersistence::new()))
        .build()
        .await
        .expect("engine should build")
}

pub async fn engine_with(inference: Arc<dyn InferenceBackend>) -> WorkflowEngine {
    engine_with_config(test_config(), inference).await
}

/// Engine whose classifier never delegates and whose workers echo the task.
pub async fn echo_engine() -> (WorkflowEngine, Arc<MockInference>) {
    let inference = Arc::new(MockInference::new());
    let engine = engine_with(inference.clone()).await;
    (engine, inference)
}
