//! Workflow Engine
//!
//! Routes one task at a time per session: classify, pick a worker, run it
//! under that worker's circuit breaker with retries, then record the outcome
//! in the session.

use crate::agents::{
    CapabilityRegistry, DelegationClassifier, DelegationDecision, DelegationRecord, TaskContext,
    Worker, WorkerOutput,
};
use crate::agents::coordinator::COORDINATOR_ID;
use crate::resilience::{self, panic_to_error, with_retry, BreakerSet, BreakerState, RetryPolicy};
use crate::session::{SessionGuard, SessionStore, WorkflowEventType, WorkflowState};
use crate::types::{
    AppError, ErrorKind, HealthStatus, MessageRole, OverallHealth, Result, SessionLifecycle, SessionStatus,
    TaskResponse,
};
use chrono::Utc;
use futures::FutureExt;
use serde_json::json;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Runtime knobs for [`WorkflowEngine`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Tasks a session may run before it must be cleared.
    pub max_iterations: u32,
    /// Minimum classifier confidence for a delegation to be accepted.
    pub confidence_floor: f64,
    pub worker_timeout: Duration,
    pub coordinator: String,
    pub history_window: usize,
    pub session_ttl: Duration,
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            confidence_floor: 0.5,
            worker_timeout: Duration::from_secs(30),
            coordinator: COORDINATOR_ID.to_string(),
            history_window: crate::memory::DEFAULT_HISTORY_WINDOW,
            session_ttl: Duration::from_secs(3600),
            retry: RetryPolicy::default(),
        }
    }
}

/// Breaker name guarding a worker, kept apart from backend breaker names.
pub fn worker_breaker_name(worker_id: &str) -> String {
    format!("worker:{}", worker_id)
}

/// The orchestrator. Owns the registry, classifier, breakers and sessions.
pub struct WorkflowEngine {
    settings: EngineSettings,
    registry: CapabilityRegistry,
    classifier: DelegationClassifier,
    breakers: Arc<BreakerSet>,
    sessions: SessionStore,
}

impl WorkflowEngine {
    /// Fails with a configuration error unless the coordinator is registered.
    pub fn new(
        settings: EngineSettings,
        registry: CapabilityRegistry,
        classifier: DelegationClassifier,
        breakers: Arc<BreakerSet>,
        sessions: SessionStore,
    ) -> Result<Self> {
        if !registry.contains(&settings.coordinator) {
            return Err(AppError::Configuration(format!(
                "Coordinator worker '{}' is not registered",
                settings.coordinator
            )));
        }

        for worker_id in registry.worker_ids() {
            breakers.get_or_create(&worker_breaker_name(&worker_id));
        }

        tracing::info!(
            workers = registry.len(),
            coordinator = %settings.coordinator,
            max_iterations = settings.max_iterations,
            "Workflow engine ready"
        );

        Ok(Self {
            settings,
            registry,
            classifier,
            breakers,
            sessions,
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn breakers(&self) -> &Arc<BreakerSet> {
        &self.breakers
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Handle one task for `session_id`.
    ///
    /// Never fails: every error is folded into a failed [`TaskResponse`]. An
    /// empty `session_id` starts a new session with a generated id.
    pub async fn process_task(&self, session_id: &str, raw_input: &str) -> TaskResponse {
        let session_id = if session_id.trim().is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            session_id.to_string()
        };

        let task = raw_input.trim();
        if task.is_empty() {
            let err = AppError::InvalidInput("task must not be empty".to_string());
            return TaskResponse::failed(&session_id, None, &err);
        }

        match self.run_task(&session_id, task).await {
            Ok(response) => response,
            Err(e) => {
                match e.kind() {
                    ErrorKind::InternalError => {
                        tracing::error!(session_id = %session_id, error = %e, "Task failed")
                    }
                    _ => tracing::info!(session_id = %session_id, error = %e, "Task rejected"),
                }
                TaskResponse::failed(&session_id, None, &e)
            }
        }
    }

    async fn run_task(&self, session_id: &str, task: &str) -> Result<TaskResponse> {
        let mut state = self.sessions.lock(session_id).await?;

        state.add_message(MessageRole::User, task, None);
        state.record_event(WorkflowEventType::UserInput, None, json!({ "chars": task.len() }));
        state.touch();

        let max = self.settings.max_iterations;
        if state.iteration_count >= max {
            state.record_event(WorkflowEventType::IterationLimit, None, json!({ "max": max }));
            self.sessions.save(&state).await?;
            return Err(AppError::IterationLimitExceeded { max });
        }
        state.iteration_count += 1;

        let capabilities = self.registry.capabilities();
        let decision = self
            .classifier
            .classify(task, &state.global_context, &capabilities)
            .await;

        let (mut worker, delegation) = self.select_worker(session_id, &decision)?;
        state.record_event(
            WorkflowEventType::Delegation,
            Some(worker.id()),
            json!({
                "proposed": decision.target_worker,
                "confidence": decision.confidence,
                "accepted": delegation.is_some(),
            }),
        );

        let mut context = self.task_context(&state, worker.id(), delegation);
        if worker.id() != self.settings.coordinator && !worker.can_handle(task, &context) {
            tracing::info!(
                session_id,
                worker = worker.id(),
                "Worker declined task, falling back to coordinator"
            );
            worker = self.coordinator()?;
            context = self.task_context(&state, worker.id(), None);
        }

        let worker_id = worker.id().to_string();
        state.agent_state_mut(&worker_id);
        state.record_event(WorkflowEventType::WorkerStart, Some(&worker_id), json!({}));

        match self.dispatch(&worker, task, &context).await {
            Ok(output) => self.complete(state, &worker_id, output).await,
            Err(e) => self.fail(state, &worker_id, e).await,
        }
    }

    /// Accept the classifier's proposal only when it is confident, registered
    /// and not short-circuited; otherwise keep the task with the coordinator.
    fn select_worker(
        &self,
        session_id: &str,
        decision: &DelegationDecision,
    ) -> Result<(Arc<dyn Worker>, Option<DelegationRecord>)> {
        let coordinator = &self.settings.coordinator;

        let target = decision
            .target_worker
            .as_deref()
            .filter(|_| decision.needs_delegation)
            .filter(|t| *t != coordinator.as_str());

        if let Some(target) = target {
            let rejection = if decision.confidence < self.settings.confidence_floor {
                Some("confidence below floor")
            } else if self.breakers.state_of(&worker_breaker_name(target)) == BreakerState::Open {
                Some("worker circuit open")
            } else {
                None
            };

            match (rejection, self.registry.get(target)) {
                (None, Some(worker)) => {
                    let record = DelegationRecord {
                        from_worker: coordinator.clone(),
                        to_worker: target.to_string(),
                        confidence: decision.confidence,
                        reasoning: decision.reasoning.clone(),
                        decided_at: Utc::now(),
                    };
                    tracing::info!(
                        session_id,
                        from_worker = %record.from_worker,
                        to_worker = %record.to_worker,
                        confidence = record.confidence,
                        reasoning = %record.reasoning,
                        "Delegated task"
                    );
                    return Ok((worker, Some(record)));
                }
                (reason, _) => {
                    tracing::info!(
                        session_id,
                        proposed = target,
                        confidence = decision.confidence,
                        reason = reason.unwrap_or("worker not registered"),
                        "Delegation rejected, using coordinator"
                    );
                }
            }
        }

        Ok((self.coordinator()?, None))
    }

    fn coordinator(&self) -> Result<Arc<dyn Worker>> {
        self.registry.get(&self.settings.coordinator).ok_or_else(|| {
            AppError::Configuration(format!(
                "Coordinator worker '{}' is not registered",
                self.settings.coordinator
            ))
        })
    }

    fn task_context(
        &self,
        state: &WorkflowState,
        worker_id: &str,
        delegation: Option<DelegationRecord>,
    ) -> TaskContext {
        TaskContext {
            session_id: state.session_id.clone(),
            history: state.recent_messages(self.settings.history_window).to_vec(),
            global_context: state.global_context.clone(),
            local_context: state
                .agent_states
                .get(worker_id)
                .map(|a| a.local_context.clone())
                .unwrap_or_default(),
            delegation,
        }
    }

    /// Run the worker under its breaker, the worker timeout and the retry
    /// policy. Panics come back as internal errors.
    async fn dispatch(
        &self,
        worker: &Arc<dyn Worker>,
        task: &str,
        context: &TaskContext,
    ) -> Result<WorkerOutput> {
        let breaker = self.breakers.get_or_create(&worker_breaker_name(worker.id()));
        let timeout = self.settings.worker_timeout;

        with_retry(&self.settings.retry, &breaker, |attempt| {
            let worker = Arc::clone(worker);
            let breaker = Arc::clone(&breaker);
            async move {
                if attempt > 0 {
                    tracing::debug!(
                        session_id = %context.session_id,
                        worker = worker.id(),
                        attempt,
                        "Retrying worker"
                    );
                }
                breaker
                    .call_with_timeout(timeout, async {
                        AssertUnwindSafe(worker.process(task, context))
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|payload| Err(panic_to_error(payload)))
                    })
                    .await
            }
        })
        .await
    }

    async fn complete(
        &self,
        mut state: SessionGuard,
        worker_id: &str,
        output: WorkerOutput,
    ) -> Result<TaskResponse> {
        let WorkerOutput {
            response_text,
            metadata,
            context_updates,
            local_updates,
            last_action,
        } = output;

        state.add_message(MessageRole::Assistant, response_text.clone(), Some(worker_id));
        state.merge_global_context(context_updates);

        let agent = state.agent_state_mut(worker_id);
        agent.local_context.extend(local_updates);
        if last_action.is_some() {
            agent.last_action = last_action.clone();
        }

        state.current_worker = Some(worker_id.to_string());
        state.record_event(
            WorkflowEventType::WorkerComplete,
            Some(worker_id),
            json!({ "action": last_action }),
        );
        state.touch();

        // The worker's side effects already happened; report them.
        if let Err(save_err) = self.sessions.save(&state).await {
            tracing::error!(session_id = %state.session_id, error = %save_err, "Failed to persist session");
        }

        tracing::info!(
            session_id = %state.session_id,
            worker = worker_id,
            iteration = state.iteration_count,
            "Task completed"
        );
        Ok(TaskResponse::succeeded(&state.session_id, worker_id, response_text, metadata))
    }

    async fn fail(&self, mut state: SessionGuard, worker_id: &str, err: AppError) -> Result<TaskResponse> {
        state.agent_state_mut(worker_id).error_count += 1;
        state.current_worker = Some(worker_id.to_string());
        state.record_event(
            WorkflowEventType::WorkerError,
            Some(worker_id),
            json!({ "error": err.kind().as_str() }),
        );
        state.touch();

        if let Err(save_err) = self.sessions.save(&state).await {
            tracing::error!(session_id = %state.session_id, error = %save_err, "Failed to persist session");
        }

        tracing::warn!(
            session_id = %state.session_id,
            worker = worker_id,
            error = %err,
            "Worker failed"
        );
        Ok(TaskResponse::failed(&state.session_id, Some(worker_id), &err))
    }

    /// Unhealthy when the inference backend or the coordinator is
    /// short-circuited; degraded when any other breaker is not closed.
    pub fn health_status(&self) -> HealthStatus {
        let breakers = self.breakers.states();
        let is_open = |name: &str| breakers.get(name) == Some(&BreakerState::Open);

        let overall = if is_open(resilience::INFERENCE)
            || is_open(&worker_breaker_name(&self.settings.coordinator))
        {
            OverallHealth::Unhealthy
        } else if breakers.values().any(|s| *s != BreakerState::Closed) {
            OverallHealth::Degraded
        } else {
            OverallHealth::Healthy
        };

        HealthStatus {
            overall,
            breakers,
            active_sessions: self.sessions.active_count(),
            checked_at: Utc::now(),
        }
    }

    pub fn list_capabilities(&self) -> BTreeMap<String, Vec<String>> {
        self.registry.capabilities()
    }

    pub async fn session_status(&self, session_id: &str) -> Result<SessionStatus> {
        let status = match self.sessions.peek(session_id).await? {
            Some(state) => SessionStatus {
                status: SessionLifecycle::Active,
                session_id: state.session_id,
                current_worker: state.current_worker,
                iteration_count: state.iteration_count,
                worker_count: state.agent_states.len(),
                last_activity_at: Some(state.last_activity_at),
            },
            None => SessionStatus {
                status: SessionLifecycle::NotFound,
                session_id: session_id.to_string(),
                current_worker: None,
                iteration_count: 0,
                worker_count: 0,
                last_activity_at: None,
            },
        };
        Ok(status)
    }

    /// Drop a session everywhere. Returns whether it existed.
    pub async fn clear_session(&self, session_id: &str) -> Result<bool> {
        self.sessions.clear(session_id).await
    }

    /// Evict cached sessions idle past the configured TTL.
    pub fn evict_idle_sessions(&self) -> usize {
        let evicted = self.sessions.evict_idle(self.settings.session_ttl);
        if evicted > 0 {
            tracing::info!(evicted, "Evicted idle sessions");
        }
        evicted
    }
}
