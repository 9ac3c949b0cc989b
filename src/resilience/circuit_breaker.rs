//! Per-dependency circuit breaker.
//!
//! One breaker guards one backend dependency (a worker, the inference backend,
//! the search backend, ...) and is shared by every session. State changes are
//! read-modify-write under a single mutex so concurrent callers always observe
//! a consistent breaker.

use crate::types::{AppError, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default number of failures inside the window that opens the breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default time an open breaker waits before allowing a probe.
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(30);

/// Default trailing window failures are counted in.
pub const DEFAULT_FAILURE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub failure_window: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            failure_window: DEFAULT_FAILURE_WINDOW,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failures: VecDeque<Instant>,
    last_failure_at: Option<Instant>,
    probe_in_flight: bool,
}

/// Outcome of a guarded call as seen by the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
    /// The call was refused for reasons unrelated to backend health.
    Neutral,
}

fn classify(err: &AppError) -> Outcome {
    match err {
        AppError::InvalidInput(_) | AppError::CircuitOpen(_) => Outcome::Neutral,
        _ => Outcome::Failure,
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failures: VecDeque::new(),
                last_failure_at: None,
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state. An OPEN breaker whose reset timeout has elapsed reports
    /// HALF_OPEN.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    pub fn is_open(&self) -> bool {
        self.state() == BreakerState::Open
    }

    /// Failures counted inside the trailing window.
    pub fn failure_count(&self) -> usize {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        self.prune(&mut inner, now);
        inner.failures.len()
    }

    fn refresh(&self, inner: &mut BreakerInner, now: Instant) {
        if inner.state != BreakerState::Open {
            return;
        }
        let ready = inner
            .last_failure_at
            .is_none_or(|at| now.duration_since(at) >= self.config.reset_timeout);
        if ready {
            inner.state = BreakerState::HalfOpen;
            inner.probe_in_flight = false;
            tracing::info!(backend = %self.name, "Circuit breaker half-open, allowing one probe");
        }
    }

    fn prune(&self, inner: &mut BreakerInner, now: Instant) {
        while let Some(oldest) = inner.failures.front() {
            if now.duration_since(*oldest) > self.config.failure_window {
                inner.failures.pop_front();
            } else {
                break;
            }
        }
    }

    /// Ask for permission to call the backend.
    ///
    /// Fails fast with `CircuitOpen` while OPEN, and while HALF_OPEN with a
    /// probe already outstanding.
    pub fn acquire(&self) -> Result<CallPermit<'_>> {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner, Instant::now());

        let state = inner.state;
        match state {
            BreakerState::Closed => Ok(CallPermit {
                breaker: self,
                probe: false,
                settled: false,
            }),
            BreakerState::HalfOpen if !inner.probe_in_flight => {
                inner.probe_in_flight = true;
                Ok(CallPermit {
                    breaker: self,
                    probe: true,
                    settled: false,
                })
            }
            BreakerState::HalfOpen | BreakerState::Open => {
                tracing::debug!(backend = %self.name, state = %state, "Call short-circuited");
                Err(AppError::CircuitOpen(self.name.clone()))
            }
        }
    }

    fn settle(&self, probe: bool, outcome: Outcome) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if probe {
            inner.probe_in_flight = false;
        }

        match (inner.state, outcome) {
            (_, Outcome::Neutral) => {}
            (BreakerState::Closed, Outcome::Success) => inner.failures.clear(),
            (BreakerState::Closed, Outcome::Failure) => {
                inner.failures.push_back(now);
                inner.last_failure_at = Some(now);
                self.prune(&mut inner, now);
                if inner.failures.len() >= self.config.failure_threshold as usize {
                    inner.state = BreakerState::Open;
                    tracing::warn!(
                        backend = %self.name,
                        failures = inner.failures.len(),
                        "Circuit breaker opened"
                    );
                }
            }
            (BreakerState::HalfOpen, Outcome::Success) if probe => {
                inner.state = BreakerState::Closed;
                inner.failures.clear();
                tracing::info!(backend = %self.name, "Circuit breaker closed after successful probe");
            }
            (BreakerState::HalfOpen, Outcome::Failure) if probe => {
                inner.state = BreakerState::Open;
                inner.last_failure_at = Some(now);
                inner.failures.push_back(now);
                tracing::warn!(backend = %self.name, "Probe failed, circuit breaker re-opened");
            }
            // A call admitted before the breaker opened finishing late.
            (_, Outcome::Failure) => {
                inner.failures.push_back(now);
                inner.last_failure_at = Some(now);
            }
            (_, Outcome::Success) => {}
        }
    }

    /// Run `fut` under this breaker.
    pub async fn call<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let permit = self.acquire()?;
        let result = fut.await;
        permit.finish(&result);
        result
    }

    /// Run `fut` under this breaker, giving up after `timeout`.
    ///
    /// The backend call is not aborted on the far side; the breaker simply
    /// stops waiting and records a failure.
    pub async fn call_with_timeout<T, F>(&self, timeout: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let permit = self.acquire()?;
        let result = match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(backend = %self.name, timeout_ms = timeout.as_millis() as u64, "Call timed out");
                Err(AppError::BackendTimeout(self.name.clone()))
            }
        };
        permit.finish(&result);
        result
    }
}

/// Permission to make one guarded call.
///
/// Dropping a permit without finishing it (the caller was cancelled) counts
/// as a failure.
#[must_use]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl CallPermit<'_> {
    pub fn finish<T>(mut self, result: &Result<T>) {
        let outcome = match result {
            Ok(_) => Outcome::Success,
            Err(err) => classify(err),
        };
        self.settled = true;
        self.breaker.settle(self.probe, outcome);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.settle(self.probe, Outcome::Failure);
        }
    }
}

/// All breakers owned by one engine, keyed by dependency name.
#[derive(Debug, Default)]
pub struct BreakerSet {
    config: BreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerSet {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(name) {
            return breaker.clone();
        }
        self.breakers
            .write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.read().get(name).cloned()
    }

    /// State of a dependency; unknown names are treated as CLOSED.
    pub fn state_of(&self, name: &str) -> BreakerState {
        self.get(name)
            .map(|b| b.state())
            .unwrap_or(BreakerState::Closed)
    }

    pub fn states(&self) -> BTreeMap<String, BreakerState> {
        self.breakers
            .read()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect()
    }
}
