//! Bounded, rate-limited fan-out of model calls.
//!
//! Two independent limits apply to every batch: a worker cap (calls in
//! flight at once) and a per-minute quota (calls *started* per rolling
//! window, one gate for generations and a lower one for gradings). Results
//! come back position-aligned with the request list; a failed slot is an
//! `Err` in its position, never an aborted batch — the owning chunk simply
//! stays incomplete and is retried on a later pass.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::config::PipelineConfig;
use crate::model::{CompletionRequest, GradingRequest, ModelClient, ModelError};

/// Time source for the rate gate. Injectable so window behavior is testable
/// without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct WindowState {
    window_start: Instant,
    used: u32,
}

/// Fixed-window call limiter: `capacity` acquisitions per `window`, then
/// callers wait for the window to reset. Calls already admitted are never
/// canceled; the gate only delays new starts.
pub struct RateGate {
    capacity: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<WindowState>,
}

impl RateGate {
    pub fn per_minute(capacity: u32) -> Self {
        Self::with_clock(capacity, Duration::from_secs(60), Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let window_start = clock.now();
        Self {
            capacity: capacity.max(1),
            window,
            clock,
            state: Mutex::new(WindowState {
                window_start,
                used: 0,
            }),
        }
    }

    /// Take one token, or report how long until the window resets.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = self.clock.now();
        let mut state = self.state.lock().expect("rate gate lock");

        if now.duration_since(state.window_start) >= self.window {
            state.window_start = now;
            state.used = 0;
        }

        if state.used < self.capacity {
            state.used += 1;
            Ok(())
        } else {
            Err(self.window - now.duration_since(state.window_start))
        }
    }

    /// Take one token, sleeping through window resets as needed.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }
}

/// Fan-out engine over one model client.
pub struct Dispatcher {
    client: Arc<dyn ModelClient>,
    workers: Arc<Semaphore>,
    completion_gate: Arc<RateGate>,
    grading_gate: Arc<RateGate>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn ModelClient>, config: &PipelineConfig) -> Self {
        Self {
            client,
            workers: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
            completion_gate: Arc::new(RateGate::per_minute(config.completions_per_minute)),
            grading_gate: Arc::new(RateGate::per_minute(config.gradings_per_minute)),
        }
    }

    /// Swap in custom gates (testing, or callers with shared quotas).
    pub fn with_gates(mut self, completion: Arc<RateGate>, grading: Arc<RateGate>) -> Self {
        self.completion_gate = completion;
        self.grading_gate = grading;
        self
    }

    /// One generation call per request; `results[i]` answers `requests[i]`.
    pub async fn dispatch_completions(
        &self,
        requests: Vec<CompletionRequest>,
    ) -> Vec<Result<String, ModelError>> {
        self.fan_out(requests, Arc::clone(&self.completion_gate), |client, request| {
            client.complete(request)
        })
        .await
    }

    /// One grading call per request, under the grading quota.
    pub async fn dispatch_gradings(
        &self,
        requests: Vec<GradingRequest>,
    ) -> Vec<Result<f64, ModelError>> {
        self.fan_out(requests, Arc::clone(&self.grading_gate), |client, request| {
            client.grade(request)
        })
        .await
    }

    async fn fan_out<Req, Out, F>(
        &self,
        requests: Vec<Req>,
        gate: Arc<RateGate>,
        call: F,
    ) -> Vec<Result<Out, ModelError>>
    where
        Req: Send + 'static,
        Out: Send + 'static,
        F: Fn(&dyn ModelClient, &Req) -> Result<Out, ModelError> + Send + Sync + Clone + 'static,
    {
        let futures = requests.into_iter().map(|request| {
            let client = Arc::clone(&self.client);
            let workers = Arc::clone(&self.workers);
            let gate = Arc::clone(&gate);
            let call = call.clone();

            async move {
                let _permit = workers.acquire().await.expect("semaphore is never closed");
                gate.acquire().await;
                // The client is blocking HTTP; keep it off the async workers.
                tokio::task::spawn_blocking(move || call(client.as_ref(), &request))
                    .await
                    .unwrap_or_else(|e| Err(ModelError::Worker(e.to_string())))
            }
        });

        join_all(futures).await
    }
}
