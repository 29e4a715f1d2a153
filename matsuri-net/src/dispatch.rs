//! Asynchronous dispatch of dialog service calls.
//!
//! The run-loop never awaits. It submits work through a [`DialogTransport`]
//! and later drains completions. [`Dispatcher`] is the tokio-backed
//! transport: every submission becomes one spawned task that pushes exactly
//! one completion into the shared [`ResponseInbox`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::client::DialogService;
use crate::error::NetError;
use crate::inbox::{Completion, RequestId, ResponseInbox};
use crate::types::{HealthStatus, TurnRequest};

/// Fire-and-forget submission of service calls plus completion draining.
pub trait DialogTransport {
    /// Request a dialog turn. Completes with [`Completion::Turn`].
    fn submit_turn(&self, id: RequestId, request: TurnRequest);
    /// Reset a session. Completes with [`Completion::Reset`].
    fn submit_reset(&self, session_id: String);
    /// Check service health. Completes with [`Completion::Health`].
    fn submit_health_check(&self);
    /// Load the agent configuration. Completes with [`Completion::AgentConfig`].
    fn submit_config_load(&self);
    /// Take every completion delivered so far.
    fn drain(&self) -> Vec<Completion>;
}

/// Runs service calls on a tokio runtime.
pub struct Dispatcher<S: DialogService> {
    service: Arc<S>,
    handle: Handle,
    inbox: ResponseInbox,
    in_flight: Arc<AtomicUsize>,
}

impl<S: DialogService> Dispatcher<S> {
    /// Dispatch onto the runtime behind `handle`.
    #[must_use]
    pub fn new(service: S, handle: Handle) -> Self {
        Self {
            service: Arc::new(service),
            handle,
            inbox: ResponseInbox::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Dispatch onto the runtime the caller is running in.
    ///
    /// # Errors
    /// `NetError::NotRunning` outside a tokio runtime.
    pub fn current(service: S) -> Result<Self, NetError> {
        let handle = Handle::try_current().map_err(|e| NetError::NotRunning(e.to_string()))?;
        Ok(Self::new(service, handle))
    }

    /// The shared inbox.
    #[must_use]
    pub fn inbox(&self) -> &ResponseInbox {
        &self.inbox
    }

    /// Requests submitted but not yet completed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    fn spawn<F, Fut>(&self, fallback: Completion, call: F)
    where
        F: FnOnce(Arc<S>) -> Fut + Send + 'static,
        Fut: Future<Output = Completion> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        let guard = CompletionGuard::new(self.inbox.clone(), Arc::clone(&self.in_flight), fallback);
        self.handle.spawn(async move {
            let completion = call(service).await;
            guard.complete(completion);
        });
    }
}

/// Delivers exactly one completion per task: the real one, or `fallback`
/// if the task panics or is dropped before finishing.
struct CompletionGuard {
    inbox: ResponseInbox,
    in_flight: Arc<AtomicUsize>,
    fallback: Option<Completion>,
}

impl CompletionGuard {
    fn new(inbox: ResponseInbox, in_flight: Arc<AtomicUsize>, fallback: Completion) -> Self {
        in_flight.fetch_add(1, Ordering::Relaxed);
        Self {
            inbox,
            in_flight,
            fallback: Some(fallback),
        }
    }

    fn complete(mut self, completion: Completion) {
        self.fallback = None;
        self.inbox.push(completion);
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(fallback) = self.fallback.take() {
            warn!("Dialog service task ended without a result");
            self.inbox.push(fallback);
        }
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

impl<S: DialogService> DialogTransport for Dispatcher<S> {
    fn submit_turn(&self, id: RequestId, request: TurnRequest) {
        debug!(request = id.0, turn = request.turn, "Dispatching turn request");
        let fallback = Completion::Turn {
            id,
            result: Err(lost_task()),
        };
        self.spawn(fallback, move |service| async move {
            let result = service.request_turn(request).await;
            Completion::Turn { id, result }
        });
    }

    fn submit_reset(&self, session_id: String) {
        let fallback = Completion::Reset {
            session_id: session_id.clone(),
            result: Err(lost_task()),
        };
        self.spawn(fallback, move |service| async move {
            let result = service.reset_session(session_id.clone()).await;
            Completion::Reset { session_id, result }
        });
    }

    fn submit_health_check(&self) {
        self.spawn(Completion::Health(HealthStatus::Disconnected), |service| async move {
            Completion::Health(service.check_health().await)
        });
    }

    fn submit_config_load(&self) {
        self.spawn(Completion::AgentConfig(Err(lost_task())), |service| async move {
            Completion::AgentConfig(service.load_agent_config().await)
        });
    }

    fn drain(&self) -> Vec<Completion> {
        self.inbox.drain()
    }
}

fn lost_task() -> NetError {
    NetError::Unreachable("request task ended without a result".to_string())
}
