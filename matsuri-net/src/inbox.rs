//! Response inbox: completions produced on async tasks, consumed by the
//! single-threaded run-loop.
//!
//! Background tasks push exactly one [`Completion`] per submitted request.
//! The run-loop drains the inbox once per step; nothing a completion carries
//! is acted on until then.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::NetError;
use crate::types::{AgentConfigPayload, DialogResponse, HealthStatus};

/// Caller-chosen id that ties a turn request to its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(pub u64);

/// The outcome of one submitted request.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// A turn request finished.
    Turn {
        /// Id given at submission.
        id: RequestId,
        /// Reply or failure.
        result: Result<DialogResponse, NetError>,
    },
    /// A health check finished.
    Health(HealthStatus),
    /// The agent configuration load finished.
    AgentConfig(Result<AgentConfigPayload, NetError>),
    /// A session reset finished.
    Reset {
        /// Session that was reset.
        session_id: String,
        /// Acknowledgement or failure.
        result: Result<(), NetError>,
    },
}

/// Thread-safe FIFO of completions. Cloning shares the same queue.
#[derive(Debug, Clone, Default)]
pub struct ResponseInbox {
    inner: Arc<Mutex<InboxInner>>,
}

#[derive(Debug, Default)]
struct InboxInner {
    items: VecDeque<Completion>,
    total_pushed: u64,
    total_drained: u64,
}

/// Statistics about the inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxStats {
    /// Completions waiting to be drained.
    pub depth: usize,
    /// Completions pushed since creation.
    pub total_pushed: u64,
    /// Completions drained since creation.
    pub total_drained: u64,
}

impl ResponseInbox {
    /// An empty inbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a completion.
    pub fn push(&self, completion: Completion) {
        let mut inner = self.inner.lock();
        inner.items.push_back(completion);
        inner.total_pushed += 1;
    }

    /// Take every waiting completion in delivery order.
    pub fn drain(&self) -> Vec<Completion> {
        let mut inner = self.inner.lock();
        let drained: Vec<Completion> = inner.items.drain(..).collect();
        inner.total_drained += drained.len() as u64;
        drained
    }

    /// Completions waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// Inbox statistics.
    #[must_use]
    pub fn stats(&self) -> InboxStats {
        let inner = self.inner.lock();
        InboxStats {
            depth: inner.items.len(),
            total_pushed: inner.total_pushed,
            total_drained: inner.total_drained,
        }
    }
}
