//! Runtime counters.
//!
//! Lock-free `AtomicU64` counters incremented on the hot path and read by
//! the operator debug dump. `Relaxed` ordering throughout: the values are
//! statistics, never synchronisation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Event counters for one simulation.
#[derive(Debug)]
pub struct MatsuriCounters {
    /// Pairs claimed by the proximity scan or an operator.
    pub claims: AtomicU64,
    /// Sessions opened.
    pub sessions_opened: AtomicU64,
    /// Sessions that ran to completion.
    pub sessions_closed: AtomicU64,
    /// Sessions torn down by a forced reset.
    pub sessions_reset: AtomicU64,
    /// Turn requests emitted.
    pub turns_requested: AtomicU64,
    /// Dialog lines applied to a live session.
    pub lines_applied: AtomicU64,
    /// Turn requests that failed and were skipped.
    pub turn_failures: AtomicU64,
    /// Completions discarded because their session or turn was gone.
    pub stale_discarded: AtomicU64,
    /// Health flag flips.
    pub health_transitions: AtomicU64,
}

impl MatsuriCounters {
    /// Zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            claims: AtomicU64::new(0),
            sessions_opened: AtomicU64::new(0),
            sessions_closed: AtomicU64::new(0),
            sessions_reset: AtomicU64::new(0),
            turns_requested: AtomicU64::new(0),
            lines_applied: AtomicU64::new(0),
            turn_failures: AtomicU64::new(0),
            stale_discarded: AtomicU64::new(0),
            health_transitions: AtomicU64::new(0),
        }
    }

    /// Increment one counter.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            claims: get(&self.claims),
            sessions_opened: get(&self.sessions_opened),
            sessions_closed: get(&self.sessions_closed),
            sessions_reset: get(&self.sessions_reset),
            turns_requested: get(&self.turns_requested),
            lines_applied: get(&self.lines_applied),
            turn_failures: get(&self.turn_failures),
            stale_discarded: get(&self.stale_discarded),
            health_transitions: get(&self.health_transitions),
        }
    }
}

impl Default for MatsuriCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    /// Pairs claimed.
    pub claims: u64,
    /// Sessions opened.
    pub sessions_opened: u64,
    /// Sessions completed.
    pub sessions_closed: u64,
    /// Sessions reset.
    pub sessions_reset: u64,
    /// Turn requests emitted.
    pub turns_requested: u64,
    /// Lines applied.
    pub lines_applied: u64,
    /// Failed turns.
    pub turn_failures: u64,
    /// Stale completions discarded.
    pub stale_discarded: u64,
    /// Health flag flips.
    pub health_transitions: u64,
}

impl CounterSnapshot {
    /// One-line summary for logs and the debug dump.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "claims={} sessions(open={} closed={} reset={}) turns(requested={} applied={} failed={} stale={}) \
             health_transitions={}",
            self.claims,
            self.sessions_opened,
            self.sessions_closed,
            self.sessions_reset,
            self.turns_requested,
            self.lines_applied,
            self.turn_failures,
            self.stale_discarded,
            self.health_transitions,
        )
    }
}

/// Span names used with `tracing::span!`.
pub mod spans {
    /// One simulation step.
    pub const STEP: &str = "matsuri::step";
    /// Applying drained network completions.
    pub const INBOX: &str = "matsuri::inbox";
    /// Health polling.
    pub const HEALTH: &str = "matsuri::health";
    /// Motion update of every character.
    pub const MOTION: &str = "matsuri::motion";
    /// Proximity scan and claims.
    pub const CLAIMS: &str = "matsuri::claims";
    /// Coordinator turn scheduling and closures.
    pub const DIALOG: &str = "matsuri::dialog";
    /// Bubble animation and follow.
    pub const BUBBLES: &str = "matsuri::bubbles";
    /// Shipping queued requests.
    pub const FLUSH: &str = "matsuri::flush";
}
