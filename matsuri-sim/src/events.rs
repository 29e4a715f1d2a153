//! Simulation events: what happened during a step, for observers and tests.
//!
//! The run-loop pushes events as it goes; callers take them with
//! `Simulation::drain_events`.

use matsuri_core::coordinator::TurnTicket;
use matsuri_core::types::{AgentId, SessionId};
use matsuri_net::HealthStatus;

/// Something observable that happened inside one step.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// The dialog service health flag flipped.
    HealthChanged(HealthStatus),
    /// The remote agent configuration was applied.
    ConfigApplied {
        /// Registered characters that matched a remote record.
        matched: usize,
        /// Whether conversation rules were present.
        rules: bool,
    },
    /// The remote agent configuration could not be loaded.
    ConfigFailed {
        /// Failure description.
        reason: String,
    },
    /// Two characters were paired and a session opened.
    SessionOpened {
        /// New session.
        session: SessionId,
        /// Both participants, scanner first.
        participants: [AgentId; 2],
    },
    /// A line was applied to a live session.
    LineApplied {
        /// Session the line belongs to.
        session: SessionId,
        /// Who spoke.
        speaker: AgentId,
    },
    /// A turn request failed and its turn was skipped.
    TurnSkipped {
        /// Ticket of the failed turn.
        ticket: TurnTicket,
    },
    /// A completion arrived for a closed session or from a stranger.
    ResponseDiscarded {
        /// Ticket of the discarded completion.
        ticket: TurnTicket,
    },
    /// Sessions closed during the step (completed or reset).
    SessionsClosed {
        /// How many.
        count: usize,
    },
}

impl SimEvent {
    /// Session this event refers to, if any.
    #[must_use]
    pub fn session(&self) -> Option<&SessionId> {
        match self {
            Self::SessionOpened { session, .. } | Self::LineApplied { session, .. } => Some(session),
            _ => None,
        }
    }

    /// Whether this is a health transition.
    #[must_use]
    pub fn is_health_change(&self) -> bool {
        matches!(self, Self::HealthChanged(_))
    }
}
