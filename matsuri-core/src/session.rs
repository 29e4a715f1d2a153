//! Dialog sessions and their turn-ordered history.

use std::time::Duration;

use crate::types::{AgentId, SessionId, SimTime};

/// One line of dialog received from the service.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogLine {
    /// Logical turn this line answers.
    pub turn: u32,
    /// Who said it.
    pub speaker: AgentId,
    /// Speaker's display name, as sent by the service.
    pub speaker_name: String,
    /// The line itself.
    pub text: String,
    /// Emotion cue, if any.
    pub emotion: Option<String>,
}

/// Lines ordered by turn number, regardless of arrival order.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    lines: Vec<DialogLine>,
}

impl ConversationHistory {
    /// Insert a line at its turn slot. A second line for the same turn
    /// replaces the first.
    pub fn record(&mut self, line: DialogLine) {
        match self.lines.binary_search_by_key(&line.turn, |l| l.turn) {
            Ok(idx) => self.lines[idx] = line,
            Err(idx) => self.lines.insert(idx, line),
        }
    }

    /// Lines in turn order.
    pub fn iter(&self) -> impl Iterator<Item = &DialogLine> {
        self.lines.iter()
    }

    /// Number of recorded lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether nothing was recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Context for the next request: every line joined by a space, or
    /// `opening_line` when the history is empty.
    #[must_use]
    pub fn context(&self, opening_line: &str) -> String {
        if self.lines.is_empty() {
            return opening_line.to_string();
        }
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Where a session is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Dispatching turns; the next one is due at `next_turn_at`.
    Active {
        /// When the next turn is dispatched.
        next_turn_at: SimTime,
    },
    /// All turns dispatched; the session closes at `close_at`.
    Ending {
        /// When the session is torn down.
        close_at: SimTime,
    },
}

/// A two-party conversation driven on a fixed cadence.
#[derive(Debug, Clone)]
pub struct DialogSession {
    id: SessionId,
    participants: [AgentId; 2],
    created_at: SimTime,
    current_turn: u32,
    max_turns: u32,
    history: ConversationHistory,
    phase: SessionPhase,
}

impl DialogSession {
    /// A fresh session whose first turn is due immediately.
    #[must_use]
    pub fn new(id: SessionId, participants: [AgentId; 2], created_at: SimTime, max_turns: u32) -> Self {
        Self {
            id,
            participants,
            created_at,
            current_turn: 0,
            max_turns,
            history: ConversationHistory::default(),
            phase: SessionPhase::Active {
                next_turn_at: created_at,
            },
        }
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Both participants, in claim order.
    #[must_use]
    pub fn participants(&self) -> &[AgentId; 2] {
        &self.participants
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> SimTime {
        self.created_at
    }

    /// Last dispatched turn (0 before the first).
    #[must_use]
    pub fn current_turn(&self) -> u32 {
        self.current_turn
    }

    /// Turns this session dispatches in total.
    #[must_use]
    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// History so far.
    #[must_use]
    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether `agent` takes part.
    #[must_use]
    pub fn involves(&self, agent: &AgentId) -> bool {
        self.participants.contains(agent)
    }

    /// The participant that is not `agent`.
    #[must_use]
    pub fn other(&self, agent: &AgentId) -> Option<&AgentId> {
        match &self.participants {
            [a, b] if a == agent => Some(b),
            [a, b] if b == agent => Some(a),
            _ => None,
        }
    }

    /// Dispatch the next turn if it is due, returning its number.
    ///
    /// Turns are spaced by `turn_duration` on a fixed schedule. After the
    /// last turn the session waits one more `turn_duration` plus
    /// `end_delay` before it is due to close.
    pub fn advance(&mut self, now: SimTime, turn_duration: Duration, end_delay: Duration) -> Option<u32> {
        let SessionPhase::Active { next_turn_at } = self.phase else {
            return None;
        };
        if now < next_turn_at || self.current_turn >= self.max_turns {
            return None;
        }

        self.current_turn += 1;
        let following = next_turn_at + turn_duration;
        self.phase = if self.current_turn >= self.max_turns {
            SessionPhase::Ending {
                close_at: following + end_delay,
            }
        } else {
            SessionPhase::Active {
                next_turn_at: following,
            }
        };
        Some(self.current_turn)
    }

    /// Whether the session is due to close.
    #[must_use]
    pub fn is_due_to_close(&self, now: SimTime) -> bool {
        matches!(self.phase, SessionPhase::Ending { close_at } if now >= close_at)
    }

    /// Record a received line at its turn slot.
    pub fn record(&mut self, line: DialogLine) {
        self.history.record(line);
    }
}
