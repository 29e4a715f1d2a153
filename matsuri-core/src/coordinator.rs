//! Conversation coordinator: drives dialog sessions for claimed pairs.
//!
//! The coordinator never performs I/O. Each tick it queues [`Outbound`]
//! messages (turn requests tagged with a [`TurnTicket`], best-effort session
//! resets); the caller ships them and later hands completions back through
//! [`ConversationCoordinator::apply_response`]. A completion is matched to its
//! session and turn by ticket alone, so arrival order never matters and a
//! completion for a closed session is simply discarded.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::bubble::{Projector, SpeechBubble};
use crate::config::{BubbleConfig, DialogConfig, MatsuriConfig};
use crate::error::{MatsuriError, Result};
use crate::metrics::MatsuriCounters;
use crate::presentation::PresentationSink;
use crate::session::{DialogLine, DialogSession};
use crate::types::{AgentId, SessionId, SimTime};
use crate::world::World;

/// Correlates a turn request with its completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TurnTicket(pub u64);

/// A turn request ready to be sent to the dialog service.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundTurn {
    /// Session the turn belongs to.
    pub session_id: SessionId,
    /// Both participants, in claim order.
    pub agent_ids: [AgentId; 2],
    /// Turn number, starting at 1.
    pub turn: u32,
    /// Conversation so far, or the opening line.
    pub context: String,
    /// Where the conversation takes place.
    pub location: String,
}

/// Something the caller must send.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Request the next line of a session.
    Turn {
        /// Ticket to return with the completion.
        ticket: TurnTicket,
        /// The request.
        request: OutboundTurn,
    },
    /// Tell the service a session is over. Failures are ignored.
    Reset {
        /// Closed session.
        session_id: SessionId,
    },
}

/// A line returned by the dialog service.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReply {
    /// Speaking character.
    pub speaker: AgentId,
    /// Speaker display name.
    pub speaker_name: String,
    /// The line.
    pub text: String,
    /// Emotion cue; empty or absent means none.
    pub emotion: Option<String>,
    /// Turn number echoed by the service.
    pub turn: u32,
}

/// Why a turn produced no line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnFailure(pub String);

/// What happened to a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The line was recorded and shown.
    Applied {
        /// Session it belongs to.
        session_id: SessionId,
        /// Who spoke.
        speaker: AgentId,
    },
    /// The ticket is unknown (session closed or reset).
    Stale,
    /// The speaker is not a participant of the ticket's session.
    UnknownSpeaker(AgentId),
    /// The request failed; the turn is skipped.
    Failed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// All turns ran and the end delay elapsed.
    Completed,
    /// Forced by an operator reset.
    Reset,
}

/// One line of the operator debug dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session id.
    pub id: SessionId,
    /// Participants.
    pub participants: [AgentId; 2],
    /// Last dispatched turn.
    pub current_turn: u32,
    /// Total turns.
    pub max_turns: u32,
}

impl std::fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Session: {}, Turn: {}/{} ({} & {})",
            self.id, self.current_turn, self.max_turns, self.participants[0], self.participants[1]
        )
    }
}

/// Owns every live dialog session and every speech bubble.
pub struct ConversationCoordinator {
    dialog: DialogConfig,
    bubble_config: BubbleConfig,
    sessions: BTreeMap<SessionId, DialogSession>,
    tickets: HashMap<TurnTicket, (SessionId, u32)>,
    bubbles: BTreeMap<AgentId, SpeechBubble>,
    next_ticket: u64,
    next_sequence: u64,
    outbox: Vec<Outbound>,
    counters: Arc<MatsuriCounters>,
}

impl ConversationCoordinator {
    /// A coordinator with no sessions.
    #[must_use]
    pub fn new(config: &MatsuriConfig, counters: Arc<MatsuriCounters>) -> Self {
        Self {
            dialog: config.dialog.clone(),
            bubble_config: config.bubble.clone(),
            sessions: BTreeMap::new(),
            tickets: HashMap::new(),
            bubbles: BTreeMap::new(),
            next_ticket: 0,
            next_sequence: 0,
            outbox: Vec::new(),
            counters,
        }
    }

    /// Replace dialog pacing. Running sessions keep their turn count.
    pub fn set_dialog_config(&mut self, dialog: DialogConfig) {
        self.dialog = dialog;
    }

    /// Dialog pacing in effect.
    #[must_use]
    pub fn dialog_config(&self) -> &DialogConfig {
        &self.dialog
    }

    /// Open a session for a pair the world has already claimed.
    ///
    /// Both bubbles are shown and turn 1 is due immediately.
    ///
    /// # Errors
    /// `ProtocolViolation` if the pair is not partnered in `world` or either
    /// character already has a session.
    pub fn open_session(&mut self, world: &World, a: &AgentId, b: &AgentId, now: SimTime) -> Result<SessionId> {
        let partnered = world.agent(a).and_then(|x| x.partner()) == Some(b)
            && world.agent(b).and_then(|x| x.partner()) == Some(a);
        if !partnered {
            return Err(MatsuriError::ProtocolViolation(format!(
                "cannot open a session for unclaimed pair {a} / {b}"
            )));
        }
        if self.session_for(a).is_some() || self.session_for(b).is_some() {
            return Err(MatsuriError::ProtocolViolation(format!(
                "{a} or {b} already has a session"
            )));
        }

        let id = SessionId::derive(a, b, now, self.next_sequence);
        self.next_sequence += 1;
        let session = DialogSession::new(id.clone(), [a.clone(), b.clone()], now, self.dialog.max_turns);
        self.sessions.insert(id.clone(), session);

        for agent in [a, b] {
            self.bubble_mut(agent).show();
        }

        MatsuriCounters::bump(&self.counters.sessions_opened);
        info!(session = %id, a = %a, b = %b, max_turns = self.dialog.max_turns, "Dialog session opened");
        Ok(id)
    }

    /// Dispatch due turns and close sessions whose end delay has elapsed.
    pub fn tick(&mut self, world: &mut World, now: SimTime) {
        let turn_duration = self.dialog.turn_duration();
        let end_delay = self.dialog.end_delay();

        let ids: Vec<SessionId> = self.sessions.keys().cloned().collect();
        for id in &ids {
            loop {
                let Some(session) = self.sessions.get_mut(id) else {
                    break;
                };
                let Some(turn) = session.advance(now, turn_duration, end_delay) else {
                    break;
                };
                let request = self.build_turn(world, id, turn);
                if let Some(request) = request {
                    self.emit_turn(request);
                }
            }
        }

        let due: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.is_due_to_close(now))
            .map(|s| s.id().clone())
            .collect();
        for id in due {
            self.close_session(world, &id, now, CloseReason::Completed);
        }
    }

    fn build_turn(&self, world: &World, id: &SessionId, turn: u32) -> Option<OutboundTurn> {
        let session = self.sessions.get(id)?;
        let [first, second] = session.participants().clone();
        let location = world.agent(&first).map_or_else(
            || self.dialog.fallback_location.clone(),
            |agent| {
                world
                    .waypoints()
                    .location_label_near(agent.position(), &self.dialog.fallback_location)
            },
        );
        Some(OutboundTurn {
            session_id: id.clone(),
            agent_ids: [first, second],
            turn,
            context: session.history().context(&self.dialog.opening_line),
            location,
        })
    }

    fn emit_turn(&mut self, request: OutboundTurn) {
        let ticket = TurnTicket(self.next_ticket);
        self.next_ticket += 1;
        self.tickets
            .insert(ticket, (request.session_id.clone(), request.turn));
        MatsuriCounters::bump(&self.counters.turns_requested);
        debug!(
            session = %request.session_id,
            turn = request.turn,
            ticket = ticket.0,
            location = %request.location,
            "Turn requested"
        );
        self.outbox.push(Outbound::Turn { ticket, request });
    }

    /// Apply a completion.
    ///
    /// On success the line is recorded at the ticket's turn, the speaker's
    /// emotion is updated, its bubble shows the text and the other
    /// participant's bubble hides. Failures skip the turn.
    pub fn apply_response(
        &mut self,
        world: &mut World,
        ticket: TurnTicket,
        result: std::result::Result<TurnReply, TurnFailure>,
        sink: &mut dyn PresentationSink,
    ) -> ResponseOutcome {
        let Some((session_id, turn)) = self.tickets.remove(&ticket) else {
            MatsuriCounters::bump(&self.counters.stale_discarded);
            debug!(ticket = ticket.0, "Discarding completion for a closed session");
            return ResponseOutcome::Stale;
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(TurnFailure(reason)) => {
                MatsuriCounters::bump(&self.counters.turn_failures);
                debug!(session = %session_id, turn, %reason, "Turn failed; skipping");
                return ResponseOutcome::Failed;
            }
        };

        let Some(session) = self.sessions.get_mut(&session_id) else {
            MatsuriCounters::bump(&self.counters.stale_discarded);
            return ResponseOutcome::Stale;
        };
        let Some(listener) = session.other(&reply.speaker).cloned() else {
            MatsuriCounters::bump(&self.counters.stale_discarded);
            warn!(session = %session_id, speaker = %reply.speaker, "Reply from a non-participant; discarded");
            return ResponseOutcome::UnknownSpeaker(reply.speaker);
        };
        if reply.turn != turn {
            debug!(session = %session_id, expected = turn, echoed = reply.turn, "Service echoed a different turn");
        }

        let emotion = reply.emotion.filter(|e| !e.is_empty());
        session.record(DialogLine {
            turn,
            speaker: reply.speaker.clone(),
            speaker_name: reply.speaker_name,
            text: reply.text.clone(),
            emotion: emotion.clone(),
        });

        if let Some(emotion) = &emotion {
            if let Some(agent) = world.agent_mut(&reply.speaker) {
                agent.set_emotion(emotion.clone());
            }
            sink.trigger_emotion(&reply.speaker, emotion);
        }

        let bubble = self.bubble_mut(&reply.speaker);
        bubble.set_text(reply.text);
        bubble.show();
        sink.set_bubble_text(&reply.speaker, bubble.text(), bubble.size());
        self.bubble_mut(&listener).hide();

        MatsuriCounters::bump(&self.counters.lines_applied);
        debug!(session = %session_id, turn, speaker = %reply.speaker, "Line applied");
        ResponseOutcome::Applied {
            session_id,
            speaker: reply.speaker,
        }
    }

    /// Tear a session down: hide both bubbles, release both characters,
    /// queue a best-effort reset and forget the session's tickets.
    ///
    /// Returns `false` if no such session exists.
    pub fn close_session(&mut self, world: &mut World, id: &SessionId, now: SimTime, reason: CloseReason) -> bool {
        let Some(session) = self.sessions.remove(id) else {
            return false;
        };
        let [a, b] = session.participants();

        for agent in [a, b] {
            if let Some(bubble) = self.bubbles.get_mut(agent) {
                bubble.hide();
            }
        }

        let released = world.release(a, b, now);
        debug_assert!(released.is_ok(), "session {id} closed with a broken partner link");
        if let Err(err) = released {
            warn!(session = %id, error = %err, "Release failed while closing session");
        }

        self.tickets.retain(|_, (session_id, _)| session_id != id);
        self.outbox.push(Outbound::Reset { session_id: id.clone() });

        match reason {
            CloseReason::Completed => MatsuriCounters::bump(&self.counters.sessions_closed),
            CloseReason::Reset => MatsuriCounters::bump(&self.counters.sessions_reset),
        }
        info!(
            session = %id,
            reason = ?reason,
            turns = session.current_turn(),
            lines = session.history().len(),
            "Dialog session closed"
        );
        true
    }

    /// Close every live session at once. Returns how many were closed.
    pub fn reset_all(&mut self, world: &mut World, now: SimTime) -> usize {
        let ids: Vec<SessionId> = self.sessions.keys().cloned().collect();
        for id in &ids {
            self.close_session(world, id, now, CloseReason::Reset);
        }
        info!(count = ids.len(), "All dialogs reset");
        ids.len()
    }

    /// Animate every bubble, re-project its anchor and push the result.
    ///
    /// Bubbles of despawned characters are dropped once fully hidden.
    pub fn tick_bubbles(
        &mut self,
        world: &World,
        dt_secs: f32,
        projector: &dyn Projector,
        sink: &mut dyn PresentationSink,
    ) {
        self.bubbles.retain(|owner, bubble| {
            world.agent(owner).is_some() || bubble.is_shown() || bubble.progress() > 0.0
        });

        for (owner, bubble) in &mut self.bubbles {
            bubble.animate(dt_secs);
            if let Some(agent) = world.agent(owner) {
                let anchor = bubble.follow(agent.position(), projector);
                sink.set_bubble_anchor(owner, anchor, bubble.height_offset());
            }
            sink.set_bubble_visibility(owner, bubble.visual());
        }
    }

    fn bubble_mut(&mut self, agent: &AgentId) -> &mut SpeechBubble {
        let config = &self.bubble_config;
        self.bubbles
            .entry(agent.clone())
            .or_insert_with(|| SpeechBubble::new(agent.clone(), config))
    }

    /// Take every queued outbound message.
    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    /// Live session by id.
    #[must_use]
    pub fn session(&self, id: &SessionId) -> Option<&DialogSession> {
        self.sessions.get(id)
    }

    /// Live session involving `agent`.
    #[must_use]
    pub fn session_for(&self, agent: &AgentId) -> Option<&DialogSession> {
        self.sessions.values().find(|s| s.involves(agent))
    }

    /// Number of live sessions.
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Tickets awaiting a completion.
    #[must_use]
    pub fn pending_tickets(&self) -> usize {
        self.tickets.len()
    }

    /// A character's bubble, if one was ever shown.
    #[must_use]
    pub fn bubble(&self, agent: &AgentId) -> Option<&SpeechBubble> {
        self.bubbles.get(agent)
    }

    /// Every bubble, ordered by owner.
    pub fn bubbles(&self) -> impl Iterator<Item = &SpeechBubble> {
        self.bubbles.values()
    }

    /// Debug dump of live sessions.
    #[must_use]
    pub fn session_summaries(&self) -> Vec<SessionSummary> {
        self.sessions
            .values()
            .map(|s| SessionSummary {
                id: s.id().clone(),
                participants: s.participants().clone(),
                current_turn: s.current_turn(),
                max_turns: s.max_turns(),
            })
            .collect()
    }
}
