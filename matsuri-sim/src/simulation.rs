//! The run-loop: one cooperative step over virtual time.
//!
//! ## Step order
//!
//! | Phase    | Work                                                    |
//! |----------|---------------------------------------------------------|
//! | Inbox    | apply drained completions (config, health, turns)       |
//! | Health   | expire a lost check, submit one when the interval is up |
//! | Motion   | advance every character's state machine                 |
//! | Claims   | proximity scan, open a session for each claimed pair    |
//! | Dialog   | dispatch due turns, close finished sessions             |
//! | Bubbles  | animate and re-project bubbles, push presentation flags |
//! | Flush    | ship queued turn and reset requests                     |
//!
//! Virtual time only moves inside [`Simulation::step`]; nothing in here
//! awaits, so a slow dialog service only ever delays replies.

use std::sync::Arc;
use std::time::{Duration, Instant};

use matsuri_core::agent::CharacterAgent;
use matsuri_core::bubble::{LookAtProjector, Projector};
use matsuri_core::config::MatsuriConfig;
use matsuri_core::coordinator::{ConversationCoordinator, Outbound, ResponseOutcome};
use matsuri_core::error::Result;
use matsuri_core::metrics::{MatsuriCounters, spans};
use matsuri_core::presentation::PresentationSink;
use matsuri_core::types::{AgentId, Position, SessionId, SimTime};
use matsuri_core::world::World;
use matsuri_net::{AgentConfigPayload, Completion, DialogTransport, HealthMonitor, HealthStatus};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, debug_span, info, warn};

use crate::bridge;
use crate::config::{PerformanceBudget, elapsed_us};
use crate::events::SimEvent;

/// Default wall-clock budget for one step, in milliseconds.
pub const DEFAULT_STEP_BUDGET_MS: f64 = 2.0;

/// A festival: the world, its conversations and the link to the dialog
/// service.
pub struct Simulation<T: DialogTransport, S: PresentationSink> {
    config: MatsuriConfig,
    world: World,
    coordinator: ConversationCoordinator,
    transport: T,
    sink: S,
    projector: Box<dyn Projector>,
    health: HealthMonitor,
    /// Set while a health check is outstanding; past it the check counts as lost.
    health_deadline: Option<SimTime>,
    next_health_at: Option<SimTime>,
    now: SimTime,
    counters: Arc<MatsuriCounters>,
    rng: StdRng,
    events: Vec<SimEvent>,
    budget: PerformanceBudget,
    step_budget_ms: f64,
    steps: u64,
    over_budget_steps: u64,
}

impl<T: DialogTransport, S: PresentationSink> Simulation<T, S> {
    /// Build a simulation. Call [`Simulation::start`] before stepping to
    /// load the remote agent configuration and begin health polling.
    ///
    /// # Errors
    /// `MatsuriError::Config` if the configuration fails validation.
    pub fn new(config: MatsuriConfig, transport: T, sink: S) -> Result<Self> {
        config.validate()?;
        let counters = Arc::new(MatsuriCounters::new());
        let center = config.waypoints.center;
        Ok(Self {
            world: World::new(&config),
            coordinator: ConversationCoordinator::new(&config, Arc::clone(&counters)),
            transport,
            sink,
            projector: Box::new(LookAtProjector::looking_at(
                center + Position::new(0.0, 12.0, -18.0),
                center,
                800.0,
                (960.0, 540.0),
            )),
            health: HealthMonitor::new(),
            health_deadline: None,
            next_health_at: None,
            now: SimTime::ZERO,
            counters,
            rng: StdRng::seed_from_u64(config.general.seed.wrapping_add(1)),
            events: Vec::new(),
            budget: PerformanceBudget::default(),
            step_budget_ms: DEFAULT_STEP_BUDGET_MS,
            steps: 0,
            over_budget_steps: 0,
            config,
        })
    }

    /// Replace the camera used for bubble anchors.
    #[must_use]
    pub fn with_projector(mut self, projector: Box<dyn Projector>) -> Self {
        self.projector = projector;
        self
    }

    /// Replace the wall-clock budget for one step.
    #[must_use]
    pub fn with_step_budget_ms(mut self, budget_ms: f64) -> Self {
        self.step_budget_ms = budget_ms;
        self
    }

    /// Request the agent configuration and schedule the first health check
    /// for the next step. Calling it again does nothing.
    pub fn start(&mut self) {
        if self.next_health_at.is_some() {
            return;
        }
        self.transport.submit_config_load();
        self.next_health_at = Some(self.now);
        info!(
            agents = self.world.len(),
            waypoints = self.world.waypoints().len(),
            "Festival started"
        );
    }

    /// Add a character.
    ///
    /// # Errors
    /// `DuplicateAgent` if the id is taken.
    pub fn spawn(&mut self, agent: CharacterAgent) -> Result<()> {
        self.world.spawn(agent)
    }

    /// Remove a character that is not conversing.
    ///
    /// # Errors
    /// `UnknownAgent` or `AgentBusy`.
    pub fn despawn(&mut self, id: &AgentId) -> Result<CharacterAgent> {
        self.world.despawn(id)
    }

    // -- Run-loop ------------------------------------------------------------

    /// Advance virtual time by `dt` and run every phase once.
    pub fn step(&mut self, dt: Duration) {
        self.now = self.now + dt;
        let dt_secs = dt.as_secs_f32();
        let span = debug_span!(spans::STEP, now_ms = self.now.as_millis());
        let _enter = span.enter();

        self.budget.reset();
        self.budget.active_agents = u32::try_from(self.world.len()).unwrap_or(u32::MAX);

        let started = Instant::now();
        {
            let _phase = debug_span!(spans::INBOX).entered();
            let completions = self.transport.drain();
            self.budget.completions = u32::try_from(completions.len()).unwrap_or(u32::MAX);
            for completion in completions {
                self.handle_completion(completion);
            }
        }
        self.budget.inbox_us = elapsed_us(started);

        let started = Instant::now();
        {
            let _phase = debug_span!(spans::HEALTH).entered();
            self.poll_health();
        }
        self.budget.health_us = elapsed_us(started);

        let started = Instant::now();
        {
            let _phase = debug_span!(spans::MOTION).entered();
            self.world.step_motion(self.now, dt_secs);
        }
        self.budget.motion_us = elapsed_us(started);

        let started = Instant::now();
        {
            let _phase = debug_span!(spans::CLAIMS).entered();
            for (a, b) in self.world.scan_for_claims(self.now) {
                MatsuriCounters::bump(&self.counters.claims);
                self.open_claimed(a, b);
            }
        }
        self.budget.claims_us = elapsed_us(started);

        let started = Instant::now();
        {
            let _phase = debug_span!(spans::DIALOG).entered();
            let before = self.coordinator.active_sessions();
            self.coordinator.tick(&mut self.world, self.now);
            let closed = before.saturating_sub(self.coordinator.active_sessions());
            if closed > 0 {
                self.events.push(SimEvent::SessionsClosed { count: closed });
            }
        }
        self.budget.dialog_us = elapsed_us(started);

        let started = Instant::now();
        {
            let _phase = debug_span!(spans::BUBBLES).entered();
            self.coordinator
                .tick_bubbles(&self.world, dt_secs, &*self.projector, &mut self.sink);
            for agent in self.world.agents() {
                let (walking, talking) = agent.locomotion();
                self.sink.set_locomotion(agent.id(), walking, talking);
                self.sink.set_speed(agent.id(), agent.velocity().length());
            }
        }
        self.budget.bubbles_us = elapsed_us(started);

        let started = Instant::now();
        {
            let _phase = debug_span!(spans::FLUSH).entered();
            self.flush();
        }
        self.budget.flush_us = elapsed_us(started);

        self.steps += 1;
        if !self.budget.within_budget(self.step_budget_ms) {
            self.over_budget_steps += 1;
            debug!(
                total_us = self.budget.total_us(),
                budget_ms = self.step_budget_ms,
                "Step over budget"
            );
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Turn { id, result } => {
                let ticket = bridge::ticket(id);
                let outcome = self.coordinator.apply_response(
                    &mut self.world,
                    ticket,
                    bridge::turn_result(result),
                    &mut self.sink,
                );
                let event = match outcome {
                    ResponseOutcome::Applied { session_id, speaker } => SimEvent::LineApplied {
                        session: session_id,
                        speaker,
                    },
                    ResponseOutcome::Failed => SimEvent::TurnSkipped { ticket },
                    ResponseOutcome::Stale | ResponseOutcome::UnknownSpeaker(_) => {
                        SimEvent::ResponseDiscarded { ticket }
                    }
                };
                self.events.push(event);
            }
            Completion::Health(status) => {
                self.health_deadline = None;
                self.observe_health(status);
            }
            Completion::AgentConfig(Ok(payload)) => {
                self.apply_agent_config(&payload);
            }
            Completion::AgentConfig(Err(err)) => {
                warn!(error = %err, "Agent config unavailable; keeping local defaults");
                self.events.push(SimEvent::ConfigFailed {
                    reason: err.to_string(),
                });
            }
            Completion::Reset { session_id, result } => {
                if let Err(err) = result {
                    debug!(session = %session_id, error = %err, "Session reset not acknowledged");
                }
            }
        }
    }

    fn poll_health(&mut self) {
        if let Some(deadline) = self.health_deadline {
            if self.now < deadline {
                return;
            }
            warn!(
                timeout_ms = self.config.server.request_timeout().as_millis(),
                "Health check never answered; counting the service as down"
            );
            self.health_deadline = None;
            self.observe_health(HealthStatus::Disconnected);
        }
        let Some(due) = self.next_health_at else {
            return;
        };
        if self.now < due {
            return;
        }
        self.transport.submit_health_check();
        self.health_deadline = Some(self.now + self.config.server.request_timeout());
        self.next_health_at = Some(self.now + self.config.server.health_interval());
    }

    fn observe_health(&mut self, status: HealthStatus) {
        if let Some(changed) = self.health.observe(status) {
            MatsuriCounters::bump(&self.counters.health_transitions);
            self.events.push(SimEvent::HealthChanged(changed));
        }
    }

    fn open_claimed(&mut self, a: AgentId, b: AgentId) -> Option<SessionId> {
        match self.coordinator.open_session(&self.world, &a, &b, self.now) {
            Ok(session) => {
                self.events.push(SimEvent::SessionOpened {
                    session: session.clone(),
                    participants: [a, b],
                });
                Some(session)
            }
            Err(err) => {
                warn!(a = %a, b = %b, error = %err, "Could not open a session; releasing pair");
                if let Err(err) = self.world.release(&a, &b, self.now) {
                    warn!(a = %a, b = %b, error = %err, "Release after failed open also failed");
                }
                None
            }
        }
    }

    fn flush(&mut self) {
        for outbound in self.coordinator.drain_outbound() {
            match outbound {
                Outbound::Turn { ticket, request } => {
                    self.transport
                        .submit_turn(bridge::request_id(ticket), bridge::turn_request(&request));
                }
                Outbound::Reset { session_id } => {
                    self.transport.submit_reset(session_id.0);
                }
            }
        }
    }

    // -- Remote configuration ------------------------------------------------

    /// Apply a remote agent configuration: patch matching characters,
    /// remember profiles for later spawns, and let published conversation
    /// rules override local pacing. Applying the same payload twice changes
    /// nothing. Returns how many registered characters matched.
    pub fn apply_agent_config(&mut self, payload: &AgentConfigPayload) -> usize {
        let matched = self
            .world
            .apply_profiles(payload.agents.iter().map(bridge::agent_profile));
        let rules = payload.conversation_rules.is_some();
        if let Some(published) = &payload.conversation_rules {
            self.config.apply_rules(&bridge::rule_overrides(published));
            self.world.set_motion_config(self.config.motion.clone());
            self.coordinator.set_dialog_config(self.config.dialog.clone());
        }
        info!(
            matched,
            agents = payload.agents.len(),
            locations = payload.locations.len(),
            rules,
            max_turns = self.config.dialog.max_turns,
            "Agent config applied"
        );
        self.events.push(SimEvent::ConfigApplied { matched, rules });
        matched
    }

    // -- Operator actions ----------------------------------------------------

    /// Close every live session now and ship the reset requests.
    pub fn reset_all_dialogs(&mut self) -> usize {
        let count = self.coordinator.reset_all(&mut self.world, self.now);
        if count > 0 {
            self.events.push(SimEvent::SessionsClosed { count });
        }
        self.flush();
        count
    }

    /// Pair two random characters that are not conversing, ignoring
    /// cooldown, and open a session for them. Turn 1 goes out on the next
    /// step.
    pub fn force_random_dialog(&mut self) -> Option<SessionId> {
        let free: Vec<AgentId> = self
            .world
            .agents()
            .filter(|agent| !agent.in_conversation())
            .map(|agent| agent.id().clone())
            .collect();
        let picked: Vec<AgentId> = free.choose_multiple(&mut self.rng, 2).cloned().collect();
        let [a, b] = <[AgentId; 2]>::try_from(picked).ok()?;

        if let Err(err) = self.world.force_claim(&a, &b) {
            warn!(a = %a, b = %b, error = %err, "Forced dialog refused");
            return None;
        }
        MatsuriCounters::bump(&self.counters.claims);
        info!(a = %a, b = %b, "Forced dialog");
        self.open_claimed(a, b)
    }

    /// Multi-line operator dump: service health, live sessions, visible
    /// bubbles, counters and the last step's budget.
    #[must_use]
    pub fn debug_summary(&self) -> String {
        let mut lines = vec![
            format!("Time: {:.1}s", self.now.as_secs_f32()),
            format!("Dialog service: {:?}", self.health.status()),
            format!("Active sessions: {}", self.coordinator.active_sessions()),
        ];
        lines.extend(
            self.coordinator
                .session_summaries()
                .iter()
                .map(|summary| format!("  {summary}")),
        );
        for bubble in self.coordinator.bubbles().filter(|b| b.is_shown()) {
            lines.push(format!(
                "  Bubble {}: {:?} ({:.2}) \"{}\"",
                bubble.owner(),
                bubble.phase(),
                bubble.progress(),
                bubble.text()
            ));
        }
        lines.push(self.counters.snapshot().summary());
        lines.push(format!(
            "Last step: {}us (budget {}ms, {} of {} steps over)",
            self.budget.total_us(),
            self.step_budget_ms,
            self.over_budget_steps,
            self.steps
        ));
        lines.join("\n")
    }

    // -- Accessors -----------------------------------------------------------

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Effective configuration, including applied remote rules.
    #[must_use]
    pub fn config(&self) -> &MatsuriConfig {
        &self.config
    }

    /// The world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The conversation coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &ConversationCoordinator {
        &self.coordinator
    }

    /// The transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The presentation sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable presentation sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Health tracking.
    #[must_use]
    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Shared counters.
    #[must_use]
    pub fn counters(&self) -> &Arc<MatsuriCounters> {
        &self.counters
    }

    /// Timings of the last step.
    #[must_use]
    pub fn budget(&self) -> &PerformanceBudget {
        &self.budget
    }

    /// Take every event recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }
}
