//! Characters and their motion state machine.
//!
//! A [`CharacterAgent`] wanders between waypoints on its own:
//!
//! ```text
//! Idle ──▶ Moving ──(reached)──▶ Waiting ──(dwell elapsed)──▶ Moving ...
//!                 ╲                 ╱
//!                  ▼               ▼
//!                   Conversing ──(session end)──▶ Waiting(resume delay)
//! ```
//!
//! Entering and leaving `Conversing` is owned by [`crate::world::World`],
//! which is the only place allowed to touch the partner link.

use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::config::MotionConfig;
use crate::steering::Steering;
use crate::types::{AgentId, Position, SimTime, WaypointId};
use crate::waypoint::{WaypointStore, pick_avoiding};

/// Where a character is in its motion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// No target yet (fresh spawn, or an empty waypoint store).
    Idle,
    /// Walking towards the current target waypoint.
    Moving,
    /// Standing still until the given time.
    Waiting {
        /// When the character picks its next waypoint.
        until: SimTime,
    },
    /// Halted and facing a conversation partner.
    Conversing,
}

/// Remotely configured personality and presentation data for a character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Name as published by the dialog service.
    pub name: Option<String>,
    /// Short personality description.
    pub personality: String,
    /// Speaking style description.
    pub speaking_style: String,
    /// Multiplier on the base walk speed.
    pub walk_speed_multiplier: f32,
    /// Display colour (hex string).
    pub color: Option<String>,
    /// Favourite topics.
    pub topics: Vec<String>,
    /// Greeting phrase pool.
    pub greeting_phrases: Vec<String>,
    /// Idle action / phrase pool.
    pub idle_phrases: Vec<String>,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            name: None,
            personality: String::new(),
            speaking_style: String::new(),
            walk_speed_multiplier: 1.0,
            color: None,
            topics: Vec::new(),
            greeting_phrases: Vec::new(),
            idle_phrases: Vec::new(),
        }
    }
}

/// Inputs shared by every agent during one motion step.
pub struct MotionStep<'a> {
    /// Current virtual time (end of the step).
    pub now: SimTime,
    /// Step length in seconds.
    pub dt_secs: f32,
    /// Waypoints to wander between.
    pub waypoints: &'a WaypointStore,
    /// Movement tuning.
    pub config: &'a MotionConfig,
    /// Movement collaborator.
    pub steering: &'a dyn Steering,
    /// World RNG.
    pub rng: &'a mut StdRng,
}

/// An autonomous festival visitor.
#[derive(Debug, Clone)]
pub struct CharacterAgent {
    id: AgentId,
    display_name: String,
    position: Position,
    velocity: Position,
    facing: Position,
    motion: MotionState,
    target: Option<WaypointId>,
    last_waypoint: Option<WaypointId>,
    route: Vec<WaypointId>,
    partner: Option<AgentId>,
    last_conversation_end: Option<SimTime>,
    emotion: Option<String>,
    profile: AgentProfile,
}

impl CharacterAgent {
    /// Create an idle character at `position`, facing +Z.
    #[must_use]
    pub fn new(id: impl Into<AgentId>, display_name: impl Into<String>, position: Position) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            position,
            velocity: Position::ZERO,
            facing: Position::new(0.0, 0.0, 1.0),
            motion: MotionState::Idle,
            target: None,
            last_waypoint: None,
            route: Vec::new(),
            partner: None,
            last_conversation_end: None,
            emotion: None,
            profile: AgentProfile::default(),
        }
    }

    /// Restrict wandering to an explicit set of waypoints.
    #[must_use]
    pub fn with_route(mut self, route: Vec<WaypointId>) -> Self {
        self.route = route;
        self
    }

    /// Stable id.
    #[must_use]
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Display name given at spawn.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Velocity applied during the last step.
    #[must_use]
    pub fn velocity(&self) -> Position {
        self.velocity
    }

    /// Horizontal unit facing direction.
    #[must_use]
    pub fn facing(&self) -> Position {
        self.facing
    }

    /// Current motion state.
    #[must_use]
    pub fn motion(&self) -> MotionState {
        self.motion
    }

    /// Waypoint currently walked towards.
    #[must_use]
    pub fn target(&self) -> Option<WaypointId> {
        self.target
    }

    /// The explicit route, empty when the character uses the whole store.
    #[must_use]
    pub fn route(&self) -> &[WaypointId] {
        &self.route
    }

    /// Conversation partner, if any.
    #[must_use]
    pub fn partner(&self) -> Option<&AgentId> {
        self.partner.as_ref()
    }

    /// Whether the character is in a conversation.
    #[must_use]
    pub fn in_conversation(&self) -> bool {
        self.partner.is_some()
    }

    /// When the last conversation ended.
    #[must_use]
    pub fn last_conversation_end(&self) -> Option<SimTime> {
        self.last_conversation_end
    }

    /// Whether a conversation ended less than `cooldown` ago.
    #[must_use]
    pub fn in_cooldown(&self, now: SimTime, cooldown: Duration) -> bool {
        self.last_conversation_end
            .is_some_and(|ended| now.since(ended) < cooldown)
    }

    /// Free to be claimed by the proximity scan.
    #[must_use]
    pub fn is_available(&self, now: SimTime, cooldown: Duration) -> bool {
        !self.in_conversation() && !self.in_cooldown(now, cooldown)
    }

    /// Last emotion received from the dialog service.
    #[must_use]
    pub fn emotion(&self) -> Option<&str> {
        self.emotion.as_deref()
    }

    /// Record an emotion cue.
    pub fn set_emotion(&mut self, emotion: impl Into<String>) {
        self.emotion = Some(emotion.into());
    }

    /// Remote profile currently applied.
    #[must_use]
    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Replace the profile. Applying the same profile twice is a no-op.
    pub fn apply_profile(&mut self, profile: &AgentProfile) {
        self.profile = profile.clone();
        let multiplier = self.profile.walk_speed_multiplier;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            self.profile.walk_speed_multiplier = 1.0;
        }
    }

    /// Walk speed after the remote multiplier.
    #[must_use]
    pub fn walk_speed(&self, base: f32) -> f32 {
        base * self.profile.walk_speed_multiplier
    }

    /// Animation flags: `(walking, talking)`.
    #[must_use]
    pub fn locomotion(&self) -> (bool, bool) {
        let walking = self.motion == MotionState::Moving && self.velocity.length() > f32::EPSILON;
        (walking, self.in_conversation())
    }

    /// Advance the motion state machine by one step.
    ///
    /// Conversing characters do not move.
    pub fn update(&mut self, step: &mut MotionStep<'_>) {
        match self.motion {
            MotionState::Conversing => {
                self.velocity = Position::ZERO;
            }
            MotionState::Idle => {
                self.velocity = Position::ZERO;
                self.select_next_waypoint(step);
            }
            MotionState::Waiting { until } => {
                self.velocity = Position::ZERO;
                if step.now >= until {
                    self.select_next_waypoint(step);
                }
            }
            MotionState::Moving => self.walk(step),
        }
    }

    fn walk(&mut self, step: &mut MotionStep<'_>) {
        let Some(target) = self.target.and_then(|id| step.waypoints.get(id)) else {
            // Target vanished (store rebuilt); pick again next step.
            self.target = None;
            self.motion = MotionState::Idle;
            self.velocity = Position::ZERO;
            return;
        };

        let out = step.steering.step(
            self.position,
            target.position,
            self.walk_speed(step.config.base_walk_speed),
            step.config.reach_distance,
            step.dt_secs,
        );
        self.position = out.position;
        self.velocity = out.velocity;
        if out.velocity.length() > f32::EPSILON {
            self.facing = out.velocity.flattened().normalized();
        }

        if out.arrived {
            let (min, max) = (step.config.idle_time_min, step.config.idle_time_max);
            let dwell = if min.is_finite() && max.is_finite() && min <= max {
                step.rng.gen_range(min..=max)
            } else {
                0.0
            };
            self.last_waypoint = self.target.take();
            self.velocity = Position::ZERO;
            self.motion = MotionState::Waiting {
                until: step.now + Duration::try_from_secs_f32(dwell.max(0.0)).unwrap_or(Duration::ZERO),
            };
        }
    }

    fn select_next_waypoint(&mut self, step: &mut MotionStep<'_>) {
        let next = if self.route.is_empty() {
            step.waypoints
                .random_waypoint(step.rng, self.last_waypoint)
                .map(|wp| wp.id)
        } else {
            pick_avoiding(&self.route, step.rng, self.last_waypoint)
        };

        match next {
            Some(id) => {
                self.target = Some(id);
                self.motion = MotionState::Moving;
            }
            None => {
                self.target = None;
                self.motion = MotionState::Idle;
            }
        }
    }

    // -- Conversation transitions, driven by the world arbiter --------------

    pub(crate) fn begin_conversation(&mut self, partner: AgentId, partner_position: Position) {
        self.partner = Some(partner);
        self.motion = MotionState::Conversing;
        self.velocity = Position::ZERO;
        self.target = None;
        self.face(partner_position);
    }

    pub(crate) fn end_conversation(&mut self, now: SimTime, resume_delay: Duration) {
        self.partner = None;
        self.last_conversation_end = Some(now);
        self.motion = MotionState::Waiting {
            until: now + resume_delay,
        };
    }

    fn face(&mut self, point: Position) {
        let heading = self.position.heading_to(point);
        if heading.length() > f32::EPSILON {
            self.facing = heading;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{WaypointConfig, WaypointDef};
    use crate::steering::DirectSteering;
    use rand::SeedableRng;

    fn two_point_store() -> WaypointStore {
        let def = |name: &str, x: f32| WaypointDef {
            name: name.to_string(),
            position: Position::new(x, 0.0, 0.0),
            area_name: None,
            topics: Vec::new(),
            radius: None,
        };
        WaypointStore::create_or_load(&WaypointConfig {
            explicit: vec![def("A", 0.0), def("B", 4.0)],
            ..WaypointConfig::default()
        })
    }

    fn run(agent: &mut CharacterAgent, store: &WaypointStore, rng: &mut StdRng, from_ms: u64, steps: u64) -> u64 {
        let config = MotionConfig::default();
        let mut t = from_ms;
        for _ in 0..steps {
            t += 100;
            let mut step = MotionStep {
                now: SimTime::from_millis(t),
                dt_secs: 0.1,
                waypoints: store,
                config: &config,
                steering: &DirectSteering,
                rng: &mut *rng,
            };
            agent.update(&mut step);
        }
        t
    }

    #[test]
    fn idle_agent_starts_moving() {
        let store = two_point_store();
        let mut rng = StdRng::seed_from_u64(3);
        let mut agent = CharacterAgent::new("miku", "Miku", Position::new(2.0, 0.0, 0.0));
        run(&mut agent, &store, &mut rng, 0, 1);
        assert_eq!(agent.motion(), MotionState::Moving);
        assert!(agent.target().is_some());
    }

    #[test]
    fn reaching_a_waypoint_starts_a_dwell_within_bounds() {
        let store = two_point_store();
        let mut rng = StdRng::seed_from_u64(3);
        let mut agent = CharacterAgent::new("miku", "Miku", Position::new(2.0, 0.0, 0.0));
        // 2 units at 2 u/s plus the selection step.
        let t = run(&mut agent, &store, &mut rng, 0, 12);
        match agent.motion() {
            MotionState::Waiting { until } => {
                let dwell = until.since(SimTime::from_millis(t)).as_secs_f32();
                assert!(dwell <= 5.0 + 1e-3, "dwell too long: {dwell}");
                // Arrival happened a few steps before `t`.
                assert!(dwell >= 1.6, "dwell too short: {dwell}");
            }
            other => panic!("expected waiting, got {other:?}"),
        }
    }

    #[test]
    fn empty_store_keeps_agent_idle() {
        let store = WaypointStore::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut agent = CharacterAgent::new("rin", "Rin", Position::ZERO);
        run(&mut agent, &store, &mut rng, 0, 5);
        assert_eq!(agent.motion(), MotionState::Idle);
        assert_eq!(agent.position(), Position::ZERO);
    }

    #[test]
    fn route_restricts_choices() {
        let store = two_point_store();
        let mut rng = StdRng::seed_from_u64(9);
        let mut agent = CharacterAgent::new("len", "Len", Position::ZERO).with_route(vec![WaypointId(1)]);
        run(&mut agent, &store, &mut rng, 0, 1);
        assert_eq!(agent.target(), Some(WaypointId(1)));
    }

    #[test]
    fn profile_multiplier_scales_speed_and_rejects_nonsense() {
        let mut agent = CharacterAgent::new("alpha", "Alpha", Position::ZERO);
        agent.apply_profile(&AgentProfile {
            walk_speed_multiplier: 1.5,
            ..AgentProfile::default()
        });
        assert!((agent.walk_speed(2.0) - 3.0).abs() < 1e-6);

        agent.apply_profile(&AgentProfile {
            walk_speed_multiplier: -4.0,
            ..AgentProfile::default()
        });
        assert!((agent.walk_speed(2.0) - 2.0).abs() < 1e-6);

        agent.apply_profile(&AgentProfile {
            walk_speed_multiplier: f32::INFINITY,
            ..AgentProfile::default()
        });
        assert!((agent.walk_speed(2.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn conversation_transitions_halt_and_resume() {
        let mut agent = CharacterAgent::new("miku", "Miku", Position::ZERO);
        agent.begin_conversation(AgentId::new("alpha"), Position::new(1.0, 0.0, 0.0));
        assert!(agent.in_conversation());
        assert_eq!(agent.motion(), MotionState::Conversing);
        assert!((agent.facing().x - 1.0).abs() < 1e-6);
        assert_eq!(agent.locomotion(), (false, true));

        let now = SimTime::from_millis(10_000);
        agent.end_conversation(now, Duration::from_secs(2));
        assert!(!agent.in_conversation());
        assert_eq!(agent.motion(), MotionState::Waiting { until: SimTime::from_millis(12_000) });
        assert!(agent.in_cooldown(SimTime::from_millis(39_999), Duration::from_secs(30)));
        assert!(!agent.in_cooldown(SimTime::from_millis(40_000), Duration::from_secs(30)));
    }
}
