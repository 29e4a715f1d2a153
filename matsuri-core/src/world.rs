//! The world: character registry, waypoint store and claim arbiter.
//!
//! Every cross-character mutation (pairing two characters into a
//! conversation, releasing them again) happens inside a single `&mut World`
//! call, so the partner link is always symmetric when the call returns.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::agent::{AgentProfile, CharacterAgent, MotionState, MotionStep};
use crate::config::{MatsuriConfig, MotionConfig, WaypointConfig};
use crate::error::{MatsuriError, Result};
use crate::steering::{DirectSteering, Steering};
use crate::types::{AgentId, SimTime};
use crate::waypoint::WaypointStore;

/// Registry of characters plus the shared state they move through.
pub struct World {
    agents: BTreeMap<AgentId, CharacterAgent>,
    profiles: BTreeMap<AgentId, AgentProfile>,
    waypoints: WaypointStore,
    motion: MotionConfig,
    steering: Box<dyn Steering>,
    rng: StdRng,
}

impl World {
    /// Build an empty world from configuration.
    #[must_use]
    pub fn new(config: &MatsuriConfig) -> Self {
        Self {
            agents: BTreeMap::new(),
            profiles: BTreeMap::new(),
            waypoints: WaypointStore::create_or_load(&config.waypoints),
            motion: config.motion.clone(),
            steering: Box::new(DirectSteering),
            rng: StdRng::seed_from_u64(config.general.seed),
        }
    }

    /// Replace the movement collaborator.
    #[must_use]
    pub fn with_steering(mut self, steering: Box<dyn Steering>) -> Self {
        self.steering = steering;
        self
    }

    // -- Accessors -----------------------------------------------------------

    /// The waypoint store.
    #[must_use]
    pub fn waypoints(&self) -> &WaypointStore {
        &self.waypoints
    }

    /// Rebuild the waypoint store. Characters heading to a vanished
    /// waypoint pick a new one on their next step.
    pub fn recreate_waypoints(&mut self, config: &WaypointConfig) {
        self.waypoints.recreate(config);
    }

    /// Movement tuning currently in effect.
    #[must_use]
    pub fn motion_config(&self) -> &MotionConfig {
        &self.motion
    }

    /// Replace movement tuning (e.g. after remote rule overrides).
    pub fn set_motion_config(&mut self, motion: MotionConfig) {
        self.motion = motion;
    }

    /// Look a character up.
    #[must_use]
    pub fn agent(&self, id: &AgentId) -> Option<&CharacterAgent> {
        self.agents.get(id)
    }

    /// Mutable access for emotion and route updates.
    ///
    /// The partner link stays out of reach; only the arbiter changes it.
    pub fn agent_mut(&mut self, id: &AgentId) -> Option<&mut CharacterAgent> {
        self.agents.get_mut(id)
    }

    /// All characters, ordered by id.
    pub fn agents(&self) -> impl Iterator<Item = &CharacterAgent> {
        self.agents.values()
    }

    /// Number of characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no character is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Register a character. A profile loaded earlier for this id is applied.
    ///
    /// # Errors
    /// `DuplicateAgent` if the id is taken.
    pub fn spawn(&mut self, mut agent: CharacterAgent) -> Result<()> {
        let id = agent.id().clone();
        if self.agents.contains_key(&id) {
            return Err(MatsuriError::DuplicateAgent(id));
        }
        if let Some(profile) = self.profiles.get(&id) {
            agent.apply_profile(profile);
        }
        info!(agent = %id, position = %agent.position(), "Character spawned");
        self.agents.insert(id, agent);
        Ok(())
    }

    /// Remove a character.
    ///
    /// # Errors
    /// `UnknownAgent` if absent, `AgentBusy` while it is conversing.
    pub fn despawn(&mut self, id: &AgentId) -> Result<CharacterAgent> {
        match self.agents.get(id) {
            None => Err(MatsuriError::UnknownAgent(id.clone())),
            Some(agent) if agent.in_conversation() => Err(MatsuriError::AgentBusy(id.clone())),
            Some(_) => {
                info!(agent = %id, "Character despawned");
                self.agents
                    .remove(id)
                    .ok_or_else(|| MatsuriError::UnknownAgent(id.clone()))
            }
        }
    }

    /// Store remote profiles and patch every matching character.
    ///
    /// Profiles are remembered so characters spawned later are patched too.
    /// Applying the same set twice leaves the world unchanged. Returns how
    /// many registered characters matched.
    pub fn apply_profiles<I>(&mut self, profiles: I) -> usize
    where
        I: IntoIterator<Item = (AgentId, AgentProfile)>,
    {
        let mut matched = 0;
        for (id, profile) in profiles {
            if let Some(agent) = self.agents.get_mut(&id) {
                agent.apply_profile(&profile);
                matched += 1;
            }
            self.profiles.insert(id, profile);
        }
        info!(matched, known = self.profiles.len(), "Agent profiles applied");
        matched
    }

    // -- Motion --------------------------------------------------------------

    /// Advance every character's motion state machine.
    pub fn step_motion(&mut self, now: SimTime, dt_secs: f32) {
        let Self {
            agents,
            waypoints,
            motion,
            steering,
            rng,
            ..
        } = self;
        let mut step = MotionStep {
            now,
            dt_secs,
            waypoints,
            config: motion,
            steering: &**steering,
            rng,
        };
        for agent in agents.values_mut() {
            agent.update(&mut step);
        }
    }

    // -- Claim protocol ------------------------------------------------------

    /// Pair two available characters into a conversation.
    ///
    /// Both must exist, differ, be out of conversation and out of cooldown.
    /// On success both halt and face each other.
    ///
    /// # Errors
    /// `UnknownAgent`, `AgentBusy`, `CoolingDown` or `ProtocolViolation`
    /// (self-claim). On error nothing changes.
    pub fn try_claim(&mut self, a: &AgentId, b: &AgentId, now: SimTime) -> Result<()> {
        self.claim(a, b, Some((now, self.motion.conversation_cooldown())))
    }

    /// Like [`World::try_claim`] but ignores cooldown. Used by operator hooks.
    ///
    /// # Errors
    /// `UnknownAgent`, `AgentBusy` or `ProtocolViolation`.
    pub fn force_claim(&mut self, a: &AgentId, b: &AgentId) -> Result<()> {
        self.claim(a, b, None)
    }

    fn claim(&mut self, a: &AgentId, b: &AgentId, cooldown: Option<(SimTime, Duration)>) -> Result<()> {
        if a == b {
            return Err(MatsuriError::ProtocolViolation(format!("{a} cannot converse with itself")));
        }
        let first = self.agents.get(a).ok_or_else(|| MatsuriError::UnknownAgent(a.clone()))?;
        let second = self.agents.get(b).ok_or_else(|| MatsuriError::UnknownAgent(b.clone()))?;

        for agent in [first, second] {
            if agent.in_conversation() {
                return Err(MatsuriError::AgentBusy(agent.id().clone()));
            }
            if let Some((now, cooldown)) = cooldown {
                if agent.in_cooldown(now, cooldown) {
                    return Err(MatsuriError::CoolingDown(agent.id().clone()));
                }
            }
        }

        let (pos_a, pos_b) = (first.position(), second.position());
        if let Some(agent) = self.agents.get_mut(a) {
            agent.begin_conversation(b.clone(), pos_b);
        }
        if let Some(agent) = self.agents.get_mut(b) {
            agent.begin_conversation(a.clone(), pos_a);
        }
        debug!(a = %a, b = %b, "Pair claimed");
        Ok(())
    }

    /// End a pair's conversation: both get a cooldown stamp and linger for
    /// the resume delay before walking off.
    ///
    /// # Errors
    /// `UnknownAgent`, or `ProtocolViolation` if the two are not partnered
    /// to each other. On error nothing changes.
    pub fn release(&mut self, a: &AgentId, b: &AgentId, now: SimTime) -> Result<()> {
        let first = self.agents.get(a).ok_or_else(|| MatsuriError::UnknownAgent(a.clone()))?;
        let second = self.agents.get(b).ok_or_else(|| MatsuriError::UnknownAgent(b.clone()))?;
        if first.partner() != Some(b) || second.partner() != Some(a) {
            return Err(MatsuriError::ProtocolViolation(format!("{a} and {b} are not partners")));
        }

        let resume = self.motion.resume_delay();
        for id in [a, b] {
            if let Some(agent) = self.agents.get_mut(id) {
                agent.end_conversation(now, resume);
            }
        }
        debug!(a = %a, b = %b, "Pair released");
        Ok(())
    }

    /// Proximity scan: pair up available characters within the interaction
    /// radius of each other.
    ///
    /// Scanners go in id order; each claims its nearest available peer
    /// (ties by id). A character claimed earlier in the scan is no longer
    /// available to later scanners. Returns the claimed pairs, scanner first.
    pub fn scan_for_claims(&mut self, now: SimTime) -> Vec<(AgentId, AgentId)> {
        let cooldown = self.motion.conversation_cooldown();
        let radius = self.motion.interaction_radius;
        let ids: Vec<AgentId> = self.agents.keys().cloned().collect();
        let mut pairs = Vec::new();

        for scanner_id in &ids {
            let Some(scanner) = self.agents.get(scanner_id) else {
                continue;
            };
            if !scanner.is_available(now, cooldown) {
                continue;
            }
            let origin = scanner.position();

            let mut best: Option<(&AgentId, f32)> = None;
            for (peer_id, peer) in &self.agents {
                if peer_id == scanner_id || !peer.is_available(now, cooldown) {
                    continue;
                }
                let distance = peer.position().distance(origin);
                if distance > radius {
                    continue;
                }
                if best.is_none_or(|(_, d)| distance < d) {
                    best = Some((peer_id, distance));
                }
            }

            if let Some((peer_id, _)) = best {
                let peer_id = peer_id.clone();
                if self.try_claim(scanner_id, &peer_id, now).is_ok() {
                    pairs.push((scanner_id.clone(), peer_id));
                }
            }
        }

        pairs
    }

    /// Verify the partner link: symmetric, and conversing exactly when
    /// partnered.
    ///
    /// # Errors
    /// `ProtocolViolation` naming the first broken character.
    pub fn check_invariants(&self) -> Result<()> {
        for agent in self.agents.values() {
            let conversing = agent.motion() == MotionState::Conversing;
            match agent.partner() {
                Some(partner_id) => {
                    let back = self.agents.get(partner_id).and_then(CharacterAgent::partner);
                    if back != Some(agent.id()) {
                        return Err(MatsuriError::ProtocolViolation(format!(
                            "{} points at {partner_id} which does not point back",
                            agent.id()
                        )));
                    }
                    if !conversing {
                        return Err(MatsuriError::ProtocolViolation(format!(
                            "{} has a partner but is not conversing",
                            agent.id()
                        )));
                    }
                }
                None if conversing => {
                    return Err(MatsuriError::ProtocolViolation(format!(
                        "{} is conversing without a partner",
                        agent.id()
                    )));
                }
                None => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;

    fn world_with(agents: &[(&str, f32)]) -> World {
        let mut world = World::new(&MatsuriConfig::default());
        for (id, x) in agents {
            world
                .spawn(CharacterAgent::new(*id, id.to_uppercase(), Position::new(*x, 0.0, 0.0)))
                .expect("spawn");
        }
        world
    }

    fn id(s: &str) -> AgentId {
        AgentId::new(s)
    }

    #[test]
    fn claim_is_symmetric() {
        let mut world = world_with(&[("miku", 0.0), ("alpha", 1.0)]);
        world.try_claim(&id("miku"), &id("alpha"), SimTime::ZERO).expect("claim");
        assert_eq!(world.agent(&id("miku")).and_then(CharacterAgent::partner), Some(&id("alpha")));
        assert_eq!(world.agent(&id("alpha")).and_then(CharacterAgent::partner), Some(&id("miku")));
        world.check_invariants().expect("symmetric");
    }

    #[test]
    fn cannot_claim_a_conversing_agent() {
        let mut world = world_with(&[("a", 0.0), ("b", 1.0), ("c", 1.5)]);
        world.try_claim(&id("a"), &id("b"), SimTime::ZERO).expect("claim");
        let err = world.try_claim(&id("c"), &id("b"), SimTime::ZERO).unwrap_err();
        assert!(matches!(err, MatsuriError::AgentBusy(ref who) if who == &id("b")));
        assert!(!world.agent(&id("c")).is_some_and(CharacterAgent::in_conversation));
        world.check_invariants().expect("still consistent");
    }

    #[test]
    fn self_claim_is_a_protocol_violation() {
        let mut world = world_with(&[("a", 0.0)]);
        assert!(matches!(
            world.try_claim(&id("a"), &id("a"), SimTime::ZERO),
            Err(MatsuriError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn release_requires_partnership_and_sets_cooldown() {
        let mut world = world_with(&[("a", 0.0), ("b", 1.0), ("c", 5.0)]);
        assert!(matches!(
            world.release(&id("a"), &id("b"), SimTime::ZERO),
            Err(MatsuriError::ProtocolViolation(_))
        ));

        world.try_claim(&id("a"), &id("b"), SimTime::ZERO).expect("claim");
        let end = SimTime::from_millis(20_000);
        world.release(&id("a"), &id("b"), end).expect("release");
        world.check_invariants().expect("consistent");

        let a = world.agent(&id("a")).expect("a");
        assert_eq!(a.last_conversation_end(), Some(end));
        assert_eq!(a.motion(), MotionState::Waiting { until: SimTime::from_millis(22_000) });

        // Both sides of a claim honour the cooldown.
        let soon = SimTime::from_millis(30_000);
        assert!(matches!(
            world.try_claim(&id("c"), &id("a"), soon),
            Err(MatsuriError::CoolingDown(_))
        ));
        world.force_claim(&id("c"), &id("a")).expect("forced claim ignores cooldown");
    }

    #[test]
    fn scan_pairs_nearest_and_skips_busy() {
        let mut world = world_with(&[("a", 0.0), ("b", 1.5), ("c", 1.0), ("d", 40.0)]);
        let pairs = world.scan_for_claims(SimTime::ZERO);
        assert_eq!(pairs, vec![(id("a"), id("c"))]);
        assert!(!world.agent(&id("b")).is_some_and(CharacterAgent::in_conversation));
        assert!(!world.agent(&id("d")).is_some_and(CharacterAgent::in_conversation));
        world.check_invariants().expect("consistent");
    }

    #[test]
    fn despawn_refused_while_conversing() {
        let mut world = world_with(&[("a", 0.0), ("b", 1.0)]);
        world.try_claim(&id("a"), &id("b"), SimTime::ZERO).expect("claim");
        assert!(matches!(world.despawn(&id("a")), Err(MatsuriError::AgentBusy(_))));
        world.release(&id("a"), &id("b"), SimTime::ZERO).expect("release");
        world.despawn(&id("a")).expect("despawn after release");
        assert!(matches!(world.despawn(&id("a")), Err(MatsuriError::UnknownAgent(_))));
    }

    #[test]
    fn profiles_apply_idempotently_and_to_late_spawns() {
        let mut world = world_with(&[("miku", 0.0)]);
        let fast = AgentProfile {
            walk_speed_multiplier: 1.2,
            ..AgentProfile::default()
        };
        let profiles = vec![(id("miku"), fast.clone()), (id("rin"), fast.clone())];

        assert_eq!(world.apply_profiles(profiles.clone()), 1);
        let once = world.agent(&id("miku")).expect("miku").profile().clone();
        assert_eq!(world.apply_profiles(profiles), 1);
        assert_eq!(world.agent(&id("miku")).expect("miku").profile(), &once);

        world
            .spawn(CharacterAgent::new("rin", "Rin", Position::ZERO))
            .expect("spawn rin");
        assert_eq!(world.agent(&id("rin")).expect("rin").profile(), &fast);
    }

    #[test]
    fn duplicate_spawn_is_rejected() {
        let mut world = world_with(&[("a", 0.0)]);
        assert!(matches!(
            world.spawn(CharacterAgent::new("a", "Again", Position::ZERO)),
            Err(MatsuriError::DuplicateAgent(_))
        ));
    }

    #[test]
    fn conversing_agents_do_not_move() {
        let mut world = world_with(&[("a", 0.0), ("b", 1.0)]);
        world.try_claim(&id("a"), &id("b"), SimTime::ZERO).expect("claim");
        let before = world.agent(&id("a")).expect("a").position();
        for i in 1..=20 {
            world.step_motion(SimTime::from_millis(i * 100), 0.1);
        }
        assert_eq!(world.agent(&id("a")).expect("a").position(), before);
    }
}
