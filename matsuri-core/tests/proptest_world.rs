//! Property-based tests for the world arbiter and waypoint selection.
//!
//! Random interleavings of claims, forced claims, releases and motion steps
//! must never break the partner link, and waypoint selection must always
//! return a waypoint that exists.

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use matsuri_core::config::{MatsuriConfig, WaypointConfig};
use matsuri_core::waypoint::WaypointStore;
use matsuri_core::{AgentId, CharacterAgent, Position, SimTime, World};

const ROSTER: [&str; 5] = ["miku", "rin", "len", "alpha", "kaito"];

#[derive(Debug, Clone)]
enum Op {
    Claim(usize, usize),
    Force(usize, usize),
    Release(usize, usize),
    Scan,
    Step,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ROSTER.len(), 0..ROSTER.len()).prop_map(|(a, b)| Op::Claim(a, b)),
        (0..ROSTER.len(), 0..ROSTER.len()).prop_map(|(a, b)| Op::Force(a, b)),
        (0..ROSTER.len(), 0..ROSTER.len()).prop_map(|(a, b)| Op::Release(a, b)),
        Just(Op::Scan),
        Just(Op::Step),
    ]
}

fn populated_world(seed: u64, spread: f32) -> World {
    let mut config = MatsuriConfig::default();
    config.general.seed = seed;
    let mut world = World::new(&config);
    for (i, id) in ROSTER.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let x = i as f32 * spread;
        world
            .spawn(CharacterAgent::new(*id, id.to_uppercase(), Position::new(x, 0.0, 0.0)))
            .expect("spawn");
    }
    world
}

proptest! {
    #[test]
    fn partner_link_stays_symmetric(
        seed in any::<u64>(),
        spread in 0.5..3.0f32,
        ops in prop::collection::vec(arb_op(), 1..60),
    ) {
        let mut world = populated_world(seed, spread);
        let mut now = SimTime::ZERO;

        for op in ops {
            now = now + std::time::Duration::from_millis(250);
            match op {
                Op::Claim(a, b) => {
                    let _ = world.try_claim(&AgentId::new(ROSTER[a]), &AgentId::new(ROSTER[b]), now);
                }
                Op::Force(a, b) => {
                    let _ = world.force_claim(&AgentId::new(ROSTER[a]), &AgentId::new(ROSTER[b]));
                }
                Op::Release(a, b) => {
                    let _ = world.release(&AgentId::new(ROSTER[a]), &AgentId::new(ROSTER[b]), now);
                }
                Op::Scan => {
                    let _ = world.scan_for_claims(now);
                }
                Op::Step => world.step_motion(now, 0.25),
            }
            prop_assert!(world.check_invariants().is_ok(), "{:?}", world.check_invariants());
        }
    }

    #[test]
    fn scan_never_double_books(seed in any::<u64>(), spread in 0.1..2.5f32) {
        let mut world = populated_world(seed, spread);
        let pairs = world.scan_for_claims(SimTime::ZERO);

        let mut seen = std::collections::BTreeSet::new();
        for (a, b) in &pairs {
            prop_assert!(seen.insert(a.clone()), "{a} claimed twice");
            prop_assert!(seen.insert(b.clone()), "{b} claimed twice");
        }
        prop_assert!(world.check_invariants().is_ok());
    }

    #[test]
    fn random_waypoint_is_always_a_member(seed in any::<u64>(), count in 1usize..=7, previous in 0u32..7) {
        let store = WaypointStore::create_or_load(&WaypointConfig { count, ..WaypointConfig::default() });
        let mut rng = StdRng::seed_from_u64(seed);
        let wp = store.random_waypoint(&mut rng, Some(matsuri_core::WaypointId(previous)));
        let wp = wp.expect("non-empty store");
        prop_assert!(store.get(wp.id).is_some());
        if count == 1 {
            prop_assert_eq!(wp.id.0, 0);
        }
    }
}
