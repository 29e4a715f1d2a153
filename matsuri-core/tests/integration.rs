//! Integration tests: characters wander, meet, talk and part, driven only
//! through the public core API.

use std::sync::Arc;

use matsuri_core::bubble::LookAtProjector;
use matsuri_core::coordinator::{Outbound, TurnReply};
use matsuri_core::metrics::MatsuriCounters;
use matsuri_core::presentation::RecordingSink;
use matsuri_core::{AgentId, CharacterAgent, ConversationCoordinator, MatsuriConfig, MotionState, Position, SimTime, World};

fn id(s: &str) -> AgentId {
    AgentId::new(s)
}

fn camera() -> LookAtProjector {
    LookAtProjector::looking_at(Position::new(0.0, 12.0, -20.0), Position::ZERO, 600.0, (640.0, 360.0))
}

/// Two characters placed next to each other meet on the first scan, talk
/// through a full session with every turn answered, then resume wandering.
#[test]
fn meet_talk_and_part() {
    let config = MatsuriConfig::default();
    let counters = Arc::new(MatsuriCounters::new());
    let mut world = World::new(&config);
    let mut coordinator = ConversationCoordinator::new(&config, Arc::clone(&counters));
    let mut sink = RecordingSink::default();
    let projector = camera();

    world
        .spawn(CharacterAgent::new("miku", "Miku", Position::new(0.0, 0.0, 0.0)))
        .expect("spawn");
    world
        .spawn(CharacterAgent::new("alpha", "Alpha", Position::new(1.0, 0.0, 0.0)))
        .expect("spawn");

    let mut answered = 0;
    let mut closed_at = None;
    for step in 0..300_u64 {
        let now = SimTime::from_millis(step * 100);
        world.step_motion(now, 0.1);
        for (a, b) in world.scan_for_claims(now) {
            coordinator.open_session(&world, &a, &b, now).expect("open");
        }
        coordinator.tick(&mut world, now);
        coordinator.tick_bubbles(&world, 0.1, &projector, &mut sink);

        for outbound in coordinator.drain_outbound() {
            match outbound {
                Outbound::Turn { ticket, request } => {
                    let speaker = request.agent_ids[usize::from(request.turn % 2 == 0)].clone();
                    let reply = TurnReply {
                        speaker,
                        speaker_name: String::new(),
                        text: format!("line {}", request.turn),
                        emotion: None,
                        turn: request.turn,
                    };
                    coordinator.apply_response(&mut world, ticket, Ok(reply), &mut sink);
                    answered += 1;
                }
                Outbound::Reset { .. } => closed_at = closed_at.or(Some(now)),
            }
        }
        world.check_invariants().expect("partner link");
    }

    assert_eq!(answered, 6);
    assert!(closed_at.is_some(), "session closed");
    let snap = counters.snapshot();
    assert_eq!(snap.sessions_opened, 1);
    assert_eq!(snap.sessions_closed, 1);
    assert_eq!(snap.lines_applied, 6);

    let miku = world.agent(&id("miku")).expect("miku");
    assert!(!miku.in_conversation());
    assert!(miku.last_conversation_end().is_some());
    assert_ne!(miku.motion(), MotionState::Conversing);
    assert_eq!(sink.texts_for(&id("miku")), vec!["line 1", "line 3", "line 5"]);
}

/// After a conversation both characters stay unclaimable for the cooldown,
/// even while standing next to each other.
#[test]
fn cooldown_blocks_immediate_rematch() {
    let mut config = MatsuriConfig::default();
    config.dialog.max_turns = 1;
    let counters = Arc::new(MatsuriCounters::new());
    let mut world = World::new(&config);
    let mut coordinator = ConversationCoordinator::new(&config, Arc::clone(&counters));

    for (name, x) in [("rin", 0.0), ("len", 0.5)] {
        world
            .spawn(CharacterAgent::new(name, name, Position::new(x, 0.0, 0.0)))
            .expect("spawn");
    }

    let pairs = world.scan_for_claims(SimTime::ZERO);
    assert_eq!(pairs.len(), 1);
    let (a, b) = &pairs[0];
    coordinator.open_session(&world, a, b, SimTime::ZERO).expect("open");

    // 1 turn * 3 s + 2 s end delay.
    let close = SimTime::from_millis(5_000);
    coordinator.tick(&mut world, SimTime::ZERO);
    coordinator.tick(&mut world, close);
    assert_eq!(coordinator.active_sessions(), 0);

    assert!(world.scan_for_claims(SimTime::from_millis(34_999)).is_empty());
    assert_eq!(world.scan_for_claims(SimTime::from_millis(35_000)).len(), 1);
}
