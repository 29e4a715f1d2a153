//! matsuri Benchmark Suite
//!
//! Performance targets:
//!   motion_step_50_agents ........... < 50μs
//!   proximity_scan_50_agents ........ < 100μs
//!   simulation_step_20_agents ....... < 2ms
//!   bubble_measure_long_line ........ < 5μs

use std::hint::black_box;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};

use matsuri_core::agent::CharacterAgent;
use matsuri_core::bubble::measure;
use matsuri_core::config::{BubbleConfig, MatsuriConfig};
use matsuri_core::presentation::NullSink;
use matsuri_core::types::{Position, SimTime};
use matsuri_core::world::World;
use matsuri_net::{Completion, DialogTransport, RequestId, TurnRequest};
use matsuri_sim::Simulation;

/// Accepts every submission and never completes anything.
struct SilentTransport;

impl DialogTransport for SilentTransport {
    fn submit_turn(&self, _: RequestId, _: TurnRequest) {}
    fn submit_reset(&self, _: String) {}
    fn submit_health_check(&self) {}
    fn submit_config_load(&self) {}
    fn drain(&self) -> Vec<Completion> {
        Vec::new()
    }
}

fn make_agent(i: usize) -> CharacterAgent {
    let angle = i as f32 * 0.7;
    let radius = 2.0 + (i % 7) as f32 * 3.0;
    CharacterAgent::new(
        format!("visitor_{i:03}").as_str(),
        format!("Visitor {i}"),
        Position::new(angle.cos() * radius, 0.0, angle.sin() * radius),
    )
}

fn populated_world(n: usize) -> World {
    let mut world = World::new(&MatsuriConfig::default());
    for i in 0..n {
        // Ids are unique by construction.
        let _ = world.spawn(make_agent(i));
    }
    world
}

/// Benchmark: one motion step for 50 wandering characters (target: < 50μs).
fn bench_motion_step(c: &mut Criterion) {
    let mut world = populated_world(50);
    let mut now = SimTime::ZERO;
    c.bench_function("motion_step_50_agents", |b| {
        b.iter(|| {
            now = now + Duration::from_millis(33);
            world.step_motion(black_box(now), black_box(0.033));
        });
    });
}

/// Benchmark: proximity scan over 50 characters (target: < 100μs).
///
/// Cooldown is zero and pairs are released right away so every iteration
/// scans the same population.
fn bench_proximity_scan(c: &mut Criterion) {
    let mut config = MatsuriConfig::default();
    config.motion.conversation_cooldown_secs = 0.0;
    let mut world = World::new(&config);
    for i in 0..50 {
        let _ = world.spawn(make_agent(i));
    }
    let now = SimTime::from_secs_f32(1.0);

    c.bench_function("proximity_scan_50_agents", |b| {
        b.iter(|| {
            let pairs = world.scan_for_claims(black_box(now));
            for (a, b) in &pairs {
                let _ = world.release(a, b, now);
            }
            black_box(pairs.len())
        });
    });
}

/// Benchmark: a full run-loop step with 20 characters and live sessions
/// (target: < 2ms).
fn bench_simulation_step(c: &mut Criterion) {
    let mut sim = match Simulation::new(MatsuriConfig::default(), SilentTransport, NullSink) {
        Ok(sim) => sim,
        Err(err) => panic!("default config must be valid: {err}"),
    };
    for i in 0..20 {
        let _ = sim.spawn(make_agent(i));
    }
    sim.start();

    c.bench_function("simulation_step_20_agents", |b| {
        b.iter(|| {
            sim.step(black_box(Duration::from_millis(33)));
            black_box(sim.drain_events());
        });
    });
}

/// Benchmark: measuring a bubble for a long line (target: < 5μs).
fn bench_bubble_measure(c: &mut Criterion) {
    let config = BubbleConfig::default();
    let text = "The fireworks start at nine, shall we grab takoyaki and find a spot by the river before it gets crowded?";
    c.bench_function("bubble_measure_long_line", |b| {
        b.iter(|| black_box(measure(black_box(text), &config)));
    });
}

criterion_group!(
    benches,
    bench_motion_step,
    bench_proximity_scan,
    bench_simulation_step,
    bench_bubble_measure,
);
criterion_main!(benches);
