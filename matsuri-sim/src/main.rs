//! Headless festival runner.
//!
//! Steps the simulation in real time against the configured dialog service.
//! Type `F1`, `F2` or `F3` on stdin for the operator actions; Ctrl-C resets
//! every dialog and exits.

use std::time::Duration;

use anyhow::{Context, Result};
use matsuri_core::agent::CharacterAgent;
use matsuri_core::config::MatsuriConfig;
use matsuri_core::presentation::NullSink;
use matsuri_core::types::Position;
use matsuri_net::{Dispatcher, HttpDialogClient};
use matsuri_sim::{OperatorCommand, RunnerConfig, Simulation, hooks};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Characters spawned by the runner: id and display name.
const DEFAULT_ROSTER: [(&str, &str); 4] = [("miku", "Miku"), ("rin", "Rin"), ("len", "Len"), ("alpha", "Alpha")];

#[tokio::main]
async fn main() -> Result<()> {
    let runner = RunnerConfig::from_env();
    let config = match &runner.config_path {
        Some(path) => {
            MatsuriConfig::from_file(path).with_context(|| format!("loading config from {}", path.display()))?
        }
        None => MatsuriConfig::default(),
    };
    setup_logging(&config.general.log_level, runner.json_logs)?;

    let client = HttpDialogClient::new(config.server.base_url.clone(), config.server.request_timeout())?;
    info!(url = %client.base_url(), "Dialog service client ready");
    let dispatcher = Dispatcher::current(client)?;

    let center = config.waypoints.center;
    let mut sim = Simulation::new(config, dispatcher, NullSink)?.with_step_budget_ms(runner.step_budget_ms);
    for (i, (id, name)) in DEFAULT_ROSTER.iter().enumerate() {
        let angle = i as f32 * std::f32::consts::TAU / DEFAULT_ROSTER.len() as f32;
        let position = center + Position::new(angle.cos() * 6.0, 0.0, angle.sin() * 6.0);
        sim.spawn(CharacterAgent::new(*id, *name, position))?;
    }
    sim.start();

    let step = runner.step();
    let mut ticker = tokio::time::interval(step);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut operator = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut next_dump = runner.debug_dump_secs;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sim.step(step);
                for event in sim.drain_events() {
                    debug!(?event, "Simulation event");
                }
                let elapsed = sim.now().as_secs_f32();
                if runner.debug_dump_secs > 0.0 && elapsed >= next_dump {
                    hooks::run(&mut sim, OperatorCommand::DebugSummary);
                    next_dump += runner.debug_dump_secs;
                }
                if runner.run_secs.is_some_and(|limit| elapsed >= limit) {
                    info!(elapsed, "Run time reached");
                    break;
                }
            }
            line = operator.next_line(), if stdin_open => match line {
                Ok(Some(key)) => match key.parse::<OperatorCommand>() {
                    Ok(command) => {
                        hooks::run(&mut sim, command);
                    }
                    Err(err) => warn!(%err, "Ignoring operator input"),
                },
                Ok(None) => stdin_open = false,
                Err(err) => {
                    warn!(error = %err, "Operator input closed");
                    stdin_open = false;
                }
            },
            _ = &mut shutdown => {
                info!("Interrupted");
                break;
            }
        }
    }

    hooks::run(&mut sim, OperatorCommand::ResetAll);
    // Reset requests are best-effort; give them a moment before the runtime stops.
    tokio::time::sleep(Duration::from_millis(250)).await;
    info!(counters = %sim.counters().snapshot().summary(), "Festival closed");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level {level:?}"))?;
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }
    Ok(())
}
