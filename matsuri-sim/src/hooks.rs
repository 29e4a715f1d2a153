//! Operator hooks: debug actions bound to function keys.
//!
//! | Key | Action                                             |
//! |-----|----------------------------------------------------|
//! | F1  | reset every live dialog                            |
//! | F2  | pair two random free characters and start a dialog |
//! | F3  | log a debug summary of sessions and bubbles        |

use std::str::FromStr;

use matsuri_core::presentation::PresentationSink;
use matsuri_core::types::SessionId;
use matsuri_net::DialogTransport;
use tracing::info;

use crate::simulation::Simulation;

/// An operator action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// F1.
    ResetAll,
    /// F2.
    ForceRandomDialog,
    /// F3.
    DebugSummary,
}

/// Result of an operator action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Number of sessions closed.
    Reset(usize),
    /// The forced session, or `None` if fewer than two characters were free.
    Started(Option<SessionId>),
    /// The debug dump.
    Summary(String),
}

impl FromStr for OperatorCommand {
    type Err = String;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        match key.trim().to_ascii_uppercase().as_str() {
            "F1" | "RESET" => Ok(Self::ResetAll),
            "F2" | "DIALOG" => Ok(Self::ForceRandomDialog),
            "F3" | "DEBUG" => Ok(Self::DebugSummary),
            other => Err(format!("unknown operator key: {other}")),
        }
    }
}

/// Run an operator action against a simulation.
pub fn run<T, S>(sim: &mut Simulation<T, S>, command: OperatorCommand) -> HookOutcome
where
    T: DialogTransport,
    S: PresentationSink,
{
    match command {
        OperatorCommand::ResetAll => {
            let closed = sim.reset_all_dialogs();
            info!(closed, "Operator reset all dialogs");
            HookOutcome::Reset(closed)
        }
        OperatorCommand::ForceRandomDialog => HookOutcome::Started(sim.force_random_dialog()),
        OperatorCommand::DebugSummary => {
            let summary = sim.debug_summary();
            info!("=== Dialog Debug Info ===\n{summary}");
            HookOutcome::Summary(summary)
        }
    }
}
