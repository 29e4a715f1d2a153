//! # matsuri-sim: Festival Run-Loop for matsuri
//!
//! This crate ties the engine-agnostic `matsuri-core` to the dialog service
//! client in `matsuri-net`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Simulation                   │
//! │  ┌──────────────┐        ┌────────────────┐  │
//! │  │ matsuri-core │◀──────▶│     bridge     │  │
//! │  │ World        │        └───────┬────────┘  │
//! │  │ Coordinator  │                │           │
//! │  └──────────────┘                ▼           │
//! │                         ┌────────────────┐   │
//! │                         │  matsuri-net   │   │
//! │                         │  Dispatcher    │   │
//! │                         └────────────────┘   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `simulation`: the step function and operator actions
//! - `bridge`: conversions between core and wire types
//! - `events`: what happened during a step
//! - `hooks`: F1/F2/F3 operator commands
//! - `config`: runner settings and the per-step performance budget

pub mod bridge;
pub mod config;
pub mod events;
pub mod hooks;
pub mod simulation;

pub use config::{PerformanceBudget, RunnerConfig};
pub use events::SimEvent;
pub use hooks::{HookOutcome, OperatorCommand};
pub use simulation::Simulation;
