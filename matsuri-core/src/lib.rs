//! # Matsuri Core Library
//!
//! Engine-agnostic core of the festival wanderers simulation.
//!
//! Characters stroll between festival waypoints, notice each other, and when
//! two idle characters meet they hold a short turn-based conversation whose
//! lines come from a remote dialog service:
//!
//! - **Waypoints**: festival areas characters wander between ([`waypoint`])
//! - **Characters**: per-character motion state machine ([`agent`])
//! - **World**: registry and the single claim arbiter that pairs characters ([`world`])
//! - **Sessions**: turn schedule and turn-ordered history ([`session`])
//! - **Coordinator**: drives sessions, matches replies by ticket ([`coordinator`])
//! - **Bubbles**: fade state machine that follows a moving character ([`bubble`])
//!
//! Nothing here performs I/O or reads a clock. Time is [`SimTime`], advanced
//! by the caller, and network traffic leaves as [`coordinator::Outbound`]
//! messages.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod agent;
pub mod bubble;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod presentation;
pub mod session;
pub mod steering;
pub mod types;
pub mod waypoint;
pub mod world;

pub use agent::{AgentProfile, CharacterAgent, MotionState};
pub use config::MatsuriConfig;
pub use coordinator::ConversationCoordinator;
pub use error::MatsuriError;
pub use types::*;
pub use world::World;
