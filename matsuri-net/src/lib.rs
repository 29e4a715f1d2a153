//! # matsuri-net: Dialog Service Layer for matsuri
//!
//! Everything that crosses the process boundary lives here:
//!   - **Wire types** for the service's JSON API
//!   - **`HttpDialogClient`** (reqwest) behind the `DialogService` trait
//!   - **`HealthMonitor`**, which reports connectivity flips only
//!   - **`Dispatcher`**, which runs calls on tokio and delivers completions
//!     into a `ResponseInbox` drained by the run-loop
//!
//! # Architecture
//!
//! ```text
//! run-loop ──submit──▶ Dispatcher ──spawn──▶ HttpDialogClient ──HTTP──▶ service
//!    ▲                                              │
//!    └────────drain──── ResponseInbox ◀──push───────┘
//! ```
//!
//! The run-loop never awaits. A slow or dead service delays replies but never
//! stalls a simulation step.

pub mod client;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod inbox;
pub mod types;

pub use client::{DialogService, HttpDialogClient};
pub use dispatch::{DialogTransport, Dispatcher};
pub use error::{ErrorKind, NetError};
pub use health::HealthMonitor;
pub use inbox::{Completion, RequestId, ResponseInbox};
pub use types::{
    AgentConfigPayload, AgentRecord, ConversationRules, DialogResponse, HealthStatus, LocationRecord, TurnRequest,
};
