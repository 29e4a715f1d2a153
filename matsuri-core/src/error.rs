//! Error types for the matsuri core library.

use thiserror::Error;

use crate::types::AgentId;

/// Top-level error type for all core operations.
#[derive(Error, Debug)]
pub enum MatsuriError {
    /// A claim or session-close would break the partner symmetry invariant.
    ///
    /// Never produced when the arbiter and coordinator are used as intended.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// No agent with this id is registered in the world.
    #[error("Agent not found: {0}")]
    UnknownAgent(AgentId),

    /// An agent with this id is already registered.
    #[error("Agent already spawned: {0}")]
    DuplicateAgent(AgentId),

    /// The agent is conversing and cannot be removed or re-claimed.
    #[error("Agent is busy in a conversation: {0}")]
    AgentBusy(AgentId),

    /// The agent finished a conversation too recently to be claimed.
    #[error("Agent is cooling down after a conversation: {0}")]
    CoolingDown(AgentId),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, MatsuriError>;
