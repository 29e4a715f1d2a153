//! Wire types for the dialog service HTTP API.
//!
//! Field names match the service's JSON exactly. Response types are lenient:
//! optional fields default, unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Body of `POST /dialog/turn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    /// Both participants.
    pub agent_ids: Vec<String>,
    /// Turn number, starting at 1.
    pub turn: u32,
    /// Conversation so far.
    pub context: String,
    /// Where the conversation takes place.
    pub location: String,
}

/// Reply of `POST /dialog/turn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogResponse {
    /// Id of the speaking character.
    pub speaker: String,
    /// Display name of the speaker.
    #[serde(default)]
    pub speaker_name: String,
    /// The line.
    pub text: String,
    /// Emotion cue; empty for none.
    #[serde(default)]
    pub emotion: String,
    /// Turn number echoed back.
    #[serde(default)]
    pub turn: u32,
    /// Server timestamp (ISO 8601), informational only.
    #[serde(default)]
    pub timestamp: String,
}

/// Reply of `GET /config/agents`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfigPayload {
    /// Per-character records.
    #[serde(default)]
    pub agents: Vec<AgentRecord>,
    /// Global conversation rules.
    #[serde(default)]
    pub conversation_rules: Option<ConversationRules>,
    /// Named festival locations.
    #[serde(default)]
    pub locations: Vec<LocationRecord>,
}

/// One character's remote configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Character id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Personality description.
    #[serde(default)]
    pub personality: String,
    /// Speaking style description.
    #[serde(default)]
    pub speaking_style: String,
    /// Multiplier on the base walk speed.
    #[serde(default = "default_walking_speed")]
    pub walking_speed: f32,
    /// Display colour.
    #[serde(default)]
    pub color: Option<String>,
    /// Favourite topics.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Greeting phrase pool.
    #[serde(default)]
    pub greeting_patterns: Vec<String>,
    /// Idle actions.
    #[serde(default)]
    pub idle_actions: Vec<String>,
}

/// Conversation rules published by the service; every field optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationRules {
    /// Turns per session.
    #[serde(default)]
    pub max_turns: Option<u32>,
    /// Seconds between turns.
    #[serde(default)]
    pub turn_duration: Option<f32>,
    /// Radius at which characters start talking.
    #[serde(default)]
    pub proximity_radius: Option<f32>,
    /// Distance at which a conversation breaks up. Informational.
    #[serde(default)]
    pub separation_distance: Option<f32>,
    /// Seconds before a character may talk again.
    #[serde(default)]
    pub conversation_cooldown: Option<f32>,
}

/// A named festival location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Location id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Topics associated with the location.
    #[serde(default)]
    pub topics: Vec<String>,
}

/// Body of `POST /dialog/reset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetRequest {
    /// Session to forget.
    pub session_id: String,
}

/// Result of a health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// `/healthz` answered with a success status.
    Connected,
    /// Anything else.
    Disconnected,
}

impl HealthStatus {
    /// Whether this is [`HealthStatus::Connected`].
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

fn default_walking_speed() -> f32 {
    1.0
}
