//! Bridge module: maps between core domain types and dialog service wire
//! types.
//!
//! `matsuri-core` never sees JSON and `matsuri-net` never sees a
//! `CharacterAgent`. Everything that crosses between them goes through the
//! conversions below.

use matsuri_core::agent::AgentProfile;
use matsuri_core::config::RuleOverrides;
use matsuri_core::coordinator::{OutboundTurn, TurnFailure, TurnReply, TurnTicket};
use matsuri_core::types::AgentId;
use matsuri_net::{AgentRecord, ConversationRules, DialogResponse, NetError, RequestId, TurnRequest};

// ---------------------------------------------------------------------------
// Turns
// ---------------------------------------------------------------------------

/// Tickets and request ids share one number space.
#[must_use]
pub fn request_id(ticket: TurnTicket) -> RequestId {
    RequestId(ticket.0)
}

/// Inverse of [`request_id`].
#[must_use]
pub fn ticket(id: RequestId) -> TurnTicket {
    TurnTicket(id.0)
}

/// Wire body for a coordinator turn.
#[must_use]
pub fn turn_request(turn: &OutboundTurn) -> TurnRequest {
    TurnRequest {
        agent_ids: turn.agent_ids.iter().map(|id| id.as_str().to_string()).collect(),
        turn: turn.turn,
        context: turn.context.clone(),
        location: turn.location.clone(),
    }
}

/// Convert a turn completion for the coordinator.
///
/// An empty emotion string means "no emotion".
pub fn turn_result(result: Result<DialogResponse, NetError>) -> Result<TurnReply, TurnFailure> {
    match result {
        Ok(response) => Ok(TurnReply {
            speaker: AgentId::new(response.speaker),
            speaker_name: response.speaker_name,
            text: response.text,
            emotion: Some(response.emotion).filter(|e| !e.is_empty()),
            turn: response.turn,
        }),
        Err(err) => Err(TurnFailure(err.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Agent configuration
// ---------------------------------------------------------------------------

/// Map a remote character record to a profile keyed by character id.
///
/// Empty names are treated as absent so the local display name survives.
#[must_use]
pub fn agent_profile(record: &AgentRecord) -> (AgentId, AgentProfile) {
    let profile = AgentProfile {
        name: Some(record.name.clone()).filter(|n| !n.is_empty()),
        personality: record.personality.clone(),
        speaking_style: record.speaking_style.clone(),
        walk_speed_multiplier: record.walking_speed,
        color: record.color.clone(),
        topics: record.topics.clone(),
        greeting_phrases: record.greeting_patterns.clone(),
        idle_phrases: record.idle_actions.clone(),
    };
    (AgentId::new(record.id.clone()), profile)
}

/// Map the published conversation rules to local overrides.
///
/// `separation_distance` has no local counterpart: a conversation is never
/// broken up by distance because both characters stand still.
#[must_use]
pub fn rule_overrides(rules: &ConversationRules) -> RuleOverrides {
    RuleOverrides {
        max_turns: rules.max_turns,
        turn_duration_secs: rules.turn_duration,
        proximity_radius: rules.proximity_radius,
        conversation_cooldown_secs: rules.conversation_cooldown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matsuri_core::types::SessionId;

    #[test]
    fn turn_request_keeps_participant_order() {
        let turn = OutboundTurn {
            session_id: SessionId("miku_alpha_0_0".into()),
            agent_ids: [AgentId::new("miku"), AgentId::new("alpha")],
            turn: 1,
            context: "We met at the summer festival.".into(),
            location: "Central Plaza".into(),
        };
        let request = turn_request(&turn);
        assert_eq!(request.agent_ids, vec!["miku".to_string(), "alpha".to_string()]);
        assert_eq!(request.turn, 1);
        assert_eq!(request.location, "Central Plaza");
        assert_eq!(ticket(request_id(TurnTicket(42))), TurnTicket(42));
    }

    #[test]
    fn empty_emotion_becomes_none() {
        let response = DialogResponse {
            speaker: "alpha".into(),
            speaker_name: "Alpha".into(),
            text: "Takoyaki!".into(),
            emotion: String::new(),
            turn: 2,
            timestamp: String::new(),
        };
        let reply = turn_result(Ok(response)).expect("reply");
        assert_eq!(reply.speaker, AgentId::new("alpha"));
        assert_eq!(reply.emotion, None);

        let failure = turn_result(Err(NetError::Timeout(10_000))).expect_err("failure");
        assert!(failure.0.contains("10000"));
    }

    #[test]
    fn record_maps_to_profile() {
        let record = AgentRecord {
            id: "rin".into(),
            name: String::new(),
            personality: "energetic".into(),
            speaking_style: "short sentences".into(),
            walking_speed: 1.3,
            color: Some("#ffcc00".into()),
            topics: vec!["oranges".into()],
            greeting_patterns: vec!["Yo!".into()],
            idle_actions: vec!["stretch".into()],
        };
        let (id, profile) = agent_profile(&record);
        assert_eq!(id, AgentId::new("rin"));
        assert_eq!(profile.name, None);
        assert!((profile.walk_speed_multiplier - 1.3).abs() < f32::EPSILON);
        assert_eq!(profile.greeting_phrases, vec!["Yo!".to_string()]);
        assert_eq!(profile.idle_phrases, vec!["stretch".to_string()]);
    }

    #[test]
    fn rules_map_field_by_field() {
        let rules = ConversationRules {
            max_turns: Some(4),
            turn_duration: Some(2.5),
            proximity_radius: None,
            separation_distance: Some(5.0),
            conversation_cooldown: Some(10.0),
        };
        let overrides = rule_overrides(&rules);
        assert_eq!(overrides.max_turns, Some(4));
        assert_eq!(overrides.turn_duration_secs, Some(2.5));
        assert_eq!(overrides.proximity_radius, None);
        assert_eq!(overrides.conversation_cooldown_secs, Some(10.0));
    }
}
