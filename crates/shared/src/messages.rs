//! WebSocket message types for party-session communication.
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Removing variants requires a major version bump
//! - Renaming variants is a breaking change
//! - Unknown inbound `type` values deserialize to `Unknown` rather than
//!   failing the frame, so an older client talking to a newer server degrades
//!   gracefully.

use chrono::{DateTime, Utc};
use partyhub_domain::PartyId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound frame shape: `{ type: "message", actor, text, mode?, context?, encounter_id? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Message {
        actor: String,
        text: String,
        #[serde(default)]
        mode: Option<String>,
        #[serde(default)]
        context: Option<String>,
        #[serde(default)]
        encounter_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRollEntry {
    pub a: i32,
    pub d: i32,
    pub margin: i32,
    pub damage: i32,
}

/// Outbound frame, top-level `type` field discriminates per spec §6.1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Chat {
        actor: String,
        text: String,
        mode: String,
        party_id: PartyId,
        timestamp: DateTime<Utc>,
    },
    /// Unicast for errors, broadcast for join/leave/notices.
    System {
        text: String,
        party_id: PartyId,
        timestamp: DateTime<Utc>,
    },
    DiceRoll {
        actor: String,
        dice: String,
        breakdown: Vec<i32>,
        modifier: i32,
        result: i32,
        text: String,
    },
    StatRoll {
        actor: String,
        dice: String,
        breakdown: Vec<i32>,
        modifier: i32,
        result: i32,
        text: String,
        stat: String,
    },
    Initiative {
        actor: String,
        dice: String,
        breakdown: Vec<i32>,
        modifier: i32,
        result: i32,
        text: String,
        silent: bool,
        rolled_by_sw: bool,
        combatant_name: String,
    },
    CombatResult {
        attacker: String,
        defender: String,
        individual_rolls: Vec<AttackRollEntry>,
        total_damage: i32,
        outcome: String,
        defender_new_dp: i32,
        narrative: String,
    },
    AbilityCast {
        caster: String,
        ability: String,
        targets: Vec<String>,
        resolution: Value,
        uses_remaining: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_round_trips_through_json() {
        let raw = r#"{"type":"message","actor":"Alice","text":"Hello"}"#;
        let parsed: ClientMessage = serde_json::from_str(raw).unwrap();
        match parsed {
            ClientMessage::Message { actor, text, mode, .. } => {
                assert_eq!(actor, "Alice");
                assert_eq!(text, "Hello");
                assert_eq!(mode, None);
            }
            ClientMessage::Unknown => panic!("expected Message variant"),
        }
    }

    #[test]
    fn unknown_client_type_degrades_to_unknown_variant() {
        let raw = r#"{"type":"some_future_frame"}"#;
        let parsed: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(parsed, ClientMessage::Unknown));
    }

    #[test]
    fn server_message_tags_discriminate_on_type() {
        let msg = ServerMessage::Chat {
            actor: "Alice".into(),
            text: "hi".into(),
            mode: "IC".into(),
            party_id: PartyId::new(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "chat");
    }
}
