//! The Macro Dispatcher — §4.2: parses the leading slash token, enforces
//! the per-`(party, actor)` throttle, routes to a handler, and applies the
//! verbosity policy to what gets persisted. The broadcast itself is always
//! emitted; only the write-through to the chat/combat log is gated.

use serde_json::Value;

use partyhub_domain::entities::{ChatMessage, CombatTurn, MessageType};
use partyhub_domain::ids::{CombatantId, PartyId};
use partyhub_domain::value_objects::Stat;
use partyhub_shared::ServerMessage;

use crate::app_state::AppState;
use crate::dispatch::{ability, dice_commands, initiative, who};
use crate::infrastructure::config::WsLogVerbosity;
use crate::infrastructure::error::CommandError;
use crate::party::live::ClientId;

/// What persisting a chat/combat-log row for this command would look like,
/// before the verbosity policy decides whether it actually happens.
pub struct PersistSpec {
    pub message_type: MessageType,
    pub content: String,
    pub extra_data: Option<Value>,
}

impl PersistSpec {
    pub fn new(message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            message_type,
            content: content.into(),
            extra_data: None,
        }
    }

    pub fn with_extra(mut self, extra_data: Value) -> Self {
        self.extra_data = Some(extra_data);
        self
    }
}

/// What a command handler produced: either a private reply to the sender
/// only (never persisted, never broadcast), or a party-wide broadcast with
/// an optional chat-log row and an optional combat-turn row — both subject
/// to `WS_LOG_VERBOSITY`.
pub enum Effect {
    Private(ServerMessage),
    Broadcast {
        message: ServerMessage,
        chat_row: Option<PersistSpec>,
        combat_turn: Option<CombatTurn>,
    },
    /// `VISIBILITY_POLICY = silent_ignore`: an SW-only command invoked by a
    /// player produces neither a broadcast nor a private reply.
    NoOp,
}

impl Effect {
    pub fn broadcast(message: ServerMessage) -> Self {
        Self::Broadcast {
            message,
            chat_row: None,
            combat_turn: None,
        }
    }

    pub fn broadcast_with_log(message: ServerMessage, chat_row: PersistSpec) -> Self {
        Self::Broadcast {
            message,
            chat_row: Some(chat_row),
            combat_turn: None,
        }
    }
}

fn should_persist(verbosity: WsLogVerbosity, message_type: MessageType) -> bool {
    match verbosity {
        WsLogVerbosity::Off => false,
        WsLogVerbosity::Minimal => matches!(message_type, MessageType::DiceRoll),
        WsLogVerbosity::Macros => true,
    }
}

/// Entry point called from the Party Hub for any frame whose `text` starts
/// with `/`. Holds the party's lock for the duration of the command,
/// matching §5's "macro execution is serialized" guarantee — no other
/// frame for this party runs concurrently with this one, suspension points
/// (store I/O) included.
pub async fn dispatch(
    state: &AppState,
    party_id: PartyId,
    client_id: ClientId,
    actor: &str,
    text: &str,
) -> Result<(), CommandError> {
    let live = state
        .registry
        .get(party_id)
        .ok_or(CommandError::InternalError)?;
    let mut guard = live.lock().await;

    let now = state.clock.now();
    let throttle_window = chrono::Duration::from_std(state.config.macro_throttle)
        .unwrap_or_else(|_| chrono::Duration::milliseconds(700));
    if !guard.check_and_record_throttle(actor, now, throttle_window) {
        guard.send_to_client(
            client_id,
            ServerMessage::System {
                text: "Slow down — wait a moment before your next command.".to_string(),
                party_id,
                timestamp: now,
            },
        );
        return Ok(());
    }

    let socket = guard
        .sockets
        .get(&client_id)
        .ok_or(CommandError::InternalError)?;
    let combatant = socket.combatant;
    let role = socket.role;
    let sender_is_sw = role.is_sw();

    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim();
    let command_lower = command.to_ascii_lowercase();

    let effect = match command_lower.as_str() {
        "/roll" => {
            let message = dice_commands::roll(state, party_id, actor, args).await?;
            Effect::broadcast_with_log(
                message,
                PersistSpec::new(MessageType::DiceRoll, format!("{actor} rolled {args}")),
            )
        }
        "/pp" | "/ip" | "/sp" => {
            let stat = match command_lower.as_str() {
                "/pp" => Stat::Pp,
                "/ip" => Stat::Ip,
                _ => Stat::Sp,
            };
            let message =
                dice_commands::stat_check(state, &mut guard, actor, combatant, stat).await?;
            Effect::broadcast_with_log(
                message,
                PersistSpec::new(MessageType::DiceRoll, format!("{actor} rolled /{stat}")),
            )
        }
        "/attack" => {
            let (message, turn) = dice_commands::attack(
                state,
                &mut guard,
                party_id,
                actor,
                combatant,
                sender_is_sw,
                args,
            )
            .await?;
            let detail = turn.detail.clone();
            Effect::Broadcast {
                message,
                chat_row: Some(
                    PersistSpec::new(
                        MessageType::Combat,
                        format!("{} attacked {}", turn.attacker_name, turn.defender_name),
                    )
                    .with_extra(detail),
                ),
                combat_turn: Some(turn),
            }
        }
        "/initiative" => {
            initiative::dispatch(state, &mut guard, party_id, actor, role, combatant, args).await?
        }
        "/who" => {
            let message = who::run(state, &guard, sender_is_sw).await?;
            Effect::Private(message)
        }
        _ => match combatant {
            Some(CombatantId::Character(character_id)) => {
                match state.store.ability_by_macro(character_id, command).await? {
                    Some(ability) => {
                        ability::cast(
                            state,
                            &mut guard,
                            party_id,
                            actor,
                            character_id,
                            sender_is_sw,
                            ability,
                            args,
                        )
                        .await?
                    }
                    None => {
                        return Err(CommandError::CommandUsageError(format!(
                            "Unknown command: {command}"
                        )))
                    }
                }
            }
            _ => {
                return Err(CommandError::CommandUsageError(format!(
                    "Unknown command: {command}"
                )))
            }
        },
    };

    match effect {
        Effect::NoOp => {}
        Effect::Private(message) => {
            guard.send_to_client(client_id, message);
        }
        Effect::Broadcast {
            message,
            chat_row,
            combat_turn,
        } => {
            if let Some(spec) = chat_row {
                if should_persist(state.config.ws_log_verbosity, spec.message_type) {
                    state
                        .store
                        .append_message(ChatMessage::new(
                            partyhub_domain::ids::ChatMessageId::new(),
                            party_id,
                            actor,
                            spec.message_type,
                            None,
                            spec.content,
                            spec.extra_data,
                            now,
                        ))
                        .await?;
                    if let Some(turn) = combat_turn {
                        state.store.append_combat_turn(turn).await?;
                    }
                }
            }
            guard.broadcast(&message);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use partyhub_domain::entities::{Party, PartyType};
    use partyhub_domain::ids::PartyId;
    use partyhub_shared::ClientMessage;

    use crate::app_state::AppState;
    use crate::infrastructure::clock::{FixedClock, FixedRandom};
    use crate::infrastructure::config::{AppConfig, VisibilityPolicy, WsLogVerbosity};
    use crate::infrastructure::persistence::InMemoryStore;
    use crate::party::hub;

    fn test_state(store: InMemoryStore, macro_throttle: Duration) -> AppState {
        AppState::new(
            Arc::new(store),
            Arc::new(FixedClock(chrono::Utc::now())),
            Arc::new(FixedRandom(3)),
            AppConfig {
                bind_addr: "0.0.0.0".to_string(),
                listen_port: 0,
                rust_log: "info".to_string(),
                macro_throttle,
                ws_log_verbosity: WsLogVerbosity::Macros,
                visibility_policy: VisibilityPolicy::Reject,
                ability_max_uses_per_level: 3,
            },
        )
    }

    /// §4.2/§6.3: an unrecognized `/` command with no bound character is a
    /// private `CommandUsageError`, never a broadcast.
    #[tokio::test]
    async fn unknown_command_is_private_reply() {
        let party_id = PartyId::new();
        let store = InMemoryStore::new();
        store.seed_party(Party::new(party_id, None, PartyType::Standard));
        let state = test_state(store, Duration::from_millis(700));

        let mut conn = hub::connect(&state, party_id, None, None).await.unwrap();
        let _join = conn.receiver.recv().await.unwrap();

        hub::handle_frame(
            &state,
            party_id,
            conn.client_id,
            ClientMessage::Message {
                actor: "Observer".to_string(),
                text: "/nonsense".to_string(),
                mode: None,
                context: None,
                encounter_id: None,
            },
        )
        .await;

        let msg = conn.receiver.recv().await.unwrap();
        match msg {
            ServerMessage::System { text, .. } => assert!(text.contains("Unknown command")),
            other => panic!("expected private System error, got {other:?}"),
        }
    }

    /// §4.2: a second macro from the same actor inside the throttle window
    /// is rejected with a private notice and never reaches a handler; after
    /// the window elapses (here: a zero-length window) it goes through.
    #[tokio::test]
    async fn throttle_rejects_rapid_repeat_macro() {
        let party_id = PartyId::new();
        let store = InMemoryStore::new();
        store.seed_party(Party::new(party_id, None, PartyType::Standard));
        let state = test_state(store, Duration::from_millis(700));

        let mut conn = hub::connect(&state, party_id, None, None).await.unwrap();
        let _join = conn.receiver.recv().await.unwrap();

        hub::handle_frame(
            &state,
            party_id,
            conn.client_id,
            ClientMessage::Message {
                actor: "Observer".to_string(),
                text: "/roll 1d6".to_string(),
                mode: None,
                context: None,
                encounter_id: None,
            },
        )
        .await;
        let _first = conn.receiver.recv().await.unwrap();

        hub::handle_frame(
            &state,
            party_id,
            conn.client_id,
            ClientMessage::Message {
                actor: "Observer".to_string(),
                text: "/roll 1d6".to_string(),
                mode: None,
                context: None,
                encounter_id: None,
            },
        )
        .await;

        let msg = conn.receiver.recv().await.unwrap();
        match msg {
            ServerMessage::System { text, .. } => assert!(text.contains("Slow down")),
            other => panic!("expected throttle notice, got {other:?}"),
        }
    }

    /// §6.3: `WS_LOG_VERBOSITY=off` still broadcasts `/roll`, it just skips
    /// the chat-log write-through.
    #[tokio::test]
    async fn off_verbosity_still_broadcasts_but_skips_persistence() {
        let party_id = PartyId::new();
        let store = InMemoryStore::new();
        store.seed_party(Party::new(party_id, None, PartyType::Standard));
        let mut state = test_state(store, Duration::from_millis(700));
        state.config = Arc::new(AppConfig {
            bind_addr: "0.0.0.0".to_string(),
            listen_port: 0,
            rust_log: "info".to_string(),
            macro_throttle: Duration::from_millis(0),
            ws_log_verbosity: WsLogVerbosity::Off,
            visibility_policy: VisibilityPolicy::Reject,
            ability_max_uses_per_level: 3,
        });

        let mut conn = hub::connect(&state, party_id, None, None).await.unwrap();
        let _join = conn.receiver.recv().await.unwrap();

        hub::handle_frame(
            &state,
            party_id,
            conn.client_id,
            ClientMessage::Message {
                actor: "Observer".to_string(),
                text: "/roll 1d6".to_string(),
                mode: None,
                context: None,
                encounter_id: None,
            },
        )
        .await;

        let msg = conn.receiver.recv().await.unwrap();
        assert!(matches!(msg, ServerMessage::DiceRoll { .. }));
    }
}
