//! Party Hub: admits sockets, bootstraps the stats cache, and routes inbound
//! frames to plain chat or the Macro Dispatcher — §4.1.

use tokio::sync::mpsc;

use partyhub_domain::entities::{ChatMessage, CharacterStatus, MessageType};
use partyhub_domain::ids::{CharacterId, CombatantId, PartyId, UserId};
use partyhub_domain::value_objects::ChatMode;
use partyhub_shared::{ClientMessage, ServerMessage};

use crate::app_state::AppState;
use crate::dispatch::dispatcher;
use crate::infrastructure::error::CommandError;
use crate::party::live::{ClientId, Snapshot, SocketHandle};

fn snapshot_status_label(status: CharacterStatus) -> String {
    match status {
        CharacterStatus::Active => "active".to_string(),
        CharacterStatus::Unconscious => "unconscious".to_string(),
        CharacterStatus::Dead => "dead".to_string(),
    }
}

/// Outcome of `connect`: the caller (the websocket task) owns the receiving
/// half of the channel and forwards everything it yields to the socket.
pub struct Connection {
    pub client_id: ClientId,
    pub receiver: mpsc::UnboundedReceiver<ServerMessage>,
    pub display_name: String,
}

pub async fn connect(
    state: &AppState,
    party_id: PartyId,
    character_id: Option<CharacterId>,
    user_id: Option<UserId>,
) -> Result<Connection, CommandError> {
    let party = state
        .store
        .load_party(party_id)
        .await?
        .ok_or_else(|| CommandError::InputError(format!("no such party: {party_id}")))?;

    let live = state
        .registry
        .get_or_create(party_id, party.party_type, party.story_weaver_user_id);

    let (tx, rx) = mpsc::unbounded_channel();
    let client_id = ClientId::new();

    let mut combatant = None;
    let mut display_name = "Observer".to_string();

    if let Some(character_id) = character_id {
        match state.store.load_character(character_id).await? {
            Some(character) if character.party_id == party_id => {
                display_name = character.name.clone();
                combatant = Some(CombatantId::Character(character.id));
                let snapshot = Snapshot {
                    combatant: CombatantId::Character(character.id),
                    name: character.name.clone(),
                    is_npc: false,
                    pp: character.stats.pp(),
                    ip: character.stats.ip(),
                    sp: character.stats.sp(),
                    edge: character.edge,
                    bap: character.bap,
                    level: character.level,
                    dp: character.dp,
                    dp_max: character.dp_max,
                    attack_style: character.attack_style.clone(),
                    defense_die: character.defense_die,
                    status: snapshot_status_label(character.status),
                    in_calling: character.in_calling,
                };
                let mut guard = live.lock().await;
                guard.cache.insert(CombatantId::Character(character.id), snapshot);
            }
            _ => {
                tracing::warn!(
                    %party_id, %character_id,
                    "connect: character_id not found or not a member of this party; admitting as unbound observer"
                );
            }
        }
    }

    let role = {
        let guard = live.lock().await;
        guard.role_for(user_id)
    };

    let socket = SocketHandle {
        client_id,
        user_id,
        combatant,
        display_name: display_name.clone(),
        role,
        sender: tx,
    };

    let join_message = ServerMessage::System {
        text: format!("{display_name} ({role}) joined the party"),
        party_id,
        timestamp: state.clock.now(),
    };

    {
        let mut guard = live.lock().await;
        guard.sockets.insert(client_id, socket);
        guard.broadcast(&join_message);
    }

    tracing::info!(%party_id, %client_id, actor = %display_name, "party hub: connected");

    Ok(Connection {
        client_id,
        receiver: rx,
        display_name,
    })
}

pub async fn disconnect(state: &AppState, party_id: PartyId, client_id: ClientId) {
    let Some(live) = state.registry.get(party_id) else {
        return;
    };

    let (leave_name, leave_role, vacated_combatant) = {
        let mut guard = live.lock().await;
        let Some(socket) = guard.sockets.remove(&client_id) else {
            return;
        };
        let still_bound = socket.combatant.is_some()
            && guard
                .sockets
                .values()
                .any(|s| s.combatant == socket.combatant);
        let vacated = if still_bound { None } else { socket.combatant };
        if let Some(combatant) = vacated {
            guard.cache.remove(&combatant);
        }
        (socket.display_name, socket.role, vacated)
    };
    let _ = vacated_combatant;

    let leave_message = ServerMessage::System {
        text: format!("{leave_name} ({leave_role}) left the party"),
        party_id,
        timestamp: state.clock.now(),
    };

    let is_empty = {
        let guard = live.lock().await;
        guard.broadcast(&leave_message);
        guard.is_empty()
    };

    if is_empty {
        state.registry.dispose_if_empty(party_id);
    }

    tracing::info!(%party_id, %client_id, actor = %leave_name, "party hub: disconnected");
}

/// Route one inbound frame. Errors never escape — the private reply is
/// sent directly to `client_id` and the function returns `Ok(())`
/// regardless, so a failed handler never breaks the socket read loop.
pub async fn handle_frame(
    state: &AppState,
    party_id: PartyId,
    client_id: ClientId,
    frame: ClientMessage,
) {
    let result = handle_frame_inner(state, party_id, client_id, frame).await;
    if let Err(err) = result {
        let wrapped = crate::infrastructure::error::CommandErrorWithCorrelation::new(err);
        tracing::warn!(%party_id, %client_id, error = %wrapped, "party hub: frame rejected");
        if let Some(live) = state.registry.get(party_id) {
            let guard = live.lock().await;
            guard.send_to_client(
                client_id,
                ServerMessage::System {
                    text: wrapped.reply_text(),
                    party_id,
                    timestamp: state.clock.now(),
                },
            );
        }
    }
}

/// A frame that failed to deserialize into a [`ClientMessage`] at all (bad
/// JSON, unknown `type`, missing fields) never reaches [`handle_frame`] —
/// this sends the same private `system` reply directly (§4.1/§7:
/// `InputError`, socket stays open).
pub async fn reject_malformed(
    state: &AppState,
    party_id: PartyId,
    client_id: ClientId,
    detail: impl std::fmt::Display,
) {
    let wrapped = crate::infrastructure::error::CommandErrorWithCorrelation::new(
        CommandError::InputError(detail.to_string()),
    );
    tracing::warn!(%party_id, %client_id, error = %wrapped, "party hub: malformed frame");
    if let Some(live) = state.registry.get(party_id) {
        let guard = live.lock().await;
        guard.send_to_client(
            client_id,
            ServerMessage::System {
                text: wrapped.reply_text(),
                party_id,
                timestamp: state.clock.now(),
            },
        );
    }
}

async fn handle_frame_inner(
    state: &AppState,
    party_id: PartyId,
    client_id: ClientId,
    frame: ClientMessage,
) -> Result<(), CommandError> {
    let ClientMessage::Message {
        actor,
        text,
        mode,
        context: _,
        encounter_id: _,
    } = frame
    else {
        return Err(CommandError::InputError("unknown frame type".to_string()));
    };

    if text.starts_with('/') {
        return dispatcher::dispatch(state, party_id, client_id, &actor, &text).await;
    }

    let live = state
        .registry
        .get(party_id)
        .ok_or_else(|| CommandError::InternalError)?;

    let default_mode = {
        let guard = live.lock().await;
        guard.party_type.default_chat_mode()
    };
    let resolved_mode = match mode.as_deref() {
        Some("OOC") | Some("ooc") => ChatMode::Ooc,
        Some("IC") | Some("ic") => ChatMode::Ic,
        _ => default_mode,
    };

    let chat_message = ServerMessage::Chat {
        actor: actor.clone(),
        text: text.clone(),
        mode: resolved_mode.to_string(),
        party_id,
        timestamp: state.clock.now(),
    };

    state
        .store
        .append_message(ChatMessage::new(
            partyhub_domain::ids::ChatMessageId::new(),
            party_id,
            actor,
            MessageType::Chat,
            Some(resolved_mode),
            text,
            None,
            state.clock.now(),
        ))
        .await?;

    let guard = live.lock().await;
    guard.broadcast(&chat_message);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use partyhub_domain::entities::{Party, PartyType};
    use partyhub_domain::ids::PartyId;
    use partyhub_domain::value_objects::StatBlock;

    use super::*;
    use crate::app_state::AppState;
    use crate::infrastructure::clock::{FixedClock, FixedRandom};
    use crate::infrastructure::config::{AppConfig, VisibilityPolicy, WsLogVerbosity};
    use crate::infrastructure::persistence::InMemoryStore;

    fn test_state(store: InMemoryStore) -> AppState {
        AppState::new(
            Arc::new(store),
            Arc::new(FixedClock(chrono::Utc::now())),
            Arc::new(FixedRandom(3)),
            AppConfig {
                bind_addr: "0.0.0.0".to_string(),
                listen_port: 0,
                rust_log: "info".to_string(),
                macro_throttle: Duration::from_millis(700),
                ws_log_verbosity: WsLogVerbosity::Macros,
                visibility_policy: VisibilityPolicy::Reject,
                ability_max_uses_per_level: 3,
            },
        )
    }

    /// §8: a bare connect with no character binds an "Observer" and still
    /// gets the join broadcast; a second connect sees both joins queued.
    #[tokio::test]
    async fn connect_with_no_character_joins_as_observer() {
        let party_id = PartyId::new();
        let store = InMemoryStore::new();
        store.seed_party(Party::new(party_id, None, PartyType::Standard));
        let state = test_state(store);

        let mut conn = connect(&state, party_id, None, None).await.unwrap();
        assert_eq!(conn.display_name, "Observer");

        let msg = conn.receiver.recv().await.unwrap();
        match msg {
            ServerMessage::System { text, .. } => {
                assert!(text.contains("Observer"));
                assert!(text.contains("joined the party"));
            }
            other => panic!("expected System join message, got {other:?}"),
        }
    }

    /// §4.1/§8: plain chat (no leading `/`) is persisted and broadcast
    /// verbatim to every connected socket, including the sender.
    #[tokio::test]
    async fn plain_chat_is_broadcast_and_persisted() {
        let party_id = PartyId::new();
        let store = InMemoryStore::new();
        store.seed_party(Party::new(party_id, None, PartyType::Standard));
        let state = test_state(store);

        let mut conn = connect(&state, party_id, None, None).await.unwrap();
        let _join = conn.receiver.recv().await.unwrap();

        handle_frame(
            &state,
            party_id,
            conn.client_id,
            ClientMessage::Message {
                actor: "Observer".to_string(),
                text: "hello party".to_string(),
                mode: None,
                context: None,
                encounter_id: None,
            },
        )
        .await;

        let msg = conn.receiver.recv().await.unwrap();
        match msg {
            ServerMessage::Chat { actor, text, mode, .. } => {
                assert_eq!(actor, "Observer");
                assert_eq!(text, "hello party");
                assert_eq!(mode, "IC");
            }
            other => panic!("expected Chat message, got {other:?}"),
        }
    }

    /// §4.3/§8: a slash command with an unresolvable `@target` never escapes
    /// `handle_frame` — the sender gets a private System reply instead.
    #[tokio::test]
    async fn attack_on_unknown_mention_sends_private_error_not_broadcast() {
        let party_id = PartyId::new();
        let store = InMemoryStore::new();
        store.seed_party(Party::new(party_id, None, PartyType::Standard));
        let character = partyhub_domain::entities::Character::new(
            CharacterId::new(),
            "Alice",
            UserId::new(),
            party_id,
            StatBlock::new(3, 2, 1).unwrap(),
            3,
            20,
            1,
            0,
            "1d6",
            0,
            0,
        )
        .unwrap();
        let character_id = character.id;
        store.seed_character(character);
        let state = test_state(store);

        let mut conn = connect(&state, party_id, Some(character_id), None)
            .await
            .unwrap();
        let _join = conn.receiver.recv().await.unwrap();

        handle_frame(
            &state,
            party_id,
            conn.client_id,
            ClientMessage::Message {
                actor: "Alice".to_string(),
                text: "/attack @Nobody".to_string(),
                mode: None,
                context: None,
                encounter_id: None,
            },
        )
        .await;

        let msg = conn.receiver.recv().await.unwrap();
        match msg {
            ServerMessage::System { text, .. } => {
                assert!(text.contains("Nobody"));
            }
            other => panic!("expected private System error, got {other:?}"),
        }
    }

    /// §4.1/§8: the last socket bound to a combatant disconnecting evicts
    /// its stats-cache snapshot and broadcasts the leave notice.
    #[tokio::test]
    async fn disconnect_last_socket_evicts_cache_and_broadcasts_leave() {
        let party_id = PartyId::new();
        let store = InMemoryStore::new();
        store.seed_party(Party::new(party_id, None, PartyType::Standard));
        let character = partyhub_domain::entities::Character::new(
            CharacterId::new(),
            "Alice",
            UserId::new(),
            party_id,
            StatBlock::new(3, 2, 1).unwrap(),
            3,
            20,
            1,
            0,
            "1d6",
            0,
            0,
        )
        .unwrap();
        let character_id = character.id;
        store.seed_character(character);
        let state = test_state(store);

        let mut conn = connect(&state, party_id, Some(character_id), None)
            .await
            .unwrap();
        let _join = conn.receiver.recv().await.unwrap();

        let live = state.registry.get(party_id).unwrap();
        {
            let guard = live.lock().await;
            assert!(guard.cache.contains_key(&CombatantId::Character(character_id)));
        }

        disconnect(&state, party_id, conn.client_id).await;

        let guard = live.lock().await;
        assert!(!guard.cache.contains_key(&CombatantId::Character(character_id)));
        assert!(guard.is_empty());
        drop(guard);

        // the registry disposes of an emptied party
        assert!(state.registry.get(party_id).is_none());
        let _ = conn.receiver.recv().await;
    }
}
