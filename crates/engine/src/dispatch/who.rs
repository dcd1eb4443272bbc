//! `/who` — a private roster snapshot: who's online, which party members are
//! offline, and which NPCs the sender is allowed to see. Supplemented beyond
//! the base macro set so players have a way to discover valid `@mention`
//! targets without asking the Story Weaver out of band.

use std::collections::HashSet;

use partyhub_domain::ids::CombatantId;
use partyhub_shared::ServerMessage;

use crate::app_state::AppState;
use crate::infrastructure::error::CommandError;
use crate::party::live::PartyLive;

pub async fn run(
    state: &AppState,
    live: &PartyLive,
    sender_is_sw: bool,
) -> Result<ServerMessage, CommandError> {
    let party_id = live.party_id;

    let mut online_names: Vec<String> = Vec::new();
    let mut online_combatants: HashSet<CombatantId> = HashSet::new();
    for socket in live.sockets.values() {
        online_names.push(format!("{} ({})", socket.display_name, socket.role));
        if let Some(combatant) = socket.combatant {
            online_combatants.insert(combatant);
        }
    }
    online_names.sort();
    online_names.dedup();

    let characters = state.store.list_party_characters(party_id).await?;
    let mut offline_names: Vec<String> = characters
        .iter()
        .filter(|c| !online_combatants.contains(&CombatantId::Character(c.id)))
        .map(|c| c.name.clone())
        .collect();
    offline_names.sort();

    let npcs = state.store.list_party_npcs(party_id, sender_is_sw).await?;
    let mut npc_names: Vec<String> = npcs
        .iter()
        .map(|n| {
            if n.visible_to_players {
                n.name.clone()
            } else {
                format!("{} (hidden)", n.name)
            }
        })
        .collect();
    npc_names.sort();

    let mut lines = Vec::new();
    lines.push(if online_names.is_empty() {
        "Online: (none)".to_string()
    } else {
        format!("Online: {}", online_names.join(", "))
    });
    lines.push(if offline_names.is_empty() {
        "Offline party members: (none)".to_string()
    } else {
        format!("Offline party members: {}", offline_names.join(", "))
    });
    lines.push(if npc_names.is_empty() {
        "NPCs: (none)".to_string()
    } else {
        format!("NPCs: {}", npc_names.join(", "))
    });

    Ok(ServerMessage::System {
        text: lines.join("\n"),
        party_id,
        timestamp: state.clock.now(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use partyhub_domain::entities::{Npc, Party, PartyType};
    use partyhub_domain::ids::{NpcId, PartyId, UserId};
    use partyhub_domain::value_objects::StatBlock;
    use partyhub_shared::ClientMessage;

    use crate::app_state::AppState;
    use crate::infrastructure::clock::{FixedClock, FixedRandom};
    use crate::infrastructure::config::{AppConfig, VisibilityPolicy, WsLogVerbosity};
    use crate::infrastructure::persistence::InMemoryStore;
    use crate::party::hub;

    fn test_state(store: InMemoryStore) -> AppState {
        AppState::new(
            Arc::new(store),
            Arc::new(FixedClock(chrono::Utc::now())),
            Arc::new(FixedRandom(3)),
            AppConfig {
                bind_addr: "0.0.0.0".to_string(),
                listen_port: 0,
                rust_log: "info".to_string(),
                macro_throttle: Duration::from_millis(0),
                ws_log_verbosity: WsLogVerbosity::Macros,
                visibility_policy: VisibilityPolicy::Reject,
                ability_max_uses_per_level: 3,
            },
        )
    }

    /// §supplemented `/who`: a player never sees a hidden NPC's name, only
    /// the fact that an NPC roster exists is omitted for them entirely.
    #[tokio::test]
    async fn player_does_not_see_hidden_npc() {
        let party_id = PartyId::new();
        let store = InMemoryStore::new();
        store.seed_party(Party::new(party_id, Some(UserId::new()), PartyType::Standard));
        store.seed_npc(
            Npc::new(
                NpcId::new(),
                party_id,
                "Lurking Shade",
                StatBlock::new(2, 2, 2).unwrap(),
                2,
                15,
                1,
                0,
                "1d6",
                false,
                partyhub_domain::entities::NpcType::Hostile,
                UserId::new(),
            )
            .unwrap(),
        );
        let state = test_state(store);

        let mut conn = hub::connect(&state, party_id, None, None).await.unwrap();
        let _join = conn.receiver.recv().await.unwrap();

        hub::handle_frame(
            &state,
            party_id,
            conn.client_id,
            ClientMessage::Message {
                actor: "Observer".to_string(),
                text: "/who".to_string(),
                mode: None,
                context: None,
                encounter_id: None,
            },
        )
        .await;

        let msg = conn.receiver.recv().await.unwrap();
        match msg {
            ServerMessage::System { text, .. } => {
                assert!(!text.contains("Lurking Shade"));
                assert!(text.contains("NPCs: (none)"));
            }
            other => panic!("expected private System reply, got {other:?}"),
        }
    }

    /// §supplemented `/who`: the Story Weaver sees hidden NPCs, flagged.
    #[tokio::test]
    async fn sw_sees_hidden_npc_flagged() {
        let sw_user = UserId::new();
        let party_id = PartyId::new();
        let store = InMemoryStore::new();
        store.seed_party(Party::new(party_id, Some(sw_user), PartyType::Standard));
        store.seed_npc(
            Npc::new(
                NpcId::new(),
                party_id,
                "Lurking Shade",
                StatBlock::new(2, 2, 2).unwrap(),
                2,
                15,
                1,
                0,
                "1d6",
                false,
                partyhub_domain::entities::NpcType::Hostile,
                UserId::new(),
            )
            .unwrap(),
        );
        let state = test_state(store);

        let mut conn = hub::connect(&state, party_id, None, Some(sw_user))
            .await
            .unwrap();
        let _join = conn.receiver.recv().await.unwrap();

        hub::handle_frame(
            &state,
            party_id,
            conn.client_id,
            ClientMessage::Message {
                actor: "Weaver".to_string(),
                text: "/who".to_string(),
                mode: None,
                context: None,
                encounter_id: None,
            },
        )
        .await;

        let msg = conn.receiver.recv().await.unwrap();
        match msg {
            ServerMessage::System { text, .. } => {
                assert!(text.contains("Lurking Shade (hidden)"));
            }
            other => panic!("expected private System reply, got {other:?}"),
        }
    }
}
