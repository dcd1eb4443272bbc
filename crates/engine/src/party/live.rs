//! `PartyLive`: the sockets, stats cache, and throttle clock for one party,
//! mutated only by whoever holds the party's lock (see [`super::registry`]).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use partyhub_domain::entities::PartyType;
use partyhub_domain::ids::{CombatantId, UserId};
use partyhub_domain::value_objects::{DiceFormula, Role};
use partyhub_shared::ServerMessage;

use crate::infrastructure::error::CommandError;
use crate::infrastructure::ports::PersistencePort;

/// Identifies one connected socket, independent of whether it is bound to a
/// character yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A connected socket: its outbound channel plus what it's bound to.
pub struct SocketHandle {
    pub client_id: ClientId,
    pub user_id: Option<UserId>,
    pub combatant: Option<CombatantId>,
    pub display_name: String,
    pub role: Role,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

/// Point-in-time copy of a character or NPC's combat stats — §4.1/§4.4.
/// Handlers mutate this directly; it is the authoritative value for the
/// life of the session and is write-through at every mutation point.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub combatant: CombatantId,
    pub name: String,
    pub is_npc: bool,
    pub pp: u8,
    pub ip: u8,
    pub sp: u8,
    pub edge: i32,
    pub bap: i32,
    pub level: u8,
    pub dp: i32,
    pub dp_max: i32,
    pub attack_style: String,
    pub defense_die: DiceFormula,
    pub status: String,
    pub in_calling: bool,
}

/// All state for one party, mutated from a single-owner context per §5 —
/// the registry hands out this struct behind a lock held for the duration
/// of one handler invocation, not across suspension points beyond that.
pub struct PartyLive {
    pub party_id: partyhub_domain::ids::PartyId,
    pub party_type: PartyType,
    pub sw_user_id: Option<UserId>,
    pub sockets: HashMap<ClientId, SocketHandle>,
    pub cache: HashMap<CombatantId, Snapshot>,
    throttle: HashMap<String, DateTime<Utc>>,
}

impl PartyLive {
    pub fn new(
        party_id: partyhub_domain::ids::PartyId,
        party_type: PartyType,
        sw_user_id: Option<UserId>,
    ) -> Self {
        Self {
            party_id,
            party_type,
            sw_user_id,
            sockets: HashMap::new(),
            cache: HashMap::new(),
            throttle: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    pub fn role_for(&self, user_id: Option<UserId>) -> Role {
        match (user_id, self.sw_user_id) {
            (Some(uid), Some(sw_uid)) if uid == sw_uid => Role::StoryWeaver,
            _ => Role::Player,
        }
    }

    /// Send to every connected socket. A send failing (receiver dropped) is
    /// not fatal to the fan-out — the socket's own read loop will notice the
    /// closed channel and disconnect.
    pub fn broadcast(&self, message: &ServerMessage) {
        for socket in self.sockets.values() {
            let _ = socket.sender.send(message.clone());
        }
    }

    pub fn broadcast_except(&self, message: &ServerMessage, exclude: ClientId) {
        for socket in self.sockets.values() {
            if socket.client_id == exclude {
                continue;
            }
            let _ = socket.sender.send(message.clone());
        }
    }

    pub fn send_to_client(&self, client_id: ClientId, message: ServerMessage) {
        if let Some(socket) = self.sockets.get(&client_id) {
            let _ = socket.sender.send(message);
        }
    }

    /// Send to every socket currently bound to the given combatant — used
    /// when a private reply should reach all of a character's connections,
    /// not just the one that sent the triggering frame.
    pub fn send_to_combatant(&self, combatant: CombatantId, message: ServerMessage) {
        for socket in self.sockets.values() {
            if socket.combatant == Some(combatant) {
                let _ = socket.sender.send(message.clone());
            }
        }
    }

    /// Soft rate limit check for `(party, actor)` — §4.2. Returns `true`
    /// (and records `now`) when the call is accepted; `false` when it
    /// arrives before `throttle_window` has elapsed since the last one.
    pub fn check_and_record_throttle(
        &mut self,
        actor: &str,
        now: DateTime<Utc>,
        throttle_window: chrono::Duration,
    ) -> bool {
        if let Some(last) = self.throttle.get(actor) {
            if now.signed_duration_since(*last) < throttle_window {
                return false;
            }
        }
        self.throttle.insert(actor.to_string(), now);
        true
    }

    /// Resolve a combatant's stats snapshot, loading an NPC from the store
    /// on a cache miss. The stats cache is socket-scoped for characters —
    /// presence of a character snapshot implies a live socket bound to it —
    /// but an NPC has no socket of its own and still needs to be a valid
    /// `/attack`/ability-cast target, so the first time one is targeted its
    /// snapshot is pulled from the store and kept in the cache from then on.
    pub async fn ensure_combatant_snapshot(
        &mut self,
        store: &dyn PersistencePort,
        combatant: CombatantId,
    ) -> Result<Snapshot, CommandError> {
        if let Some(existing) = self.cache.get(&combatant) {
            return Ok(existing.clone());
        }
        let CombatantId::Npc(npc_id) = combatant else {
            return Err(CommandError::StateError(
                "target has no live stats".to_string(),
            ));
        };
        let npc = store
            .load_npc(npc_id)
            .await?
            .ok_or_else(|| CommandError::StateError("target has no live stats".to_string()))?;
        let snapshot = Snapshot {
            combatant,
            name: npc.name.clone(),
            is_npc: true,
            pp: npc.stats.pp(),
            ip: npc.stats.ip(),
            sp: npc.stats.sp(),
            edge: npc.edge,
            bap: npc.bap,
            level: npc.level,
            dp: npc.dp,
            dp_max: npc.dp_max,
            attack_style: npc.attack_style.clone(),
            defense_die: npc.defense_die,
            status: format!("{:?}", npc.status).to_lowercase(),
            in_calling: false,
        };
        self.cache.insert(combatant, snapshot.clone());
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partyhub_domain::ids::PartyId;

    #[test]
    fn role_for_sw_user_id_is_story_weaver() {
        let sw = UserId::new();
        let live = PartyLive::new(PartyId::new(), PartyType::Standard, Some(sw));
        assert_eq!(live.role_for(Some(sw)), Role::StoryWeaver);
        assert_eq!(live.role_for(Some(UserId::new())), Role::Player);
        assert_eq!(live.role_for(None), Role::Player);
    }

    #[test]
    fn throttle_rejects_within_window_and_accepts_after() {
        let mut live = PartyLive::new(PartyId::new(), PartyType::Standard, None);
        let t0 = Utc::now();
        assert!(live.check_and_record_throttle("alice", t0, chrono::Duration::milliseconds(700)));
        let t1 = t0 + chrono::Duration::milliseconds(100);
        assert!(!live.check_and_record_throttle("alice", t1, chrono::Duration::milliseconds(700)));
        let t2 = t0 + chrono::Duration::milliseconds(800);
        assert!(live.check_and_record_throttle("alice", t2, chrono::Duration::milliseconds(700)));
    }
}
