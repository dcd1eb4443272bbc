//! In-memory `PersistencePort` adapter backing tests and local runs. A real
//! deployment would swap this for a SQL- or document-store-backed adapter
//! behind the same trait.

use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use partyhub_domain::entities::{
    Ability, ChatMessage, Character, CharacterStatus, CombatTurn, Encounter, InitiativeRoll, Npc,
    Party,
};
use partyhub_domain::{AbilityId, CharacterId, EncounterId, NpcId, PartyId};

use super::ports::{PersistenceError, PersistencePort};

/// Everything lives behind `DashMap`s keyed by id; `initiative_rolls` is
/// grouped by encounter since the roster is always read/written as a whole.
pub struct InMemoryStore {
    parties: DashMap<PartyId, Party>,
    characters: DashMap<CharacterId, Character>,
    npcs: DashMap<NpcId, Npc>,
    abilities: DashMap<AbilityId, Ability>,
    encounters: DashMap<EncounterId, Encounter>,
    current_encounter: DashMap<PartyId, EncounterId>,
    initiative_rolls: DashMap<EncounterId, Mutex<Vec<InitiativeRoll>>>,
    messages: Mutex<Vec<ChatMessage>>,
    combat_turns: Mutex<Vec<CombatTurn>>,
    /// §6.3 `ABILITY_MAX_USES_PER_LEVEL`, default 3 — the multiplier applied
    /// on `/initiative end` and `reset_ability_budgets`.
    ability_max_uses_per_level: u32,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self {
            parties: DashMap::new(),
            characters: DashMap::new(),
            npcs: DashMap::new(),
            abilities: DashMap::new(),
            encounters: DashMap::new(),
            current_encounter: DashMap::new(),
            initiative_rolls: DashMap::new(),
            messages: Mutex::new(Vec::new()),
            combat_turns: Mutex::new(Vec::new()),
            ability_max_uses_per_level: 3,
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ability_max_uses_per_level(mut self, multiplier: u32) -> Self {
        self.ability_max_uses_per_level = multiplier.max(1);
        self
    }

    pub fn seed_party(&self, party: Party) {
        self.parties.insert(party.id, party);
    }

    pub fn seed_character(&self, character: Character) {
        self.characters.insert(character.id, character);
    }

    pub fn seed_npc(&self, npc: Npc) {
        self.npcs.insert(npc.id, npc);
    }

    pub fn seed_ability(&self, ability: Ability) {
        self.abilities.insert(ability.id, ability);
    }
}

#[async_trait]
impl PersistencePort for InMemoryStore {
    async fn load_party(&self, id: PartyId) -> Result<Option<Party>, PersistenceError> {
        Ok(self.parties.get(&id).map(|entry| entry.clone()))
    }

    async fn load_character(&self, id: CharacterId) -> Result<Option<Character>, PersistenceError> {
        Ok(self.characters.get(&id).map(|entry| entry.clone()))
    }

    async fn load_npc(&self, id: NpcId) -> Result<Option<Npc>, PersistenceError> {
        Ok(self.npcs.get(&id).map(|entry| entry.clone()))
    }

    async fn list_party_characters(
        &self,
        party_id: PartyId,
    ) -> Result<Vec<Character>, PersistenceError> {
        Ok(self
            .characters
            .iter()
            .filter(|entry| entry.party_id == party_id)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn list_party_npcs(
        &self,
        party_id: PartyId,
        include_hidden: bool,
    ) -> Result<Vec<Npc>, PersistenceError> {
        Ok(self
            .npcs
            .iter()
            .filter(|entry| entry.party_id == party_id)
            .filter(|entry| include_hidden || entry.visible_to_players)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn list_abilities(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<Ability>, PersistenceError> {
        Ok(self
            .abilities
            .iter()
            .filter(|entry| entry.character_id == character_id)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn append_message(&self, row: ChatMessage) -> Result<(), PersistenceError> {
        let mut messages = self
            .messages
            .lock()
            .map_err(|_| PersistenceError::Unavailable("messages lock poisoned".into()))?;
        // §4.7: idempotent on (party_id, sender_name, created_at, content) — a
        // retried append after an ambiguous write-through failure must not
        // double the log.
        let key = row.idempotency_key();
        if messages.iter().any(|existing| existing.idempotency_key() == key) {
            return Ok(());
        }
        messages.push(row);
        Ok(())
    }

    async fn append_combat_turn(&self, row: CombatTurn) -> Result<(), PersistenceError> {
        self.combat_turns
            .lock()
            .map_err(|_| PersistenceError::Unavailable("combat_turns lock poisoned".into()))?
            .push(row);
        Ok(())
    }

    async fn start_encounter(&self, party_id: PartyId) -> Result<EncounterId, PersistenceError> {
        let id = EncounterId::from(Uuid::new_v4());
        let encounter = Encounter::start(id, party_id, chrono::Utc::now());
        self.encounters.insert(id, encounter);
        self.current_encounter.insert(party_id, id);
        self.initiative_rolls.insert(id, Mutex::new(Vec::new()));
        Ok(id)
    }

    async fn end_encounter(
        &self,
        id: EncounterId,
        restore_budgets: bool,
    ) -> Result<(), PersistenceError> {
        let mut entry = self
            .encounters
            .get_mut(&id)
            .ok_or(PersistenceError::NotFound {
                entity_type: "Encounter",
                id: id.to_string(),
            })?;
        entry.deactivate(chrono::Utc::now());
        let party_id = entry.party_id;
        drop(entry);
        self.current_encounter.remove(&party_id);

        if restore_budgets {
            for mut ability in self.abilities.iter_mut() {
                if let Some(character) = self.characters.get(&ability.character_id) {
                    let max_uses = partyhub_domain::rules::max_uses(character.level, self.ability_max_uses_per_level as u8).max(1);
                    ability.restore_uses(max_uses);
                }
            }
        }
        Ok(())
    }

    async fn upsert_initiative_roll(&self, row: InitiativeRoll) -> Result<(), PersistenceError> {
        let bucket = self
            .initiative_rolls
            .entry(row.encounter_id)
            .or_insert_with(|| Mutex::new(Vec::new()));
        let mut rolls = bucket
            .lock()
            .map_err(|_| PersistenceError::Unavailable("initiative lock poisoned".into()))?;
        partyhub_domain::entities::upsert_roll(&mut rolls, row);
        Ok(())
    }

    async fn reset_ability_budgets(&self, party_id: PartyId) -> Result<(), PersistenceError> {
        let character_ids: Vec<CharacterId> = self
            .characters
            .iter()
            .filter(|entry| entry.party_id == party_id)
            .map(|entry| entry.id)
            .collect();
        for mut ability in self.abilities.iter_mut() {
            if !character_ids.contains(&ability.character_id) {
                continue;
            }
            if let Some(character) = self.characters.get(&ability.character_id) {
                let max_uses = partyhub_domain::rules::max_uses(character.level, self.ability_max_uses_per_level as u8).max(1);
                ability.restore_uses(max_uses);
            }
        }
        Ok(())
    }

    async fn update_character_dp(
        &self,
        id: CharacterId,
        new_dp: i32,
        new_status: CharacterStatus,
        in_calling: bool,
    ) -> Result<(), PersistenceError> {
        let mut character = self
            .characters
            .get_mut(&id)
            .ok_or(PersistenceError::NotFound {
                entity_type: "Character",
                id: id.to_string(),
            })?;
        character.dp = new_dp;
        character.status = new_status;
        character.in_calling = character.in_calling || in_calling;
        Ok(())
    }

    async fn update_npc_dp(
        &self,
        id: NpcId,
        new_dp: i32,
        new_status: partyhub_domain::entities::NpcStatus,
    ) -> Result<(), PersistenceError> {
        let mut npc = self.npcs.get_mut(&id).ok_or(PersistenceError::NotFound {
            entity_type: "Npc",
            id: id.to_string(),
        })?;
        npc.dp = new_dp;
        npc.status = new_status;
        Ok(())
    }

    async fn current_encounter(
        &self,
        party_id: PartyId,
    ) -> Result<Option<Encounter>, PersistenceError> {
        let Some(encounter_id) = self.current_encounter.get(&party_id).map(|e| *e) else {
            return Ok(None);
        };
        Ok(self.encounters.get(&encounter_id).map(|entry| entry.clone()))
    }

    async fn list_initiative_rolls(
        &self,
        encounter_id: EncounterId,
    ) -> Result<Vec<InitiativeRoll>, PersistenceError> {
        let Some(bucket) = self.initiative_rolls.get(&encounter_id) else {
            return Ok(Vec::new());
        };
        let rolls = bucket
            .lock()
            .map_err(|_| PersistenceError::Unavailable("initiative lock poisoned".into()))?;
        Ok(rolls.clone())
    }

    async fn ability_by_macro(
        &self,
        character_id: CharacterId,
        macro_command: &str,
    ) -> Result<Option<Ability>, PersistenceError> {
        Ok(self
            .abilities
            .iter()
            .find(|entry| entry.character_id == character_id && entry.macro_command == macro_command)
            .map(|entry| entry.clone()))
    }

    async fn save_ability(&self, ability: Ability) -> Result<(), PersistenceError> {
        self.abilities.insert(ability.id, ability);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partyhub_domain::entities::{CharacterStatus, PartyType};
    use partyhub_domain::ids::UserId;
    use partyhub_domain::value_objects::stat_block::StatBlock;

    fn store_with_character() -> (InMemoryStore, Character) {
        let store = InMemoryStore::new();
        let party = Party::new(PartyId::new(), Some(UserId::new()), PartyType::Standard);
        let character = Character::new(
            CharacterId::new(),
            "Rin",
            UserId::new(),
            party.id,
            StatBlock::new(2, 2, 2).unwrap(),
            3,
            30,
            1,
            0,
            "1d6",
            0,
            0,
        )
        .unwrap();
        store.seed_party(party);
        store.seed_character(character.clone());
        (store, character)
    }

    #[tokio::test]
    async fn load_character_round_trips() {
        let (store, character) = store_with_character();
        let loaded = store.load_character(character.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Rin");
    }

    #[tokio::test]
    async fn update_character_dp_persists() {
        let (store, character) = store_with_character();
        store
            .update_character_dp(character.id, -5, CharacterStatus::Active, false)
            .await
            .unwrap();
        let loaded = store.load_character(character.id).await.unwrap().unwrap();
        assert_eq!(loaded.dp, -5);
    }

    /// §3: DP ≤ −10 latches `in_calling`; once set it must not clear on a
    /// later, less severe update.
    #[tokio::test]
    async fn update_character_dp_latches_in_calling() {
        let (store, character) = store_with_character();
        store
            .update_character_dp(character.id, -15, CharacterStatus::Unconscious, true)
            .await
            .unwrap();
        assert!(
            store
                .load_character(character.id)
                .await
                .unwrap()
                .unwrap()
                .in_calling
        );

        store
            .update_character_dp(character.id, 5, CharacterStatus::Active, false)
            .await
            .unwrap();
        assert!(
            store
                .load_character(character.id)
                .await
                .unwrap()
                .unwrap()
                .in_calling
        );
    }

    #[tokio::test]
    async fn start_and_end_encounter_tracks_current() {
        let (store, character) = store_with_character();
        let encounter_id = store.start_encounter(character.party_id).await.unwrap();
        assert!(store
            .current_encounter(character.party_id)
            .await
            .unwrap()
            .is_some());
        store.end_encounter(encounter_id, true).await.unwrap();
        assert!(store
            .current_encounter(character.party_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn ability_by_macro_finds_seeded_ability() {
        let (store, character) = store_with_character();
        let ability = Ability::new(
            AbilityId::new(),
            character.id,
            1,
            partyhub_domain::entities::AbilityType::Spell,
            "Firebolt",
            "/firebolt",
            partyhub_domain::value_objects::stat_block::Stat::Ip,
            partyhub_domain::entities::EffectType::Damage,
            partyhub_domain::value_objects::dice::DiceFormula::new(2, 6, 0).unwrap(),
            false,
            3,
        )
        .unwrap();
        store.seed_ability(ability);
        let found = store
            .ability_by_macro(character.id, "/firebolt")
            .await
            .unwrap();
        assert!(found.is_some());
    }

    /// §4.7: `append_message` is idempotent on (party_id, sender_name,
    /// created_at, content) — a retried append after an ambiguous
    /// write-through outcome must not double the log.
    #[tokio::test]
    async fn append_message_dedupes_identical_retry() {
        let (store, character) = store_with_character();
        let now = chrono::Utc::now();
        let row = ChatMessage::new(
            partyhub_domain::ids::ChatMessageId::new(),
            character.party_id,
            "Rin",
            partyhub_domain::entities::MessageType::Chat,
            None,
            "hello",
            None,
            now,
        );
        store.append_message(row.clone()).await.unwrap();
        let mut retry = row.clone();
        retry.id = partyhub_domain::ids::ChatMessageId::new();
        store.append_message(retry).await.unwrap();

        assert_eq!(store.messages.lock().unwrap().len(), 1);
    }
}
