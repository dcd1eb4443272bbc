//! Port traits for infrastructure boundaries: the Entity Store, and the
//! clock/random seams the Dice Engine and timestamping need for
//! deterministic tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use partyhub_domain::entities::{
    Ability, ChatMessage, Character, CharacterStatus, CombatTurn, Encounter, InitiativeRoll, Npc,
    Party,
};
use partyhub_domain::{AbilityId, CharacterId, EncounterId, NpcId, PartyId};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: &'static str, id: String },
    #[error("store unreachable: {0}")]
    Unavailable(String),
    #[error("store timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Narrow interface consumed by the core — §4.7. No handler depends on a
/// particular storage technology; `InMemoryStore` backs tests, a real
/// adapter (SQL, document store, whatever) would implement the same trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn load_party(&self, id: PartyId) -> Result<Option<Party>, PersistenceError>;
    async fn load_character(&self, id: CharacterId) -> Result<Option<Character>, PersistenceError>;
    async fn load_npc(&self, id: NpcId) -> Result<Option<Npc>, PersistenceError>;
    async fn list_party_characters(
        &self,
        party_id: PartyId,
    ) -> Result<Vec<Character>, PersistenceError>;
    async fn list_party_npcs(
        &self,
        party_id: PartyId,
        include_hidden: bool,
    ) -> Result<Vec<Npc>, PersistenceError>;
    async fn list_abilities(
        &self,
        character_id: CharacterId,
    ) -> Result<Vec<Ability>, PersistenceError>;

    async fn append_message(&self, row: ChatMessage) -> Result<(), PersistenceError>;
    async fn append_combat_turn(&self, row: CombatTurn) -> Result<(), PersistenceError>;

    async fn start_encounter(&self, party_id: PartyId) -> Result<EncounterId, PersistenceError>;
    async fn end_encounter(
        &self,
        id: EncounterId,
        restore_budgets: bool,
    ) -> Result<(), PersistenceError>;
    async fn upsert_initiative_roll(&self, row: InitiativeRoll) -> Result<(), PersistenceError>;
    async fn reset_ability_budgets(&self, party_id: PartyId) -> Result<(), PersistenceError>;
    async fn update_character_dp(
        &self,
        id: CharacterId,
        new_dp: i32,
        new_status: CharacterStatus,
        in_calling: bool,
    ) -> Result<(), PersistenceError>;
    async fn update_npc_dp(
        &self,
        id: NpcId,
        new_dp: i32,
        new_status: partyhub_domain::entities::NpcStatus,
    ) -> Result<(), PersistenceError>;
    async fn current_encounter(
        &self,
        party_id: PartyId,
    ) -> Result<Option<Encounter>, PersistenceError>;
    async fn list_initiative_rolls(
        &self,
        encounter_id: EncounterId,
    ) -> Result<Vec<InitiativeRoll>, PersistenceError>;
    async fn ability_by_macro(
        &self,
        character_id: CharacterId,
        macro_command: &str,
    ) -> Result<Option<Ability>, PersistenceError>;
    async fn save_ability(&self, ability: Ability) -> Result<(), PersistenceError>;
}

/// Seed hook the Dice Engine exposes for deterministic testing (spec.md's
/// Design Notes call this out explicitly): handlers draw randomness and
/// timestamps through these traits rather than calling `rand`/`Utc::now`
/// directly.
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait RandomPort: Send + Sync {
    fn gen_range(&self, min: i32, max: i32) -> i32;
    fn gen_uuid(&self) -> Uuid;
}
