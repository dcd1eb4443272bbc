//! Core domain types, value objects, and invariants for the party session
//! server: characters, NPCs, abilities, parties, encounters, chat messages,
//! dice notation, and the level-gated rule tables that tie them together.

pub mod entities;
pub mod error;
pub mod ids;
pub mod rules;
pub mod value_objects;

pub use error::DomainError;
pub use ids::{
    AbilityId, ChatMessageId, CharacterId, CombatTurnId, CombatantId, EncounterId,
    InitiativeRollId, NpcId, PartyId, UserId,
};
