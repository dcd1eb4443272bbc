pub mod ability;
pub mod chat_message;
pub mod character;
pub mod combat_turn;
pub mod encounter;
pub mod npc;
pub mod party;

pub use ability::{Ability, AbilityType, EffectType};
pub use chat_message::{ChatMessage, MessageType};
pub use character::{Character, CharacterStatus, CALLING_DP_THRESHOLD};
pub use combat_turn::CombatTurn;
pub use encounter::{sorted_roster, upsert_roll, visible_roster, Encounter, InitiativeRoll};
pub use npc::{Npc, NpcStatus, NpcType};
pub use party::{Party, PartyType};
