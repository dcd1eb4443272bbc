//! NPCs: the same combat stat shape as a Character, plus SW-only authoring
//! fields (visibility, type, creator).

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{NpcId, PartyId, UserId};
use crate::rules;
use crate::value_objects::dice::DiceFormula;
use crate::value_objects::stat_block::StatBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpcType {
    Hostile,
    Neutral,
    Ally,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NpcStatus {
    Active,
    Unconscious,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Npc {
    pub id: NpcId,
    pub party_id: PartyId,
    pub name: String,
    pub stats: StatBlock,
    pub level: u8,
    pub dp: i32,
    pub dp_max: i32,
    pub edge: i32,
    pub bap: i32,
    pub attack_style: String,
    pub defense_die: DiceFormula,
    pub status: NpcStatus,
    pub visible_to_players: bool,
    pub npc_type: NpcType,
    pub creator_user_id: UserId,
}

impl Npc {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: NpcId,
        party_id: PartyId,
        name: impl Into<String>,
        stats: StatBlock,
        level: u8,
        dp_max: i32,
        edge: i32,
        bap: i32,
        attack_style: impl Into<String>,
        visible_to_players: bool,
        npc_type: NpcType,
        creator_user_id: UserId,
    ) -> Result<Self, DomainError> {
        if !(1..=10).contains(&level) {
            return Err(DomainError::validation(format!(
                "npc level must be in 1..=10, got {level}"
            )));
        }
        let attack_style = attack_style.into();
        if !rules::is_allowed_attack_style(level, &attack_style) {
            return Err(DomainError::constraint(format!(
                "attack style {attack_style} is not allowed at level {level}"
            )));
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("npc name must not be empty"));
        }

        Ok(Self {
            id,
            party_id,
            name,
            stats,
            level,
            dp: dp_max,
            dp_max,
            edge,
            bap,
            attack_style,
            defense_die: rules::defense_die_for_level(level),
            status: NpcStatus::Active,
            visible_to_players,
            npc_type,
            creator_user_id,
        })
    }

    pub fn apply_dp_delta(&mut self, delta: i32) {
        self.dp = (self.dp + delta).min(self.dp_max);
        if self.status != NpcStatus::Dead {
            self.status = if self.dp <= 0 {
                NpcStatus::Unconscious
            } else {
                NpcStatus::Active
            };
        }
    }

    /// Whether this NPC's name/snapshot may be shown to a non-SW viewer.
    pub fn visible_to(&self, viewer_is_sw: bool) -> bool {
        viewer_is_sw || self.visible_to_players
    }
}
