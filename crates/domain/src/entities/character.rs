//! Player characters: the combat-stat record bound to a user within a party.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{CharacterId, PartyId, UserId};
use crate::rules;
use crate::value_objects::dice::DiceFormula;
use crate::value_objects::stat_block::StatBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterStatus {
    Active,
    Unconscious,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub owning_user_id: UserId,
    pub party_id: PartyId,
    pub stats: StatBlock,
    pub level: u8,
    pub dp: i32,
    pub dp_max: i32,
    pub edge: i32,
    pub bap: i32,
    pub attack_style: String,
    pub defense_die: DiceFormula,
    pub status: CharacterStatus,
    pub in_calling: bool,
    pub weapon_bonus: i32,
    pub armor_bonus: i32,
}

/// DP threshold at which `in_calling` is set; spec §3 records the flag
/// transition but leaves the Calling flow itself out of scope.
pub const CALLING_DP_THRESHOLD: i32 = -10;

impl Character {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: CharacterId,
        name: impl Into<String>,
        owning_user_id: UserId,
        party_id: PartyId,
        stats: StatBlock,
        level: u8,
        dp_max: i32,
        edge: i32,
        bap: i32,
        attack_style: impl Into<String>,
        weapon_bonus: i32,
        armor_bonus: i32,
    ) -> Result<Self, DomainError> {
        if !(1..=10).contains(&level) {
            return Err(DomainError::validation(format!(
                "character level must be in 1..=10, got {level}"
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
            return Err(DomainError::validation("character name must not be empty"));
        }

        Ok(Self {
            id,
            name,
            owning_user_id,
            party_id,
            stats,
            level,
            dp: dp_max,
            dp_max,
            edge,
            bap,
            attack_style,
            defense_die: rules::defense_die_for_level(level),
            status: CharacterStatus::Active,
            in_calling: false,
            weapon_bonus,
            armor_bonus,
        })
    }

    /// Apply a DP delta (positive heal, negative damage), clamp to
    /// `[.., dp_max]`, and derive `status`/`in_calling`. Only the heal
    /// ceiling is fixed here; damage has no floor at this layer.
    pub fn apply_dp_delta(&mut self, delta: i32) {
        self.dp = (self.dp + delta).min(self.dp_max);
        self.recompute_status();
    }

    fn recompute_status(&mut self) {
        if self.status == CharacterStatus::Dead {
            return;
        }
        if self.dp <= CALLING_DP_THRESHOLD {
            self.in_calling = true;
            self.status = CharacterStatus::Unconscious;
        } else if self.dp <= 0 {
            self.status = CharacterStatus::Unconscious;
        } else {
            self.status = CharacterStatus::Active;
        }
    }

    pub fn max_ability_uses(&self, uses_per_level: u8) -> u32 {
        rules::max_uses(self.level, uses_per_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(level: u8, attack_style: &str) -> Result<Character, DomainError> {
        Character::new(
            CharacterId::new(),
            "Alice",
            UserId::new(),
            PartyId::new(),
            StatBlock::new(3, 2, 1).unwrap(),
            level,
            20,
            2,
            1,
            attack_style,
            0,
            0,
        )
    }

    #[test]
    fn rejects_attack_style_not_allowed_at_level() {
        assert!(make(1, "3d6").is_err());
        assert!(make(1, "1d4").is_ok());
    }

    #[test]
    fn dp_heal_clamps_to_max() {
        let mut c = make(3, "1d6").unwrap();
        c.apply_dp_delta(-15);
        c.apply_dp_delta(100);
        assert_eq!(c.dp, c.dp_max);
    }

    #[test]
    fn dp_at_or_below_zero_is_unconscious() {
        let mut c = make(3, "1d6").unwrap();
        c.apply_dp_delta(-c.dp_max);
        assert_eq!(c.status, CharacterStatus::Unconscious);
    }

    #[test]
    fn dp_at_or_below_minus_ten_enters_calling() {
        let mut c = make(3, "1d6").unwrap();
        c.apply_dp_delta(-(c.dp_max + 10));
        assert!(c.in_calling);
        assert_eq!(c.status, CharacterStatus::Unconscious);
    }
}
