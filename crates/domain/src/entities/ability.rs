//! Character abilities: spells, techniques, and special maneuvers invoked by
//! a per-character slash macro.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{AbilityId, CharacterId};
use crate::value_objects::dice::DiceFormula;
use crate::value_objects::stat_block::Stat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityType {
    Spell,
    Technique,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
    Damage,
    Heal,
    Buff,
    Debuff,
    Utility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ability {
    pub id: AbilityId,
    pub character_id: CharacterId,
    pub slot: u8,
    pub ability_type: AbilityType,
    pub display_name: String,
    pub macro_command: String,
    pub power_source: Stat,
    pub effect_type: EffectType,
    pub die: DiceFormula,
    pub aoe: bool,
    pub max_uses: u32,
    pub uses_remaining: u32,
}

impl Ability {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: AbilityId,
        character_id: CharacterId,
        slot: u8,
        ability_type: AbilityType,
        display_name: impl Into<String>,
        macro_command: impl Into<String>,
        power_source: Stat,
        effect_type: EffectType,
        die: DiceFormula,
        aoe: bool,
        max_uses: u32,
    ) -> Result<Self, DomainError> {
        if !(1..=5).contains(&slot) {
            return Err(DomainError::validation(format!(
                "ability slot must be in 1..=5, got {slot}"
            )));
        }
        let macro_command = macro_command.into();
        if !macro_command.starts_with('/') {
            return Err(DomainError::validation(
                "ability macro_command must start with '/'",
            ));
        }
        let display_name = display_name.into();
        if display_name.trim().is_empty() {
            return Err(DomainError::validation(
                "ability display_name must not be empty",
            ));
        }

        Ok(Self {
            id,
            character_id,
            slot,
            ability_type,
            display_name,
            macro_command,
            power_source,
            effect_type,
            die,
            aoe,
            max_uses,
            uses_remaining: max_uses,
        })
    }

    /// Decrement `uses_remaining` on a successful cast.
    ///
    /// Returns `Err` (no mutation) if the budget is already exhausted — the
    /// dispatcher's `BudgetError` path checks this before calling, so this
    /// is a defense against misuse rather than the primary guard.
    pub fn consume_use(&mut self) -> Result<(), DomainError> {
        if self.uses_remaining == 0 {
            return Err(DomainError::constraint(format!(
                "ability {} has no uses remaining",
                self.macro_command
            )));
        }
        self.uses_remaining -= 1;
        Ok(())
    }

    /// Reset to full budget, `3 * level` (or whatever multiplier the caller
    /// passes) — called on every character at `/initiative end`.
    pub fn restore_uses(&mut self, max_uses: u32) {
        self.max_uses = max_uses;
        self.uses_remaining = max_uses;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(max_uses: u32) -> Ability {
        Ability::new(
            AbilityId::new(),
            CharacterId::new(),
            1,
            AbilityType::Spell,
            "Firebolt",
            "/firebolt",
            Stat::Ip,
            EffectType::Damage,
            DiceFormula::new(2, 6, 0).unwrap(),
            false,
            max_uses,
        )
        .unwrap()
    }

    #[test]
    fn rejects_macro_command_without_slash() {
        let err = Ability::new(
            AbilityId::new(),
            CharacterId::new(),
            1,
            AbilityType::Spell,
            "Firebolt",
            "firebolt",
            Stat::Ip,
            EffectType::Damage,
            DiceFormula::new(2, 6, 0).unwrap(),
            false,
            3,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn consume_use_decrements_and_errors_at_zero() {
        let mut ability = make(1);
        ability.consume_use().unwrap();
        assert_eq!(ability.uses_remaining, 0);
        assert!(ability.consume_use().is_err());
    }

    #[test]
    fn restore_uses_resets_to_new_max() {
        let mut ability = make(3);
        ability.consume_use().unwrap();
        ability.restore_uses(6);
        assert_eq!(ability.uses_remaining, 6);
        assert_eq!(ability.max_uses, 6);
    }
}
