//! Dice notation parsing and rolling.
//!
//! Grammar (case-insensitive): `^\s*(\d+)?d(\d+)(\s*[+\-]\s*\d+)?\s*$`, or a
//! bare integer `^-?\d+$` for a fixed, no-dice value. `N` defaults to 1 when
//! omitted. `S` must be one of {4, 6, 8, 10, 12} — any other die size is
//! rejected rather than silently rolled.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Die sizes this system recognizes.
pub const ALLOWED_DIE_SIZES: [u8; 5] = [4, 6, 8, 10, 12];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceParseError {
    #[error("Empty dice notation")]
    Empty,
    #[error("Invalid dice notation: {0}")]
    InvalidFormat(String),
    #[error("Dice count must be at least 1")]
    InvalidDiceCount,
    #[error("Die size must be one of {ALLOWED_DIE_SIZES:?}, got {0}")]
    InvalidDieSize(u8),
}

/// A parsed `NdS+K` / `NdS-K` dice formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceFormula {
    pub count: u8,
    pub size: u8,
    pub modifier: i32,
}

/// A fully parsed macro argument: either a dice formula or a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiceNotation {
    Dice(DiceFormula),
    Flat(i32),
}

impl DiceFormula {
    pub fn new(count: u8, size: u8, modifier: i32) -> Result<Self, DiceParseError> {
        if count == 0 {
            return Err(DiceParseError::InvalidDiceCount);
        }
        if !ALLOWED_DIE_SIZES.contains(&size) {
            return Err(DiceParseError::InvalidDieSize(size));
        }
        Ok(Self {
            count,
            size,
            modifier,
        })
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier.cmp(&0) {
            std::cmp::Ordering::Equal => write!(f, "{}d{}", self.count, self.size),
            std::cmp::Ordering::Greater => {
                write!(f, "{}d{}+{}", self.count, self.size, self.modifier)
            }
            std::cmp::Ordering::Less => {
                write!(f, "{}d{}{}", self.count, self.size, self.modifier)
            }
        }
    }
}

impl fmt::Display for DiceNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dice(formula) => write!(f, "{formula}"),
            Self::Flat(value) => write!(f, "{value}"),
        }
    }
}

impl DiceNotation {
    /// Parse a macro argument per the grammar in the module docs.
    pub fn parse(input: &str) -> Result<Self, DiceParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DiceParseError::Empty);
        }

        // Bare integer form: `^-?\d+$`.
        if let Ok(value) = trimmed.parse::<i32>() {
            return Ok(Self::Flat(value));
        }

        let lower = trimmed.to_lowercase();
        let d_pos = lower
            .find('d')
            .ok_or_else(|| DiceParseError::InvalidFormat(input.to_string()))?;

        let count_str = lower[..d_pos].trim();
        let count: u8 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceParseError::InvalidFormat(input.to_string()))?
        };
        if count == 0 {
            return Err(DiceParseError::InvalidDiceCount);
        }

        let after_d = lower[d_pos + 1..].trim();
        let (size_str, modifier) = if let Some(plus_pos) = after_d.find('+') {
            let modifier: i32 = after_d[plus_pos + 1..]
                .trim()
                .parse()
                .map_err(|_| DiceParseError::InvalidFormat(input.to_string()))?;
            (after_d[..plus_pos].trim(), modifier)
        } else if let Some(minus_pos) = after_d.find('-') {
            let modifier: i32 = after_d[minus_pos + 1..]
                .trim()
                .parse()
                .map_err(|_| DiceParseError::InvalidFormat(input.to_string()))?;
            (after_d[..minus_pos].trim(), -modifier)
        } else {
            (after_d, 0)
        };

        let size: u8 = size_str
            .parse()
            .map_err(|_| DiceParseError::InvalidFormat(input.to_string()))?;

        Ok(Self::Dice(DiceFormula::new(count, size, modifier)?))
    }
}

/// Result of evaluating a `DiceNotation`, as returned by `/roll` and friends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRollResult {
    pub formula: String,
    pub rolls: Vec<i32>,
    pub modifier: i32,
    pub total: i32,
}

impl DiceRollResult {
    /// Render the `"2d6+3 → (3 + 1) + 3 = 7"` breakdown text used on broadcasts.
    pub fn breakdown_text(&self) -> String {
        if self.rolls.is_empty() {
            return format!("{} = {}", self.formula, self.total);
        }
        let rolls_str = self
            .rolls
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(" + ");
        if self.modifier == 0 {
            format!("{} → ({}) = {}", self.formula, rolls_str, self.total)
        } else if self.modifier > 0 {
            format!(
                "{} → ({}) + {} = {}",
                self.formula, rolls_str, self.modifier, self.total
            )
        } else {
            format!(
                "{} → ({}) - {} = {}",
                self.formula,
                rolls_str,
                -self.modifier,
                self.total
            )
        }
    }
}

/// Roll a single die of the given size using the supplied RNG.
///
/// Kept as a free function (rather than buried in `evaluate`) so combat and
/// ability resolution, which roll dice one at a time against a shared
/// defense total, can reuse the exact same source of randomness.
pub fn roll_die(size: u8, rng: &mut impl Rng) -> i32 {
    rng.gen_range(1..=size as i32)
}

/// Evaluate a parsed notation against an injected RNG — the seed hook spec.md
/// §9 asks for, so tests can supply a deterministic RNG instead of thread-local
/// randomness.
pub fn evaluate_with_rng(notation: &DiceNotation, rng: &mut impl Rng) -> DiceRollResult {
    match notation {
        DiceNotation::Flat(value) => DiceRollResult {
            formula: notation.to_string(),
            rolls: Vec::new(),
            modifier: 0,
            total: *value,
        },
        DiceNotation::Dice(formula) => {
            let rolls: Vec<i32> = (0..formula.count)
                .map(|_| roll_die(formula.size, rng))
                .collect();
            let total: i32 = rolls.iter().sum::<i32>() + formula.modifier;
            DiceRollResult {
                formula: formula.to_string(),
                rolls,
                modifier: formula.modifier,
                total,
            }
        }
    }
}

/// Convenience wrapper over [`evaluate_with_rng`] using the thread-local RNG.
pub fn evaluate(notation: &DiceNotation) -> DiceRollResult {
    evaluate_with_rng(notation, &mut rand::thread_rng())
}

/// Parse and evaluate in one step — what `/roll <notation>` calls.
pub fn evaluate_str(input: &str) -> Result<DiceRollResult, DiceParseError> {
    let notation = DiceNotation::parse(input)?;
    Ok(evaluate(&notation))
}

/// One attacker die's result against the shared defense total computed once
/// per `/attack`: §4.5's canonical "shared-defense-total" variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackDieResult {
    pub attack_roll: i32,
    pub defense_total: i32,
    pub margin: i32,
    pub damage: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackOutcome {
    Miss,
    PartialHit,
    FullHit,
}

impl fmt::Display for AttackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Miss => write!(f, "miss"),
            Self::PartialHit => write!(f, "partial_hit"),
            Self::FullHit => write!(f, "full_hit"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiDieAttackResult {
    pub defense_total: i32,
    pub dice: Vec<AttackDieResult>,
    pub total_damage: i32,
    pub outcome: AttackOutcome,
}

/// Resolve a basic attack per spec §4.5: one shared defense total rolled
/// once, and one attack die per `N` in the attacker's `attack_style`, each
/// die's margin over that shared total becoming its damage.
#[allow(clippy::too_many_arguments)]
pub fn resolve_multi_die_attack(
    attack_style: DiceFormula,
    attacker_stat_value: i32,
    attacker_edge: i32,
    defense_die: DiceFormula,
    defender_pp: i32,
    defender_edge: i32,
    bap_bonus: i32,
    rng: &mut impl Rng,
) -> MultiDieAttackResult {
    let defense_roll = roll_die(defense_die.size, rng);
    let defense_total =
        defense_roll + defense_die.modifier + defender_pp + defender_edge;

    let dice: Vec<AttackDieResult> = (0..attack_style.count)
        .map(|_| {
            let attack_roll = roll_die(attack_style.size, rng)
                + attack_style.modifier
                + attacker_stat_value
                + attacker_edge
                + bap_bonus;
            let margin = (attack_roll - defense_total).max(0);
            AttackDieResult {
                attack_roll,
                defense_total,
                margin,
                damage: margin,
            }
        })
        .collect();

    let total_damage: i32 = dice.iter().map(|d| d.damage).sum();
    let hits = dice.iter().filter(|d| d.damage > 0).count();
    let outcome = if hits == 0 {
        AttackOutcome::Miss
    } else if hits == dice.len() {
        AttackOutcome::FullHit
    } else {
        AttackOutcome::PartialHit
    };

    MultiDieAttackResult {
        defense_total,
        dice,
        total_damage,
        outcome,
    }
}
