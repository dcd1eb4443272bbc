//! Level-gated tables: allowed attack styles, fixed defense die, ability
//! budgets, and the buff/debuff duration lookup. Character creation and the
//! `/attack` and ability handlers share these so the gate is defined once.

use crate::value_objects::dice::DiceFormula;

/// Attack-style notations a character of the given level may choose at
/// creation. Widens in dice count/size as level increases; levels are
/// clamped into `[1, 10]`.
pub fn allowed_attack_styles(level: u8) -> &'static [&'static str] {
    match level.clamp(1, 10) {
        1 | 2 => &["1d4", "1d6"],
        3 | 4 => &["1d6", "1d8", "2d4"],
        5 | 6 => &["1d8", "2d4", "2d6"],
        7 | 8 => &["2d6", "2d8", "3d4"],
        _ => &["2d8", "3d4", "3d6"],
    }
}

/// Whether `notation` is one of the attack styles allowed at `level`.
pub fn is_allowed_attack_style(level: u8, notation: &str) -> bool {
    allowed_attack_styles(level).contains(&notation)
}

/// The defense die fixed by level — on a schedule distinct from the attack
/// style table (die size only grows, dice count stays at 1).
pub fn defense_die_for_level(level: u8) -> DiceFormula {
    let size = match level.clamp(1, 10) {
        1 | 2 => 4,
        3 | 4 => 6,
        5 | 6 => 8,
        7 | 8 => 10,
        _ => 12,
    };
    DiceFormula::new(1, size, 0).expect("table sizes are always in ALLOWED_DIE_SIZES")
}

/// `max_uses = ABILITY_MAX_USES_PER_LEVEL * level`, default multiplier 3 per
/// spec §6.3; the multiplier is configurable at the engine layer, so it is
/// threaded through rather than hardcoded here.
pub fn max_uses(level: u8, uses_per_level: u8) -> u32 {
    level as u32 * uses_per_level as u32
}

/// Buff/debuff duration table: index `1..=6` maps to a signed round count,
/// positive for buffs and negative for debuffs. Round-by-round expiry is not
/// tracked; this value is recorded on the broadcast only.
pub fn buff_debuff_duration(index: u8, is_buff: bool) -> Option<i32> {
    if !(1..=6).contains(&index) {
        return None;
    }
    let magnitude = index as i32;
    Some(if is_buff { magnitude } else { -magnitude })
}
