//! `/roll`, `/pp`/`/ip`/`/sp`, and `/attack` — the Dice Engine–backed macros.

use partyhub_domain::entities::{CharacterStatus, CombatTurn};
use partyhub_domain::ids::{CombatantId, PartyId};
use partyhub_domain::value_objects::dice::{resolve_multi_die_attack, roll_die, DiceFormula};
use partyhub_domain::value_objects::Stat;
use partyhub_shared::{AttackRollEntry, ServerMessage};

use crate::app_state::AppState;
use crate::dispatch::mention;
use crate::infrastructure::error::CommandError;
use crate::party::live::PartyLive;

pub async fn roll(
    state: &AppState,
    party_id: PartyId,
    actor: &str,
    args: &str,
) -> Result<ServerMessage, CommandError> {
    let notation = args.trim();
    if notation.is_empty() {
        return Err(CommandError::CommandUsageError("/roll <notation>".to_string()));
    }
    let parsed = partyhub_domain::value_objects::dice::DiceNotation::parse(notation)
        .map_err(|e| CommandError::InputError(e.to_string()))?;
    let result = partyhub_domain::value_objects::dice::evaluate_with_rng(
        &parsed,
        &mut state.random_rng(),
    );
    let _ = party_id;
    Ok(ServerMessage::DiceRoll {
        actor: actor.to_string(),
        dice: result.formula.clone(),
        breakdown: result.rolls.clone(),
        modifier: result.modifier,
        result: result.total,
        text: result.breakdown_text(),
    })
}

/// `/pp`, `/ip`, `/sp` — 1d6 + stat + edge, using the cache when the sender
/// is bound to a character, placeholder Edge=1/stat=0 otherwise.
pub async fn stat_check(
    state: &AppState,
    live: &mut PartyLive,
    actor: &str,
    combatant: Option<CombatantId>,
    stat: Stat,
) -> Result<ServerMessage, CommandError> {
    let (stat_value, edge) = match combatant.and_then(|c| live.cache.get(&c)) {
        Some(snapshot) => {
            let value = match stat {
                Stat::Pp => snapshot.pp,
                Stat::Ip => snapshot.ip,
                Stat::Sp => snapshot.sp,
            };
            (value as i32, snapshot.edge)
        }
        None => (0, 1),
    };

    let formula = DiceFormula::new(1, 6, stat_value + edge)
        .map_err(|e| CommandError::InputError(e.to_string()))?;
    let roll = roll_die(6, &mut state.random_rng());
    let total = roll + formula.modifier;

    Ok(ServerMessage::StatRoll {
        actor: actor.to_string(),
        dice: formula.to_string(),
        breakdown: vec![roll],
        modifier: formula.modifier,
        result: total,
        text: format!("{formula} → ({roll}) + {} = {total}", formula.modifier),
        stat: stat.to_string(),
    })
}

/// `/attack @target` — resolve a multi-die attack using the sender's cached
/// `attack_style` against the target's `defense_die`, and persist the
/// resulting DP change and combat turn.
pub async fn attack(
    state: &AppState,
    live: &mut PartyLive,
    party_id: PartyId,
    actor: &str,
    combatant: Option<CombatantId>,
    sender_is_sw: bool,
    args: &str,
) -> Result<(ServerMessage, CombatTurn), CommandError> {
    if args.trim().is_empty() {
        return Err(CommandError::CommandUsageError("/attack @target".to_string()));
    }

    let attacker = combatant
        .and_then(|c| live.cache.get(&c).cloned())
        .ok_or_else(|| {
            CommandError::CommandUsageError(
                "/attack requires a bound character with an attack_style".to_string(),
            )
        })?;

    let target = mention::resolve_single(state, party_id, sender_is_sw, &live.cache, args).await?;
    let defender = live
        .ensure_combatant_snapshot(state.store.as_ref(), target.combatant)
        .await?;

    let attack_style = DiceFormula::parse_attack_style(&attacker.attack_style)
        .map_err(|e| CommandError::InputError(e))?;

    let mut rng = state.random_rng();
    let outcome = resolve_multi_die_attack(
        attack_style,
        attacker.pp as i32,
        attacker.edge,
        defender.defense_die,
        defender.pp as i32,
        defender.edge,
        0,
        &mut rng,
    );

    let new_dp = (defender.dp - outcome.total_damage).max(-99).min(defender.dp_max);
    let (new_status, enters_calling) = derive_status(new_dp);

    // Write-through before the cache mutation: if the store call fails, the
    // snapshot is left untouched rather than drifting ahead of what was
    // actually persisted (§4.4/§7: a failed write-through reverts, never
    // leaves a dangling in-memory mutation).
    match target.combatant {
        CombatantId::Character(character_id) => {
            state
                .store
                .update_character_dp(character_id, new_dp, new_status, enters_calling)
                .await?;
        }
        CombatantId::Npc(npc_id) => {
            let npc_status = if new_dp <= 0 {
                partyhub_domain::entities::NpcStatus::Unconscious
            } else {
                partyhub_domain::entities::NpcStatus::Active
            };
            state.store.update_npc_dp(npc_id, new_dp, npc_status).await?;
        }
    }

    if let Some(snapshot) = live.cache.get_mut(&target.combatant) {
        snapshot.dp = new_dp;
        snapshot.status = format!("{new_status:?}").to_lowercase();
        snapshot.in_calling = snapshot.in_calling || enters_calling;
    }

    let individual_rolls: Vec<AttackRollEntry> = outcome
        .dice
        .iter()
        .map(|d| AttackRollEntry {
            a: d.attack_roll,
            d: d.defense_total,
            margin: d.margin,
            damage: d.damage,
        })
        .collect();

    let narrative = format!(
        "{actor} attacks {} for {} damage ({}).",
        target.name, outcome.total_damage, outcome.outcome
    );

    let message = ServerMessage::CombatResult {
        attacker: actor.to_string(),
        defender: target.name.clone(),
        individual_rolls,
        total_damage: outcome.total_damage,
        outcome: outcome.outcome.to_string(),
        defender_new_dp: new_dp,
        narrative: narrative.clone(),
    };

    let detail = serde_json::to_value(&outcome).unwrap_or(serde_json::Value::Null);
    let turn = CombatTurn {
        id: partyhub_domain::ids::CombatTurnId::new(),
        party_id,
        attacker_name: actor.to_string(),
        defender_name: target.name,
        total_damage: outcome.total_damage,
        outcome: outcome.outcome.to_string(),
        detail,
        created_at: state.clock.now(),
    };

    Ok((message, turn))
}

/// DP-derived status and the `in_calling` flag transition — §3/§7: DP ≤ 0 is
/// unconscious, DP ≤ −10 additionally enters Calling (recorded here as a
/// flag only; the Calling flow itself is out of scope).
pub(crate) fn derive_status(dp: i32) -> (CharacterStatus, bool) {
    if dp <= partyhub_domain::entities::CALLING_DP_THRESHOLD {
        (CharacterStatus::Unconscious, true)
    } else if dp <= 0 {
        (CharacterStatus::Unconscious, false)
    } else {
        (CharacterStatus::Active, false)
    }
}

impl DiceFormula {
    /// Parse a cached `attack_style`/`defense_die` string (stored as plain
    /// `NdS` or `NdS+K` text) back into a formula. Kept local to dispatch
    /// since the domain type itself only exposes `DiceNotation::parse`,
    /// which also accepts bare integers — not valid here.
    fn parse_attack_style(raw: &str) -> Result<DiceFormula, String> {
        match partyhub_domain::value_objects::dice::DiceNotation::parse(raw) {
            Ok(partyhub_domain::value_objects::dice::DiceNotation::Dice(formula)) => Ok(formula),
            _ => Err(format!("invalid attack style notation: {raw}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use partyhub_domain::entities::PartyType;
    use partyhub_domain::ids::{CharacterId, PartyId};

    use super::*;
    use crate::app_state::AppState;
    use crate::infrastructure::clock::{FixedClock, FixedRandom};
    use crate::infrastructure::ports::{MockPersistencePort, PersistenceError};
    use crate::party::live::{PartyLive, Snapshot};

    fn snapshot(combatant: CombatantId, name: &str, dp: i32) -> Snapshot {
        Snapshot {
            combatant,
            name: name.to_string(),
            is_npc: false,
            pp: 2,
            ip: 2,
            sp: 2,
            edge: 1,
            bap: 0,
            level: 3,
            dp,
            dp_max: 20,
            attack_style: "1d6".to_string(),
            defense_die: DiceFormula::new(1, 6, 0).unwrap(),
            status: "active".to_string(),
            in_calling: false,
        }
    }

    /// §3/§7: DP ≤ 0 is unconscious; DP ≤ −10 additionally latches
    /// `in_calling`, never flips status to `Dead` (the Calling flow is out
    /// of scope, not a death).
    #[test]
    fn derive_status_thresholds() {
        assert_eq!(derive_status(1), (CharacterStatus::Active, false));
        assert_eq!(derive_status(0), (CharacterStatus::Unconscious, false));
        assert_eq!(derive_status(-9), (CharacterStatus::Unconscious, false));
        assert_eq!(derive_status(-10), (CharacterStatus::Unconscious, true));
        assert_eq!(derive_status(-50), (CharacterStatus::Unconscious, true));
    }

    /// §4.4/§7: when the store's write-through fails, the snapshot already
    /// mutated by a prior attempt must not drift ahead of what was actually
    /// persisted — the cache entry should remain exactly as it was before
    /// the failed call, not partially applied.
    #[tokio::test]
    async fn attack_leaves_cache_untouched_when_store_write_fails() {
        let mut store = MockPersistencePort::new();
        store
            .expect_list_party_characters()
            .returning(|_| Ok(Vec::new()));
        store
            .expect_list_party_npcs()
            .returning(|_, _| Ok(Vec::new()));
        store
            .expect_update_character_dp()
            .returning(|_, _, _, _| Err(PersistenceError::Unavailable("db down".to_string())));

        let state = AppState::new(
            Arc::new(store),
            Arc::new(FixedClock(chrono::Utc::now())),
            Arc::new(FixedRandom(1)),
            crate::infrastructure::config::AppConfig {
                bind_addr: "0.0.0.0".to_string(),
                listen_port: 0,
                rust_log: "info".to_string(),
                macro_throttle: std::time::Duration::from_millis(700),
                ws_log_verbosity: crate::infrastructure::config::WsLogVerbosity::Macros,
                visibility_policy: crate::infrastructure::config::VisibilityPolicy::Reject,
                ability_max_uses_per_level: 3,
            },
        );

        let party_id = PartyId::new();
        let mut live = PartyLive::new(party_id, PartyType::Standard, None);

        let attacker_id = CombatantId::Character(CharacterId::new());
        let defender_id = CombatantId::Character(CharacterId::new());
        live.cache.insert(attacker_id, snapshot(attacker_id, "Alice", 20));
        live.cache.insert(defender_id, snapshot(defender_id, "Goblin", 10));

        let err = attack(
            &state,
            &mut live,
            party_id,
            "Alice",
            Some(attacker_id),
            false,
            "@Goblin",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CommandError::StoreError(_)));
        assert_eq!(live.cache.get(&defender_id).unwrap().dp, 10);
    }
}
