//! Ability macros — §4.4: a character's per-slot spell/technique/special,
//! invoked by its own `macro_command` (looked up by the dispatcher before
//! routing here), consuming a use from its level-scaled budget.

use partyhub_domain::entities::{Ability, CombatTurn, EffectType, MessageType};
use partyhub_domain::ids::{CharacterId, CombatTurnId, CombatantId, PartyId};
use partyhub_domain::rules;
use partyhub_domain::value_objects::dice::{resolve_multi_die_attack, roll_die};
use partyhub_domain::value_objects::Stat;
use partyhub_shared::ServerMessage;

use crate::app_state::AppState;
use crate::dispatch::dice_commands::derive_status;
use crate::dispatch::dispatcher::{Effect, PersistSpec};
use crate::dispatch::mention;
use crate::infrastructure::error::CommandError;
use crate::party::live::PartyLive;

/// Resolve and apply one `targets`-worth of an ability's effect, persist the
/// updated budget and any DP change, and build the broadcast.
pub async fn cast(
    state: &AppState,
    live: &mut PartyLive,
    party_id: PartyId,
    actor: &str,
    caster_id: CharacterId,
    sender_is_sw: bool,
    mut ability: Ability,
    args: &str,
) -> Result<Effect, CommandError> {
    if ability.uses_remaining == 0 {
        return Err(CommandError::BudgetError(format!(
            "{} has no uses remaining",
            ability.display_name
        )));
    }

    let caster_combatant = CombatantId::Character(caster_id);
    let caster_snapshot = live
        .cache
        .get(&caster_combatant)
        .cloned()
        .ok_or_else(|| CommandError::StateError("caster has no live stats".to_string()))?;
    let power = match ability.power_source {
        Stat::Pp => caster_snapshot.pp,
        Stat::Ip => caster_snapshot.ip,
        Stat::Sp => caster_snapshot.sp,
    } as i32;

    let targets = if ability.aoe {
        let resolution =
            mention::resolve(state, party_id, sender_is_sw, &live.cache, args).await?;
        if let Some((token, _)) = resolution.ambiguous.first() {
            return Err(CommandError::MentionError(format!(
                "@{token} is ambiguous; multiple matches found."
            )));
        }
        if resolution.mentions.is_empty() {
            return Err(CommandError::CommandUsageError(format!(
                "{} requires at least one @target",
                ability.macro_command
            )));
        }
        resolution.mentions
    } else {
        vec![mention::resolve_single(state, party_id, sender_is_sw, &live.cache, args).await?]
    };

    let is_buff = matches!(ability.effect_type, EffectType::Buff);
    let duration = rules::buff_debuff_duration(ability.slot.min(6), is_buff).unwrap_or(0);

    // Heal rolls once and applies the same magnitude to every target (§4.2:
    // "heal, AoE: same applied to each target"). Damage/buff/debuff are each
    // a contested roll per target (§4.2: "independent resolution") —
    // attacker ability die + power_source + edge against the target's own
    // defense_die + PP + edge, reusing the shared-defense-total attack
    // resolver since a single-die contested roll is that resolver with N=1.
    let heal_roll = roll_die(ability.die.size, &mut state.random_rng());
    let heal_magnitude = heal_roll + ability.die.modifier + power;

    let mut per_target = Vec::new();
    let mut total_damage = 0i32;
    for target in &targets {
        let entry = match ability.effect_type {
            EffectType::Damage => {
                let defender = live
                    .ensure_combatant_snapshot(state.store.as_ref(), target.combatant)
                    .await?;
                let mut rng = state.random_rng();
                let outcome = resolve_multi_die_attack(
                    ability.die,
                    power,
                    caster_snapshot.edge,
                    defender.defense_die,
                    defender.pp as i32,
                    defender.edge,
                    0,
                    &mut rng,
                );
                total_damage += outcome.total_damage;
                let new_dp = apply_dp_delta(state, live, target.combatant, -outcome.total_damage).await?;
                serde_json::json!({
                    "target": target.name,
                    "damage": outcome.total_damage,
                    "outcome": outcome.outcome.to_string(),
                    "new_dp": new_dp,
                })
            }
            EffectType::Heal => {
                let new_dp = apply_dp_delta(state, live, target.combatant, heal_magnitude).await?;
                serde_json::json!({ "target": target.name, "healed": heal_magnitude, "new_dp": new_dp })
            }
            EffectType::Buff | EffectType::Debuff => {
                let defender = live
                    .ensure_combatant_snapshot(state.store.as_ref(), target.combatant)
                    .await?;
                let mut rng = state.random_rng();
                let outcome = resolve_multi_die_attack(
                    ability.die,
                    power,
                    caster_snapshot.edge,
                    defender.defense_die,
                    defender.pp as i32,
                    defender.edge,
                    0,
                    &mut rng,
                );
                let succeeded = outcome.total_damage > 0;
                let delta = if !succeeded {
                    0
                } else if is_buff {
                    outcome.total_damage
                } else {
                    -outcome.total_damage
                };
                if succeeded {
                    if let Some(snapshot) = live.cache.get_mut(&target.combatant) {
                        snapshot.edge += delta;
                    }
                }
                serde_json::json!({
                    "target": target.name,
                    "succeeded": succeeded,
                    "edge_delta": delta,
                    "duration_rounds": if succeeded { duration } else { 0 },
                })
            }
            EffectType::Utility => {
                serde_json::json!({ "target": target.name })
            }
        };
        per_target.push(entry);
    }

    ability.consume_use()?;
    state.store.save_ability(ability.clone()).await?;

    let resolution = serde_json::json!({
        "effect_type": effect_type_label(ability.effect_type),
        "targets": per_target,
    });

    let target_names: Vec<String> = targets.iter().map(|t| t.name.clone()).collect();
    let message = ServerMessage::AbilityCast {
        caster: actor.to_string(),
        ability: ability.display_name.clone(),
        targets: target_names.clone(),
        resolution: resolution.clone(),
        uses_remaining: ability.uses_remaining,
    };

    let turn = CombatTurn {
        id: CombatTurnId::new(),
        party_id,
        attacker_name: actor.to_string(),
        defender_name: target_names.join(", "),
        total_damage,
        outcome: effect_type_label(ability.effect_type).to_string(),
        detail: resolution,
        created_at: state.clock.now(),
    };

    Ok(Effect::Broadcast {
        message,
        chat_row: Some(PersistSpec::new(
            MessageType::Combat,
            format!(
                "{actor} cast {} on {}",
                ability.display_name,
                target_names.join(", ")
            ),
        )),
        combat_turn: Some(turn),
    })
}

async fn apply_dp_delta(
    state: &AppState,
    live: &mut PartyLive,
    combatant: CombatantId,
    delta: i32,
) -> Result<i32, CommandError> {
    let snapshot = live
        .ensure_combatant_snapshot(state.store.as_ref(), combatant)
        .await?;
    let new_dp = (snapshot.dp + delta).max(-99).min(snapshot.dp_max);
    let (status, enters_calling) = derive_status(new_dp);

    // Write-through before the cache mutation — see the matching comment in
    // `dice_commands::attack`. A failed store call must never leave the
    // snapshot ahead of what was actually persisted.
    match combatant {
        CombatantId::Character(character_id) => {
            state
                .store
                .update_character_dp(character_id, new_dp, status, enters_calling)
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

    if let Some(snapshot) = live.cache.get_mut(&combatant) {
        snapshot.dp = new_dp;
        snapshot.status = format!("{status:?}").to_lowercase();
        snapshot.in_calling = snapshot.in_calling || enters_calling;
    }
    Ok(new_dp)
}

fn effect_type_label(effect_type: EffectType) -> &'static str {
    match effect_type {
        EffectType::Damage => "damage",
        EffectType::Heal => "heal",
        EffectType::Buff => "buff",
        EffectType::Debuff => "debuff",
        EffectType::Utility => "utility",
    }
}
