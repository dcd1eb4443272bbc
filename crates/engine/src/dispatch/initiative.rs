//! `/initiative` family — §4.6: rolling for one's own combatant, the Story
//! Weaver's on-behalf and silent variants, the per-viewer roster view, and
//! ending/clearing the encounter. `NoEncounter` and `Ended` are both the
//! absence of a current-encounter row, so either state starts a fresh one.

use std::collections::HashSet;

use partyhub_domain::entities::{sorted_roster, visible_roster, InitiativeRoll, MessageType};
use partyhub_domain::ids::{CombatantId, EncounterId, InitiativeRollId, PartyId};
use partyhub_domain::value_objects::dice::roll_die;
use partyhub_domain::value_objects::Role;
use partyhub_shared::ServerMessage;

use crate::app_state::AppState;
use crate::dispatch::dispatcher::{Effect, PersistSpec};
use crate::dispatch::mention;
use crate::infrastructure::config::VisibilityPolicy;
use crate::infrastructure::error::CommandError;
use crate::party::live::PartyLive;

pub async fn dispatch(
    state: &AppState,
    live: &mut PartyLive,
    party_id: PartyId,
    actor: &str,
    role: Role,
    combatant: Option<CombatantId>,
    args: &str,
) -> Result<Effect, CommandError> {
    let mut parts = args.trim().splitn(2, char::is_whitespace);
    let sub = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim();

    match sub {
        "" => roll_for_self(state, live, party_id, actor, role, combatant).await,
        "show" => show(state, live, role, combatant).await,
        "end" => end_or_clear(state, party_id, role, true).await,
        "clear" => end_or_clear(state, party_id, role, false).await,
        "silent" => roll_on_behalf(state, live, party_id, actor, role, rest, true).await,
        token if token.starts_with('@') => {
            roll_on_behalf(state, live, party_id, actor, role, args.trim(), false).await
        }
        _ => Err(CommandError::CommandUsageError(
            "/initiative [@target|silent @target|show|end|clear]".to_string(),
        )),
    }
}

async fn ensure_encounter(
    state: &AppState,
    party_id: PartyId,
) -> Result<EncounterId, CommandError> {
    if let Some(encounter) = state.store.current_encounter(party_id).await? {
        return Ok(encounter.id);
    }
    Ok(state.store.start_encounter(party_id).await?)
}

fn sw_gate(state: &AppState, role: Role) -> Option<Result<Effect, CommandError>> {
    if role.is_sw() {
        return None;
    }
    Some(match state.config.visibility_policy {
        VisibilityPolicy::Reject => Err(CommandError::PermissionError(
            "only the Story Weaver can do that".to_string(),
        )),
        VisibilityPolicy::SilentIgnore => Ok(Effect::NoOp),
    })
}

async fn roll_for_self(
    state: &AppState,
    live: &mut PartyLive,
    party_id: PartyId,
    actor: &str,
    role: Role,
    combatant: Option<CombatantId>,
) -> Result<Effect, CommandError> {
    let combatant = combatant.ok_or_else(|| {
        CommandError::CommandUsageError("/initiative requires a bound character".to_string())
    })?;
    let encounter_id = ensure_encounter(state, party_id).await?;

    let (edge, display_name) = live
        .cache
        .get(&combatant)
        .map(|s| (s.edge, s.name.clone()))
        .unwrap_or((0, actor.to_string()));
    let roll = roll_die(6, &mut state.random_rng());
    let total = roll + edge;

    let row = InitiativeRoll {
        id: InitiativeRollId::new(),
        encounter_id,
        combatant,
        display_name: display_name.clone(),
        roll_result: total,
        silent: false,
        rolled_by_sw: role.is_sw(),
    };
    state.store.upsert_initiative_roll(row).await?;

    let message = ServerMessage::Initiative {
        actor: actor.to_string(),
        dice: "1d6".to_string(),
        breakdown: vec![roll],
        modifier: edge,
        result: total,
        text: format!("1d6 → ({roll}) + {edge} = {total}"),
        silent: false,
        rolled_by_sw: role.is_sw(),
        combatant_name: display_name.clone(),
    };

    Ok(Effect::Broadcast {
        message,
        chat_row: Some(PersistSpec::new(
            MessageType::DiceRoll,
            format!("{display_name} rolled initiative: {total}"),
        )),
        combat_turn: None,
    })
}

/// SW-only: roll initiative on behalf of `@target`. A `silent` roll is
/// recorded like any other but is only delivered to the SW's own socket
/// (the `Effect::Private` the caller receives) and to whoever is bound to
/// the target combatant — never broadcast to the rest of the party.
async fn roll_on_behalf(
    state: &AppState,
    live: &mut PartyLive,
    party_id: PartyId,
    actor: &str,
    role: Role,
    mention_text: &str,
    silent: bool,
) -> Result<Effect, CommandError> {
    if let Some(gated) = sw_gate(state, role) {
        return gated;
    }
    if mention_text.trim().is_empty() {
        return Err(CommandError::CommandUsageError(
            "/initiative @target".to_string(),
        ));
    }

    let target = mention::resolve_single(state, party_id, true, &live.cache, mention_text).await?;
    let encounter_id = ensure_encounter(state, party_id).await?;

    let edge = live.cache.get(&target.combatant).map(|s| s.edge).unwrap_or(0);
    let roll = roll_die(6, &mut state.random_rng());
    let total = roll + edge;

    let row = InitiativeRoll {
        id: InitiativeRollId::new(),
        encounter_id,
        combatant: target.combatant,
        display_name: target.name.clone(),
        roll_result: total,
        silent,
        rolled_by_sw: true,
    };
    state.store.upsert_initiative_roll(row).await?;

    let message = ServerMessage::Initiative {
        actor: actor.to_string(),
        dice: "1d6".to_string(),
        breakdown: vec![roll],
        modifier: edge,
        result: total,
        text: format!("1d6 → ({roll}) + {edge} = {total}"),
        silent,
        rolled_by_sw: true,
        combatant_name: target.name.clone(),
    };

    if silent {
        live.send_to_combatant(target.combatant, message.clone());
        return Ok(Effect::Private(message));
    }

    Ok(Effect::Broadcast {
        message,
        chat_row: Some(PersistSpec::new(
            MessageType::DiceRoll,
            format!("{} rolled initiative: {total}", target.name),
        )),
        combat_turn: None,
    })
}

async fn show(
    state: &AppState,
    live: &PartyLive,
    role: Role,
    combatant: Option<CombatantId>,
) -> Result<Effect, CommandError> {
    let party_id = live.party_id;
    let encounter = state
        .store
        .current_encounter(party_id)
        .await?
        .ok_or_else(|| CommandError::StateError("no active encounter".to_string()))?;
    let rolls = state.store.list_initiative_rolls(encounter.id).await?;

    let tiebreak_of = |c: CombatantId| live.cache.get(&c).map(|s| (s.pp, s.ip, s.sp));
    let sorted = sorted_roster(&rolls, tiebreak_of);

    let hidden_npcs: HashSet<CombatantId> = state
        .store
        .list_party_npcs(party_id, true)
        .await?
        .into_iter()
        .filter(|npc| !npc.visible_to_players)
        .map(|npc| CombatantId::Npc(npc.id))
        .collect();
    let visible = visible_roster(&sorted, role.is_sw(), combatant, |c| hidden_npcs.contains(&c));

    let text = if visible.is_empty() {
        "No visible initiative entries.".to_string()
    } else {
        visible
            .iter()
            .enumerate()
            .map(|(i, roll)| {
                let marker = if roll.silent { " (silent)" } else { "" };
                format!("{}. {} — {}{}", i + 1, roll.display_name, roll.roll_result, marker)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    Ok(Effect::Private(ServerMessage::System {
        text,
        party_id,
        timestamp: state.clock.now(),
    }))
}

async fn end_or_clear(
    state: &AppState,
    party_id: PartyId,
    role: Role,
    restore_budgets: bool,
) -> Result<Effect, CommandError> {
    if let Some(gated) = sw_gate(state, role) {
        return gated;
    }
    let encounter = state
        .store
        .current_encounter(party_id)
        .await?
        .ok_or_else(|| CommandError::StateError("no active encounter to end".to_string()))?;
    state
        .store
        .end_encounter(encounter.id, restore_budgets)
        .await?;

    let verb = if restore_budgets { "ended" } else { "cleared" };
    let text = format!("The encounter has {verb}.");
    let message = ServerMessage::System {
        text: text.clone(),
        party_id,
        timestamp: state.clock.now(),
    };

    Ok(Effect::Broadcast {
        message,
        chat_row: Some(PersistSpec::new(MessageType::System, text)),
        combat_turn: None,
    })
}
