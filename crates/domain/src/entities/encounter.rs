//! Encounter lifecycle and the initiative roster it holds.
//!
//! Per-party state machine: `NoEncounter -> Open -> Ended`. `NoEncounter` is
//! represented by the absence of an `Encounter` record for the party rather
//! than as a variant here — the engine layer tracks "current encounter id,
//! if any" per party.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CombatantId, EncounterId, InitiativeRollId, PartyId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encounter {
    pub id: EncounterId,
    pub party_id: PartyId,
    pub active: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Encounter {
    pub fn start(id: EncounterId, party_id: PartyId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            party_id,
            active: true,
            started_at: now,
            ended_at: None,
        }
    }

    /// `/initiative end` and `/initiative clear` both call this; the
    /// distinction between the two is whether the caller also resets
    /// ability budgets, which this entity does not know about.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.active = false;
        self.ended_at = Some(now);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiativeRoll {
    pub id: InitiativeRollId,
    pub encounter_id: EncounterId,
    pub combatant: CombatantId,
    pub display_name: String,
    pub roll_result: i32,
    pub silent: bool,
    pub rolled_by_sw: bool,
}

/// Roster order for `/initiative show`: `roll_result` descending; ties
/// broken by the combatant's base-stat tiebreak key descending, then by
/// original (insertion) position for full stability.
///
/// `tiebreak_key_of` returns `None` for a combatant whose stats aren't
/// resolvable (e.g. the underlying character was deleted mid-encounter);
/// such entries sort after every entry with a known key.
pub fn sorted_roster<'a>(
    rolls: &'a [InitiativeRoll],
    tiebreak_key_of: impl Fn(CombatantId) -> Option<(u8, u8, u8)>,
) -> Vec<&'a InitiativeRoll> {
    let mut indexed: Vec<(usize, &InitiativeRoll)> = rolls.iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| {
        b.roll_result
            .cmp(&a.roll_result)
            .then_with(|| tiebreak_key_of(b.combatant).cmp(&tiebreak_key_of(a.combatant)))
            .then_with(|| ia.cmp(ib))
    });
    indexed.into_iter().map(|(_, roll)| roll).collect()
}

/// Apply the latest-wins rule for repeat `/initiative` calls by the same
/// combatant within one encounter, then insert the new roll.
pub fn upsert_roll(rolls: &mut Vec<InitiativeRoll>, new_roll: InitiativeRoll) {
    rolls.retain(|r| r.combatant != new_roll.combatant);
    rolls.push(new_roll);
}

/// Role-filtered view for `/initiative show`: a player never sees a
/// `silent=true` entry that isn't their own, nor an entry for an NPC the SW
/// has marked hidden.
pub fn visible_roster<'a>(
    roster: &[&'a InitiativeRoll],
    viewer_is_sw: bool,
    viewer_combatant: Option<CombatantId>,
    is_hidden_npc: impl Fn(CombatantId) -> bool,
) -> Vec<&'a InitiativeRoll> {
    if viewer_is_sw {
        return roster.to_vec();
    }
    roster
        .iter()
        .filter(|roll| {
            let owned_by_viewer = Some(roll.combatant) == viewer_combatant;
            if roll.silent && !owned_by_viewer {
                return false;
            }
            !is_hidden_npc(roll.combatant)
        })
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{CharacterId, NpcId};

    fn roll(combatant: CombatantId, roll_result: i32, silent: bool) -> InitiativeRoll {
        InitiativeRoll {
            id: InitiativeRollId::new(),
            encounter_id: EncounterId::new(),
            combatant,
            display_name: "x".into(),
            roll_result,
            silent,
            rolled_by_sw: false,
        }
    }

    #[test]
    fn sorts_by_roll_result_descending() {
        let a = CombatantId::Character(CharacterId::new());
        let b = CombatantId::Character(CharacterId::new());
        let rolls = vec![roll(a, 3, false), roll(b, 9, false)];
        let sorted = sorted_roster(&rolls, |_| Some((1, 1, 1)));
        assert_eq!(sorted[0].roll_result, 9);
    }

    #[test]
    fn ties_broken_by_stat_key_then_insertion_order() {
        let a = CombatantId::Character(CharacterId::new());
        let b = CombatantId::Character(CharacterId::new());
        let c = CombatantId::Character(CharacterId::new());
        let rolls = vec![roll(a, 5, false), roll(b, 5, false), roll(c, 5, false)];
        let keys = [(a, (3, 2, 1)), (b, (3, 2, 1)), (c, (2, 2, 2))];
        let sorted = sorted_roster(&rolls, |id| {
            keys.iter().find(|(k, _)| *k == id).map(|(_, v)| *v)
        });
        // a and b tie on roll and stat key, so insertion order (a before b) wins;
        // c has a lower stat key so sorts last despite equal roll_result.
        assert_eq!(sorted[0].combatant, a);
        assert_eq!(sorted[1].combatant, b);
        assert_eq!(sorted[2].combatant, c);
    }

    #[test]
    fn upsert_replaces_prior_roll_for_same_combatant() {
        let who = CombatantId::Npc(NpcId::new());
        let mut rolls = vec![roll(who, 2, false)];
        upsert_roll(&mut rolls, roll(who, 8, false));
        assert_eq!(rolls.len(), 1);
        assert_eq!(rolls[0].roll_result, 8);
    }

    #[test]
    fn player_view_hides_silent_entries_not_their_own() {
        let mine = CombatantId::Character(CharacterId::new());
        let theirs = CombatantId::Character(CharacterId::new());
        let rolls = vec![roll(mine, 5, true), roll(theirs, 4, true)];
        let refs: Vec<&InitiativeRoll> = rolls.iter().collect();
        let visible = visible_roster(&refs, false, Some(mine), |_| false);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].combatant, mine);
    }

    #[test]
    fn player_view_hides_hidden_npc_entries() {
        let npc = CombatantId::Npc(NpcId::new());
        let rolls = vec![roll(npc, 6, false)];
        let refs: Vec<&InitiativeRoll> = rolls.iter().collect();
        let visible = visible_roster(&refs, false, None, |_| true);
        assert!(visible.is_empty());
    }

    #[test]
    fn sw_view_sees_everything() {
        let npc = CombatantId::Npc(NpcId::new());
        let rolls = vec![roll(npc, 6, true)];
        let refs: Vec<&InitiativeRoll> = rolls.iter().collect();
        let visible = visible_roster(&refs, true, None, |_| true);
        assert_eq!(visible.len(), 1);
    }
}
