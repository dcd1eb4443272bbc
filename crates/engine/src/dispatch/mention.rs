//! Mention Resolver — §4.3: turns `@token`s in free text into combatants,
//! preferring the live stats cache before falling back to the store.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex_lite::Regex;

use partyhub_domain::ids::{CombatantId, PartyId};

use crate::app_state::AppState;
use crate::infrastructure::error::CommandError;
use crate::party::live::Snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub combatant: CombatantId,
    pub name: String,
}

#[derive(Debug, Default)]
pub struct MentionResolution {
    pub mentions: Vec<Candidate>,
    pub unresolved: Vec<String>,
    pub ambiguous: Vec<(String, Vec<Candidate>)>,
}

fn normalize(token: &str) -> String {
    token.to_lowercase().replace('_', " ")
}

static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(\w+)").expect("valid regex"));

/// Extract all `@<word>` tokens — a word is one or more alphanumeric/
/// underscore characters, so `@First_Last,` still yields `First_Last`
/// with the trailing punctuation left behind.
pub fn tokenize(text: &str) -> Vec<String> {
    MENTION_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

pub async fn resolve(
    state: &AppState,
    party_id: PartyId,
    sender_is_sw: bool,
    cache: &HashMap<CombatantId, Snapshot>,
    text: &str,
) -> Result<MentionResolution, CommandError> {
    let tokens = tokenize(text);
    let mut resolution = MentionResolution::default();

    let party_characters = state.store.list_party_characters(party_id).await?;
    let party_npcs = state
        .store
        .list_party_npcs(party_id, sender_is_sw)
        .await?;

    for token in tokens {
        let needle = normalize(&token);

        let cache_hit = cache
            .values()
            .find(|snapshot| normalize(&snapshot.name) == needle)
            .map(|snapshot| Candidate {
                combatant: snapshot.combatant,
                name: snapshot.name.clone(),
            });

        if let Some(candidate) = cache_hit {
            resolution.mentions.push(candidate);
            continue;
        }

        let character_matches: Vec<Candidate> = party_characters
            .iter()
            .filter(|c| normalize(&c.name) == needle)
            .map(|c| Candidate {
                combatant: CombatantId::Character(c.id),
                name: c.name.clone(),
            })
            .collect();

        if character_matches.len() == 1 {
            resolution.mentions.push(character_matches.into_iter().next().unwrap());
            continue;
        }
        if character_matches.len() > 1 {
            resolution.ambiguous.push((token, character_matches));
            continue;
        }

        let npc_matches: Vec<Candidate> = party_npcs
            .iter()
            .filter(|n| normalize(&n.name) == needle)
            .map(|n| Candidate {
                combatant: CombatantId::Npc(n.id),
                name: n.name.clone(),
            })
            .collect();

        match npc_matches.len() {
            0 => resolution.unresolved.push(token),
            1 => resolution.mentions.push(npc_matches.into_iter().next().unwrap()),
            _ => resolution.ambiguous.push((token, npc_matches)),
        }
    }

    Ok(resolution)
}

/// `resolve_single` — same algorithm, but fails unless exactly one mention
/// resolves; `expected_npc`/`expected_character` type filters are left to
/// the caller via `combatant` matching since `CombatantId` already carries
/// its kind.
pub async fn resolve_single(
    state: &AppState,
    party_id: PartyId,
    sender_is_sw: bool,
    cache: &HashMap<CombatantId, Snapshot>,
    text: &str,
) -> Result<Candidate, CommandError> {
    let resolution = resolve(state, party_id, sender_is_sw, cache, text).await?;
    if let Some((token, _)) = resolution.ambiguous.first() {
        return Err(CommandError::MentionError(format!(
            "@{token} is ambiguous; multiple matches found."
        )));
    }
    if let Some(token) = resolution.unresolved.first() {
        return Err(CommandError::MentionError(format!(
            "Target not found: @{token}. Use /who to see available targets."
        )));
    }
    match resolution.mentions.len() {
        1 => Ok(resolution.mentions.into_iter().next().unwrap()),
        0 => Err(CommandError::CommandUsageError(
            "expected a @target".to_string(),
        )),
        _ => Err(CommandError::MentionError(
            "expected exactly one @target".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_extracts_at_mentions() {
        let tokens = tokenize("hey @Goblin and @First_Last, go!");
        assert_eq!(tokens, vec!["Goblin".to_string(), "First_Last".to_string()]);
    }

    #[test]
    fn normalize_lowercases_and_replaces_underscore() {
        assert_eq!(normalize("First_Last"), "first last");
    }
}
