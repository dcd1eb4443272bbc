//! A persisted row recording one resolved attack or ability cast.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{CombatTurnId, PartyId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatTurn {
    pub id: CombatTurnId,
    pub party_id: PartyId,
    pub attacker_name: String,
    pub defender_name: String,
    pub total_damage: i32,
    pub outcome: String,
    /// Full structured breakdown (individual_rolls, resolution, etc.) — the
    /// same payload shape broadcast to clients, kept for replay/audit.
    pub detail: Value,
    pub created_at: DateTime<Utc>,
}
