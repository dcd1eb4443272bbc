//! Global party map. The coarse lock here only ever guards lookup/insert/
//! remove of party entries (§5); all other mutation happens inside the
//! per-party `Mutex<PartyLive>` handed out by [`Registry::get_or_create`].

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use partyhub_domain::entities::PartyType;
use partyhub_domain::ids::{PartyId, UserId};

use super::live::PartyLive;

#[derive(Default)]
pub struct Registry {
    parties: DashMap<PartyId, Arc<Mutex<PartyLive>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(
        &self,
        party_id: PartyId,
        party_type: PartyType,
        sw_user_id: Option<UserId>,
    ) -> Arc<Mutex<PartyLive>> {
        self.parties
            .entry(party_id)
            .or_insert_with(|| Arc::new(Mutex::new(PartyLive::new(party_id, party_type, sw_user_id))))
            .clone()
    }

    pub fn get(&self, party_id: PartyId) -> Option<Arc<Mutex<PartyLive>>> {
        self.parties.get(&party_id).map(|entry| entry.clone())
    }

    /// Drop the party entry entirely — called once its socket set is empty.
    pub fn dispose_if_empty(&self, party_id: PartyId) {
        if let Some(entry) = self.parties.get(&party_id) {
            if !entry.try_lock().map(|g| g.is_empty()).unwrap_or(false) {
                return;
            }
        } else {
            return;
        }
        self.parties.remove(&party_id);
    }
}
