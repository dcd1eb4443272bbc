//! Parties: the chat/play channel all connections bind to.

use serde::{Deserialize, Serialize};

use crate::ids::{PartyId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyType {
    Story,
    Ooc,
    Standard,
    Whisper,
}

impl PartyType {
    /// Default plain-chat `mode` for this party type when a frame doesn't
    /// supply one explicitly: IC for story/standard, OOC for ooc/whisper.
    pub fn default_chat_mode(&self) -> crate::value_objects::chat_mode::ChatMode {
        use crate::value_objects::chat_mode::ChatMode;
        match self {
            Self::Story | Self::Standard => ChatMode::Ic,
            Self::Ooc | Self::Whisper => ChatMode::Ooc,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub story_weaver_user_id: Option<UserId>,
    pub party_type: PartyType,
}

impl Party {
    pub fn new(id: PartyId, story_weaver_user_id: Option<UserId>, party_type: PartyType) -> Self {
        Self {
            id,
            story_weaver_user_id,
            party_type,
        }
    }

    /// A connecting socket's role is SW iff its user matches the party's SW,
    /// evaluated once at connect time.
    pub fn role_for(&self, user_id: UserId) -> crate::value_objects::role::Role {
        use crate::value_objects::role::Role;
        if self.story_weaver_user_id == Some(user_id) {
            Role::StoryWeaver
        } else {
            Role::Player
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::chat_mode::ChatMode;
    use crate::value_objects::role::Role;

    #[test]
    fn sw_matches_bound_user() {
        let sw = UserId::new();
        let party = Party::new(PartyId::new(), Some(sw), PartyType::Story);
        assert_eq!(party.role_for(sw), Role::StoryWeaver);
        assert_eq!(party.role_for(UserId::new()), Role::Player);
    }

    #[test]
    fn default_chat_mode_by_party_type() {
        assert_eq!(PartyType::Story.default_chat_mode(), ChatMode::Ic);
        assert_eq!(PartyType::Standard.default_chat_mode(), ChatMode::Ic);
        assert_eq!(PartyType::Ooc.default_chat_mode(), ChatMode::Ooc);
        assert_eq!(PartyType::Whisper.default_chat_mode(), ChatMode::Ooc);
    }
}
