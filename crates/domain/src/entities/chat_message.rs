//! Persisted chat/combat/system log rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{ChatMessageId, PartyId};
use crate::value_objects::chat_mode::ChatMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Chat,
    Combat,
    System,
    Narration,
    DiceRoll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub party_id: PartyId,
    pub sender_name: String,
    pub message_type: MessageType,
    /// `None` for message types the routing tag doesn't apply to (e.g. `system`).
    pub mode: Option<ChatMode>,
    pub content: String,
    pub extra_data: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ChatMessageId,
        party_id: PartyId,
        sender_name: impl Into<String>,
        message_type: MessageType,
        mode: Option<ChatMode>,
        content: impl Into<String>,
        extra_data: Option<Value>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            party_id,
            sender_name: sender_name.into(),
            message_type,
            mode,
            content: content.into(),
            extra_data,
            created_at,
        }
    }

    /// Idempotency key the persistence adapter dedupes appends on:
    /// `(party_id, sender_name, created_at, content)`.
    pub fn idempotency_key(&self) -> (PartyId, String, DateTime<Utc>, String) {
        (
            self.party_id,
            self.sender_name.clone(),
            self.created_at,
            self.content.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_stable_for_identical_rows() {
        let now = Utc::now();
        let a = ChatMessage::new(
            ChatMessageId::new(),
            PartyId::new(),
            "Alice",
            MessageType::Chat,
            Some(ChatMode::Ic),
            "Hello",
            None,
            now,
        );
        let mut b = a.clone();
        b.id = ChatMessageId::new();
        assert_eq!(a.idempotency_key(), b.idempotency_key());
    }
}
