use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::member::{ConversationMember, MemberRole};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationMode {
    #[serde(rename = "dialog")]
    Dialog,
    #[serde(rename = "group")]
    Group,
}

/// A conversation record. Message bodies are never embedded here: the
/// `message_index` holds ids only, and the message store is the single
/// source of truth for their content and read state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub mode: ConversationMode,
    /// Present only for groups; dialogs are unnamed.
    pub name: Option<String>,
    /// Unique by `user_id`, insertion-ordered.
    pub members: Vec<ConversationMember>,
    /// Ordered message ids, insertion order = chronological order.
    pub message_index: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(
        mode: ConversationMode,
        name: Option<String>,
        members: Vec<ConversationMember>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mode,
            name,
            members,
            message_index: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.members.iter().any(|m| m.user_id == user_id)
    }

    pub fn member(&self, user_id: Uuid) -> Option<&ConversationMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn role_of(&self, user_id: Uuid) -> Option<MemberRole> {
        self.member(user_id).map(|m| m.role)
    }

    pub fn contains_message(&self, message_id: Uuid) -> bool {
        self.message_index.contains(&message_id)
    }
}
