use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRole {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "member")]
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMember {
    pub user_id: Uuid,
    pub role: MemberRole,
}

impl ConversationMember {
    pub fn new(user_id: Uuid, role: MemberRole) -> Self {
        Self { user_id, role }
    }
}
