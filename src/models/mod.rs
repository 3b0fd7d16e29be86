pub mod conversation;
pub mod member;
pub mod message;

// Re-export for convenience
pub use conversation::{Conversation, ConversationMode};
pub use member::{ConversationMember, MemberRole};
pub use message::{Message, MessageStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn wire_representation_uses_lowercase_tags() {
        let message = Message::new(Uuid::new_v4(), "hi".into());
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["status"], "sent");

        let member = ConversationMember::new(Uuid::new_v4(), MemberRole::Admin);
        let json = serde_json::to_value(&member).unwrap();
        assert_eq!(json["role"], "admin");

        let convo = Conversation::new(ConversationMode::Dialog, None, vec![]);
        let json = serde_json::to_value(&convo).unwrap();
        assert_eq!(json["mode"], "dialog");
    }
}
