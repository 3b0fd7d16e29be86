pub mod conversation_store;
pub mod message_store;
pub mod user_index;

pub use conversation_store::ConversationStore;
pub use message_store::MessageStore;
pub use user_index::UserConversationIndex;

/// A stored value together with its optimistic-concurrency version.
/// Every successful whole-record replace bumps the version; a replace
/// conditioned on a stale version fails with `Conflict` and the caller
/// re-runs the whole read-modify-write.
#[derive(Debug, Clone)]
pub struct VersionedRecord<T> {
    pub value: T,
    pub version: u64,
}

impl<T> VersionedRecord<T> {
    pub fn new(value: T) -> Self {
        Self { value, version: 1 }
    }
}
