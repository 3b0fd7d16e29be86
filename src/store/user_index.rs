use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Reverse index user id -> conversation ids. The record itself is owned by
/// the external user service; this core only keeps it synchronized. Both
/// mutations are idempotent so the managers' recovery path can re-run the
/// indexing step after a partial failure.
#[derive(Debug, Default)]
pub struct UserConversationIndex {
    inner: RwLock<HashMap<Uuid, Vec<Uuid>>>,
}

impl UserConversationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, user_id: Uuid, conversation_id: Uuid) {
        let mut map = self.inner.write().await;
        let entry = map.entry(user_id).or_default();
        if !entry.contains(&conversation_id) {
            entry.push(conversation_id);
        }
    }

    pub async fn remove(&self, user_id: Uuid, conversation_id: Uuid) {
        let mut map = self.inner.write().await;
        if let Some(entry) = map.get_mut(&user_id) {
            entry.retain(|id| *id != conversation_id);
        }
    }

    pub async fn conversations_of(&self, user_id: Uuid) -> Vec<Uuid> {
        let map = self.inner.read().await;
        map.get(&user_id).cloned().unwrap_or_default()
    }

    pub async fn contains(&self, user_id: Uuid, conversation_id: Uuid) -> bool {
        let map = self.inner.read().await;
        map.get(&user_id)
            .map(|ids| ids.contains(&conversation_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_and_remove_are_idempotent() {
        let index = UserConversationIndex::new();
        let (user, convo) = (Uuid::new_v4(), Uuid::new_v4());

        index.add(user, convo).await;
        index.add(user, convo).await;
        assert_eq!(index.conversations_of(user).await, vec![convo]);

        index.remove(user, convo).await;
        index.remove(user, convo).await;
        assert!(index.conversations_of(user).await.is_empty());
    }
}
