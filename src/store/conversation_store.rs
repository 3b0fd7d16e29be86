use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Conversation, ConversationMember, ConversationMode};

use super::VersionedRecord;

/// Keyed map of conversation records. Exclusively owns `members` and
/// `message_index`; all mutations are whole-record replace-or-fail against
/// the record version.
#[derive(Debug, Default)]
pub struct ConversationStore {
    inner: RwLock<HashMap<Uuid, VersionedRecord<Conversation>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, conversation: Conversation) -> AppResult<Conversation> {
        let mut map = self.inner.write().await;
        if map.contains_key(&conversation.id) {
            return Err(AppError::Conflict(format!(
                "conversation {} already exists",
                conversation.id
            )));
        }
        map.insert(conversation.id, VersionedRecord::new(conversation.clone()));
        Ok(conversation)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Conversation> {
        let map = self.inner.read().await;
        map.get(&id)
            .map(|r| r.value.clone())
            .ok_or(AppError::NotFound)
    }

    pub async fn get_versioned(&self, id: Uuid) -> AppResult<(Conversation, u64)> {
        let map = self.inner.read().await;
        map.get(&id)
            .map(|r| (r.value.clone(), r.version))
            .ok_or(AppError::NotFound)
    }

    /// Replace the whole record iff the stored version still matches.
    pub async fn put_if(
        &self,
        id: Uuid,
        expected_version: u64,
        mut value: Conversation,
    ) -> AppResult<Conversation> {
        let mut map = self.inner.write().await;
        let record = map.get_mut(&id).ok_or(AppError::NotFound)?;
        if record.version != expected_version {
            return Err(AppError::Conflict(format!(
                "conversation {id}: version {expected_version} is stale (current {})",
                record.version
            )));
        }
        value.updated_at = Utc::now();
        record.value = value;
        record.version += 1;
        Ok(record.value.clone())
    }

    pub async fn remove(&self, id: Uuid) -> AppResult<Conversation> {
        let mut map = self.inner.write().await;
        map.remove(&id).map(|r| r.value).ok_or(AppError::NotFound)
    }

    /// One optimistic attempt; callers retry on `Conflict`.
    pub async fn update_members(
        &self,
        id: Uuid,
        new_members: Vec<ConversationMember>,
    ) -> AppResult<Conversation> {
        let (mut conversation, version) = self.get_versioned(id).await?;
        conversation.members = new_members;
        self.put_if(id, version, conversation).await
    }

    pub async fn rename(&self, id: Uuid, name: String) -> AppResult<Conversation> {
        let (mut conversation, version) = self.get_versioned(id).await?;
        if conversation.mode == ConversationMode::Dialog {
            return Err(AppError::InvalidMode);
        }
        conversation.name = Some(name);
        self.put_if(id, version, conversation).await
    }

    pub async fn append_message(&self, id: Uuid, message_id: Uuid) -> AppResult<Conversation> {
        let (mut conversation, version) = self.get_versioned(id).await?;
        if conversation.contains_message(message_id) {
            return Err(AppError::Conflict(format!(
                "message {message_id} already indexed by conversation {id}"
            )));
        }
        conversation.message_index.push(message_id);
        self.put_if(id, version, conversation).await
    }

    pub async fn remove_message(&self, id: Uuid, message_id: Uuid) -> AppResult<Conversation> {
        let (mut conversation, version) = self.get_versioned(id).await?;
        if !conversation.contains_message(message_id) {
            return Err(AppError::NotFound);
        }
        conversation.message_index.retain(|m| *m != message_id);
        self.put_if(id, version, conversation).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MemberRole;

    fn group(members: Vec<ConversationMember>) -> Conversation {
        Conversation::new(ConversationMode::Group, Some("room".into()), members)
    }

    #[tokio::test]
    async fn put_if_rejects_stale_version() {
        let store = ConversationStore::new();
        let a = Uuid::new_v4();
        let convo = group(vec![ConversationMember::new(a, MemberRole::Admin)]);
        let id = convo.id;
        store.create(convo).await.unwrap();

        let (snapshot, version) = store.get_versioned(id).await.unwrap();
        // A concurrent writer lands first.
        store
            .put_if(id, version, snapshot.clone())
            .await
            .unwrap();

        let err = store.put_if(id, version, snapshot).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn rename_fails_on_dialog() {
        let store = ConversationStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let convo = Conversation::new(
            ConversationMode::Dialog,
            None,
            vec![
                ConversationMember::new(a, MemberRole::Member),
                ConversationMember::new(b, MemberRole::Member),
            ],
        );
        let id = convo.id;
        store.create(convo).await.unwrap();

        let err = store.rename(id, "nope".into()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidMode));
    }

    #[tokio::test]
    async fn update_members_replaces_the_whole_list() {
        let store = ConversationStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let convo = group(vec![ConversationMember::new(a, MemberRole::Admin)]);
        let id = convo.id;
        store.create(convo).await.unwrap();

        let updated = store
            .update_members(
                id,
                vec![
                    ConversationMember::new(a, MemberRole::Admin),
                    ConversationMember::new(b, MemberRole::Member),
                ],
            )
            .await
            .unwrap();
        assert_eq!(updated.members.len(), 2);
        assert!(updated.is_member(b));

        let (_, version) = store.get_versioned(id).await.unwrap();
        assert_eq!(version, 2);

        let err = store.update_members(Uuid::new_v4(), vec![]).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn remove_message_requires_an_indexed_id() {
        let store = ConversationStore::new();
        let a = Uuid::new_v4();
        let convo = group(vec![ConversationMember::new(a, MemberRole::Admin)]);
        let id = convo.id;
        store.create(convo).await.unwrap();

        let message_id = Uuid::new_v4();
        let err = store.remove_message(id, message_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));

        store.append_message(id, message_id).await.unwrap();
        let updated = store.remove_message(id, message_id).await.unwrap();
        assert!(!updated.contains_message(message_id));
    }

    #[tokio::test]
    async fn append_rejects_duplicate_message_id() {
        let store = ConversationStore::new();
        let a = Uuid::new_v4();
        let convo = group(vec![ConversationMember::new(a, MemberRole::Admin)]);
        let id = convo.id;
        store.create(convo).await.unwrap();

        let message_id = Uuid::new_v4();
        store.append_message(id, message_id).await.unwrap();
        let err = store.append_message(id, message_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
