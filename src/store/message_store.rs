use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Message, MessageStatus};

use super::VersionedRecord;

/// Canonical message records. Conversation affiliation is not stored here;
/// it is tracked solely by the owning conversation's message index.
#[derive(Debug, Default)]
pub struct MessageStore {
    inner: RwLock<HashMap<Uuid, VersionedRecord<Message>>>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, sender_id: Uuid, text: String) -> AppResult<Message> {
        let message = Message::new(sender_id, text);
        let mut map = self.inner.write().await;
        map.insert(message.id, VersionedRecord::new(message.clone()));
        Ok(message)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Message> {
        let map = self.inner.read().await;
        map.get(&id)
            .map(|r| r.value.clone())
            .ok_or(AppError::NotFound)
    }

    pub async fn edit_text(&self, id: Uuid, caller_id: Uuid, new_text: String) -> AppResult<Message> {
        let mut map = self.inner.write().await;
        let record = map.get_mut(&id).ok_or(AppError::NotFound)?;
        if record.value.sender_id != caller_id {
            return Err(AppError::Forbidden);
        }
        record.value.text = new_text;
        record.value.updated_at = Utc::now();
        record.version += 1;
        Ok(record.value.clone())
    }

    /// Idempotent: deleting an absent message is a no-op so the
    /// send-rollback and delete paths can be safely re-run.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let mut map = self.inner.write().await;
        map.remove(&id);
        Ok(())
    }

    /// Adds `caller_id` to `read_by`; the first reader flips the status to
    /// `Read`. Re-reading is a no-op.
    pub async fn mark_read(&self, id: Uuid, caller_id: Uuid) -> AppResult<Message> {
        let mut map = self.inner.write().await;
        let record = map.get_mut(&id).ok_or(AppError::NotFound)?;
        if record.value.read_by.insert(caller_id) {
            record.value.status = MessageStatus::Read;
            record.value.updated_at = Utc::now();
            record.version += 1;
        }
        Ok(record.value.clone())
    }
}
