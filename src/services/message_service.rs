use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Message;
use crate::state::AppState;

use super::{validate_text, with_write_retries};

pub struct MessageService;

impl MessageService {
    /// Create a message and index it in the conversation as one logical
    /// unit. If the index append cannot land, the freshly created record is
    /// rolled back so no orphan message survives.
    pub async fn send_message(
        state: &AppState,
        conversation_id: Uuid,
        caller_id: Uuid,
        text: &str,
    ) -> AppResult<Message> {
        validate_text(state, text)?;

        let message = state.messages.create(caller_id, text.into()).await?;
        let message_id = message.id;

        // Membership is checked on the same snapshot the write is
        // conditioned on: a removal racing this send either shows up in the
        // re-read or invalidates the version.
        let appended = with_write_retries(&state.config, || async move {
            let (mut convo, version) = state.conversations.get_versioned(conversation_id).await?;
            if !convo.is_member(caller_id) {
                return Err(AppError::Forbidden);
            }
            if convo.contains_message(message_id) {
                return Err(AppError::Conflict(format!(
                    "message {message_id} already indexed by conversation {conversation_id}"
                )));
            }
            convo.message_index.push(message_id);
            state.conversations.put_if(conversation_id, version, convo).await
        })
        .await;
        if let Err(err) = appended {
            state.messages.delete(message.id).await?;
            return Err(err);
        }

        debug!(conversation_id = %conversation_id, message_id = %message.id, "message sent");
        Ok(message)
    }

    /// Resolve the conversation's index, in order, against the canonical
    /// message store.
    pub async fn list_messages(
        state: &AppState,
        conversation_id: Uuid,
        caller_id: Uuid,
    ) -> AppResult<Vec<Message>> {
        let conversation = state.conversations.get(conversation_id).await?;
        if !conversation.is_member(caller_id) {
            return Err(AppError::Forbidden);
        }

        let mut messages = Vec::with_capacity(conversation.message_index.len());
        for message_id in &conversation.message_index {
            messages.push(state.messages.get(*message_id).await?);
        }
        Ok(messages)
    }

    /// Edit a message's text. Only the sender may edit, and only while the
    /// message still belongs to this conversation's index.
    pub async fn edit_message(
        state: &AppState,
        conversation_id: Uuid,
        message_id: Uuid,
        caller_id: Uuid,
        text: &str,
    ) -> AppResult<Message> {
        validate_text(state, text)?;

        let conversation = state.conversations.get(conversation_id).await?;
        if !conversation.is_member(caller_id) {
            return Err(AppError::Forbidden);
        }
        if !conversation.contains_message(message_id) {
            return Err(AppError::NotFound);
        }

        state.messages.edit_text(message_id, caller_id, text.into()).await
    }

    /// Remove a message from the index and the canonical store in the same
    /// logical operation. Any member may delete, matching the observed
    /// behavior of the system this replaces.
    pub async fn delete_message(
        state: &AppState,
        conversation_id: Uuid,
        message_id: Uuid,
        caller_id: Uuid,
    ) -> AppResult<()> {
        with_write_retries(&state.config, || async move {
            let (mut convo, version) = state.conversations.get_versioned(conversation_id).await?;
            if !convo.is_member(caller_id) {
                return Err(AppError::Forbidden);
            }
            if !convo.contains_message(message_id) {
                return Err(AppError::NotFound);
            }
            convo.message_index.retain(|m| *m != message_id);
            state.conversations.put_if(conversation_id, version, convo).await
        })
        .await?;
        state.messages.delete(message_id).await?;

        info!(conversation_id = %conversation_id, message_id = %message_id, "message deleted");
        Ok(())
    }

    /// Record that the caller has read the message. Idempotent: re-reading
    /// changes nothing.
    pub async fn mark_message_read(
        state: &AppState,
        conversation_id: Uuid,
        message_id: Uuid,
        caller_id: Uuid,
    ) -> AppResult<Message> {
        let conversation = state.conversations.get(conversation_id).await?;
        if !conversation.is_member(caller_id) {
            return Err(AppError::Forbidden);
        }
        if !conversation.contains_message(message_id) {
            return Err(AppError::NotFound);
        }

        state.messages.mark_read(message_id, caller_id).await
    }
}
