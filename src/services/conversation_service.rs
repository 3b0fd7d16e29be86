use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Conversation, ConversationMember, ConversationMode, MemberRole};
use crate::state::AppState;

use super::{validate_text, with_write_retries};

/// System message seeded into a group created by dialog promotion.
pub const GROUP_CREATED_MESSAGE: &str = "Group created!";

pub struct ConversationService;

impl ConversationService {
    /// Create a dialog (exactly one counterpart) or a group (creator becomes
    /// admin). The first message, the conversation record and the reverse
    /// user index are all set up here; the indexing step is idempotent and
    /// safe to re-run after a partial failure.
    pub async fn create_conversation(
        state: &AppState,
        creator_id: Uuid,
        member_ids: Vec<Uuid>,
        mode: ConversationMode,
        name: Option<String>,
        first_message_text: &str,
    ) -> AppResult<Conversation> {
        validate_text(state, first_message_text)?;

        let members = match mode {
            ConversationMode::Dialog => {
                if member_ids.len() != 1 {
                    return Err(AppError::Validation(
                        "a dialog takes exactly one counterpart".into(),
                    ));
                }
                if member_ids[0] == creator_id {
                    return Err(AppError::Validation(
                        "cannot open a dialog with yourself".into(),
                    ));
                }
                vec![
                    ConversationMember::new(creator_id, MemberRole::Member),
                    ConversationMember::new(member_ids[0], MemberRole::Member),
                ]
            }
            ConversationMode::Group => {
                let mut members = vec![ConversationMember::new(creator_id, MemberRole::Admin)];
                for id in member_ids {
                    if id != creator_id && !members.iter().any(|m| m.user_id == id) {
                        members.push(ConversationMember::new(id, MemberRole::Member));
                    }
                }
                members
            }
        };

        // Dialogs are unnamed regardless of what the caller passed.
        let name = match mode {
            ConversationMode::Dialog => None,
            ConversationMode::Group => {
                if let Some(ref n) = name {
                    validate_name(state, n)?;
                }
                name
            }
        };

        let first_message = state.messages.create(creator_id, first_message_text.into()).await?;

        let mut conversation = Conversation::new(mode, name, members);
        conversation.message_index.push(first_message.id);
        let conversation = match state.conversations.create(conversation).await {
            Ok(c) => c,
            Err(err) => {
                // No conversation, no message: roll the orphan back.
                state.messages.delete(first_message.id).await?;
                return Err(err);
            }
        };

        for member in &conversation.members {
            state.user_index.add(member.user_id, conversation.id).await;
        }

        info!(conversation_id = %conversation.id, ?mode, "conversation created");
        Ok(conversation)
    }

    pub async fn list_conversations(state: &AppState, user_id: Uuid) -> AppResult<Vec<Conversation>> {
        let ids = state.user_index.conversations_of(user_id).await;
        let mut conversations = Vec::with_capacity(ids.len());
        for id in ids {
            // The reverse index is eventually consistent; a missing record
            // just means a deletion has not finished syncing it yet.
            match state.conversations.get(id).await {
                Ok(c) => conversations.push(c),
                Err(AppError::NotFound) => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(conversations)
    }

    /// Add a member. On a dialog this never mutates the existing record:
    /// it spins up a fresh group with the two old members (caller promoted
    /// to admin) plus the newcomer, and leaves the dialog untouched.
    pub async fn add_member(
        state: &AppState,
        conversation_id: Uuid,
        caller_id: Uuid,
        new_member_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = state.conversations.get(conversation_id).await?;
        if !conversation.is_member(caller_id) {
            return Err(AppError::Forbidden);
        }
        if conversation.is_member(new_member_id) {
            return Err(AppError::Conflict(format!(
                "user {new_member_id} is already a member of conversation {conversation_id}"
            )));
        }

        if conversation.mode == ConversationMode::Dialog {
            let group = promote_dialog(
                state,
                &conversation,
                caller_id,
                Some(new_member_id),
                None,
                GROUP_CREATED_MESSAGE,
            )
            .await?;
            info!(
                dialog_id = %conversation_id,
                group_id = %group.id,
                "dialog promoted to group"
            );
            return Ok(group);
        }

        let updated = with_write_retries(&state.config, || async move {
            let (mut convo, version) = state.conversations.get_versioned(conversation_id).await?;
            if convo.is_member(new_member_id) {
                return Err(AppError::Conflict(format!(
                    "user {new_member_id} is already a member of conversation {conversation_id}"
                )));
            }
            convo
                .members
                .push(ConversationMember::new(new_member_id, MemberRole::Member));
            state.conversations.put_if(conversation_id, version, convo).await
        })
        .await?;

        state.user_index.add(new_member_id, conversation_id).await;
        info!(conversation_id = %conversation_id, member_id = %new_member_id, "member added");
        Ok(updated)
    }

    /// Remove a member from a group. Self-removal (leaving) is always
    /// allowed; removing anyone else requires the admin role. Dialogs are
    /// fixed two-party records and never shrink.
    pub async fn remove_member(
        state: &AppState,
        conversation_id: Uuid,
        caller_id: Uuid,
        target_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = state.conversations.get(conversation_id).await?;
        if conversation.mode == ConversationMode::Dialog {
            return Err(AppError::InvalidMode);
        }
        if !conversation.is_member(caller_id) {
            return Err(AppError::Forbidden);
        }
        if !conversation.is_member(target_id) {
            return Err(AppError::NotAMember);
        }
        if target_id != caller_id && conversation.role_of(caller_id) != Some(MemberRole::Admin) {
            return Err(AppError::Forbidden);
        }

        let updated = with_write_retries(&state.config, || async move {
            let (mut convo, version) = state.conversations.get_versioned(conversation_id).await?;
            if !convo.is_member(target_id) {
                return Err(AppError::NotAMember);
            }
            convo.members.retain(|m| m.user_id != target_id);
            state.conversations.put_if(conversation_id, version, convo).await
        })
        .await?;

        state.user_index.remove(target_id, conversation_id).await;
        info!(conversation_id = %conversation_id, member_id = %target_id, "member removed");
        Ok(updated)
    }

    /// Replace a member's role. Roles only exist on groups.
    pub async fn change_role(
        state: &AppState,
        conversation_id: Uuid,
        caller_id: Uuid,
        target_id: Uuid,
        role: MemberRole,
    ) -> AppResult<Conversation> {
        let conversation = state.conversations.get(conversation_id).await?;
        if conversation.mode == ConversationMode::Dialog {
            return Err(AppError::InvalidMode);
        }
        if !conversation.is_member(caller_id) {
            return Err(AppError::Forbidden);
        }
        if !conversation.is_member(target_id) {
            return Err(AppError::NotAMember);
        }

        with_write_retries(&state.config, || async move {
            let (mut convo, version) = state.conversations.get_versioned(conversation_id).await?;
            let member = convo
                .members
                .iter_mut()
                .find(|m| m.user_id == target_id)
                .ok_or(AppError::NotAMember)?;
            member.role = role;
            state.conversations.put_if(conversation_id, version, convo).await
        })
        .await
    }

    /// Rename a group in place. Renaming a dialog takes the promotion path
    /// instead: a new named group is created around the same two members and
    /// the dialog is left as it was.
    pub async fn rename_conversation(
        state: &AppState,
        conversation_id: Uuid,
        caller_id: Uuid,
        name: &str,
    ) -> AppResult<Conversation> {
        validate_name(state, name)?;

        let conversation = state.conversations.get(conversation_id).await?;
        if !conversation.is_member(caller_id) {
            return Err(AppError::Forbidden);
        }

        if conversation.mode == ConversationMode::Dialog {
            let group = promote_dialog(
                state,
                &conversation,
                caller_id,
                None,
                Some(name.to_string()),
                &format!("Group {name} created!"),
            )
            .await?;
            info!(
                dialog_id = %conversation_id,
                group_id = %group.id,
                "dialog promoted to named group"
            );
            return Ok(group);
        }

        with_write_retries(&state.config, || {
            state.conversations.rename(conversation_id, name.to_string())
        })
        .await
    }

    /// Delete a conversation, its messages and its reverse-index entries.
    /// Steps are ordered so every intermediate state is valid and, given the
    /// snapshot, each step can be re-run.
    pub async fn delete_conversation(
        state: &AppState,
        conversation_id: Uuid,
        caller_id: Uuid,
    ) -> AppResult<()> {
        let conversation = state.conversations.get(conversation_id).await?;
        if !conversation.is_member(caller_id) {
            return Err(AppError::Forbidden);
        }

        for message_id in &conversation.message_index {
            state.messages.delete(*message_id).await?;
        }
        state.conversations.remove(conversation_id).await?;
        for member in &conversation.members {
            state.user_index.remove(member.user_id, conversation_id).await;
        }

        info!(conversation_id = %conversation_id, "conversation deleted");
        Ok(())
    }
}

/// Build the group replacing a dialog: the caller is promoted to admin, the
/// other party keeps the member role, an optional newcomer joins as member.
/// The dialog itself is never touched.
async fn promote_dialog(
    state: &AppState,
    dialog: &Conversation,
    caller_id: Uuid,
    new_member_id: Option<Uuid>,
    name: Option<String>,
    system_text: &str,
) -> AppResult<Conversation> {
    let mut members: Vec<ConversationMember> = dialog
        .members
        .iter()
        .map(|m| {
            let role = if m.user_id == caller_id {
                MemberRole::Admin
            } else {
                m.role
            };
            ConversationMember::new(m.user_id, role)
        })
        .collect();
    if let Some(id) = new_member_id {
        members.push(ConversationMember::new(id, MemberRole::Member));
    }

    let system_message = state.messages.create(caller_id, system_text.into()).await?;

    let mut group = Conversation::new(ConversationMode::Group, name, members);
    group.message_index.push(system_message.id);
    let group = match state.conversations.create(group).await {
        Ok(g) => g,
        Err(err) => {
            state.messages.delete(system_message.id).await?;
            return Err(err);
        }
    };

    for member in &group.members {
        state.user_index.add(member.user_id, group.id).await;
    }
    Ok(group)
}

fn validate_name(state: &AppState, name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".into()));
    }
    if name.len() > state.config.max_name_len {
        return Err(AppError::Validation(format!(
            "name too long (max {})",
            state.config.max_name_len
        )));
    }
    Ok(())
}
