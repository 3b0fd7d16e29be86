pub mod conversation_service;
pub mod message_service;

pub use conversation_service::ConversationService;
pub use message_service::MessageService;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use std::future::Future;

/// Re-runs a whole read-modify-write while it keeps losing the optimistic
/// version race, up to the configured budget. Terminal errors pass through
/// on the first attempt.
pub(crate) async fn with_write_retries<T, F, Fut>(config: &Config, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Err(err) if err.is_retryable() && attempt < config.max_write_retries => {
                tracing::warn!(attempt, error = %err, "optimistic write lost a race, retrying");
                attempt += 1;
            }
            other => return other,
        }
    }
}

pub(crate) fn validate_text(state: &AppState, text: &str) -> AppResult<()> {
    if text.trim().is_empty() {
        return Err(AppError::Validation("message text cannot be empty".into()));
    }
    if text.len() > state.config.max_message_len {
        return Err(AppError::Validation(format!(
            "message too long (max {})",
            state.config.max_message_len
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Conversation, ConversationMember, ConversationMode, MemberRole};
    use std::cell::Cell;
    use uuid::Uuid;

    async fn seeded_state(max_write_retries: u32) -> (AppState, Uuid) {
        let config = Config {
            max_write_retries,
            ..Config::test_defaults()
        };
        let state = AppState::new(config);
        let convo = Conversation::new(
            ConversationMode::Group,
            Some("room".into()),
            vec![ConversationMember::new(Uuid::new_v4(), MemberRole::Admin)],
        );
        let id = convo.id;
        state.conversations.create(convo).await.unwrap();
        (state, id)
    }

    #[tokio::test]
    async fn conflict_surfaces_after_the_retry_budget_is_spent() {
        let (state, id) = seeded_state(2).await;
        let state = &state;
        let attempts = Cell::new(0u32);
        let attempts = &attempts;

        let err = with_write_retries(&state.config, || async move {
            attempts.set(attempts.get() + 1);
            let (snapshot, version) = state.conversations.get_versioned(id).await?;
            // A competing writer lands between our read and our write on
            // every attempt.
            state.conversations.put_if(id, version, snapshot.clone()).await?;
            state.conversations.put_if(id, version, snapshot).await
        })
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(attempts.get(), 2);
    }

    #[tokio::test]
    async fn a_retry_that_wins_the_race_succeeds() {
        let (state, id) = seeded_state(3).await;
        let state = &state;
        let attempts = Cell::new(0u32);
        let attempts = &attempts;

        let renamed = with_write_retries(&state.config, || async move {
            attempts.set(attempts.get() + 1);
            let (mut snapshot, version) = state.conversations.get_versioned(id).await?;
            if attempts.get() == 1 {
                // Lose the first race only.
                state.conversations.put_if(id, version, snapshot.clone()).await?;
                return state.conversations.put_if(id, version, snapshot).await;
            }
            snapshot.name = Some("after retry".into());
            state.conversations.put_if(id, version, snapshot).await
        })
        .await
        .unwrap();

        assert_eq!(renamed.name.as_deref(), Some("after retry"));
        assert_eq!(attempts.get(), 2);
    }

    #[tokio::test]
    async fn terminal_errors_pass_through_without_retrying() {
        let (state, _) = seeded_state(3).await;
        let state = &state;
        let attempts = Cell::new(0u32);
        let attempts = &attempts;

        let err: AppResult<()> = with_write_retries(&state.config, || async move {
            attempts.set(attempts.get() + 1);
            Err(AppError::NotFound)
        })
        .await;

        assert!(matches!(err.unwrap_err(), AppError::NotFound));
        assert_eq!(attempts.get(), 1);
    }
}
