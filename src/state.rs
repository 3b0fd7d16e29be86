use crate::{
    config::Config,
    store::{ConversationStore, MessageStore, UserConversationIndex},
};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AppState {
    pub conversations: Arc<ConversationStore>,
    pub messages: Arc<MessageStore>,
    pub user_index: Arc<UserConversationIndex>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            conversations: Arc::new(ConversationStore::new()),
            messages: Arc::new(MessageStore::new()),
            user_index: Arc::new(UserConversationIndex::new()),
            config: Arc::new(config),
        }
    }
}
