use std::sync::Arc;

use lexio_learn::{ChatService, StoryService};

use crate::config::Config;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stories: Arc<StoryService>,
    pub chats: Arc<ChatService>,
}

impl AppState {
    pub fn new(config: Config, stories: StoryService, chats: ChatService) -> Self {
        Self {
            config: Arc::new(config),
            stories: Arc::new(stories),
            chats: Arc::new(chats),
        }
    }
}
