pub mod chat;
pub mod error;
pub mod story;

pub use chat::{ChatService, MAX_CHAT_ROUNDS};
pub use error::{ErrorKind, LearnError};
pub use story::{GenerateOptions, StoryService, DEFAULT_SAMPLE_WORDS};

/// Caller identity, resolved by the HTTP layer.
#[derive(Debug, Clone)]
pub struct UserRef {
    pub id: String,
    pub username: String,
}

impl UserRef {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}
