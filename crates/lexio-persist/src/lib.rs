pub mod client;
pub mod error;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use client::PersistClient;
pub use error::PersistError;
pub use memory::MemoryStore;
pub use models::{
    ChatMessage, ChatSession, ChatStatus, LearningPlan, PlanWord, Sender, WordStory,
};
pub use repositories::{ChatRepository, PlanRepository, StoryRepository};
pub use store::{ExchangeWrite, LearnStore, StoryWrite};
