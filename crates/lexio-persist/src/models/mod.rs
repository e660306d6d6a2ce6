mod chat;
mod message;
mod plan;
mod story;

pub use chat::{ChatSession, ChatStatus};
pub use message::{ChatMessage, Sender};
pub use plan::{LearningPlan, PlanWord};
pub use story::WordStory;
