mod chat;
mod plan;
mod story;

pub use chat::ChatRepository;
pub use plan::PlanRepository;
pub use story::StoryRepository;
