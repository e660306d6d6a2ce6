use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde_json::Value;

use crate::error::Result;
use crate::models::{ChatMessage, ChatSession, ChatStatus, LearningPlan, Sender, WordStory};

/// The persistence boundary the session protocols consume.
///
/// Implemented by `PersistClient` over MongoDB and by `MemoryStore` for
/// tests; both uphold the same invariants (atomic sequence assignment,
/// all-or-nothing exchange appends, upsert-by-date for stories).
#[async_trait]
pub trait LearnStore: Send + Sync {
    // --- tutoring chat ---

    async fn create_session(
        &self,
        user_id: &str,
        word_story_id: Option<ObjectId>,
        story_snapshot: Option<String>,
    ) -> Result<ChatSession>;

    async fn get_session(&self, chat_id: ObjectId, user_id: &str) -> Result<Option<ChatSession>>;

    /// Messages of a chat in sequence order.
    async fn list_messages(&self, chat_id: ObjectId) -> Result<Vec<ChatMessage>>;

    /// Append one message with the next free sequence number.
    async fn append_message(
        &self,
        chat_id: ObjectId,
        sender: Sender,
        content: String,
        payload: Option<Value>,
    ) -> Result<ChatMessage>;

    /// Append a user/ai pair and apply the session mutation in one atomic
    /// step; on failure neither message is visible.
    async fn append_exchange(
        &self,
        chat_id: ObjectId,
        write: ExchangeWrite,
    ) -> Result<(ChatSession, Vec<ChatMessage>)>;

    // --- word stories ---

    async fn get_story(&self, user_id: &str, story_date: NaiveDate) -> Result<Option<WordStory>>;

    /// Create or overwrite the record for `(user_id, story_date)`.
    async fn upsert_story(&self, write: StoryWrite) -> Result<WordStory>;

    async fn list_recent_stories(&self, user_id: &str, limit: i64) -> Result<Vec<WordStory>>;

    // --- learning plans ---

    async fn latest_plan(&self, user_id: &str) -> Result<Option<LearningPlan>>;

    /// Words scheduled for one day of a plan; when the day has none, the
    /// first `fallback_limit` words of the whole plan.
    async fn words_for_day(
        &self,
        plan_id: ObjectId,
        day_index: u32,
        fallback_limit: u32,
    ) -> Result<Vec<String>>;
}

/// One successful chat round, ready to persist.
#[derive(Debug, Clone)]
pub struct ExchangeWrite {
    pub user_content: String,
    pub user_payload: Option<Value>,
    pub ai_content: String,
    pub ai_payload: Option<Value>,
    /// New remembered conversation id, when the gateway returned one.
    pub conversation_id: Option<String>,
    pub total_rounds: u32,
    pub status: ChatStatus,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Full story record contents for an upsert.
#[derive(Debug, Clone)]
pub struct StoryWrite {
    pub user_id: String,
    pub story_date: NaiveDate,
    pub words: Vec<String>,
    pub story_text: String,
    pub generated_at: DateTime<Utc>,
    pub story_tokens: Option<i64>,
    pub model_name: Option<String>,
    pub image_url: Option<String>,
    pub image_caption: Option<String>,
    pub status: String,
    pub extra: Option<Value>,
}
