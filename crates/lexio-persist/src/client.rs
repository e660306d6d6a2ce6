use async_trait::async_trait;
use chrono::NaiveDate;
use mongodb::bson::oid::ObjectId;
use mongodb::Client;
use serde_json::Value;

use crate::error::{PersistError, Result};
use crate::models::{ChatMessage, ChatSession, LearningPlan, Sender, WordStory};
use crate::repositories::{ChatRepository, PlanRepository, StoryRepository};
use crate::store::{ExchangeWrite, LearnStore, StoryWrite};

/// MongoDB-backed store: connects, bootstraps indexes, exposes the
/// repositories and implements `LearnStore` by delegation.
pub struct PersistClient {
    chat_repo: ChatRepository,
    story_repo: StoryRepository,
    plan_repo: PlanRepository,
}

impl PersistClient {
    pub async fn connect(mongodb_uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        let chat_repo = ChatRepository::new(&client, db_name);
        let story_repo = StoryRepository::new(&client, db_name);
        let plan_repo = PlanRepository::new(&client, db_name);

        story_repo.ensure_indexes().await?;
        tracing::debug!(database = db_name, "persistence layer ready");

        Ok(Self {
            chat_repo,
            story_repo,
            plan_repo,
        })
    }

    pub fn chats(&self) -> &ChatRepository {
        &self.chat_repo
    }

    pub fn stories(&self) -> &StoryRepository {
        &self.story_repo
    }

    pub fn plans(&self) -> &PlanRepository {
        &self.plan_repo
    }
}

#[async_trait]
impl LearnStore for PersistClient {
    async fn create_session(
        &self,
        user_id: &str,
        word_story_id: Option<ObjectId>,
        story_snapshot: Option<String>,
    ) -> Result<ChatSession> {
        self.chat_repo
            .create_session(user_id, word_story_id, story_snapshot)
            .await
    }

    async fn get_session(&self, chat_id: ObjectId, user_id: &str) -> Result<Option<ChatSession>> {
        self.chat_repo.get_session(chat_id, user_id).await
    }

    async fn list_messages(&self, chat_id: ObjectId) -> Result<Vec<ChatMessage>> {
        self.chat_repo.list_messages(chat_id).await
    }

    async fn append_message(
        &self,
        chat_id: ObjectId,
        sender: Sender,
        content: String,
        payload: Option<Value>,
    ) -> Result<ChatMessage> {
        self.chat_repo
            .append_message(chat_id, sender, content, payload)
            .await
    }

    async fn append_exchange(
        &self,
        chat_id: ObjectId,
        write: ExchangeWrite,
    ) -> Result<(ChatSession, Vec<ChatMessage>)> {
        self.chat_repo.append_exchange(chat_id, write).await
    }

    async fn get_story(&self, user_id: &str, story_date: NaiveDate) -> Result<Option<WordStory>> {
        self.story_repo.get_by_user_and_date(user_id, story_date).await
    }

    async fn upsert_story(&self, write: StoryWrite) -> Result<WordStory> {
        self.story_repo.upsert(write).await
    }

    async fn list_recent_stories(&self, user_id: &str, limit: i64) -> Result<Vec<WordStory>> {
        self.story_repo.list_recent(user_id, limit).await
    }

    async fn latest_plan(&self, user_id: &str) -> Result<Option<LearningPlan>> {
        self.plan_repo.latest_for_user(user_id).await
    }

    async fn words_for_day(
        &self,
        plan_id: ObjectId,
        day_index: u32,
        fallback_limit: u32,
    ) -> Result<Vec<String>> {
        self.plan_repo
            .words_for_day(plan_id, day_index, fallback_limit)
            .await
    }
}
