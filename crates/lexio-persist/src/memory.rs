use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde_json::Value;

use crate::error::{PersistError, Result};
use crate::models::{
    ChatMessage, ChatSession, LearningPlan, PlanWord, Sender, WordStory,
};
use crate::store::{ExchangeWrite, LearnStore, StoryWrite};

/// In-memory `LearnStore` used by the session-protocol tests.
///
/// Mirrors the MongoDB semantics: sequences come from the per-session
/// counter, exchange appends are all-or-nothing behind one lock, and story
/// upserts key on `(user_id, story_date)`.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<ObjectId, ChatSession>,
    messages: Vec<ChatMessage>,
    stories: Vec<WordStory>,
    plans: Vec<LearningPlan>,
    plan_words: Vec<PlanWord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a learning plan with per-day word buckets.
    pub fn insert_plan(&self, plan: LearningPlan, words_by_day: Vec<(u32, Vec<&str>)>) {
        let mut inner = self.inner.lock().unwrap();
        for (day_index, words) in words_by_day {
            for (idx, word) in words.iter().enumerate() {
                inner.plan_words.push(PlanWord {
                    id: ObjectId::new(),
                    plan_id: plan.id,
                    word: word.to_string(),
                    day_index,
                    sequence_in_day: idx as u32,
                });
            }
        }
        inner.plans.push(plan);
    }

    pub fn story_count(&self) -> usize {
        self.inner.lock().unwrap().stories.len()
    }
}

#[async_trait]
impl LearnStore for MemoryStore {
    async fn create_session(
        &self,
        user_id: &str,
        word_story_id: Option<ObjectId>,
        story_snapshot: Option<String>,
    ) -> Result<ChatSession> {
        let session = ChatSession::new(user_id.to_string(), word_story_id, story_snapshot);
        self.inner
            .lock()
            .unwrap()
            .sessions
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, chat_id: ObjectId, user_id: &str) -> Result<Option<ChatSession>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .sessions
            .get(&chat_id)
            .filter(|s| s.user_id == user_id)
            .cloned())
    }

    async fn list_messages(&self, chat_id: ObjectId) -> Result<Vec<ChatMessage>> {
        let inner = self.inner.lock().unwrap();
        let mut messages: Vec<ChatMessage> = inner
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.sequence);
        Ok(messages)
    }

    async fn append_message(
        &self,
        chat_id: ObjectId,
        sender: Sender,
        content: String,
        payload: Option<Value>,
    ) -> Result<ChatMessage> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get_mut(&chat_id)
            .ok_or_else(|| PersistError::ChatNotFound(chat_id.to_hex()))?;
        let sequence = session.next_sequence;
        session.next_sequence += 1;

        let message = ChatMessage {
            id: ObjectId::new(),
            chat_id,
            sender,
            content,
            payload,
            sequence,
            created_at: Utc::now(),
        };
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn append_exchange(
        &self,
        chat_id: ObjectId,
        write: ExchangeWrite,
    ) -> Result<(ChatSession, Vec<ChatMessage>)> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get_mut(&chat_id)
            .ok_or_else(|| PersistError::ChatNotFound(chat_id.to_hex()))?;

        let base = session.next_sequence;
        session.next_sequence += 2;
        session.total_rounds = write.total_rounds;
        session.status = write.status;
        if write.conversation_id.is_some() {
            session.coze_conversation_id = write.conversation_id.clone();
        }
        if write.ended_at.is_some() {
            session.ended_at = write.ended_at;
        }
        let session = session.clone();

        let now = Utc::now();
        let user_message = ChatMessage {
            id: ObjectId::new(),
            chat_id,
            sender: Sender::User,
            content: write.user_content,
            payload: write.user_payload,
            sequence: base,
            created_at: now,
        };
        let ai_message = ChatMessage {
            id: ObjectId::new(),
            chat_id,
            sender: Sender::Ai,
            content: write.ai_content,
            payload: write.ai_payload,
            sequence: base + 1,
            created_at: now,
        };
        inner.messages.push(user_message.clone());
        inner.messages.push(ai_message.clone());

        Ok((session, vec![user_message, ai_message]))
    }

    async fn get_story(&self, user_id: &str, story_date: NaiveDate) -> Result<Option<WordStory>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .stories
            .iter()
            .find(|s| s.user_id == user_id && s.story_date == story_date)
            .cloned())
    }

    async fn upsert_story(&self, write: StoryWrite) -> Result<WordStory> {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner
            .stories
            .iter_mut()
            .find(|s| s.user_id == write.user_id && s.story_date == write.story_date);

        let story = match existing {
            Some(story) => {
                story.words = write.words;
                story.story_text = write.story_text;
                story.generated_at = write.generated_at;
                story.story_tokens = write.story_tokens;
                story.model_name = write.model_name;
                story.image_url = write.image_url;
                story.image_caption = write.image_caption;
                story.status = write.status;
                story.extra = write.extra;
                story.clone()
            }
            None => {
                let story = WordStory {
                    id: ObjectId::new(),
                    user_id: write.user_id,
                    story_date: write.story_date,
                    words: write.words,
                    story_text: write.story_text,
                    generated_at: write.generated_at,
                    story_tokens: write.story_tokens,
                    model_name: write.model_name,
                    image_url: write.image_url,
                    image_caption: write.image_caption,
                    status: write.status,
                    extra: write.extra,
                };
                inner.stories.push(story.clone());
                story
            }
        };
        Ok(story)
    }

    async fn list_recent_stories(&self, user_id: &str, limit: i64) -> Result<Vec<WordStory>> {
        let inner = self.inner.lock().unwrap();
        let mut stories: Vec<WordStory> = inner
            .stories
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        stories.sort_by(|a, b| b.story_date.cmp(&a.story_date));
        stories.truncate(limit as usize);
        Ok(stories)
    }

    async fn latest_plan(&self, user_id: &str) -> Result<Option<LearningPlan>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .plans
            .iter()
            .filter(|p| p.user_id == user_id)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn words_for_day(
        &self,
        plan_id: ObjectId,
        day_index: u32,
        fallback_limit: u32,
    ) -> Result<Vec<String>> {
        let inner = self.inner.lock().unwrap();
        let mut scheduled: Vec<&PlanWord> = inner
            .plan_words
            .iter()
            .filter(|w| w.plan_id == plan_id && w.day_index == day_index)
            .collect();
        scheduled.sort_by_key(|w| w.sequence_in_day);
        if !scheduled.is_empty() {
            return Ok(scheduled.into_iter().map(|w| w.word.clone()).collect());
        }

        let mut fallback: Vec<&PlanWord> = inner
            .plan_words
            .iter()
            .filter(|w| w.plan_id == plan_id)
            .collect();
        fallback.sort_by_key(|w| (w.day_index, w.sequence_in_day));
        Ok(fallback
            .into_iter()
            .take(fallback_limit as usize)
            .map(|w| w.word.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatStatus;

    #[tokio::test]
    async fn test_sequences_start_at_zero_and_increase() {
        let store = MemoryStore::new();
        let session = store.create_session("u1", None, None).await.unwrap();

        for expected in 0..4 {
            let message = store
                .append_message(session.id, Sender::User, format!("m{expected}"), None)
                .await
                .unwrap();
            assert_eq!(message.sequence, expected);
        }
    }

    #[tokio::test]
    async fn test_exchange_appends_pair_and_mutates_session() {
        let store = MemoryStore::new();
        let session = store.create_session("u1", None, None).await.unwrap();

        let (session, messages) = store
            .append_exchange(
                session.id,
                ExchangeWrite {
                    user_content: "q".to_string(),
                    user_payload: None,
                    ai_content: "a".to_string(),
                    ai_payload: None,
                    conversation_id: Some("conv-1".to_string()),
                    total_rounds: 1,
                    status: ChatStatus::Active,
                    ended_at: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(session.total_rounds, 1);
        assert_eq!(session.coze_conversation_id.as_deref(), Some("conv-1"));
        assert_eq!(messages[0].sequence, 0);
        assert_eq!(messages[1].sequence, 1);
    }

    #[tokio::test]
    async fn test_story_upsert_overwrites_in_place() {
        let store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2026, 8, 5).unwrap();
        let write = StoryWrite {
            user_id: "u1".to_string(),
            story_date: date,
            words: vec!["abandon".to_string()],
            story_text: "first".to_string(),
            generated_at: Utc::now(),
            story_tokens: None,
            model_name: None,
            image_url: None,
            image_caption: None,
            status: "success".to_string(),
            extra: None,
        };

        let first = store.upsert_story(write.clone()).await.unwrap();
        let second = store
            .upsert_story(StoryWrite {
                story_text: "second".to_string(),
                ..write
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.story_text, "second");
        assert_eq!(store.story_count(), 1);
    }
}
