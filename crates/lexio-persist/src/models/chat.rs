use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// One tutoring conversation for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: String,
    /// Story the conversation was started from, if any.
    pub word_story_id: Option<ObjectId>,
    /// Remote conversation id remembered across turns.
    pub coze_conversation_id: Option<String>,
    pub total_rounds: u32,
    pub status: ChatStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Next message sequence to hand out; incremented atomically so two
    /// concurrent appends never share a number.
    pub next_sequence: i64,
    /// Passage captured at session start, prepended to the first user turn
    /// sent upstream.
    pub story_snapshot: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    Active,
    Completed,
}

impl ChatSession {
    pub fn new(user_id: String, word_story_id: Option<ObjectId>, story_snapshot: Option<String>) -> Self {
        Self {
            id: ObjectId::new(),
            user_id,
            word_story_id,
            coze_conversation_id: None,
            total_rounds: 0,
            status: ChatStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
            next_sequence: 0,
            story_snapshot,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ChatStatus::Active
    }
}
