use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// The generated daily passage for one user and calendar date.
/// `(user_id, story_date)` is the natural key, enforced by a unique index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordStory {
    #[serde(rename = "_id")]
    pub id: ObjectId,
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
    pub extra: Option<serde_json::Value>,
}
