use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A user's learning plan, reduced to what story generation consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPlan {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: String,
    pub course_code: Option<String>,
    pub book_title: Option<String>,
    pub daily_quota: Option<u32>,
    pub start_date: NaiveDate,
    pub total_days: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// One scheduled word within a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanWord {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub plan_id: ObjectId,
    pub word: String,
    pub day_index: u32,
    pub sequence_in_day: u32,
}
