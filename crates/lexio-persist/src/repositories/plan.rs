use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::{bson::doc, Client, Collection};

use crate::error::Result;
use crate::models::{LearningPlan, PlanWord};

#[derive(Clone)]
pub struct PlanRepository {
    plans: Collection<LearningPlan>,
    words: Collection<PlanWord>,
}

impl PlanRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let db = client.database(db_name);
        Self {
            plans: db.collection("learning_plans"),
            words: db.collection("plan_words"),
        }
    }

    /// Most recently created plan for a user.
    pub async fn latest_for_user(&self, user_id: &str) -> Result<Option<LearningPlan>> {
        let plan = self
            .plans
            .find_one(doc! { "user_id": user_id })
            .sort(doc! { "created_at": -1 })
            .await?;
        Ok(plan)
    }

    /// Words scheduled for one day, in in-day order. When the day has none,
    /// fall back to the first `fallback_limit` words of the whole plan.
    pub async fn words_for_day(
        &self,
        plan_id: ObjectId,
        day_index: u32,
        fallback_limit: u32,
    ) -> Result<Vec<String>> {
        let scheduled: Vec<PlanWord> = self
            .words
            .find(doc! { "plan_id": plan_id, "day_index": day_index })
            .sort(doc! { "sequence_in_day": 1 })
            .await?
            .try_collect()
            .await?;
        if !scheduled.is_empty() {
            return Ok(scheduled.into_iter().map(|w| w.word).collect());
        }

        let fallback: Vec<PlanWord> = self
            .words
            .find(doc! { "plan_id": plan_id })
            .sort(doc! { "day_index": 1, "sequence_in_day": 1 })
            .limit(fallback_limit as i64)
            .await?
            .try_collect()
            .await?;
        Ok(fallback.into_iter().map(|w| w.word).collect())
    }
}
