use chrono::NaiveDate;
use futures::TryStreamExt;
use mongodb::options::IndexOptions;
use mongodb::{bson::doc, Client, Collection, IndexModel};

use crate::error::{PersistError, Result};
use crate::models::WordStory;
use crate::store::StoryWrite;

#[derive(Clone)]
pub struct StoryRepository {
    collection: Collection<WordStory>,
}

impl StoryRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let collection = client.database(db_name).collection("word_stories");
        Self { collection }
    }

    /// Unique `(user_id, story_date)` index; a second concurrent writer for
    /// the same day merges through the upsert instead of duplicating.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "story_date": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    pub async fn get_by_user_and_date(
        &self,
        user_id: &str,
        story_date: NaiveDate,
    ) -> Result<Option<WordStory>> {
        let filter = doc! { "user_id": user_id, "story_date": date_key(story_date) };
        Ok(self.collection.find_one(filter).await?)
    }

    /// Create or overwrite the record for `(user_id, story_date)` in place.
    pub async fn upsert(&self, write: StoryWrite) -> Result<WordStory> {
        let filter = doc! {
            "user_id": write.user_id.as_str(),
            "story_date": date_key(write.story_date),
        };
        let update = doc! {
            "$set": {
                "words": bson::to_bson(&write.words)?,
                "story_text": write.story_text.as_str(),
                "generated_at": bson::to_bson(&write.generated_at)?,
                "story_tokens": bson::to_bson(&write.story_tokens)?,
                "model_name": bson::to_bson(&write.model_name)?,
                "image_url": bson::to_bson(&write.image_url)?,
                "image_caption": bson::to_bson(&write.image_caption)?,
                "status": write.status.as_str(),
                "extra": bson::to_bson(&write.extra)?,
            },
            "$setOnInsert": {
                "user_id": write.user_id.as_str(),
                "story_date": date_key(write.story_date),
            },
        };
        self.collection
            .update_one(filter.clone(), update)
            .upsert(true)
            .await?;

        self.collection
            .find_one(filter)
            .await?
            .ok_or_else(|| PersistError::StoryNotFound(format!("{}@{}", write.user_id, write.story_date)))
    }

    pub async fn list_recent(&self, user_id: &str, limit: i64) -> Result<Vec<WordStory>> {
        let filter = doc! { "user_id": user_id };
        let stories = self
            .collection
            .find(filter)
            .sort(doc! { "story_date": -1 })
            .limit(limit)
            .await?
            .try_collect()
            .await?;
        Ok(stories)
    }
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
