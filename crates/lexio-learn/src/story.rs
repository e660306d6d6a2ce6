use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};

use lexio_coze::{CozeGateway, WorkflowRequest};
use lexio_persist::{LearnStore, StoryWrite, WordStory};

use crate::error::{LearnError, Result};
use crate::UserRef;

/// Fallback word list for users without a plan or with an empty day.
pub const DEFAULT_SAMPLE_WORDS: [&str; 20] = [
    "abandon",
    "accurate",
    "acquire",
    "adapt",
    "analyze",
    "approach",
    "assume",
    "benefit",
    "challenge",
    "contribute",
    "decline",
    "define",
    "demand",
    "determine",
    "efficient",
    "essential",
    "evidence",
    "function",
    "impact",
    "maintain",
];

const COURSE_LABELS: [(&str, &str); 4] = [
    ("basic", "基础巩固班"),
    ("postgraduate", "考研冲刺班"),
    ("toefl", "托福强化班"),
    ("ielts", "雅思口语班"),
];
const DEFAULT_COURSE_LABEL: &str = "学习计划";
const DEFAULT_PROFICIENCY_LABEL: &str = "通用词库";
const RECENT_STORIES_LIMIT: i64 = 30;

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Calendar date the story is for; defaults to today.
    pub story_date: Option<NaiveDate>,
    /// Explicit word list overriding the plan lookup.
    pub words: Option<Vec<String>>,
    /// Regenerate even when a record already exists for the date.
    pub force: bool,
}

impl GenerateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.story_date = Some(date);
        self
    }

    pub fn with_words(mut self, words: Vec<String>) -> Self {
        self.words = Some(words);
        self
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }
}

#[derive(Debug)]
struct WorkflowInputs {
    words: Vec<String>,
    course_label: String,
    proficiency_label: String,
    target_word_count: usize,
    conversation_name: String,
    day_index: Option<u32>,
}

/// Daily word-story generation.
///
/// Per (user, date) the record moves absent → present; a present record is
/// returned unchanged unless the caller forces regeneration, and any
/// failure leaves the prior record untouched.
pub struct StoryService {
    store: Arc<dyn LearnStore>,
    gateway: Arc<dyn CozeGateway>,
}

impl StoryService {
    pub fn new(store: Arc<dyn LearnStore>, gateway: Arc<dyn CozeGateway>) -> Self {
        Self { store, gateway }
    }

    pub async fn generate(&self, user: &UserRef, options: GenerateOptions) -> Result<WordStory> {
        let story_date = options
            .story_date
            .unwrap_or_else(|| Utc::now().date_naive());

        if let Some(existing) = self.store.get_story(&user.id, story_date).await? {
            if !options.force {
                return Ok(existing);
            }
        }

        let inputs = self
            .prepare_inputs(user, story_date, options.words)
            .await?;

        let request = WorkflowRequest::new(inputs.words.clone(), inputs.conversation_name.clone())
            .with_course_label(inputs.course_label.clone())
            .with_proficiency_label(inputs.proficiency_label.clone())
            .with_target_word_count(inputs.target_word_count);

        let result = self.gateway.run_workflow(request).await?;
        tracing::info!(
            user_id = %user.id,
            date = %story_date,
            chars = result.text.len(),
            images = result.image_urls.len(),
            "word story generated"
        );

        let extra = json!({
            "chat_id": result.chat_id,
            "conversation_id": result.conversation_id,
            "usage": result.usage,
            "image_urls": result.image_urls,
            "workflow_params": {
                "course_label": inputs.course_label,
                "proficiency_label": inputs.proficiency_label,
                "target_word_count": inputs.target_word_count,
                "day_index": inputs.day_index,
            },
        });

        let story = self
            .store
            .upsert_story(StoryWrite {
                user_id: user.id.clone(),
                story_date,
                words: inputs.words,
                story_text: result.text,
                generated_at: Utc::now(),
                story_tokens: result.usage.as_ref().and_then(token_count),
                model_name: result.model_name,
                image_url: result.image_urls.first().cloned(),
                image_caption: result.image_caption,
                status: "success".to_string(),
                extra: Some(extra),
            })
            .await?;
        Ok(story)
    }

    pub async fn get_by_date(&self, user: &UserRef, story_date: NaiveDate) -> Result<WordStory> {
        self.store
            .get_story(&user.id, story_date)
            .await?
            .ok_or(LearnError::StoryNotFound)
    }

    pub async fn list_recent(&self, user: &UserRef) -> Result<Vec<WordStory>> {
        Ok(self
            .store
            .list_recent_stories(&user.id, RECENT_STORIES_LIMIT)
            .await?)
    }

    async fn prepare_inputs(
        &self,
        user: &UserRef,
        story_date: NaiveDate,
        override_words: Option<Vec<String>>,
    ) -> Result<WorkflowInputs> {
        let plan = self.store.latest_plan(&user.id).await?;

        let mut plan_words = Vec::new();
        let mut day_index = None;
        if let Some(ref plan) = plan {
            let idx = day_index_for(plan.start_date, story_date, plan.total_days);
            day_index = Some(idx);
            let quota = plan
                .daily_quota
                .filter(|q| *q > 0)
                .unwrap_or(DEFAULT_SAMPLE_WORDS.len() as u32);
            plan_words = self.store.words_for_day(plan.id, idx, quota).await?;
        }

        let words = match override_words {
            Some(words) => normalize_words(words)?,
            None if !plan_words.is_empty() => normalize_words(plan_words)?,
            None => DEFAULT_SAMPLE_WORDS.iter().map(|w| w.to_string()).collect(),
        };

        let course_label = course_label(plan.as_ref().and_then(|p| p.course_code.as_deref()));
        let proficiency_label = plan
            .as_ref()
            .and_then(|p| p.book_title.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_PROFICIENCY_LABEL.to_string());
        let target_word_count = plan
            .as_ref()
            .and_then(|p| p.daily_quota)
            .filter(|q| *q > 0)
            .map(|q| q as usize)
            .unwrap_or(words.len());
        let conversation_name = format!("{}-{}", user.username, story_date.format("%Y-%m-%d"));

        Ok(WorkflowInputs {
            words,
            course_label,
            proficiency_label,
            target_word_count,
            conversation_name,
            day_index,
        })
    }
}

/// Map the story date into the plan: day 1 at or before the start date,
/// clamped into `1..=total_days`.
fn day_index_for(start_date: NaiveDate, story_date: NaiveDate, total_days: Option<u32>) -> u32 {
    if story_date <= start_date {
        return 1;
    }
    let offset = (story_date - start_date).num_days() as u32;
    let mut day_index = offset + 1;
    if let Some(total) = total_days.filter(|t| *t > 0) {
        day_index = day_index.min(total);
    }
    day_index.max(1)
}

fn course_label(code: Option<&str>) -> String {
    match code {
        None | Some("") => DEFAULT_COURSE_LABEL.to_string(),
        Some(code) => COURSE_LABELS
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| label.to_string())
            .unwrap_or_else(|| code.to_string()),
    }
}

fn normalize_words(words: Vec<String>) -> Result<Vec<String>> {
    let cleaned: Vec<String> = words
        .into_iter()
        .map(|w| w.trim().to_string())
        .filter(|w| !w.is_empty())
        .collect();
    if cleaned.is_empty() {
        return Err(LearnError::InvalidInput("词表不能为空".to_string()));
    }
    Ok(cleaned)
}

fn token_count(usage: &Value) -> Option<i64> {
    ["output_count", "output_tokens", "token_count"]
        .iter()
        .find_map(|key| usage.get(key).and_then(Value::as_i64))
}
