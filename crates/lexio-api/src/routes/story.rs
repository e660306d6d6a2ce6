use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use lexio_learn::GenerateOptions;
use lexio_persist::WordStory;

use crate::{error::ApiResult, routes::caller, state::AppState};

#[derive(Debug, Deserialize)]
pub struct GenerateStoryRequest {
    /// Defaults to today.
    pub date: Option<NaiveDate>,
    /// Explicit word list overriding the plan lookup.
    pub words: Option<Vec<String>>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct StoryResponse {
    pub story_id: String,
    pub story_date: NaiveDate,
    pub words: Vec<String>,
    pub story_text: String,
    pub generated_at: DateTime<Utc>,
    pub story_tokens: Option<i64>,
    pub model_name: Option<String>,
    pub image_url: Option<String>,
    pub image_caption: Option<String>,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ListStoriesResponse {
    pub stories: Vec<StoryResponse>,
}

/// Generate (or fetch) the story for a date.
pub async fn generate_story(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<GenerateStoryRequest>,
) -> ApiResult<Json<StoryResponse>> {
    let user = caller(&headers)?;

    let mut options = GenerateOptions::new();
    if let Some(date) = request.date {
        options = options.on_date(date);
    }
    if let Some(words) = request.words {
        options = options.with_words(words);
    }
    if request.force {
        options = options.force();
    }

    let story = state.stories.generate(&user, options).await?;
    Ok(Json(story_to_response(story)))
}

pub async fn get_today_story(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<StoryResponse>> {
    let user = caller(&headers)?;
    let story = state
        .stories
        .get_by_date(&user, Utc::now().date_naive())
        .await?;
    Ok(Json(story_to_response(story)))
}

pub async fn get_story_by_date(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(date): Path<NaiveDate>,
) -> ApiResult<Json<StoryResponse>> {
    let user = caller(&headers)?;
    let story = state.stories.get_by_date(&user, date).await?;
    Ok(Json(story_to_response(story)))
}

pub async fn list_stories(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<ListStoriesResponse>> {
    let user = caller(&headers)?;
    let stories = state.stories.list_recent(&user).await?;
    Ok(Json(ListStoriesResponse {
        stories: stories.into_iter().map(story_to_response).collect(),
    }))
}

fn story_to_response(story: WordStory) -> StoryResponse {
    StoryResponse {
        story_id: story.id.to_hex(),
        story_date: story.story_date,
        words: story.words,
        story_text: story.story_text,
        generated_at: story.generated_at,
        story_tokens: story.story_tokens,
        model_name: story.model_name,
        image_url: story.image_url,
        image_caption: story.image_caption,
        status: story.status,
    }
}
