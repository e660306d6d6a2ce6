use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use lexio_persist::{ChatMessage, ChatSession, ChatStatus, Sender};

use crate::{
    error::{ApiError, ApiResult},
    routes::caller,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct StartChatRequest {
    /// Passage the conversation is about; captured as the session snapshot.
    #[serde(default)]
    pub story_text: String,
    pub word_story_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatSessionResponse {
    pub chat_id: String,
    pub status: ChatStatus,
    pub total_rounds: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message_id: String,
    pub sender: Sender,
    pub content: String,
    pub sequence: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ChatDetailResponse {
    pub session: ChatSessionResponse,
    pub messages: Vec<MessageResponse>,
}

pub async fn start_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<StartChatRequest>,
) -> ApiResult<Json<ChatDetailResponse>> {
    let user = caller(&headers)?;
    let word_story_id = request
        .word_story_id
        .as_deref()
        .map(parse_object_id)
        .transpose()?;

    let (session, messages) = state
        .chats
        .start_session(&user, &request.story_text, word_story_id)
        .await?;
    Ok(Json(detail_response(session, messages)))
}

pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(chat_id): Path<String>,
) -> ApiResult<Json<ChatDetailResponse>> {
    let user = caller(&headers)?;
    let chat_id = parse_object_id(&chat_id)?;

    let (session, messages) = state.chats.get_detail(&user, chat_id).await?;
    Ok(Json(detail_response(session, messages)))
}

pub async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(chat_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<Json<ChatDetailResponse>> {
    let user = caller(&headers)?;
    let chat_id = parse_object_id(&chat_id)?;

    let (session, messages) = state
        .chats
        .send_message(&user, chat_id, &request.content)
        .await?;
    Ok(Json(detail_response(session, messages)))
}

fn parse_object_id(raw: &str) -> ApiResult<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("invalid id: {raw}")))
}

fn detail_response(session: ChatSession, messages: Vec<ChatMessage>) -> ChatDetailResponse {
    ChatDetailResponse {
        session: ChatSessionResponse {
            chat_id: session.id.to_hex(),
            status: session.status,
            total_rounds: session.total_rounds,
            started_at: session.started_at,
            ended_at: session.ended_at,
        },
        messages: messages.into_iter().map(message_to_response).collect(),
    }
}

fn message_to_response(message: ChatMessage) -> MessageResponse {
    MessageResponse {
        message_id: message.id.to_hex(),
        sender: message.sender,
        content: message.content,
        sequence: message.sequence,
        created_at: message.created_at,
    }
}
