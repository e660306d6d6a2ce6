use std::sync::Arc;

use bson::oid::ObjectId;
use chrono::Utc;
use serde_json::json;

use lexio_coze::{ChatRequest, CozeGateway};
use lexio_persist::{ChatMessage, ChatSession, ChatStatus, ExchangeWrite, LearnStore, Sender};

use crate::error::{LearnError, Result};
use crate::UserRef;

/// A session ends after this many user/ai exchanges.
pub const MAX_CHAT_ROUNDS: u32 = 12;

const GREETING_TEXT: &str = "你好呀！我是 lulu，这篇文章有什么想要问我的吗？";

/// Tutoring-chat session protocol.
///
/// Sessions stay `active` until the round cap flips them to `completed`,
/// a one-way transition. A completed session rejects further messages
/// before any network call.
pub struct ChatService {
    store: Arc<dyn LearnStore>,
    gateway: Arc<dyn CozeGateway>,
    user_prefix: String,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn LearnStore>,
        gateway: Arc<dyn CozeGateway>,
        user_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            user_prefix: user_prefix.into(),
        }
    }

    /// Open a session around a passage. The synthetic greeting is tagged
    /// `skip_history` so it is never replayed to the remote conversation.
    pub async fn start_session(
        &self,
        user: &UserRef,
        story_text: &str,
        word_story_id: Option<ObjectId>,
    ) -> Result<(ChatSession, Vec<ChatMessage>)> {
        let snapshot = story_text.trim();
        let session = self
            .store
            .create_session(
                &user.id,
                word_story_id,
                (!snapshot.is_empty()).then(|| snapshot.to_string()),
            )
            .await?;

        self.store
            .append_message(
                session.id,
                Sender::Ai,
                GREETING_TEXT.to_string(),
                Some(json!({ "skip_history": true, "type": "greeting" })),
            )
            .await?;

        let messages = self.store.list_messages(session.id).await?;
        Ok((session, messages))
    }

    pub async fn get_detail(
        &self,
        user: &UserRef,
        chat_id: ObjectId,
    ) -> Result<(ChatSession, Vec<ChatMessage>)> {
        let session = self
            .store
            .get_session(chat_id, &user.id)
            .await?
            .ok_or(LearnError::ChatNotFound)?;
        let messages = self.store.list_messages(session.id).await?;
        Ok((session, messages))
    }

    /// One round: validate, call the gateway, then persist the user/ai pair
    /// atomically with the round counter. Failure leaves the session and
    /// transcript untouched.
    pub async fn send_message(
        &self,
        user: &UserRef,
        chat_id: ObjectId,
        content: &str,
    ) -> Result<(ChatSession, Vec<ChatMessage>)> {
        let chat = self
            .store
            .get_session(chat_id, &user.id)
            .await?
            .ok_or(LearnError::ChatNotFound)?;
        if !chat.is_active() {
            return Err(LearnError::ChatCompleted);
        }
        if chat.total_rounds >= MAX_CHAT_ROUNDS {
            // An active session should never reach the cap, but reject it
            // here as well rather than spending a network call.
            return Err(LearnError::RoundCapReached(MAX_CHAT_ROUNDS));
        }

        let message_text = content.trim();
        if message_text.is_empty() {
            return Err(LearnError::InvalidInput("请输入问题内容".to_string()));
        }

        let history = self.store.list_messages(chat.id).await?;
        let is_first_user = !history.iter().any(|m| m.sender == Sender::User);
        let snapshot = chat
            .story_snapshot
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        // Context injection: the stored transcript keeps the original text,
        // only the remote model sees the prefixed version.
        let upstream_text = match (is_first_user, snapshot) {
            (true, Some(snapshot)) => {
                format!("短文内容：{snapshot}\n用户问题：{message_text}")
            }
            _ => message_text.to_string(),
        };

        let mut request = ChatRequest::new(
            format!("{}-chat-{}", self.user_prefix, user.id),
            upstream_text.clone(),
        );
        if let Some(ref conversation_id) = chat.coze_conversation_id {
            request = request.with_conversation_id(conversation_id.clone());
        }

        let result = self.gateway.chat(request).await?;

        let total_rounds = chat.total_rounds + 1;
        let completes = total_rounds >= MAX_CHAT_ROUNDS;
        if completes {
            tracing::info!(chat_id = %chat.id, "chat session reached round cap");
        }

        let (session, messages) = self
            .store
            .append_exchange(
                chat.id,
                ExchangeWrite {
                    user_content: message_text.to_string(),
                    user_payload: Some(json!({
                        "upstream_content": upstream_text,
                        "is_story_prefixed": is_first_user && snapshot.is_some(),
                    })),
                    ai_content: result.text,
                    ai_payload: Some(json!({
                        "chat_id": result.chat_id,
                        "usage": result.usage,
                    })),
                    conversation_id: result.conversation_id,
                    total_rounds,
                    status: if completes {
                        ChatStatus::Completed
                    } else {
                        ChatStatus::Active
                    },
                    ended_at: completes.then(Utc::now),
                },
            )
            .await?;
        Ok((session, messages))
    }
}
