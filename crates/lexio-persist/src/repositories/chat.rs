use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::oid::ObjectId;
use mongodb::{bson::doc, Client, Collection};
use serde_json::Value;

use crate::error::{PersistError, Result};
use crate::models::{ChatMessage, ChatSession, Sender};
use crate::store::ExchangeWrite;

#[derive(Clone)]
pub struct ChatRepository {
    client: Client,
    sessions: Collection<ChatSession>,
    messages: Collection<ChatMessage>,
}

impl ChatRepository {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let db = client.database(db_name);
        Self {
            client: client.clone(),
            sessions: db.collection("chat_sessions"),
            messages: db.collection("chat_messages"),
        }
    }

    pub async fn create_session(
        &self,
        user_id: &str,
        word_story_id: Option<ObjectId>,
        story_snapshot: Option<String>,
    ) -> Result<ChatSession> {
        let session = ChatSession::new(user_id.to_string(), word_story_id, story_snapshot);
        self.sessions.insert_one(&session).await?;
        Ok(session)
    }

    /// Get a session scoped to its owner.
    pub async fn get_session(
        &self,
        chat_id: ObjectId,
        user_id: &str,
    ) -> Result<Option<ChatSession>> {
        let filter = doc! { "_id": chat_id, "user_id": user_id };
        Ok(self.sessions.find_one(filter).await?)
    }

    pub async fn list_messages(&self, chat_id: ObjectId) -> Result<Vec<ChatMessage>> {
        let filter = doc! { "chat_id": chat_id };
        let messages = self
            .messages
            .find(filter)
            .sort(doc! { "sequence": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(messages)
    }

    /// Append one message. The sequence comes from an atomic `$inc` of the
    /// session counter, so concurrent appenders never share a number.
    pub async fn append_message(
        &self,
        chat_id: ObjectId,
        sender: Sender,
        content: String,
        payload: Option<Value>,
    ) -> Result<ChatMessage> {
        let before = self
            .sessions
            .find_one_and_update(doc! { "_id": chat_id }, doc! { "$inc": { "next_sequence": 1 } })
            .await?
            .ok_or_else(|| PersistError::ChatNotFound(chat_id.to_hex()))?;

        let message = ChatMessage {
            id: ObjectId::new(),
            chat_id,
            sender,
            content,
            payload,
            sequence: before.next_sequence,
            created_at: Utc::now(),
        };
        self.messages.insert_one(&message).await?;
        Ok(message)
    }

    /// Append the user/ai pair of one round together with the session
    /// mutation, inside a multi-document transaction: either both messages
    /// and the counter land, or nothing does.
    pub async fn append_exchange(
        &self,
        chat_id: ObjectId,
        write: ExchangeWrite,
    ) -> Result<(ChatSession, Vec<ChatMessage>)> {
        let mut txn = self.client.start_session().await?;
        txn.start_transaction().await?;

        let before = self
            .sessions
            .find_one_and_update(doc! { "_id": chat_id }, doc! { "$inc": { "next_sequence": 2 } })
            .session(&mut txn)
            .await?
            .ok_or_else(|| PersistError::ChatNotFound(chat_id.to_hex()))?;
        let base = before.next_sequence;

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
        self.messages
            .insert_one(&user_message)
            .session(&mut txn)
            .await?;
        self.messages
            .insert_one(&ai_message)
            .session(&mut txn)
            .await?;

        let mut set = doc! {
            "total_rounds": write.total_rounds,
            "status": bson::to_bson(&write.status)?,
        };
        if let Some(ref conversation_id) = write.conversation_id {
            set.insert("coze_conversation_id", conversation_id.as_str());
        }
        if let Some(ended_at) = write.ended_at {
            set.insert("ended_at", bson::to_bson(&ended_at)?);
        }
        self.sessions
            .update_one(doc! { "_id": chat_id }, doc! { "$set": set })
            .session(&mut txn)
            .await?;

        txn.commit_transaction().await?;

        let session = self
            .sessions
            .find_one(doc! { "_id": chat_id })
            .await?
            .ok_or_else(|| PersistError::ChatNotFound(chat_id.to_hex()))?;
        Ok((session, vec![user_message, ai_message]))
    }
}
