use serde_json::{json, Value};

use crate::config::CozeConfig;

/// One user turn posted to `/v3/chat`.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub user_id: String,
    pub content: String,
    pub conversation_id: Option<String>,
}

impl ChatRequest {
    pub fn new(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            content: content.into(),
            conversation_id: None,
        }
    }

    /// Continue a previously-seen conversation.
    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub(crate) fn to_body(&self, config: &CozeConfig) -> Value {
        let mut body = json!({
            "bot_id": config.chat_bot_id,
            "stream": true,
            "user_id": self.user_id,
            "auto_save_history": true,
            "additional_messages": [{
                "role": "user",
                "content": self.content,
                "content_type": "text",
            }],
        });
        if let Some(ref conversation_id) = self.conversation_id {
            body.as_object_mut()
                .unwrap()
                .insert("conversation_id".to_string(), json!(conversation_id));
        }
        body
    }
}

/// Inputs for a workflow-driven story run posted to `/v1/workflows/chat`.
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    pub words: Vec<String>,
    pub conversation_name: String,
    pub course_label: String,
    pub proficiency_label: String,
    pub target_word_count: usize,
}

impl WorkflowRequest {
    pub fn new(words: Vec<String>, conversation_name: impl Into<String>) -> Self {
        let target_word_count = words.len();
        Self {
            words,
            conversation_name: conversation_name.into(),
            course_label: String::new(),
            proficiency_label: String::new(),
            target_word_count,
        }
    }

    pub fn with_course_label(mut self, label: impl Into<String>) -> Self {
        self.course_label = label.into();
        self
    }

    pub fn with_proficiency_label(mut self, label: impl Into<String>) -> Self {
        self.proficiency_label = label.into();
        self
    }

    pub fn with_target_word_count(mut self, count: usize) -> Self {
        self.target_word_count = count;
        self
    }

    pub(crate) fn to_body(&self, config: &CozeConfig) -> Value {
        json!({
            "workflow_id": config.workflow_id,
            "stream": true,
            "additional_messages": [{
                "role": "user",
                "type": "question",
                "content_type": "text",
                "content": self.words.join(", "),
            }],
            "parameters": {
                "CONVERSATION_NAME": self.conversation_name,
                "USER_CLASS": self.course_label,
                "USER_ENGLISH_LEVEL": self.proficiency_label,
                "USER_TARGETWORD_NUM": self.target_word_count.to_string(),
            },
        })
    }
}
