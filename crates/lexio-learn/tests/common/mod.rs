#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use lexio_coze::error::Result as CozeResult;
use lexio_coze::{ChatRequest, CozeError, CozeGateway, StreamResult, WorkflowRequest};

/// Scripted gateway: returns canned results, records requests, and counts
/// calls so tests can prove which paths never touch the network.
pub struct FakeGateway {
    pub chat_calls: AtomicUsize,
    pub workflow_calls: AtomicUsize,
    fail_next: AtomicBool,
    reply_text: Mutex<String>,
    conversation_id: Mutex<Option<String>>,
    image_urls: Mutex<Vec<String>>,
    image_caption: Mutex<Option<String>>,
    pub last_chat_request: Mutex<Option<ChatRequest>>,
    pub last_workflow_request: Mutex<Option<WorkflowRequest>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            chat_calls: AtomicUsize::new(0),
            workflow_calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
            reply_text: Mutex::new("scripted reply".to_string()),
            conversation_id: Mutex::new(Some("conv-1".to_string())),
            image_urls: Mutex::new(Vec::new()),
            image_caption: Mutex::new(None),
            last_chat_request: Mutex::new(None),
            last_workflow_request: Mutex::new(None),
        }
    }

    pub fn set_reply(&self, text: &str) {
        *self.reply_text.lock().unwrap() = text.to_string();
    }

    pub fn set_conversation_id(&self, id: Option<&str>) {
        *self.conversation_id.lock().unwrap() = id.map(str::to_string);
    }

    pub fn set_images(&self, urls: Vec<&str>, caption: Option<&str>) {
        *self.image_urls.lock().unwrap() = urls.into_iter().map(str::to_string).collect();
        *self.image_caption.lock().unwrap() = caption.map(str::to_string);
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn result(&self) -> CozeResult<StreamResult> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(CozeError::Remote("scripted failure".to_string()));
        }
        Ok(StreamResult {
            text: self.reply_text.lock().unwrap().clone(),
            image_caption: self.image_caption.lock().unwrap().clone(),
            image_urls: self.image_urls.lock().unwrap().clone(),
            conversation_id: self.conversation_id.lock().unwrap().clone(),
            chat_id: Some("chat-fake".to_string()),
            usage: Some(serde_json::json!({ "output_count": 17, "token_count": 40 })),
            model_name: Some("doubao-pro".to_string()),
        })
    }
}

#[async_trait]
impl CozeGateway for FakeGateway {
    async fn chat(&self, request: ChatRequest) -> CozeResult<StreamResult> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_chat_request.lock().unwrap() = Some(request);
        self.result()
    }

    async fn run_workflow(&self, request: WorkflowRequest) -> CozeResult<StreamResult> {
        self.workflow_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_workflow_request.lock().unwrap() = Some(request);
        self.result()
    }
}
