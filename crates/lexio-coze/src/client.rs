use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::aggregator::{aggregate, AggregatorOptions, StreamResult};
use crate::config::CozeConfig;
use crate::error::{CozeError, Result};
use crate::request::{ChatRequest, WorkflowRequest};
use crate::sse::frame_stream;

const CHAT_PATH: &str = "/v3/chat";
const WORKFLOW_CHAT_PATH: &str = "/v1/workflows/chat";

/// Gateway the session protocols talk through. Implemented by `CozeClient`
/// over HTTP; test doubles script results instead.
#[async_trait]
pub trait CozeGateway: Send + Sync {
    /// One tutoring-chat turn, folded to its final result.
    async fn chat(&self, request: ChatRequest) -> Result<StreamResult>;

    /// One workflow run for story generation.
    async fn run_workflow(&self, request: WorkflowRequest) -> Result<StreamResult>;
}

/// HTTP gateway adapter (direct reqwest, no SDK).
pub struct CozeClient {
    http_client: reqwest::Client,
    config: CozeConfig,
}

impl CozeClient {
    pub fn new(config: CozeConfig) -> Result<Self> {
        config.ensure_token()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_token))
                .map_err(|_| CozeError::Config("invalid Coze API token format".to_string()))?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &CozeConfig {
        &self.config
    }

    /// Caller-scoped user id sent upstream.
    pub fn scoped_user_id(&self, kind: &str, user_id: &str) -> String {
        format!("{}-{}-{}", self.config.user_prefix, kind, user_id)
    }

    async fn open_stream(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.config.api_base.trim_end_matches('/'), path);
        let response = self.http_client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CozeError::Api { status, body });
        }
        Ok(response)
    }
}

#[async_trait]
impl CozeGateway for CozeClient {
    async fn chat(&self, request: ChatRequest) -> Result<StreamResult> {
        self.config.ensure_chat_ready()?;
        let body = request.to_body(&self.config);

        tracing::debug!(user_id = %request.user_id, "opening Coze chat stream");
        let response = self.open_stream(CHAT_PATH, &body).await?;
        aggregate(frame_stream(response), AggregatorOptions::chat()).await
    }

    async fn run_workflow(&self, request: WorkflowRequest) -> Result<StreamResult> {
        self.config.ensure_workflow_ready()?;
        let body = request.to_body(&self.config);

        tracing::debug!(
            conversation = %request.conversation_name,
            words = request.words.len(),
            "opening Coze workflow stream"
        );
        let response = self.open_stream(WORKFLOW_CHAT_PATH, &body).await?;
        aggregate(frame_stream(response), AggregatorOptions::story()).await
    }
}
