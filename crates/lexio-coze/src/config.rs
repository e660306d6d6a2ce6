use serde::{Deserialize, Serialize};

use crate::error::{CozeError, Result};

const DEFAULT_API_BASE: &str = "https://api.coze.cn";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection settings for the Coze open API.
///
/// Credentials and target ids are validated before any network call; a
/// missing token or id is a setup error, never a stream error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CozeConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    pub api_token: String,
    /// Bot driving the tutoring conversation.
    #[serde(default)]
    pub chat_bot_id: String,
    /// Workflow driving daily story generation.
    #[serde(default)]
    pub workflow_id: String,
    /// Prefix for the caller-scoped user ids sent upstream.
    #[serde(default = "default_user_prefix")]
    pub user_prefix: String,
    /// Overall request timeout: stream open plus full consumption.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_user_prefix() -> String {
    "lexio".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl CozeConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            api_base: default_api_base(),
            api_token: api_token.into(),
            chat_bot_id: String::new(),
            workflow_id: String::new(),
            user_prefix: default_user_prefix(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_chat_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.chat_bot_id = bot_id.into();
        self
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = workflow_id.into();
        self
    }

    pub fn with_user_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.user_prefix = prefix.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn ensure_token(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(CozeError::Config("missing Coze API token".to_string()));
        }
        Ok(())
    }

    pub fn ensure_chat_ready(&self) -> Result<()> {
        self.ensure_token()?;
        if self.chat_bot_id.trim().is_empty() {
            return Err(CozeError::Config("missing Coze chat bot id".to_string()));
        }
        Ok(())
    }

    pub fn ensure_workflow_ready(&self) -> Result<()> {
        self.ensure_token()?;
        if self.workflow_id.trim().is_empty() {
            return Err(CozeError::Config("missing Coze workflow id".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CozeConfig::new("token");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_missing_ids_fail_fast() {
        let config = CozeConfig::new("token");
        assert!(config.ensure_token().is_ok());
        assert!(config.ensure_chat_ready().is_err());
        assert!(config.ensure_workflow_ready().is_err());

        let config = config.with_chat_bot_id("bot-1").with_workflow_id("wf-1");
        assert!(config.ensure_chat_ready().is_ok());
        assert!(config.ensure_workflow_ready().is_ok());
    }

    #[test]
    fn test_missing_token_fails() {
        let config = CozeConfig::new("").with_chat_bot_id("bot-1");
        assert!(matches!(
            config.ensure_chat_ready(),
            Err(CozeError::Config(_))
        ));
    }
}
