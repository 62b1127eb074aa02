//! Chat-completion bridge (OpenAI-compatible endpoint).
//!
//! The bridge only carries prompts and completions; grounding happens in the
//! caller (catalog context in, validator out). Provider failures are not
//! retried: the next user turn re-engages the path.

use crate::config::BotConfig;
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}

/// Thin client over a chat-completion API.
pub struct LlmBridge {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LlmBridge {
    /// Builds a bridge from config; `None` when no API key is set (the
    /// dialogue then runs on tools and rule-based analysis only).
    pub fn from_config(config: &BotConfig) -> Option<Self> {
        let key = config.llm_api_key.as_deref()?.trim().to_string();
        if key.is_empty() {
            return None;
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Some(Self {
            api_key: key,
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
            model: config.llm_model.clone(),
            client,
        })
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// One completion over role-tagged messages.
    pub async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<String, CoreError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest { model: self.model.clone(), messages, temperature, max_tokens };

        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Llm(format!("request failed: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CoreError::Llm(format!("provider error {}: {}", status, body)));
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| CoreError::Llm(format!("response parse failed: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| CoreError::Llm("empty choices".to_string()))
    }
}
