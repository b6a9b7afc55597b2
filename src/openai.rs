//! Chat-completions backend.
//!
//! The planner only needs "prompt in, raw text out"; `ChatBackend` is that
//! seam, and `OpenAiBackend` is the production implementation.

use crate::config::Config;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Failure talking to the chat backend. Always retryable by the planner.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to send request to OpenAI API: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("OpenAI API error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("OpenAI response contained no choices")]
    EmptyChoices,
}

/// A language model that turns one prompt into one raw text reply.
pub trait ChatBackend: Send + Sync {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, BackendError>> + Send;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<&'a str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// Stop sequence that cuts off rambling after the JSON list.
const STOP_SEQUENCE: &str = "\n\n\n";

/// OpenAI chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Build a backend with its own HTTP client using the configured timeout.
    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.openai_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self::new(
            client,
            &config.openai_api_url,
            &config.openai_api_key,
            &config.openai_model,
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatBackend for OpenAiBackend {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stop: vec![STOP_SEQUENCE],
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(BackendError::Status { status, body });
        }

        let chat_response: ChatResponse = response.json().await?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(BackendError::EmptyChoices)
    }
}
