//! Minimal OpenAI-compatible chat-completion client for product intros.

use std::time::Duration;

use brewpick_core::AiSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArkError {
    #[error("AI service is not configured (ARK_API_KEY)")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("AI service returned HTTP {status}")]
    UnexpectedStatus { status: u16 },

    #[error("AI response carried no content")]
    EmptyCompletion,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ArkClient {
    http: reqwest::Client,
    settings: AiSettings,
}

impl ArkClient {
    /// # Errors
    ///
    /// Returns [`ArkError::Http`] if the HTTP client cannot be built.
    pub fn new(settings: AiSettings, timeout_secs: u64) -> Result<Self, ArkError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, settings })
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.settings.api_key.is_some()
    }

    /// Sends one system + user exchange and returns the first choice's text.
    ///
    /// # Errors
    ///
    /// Returns [`ArkError`] if no key is configured, the request fails, or
    /// the response has no non-empty `choices[0].message.content`.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, ArkError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(ArkError::NotConfigured)?;

        let request = ChatRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };

        let response = self
            .http
            .post(&self.settings.api_base)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArkError::UnexpectedStatus {
                status: status.as_u16(),
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ArkError::EmptyCompletion)
    }
}
