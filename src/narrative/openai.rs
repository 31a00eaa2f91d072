//! Completion backend speaking the OpenAI Chat Completions API.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use super::prompt::build_prompt;
use super::{Narrative, NarrativeError, NarrativeRequest, NarrativeService};
use crate::config::NarrativeConfig;

/// Text used when the model replies with something that is not the expected JSON.
pub const UNPARSEABLE_PROGRESS_MADE: &str = "Progress analysis in development. Keep up the great work!";
pub const UNPARSEABLE_PROGRESS_TO_GO: &str = "Continue with your current approach and stay focused on your goals.";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    /// Base URL without the `/v1` suffix (defaults to `https://api.openai.com`).
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".into(),
            model: "gpt-4o-mini".into(),
            max_tokens: 300,
            temperature: 0.7,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn from_narrative_config(config: &NarrativeConfig, api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: config.api_base.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

pub struct OpenAiNarrator {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiNarrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiNarrator")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiNarrator {
    pub fn new(config: OpenAiConfig) -> Self {
        Self { config, client: reqwest::Client::new() }
    }

    fn build_body(&self, request: &NarrativeRequest, today: NaiveDate) -> serde_json::Value {
        let prompt = build_prompt(&request.task, request.user_update.as_deref(), today);
        serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        })
    }
}

#[async_trait]
impl NarrativeService for OpenAiNarrator {
    async fn analyze(&self, request: &NarrativeRequest, today: NaiveDate) -> Result<Narrative, NarrativeError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = self.build_body(request, today);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| NarrativeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "completion API error");
            return Err(NarrativeError::Status {
                status: status.as_u16(),
                message: extract_error_message(&text),
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| NarrativeError::Malformed(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| NarrativeError::Malformed("completion has no message content".into()))?;

        debug!(content = %content, "completion content");
        Ok(parse_content(&content))
    }
}

/// Reads the model's reply as narrative JSON, tolerating a Markdown code fence.
///
/// Anything else becomes the fixed "analysis in development" text.
pub fn parse_content(content: &str) -> Narrative {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    match serde_json::from_str::<Narrative>(unfenced.trim()) {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "completion content is not narrative JSON");
            Narrative {
                progress_made: UNPARSEABLE_PROGRESS_MADE.to_string(),
                progress_to_go: UNPARSEABLE_PROGRESS_TO_GO.to_string(),
            }
        }
    }
}

/// Extracts `error.message` from an error body, or returns the body itself.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}
