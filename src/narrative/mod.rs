//! Progress narratives: the two free-text strings attached to a task.
//!
//! A [`NarrativeService`] produces a [`Narrative`] for a task, either by calling
//! the narrative endpoint ([`client::EndpointClient`]) or a completion API
//! directly ([`openai::OpenAiNarrator`]). Every failure path ends in
//! [`fallback::fallback_narrative`], so callers always get usable text.

pub mod client;
pub mod dispatch;
pub mod fallback;
pub mod openai;
pub mod prompt;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use crate::models::Narrative;
use crate::config::NarrativeConfig;
use crate::models::Task;

/// Body sent to the narrative endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeRequest {
    pub task: Task,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_update: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NarrativeError {
    #[error("narrative service is not configured")]
    NotConfigured,

    #[error("narrative request failed: {0}")]
    Transport(String),

    #[error("narrative request timed out after {0:?}")]
    Timeout(Duration),

    #[error("narrative service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed narrative response: {0}")]
    Malformed(String),
}

/// Anything that can turn a task (and an optional user update) into a narrative.
#[async_trait]
pub trait NarrativeService: Send + Sync {
    async fn analyze(&self, request: &NarrativeRequest, today: NaiveDate) -> Result<Narrative, NarrativeError>;
}

/// Narrative produced for a task, and whether it came from the local fallback.
#[derive(Debug)]
pub struct NarrativeOutcome {
    pub narrative: Narrative,
    /// Why the fallback was used, if it was.
    pub fallback_reason: Option<NarrativeError>,
}

impl NarrativeOutcome {
    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }

    /// Non-blocking notice to show the user when the fallback was used.
    pub fn notice(&self) -> Option<String> {
        self.fallback_reason
            .as_ref()
            .map(|e| format!("Showing a local summary: {}", e))
    }
}

/// Asks `service` for a narrative, bounded by `timeout`.
///
/// Transport failures, timeouts and malformed payloads are replaced with the
/// deterministic local fallback. No retries.
pub async fn narrate(
    service: Option<&dyn NarrativeService>,
    task: &Task,
    user_update: Option<String>,
    today: NaiveDate,
    timeout: Duration,
) -> NarrativeOutcome {
    let result = match service {
        None => Err(NarrativeError::NotConfigured),
        Some(service) => {
            let request = NarrativeRequest { task: task.clone(), user_update };
            match tokio::time::timeout(timeout, service.analyze(&request, today)).await {
                Ok(result) => result,
                Err(_) => Err(NarrativeError::Timeout(timeout)),
            }
        }
    };

    match result {
        Ok(narrative) => NarrativeOutcome { narrative, fallback_reason: None },
        Err(e) => {
            warn!(task = %task.id, error = %e, "using local narrative fallback");
            NarrativeOutcome {
                narrative: fallback::fallback_narrative(task, today),
                fallback_reason: Some(e),
            }
        }
    }
}

/// Builds the configured narrative service.
///
/// An endpoint takes precedence over a direct API key; with neither, `None`.
pub fn service_from_config(config: &NarrativeConfig) -> Option<Arc<dyn NarrativeService>> {
    if let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
        return Some(Arc::new(client::EndpointClient::new(endpoint)));
    }
    config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .map(|key| Arc::new(openai::OpenAiNarrator::new(openai::OpenAiConfig::from_narrative_config(config, key))) as Arc<dyn NarrativeService>)
}
