//! Client of the narrative endpoint (`POST /analyze-task-progress`).

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Narrative, NarrativeError, NarrativeRequest, NarrativeService};

/// Error body of the endpoint: the reason plus usable fallback strings.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone)]
pub struct EndpointClient {
    url: String,
    client: reqwest::Client,
}

impl EndpointClient {
    /// `url` is the full endpoint URL, e.g. `http://127.0.0.1:8787/analyze-task-progress`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), client: reqwest::Client::new() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NarrativeService for EndpointClient {
    async fn analyze(&self, request: &NarrativeRequest, _today: NaiveDate) -> Result<Narrative, NarrativeError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| NarrativeError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NarrativeError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            warn!(status = status.as_u16(), error = %message, "narrative endpoint error");
            return Err(NarrativeError::Status { status: status.as_u16(), message });
        }

        let narrative: Narrative =
            serde_json::from_str(&text).map_err(|e| NarrativeError::Malformed(e.to_string()))?;
        debug!(task = %request.task.id, "narrative received");
        Ok(narrative)
    }
}
