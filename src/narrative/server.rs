//! HTTP endpoint producing narratives: `POST /analyze-task-progress`.
//!
//! Request `{ "task": Task, "userUpdate"?: string }`. Success is `200` with
//! `{ "progressMade", "progressToGo" }`. Failures are non-2xx with
//! `{ "error", "progressMade", "progressToGo" }`, where the narrative strings are
//! still usable text.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{NarrativeRequest, NarrativeService};
use crate::error::{Error, Result};
use crate::models::Task;

pub const ANALYZE_PATH: &str = "/analyze-task-progress";

pub const ERROR_PROGRESS_MADE: &str = "Unable to analyze progress right now. Keep pushing forward!";
pub const ERROR_PROGRESS_TO_GO: &str = "Try again later. Your effort is what matters most.";

const CORS_HEADERS: [(HeaderName, &str); 2] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "authorization, x-client-info, apikey, content-type"),
];

#[derive(Clone)]
struct AppState {
    narrator: Option<Arc<dyn NarrativeService>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    #[serde(default)]
    task: Option<Task>,
    #[serde(default)]
    user_update: Option<String>,
}

/// Builds the endpoint's router. `None` answers every request with an error body.
pub fn router(narrator: Option<Arc<dyn NarrativeService>>) -> Router {
    Router::new()
        .route(ANALYZE_PATH, post(handle_analyze).options(handle_preflight))
        .with_state(AppState { narrator })
}

/// The narrative endpoint running on a background tokio task.
pub struct NarrativeServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl NarrativeServer {
    /// Binds `bind` (port `0` picks a free port) and starts serving.
    pub async fn start(narrator: Option<Arc<dyn NarrativeService>>, bind: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind)
            .await
            .map_err(|e| Error::Config(format!("cannot bind {}: {}", bind, e)))?;
        let addr = listener.local_addr()?;
        info!("narrative endpoint listening on http://{addr}{ANALYZE_PATH}");

        let app = router(narrator);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("narrative server error: {e}");
            }
        });
        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Full URL of the analyze endpoint.
    pub fn url(&self) -> String {
        format!("http://{}{}", self.addr, ANALYZE_PATH)
    }

    /// Waits until the server task ends.
    pub async fn wait(mut self) {
        let _ = (&mut self.handle).await;
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for NarrativeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_preflight() -> Response {
    (StatusCode::OK, CORS_HEADERS).into_response()
}

async fn handle_analyze(State(state): State<AppState>, body: Bytes) -> Response {
    let body: AnalyzeBody = match serde_json::from_slice(&body) {
        Ok(b) => b,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &format!("Invalid request body: {e}")),
    };
    let Some(task) = body.task else {
        return error_response(StatusCode::BAD_REQUEST, "Task data is required");
    };
    let Some(narrator) = state.narrator else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Narrative backend not configured");
    };

    let request = NarrativeRequest { task, user_update: body.user_update };
    let today = Local::now().date_naive();
    match narrator.analyze(&request, today).await {
        Ok(narrative) => (StatusCode::OK, CORS_HEADERS, Json(narrative)).into_response(),
        Err(e) => {
            warn!(task = %request.task.id, error = %e, "analyze-task-progress failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = json!({
        "error": message,
        "progressMade": ERROR_PROGRESS_MADE,
        "progressToGo": ERROR_PROGRESS_TO_GO,
    });
    (status, CORS_HEADERS, Json(body)).into_response()
}
